//! ACK 模型层
//!
//! 认证测试运行的内存模型：测试方法、测试类、设备与测试运行，
//! 以及在整棵运行树上挑选下一个方法、驱动失败重跑的调度器。
//! 所有状态变更都经由文档存储写回运行文件。

pub mod class;
pub mod device;
pub mod error;
pub mod method;
pub mod run;
mod scheduler;
pub mod status;

pub use class::{parse_capabilities, ResultRecord, TestClass, CLASS_TAG, DEVICE_TAG, REQUIRED_CAPABILITY};
pub use device::{cpu_id, CapabilityMap, Device, DeviceTag};
pub use error::{ModelError, Result};
pub use method::{Annotation, AnnotationValue, Fields, TestMethod, METHOD_TAG};
pub use run::{RerunBudget, SelectionReason, TestRun, TestSelection, GLOBAL_CONFIG_TAG, RERUN_KEY};
pub use status::{MethodStatus, StatusCounts, TestResult};
