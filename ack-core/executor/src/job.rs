//! 执行任务与外部执行器接口

use async_trait::async_trait;
use serde::Serialize;

use ack_model::{AnnotationValue, DeviceTag, Fields, ModelError, TestResult, TestRun, TestSelection};

use crate::Result;

/// 交给执行器的一次方法执行
#[derive(Debug, Clone, Serialize)]
pub struct TestJob {
    pub udid: String,
    pub tag: DeviceTag,
    pub class_name: String,
    pub method_name: String,

    /// 方法的 control 注解
    pub control: Option<String>,

    /// 设备节点属性
    pub device_config: Vec<(String, String)>,

    /// 运行的全局配置
    pub global_config: Vec<(String, String)>,
}

impl TestJob {
    /// 根据调度结果构建任务
    pub fn from_selection(run: &TestRun, selection: &TestSelection) -> Result<Self> {
        let stale = || ModelError::UnknownMethod {
            test_name: selection.method_name().to_string(),
            class_name: selection.class_name().to_string(),
        };
        let device = run.device(selection.udid()).ok_or_else(stale)?;
        let method = run.selected_method(selection).ok_or_else(stale)?;

        Ok(Self {
            udid: device.udid().to_string(),
            tag: device.tag(),
            class_name: selection.class_name().to_string(),
            method_name: method.name().to_string(),
            control: method.control().map(str::to_string),
            device_config: device.config().to_vec(),
            global_config: run.global_config().to_vec(),
        })
    }
}

/// 方法执行结果及附加注解
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodOutcome {
    pub result: TestResult,
    pub annotations: Fields,
}

impl MethodOutcome {
    pub fn new(result: TestResult) -> Self {
        Self {
            result,
            annotations: Vec::new(),
        }
    }

    pub fn pass() -> Self {
        Self::new(TestResult::Pass)
    }

    /// 失败，原因记录在 `reason` 注解中
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::new(TestResult::Fail).with_annotation("reason", reason.into())
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self::new(TestResult::Skip).with_annotation("reason", reason.into())
    }

    pub fn with_annotation(mut self, name: &str, value: impl Into<AnnotationValue>) -> Self {
        self.annotations.push((name.to_string(), value.into()));
        self
    }
}

/// 外部执行器
///
/// 负责真正运行一个测试方法，运行器只记录其结果。
/// 返回错误时该方法被记为失败。
#[async_trait]
pub trait MethodExecutor: Send + Sync {
    async fn execute(&self, job: &TestJob) -> Result<MethodOutcome>;
}
