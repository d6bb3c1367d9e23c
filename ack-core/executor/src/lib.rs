//! ACK 执行器
//!
//! 认证测试驱动循环：向测试运行索取下一个方法，交给外部执行器执行，
//! 把结果写回所属方法并持久化测试类。

pub mod job;
pub mod runner;

pub use job::{MethodExecutor, MethodOutcome, TestJob};
pub use runner::{CertRunner, RunSummary, RunnerConfig, StepReport};

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error(transparent)]
    Model(#[from] ack_model::ModelError),

    #[error("方法执行失败: {0}")]
    Execution(String),

    #[error("方法执行超时 ({0:?})")]
    Timeout(Duration),

    #[error("配置错误: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
