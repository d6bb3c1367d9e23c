//! 认证运行器

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use ack_model::{
    RerunBudget, SelectionReason, StatusCounts, TestResult, TestRun, TestSelection,
};

use crate::{ExecutorError, MethodExecutor, MethodOutcome, Result, TestJob};

/// 运行器配置
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// 单个方法的超时时间，超时记为失败
    pub method_timeout: Option<Duration>,

    /// 最多执行的方法数，用于不限重跑预算时强制停止
    pub max_iterations: Option<usize>,
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.method_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ExecutorError::Config("method_timeout 不能为 0".to_string()));
        }
        if self.max_iterations == Some(0) {
            return Err(ExecutorError::Config("max_iterations 不能为 0".to_string()));
        }
        Ok(())
    }
}

/// 单个方法的执行报告
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub udid: String,
    pub method_name: String,
    pub reason: SelectionReason,
    pub result: TestResult,

    /// 执行器错误或超时信息
    pub error: Option<String>,

    /// 耗时（毫秒）
    pub duration_ms: u64,
}

/// 一次驱动循环的摘要
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub resource: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
    pub counts: StatusCounts,
    pub rerun_budget: RerunBudget,

    /// 运行是否已结束 (重跑预算未耗尽或达到 max_iterations 时为 false)
    pub finished: bool,
}

/// 认证运行器
///
/// 持有测试运行并独占地修改它：调度 → 标记 running → 执行 → 记录结果。
pub struct CertRunner {
    run: TestRun,
    executor: Arc<dyn MethodExecutor>,
    config: RunnerConfig,
}

impl CertRunner {
    pub fn new(run: TestRun, executor: Arc<dyn MethodExecutor>) -> Self {
        Self {
            run,
            executor,
            config: RunnerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置单个方法的超时时间
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.config.method_timeout = Some(limit);
        self
    }

    pub fn run(&self) -> &TestRun {
        &self.run
    }

    pub fn into_run(self) -> TestRun {
        self.run
    }

    async fn execute(&self, job: &TestJob) -> Result<MethodOutcome> {
        match self.config.method_timeout {
            Some(limit) => timeout(limit, self.executor.execute(job))
                .await
                .unwrap_or(Err(ExecutorError::Timeout(limit))),
            None => self.executor.execute(job).await,
        }
    }

    /// 执行一个方法，没有可调度的方法时返回 `None`
    pub async fn step(&mut self) -> Result<Option<StepReport>> {
        let Some(selection) = self.run.next_test()? else {
            return Ok(None);
        };
        if selection.reason() == SelectionReason::Resume {
            warn!("方法 {} 上次未执行完，重新执行", selection);
        }

        self.run.start(&selection)?;
        let job = TestJob::from_selection(&self.run, &selection)?;

        let start_time = Instant::now();
        let (outcome, error) = match self.execute(&job).await {
            Ok(outcome) => (outcome, None),
            Err(e @ (ExecutorError::Execution(_) | ExecutorError::Timeout(_))) => {
                error!("方法 {} 执行失败: {}", selection, e);
                (MethodOutcome::fail(e.to_string()), Some(e.to_string()))
            }
            Err(e) => return Err(e),
        };
        let duration_ms = start_time.elapsed().as_millis() as u64;

        self.record(&selection, outcome)?;

        Ok(Some(StepReport {
            udid: selection.udid().to_string(),
            method_name: selection.method_name().to_string(),
            reason: selection.reason(),
            result: self
                .run
                .selected_method(&selection)
                .and_then(|m| m.result())
                .unwrap_or(TestResult::Null),
            error,
            duration_ms,
        }))
    }

    fn record(&mut self, selection: &TestSelection, outcome: MethodOutcome) -> Result<()> {
        debug!(
            "记录方法 {} 结果 {} ({} 个注解)",
            selection,
            outcome.result,
            outcome.annotations.len()
        );
        self.run
            .record(selection, outcome.result, outcome.annotations)?;
        Ok(())
    }

    /// 驱动运行直到没有可调度的方法或达到 `max_iterations`
    pub async fn run_to_completion(&mut self) -> Result<RunSummary> {
        self.config.validate()?;
        let started_at = Utc::now();
        info!("开始驱动测试运行: {}", self.run.resource());

        let mut steps = Vec::new();
        loop {
            if self
                .config
                .max_iterations
                .is_some_and(|max| steps.len() >= max)
            {
                warn!("已达到最大执行次数 {}, 停止运行", steps.len());
                break;
            }
            match self.step().await? {
                Some(report) => steps.push(report),
                None => break,
            }
        }

        let counts = self.run.status_counts();
        let finished = self.run.is_finished();
        info!(
            "测试运行结束: 执行 {} 次, 通过 {}, 失败 {}, 跳过 {}",
            steps.len(),
            counts.passed,
            counts.failed,
            counts.skipped
        );

        Ok(RunSummary {
            resource: self.run.resource().to_string(),
            started_at,
            finished_at: Utc::now(),
            steps,
            counts,
            rerun_budget: self.run.rerun_budget(),
            finished,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validate() {
        assert!(RunnerConfig::default().validate().is_ok());

        let zero_timeout = RunnerConfig {
            method_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(matches!(
            zero_timeout.validate(),
            Err(ExecutorError::Config(_))
        ));

        let zero_iterations = RunnerConfig {
            max_iterations: Some(0),
            ..Default::default()
        };
        assert!(zero_iterations.validate().is_err());
    }
}
