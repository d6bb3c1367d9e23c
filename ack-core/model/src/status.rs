//! 方法状态、结果与统计

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use crate::ModelError;

/// 方法执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodStatus {
    /// 等待执行
    Init,

    /// 正在执行
    Running,

    /// 已完成
    Done,
}

impl MethodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodStatus::Init => "init",
            MethodStatus::Running => "running",
            MethodStatus::Done => "done",
        }
    }
}

impl fmt::Display for MethodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MethodStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(MethodStatus::Init),
            "running" => Ok(MethodStatus::Running),
            "done" => Ok(MethodStatus::Done),
            other => Err(ModelError::InvalidStatusValue {
                field: "status".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// 方法执行结果，`Null` 表示尚无结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestResult {
    Pass,
    Fail,
    Skip,
    Null,
}

impl TestResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestResult::Pass => "pass",
            TestResult::Fail => "fail",
            TestResult::Skip => "skip",
            TestResult::Null => "NULL",
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestResult {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(TestResult::Pass),
            "fail" => Ok(TestResult::Fail),
            "skip" => Ok(TestResult::Skip),
            "NULL" => Ok(TestResult::Null),
            other => Err(ModelError::InvalidStatusValue {
                field: "result".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// 各状态的方法数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub waiting: usize,
    pub running: usize,
}

impl StatusCounts {
    /// 全部方法数 (done 且无结果的方法不计入)
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.waiting + self.running
    }
}

impl AddAssign for StatusCounts {
    fn add_assign(&mut self, other: Self) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.waiting += other.waiting;
        self.running += other.running;
    }
}
