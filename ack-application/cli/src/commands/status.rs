//! 运行状态命令

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use ack_model::{Device, RerunBudget, StatusCounts, TestRun};

use super::common::open_run;
use super::output::{print_json, print_table, TableRow};

/// 单个设备的状态行
#[derive(Debug, Serialize)]
pub struct DeviceStatus {
    pub udid: String,
    pub tag: String,
    pub id: String,
    pub description: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub certified: bool,
}

impl DeviceStatus {
    fn from_device(device: &Device) -> Self {
        Self {
            udid: device.udid().to_string(),
            tag: device.tag().to_string(),
            id: device.id(),
            description: device.description(),
            counts: device.status_counts(),
            certified: device.has_passed(),
        }
    }
}

impl TableRow for DeviceStatus {
    fn headers() -> Vec<&'static str> {
        vec![
            "UDID", "TAG", "ID", "PASS", "FAIL", "SKIP", "WAIT", "RUN", "CERTIFIED",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.udid.clone(),
            self.tag.clone(),
            self.id.clone(),
            self.counts.passed.to_string(),
            self.counts.failed.to_string(),
            self.counts.skipped.to_string(),
            self.counts.waiting.to_string(),
            self.counts.running.to_string(),
            if self.certified { "yes" } else { "no" }.to_string(),
        ]
    }
}

/// 整个运行的状态
#[derive(Debug, Serialize)]
pub struct RunStatus {
    pub resource: String,
    pub rerun_budget: RerunBudget,
    pub finished: bool,
    pub total: StatusCounts,
    pub devices: Vec<DeviceStatus>,
}

impl RunStatus {
    pub fn from_run(run: &TestRun) -> Self {
        Self {
            resource: run.resource().to_string(),
            rerun_budget: run.rerun_budget(),
            finished: run.is_finished(),
            total: run.status_counts(),
            devices: run.devices().iter().map(DeviceStatus::from_device).collect(),
        }
    }
}

pub fn handle(file: &str, format: &str) -> Result<()> {
    let run = open_run(file)?;
    let status = RunStatus::from_run(&run);

    if format == "json" {
        return print_json(&status);
    }

    if status.devices.is_empty() {
        println!("{}", "运行文件中没有设备".yellow());
    } else {
        print_table(&status.devices);
    }

    let total = &status.total;
    println!(
        "\n共 {} 个方法: 通过 {}, 失败 {}, 跳过 {}, 待运行 {}, 运行中 {}",
        total.total(),
        total.passed.to_string().green(),
        total.failed.to_string().red(),
        total.skipped,
        total.waiting,
        total.running
    );
    println!("重跑预算: {}", status.rerun_budget);
    if status.finished {
        println!("{} 运行已结束", "✓".green().bold());
    } else {
        println!("{} 运行未结束", "⏳".cyan());
    }
    Ok(())
}
