//! 能力支持情况命令

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use ack_model::TestRun;

use super::common::open_run;
use super::output::{output_formatted, TableRow};

#[derive(Debug, Serialize)]
pub struct CapabilityRow {
    pub udid: String,
    pub capability: String,
    pub supported: bool,
}

impl TableRow for CapabilityRow {
    fn headers() -> Vec<&'static str> {
        vec!["UDID", "CAPABILITY", "SUPPORTED"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.udid.clone(),
            self.capability.clone(),
            if self.supported { "yes" } else { "no" }.to_string(),
        ]
    }
}

pub fn collect(run: &TestRun) -> Vec<CapabilityRow> {
    run.devices()
        .iter()
        .flat_map(|device| {
            device
                .capabilities()
                .into_iter()
                .map(move |(capability, supported)| CapabilityRow {
                    udid: device.udid().to_string(),
                    capability,
                    supported,
                })
        })
        .collect()
}

pub fn handle(file: &str, format: &str) -> Result<()> {
    let run = open_run(file)?;
    let rows = collect(&run);

    if rows.is_empty() && format != "json" {
        println!("{}", "没有声明任何能力".yellow());
        return Ok(());
    }
    output_formatted(&rows, format)
}
