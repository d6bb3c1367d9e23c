//! 结果记录命令

use anyhow::{Context, Result};
use colored::Colorize;

use ack_model::{Fields, TestResult};

use super::common::{find_method, open_run};

pub fn handle(
    file: &str,
    test: &str,
    result: &str,
    device: Option<&str>,
    set: Vec<(String, String)>,
) -> Result<()> {
    let result: TestResult = result.parse()?;
    let mut run = open_run(file)?;
    let selection = find_method(&run, test, device)?;

    let extra: Fields = set.into_iter().map(|(k, v)| (k, v.into())).collect();
    run.record(&selection, result, extra)
        .with_context(|| format!("记录方法 {} 结果失败", test))?;

    let label = match result {
        TestResult::Pass => result.as_str().green(),
        TestResult::Fail => result.as_str().red(),
        _ => result.as_str().yellow(),
    };
    println!(
        "{} {} (设备 {}) → {}",
        "✓".green().bold(),
        selection.method_name().bold(),
        selection.udid(),
        label
    );
    Ok(())
}
