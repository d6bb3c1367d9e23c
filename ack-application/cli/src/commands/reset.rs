//! 方法重置命令

use anyhow::{Context, Result};
use colored::Colorize;

use super::common::{find_method, open_run};

pub fn handle(file: &str, test: &str, device: Option<&str>) -> Result<()> {
    let mut run = open_run(file)?;
    let selection = find_method(&run, test, device)?;

    run.reset_method(&selection)
        .with_context(|| format!("重置方法 {} 失败", test))?;

    println!(
        "{} {} (设备 {}) 已重置为待运行",
        "✓".green().bold(),
        selection.method_name().bold(),
        selection.udid()
    );
    Ok(())
}
