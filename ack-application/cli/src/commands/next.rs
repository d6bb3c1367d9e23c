//! 调度命令

use anyhow::{Context, Result};
use colored::Colorize;

use super::common::open_run;

pub fn handle(file: &str, start: bool) -> Result<()> {
    let mut run = open_run(file)?;

    let Some(selection) = run.next_test().context("调度失败")? else {
        if run.is_finished() {
            println!("{} 运行已结束，没有待执行的方法", "✓".green().bold());
        } else {
            println!(
                "{} (剩余重跑预算: {})",
                "当前没有可调度的方法".yellow(),
                run.rerun_budget()
            );
        }
        return Ok(());
    };

    let control = run
        .selected_method(&selection)
        .and_then(|m| m.control())
        .unwrap_or("-")
        .to_string();

    println!("{} {}", "▶".cyan(), selection.method_name().bold());
    println!("  设备:    {}", selection.udid().yellow());
    println!("  测试类:  {}", selection.class_name());
    println!("  control: {}", control);
    println!("  原因:    {:?}", selection.reason());

    if start {
        run.start(&selection)
            .with_context(|| format!("无法开始方法 {}", selection.method_name()))?;
        println!("{} 已标记为 running", "✓".green().bold());
    }
    Ok(())
}
