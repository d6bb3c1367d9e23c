//! ACK CLI 应用

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "ack")]
#[command(about = "ACK - 硬件认证测试运行跟踪工具", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志级别 (默认取配置文件, RUST_LOG 优先)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 显示各设备的方法状态统计与认证结论
    Status {
        /// 运行文件路径
        file: String,

        /// 输出格式 (table/json)
        #[arg(short = 'f', long, value_parser = ["table", "json"])]
        format: Option<String>,
    },

    /// 挑选下一个要执行的方法 (可能触发失败重跑)
    Next {
        /// 运行文件路径
        file: String,

        /// 同时把该方法标记为 running
        #[arg(long)]
        start: bool,
    },

    /// 记录方法执行结果
    Record {
        /// 运行文件路径
        file: String,

        /// 方法完整名称 (<class>.<method>)
        #[arg(long)]
        test: String,

        /// 结果 (pass/fail/skip)
        #[arg(long, value_parser = ["pass", "fail", "skip"])]
        result: String,

        /// 限定设备 udid
        #[arg(long)]
        device: Option<String>,

        /// 附加注解 (key=value，可重复)
        #[arg(long = "set", value_parser = commands::common::parse_key_val)]
        set: Vec<(String, String)>,
    },

    /// 显示各设备的能力支持情况
    Caps {
        /// 运行文件路径
        file: String,

        /// 输出格式 (table/json)
        #[arg(short = 'f', long, value_parser = ["table", "json"])]
        format: Option<String>,
    },

    /// 把方法重置为待运行
    Reset {
        /// 运行文件路径
        file: String,

        /// 方法完整名称 (<class>.<method>)
        #[arg(long)]
        test: String,

        /// 限定设备 udid
        #[arg(long)]
        device: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    // 初始化日志，输出到 stderr 以免干扰 JSON 输出
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("ACK CLI 启动, 配置: {:?}", config);

    let format = |f: Option<String>| f.unwrap_or_else(|| config.default_format.clone());

    match cli.command {
        Commands::Status { file, format: f } => commands::status::handle(&file, &format(f))?,
        Commands::Next { file, start } => commands::next::handle(&file, start)?,
        Commands::Record {
            file,
            test,
            result,
            device,
            set,
        } => commands::record::handle(&file, &test, &result, device.as_deref(), set)?,
        Commands::Caps { file, format: f } => commands::caps::handle(&file, &format(f))?,
        Commands::Reset { file, test, device } => {
            commands::reset::handle(&file, &test, device.as_deref())?
        }
    }

    Ok(())
}
