//! Notify Relay CLI
//!
//! 回放通知脚本、查看转发历史和当前配置

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use notify_relay::cli::{self, HistoryArgs, RunArgs};
use notify_relay::RelayConfig;

#[derive(Parser)]
#[command(name = "nrelay")]
#[command(about = "Notify Relay - 把手机通知转发到手表")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 <config_dir>/notify-relay/config.json）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 回放 JSONL 事件脚本，打印发往手表的记录
    Run(RunArgs),
    /// 查看最近转发的通知
    History(HistoryArgs),
    /// 打印生效的配置
    Config {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 控制日志级别，例如: RUST_LOG=debug nrelay run -s demo.jsonl
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("notify_relay=info,nrelay=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let Cli { config, command } = Cli::parse();
    let config_path = config.as_deref();

    match command {
        Commands::Run(args) => cli::handle_run(args, config_path).await?,
        Commands::History(args) => cli::handle_history(args, config_path)?,
        Commands::Config { json } => {
            let config = cli::load_config(config_path)?;
            if !json {
                let path = config_path
                    .map(PathBuf::from)
                    .unwrap_or_else(RelayConfig::path);
                println!("# {}", path.display());
                println!("# history: {}", config.history_file().display());
            }
            println!("{}", cli::format_output(&config)?);
        }
    }

    Ok(())
}
