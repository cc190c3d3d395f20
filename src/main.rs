//! 题库整理命令行
//!
//! - `parse`: 阶段 A，解析 `input/` 下的原始文档
//! - `explain`: 阶段 B，为 `clean/` 下的整理稿生成解释
//! - `handle-event`: 读取存储事件（文件或标准输入）并分发
//! - `health`: 输出健康检查结果

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use question_pipeline::orchestrator::error_report;
use question_pipeline::utils::init_tracing;
use question_pipeline::{AppResult, Config, Dispatcher, Outcome};

#[derive(Parser)]
#[command(name = "question_pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract exam questions from scraped dumps and generate explanations", long_about = None)]
struct Cli {
    /// TOML 配置文件（缺省时只读取环境变量）
    #[arg(short, long, global = true, env = "QUESTION_PIPELINE_CONFIG")]
    config: Option<PathBuf>,

    /// 覆盖配置中的桶目录
    #[arg(long, global = true)]
    bucket: Option<String>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    /// 输出 JSON 格式的日志
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 解析原始题库（阶段 A）
    Parse {
        /// 桶内对象名，例如 input/az900.txt
        object: String,
    },

    /// 为整理稿生成解释（阶段 B）
    Explain {
        /// 桶内对象名，例如 clean/az900.json
        object: String,
    },

    /// 处理一个存储事件
    HandleEvent {
        /// 事件文件，缺省时读取标准输入
        file: Option<PathBuf>,
    },

    /// 健康检查
    Health,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_toml_file(path)
            .with_context(|| format!("加载配置失败: {}", path.display()))?,
        None => Config::from_env(),
    };
    if let Some(bucket) = &cli.bucket {
        config.bucket = bucket.clone();
    }
    if cli.verbose {
        config.verbose_logging = true;
    }
    config.validate().context("配置校验失败")?;
    Ok(config)
}

fn read_event(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("无法读取事件文件: {}", path.display())),
        None => {
            let mut payload = String::new();
            std::io::stdin()
                .read_to_string(&mut payload)
                .context("无法读取标准输入")?;
            Ok(payload)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 输出结果 JSON；失败时输出错误描述并返回错误
fn report(result: AppResult<Outcome>) -> Result<()> {
    match result {
        Ok(outcome) => print_json(&outcome),
        Err(e) => {
            print_json(&error_report(&e))?;
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_tracing(cli.json, config.verbose_logging);

    let dispatcher = Dispatcher::connect(config).await;

    match &cli.command {
        Commands::Parse { object } => report(dispatcher.parse_object(object)),
        Commands::Explain { object } => report(dispatcher.explain_object(object).await),
        Commands::HandleEvent { file } => {
            let payload = read_event(file.as_ref())?;
            report(dispatcher.handle_payload(&payload).await)
        }
        Commands::Health => print_json(&dispatcher.health()),
    }
}
