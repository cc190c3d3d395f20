//! 日志工具模块
//!
//! 提供日志初始化，以及格式化输出的辅助函数

use tracing::{info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// 初始化全局 tracing subscriber
///
/// `RUST_LOG` 优先；未设置时默认 `info`，`verbose` 时为 `debug`。
/// 重复调用只有第一次生效。
///
/// # 参数
/// - `json`: 是否输出 JSON 行
/// - `verbose`: 是否输出调试日志
pub fn init_tracing(json: bool, verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

/// 记录阶段开始信息
///
/// # 参数
/// - `stage`: 阶段名称
/// - `object_name`: 处理的对象
pub fn log_stage_start(stage: &str, object_name: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 {} 开始", stage);
    info!("📄 对象: {}", object_name);
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
///
/// 流式读取时总数未知，所以只记录本批的题号范围
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `first`: 本批第一道题的编号
/// - `last`: 本批最后一道题的编号
pub fn log_batch_start(batch_num: usize, first: usize, last: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {} 批", batch_num);
    info!("📄 本批题目: {}-{}", first, last);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `explained`: 成功生成解释的数量
/// - `total`: 本批题目数量
pub fn log_batch_complete(batch_num: usize, explained: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 第 {} 批完成: 成功 {}/{}", batch_num, explained, total);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `explained`: 成功数量
/// - `placeholders`: 使用占位文本的数量
/// - `total`: 总数
/// - `output_path`: 输出产物路径
pub fn print_final_stats(explained: usize, placeholders: usize, total: usize, output_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", explained, total);
    info!("❌ 占位: {}", placeholders);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
