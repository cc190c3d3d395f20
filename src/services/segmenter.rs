//! 题目块切分
//!
//! 三种切分规则，分别服务不同阶段，不能混用：
//! - `split_by_headers`：解析阶段，按论坛抓取稿里反复出现的
//!   `## ... topic ... question ... discussion` 标题切分
//! - `split_by_delimiter`：解释阶段，按 61 个 `=` 的分隔线切分
//! - `split_structured`：结构化 JSON 列表，每个元素一个块

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::QuestionBlock;

/// 整理稿中题目之间的分隔线
pub const DELIMITER: &str = "=============================================================";

/// 分隔段落的最小长度（去掉首尾空白后），更短的视为噪声丢弃
pub const MIN_SECTION_LEN: usize = 50;

/// 包裹列表的常见键，按优先级排列
const LIST_KEYS: [&str; 3] = ["questions", "items", "data"];

static SECTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)#{2,}.*?topic.*?question.*?discussion").unwrap());

/// 按章节标题切分原始抓取稿
///
/// 每个标题被视为题目之间的边界，非空片段即为候选块。没有任何标题时，
/// 整篇文档作为唯一的候选块，能否成为题目交给提取与校验决定。
pub fn split_by_headers(raw: &str) -> Vec<QuestionBlock> {
    let blocks: Vec<QuestionBlock> = SECTION_HEADER
        .split(raw)
        .filter(|segment| !segment.trim().is_empty())
        .map(|segment| QuestionBlock::Text(segment.to_string()))
        .collect();

    debug!("按章节标题切分得到 {} 个候选块", blocks.len());
    blocks
}

/// 按 61 个 `=` 的分隔线切分整理稿
///
/// 去掉首尾空白后不超过 `MIN_SECTION_LEN` 的段落被丢弃。
pub fn split_by_delimiter(raw: &str) -> Vec<QuestionBlock> {
    raw.split(DELIMITER)
        .filter_map(keep_section)
        .map(QuestionBlock::Text)
        .collect()
}

/// 噪声过滤：保留足够长的段落（原文，不做清洗）
pub(crate) fn keep_section(section: &str) -> Option<String> {
    if section.trim().chars().count() > MIN_SECTION_LEN {
        Some(section.to_string())
    } else {
        None
    }
}

/// 按结构化列表切分
///
/// - 顶层是数组：直接使用
/// - 顶层是对象：依次尝试 `questions` / `items` / `data`，再退回第一个数组值
/// - 其他情况或 JSON 非法：返回空
pub fn split_structured(raw: &str) -> Vec<QuestionBlock> {
    let document: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("⚠️ JSON 解析失败，无法切分: {}", e);
            return Vec::new();
        }
    };

    let list = match document {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let key = LIST_KEYS
                .iter()
                .find(|key| map.get(**key).is_some_and(Value::is_array))
                .map(|key| key.to_string())
                .or_else(|| {
                    map.iter()
                        .find(|(_, value)| value.is_array())
                        .map(|(key, _)| key.clone())
                });
            match key.and_then(|key| map.remove(&key)) {
                Some(Value::Array(items)) => items,
                _ => {
                    warn!("⚠️ JSON 对象中没有找到题目列表");
                    return Vec::new();
                }
            }
        }
        _ => {
            warn!("⚠️ JSON 顶层既不是数组也不是对象");
            return Vec::new();
        }
    };

    list.into_iter().map(QuestionBlock::Element).collect()
}
