use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 选项表：大写字母 → 选项内容
pub type Options = BTreeMap<char, String>;

/// 源文档格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// 分隔文本（论坛抓取或 `=` 分隔的整理稿）
    DelimitedText,
    /// 结构化列表（JSON 数组，或包裹数组的对象）
    StructuredList,
}

impl SourceFormat {
    /// 根据对象名和内容开头判断格式
    ///
    /// `.json` 后缀，或首个非空字符是 `{` / `[` 且能解析为 JSON，视为结构化列表
    pub fn detect(object_name: &str, content: &str) -> Self {
        if object_name.to_ascii_lowercase().ends_with(".json") {
            return SourceFormat::StructuredList;
        }
        let trimmed = content.trim_start();
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
        {
            return SourceFormat::StructuredList;
        }
        SourceFormat::DelimitedText
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::DelimitedText => write!(f, "delimited text"),
            SourceFormat::StructuredList => write!(f, "structured list"),
        }
    }
}

/// 候选题目块，只在切分阶段存在
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionBlock {
    /// 原始文本片段
    Text(String),
    /// 结构化列表中的一个元素
    Element(serde_json::Value),
}

impl QuestionBlock {
    pub fn format(&self) -> SourceFormat {
        match self {
            QuestionBlock::Text(_) => SourceFormat::DelimitedText,
            QuestionBlock::Element(_) => SourceFormat::StructuredList,
        }
    }

    /// 原始内容的文本形式，用于留档
    pub fn raw_text(&self) -> String {
        match self {
            QuestionBlock::Text(text) => text.clone(),
            QuestionBlock::Element(serde_json::Value::String(s)) => s.clone(),
            QuestionBlock::Element(value) => value.to_string(),
        }
    }
}

/// 提取器的输出，尚未通过校验、尚未编号
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFields {
    pub question_text: String,
    pub options: Options,
    pub suggested_answer: String,
    pub format: SourceFormat,
    pub raw_source: String,
}

/// 题目记录（输出单元）
///
/// JSON 字段名固定为 `id` / `question` / `options` / `correct`，
/// `raw_source` 仅用于排查，不写入 JSON。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// 文档内序号，从 1 开始
    #[serde(rename = "id")]
    pub number: usize,
    #[serde(rename = "question")]
    pub question_text: String,
    pub options: Options,
    /// 答案字母（逗号分隔）或未找到时的占位值
    #[serde(rename = "correct")]
    pub suggested_answer: String,
    #[serde(skip)]
    pub raw_source: String,
}

impl QuestionRecord {
    pub fn from_candidate(number: usize, candidate: CandidateFields) -> Self {
        Self {
            number,
            question_text: candidate.question_text,
            options: candidate.options,
            suggested_answer: candidate.suggested_answer,
            raw_source: candidate.raw_source,
        }
    }
}

/// 题目 + 生成的解释
#[derive(Debug, Clone, PartialEq)]
pub struct ExplanationRecord {
    pub record: QuestionRecord,
    /// 模型输出，或失败时的占位文本，永不为空
    pub explanation: String,
}
