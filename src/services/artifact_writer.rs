//! 产物写入服务 - 业务能力层
//!
//! 只负责"把记录写成产物"能力：JSON、整理稿、错误标记、解释稿。
//! 路径推导也在这里，流程层只拿到现成的路径。

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{content_type_for, BlobStore};
use crate::models::{ExplanationRecord, QuestionRecord, SourceFormat};
use crate::services::segmenter::DELIMITER;

/// 没有解析出任何题目时，错误标记的内容
pub const NO_QUESTIONS_MARKER: &str = "No questions parsed";

const EXPLANATION_TITLE: &str = "AI-GENERATED EXPLANATIONS";

/// 阶段 A 的三个产物路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanPaths {
    /// `clean/<path>.json`
    pub json: String,
    /// `clean/<path>_clean.txt`
    pub text: String,
    /// `clean/<path>.<ext>.err.txt`
    pub error_marker: String,
}

impl CleanPaths {
    /// 由 `input/` 下的对象名推导
    pub fn for_input(object_name: &str, config: &Config) -> Self {
        let relative = object_name
            .strip_prefix(&config.input_prefix)
            .unwrap_or(object_name);
        let base = format!("{}{}", config.clean_prefix, relative);
        let stem = strip_extension(&base);
        Self {
            json: format!("{}.json", stem),
            text: format!("{}_clean.txt", stem),
            error_marker: format!("{}.err.txt", base),
        }
    }
}

/// 阶段 B 的产物路径：`clean/<path>` → `explained/<path>.txt`
pub fn explained_path(object_name: &str, config: &Config) -> String {
    let relative = object_name
        .strip_prefix(&config.clean_prefix)
        .unwrap_or(object_name);
    format!("{}{}.txt", config.explained_prefix, relative)
}

/// 去掉最后一个 `.` 之后的扩展名（只看文件名部分）
fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..file_start + dot],
        _ => path,
    }
}

/// 整理稿文本
///
/// 每道题：`Question N:`、题干、`Options:`、按字母排序的选项、两条分隔线、
/// `Suggested Answer: X`。片段之间用换行连接。
pub fn render_records_text(records: &[QuestionRecord]) -> String {
    let mut pieces = Vec::new();
    for record in records {
        pieces.push(format!(
            "Question {}:\n{}\n\nOptions:\n",
            record.number, record.question_text
        ));
        for (letter, text) in &record.options {
            pieces.push(format!("{}. {}\n", letter, text));
        }
        pieces.push(DELIMITER.to_string());
        pieces.push(DELIMITER.to_string());
        pieces.push(format!("Suggested Answer: {}\n\n", record.suggested_answer));
    }
    pieces.join("\n")
}

/// 解释稿的头部
pub fn render_explanation_header(
    source: &str,
    format: SourceFormat,
    generated_at: DateTime<Utc>,
) -> String {
    format!(
        "{rule}\n{title}\n{rule}\nGenerated: {time}\nSource: {source}\nFormat: {format}\n{rule}\n\n",
        rule = DELIMITER,
        title = EXPLANATION_TITLE,
        time = generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        source = source,
        format = format,
    )
}

/// 单道题的解释段落
pub fn render_section(item: &ExplanationRecord) -> String {
    let record = &item.record;
    let mut section = format!(
        "{}\nQuestion {}:\n{}\n\n",
        DELIMITER, record.number, record.question_text
    );
    if !record.options.is_empty() {
        section.push_str("Options:\n");
        for (letter, text) in &record.options {
            section.push_str(&format!("{}. {}\n", letter, text));
        }
        section.push('\n');
    }
    section.push_str(&format!(
        "Suggested Answer: {}\n\nExplanation:\n{}\n\n",
        record.suggested_answer, item.explanation
    ));
    section
}

/// 产物写入服务
///
/// 职责：
/// - 序列化记录并写入桶
/// - 解释稿按批次追加
/// - 不关心记录从哪里来
pub struct ArtifactWriter<'a> {
    store: &'a dyn BlobStore,
}

impl<'a> ArtifactWriter<'a> {
    pub fn new(store: &'a dyn BlobStore) -> Self {
        Self { store }
    }

    /// 写入 JSON 产物（缩进两格）
    pub fn write_records_json(&self, path: &str, records: &[QuestionRecord]) -> AppResult<()> {
        let content = serde_json::to_string_pretty(records)?;
        self.store
            .write(path, content.as_bytes(), content_type_for(path))?;
        debug!("写入 JSON: {} ({} 条)", path, records.len());
        Ok(())
    }

    /// 写入整理稿
    pub fn write_records_text(&self, path: &str, records: &[QuestionRecord]) -> AppResult<()> {
        let content = render_records_text(records);
        self.store
            .write(path, content.as_bytes(), content_type_for(path))?;
        debug!("写入整理稿: {}", path);
        Ok(())
    }

    /// 写入错误标记
    pub fn write_error_marker(&self, path: &str) -> AppResult<()> {
        self.store
            .write(path, NO_QUESTIONS_MARKER.as_bytes(), content_type_for(path))
    }

    /// 创建（覆盖）解释稿，只含头部
    pub fn start_explanations(
        &self,
        path: &str,
        source: &str,
        format: SourceFormat,
    ) -> AppResult<()> {
        let header = render_explanation_header(source, format, Utc::now());
        self.store
            .write(path, header.as_bytes(), content_type_for(path))
    }

    /// 把一个批次追加到解释稿末尾
    ///
    /// 读出已有内容、拼接、整体写回。同一路径同一时间只允许一个写入者。
    pub fn append_batch(&self, path: &str, batch: &[ExplanationRecord]) -> AppResult<()> {
        let mut content = if self.store.exists(path)? {
            self.store.read_text(path)?
        } else {
            String::new()
        };
        for item in batch {
            content.push_str(&render_section(item));
        }
        self.store
            .write(path, content.as_bytes(), content_type_for(path))?;
        debug!("追加 {} 条解释到 {}", batch.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryBlobStore;
    use crate::models::Options;
    use chrono::TimeZone;

    fn record(number: usize) -> QuestionRecord {
        let mut options = Options::new();
        options.insert('B', "Refraction".to_string());
        options.insert('A', "Rayleigh scattering".to_string());
        QuestionRecord {
            number,
            question_text: "Why is the sky blue?".to_string(),
            options,
            suggested_answer: "A".to_string(),
            raw_source: String::new(),
        }
    }

    #[test]
    fn test_clean_paths() {
        let config = Config::default();
        let paths = CleanPaths::for_input("input/az900/dump.txt", &config);
        assert_eq!(paths.json, "clean/az900/dump.json");
        assert_eq!(paths.text, "clean/az900/dump_clean.txt");
        assert_eq!(paths.error_marker, "clean/az900/dump.txt.err.txt");

        let bare = CleanPaths::for_input("input/v1.2/noext", &config);
        assert_eq!(bare.json, "clean/v1.2/noext.json");
    }

    #[test]
    fn test_explained_path() {
        let config = Config::default();
        assert_eq!(explained_path("clean/a/dump.json", &config), "explained/a/dump.json.txt");
    }

    #[test]
    fn test_render_records_text_layout() {
        let text = render_records_text(&[record(1)]);
        let expected = format!(
            "Question 1:\nWhy is the sky blue?\n\nOptions:\n\nA. Rayleigh scattering\n\nB. Refraction\n\n{d}\n{d}\nSuggested Answer: A\n\n",
            d = DELIMITER
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_header_contains_metadata() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let header = render_explanation_header("clean/a.json", SourceFormat::StructuredList, at);
        assert!(header.starts_with(DELIMITER));
        assert!(header.contains("Generated: 2024-05-01 12:30:00 UTC"));
        assert!(header.contains("Source: clean/a.json"));
        assert!(header.contains("Format: structured list"));
    }

    #[test]
    fn test_append_batch_accumulates_in_order() {
        let store = MemoryBlobStore::new("mem");
        let writer = ArtifactWriter::new(&store);
        let path = "explained/a.json.txt";

        writer
            .start_explanations(path, "clean/a.json", SourceFormat::StructuredList)
            .unwrap();
        for number in 1..=3 {
            let item = ExplanationRecord {
                record: record(number),
                explanation: format!("explanation {}", number),
            };
            writer.append_batch(path, &[item]).unwrap();
        }

        let content = store.read_text(path).unwrap();
        let first = content.find("Question 1:").unwrap();
        let second = content.find("Question 2:").unwrap();
        let third = content.find("Question 3:").unwrap();
        assert!(first < second && second < third);
        assert!(content.contains("Explanation:\nexplanation 2\n"));
        assert_eq!(store.content_type(path).as_deref(), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_json_and_marker() {
        let store = MemoryBlobStore::new("mem");
        let writer = ArtifactWriter::new(&store);
        writer.write_records_json("clean/a.json", &[record(1)]).unwrap();
        writer.write_error_marker("clean/b.txt.err.txt").unwrap();

        let parsed: Vec<QuestionRecord> =
            serde_json::from_str(&store.read_text("clean/a.json").unwrap()).unwrap();
        assert_eq!(parsed[0].question_text, "Why is the sky blue?");
        assert_eq!(store.read_text("clean/b.txt.err.txt").unwrap(), NO_QUESTIONS_MARKER);
    }
}
