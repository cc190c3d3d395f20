//! 题目提取流程 - 流程层（阶段 A）
//!
//! 流程顺序：
//! 1. 读取 `input/` 下的原始文档
//! 2. 切分 → 提取 → 校验编号
//! 3. 有记录：写 JSON 与整理稿；没有记录：写错误标记

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::BlobStore;
use crate::models::QuestionRecord;
use crate::services::{ArtifactWriter, CleanPaths};
use crate::utils::logging::log_stage_start;
use crate::workflow::record_stream::extraction_records;

/// 阶段 A 的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// 解析出至少一道题
    Parsed {
        json_path: String,
        text_path: String,
        questions: usize,
    },
    /// 没有可提取的内容，已写错误标记
    NoQuestions { marker_path: String },
}

/// 题目提取流程
///
/// - 不持有存储资源，只借用
/// - 不关心事件从哪里来
pub struct ExtractionFlow<'a> {
    store: &'a dyn BlobStore,
    config: &'a Config,
}

impl<'a> ExtractionFlow<'a> {
    pub fn new(store: &'a dyn BlobStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// 阶段 A 的产物路径
    pub fn paths(&self, object_name: &str) -> CleanPaths {
        CleanPaths::for_input(object_name, self.config)
    }

    /// 处理一个原始文档
    ///
    /// # 返回
    /// 源对象不存在时返回 `StorageError::NotFound`；
    /// 解析不出题目不算错误，返回 `NoQuestions`
    pub fn run(&self, object_name: &str) -> AppResult<ExtractionOutcome> {
        log_stage_start("阶段 A: 题目提取", object_name);

        if !self.store.exists(object_name)? {
            return Err(AppError::not_found(object_name));
        }

        let (ctx, mut stream) = extraction_records(self.store, object_name, self.config)?;
        let records: Vec<QuestionRecord> = stream.by_ref().collect::<AppResult<_>>()?;
        info!(
            "{} 解析完成: {} 道题, 丢弃 {} 个候选块",
            ctx,
            records.len(),
            stream.rejected()
        );

        let paths = self.paths(object_name);
        let writer = ArtifactWriter::new(self.store);

        if records.is_empty() {
            writer.write_error_marker(&paths.error_marker)?;
            warn!("⚠️ 没有解析出题目，已写入错误标记: {}", paths.error_marker);
            return Ok(ExtractionOutcome::NoQuestions {
                marker_path: paths.error_marker,
            });
        }

        writer.write_records_json(&paths.json, &records)?;
        info!("💾 已保存 JSON: {}", paths.json);
        writer.write_records_text(&paths.text, &records)?;
        info!("💾 已保存整理稿: {}", paths.text);

        Ok(ExtractionOutcome::Parsed {
            json_path: paths.json,
            text_path: paths.text,
            questions: records.len(),
        })
    }
}
