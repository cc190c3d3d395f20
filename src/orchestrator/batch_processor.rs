//! 批量解释处理器 - 编排层（阶段 B）
//!
//! ## 职责
//!
//! 1. **打开记录流**：小文件整篇读取，大文件流式读取
//! 2. **分批处理**：每批固定数量的题目，按文档顺序逐题生成解释
//! 3. **逐批落盘**：每批完成后立即追加到解释稿，中断时已完成的批次可读
//! 4. **全局统计**：汇总成功与占位的数量
//!
//! 批次之间严格串行：解释稿是顺序追加的，段落顺序必须和题号一致。

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::BlobStore;
use crate::models::QuestionRecord;
use crate::services::{
    explained_path, generate_or_placeholder, is_placeholder, ArtifactWriter,
    ExplanationGenerator,
};
use crate::utils::logging::{
    log_batch_complete, log_batch_start, log_stage_start, print_final_stats,
};
use crate::workflow::explanation_records;

/// 阶段 B 的统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExplanationStats {
    /// 题目总数
    pub total: usize,
    /// 成功生成解释的数量
    pub explained: usize,
    /// 使用占位文本的数量
    pub placeholders: usize,
    /// 批次数
    pub batches: usize,
}

/// 阶段 B 的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplanationOutcome {
    /// 至少一道题，解释稿已写入
    Explained {
        output_path: String,
        stats: ExplanationStats,
    },
    /// 没有可解释的题目，只写了错误标记
    NoQuestions { marker_path: String },
}

/// 批量解释驱动器
pub struct BatchExplanationDriver<'a> {
    store: &'a dyn BlobStore,
    generator: &'a dyn ExplanationGenerator,
    config: &'a Config,
}

impl<'a> BatchExplanationDriver<'a> {
    pub fn new(
        store: &'a dyn BlobStore,
        generator: &'a dyn ExplanationGenerator,
        config: &'a Config,
    ) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    /// 解释稿路径
    pub fn output_path(&self, object_name: &str) -> String {
        explained_path(object_name, self.config)
    }

    /// 没有题目时的错误标记路径
    pub fn marker_path(&self, object_name: &str) -> String {
        format!("{}.err.txt", self.output_path(object_name))
    }

    /// 为一个整理好的文档生成解释稿
    ///
    /// # 返回
    /// 源对象不存在时返回 `StorageError::NotFound`；单题生成失败不会中断批次；
    /// 没有合格题目时不创建解释稿，返回 `NoQuestions`
    pub async fn run(&self, object_name: &str) -> AppResult<ExplanationOutcome> {
        log_stage_start("阶段 B: 生成解释", object_name);

        if !self.store.exists(object_name)? {
            return Err(AppError::not_found(object_name));
        }

        let output_path = self.output_path(object_name);
        let (ctx, records) = explanation_records(self.store, object_name, self.config)?;
        let mut records = records.peekable();
        let writer = ArtifactWriter::new(self.store);

        if records.peek().is_none() {
            let marker_path = self.marker_path(object_name);
            writer.write_error_marker(&marker_path)?;
            warn!("⚠️ {} 中没有可解释的题目，已写入错误标记: {}", ctx, marker_path);
            return Ok(ExplanationOutcome::NoQuestions { marker_path });
        }

        info!("{} 使用生成器: {}", ctx, self.generator.name());
        writer.start_explanations(&output_path, object_name, ctx.format)?;

        let batch_size = self.config.batch_size.max(1);
        let mut stats = ExplanationStats::default();

        loop {
            let batch: Vec<QuestionRecord> = records
                .by_ref()
                .take(batch_size)
                .collect::<AppResult<_>>()?;
            let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
                break;
            };

            stats.batches += 1;
            log_batch_start(stats.batches, first.number, last.number);

            let mut explained = Vec::with_capacity(batch.len());
            for record in &batch {
                let item = generate_or_placeholder(self.generator, record).await;
                if is_placeholder(&item.explanation) {
                    stats.placeholders += 1;
                } else {
                    stats.explained += 1;
                }
                explained.push(item);
            }

            writer.append_batch(&output_path, &explained)?;
            stats.total += batch.len();

            let batch_ok = explained
                .iter()
                .filter(|item| !is_placeholder(&item.explanation))
                .count();
            log_batch_complete(stats.batches, batch_ok, batch.len());
        }

        print_final_stats(stats.explained, stats.placeholders, stats.total, &output_path);

        Ok(ExplanationOutcome::Explained { output_path, stats })
    }
}
