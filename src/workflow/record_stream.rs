//! 记录流 - 流程层
//!
//! 把"块来源 → 提取 → 校验编号"串成一个惰性迭代器。
//! 块来源可以是整篇切分好的块，也可以是流式读取器；
//! 达到记录上限后立即停止，不再拉取下一个块。

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::BlobStore;
use crate::models::{QuestionBlock, QuestionRecord, SourceFormat};
use crate::services::segmenter::{split_by_delimiter, split_by_headers, split_structured};
use crate::services::{FieldExtractor, RecordValidator, StreamingChunkReader};
use crate::workflow::document_ctx::DocumentCtx;

/// 判断大文件格式时预读的字节数
const PEEK_LEN: usize = 1024;

type BlockSource<'a> = Box<dyn Iterator<Item = AppResult<QuestionBlock>> + Send + 'a>;

/// 惰性记录流
///
/// 单向、不可重启。产出的记录编号从 1 开始连续递增。
pub struct RecordStream<'a> {
    blocks: BlockSource<'a>,
    extractor: FieldExtractor,
    validator: RecordValidator,
    max_records: Option<usize>,
    done: bool,
}

impl<'a> RecordStream<'a> {
    /// 基于已切分好的块
    pub fn from_blocks(
        blocks: Vec<QuestionBlock>,
        extractor: FieldExtractor,
        max_records: Option<usize>,
    ) -> Self {
        let source = blocks.into_iter().map(Ok::<QuestionBlock, AppError>);
        Self::with_source(Box::new(source), extractor, max_records)
    }

    /// 基于流式读取器
    pub fn streaming(
        reader: StreamingChunkReader<'a>,
        extractor: FieldExtractor,
        max_records: Option<usize>,
    ) -> Self {
        Self::with_source(Box::new(reader), extractor, max_records)
    }

    fn with_source(
        blocks: BlockSource<'a>,
        extractor: FieldExtractor,
        max_records: Option<usize>,
    ) -> Self {
        Self {
            blocks,
            extractor,
            validator: RecordValidator::new(),
            max_records,
            done: false,
        }
    }

    /// 已接受的记录数
    pub fn accepted(&self) -> usize {
        self.validator.accepted()
    }

    /// 被丢弃的候选块数
    pub fn rejected(&self) -> usize {
        self.validator.rejected()
    }

    fn limit_reached(&self) -> bool {
        match self.max_records {
            Some(max) => self.validator.accepted() >= max,
            None => false,
        }
    }
}

impl Iterator for RecordStream<'_> {
    type Item = AppResult<QuestionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.limit_reached() {
            debug!("达到记录上限 {:?}，停止读取", self.max_records);
            self.done = true;
            return None;
        }

        loop {
            match self.blocks.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(block)) => {
                    let candidate = self.extractor.extract(&block);
                    if let Some(record) = self.validator.accept(candidate) {
                        return Some(Ok(record));
                    }
                }
            }
        }
    }
}

/// 打开阶段 A 的记录流
///
/// 整篇读取。分隔文本按章节标题切分，结构化列表按元素切分。
pub fn extraction_records<'a>(
    store: &'a dyn BlobStore,
    object_name: &str,
    config: &Config,
) -> AppResult<(DocumentCtx, RecordStream<'a>)> {
    let raw = store.read_text(object_name)?;
    let format = SourceFormat::detect(object_name, &raw);
    let blocks = match format {
        SourceFormat::StructuredList => split_structured(&raw),
        SourceFormat::DelimitedText => split_by_headers(&raw),
    };

    let ctx = DocumentCtx::new(object_name, format, raw.len() as u64, false);
    info!("{} 切分得到 {} 个候选块", ctx, blocks.len());
    let extractor = FieldExtractor::new(config.answer_sentinel.clone());
    Ok((ctx, RecordStream::from_blocks(blocks, extractor, config.max_records)))
}

/// 打开阶段 B 的记录流
///
/// 超过流式阈值、且开头不像 JSON 的分隔文本走流式读取；
/// 其余整篇读取，按分隔线或列表元素切分。
pub fn explanation_records<'a>(
    store: &'a dyn BlobStore,
    object_name: &str,
    config: &Config,
) -> AppResult<(DocumentCtx, RecordStream<'a>)> {
    let size = store.size(object_name)?;
    let extractor = FieldExtractor::new(config.explain_answer_sentinel.clone());
    let json_name = object_name.to_ascii_lowercase().ends_with(".json");

    if !json_name && size > config.streaming_threshold && !looks_like_json(store, object_name)? {
        let reader = StreamingChunkReader::new(store, object_name, config.chunk_size)?;
        let ctx = DocumentCtx::new(object_name, SourceFormat::DelimitedText, size, true);
        info!("{} 超过流式阈值 {} 字节", ctx, config.streaming_threshold);
        return Ok((ctx, RecordStream::streaming(reader, extractor, config.max_records)));
    }

    let raw = store.read_text(object_name)?;
    let format = SourceFormat::detect(object_name, &raw);
    let blocks = match format {
        SourceFormat::StructuredList => split_structured(&raw),
        SourceFormat::DelimitedText => split_by_delimiter(&raw),
    };

    let ctx = DocumentCtx::new(object_name, format, size, false);
    info!("{} 切分得到 {} 个候选块", ctx, blocks.len());
    Ok((ctx, RecordStream::from_blocks(blocks, extractor, config.max_records)))
}

/// 预读开头，首个非空字符是 `{` 或 `[` 即视为可能的 JSON
fn looks_like_json(store: &dyn BlobStore, object_name: &str) -> AppResult<bool> {
    let head = store.read_range(object_name, 0, PEEK_LEN)?;
    let head = String::from_utf8_lossy(&head);
    Ok(matches!(head.trim_start().chars().next(), Some('{' | '[')))
}
