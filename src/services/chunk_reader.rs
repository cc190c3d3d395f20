//! 大文件流式切分
//!
//! 按固定大小的字节范围读取对象，在缓冲区里寻找分隔线，
//! 切出完整的段落后立即交出。调用方停止迭代后不会再读取后续范围。

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::error::AppResult;
use crate::infrastructure::BlobStore;
use crate::models::QuestionBlock;
use crate::services::segmenter::{keep_section, DELIMITER};

/// 流式块读取器
///
/// 产出顺序和 [`split_by_delimiter`](crate::services::segmenter::split_by_delimiter)
/// 对整篇文本的切分结果一致，与块大小无关。
pub struct StreamingChunkReader<'a> {
    store: &'a dyn BlobStore,
    path: String,
    size: u64,
    offset: u64,
    chunk_size: usize,
    /// 已解码、尚未切出的文本
    buffer: String,
    /// 块末尾不完整的 UTF-8 字节，留给下一块
    pending_bytes: Vec<u8>,
    /// 缓冲区中此位置之前不可能再出现分隔线的起点
    scan_start: usize,
    ready: VecDeque<QuestionBlock>,
    chunks_read: usize,
    finished: bool,
}

impl<'a> StreamingChunkReader<'a> {
    /// 创建读取器（只查询对象大小，不读取内容）
    pub fn new(store: &'a dyn BlobStore, path: &str, chunk_size: usize) -> AppResult<Self> {
        let size = store.size(path)?;
        info!(
            "📦 流式读取 {} ({} 字节, 块大小 {})",
            path, size, chunk_size
        );
        Ok(Self {
            store,
            path: path.to_string(),
            size,
            offset: 0,
            chunk_size: chunk_size.max(1),
            buffer: String::new(),
            pending_bytes: Vec::new(),
            scan_start: 0,
            ready: VecDeque::new(),
            chunks_read: 0,
            finished: false,
        })
    }

    /// 已读取的块数
    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    fn read_next_chunk(&mut self) -> AppResult<()> {
        let bytes = self
            .store
            .read_range(&self.path, self.offset, self.chunk_size)?;
        self.chunks_read += 1;

        if bytes.is_empty() {
            // 对象在读取过程中变短，视为已到结尾
            self.offset = self.size;
            return Ok(());
        }
        self.offset += bytes.len() as u64;
        debug!(
            "读取第 {} 块: {} 字节, 进度 {}/{}",
            self.chunks_read,
            bytes.len(),
            self.offset,
            self.size
        );

        self.pending_bytes.extend_from_slice(&bytes);
        decode_into(&mut self.pending_bytes, &mut self.buffer);
        self.drain_sections();
        Ok(())
    }

    /// 切出缓冲区里所有完整的段落，每块只整理一次缓冲区
    fn drain_sections(&mut self) {
        let mut cursor = 0;
        let mut from = self.scan_start;
        while let Some(found) = self.buffer[from..].find(DELIMITER) {
            let pos = from + found;
            if let Some(section) = keep_section(&self.buffer[cursor..pos]) {
                self.ready.push_back(QuestionBlock::Text(section));
            }
            cursor = pos + DELIMITER.len();
            from = cursor;
        }
        self.buffer.drain(..cursor);

        // 末尾可能是半条分隔线，下次从那里开始找
        let mut next = self.buffer.len().saturating_sub(DELIMITER.len() - 1);
        while !self.buffer.is_char_boundary(next) {
            next -= 1;
        }
        self.scan_start = next;
    }

    /// 读到结尾后，剩余缓冲区作为最后一段
    fn flush(&mut self) {
        if !self.pending_bytes.is_empty() {
            self.buffer
                .push_str(&String::from_utf8_lossy(&self.pending_bytes));
            self.pending_bytes.clear();
        }
        let rest = std::mem::take(&mut self.buffer);
        if let Some(section) = keep_section(&rest) {
            self.ready.push_back(QuestionBlock::Text(section));
        }
        self.finished = true;
    }
}

impl Iterator for StreamingChunkReader<'_> {
    type Item = AppResult<QuestionBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(block) = self.ready.pop_front() {
                return Some(Ok(block));
            }
            if self.finished {
                return None;
            }
            if self.offset >= self.size {
                self.flush();
                continue;
            }
            if let Err(e) = self.read_next_chunk() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

/// 把字节解码进文本缓冲区
///
/// 中间的非法字节替换为 U+FFFD；末尾不完整的多字节序列留在 `pending` 中。
fn decode_into(pending: &mut Vec<u8>, buffer: &mut String) {
    loop {
        match std::str::from_utf8(&pending[..]) {
            Ok(text) => {
                buffer.push_str(text);
                pending.clear();
                return;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                // valid_up_to 之前保证是合法 UTF-8
                buffer.push_str(&String::from_utf8_lossy(&pending[..valid]));
                match e.error_len() {
                    Some(bad) => {
                        buffer.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid + bad);
                    }
                    None => {
                        pending.drain(..valid);
                        return;
                    }
                }
            }
        }
    }
}
