//! 内存对象存储
//!
//! 满足 `BlobStore` 约定，不依赖任何外部资源；同时记录每次范围读取，
//! 方便验证流式读取是否提前停止。

use std::collections::HashMap;
use std::sync::Mutex;

use super::blob_store::BlobStore;
use crate::error::{AppError, AppResult, StorageError};

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    bucket: String,
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    range_reads: Mutex<Vec<(u64, usize)>>,
}

impl MemoryBlobStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// 写入文本对象（测试辅助）
    pub fn put_text(&self, path: &str, text: &str) {
        self.objects.lock().unwrap().insert(
            path.to_string(),
            (text.as_bytes().to_vec(), "text/plain".to_string()),
        );
    }

    /// 对象的 content type
    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|(_, content_type)| content_type.clone())
    }

    /// 已执行的范围读取 `(offset, len)`
    pub fn range_reads(&self) -> Vec<(u64, usize)> {
        self.range_reads.lock().unwrap().clone()
    }

    /// 当前所有对象名，已排序
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl BlobStore for MemoryBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn exists(&self, path: &str) -> AppResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(path))
    }

    fn size(&self, path: &str) -> AppResult<u64> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|(bytes, _)| bytes.len() as u64)
            .ok_or_else(|| AppError::not_found(path))
    }

    fn read(&self, path: &str) -> AppResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| AppError::not_found(path))
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> AppResult<Vec<u8>> {
        let objects = self.objects.lock().unwrap();
        let (bytes, _) = objects.get(path).ok_or_else(|| AppError::not_found(path))?;
        let size = bytes.len() as u64;
        if offset > size {
            return Err(StorageError::RangeOutOfBounds {
                path: path.to_string(),
                offset,
                size,
            }
            .into());
        }
        self.range_reads.lock().unwrap().push((offset, len));

        let start = offset as usize;
        let end = start.saturating_add(len).min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }

    fn write(&self, path: &str, content: &[u8], content_type: &str) -> AppResult<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (content.to_vec(), content_type.to_string()));
        Ok(())
    }

    fn probe(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_reads_are_recorded() {
        let store = MemoryBlobStore::new("mem");
        store.put_text("input/a.txt", "abcdef");
        assert_eq!(store.read_range("input/a.txt", 4, 10).unwrap(), b"ef");
        assert_eq!(store.range_reads(), vec![(4, 10)]);
        assert_eq!(store.size("input/a.txt").unwrap(), 6);
    }

    #[test]
    fn test_write_keeps_content_type() {
        let store = MemoryBlobStore::new("mem");
        store
            .write("clean/a.json", b"[]", "application/json")
            .unwrap();
        assert_eq!(
            store.content_type("clean/a.json").as_deref(),
            Some("application/json")
        );
        assert_eq!(store.paths(), vec!["clean/a.json".to_string()]);
    }
}
