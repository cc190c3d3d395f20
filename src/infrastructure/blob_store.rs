//! 对象存储抽象
//!
//! 所有读写都针对单个配置好的桶。核心解析逻辑只通过这个 trait 接触存储，
//! 不持有任何凭证或连接状态。

use phf::phf_map;

use crate::error::AppResult;

static CONTENT_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "json" => "application/json",
    "txt" => "text/plain; charset=utf-8",
    "md" => "text/markdown; charset=utf-8",
};

/// 根据对象名后缀推断 content type
pub fn content_type_for(path: &str) -> &'static str {
    path.rsplit_once('.')
        .and_then(|(_, ext)| CONTENT_TYPES.get(ext.to_ascii_lowercase().as_str()))
        .copied()
        .unwrap_or("application/octet-stream")
}

/// 对象存储能力
pub trait BlobStore: Send + Sync {
    /// 桶名（用于日志与健康检查）
    fn bucket(&self) -> &str;

    /// 对象是否存在
    fn exists(&self, path: &str) -> AppResult<bool>;

    /// 对象总字节数
    fn size(&self, path: &str) -> AppResult<u64>;

    /// 读取完整对象
    fn read(&self, path: &str) -> AppResult<Vec<u8>>;

    /// 读取 `[offset, offset + len)` 范围，超出结尾的部分被截断
    fn read_range(&self, path: &str, offset: u64, len: usize) -> AppResult<Vec<u8>>;

    /// 写入（覆盖）对象
    fn write(&self, path: &str, content: &[u8], content_type: &str) -> AppResult<()>;

    /// 读取完整对象并按 UTF-8 解码，非法字节替换为 U+FFFD
    fn read_text(&self, path: &str) -> AppResult<String> {
        let bytes = self.read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// 健康探测：桶是否可访问
    fn probe(&self) -> AppResult<()>;
}
