use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{info, warn};

use super::blob_store::BlobStore;
use crate::error::{AppError, AppResult, StorageError};

/// 以本地目录作为桶的对象存储
///
/// 对象名中的 `/` 对应子目录：`<root>/input/a.txt`
pub struct FsBlobStore {
    root: PathBuf,
    bucket: String,
}

impl FsBlobStore {
    /// 连接桶，探测失败时按指数退避重试
    ///
    /// # 参数
    /// - `root`: 桶对应的目录
    /// - `retries`: 最大尝试次数
    /// - `backoff`: 首次重试前的等待时间，之后每次翻倍
    pub async fn connect(
        root: impl AsRef<Path>,
        retries: u32,
        backoff: Duration,
    ) -> AppResult<Self> {
        let store = Self::new(root);
        let attempts = retries.max(1);
        let mut attempt = 0;

        loop {
            match store.probe() {
                Ok(()) => {
                    info!("✅ 存储已初始化，目标桶: {}", store.bucket);
                    return Ok(store);
                }
                Err(e) => {
                    attempt += 1;
                    warn!("⚠️ 第 {}/{} 次连接失败: {}", attempt, attempts, e);
                    if attempt >= attempts {
                        return Err(StorageError::ConnectFailed {
                            bucket: store.bucket.clone(),
                            attempts,
                            reason: e.to_string(),
                        }
                        .into());
                    }
                    tokio::time::sleep(retry_delay(backoff, attempt)).await;
                }
            }
        }
    }

    /// 不做探测，直接创建
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let bucket = root.display().to_string();
        Self { root, bucket }
    }

    fn object_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn open(&self, path: &str) -> AppResult<File> {
        File::open(self.object_path(path)).map_err(|e| map_read_error(path, e))
    }
}

impl BlobStore for FsBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn exists(&self, path: &str) -> AppResult<bool> {
        Ok(self.object_path(path).is_file())
    }

    fn size(&self, path: &str) -> AppResult<u64> {
        let metadata = self.open(path)?.metadata().map_err(|e| map_read_error(path, e))?;
        Ok(metadata.len())
    }

    fn read(&self, path: &str) -> AppResult<Vec<u8>> {
        fs::read(self.object_path(path)).map_err(|e| map_read_error(path, e))
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> AppResult<Vec<u8>> {
        let mut file = self.open(path)?;
        let size = file.metadata().map_err(|e| map_read_error(path, e))?.len();
        if offset > size {
            return Err(StorageError::RangeOutOfBounds {
                path: path.to_string(),
                offset,
                size,
            }
            .into());
        }

        file.seek(SeekFrom::Start(offset))
            .map_err(|e| map_read_error(path, e))?;
        let mut buf = Vec::with_capacity(len);
        file.take(len as u64)
            .read_to_end(&mut buf)
            .map_err(|e| map_read_error(path, e))?;
        Ok(buf)
    }

    fn write(&self, path: &str, content: &[u8], _content_type: &str) -> AppResult<()> {
        let target = self.object_path(path);
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir).map_err(|e| AppError::write_failed(path, e))?;

        // 同目录临时文件 + rename，单次写入是原子的
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| AppError::write_failed(path, e))?;
        tmp.write_all(content)
            .map_err(|e| AppError::write_failed(path, e))?;
        tmp.persist(&target)
            .map_err(|e| AppError::write_failed(path, e.error))?;
        Ok(())
    }

    fn probe(&self) -> AppResult<()> {
        let metadata = fs::metadata(&self.root).map_err(|e| map_read_error(&self.bucket, e))?;
        if !metadata.is_dir() {
            return Err(AppError::read_failed(
                &self.bucket,
                std::io::Error::new(ErrorKind::Other, "bucket root is not a directory"),
            ));
        }
        Ok(())
    }
}

/// 单次重试等待的上限
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// 第 `attempt` 次失败后的等待时间：`backoff * 2^(attempt-1)`，不超过 `MAX_BACKOFF`
fn retry_delay(backoff: Duration, attempt: u32) -> Duration {
    let factor = 2u32
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    backoff
        .checked_mul(factor)
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

fn map_read_error(path: &str, e: std::io::Error) -> AppError {
    if e.kind() == ErrorKind::NotFound {
        AppError::not_found(path)
    } else {
        AppError::read_failed(path, e)
    }
}
