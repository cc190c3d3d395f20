use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 存储相关错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 触发事件错误
    #[error("事件错误: {0}")]
    Event(#[from] EventError),
    /// JSON 序列化失败
    #[error("JSON序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 存储相关错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 对象不存在
    #[error("对象不存在: {path}")]
    NotFound { path: String },
    /// 读取对象失败
    #[error("读取对象失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入对象失败
    #[error("写入对象失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 读取范围越界
    #[error("读取范围越界 ({path}): offset={offset}, size={size}")]
    RangeOutOfBounds {
        path: String,
        offset: u64,
        size: u64,
    },
    /// 连接存储失败（重试耗尽）
    #[error("连接存储失败 ({bucket})，已尝试 {attempts} 次: {reason}")]
    ConnectFailed {
        bucket: String,
        attempts: u32,
        reason: String,
    },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// HTTP 状态异常
    #[error("LLM服务返回异常状态 ({endpoint}): {status}")]
    BadStatus { endpoint: String, status: u16 },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("无法读取配置文件 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值非法
    #[error("配置项 {name} 的值 '{value}' 非法: {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: String,
    },
}

/// 触发事件错误
#[derive(Debug, Error)]
pub enum EventError {
    /// 事件不是合法 JSON
    #[error("事件负载无法解析: {0}")]
    MalformedPayload(String),
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建对象不存在错误
    pub fn not_found(path: impl Into<String>) -> Self {
        AppError::Storage(StorageError::NotFound { path: path.into() })
    }

    /// 创建对象读取错误
    pub fn read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Storage(StorageError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建对象写入错误
    pub fn write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Storage(StorageError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 是否为"对象不存在"
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Storage(StorageError::NotFound { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AppError::not_found("input/a.txt");
        assert_eq!(err.to_string(), "存储错误: 对象不存在: input/a.txt");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = AppError::write_failed("clean/a.json", io);
        let storage = err.source().expect("存储错误应该有 source");
        assert!(storage.source().is_some());
        assert!(!err.is_not_found());
    }
}
