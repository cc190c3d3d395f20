use std::path::Path;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};

/// 解释服务的后端类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI 兼容的 chat completion 接口
    OpenAi,
    /// 轻量的 `/generate` 文本生成服务
    Http,
}

impl LlmProvider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(LlmProvider::OpenAi),
            "http" => Some(LlmProvider::Http),
            _ => None,
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 存储桶（本地目录）
    pub bucket: String,
    /// 原始题库前缀
    pub input_prefix: String,
    /// 清洗结果前缀
    pub clean_prefix: String,
    /// 解释结果前缀
    pub explained_prefix: String,
    /// 每批生成解释的题目数量
    pub batch_size: usize,
    /// 流式读取的块大小（字节）
    pub chunk_size: usize,
    /// 超过该大小的分隔文本走流式读取
    pub streaming_threshold: u64,
    /// 最多处理的题目数量
    pub max_records: Option<usize>,
    /// 解析阶段未找到答案时的占位值
    pub answer_sentinel: String,
    /// 解释阶段未找到答案时的占位值
    pub explain_answer_sentinel: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 存储连接 ---
    pub connect_retries: u32,
    pub connect_backoff_ms: u64,
    // --- LLM 配置 ---
    pub llm_provider: LlmProvider,
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_generate_url: String,
    pub llm_max_tokens: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket: "./bucket".to_string(),
            input_prefix: "input/".to_string(),
            clean_prefix: "clean/".to_string(),
            explained_prefix: "explained/".to_string(),
            batch_size: 5,
            chunk_size: 1024 * 1024,
            streaming_threshold: 5 * 1024 * 1024,
            max_records: None,
            answer_sentinel: "N/A".to_string(),
            explain_answer_sentinel: "Not found".to_string(),
            verbose_logging: false,
            connect_retries: 3,
            connect_backoff_ms: 1000,
            llm_provider: LlmProvider::OpenAi,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_generate_url: "http://localhost:8080/generate".to_string(),
            llm_max_tokens: 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置，缺省项使用默认值，随后应用环境变量覆盖
    ///
    /// # 参数
    /// - `path`: 配置文件路径
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            })?;
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(self) -> Self {
        Self {
            bucket: env("BUCKET").unwrap_or(self.bucket),
            input_prefix: env("INPUT_PREFIX").unwrap_or(self.input_prefix),
            clean_prefix: env("CLEAN_PREFIX").unwrap_or(self.clean_prefix),
            explained_prefix: env("EXPLAINED_PREFIX").unwrap_or(self.explained_prefix),
            batch_size: parsed("BATCH_SIZE").unwrap_or(self.batch_size),
            chunk_size: parsed("CHUNK_SIZE").unwrap_or(self.chunk_size),
            streaming_threshold: parsed("STREAMING_THRESHOLD").unwrap_or(self.streaming_threshold),
            max_records: parsed("MAX_RECORDS").or(self.max_records),
            answer_sentinel: env("ANSWER_SENTINEL").unwrap_or(self.answer_sentinel),
            explain_answer_sentinel: env("EXPLAIN_ANSWER_SENTINEL")
                .unwrap_or(self.explain_answer_sentinel),
            verbose_logging: parsed("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            connect_retries: parsed("CONNECT_RETRIES").unwrap_or(self.connect_retries),
            connect_backoff_ms: parsed("CONNECT_BACKOFF_MS").unwrap_or(self.connect_backoff_ms),
            llm_provider: env("LLM_PROVIDER")
                .and_then(|v| LlmProvider::parse(&v))
                .unwrap_or(self.llm_provider),
            llm_api_key: env("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: env("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            llm_generate_url: env("LLM_GENERATE_URL").unwrap_or(self.llm_generate_url),
            llm_max_tokens: parsed("LLM_MAX_TOKENS").unwrap_or(self.llm_max_tokens),
        }
    }

    /// 校验会导致流程无法运行的配置
    pub fn validate(&self) -> AppResult<()> {
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "0", "必须大于 0").into());
        }
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size", "0", "必须大于 0").into());
        }
        for (name, prefix) in [
            ("input_prefix", &self.input_prefix),
            ("clean_prefix", &self.clean_prefix),
            ("explained_prefix", &self.explained_prefix),
        ] {
            if !prefix.ends_with('/') {
                return Err(invalid(name, prefix, "必须以 '/' 结尾").into());
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn test_config(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            batch_size: 2,
            chunk_size: 64,
            streaming_threshold: 256,
            connect_retries: 1,
            connect_backoff_ms: 0,
            ..Self::default()
        }
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env(name).and_then(|v| v.parse().ok())
}

fn invalid(name: &str, value: &str, expected: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.answer_sentinel, "N/A");
        assert_eq!(config.explain_answer_sentinel, "Not found");
        assert_eq!(config.chunk_size, 1024 * 1024);
    }

    #[test]
    fn test_from_toml_file_fills_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "batch_size = 3\nllm_provider = \"http\"\nanswer_sentinel = \"Not found\""
        )
        .unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();
        // 环境变量可能覆盖，只检查 TOML 独有的字段
        if std::env::var("BATCH_SIZE").is_err() {
            assert_eq!(config.batch_size, 3);
        }
        if std::env::var("LLM_PROVIDER").is_err() {
            assert_eq!(config.llm_provider, LlmProvider::Http);
        }
        assert_eq!(config.clean_prefix, "clean/");
    }

    #[test]
    fn test_from_toml_file_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "batch_size = [").unwrap();

        let err = Config::from_toml_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("TOML解析失败"));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(LlmProvider::parse("OpenAI"), Some(LlmProvider::OpenAi));
        assert_eq!(LlmProvider::parse("http"), Some(LlmProvider::Http));
        assert_eq!(LlmProvider::parse("local"), None);
    }
}
