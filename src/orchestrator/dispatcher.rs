//! 事件分发器 - 编排层
//!
//! ## 职责
//!
//! - 持有存储与生成器（唯一的资源所有者）
//! - 把存储事件归一化、按前缀路由到阶段 A 或阶段 B
//! - 输出已存在时跳过，保证重复投递是幂等的
//! - 提供健康检查
//!
//! 事件里的桶名只用于日志，读写永远针对配置的桶。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, EventError, StorageError};
use crate::infrastructure::{BlobStore, FsBlobStore};
use crate::models::{ObjectRoute, StorageEvent};
use crate::orchestrator::batch_processor::{BatchExplanationDriver, ExplanationOutcome};
use crate::services::artifact_writer::NO_QUESTIONS_MARKER;
use crate::services::{generator_from_config, ExplanationGenerator};
use crate::utils::logging::truncate_text;
use crate::workflow::{ExtractionFlow, ExtractionOutcome};

/// 一次调用的结果，序列化时以 `status` 区分
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// 处理成功
    Success {
        input_file: String,
        outputs: Vec<String>,
        questions: usize,
    },
    /// 处理完成但没有解析出题目
    Completed {
        input_file: String,
        questions: usize,
        error: String,
    },
    /// 无关事件
    Ignored { reason: String },
    /// 输出已存在
    Skipped {
        input_file: String,
        output_file: String,
    },
}

impl Outcome {
    fn ignored(reason: &str) -> Self {
        Outcome::Ignored {
            reason: reason.to_string(),
        }
    }
}

/// 健康检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub bucket: String,
    pub storage_client: String,
    pub storage_access: String,
}

/// 失败时对外的错误描述
pub fn error_report(err: &AppError) -> Value {
    let kind = match err {
        AppError::Storage(StorageError::NotFound { .. }) => "Resource not found",
        AppError::Storage(StorageError::ConnectFailed { .. }) => "Storage client not initialized",
        AppError::Config(_) => "Invalid configuration",
        _ => "Internal server error",
    };
    json!({ "error": kind, "details": err.to_string() })
}

/// 事件分发器
pub struct Dispatcher {
    config: Config,
    store: Option<Arc<dyn BlobStore>>,
    generator: Box<dyn ExplanationGenerator>,
}

impl Dispatcher {
    /// 使用现成的存储与生成器
    pub fn new(
        config: Config,
        store: Arc<dyn BlobStore>,
        generator: Box<dyn ExplanationGenerator>,
    ) -> Self {
        Self {
            config,
            store: Some(store),
            generator,
        }
    }

    /// 连接配置的桶（带重试），生成器按配置选择
    ///
    /// 连接失败不会返回错误：分发器仍然创建，健康检查报告 `unhealthy`，
    /// 处理请求时返回存储未初始化错误。
    pub async fn connect(config: Config) -> Self {
        let generator = generator_from_config(&config);
        let backoff = Duration::from_millis(config.connect_backoff_ms);
        let store = match FsBlobStore::connect(&config.bucket, config.connect_retries, backoff).await
        {
            Ok(store) => Some(Arc::new(store) as Arc<dyn BlobStore>),
            Err(e) => {
                error!("❌ 存储初始化失败: {}", e);
                None
            }
        };

        Self {
            config,
            store,
            generator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn store(&self) -> AppResult<&dyn BlobStore> {
        self.store.as_deref().ok_or_else(|| {
            StorageError::ConnectFailed {
                bucket: self.config.bucket.clone(),
                attempts: self.config.connect_retries,
                reason: "Storage client not initialized".to_string(),
            }
            .into()
        })
    }

    /// 处理原始事件文本
    ///
    /// 无法解析的负载按无关事件处理，不返回错误。
    pub async fn handle_payload(&self, payload: &str) -> AppResult<Outcome> {
        info!("{}", "=".repeat(60));
        info!("📥 收到事件: {}", truncate_text(payload.trim(), 1000));
        info!("{}", "=".repeat(60));

        match parse_payload(payload) {
            Ok(value) => self.handle_event(&value).await,
            Err(e) => {
                warn!("⚠️ {}", e);
                Ok(Outcome::ignored("Malformed event payload"))
            }
        }
    }

    /// 处理已解析的事件
    pub async fn handle_event(&self, payload: &Value) -> AppResult<Outcome> {
        let event = StorageEvent::from_json(payload);
        let Some(object_name) = event.object() else {
            warn!("⚠️ 事件中没有桶或对象信息");
            return Ok(Outcome::ignored("No bucket/object in event"));
        };

        info!("🪣 事件桶: {:?}", event.bucket);
        info!("📄 对象: {}", object_name);
        info!("🎯 目标桶: {}", self.config.bucket);

        match ObjectRoute::for_object(object_name, &self.config) {
            ObjectRoute::Extract => self.parse_object(object_name),
            ObjectRoute::Explain => self.explain_object(object_name).await,
            ObjectRoute::Ignore(reason) => {
                info!("⏭️ 跳过 {}: {}", object_name, reason);
                Ok(Outcome::ignored(reason))
            }
        }
    }

    /// 阶段 A：解析原始文档
    pub fn parse_object(&self, object_name: &str) -> AppResult<Outcome> {
        let store = self.store()?;
        let flow = ExtractionFlow::new(store, &self.config);

        let paths = flow.paths(object_name);
        if store.exists(&paths.json)? {
            info!("⏭️ 输出已存在，跳过: {}", paths.json);
            return Ok(Outcome::Skipped {
                input_file: object_name.to_string(),
                output_file: paths.json,
            });
        }

        let outcome = match flow.run(object_name)? {
            ExtractionOutcome::Parsed {
                json_path,
                text_path,
                questions,
            } => Outcome::Success {
                input_file: object_name.to_string(),
                outputs: vec![json_path, text_path],
                questions,
            },
            ExtractionOutcome::NoQuestions { .. } => Outcome::Completed {
                input_file: object_name.to_string(),
                questions: 0,
                error: NO_QUESTIONS_MARKER.to_string(),
            },
        };
        info!("✅ 处理完成: {}", object_name);
        Ok(outcome)
    }

    /// 阶段 B：为整理好的文档生成解释
    pub async fn explain_object(&self, object_name: &str) -> AppResult<Outcome> {
        let store = self.store()?;
        let driver = BatchExplanationDriver::new(store, self.generator.as_ref(), &self.config);

        let output_path = driver.output_path(object_name);
        if store.exists(&output_path)? {
            info!("⏭️ 输出已存在，跳过: {}", output_path);
            return Ok(Outcome::Skipped {
                input_file: object_name.to_string(),
                output_file: output_path,
            });
        }

        let outcome = match driver.run(object_name).await? {
            ExplanationOutcome::Explained { output_path, stats } => Outcome::Success {
                input_file: object_name.to_string(),
                outputs: vec![output_path],
                questions: stats.total,
            },
            ExplanationOutcome::NoQuestions { .. } => Outcome::Completed {
                input_file: object_name.to_string(),
                questions: 0,
                error: NO_QUESTIONS_MARKER.to_string(),
            },
        };
        info!("✅ 处理完成: {}", object_name);
        Ok(outcome)
    }

    /// 健康检查：存储是否初始化、桶是否可访问
    pub fn health(&self) -> HealthReport {
        let (storage_client, storage_access) = match &self.store {
            Some(store) => (
                "initialized",
                match store.probe() {
                    Ok(()) => "ok".to_string(),
                    Err(e) => format!("error: {}", e),
                },
            ),
            None => ("not initialized", "error: storage client not initialized".to_string()),
        };
        let healthy = self.store.is_some() && storage_access == "ok";

        HealthReport {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            bucket: self.config.bucket.clone(),
            storage_client: storage_client.to_string(),
            storage_access,
        }
    }
}

fn parse_payload(payload: &str) -> Result<Value, EventError> {
    if payload.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| EventError::MalformedPayload(e.to_string()))?;
    if !value.is_object() {
        return Err(EventError::MalformedPayload(
            "event payload is not a JSON object".to_string(),
        ));
    }
    Ok(value)
}
