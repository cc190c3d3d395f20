//! 解释生成服务 - 业务能力层
//!
//! 只负责"给一道题生成解释"能力，不关心批次与输出格式
//!
//! ## 技术栈
//! - `OpenAiExplainer`：`async-openai`，兼容 OpenAI API 的服务
//! - `HttpExplainer`：`reqwest`，轻量模型服务的 `POST /generate` 接口

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Config, LlmProvider};
use crate::error::{AppError, AppResult, LlmError};
use crate::models::{ExplanationRecord, QuestionRecord};

const SYSTEM_MESSAGE: &str = "You are an expert exam tutor. Explain answers clearly and concisely.";

/// 解释生成能力
///
/// 输入一段 prompt，输出模型的自由文本。
#[async_trait]
pub trait ExplanationGenerator: Send + Sync {
    /// 生成器名称（模型名或服务地址），用于日志
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> AppResult<String>;
}

/// 根据配置选择生成器实现
pub fn generator_from_config(config: &Config) -> Box<dyn ExplanationGenerator> {
    match config.llm_provider {
        LlmProvider::OpenAi => Box::new(OpenAiExplainer::new(config)),
        LlmProvider::Http => Box::new(HttpExplainer::new(config)),
    }
}

/// 构建解释请求的 prompt
///
/// 嵌入题干、选项和参考答案，要求分五部分作答。
pub fn build_prompt(record: &QuestionRecord) -> String {
    let options = if record.options.is_empty() {
        "(no options provided)".to_string()
    } else {
        record
            .options
            .iter()
            .map(|(letter, text)| format!("{}. {}", letter, text))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Explain the following exam question.\n\n\
         Question:\n{}\n\n\
         Options:\n{}\n\n\
         Suggested Answer: {}\n\n\
         Provide a structured explanation with these parts:\n\
         1. Why the suggested answer is correct\n\
         2. Key concepts being tested\n\
         3. Why each of the other options is wrong\n\
         4. Real-world application\n\
         5. Common mistakes to avoid\n",
        record.question_text, options, record.suggested_answer
    )
}

const PLACEHOLDER_PREFIX: &str = "[Explanation unavailable:";

/// 失败时的占位文本
pub fn placeholder(reason: &str) -> String {
    format!("{} {}]", PLACEHOLDER_PREFIX, reason)
}

/// 是否为占位文本
pub fn is_placeholder(explanation: &str) -> bool {
    explanation.starts_with(PLACEHOLDER_PREFIX)
}

/// 生成解释，失败时返回占位文本而不是错误
///
/// # 返回
/// 解释永不为空：模型报错或返回空白都会落到 [`placeholder`]
pub async fn generate_or_placeholder(
    generator: &dyn ExplanationGenerator,
    record: &QuestionRecord,
) -> ExplanationRecord {
    let prompt = build_prompt(record);
    let explanation = match generator.generate(&prompt).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!("⚠️ 题目 {} 的解释为空 ({})", record.number, generator.name());
            placeholder("empty response")
        }
        Err(e) => {
            warn!("⚠️ 题目 {} 解释生成失败: {}", record.number, e);
            placeholder(&e.to_string())
        }
    };

    ExplanationRecord {
        record: record.clone(),
        explanation,
    }
}

// ========== OpenAI 兼容实现 ==========

/// OpenAI 兼容的聊天补全生成器
pub struct OpenAiExplainer {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_tokens: u32,
}

impl OpenAiExplainer {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            max_tokens: config.llm_max_tokens,
        }
    }

    fn api_error(&self, e: async_openai::error::OpenAIError) -> AppError {
        AppError::llm_api_failed(&self.model_name, e)
    }
}

#[async_trait]
impl ExplanationGenerator for OpenAiExplainer {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn generate(&self, prompt: &str) -> AppResult<String> {
        debug!(
            "调用 LLM API，模型: {}，prompt 长度: {} 字符",
            self.model_name,
            prompt.len()
        );

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_MESSAGE)
            .build()
            .map_err(|e| self.api_error(e))?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| self.api_error(e))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.3)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| self.api_error(e))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| self.api_error(e))?;

        debug!("LLM API 调用成功");

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                LlmError::EmptyContent {
                    model: self.model_name.clone(),
                }
                .into()
            })
    }
}

// ========== 轻量模型服务实现 ==========

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    output: String,
}

/// 轻量模型服务：`POST {prompt, max_tokens}` → `{output}`
pub struct HttpExplainer {
    client: reqwest::Client,
    endpoint: String,
    max_tokens: u32,
}

impl HttpExplainer {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.llm_generate_url.clone(),
            max_tokens: config.llm_max_tokens,
        }
    }
}

#[async_trait]
impl ExplanationGenerator for HttpExplainer {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn generate(&self, prompt: &str) -> AppResult<String> {
        debug!("调用模型服务: {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                prompt,
                max_tokens: self.max_tokens,
            })
            .send()
            .await
            .map_err(|e| AppError::llm_api_failed(&self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::BadStatus {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            }
            .into());
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::llm_api_failed(&self.endpoint, e))?;
        Ok(body.output.trim().to_string())
    }
}
