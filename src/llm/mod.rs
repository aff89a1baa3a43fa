//! LLM 모듈 - 채팅 완성 API를 통한 답변 합성
//!
//! 인덱스 질의 엔진이 노드 선택과 답변 합성에 사용합니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;
use crate::embedding::OpenAiError;

// ============================================================================
// CompletionProvider Trait
// ============================================================================

/// 텍스트 완성 프로바이더 트레이트
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 프롬프트에 대한 완성 텍스트
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Chat
// ============================================================================

/// 답변 합성은 결정적이어야 하므로 temperature 0
const TEMPERATURE: f32 = 0.0;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI 채팅 완성 구현체
#[derive(Debug)]
pub struct OpenAiChat {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionProvider for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(self.config.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<OpenAiError>(&body) {
                anyhow::bail!("OpenAI API error ({}): {}", status, error.error.message);
            }
            anyhow::bail!("OpenAI API error ({}): {}", status, body);
        }

        let chat_response: ChatResponse =
            serde_json::from_str(&body).context("Failed to parse chat completion response")?;

        let text = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.is_empty() {
            tracing::warn!("Empty completion from {}", self.config.chat_model);
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        &self.config.chat_model
    }
}

// ============================================================================
// Tests
// ============================================================================
