//! 임베딩 모듈 - OpenAI 호환 API를 통한 텍스트 벡터화
//!
//! 질문 텍스트를 벡터로 변환합니다.
//! 유사도 랭킹과 벡터 스토어 엔진이 모두 이 모듈을 사용합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(OpenAiConfig::from_env()?, 1536)?;
//! let embedding = embedder.embed("How do I reset my password?").await?;
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding
// ============================================================================

/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프
const INITIAL_BACKOFF: Duration = Duration::from_millis(2000);
/// HTTP 요청 타임아웃
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAI 임베딩 구현체
#[derive(Debug)]
pub struct OpenAiEmbedding {
    config: OpenAiConfig,
    client: reqwest::Client,
    dimension: usize,
    /// 재시도마다 2배씩 늘어나는 첫 대기 시간
    initial_backoff: Duration,
}

impl OpenAiEmbedding {
    /// 차원을 지정하여 생성
    ///
    /// 차원은 CSV 임베딩을 만든 모델의 출력 차원과 같아야 합니다.
    pub fn with_dimension(config: OpenAiConfig, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Invalid dimension: 0");
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            client,
            dimension,
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.pow(attempt)
    }
}

/// 임베딩 API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

/// 임베딩 API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI API 에러 응답
#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiError {
    pub(crate) error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiErrorDetail {
    pub(crate) message: String,
    #[serde(default, rename = "type")]
    pub(crate) kind: Option<String>,
}

/// 임베딩 입력 정규화 (줄바꿈 -> 공백)
pub fn normalize_input(text: &str) -> String {
    text.replace('\n', " ")
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: &self.config.embedding_model,
            input: vec![normalize_input(text)],
        };
        let url = self.config.endpoint("embeddings");

        let mut last_error: Option<anyhow::Error> = None;

        // 재시도 루프 (429 / 전송 에러 시 지수 백오프)
        for attempt in 0..=MAX_RETRIES {
            let response = match self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES {
                        let backoff = self.backoff(attempt);
                        tracing::warn!(
                            "Request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let embed_response: EmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;
                let embedding = embed_response
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| anyhow::anyhow!("Embedding response contained no data"))?;

                if embedding.len() != self.dimension {
                    anyhow::bail!(
                        "Embedding dimension mismatch: expected {}, got {}",
                        self.dimension,
                        embedding.len()
                    );
                }
                return Ok(embedding);
            }

            // 429 Rate Limit 에러 - 재시도
            if status.as_u16() == 429 {
                let backoff = self.backoff(attempt);
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));

                if attempt < MAX_RETRIES {
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                // 다른 에러 - 즉시 실패
                if let Ok(error) = serde_json::from_str::<OpenAiError>(&body) {
                    anyhow::bail!(
                        "OpenAI API error ({}, {}): {}",
                        status,
                        error.error.kind.unwrap_or_default(),
                        error.error.message
                    );
                }
                anyhow::bail!("OpenAI API error ({}): {}", status, body);
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.config.embedding_model
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 지정 차원으로 임베딩 프로바이더 생성
///
/// 차원은 보통 로드된 지식 테이블의 임베딩 길이입니다.
pub fn create_embedder(config: OpenAiConfig, dimension: usize) -> Result<OpenAiEmbedding> {
    let embedder = OpenAiEmbedding::with_dimension(config, dimension)?;
    tracing::info!(
        "Using OpenAI embedding {} (dimension: {})",
        embedder.name(),
        embedder.dimension()
    );
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================
