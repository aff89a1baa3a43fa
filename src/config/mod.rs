//! 설정 모듈 - 서버 실행 설정 및 OpenAI 접속 정보
//!
//! `.env` 파일은 `main`에서 dotenvy로 먼저 로드되므로
//! 여기서는 환경변수만 읽습니다.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

// ============================================================================
// Defaults
// ============================================================================

/// 기본 OpenAI API 엔드포인트
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// 기본 임베딩 모델
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// 기본 채팅 모델 (답변 합성용)
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// 기본 바인드 주소
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// 기본 포트
pub const DEFAULT_PORT: u16 = 5000;

/// 임베딩 CSV 기본 경로
pub const DEFAULT_CSV_PATH: &str = "embbeded_question.csv";

/// 트리 인덱스 기본 디렉토리
pub const DEFAULT_TREE_DIR: &str = "./tree";

/// 벡터 스토어 인덱스 기본 디렉토리
pub const DEFAULT_VECTOR_DIR: &str = "./vector_store";

/// 유사도 랭킹 기본 결과 수
pub const DEFAULT_TOP_N: usize = 3;

/// 벡터 스토어 검색 시 가져올 노드 수
pub const DEFAULT_SIMILARITY_TOP_K: usize = 2;

/// 벡터 스토어 검색 유사도 컷오프
pub const DEFAULT_SIMILARITY_CUTOFF: f32 = 0.85;

const API_KEY_ENV: &str = "OPENAI_API_KEY";
const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
const EMBEDDING_MODEL_ENV: &str = "QNA_EMBEDDING_MODEL";
const CHAT_MODEL_ENV: &str = "QNA_CHAT_MODEL";

// ============================================================================
// OpenAI Config
// ============================================================================

/// OpenAI 호환 API 접속 설정
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
}

impl OpenAiConfig {
    /// 환경변수에서 설정 로드
    ///
    /// API 키는 필수, 나머지는 기본값을 사용합니다.
    pub fn from_env() -> Result<Self> {
        let api_key = get_api_key()?;

        Ok(Self {
            api_key,
            base_url: env_or(BASE_URL_ENV, DEFAULT_BASE_URL),
            embedding_model: env_or(EMBEDDING_MODEL_ENV, DEFAULT_EMBEDDING_MODEL),
            chat_model: env_or(CHAT_MODEL_ENV, DEFAULT_CHAT_MODEL),
        })
    }

    /// `{base_url}/{path}` 형태의 엔드포인트 URL 생성
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid OpenAI base URL: {}", self.base_url))?;

        if self.embedding_model.trim().is_empty() {
            bail!("Embedding model name must not be empty");
        }
        if self.chat_model.trim().is_empty() {
            bail!("Chat model name must not be empty");
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

// ============================================================================
// Server Config
// ============================================================================

/// `serve` 명령어 실행 설정
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub csv_path: PathBuf,
    pub tree_dir: PathBuf,
    pub vector_dir: PathBuf,
    pub top_n: usize,
    pub similarity_top_k: usize,
    pub similarity_cutoff: f32,
    pub openai: OpenAiConfig,
}

impl ServerConfig {
    /// 리소스를 로드하기 전에 설정값 검증
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("Port must be non-zero");
        }
        if self.top_n == 0 {
            bail!("top_n must be at least 1");
        }
        if self.similarity_top_k == 0 {
            bail!("similarity_top_k must be at least 1");
        }
        if !(-1.0..=1.0).contains(&self.similarity_cutoff) {
            bail!(
                "similarity_cutoff must be within [-1, 1], got {}",
                self.similarity_cutoff
            );
        }
        self.openai.validate()
    }

    /// 바인드 주소
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address: {}:{}", self.host, self.port))
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (`OPENAI_API_KEY` 환경변수)
pub fn get_api_key() -> Result<String> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.is_empty() {
            tracing::debug!("Using API key from {}", API_KEY_ENV);
            return Ok(key);
        }
    }

    bail!(
        "API key not found. Set {} environment variable (or add it to .env).",
        API_KEY_ENV
    )
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    std::env::var(API_KEY_ENV)
        .map(|key| !key.is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================
