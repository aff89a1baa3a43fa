//! HTTP 서버 - Axum 라우터 및 실행
//!
//! | Route | Method | Handler |
//! |---|---|---|
//! | /embbeding | POST | 지식 테이블 유사도 랭킹 |
//! | /tree_index | POST | 트리 인덱스 질의 |
//! | /vector_store_index | POST | 벡터 스토어 인덱스 질의 |
//! | /test | GET | 고정 응답 |

mod error;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::engine::{PersistedIndex, QueryEngine, TreeQueryEngine, VectorStoreQueryEngine};
use crate::knowledge::{KnowledgeTable, SimilarityRanker};
use crate::llm::{CompletionProvider, OpenAiChat};

pub use error::{ApiError, INTERNAL_ERROR, NO_TEXT_FOUND};
pub use routes::{EngineResponse, QuestionRequest};

// ============================================================================
// AppState
// ============================================================================

/// 핸들러 공유 상태
///
/// 시작 시 한 번 만들어지고 이후 읽기 전용입니다.
pub struct AppState {
    pub ranker: SimilarityRanker,
    pub tree: Arc<dyn QueryEngine>,
    pub vector_store: Arc<dyn QueryEngine>,
}

impl AppState {
    /// 설정에 따라 테이블/엔진/프로바이더 로드
    pub fn load(config: &ServerConfig) -> Result<Self> {
        let table = Arc::new(
            KnowledgeTable::load_csv(&config.csv_path).context("Failed to load knowledge table")?,
        );

        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(create_embedder(config.openai.clone(), table.dimension())?);
        let llm: Arc<dyn CompletionProvider> = Arc::new(OpenAiChat::new(config.openai.clone())?);

        let ranker = SimilarityRanker::new(table, embedder.clone(), config.top_n)?;

        let tree_index = PersistedIndex::load(&config.tree_dir).context("Failed to load tree index")?;
        let tree = TreeQueryEngine::new(tree_index, llm.clone())?;

        let vector_index = PersistedIndex::load(&config.vector_dir)
            .context("Failed to load vector store index")?;
        let vector_store = VectorStoreQueryEngine::new(
            vector_index,
            embedder,
            llm,
            config.similarity_top_k,
            config.similarity_cutoff,
        )?;

        Ok(Self {
            ranker,
            tree: Arc::new(tree),
            vector_store: Arc::new(vector_store),
        })
    }
}

// ============================================================================
// Router
// ============================================================================

/// 라우터 생성
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/embbeding", post(routes::top_questions))
        .route("/tree_index", post(routes::tree_index))
        .route("/vector_store_index", post(routes::vector_store_index))
        .route("/test", get(routes::test_endpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// 서버 실행 (Ctrl-C로 종료)
pub async fn serve(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let addr = config.socket_addr()?;

    let state = AppState::load(&config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ============================================================================
// Tests
// ============================================================================
