//! API 라우트 핸들러

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::QueryEngine;
use crate::knowledge::RankedResult;

use super::error::ApiError;
use super::AppState;

/// 질문 요청 본문
#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    #[serde(default)]
    pub input: Option<String>,
}

/// 인덱스 질의 응답 본문
#[derive(Debug, Serialize)]
pub struct EngineResponse {
    pub response: String,
}

/// POST /embbeding - 지식 테이블 유사도 상위 N개
pub async fn top_questions(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QuestionRequest>,
) -> Result<Json<Vec<RankedResult>>, ApiError> {
    tracing::info!("POST /embbeding input={:?}", body.input);

    let question = body
        .input
        .filter(|q| !q.trim().is_empty())
        .ok_or(ApiError::MissingInput)?;

    let ranked = state.ranker.search(&question).await?;
    Ok(Json(ranked))
}

/// POST /tree_index - 트리 인덱스 질의
pub async fn tree_index(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QuestionRequest>,
) -> Result<Json<EngineResponse>, ApiError> {
    run_engine(state.tree.as_ref(), body).await
}

/// POST /vector_store_index - 벡터 스토어 인덱스 질의
pub async fn vector_store_index(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QuestionRequest>,
) -> Result<Json<EngineResponse>, ApiError> {
    run_engine(state.vector_store.as_ref(), body).await
}

async fn run_engine(
    engine: &dyn QueryEngine,
    body: QuestionRequest,
) -> Result<Json<EngineResponse>, ApiError> {
    tracing::info!("POST /{} input={:?}", engine.name(), body.input);

    let question = body.input.ok_or(ApiError::MissingInput)?;
    let response = engine.query(&question).await?;

    tracing::debug!("/{} response: {}", engine.name(), response);
    Ok(Json(EngineResponse { response }))
}

/// GET /test - 상태 무관 고정 응답
pub async fn test_endpoint() -> Json<Value> {
    Json(json!({"a": 12}))
}
