//! HTTP 에러 응답

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// 질문 필드 누락 시 응답 본문
pub const NO_TEXT_FOUND: &str = "No text found";

/// 내부 에러 응답 본문 (상세 내용은 로그에만 남김)
pub const INTERNAL_ERROR: &str = "Internal Server Error";

/// 핸들러 에러
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 요청 본문에 `input`이 없음
    #[error("No text found")]
    MissingInput,

    /// 임베딩/엔진 등 내부 처리 실패
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingInput => (StatusCode::BAD_REQUEST, NO_TEXT_FOUND).into_response(),
            ApiError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR).into_response()
            }
        }
    }
}
