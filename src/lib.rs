//! qna-rag - 임베딩 유사도 + 인덱스 질의 엔진 Q&A 서버
//!
//! 사전 계산된 질문 임베딩 CSV에서 유사 질문을 찾고,
//! 저장된 트리/벡터 스토어 인덱스로 LLM 답변을 합성하는 HTTP 서버입니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod knowledge;
pub mod llm;
pub mod server;

// Re-exports
pub use config::{get_api_key, has_api_key, OpenAiConfig, ServerConfig};
pub use embedding::{create_embedder, EmbeddingProvider, OpenAiEmbedding};
pub use engine::{
    PersistedIndex, QueryEngine, TreeQueryEngine, VectorStoreQueryEngine, EMPTY_RESPONSE,
};
pub use knowledge::{
    cosine_similarity, rank_rows, KnowledgeRow, KnowledgeTable, RankedResult, SimilarityRanker,
};
pub use llm::{CompletionProvider, OpenAiChat};
pub use server::{build_router, serve, AppState};
