//! Knowledge 모듈 - 사전 계산 임베딩 기반 Q&A 검색
//!
//! - Table: CSV에서 로드한 불변 질문/답변/임베딩 테이블
//! - Vector: 코사인 유사도 및 선형 스캔 랭킹
//! - Ranker: 질문 임베딩 -> 상위 N개 행

mod ranker;
mod table;
mod vector;

// Re-exports
pub use ranker::{rank_rows, RankedResult, SimilarityRanker};
pub use table::{parse_embedding, KnowledgeRow, KnowledgeTable};
pub use vector::{cosine_similarity, rank_by_similarity, ScoredIndex};
