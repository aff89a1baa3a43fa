//! Similarity Ranker - 질문과 가장 가까운 지식 테이블 행 검색
//!
//! 랭킹은 순수 함수입니다. 공유 테이블에 점수 컬럼을 쓰지 않고
//! 요청마다 새 결과 목록을 만들어 반환합니다.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::embedding::EmbeddingProvider;

use super::table::KnowledgeTable;
use super::vector::rank_by_similarity;

// ============================================================================
// Types
// ============================================================================

/// 랭킹 결과 한 건 (응답 JSON 필드 순서: rank, question, answer)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    /// 1부터 시작하는 순위
    pub rank: usize,
    pub question: String,
    pub answer: String,
}

// ============================================================================
// Ranking
// ============================================================================

/// 쿼리 임베딩 기준 상위 `n`개 행 랭킹
///
/// 테이블 행이 `n`보다 적으면 전체 행을 반환합니다.
/// 쿼리 차원이 테이블과 다르면 에러입니다.
pub fn rank_rows(
    table: &KnowledgeTable,
    query_embedding: &[f32],
    n: usize,
) -> Result<Vec<RankedResult>> {
    if query_embedding.len() != table.dimension() {
        bail!(
            "Query embedding dimension {} does not match knowledge table dimension {}",
            query_embedding.len(),
            table.dimension()
        );
    }

    let rows = table.rows();
    let ranked = rank_by_similarity(query_embedding, table.embeddings(), n)
        .into_iter()
        .enumerate()
        .map(|(position, scored)| {
            let row = &rows[scored.index];
            tracing::debug!(
                "rank {} similarity {:.4}: {}",
                position + 1,
                scored.similarity,
                row.question
            );
            RankedResult {
                rank: position + 1,
                question: row.question.clone(),
                answer: row.answer.clone(),
            }
        })
        .collect();

    Ok(ranked)
}

// ============================================================================
// SimilarityRanker
// ============================================================================

/// 임베딩 프로바이더 + 지식 테이블 조합
///
/// 질문을 임베딩한 뒤 [`rank_rows`]로 순위를 매깁니다.
#[derive(Clone)]
pub struct SimilarityRanker {
    table: Arc<KnowledgeTable>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_n: usize,
}

impl SimilarityRanker {
    pub fn new(
        table: Arc<KnowledgeTable>,
        embedder: Arc<dyn EmbeddingProvider>,
        top_n: usize,
    ) -> Result<Self> {
        if embedder.dimension() != table.dimension() {
            bail!(
                "Embedding provider {} produces {}-dimensional vectors but the knowledge table has dimension {}",
                embedder.name(),
                embedder.dimension(),
                table.dimension()
            );
        }
        if top_n == 0 {
            bail!("top_n must be at least 1");
        }

        Ok(Self {
            table,
            embedder,
            top_n,
        })
    }

    /// 기본 `top_n`으로 검색
    pub async fn search(&self, question: &str) -> Result<Vec<RankedResult>> {
        self.search_with_limit(question, self.top_n).await
    }

    /// 결과 수를 지정하여 검색
    pub async fn search_with_limit(&self, question: &str, n: usize) -> Result<Vec<RankedResult>> {
        if question.trim().is_empty() {
            bail!("Question must not be empty");
        }

        let query_embedding = self
            .embedder
            .embed(question)
            .await
            .context("Failed to embed question")?;

        rank_rows(&self.table, &query_embedding, n)
    }
}

// ============================================================================
// Tests
// ============================================================================
