//! 벡터 유사도 유틸리티
//!
//! 지식 테이블 랭킹과 벡터 스토어 엔진이 공유하는 선형 스캔 스코어링입니다.

use std::cmp::Ordering;

// ============================================================================
// Types
// ============================================================================

/// 스코어링된 후보 (원본 컬렉션의 인덱스 + 유사도)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredIndex {
    /// 원본 컬렉션 내 위치
    pub index: usize,
    /// 코사인 유사도 (-1.0 ~ 1.0)
    pub similarity: f32,
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 두 벡터 간의 코사인 유사도를 계산합니다.
/// 결과는 -1.0 ~ 1.0 범위입니다.
///
/// 길이가 다르거나, 비어 있거나, 노름이 0인 벡터는 0.0을 반환합니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 유사도 내림차순 상위 `limit`개 선택
///
/// 정렬은 안정 정렬이므로 동점인 후보는 입력 순서를 유지합니다.
/// 입력 컬렉션은 변경하지 않습니다.
pub fn rank_by_similarity<'a, I>(query: &[f32], embeddings: I, limit: usize) -> Vec<ScoredIndex>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scored: Vec<ScoredIndex> = embeddings
        .into_iter()
        .enumerate()
        .map(|(index, embedding)| ScoredIndex {
            index,
            similarity: cosine_similarity(embedding, query),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}

// ============================================================================
// Tests
// ============================================================================
