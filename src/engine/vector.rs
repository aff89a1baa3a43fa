//! Vector Store Query Engine - 임베딩 top-k 검색 + 유사도 컷오프
//!
//! 질문 임베딩과 저장된 노드 임베딩의 코사인 유사도로 상위 k개를 고르고,
//! 컷오프 미만 노드를 버린 뒤 남은 노드로 답변을 합성합니다.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::knowledge::rank_by_similarity;
use crate::llm::CompletionProvider;

use super::storage::{IndexStruct, PersistedIndex};
use super::synthesis::synthesize;
use super::QueryEngine;

/// 임베딩이 붙은 노드
#[derive(Debug, Clone)]
struct VectorNode {
    id: String,
    text: String,
    embedding: Vec<f32>,
}

pub struct VectorStoreQueryEngine {
    nodes: Vec<VectorNode>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn CompletionProvider>,
    similarity_top_k: usize,
    similarity_cutoff: f32,
}

impl VectorStoreQueryEngine {
    /// 벡터 스토어 인덱스로 엔진 생성
    ///
    /// 모든 임베딩은 임베딩 프로바이더와 같은 차원이어야 합니다.
    pub fn new(
        index: PersistedIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn CompletionProvider>,
        similarity_top_k: usize,
        similarity_cutoff: f32,
    ) -> Result<Self> {
        let kind = index.structure.kind();
        let IndexStruct::VectorStore(structure) = index.structure else {
            bail!(
                "{} holds a {} index, expected a vector_store index",
                index.dir.display(),
                kind
            );
        };

        let mut nodes = Vec::with_capacity(index.embeddings.len());
        for (vector_id, embedding) in index.embeddings {
            // 벡터 ID와 노드 ID가 다르면 nodes_dict로 매핑
            let node_id = structure
                .nodes_dict
                .get(&vector_id)
                .cloned()
                .unwrap_or_else(|| vector_id.clone());

            let text = index
                .nodes
                .get(&node_id)
                .cloned()
                .with_context(|| format!("Vector node {} missing from docstore", node_id))?;

            if embedding.len() != embedder.dimension() {
                bail!(
                    "Vector node {} has dimension {}, expected {}",
                    node_id,
                    embedding.len(),
                    embedder.dimension()
                );
            }

            nodes.push(VectorNode {
                id: node_id,
                text,
                embedding,
            });
        }

        // 결과가 파일 순서에 의존하지 않도록 ID순 정렬
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Self {
            nodes,
            embedder,
            llm,
            similarity_top_k,
            similarity_cutoff,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// top-k + 컷오프 통과 노드 텍스트 (유사도 내림차순)
    async fn retrieve(&self, question: &str) -> Result<Vec<&str>> {
        let query_embedding = self
            .embedder
            .embed(question)
            .await
            .context("Failed to embed question")?;

        let ranked = rank_by_similarity(
            &query_embedding,
            self.nodes.iter().map(|n| n.embedding.as_slice()),
            self.similarity_top_k,
        );

        let kept: Vec<&str> = ranked
            .into_iter()
            .filter(|scored| {
                let keep = scored.similarity >= self.similarity_cutoff;
                tracing::debug!(
                    "node {} similarity {:.4} ({})",
                    self.nodes[scored.index].id,
                    scored.similarity,
                    if keep { "kept" } else { "below cutoff" }
                );
                keep
            })
            .map(|scored| self.nodes[scored.index].text.as_str())
            .collect();

        Ok(kept)
    }
}

#[async_trait]
impl QueryEngine for VectorStoreQueryEngine {
    async fn query(&self, question: &str) -> Result<String> {
        let contexts = self.retrieve(question).await?;
        synthesize(self.llm.as_ref(), question, &contexts).await
    }

    fn name(&self) -> &str {
        "vector_store_index"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::storage::tests::{docstore, vector_index_store, write_index};
    use crate::engine::tests::ScriptedLlm;
    use crate::engine::EMPTY_RESPONSE;
    use serde_json::json;
    use tempfile::TempDir;

    /// 항상 같은 벡터를 돌려주는 임베더
    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimension(&self) -> usize {
            self.0.len()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn sample_index(dir: &TempDir) -> PersistedIndex {
        write_index(
            dir.path(),
            docstore(&[
                ("exact", "Exact match passage."),
                ("close", "Close passage."),
                ("far", "Unrelated passage."),
            ]),
            vector_index_store(&["exact", "close", "far"]),
            Some(json!({
                "embedding_dict": {
                    "exact": [1.0, 0.0],
                    "close": [0.9, 0.3],
                    "far": [0.0, 1.0]
                }
            })),
        );
        PersistedIndex::load(dir.path()).unwrap()
    }

    fn engine(dir: &TempDir, query: Vec<f32>, llm: Arc<ScriptedLlm>, top_k: usize) -> VectorStoreQueryEngine {
        VectorStoreQueryEngine::new(
            sample_index(dir),
            Arc::new(FixedEmbedder(query)),
            llm,
            top_k,
            0.85,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_top_k_above_cutoff_reach_synthesis() {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(ScriptedLlm::new(vec!["answer"]));
        let engine = engine(&dir, vec![1.0, 0.0], llm.clone(), 2);
        assert_eq!(engine.node_count(), 3);

        let answer = engine.query("question").await.unwrap();
        assert_eq!(answer, "answer");

        let prompt = &llm.prompts()[0];
        // close: 0.9 / sqrt(0.9) ~= 0.949 >= 0.85
        assert!(prompt.contains("Exact match passage.\n\nClose passage."));
        assert!(!prompt.contains("Unrelated passage."));
    }

    #[tokio::test]
    async fn test_cutoff_filters_low_similarity() {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(ScriptedLlm::new(vec!["answer"]));
        // [0.6, 0.8]: exact 0.6, close ~0.822, far 0.8 -> 모두 컷오프 미만
        let engine = engine(&dir, vec![0.6, 0.8], llm.clone(), 3);

        let answer = engine.query("question").await.unwrap();
        assert_eq!(answer, EMPTY_RESPONSE);
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_top_k_limits_before_cutoff() {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(ScriptedLlm::new(vec!["answer"]));
        let engine = engine(&dir, vec![1.0, 0.0], llm.clone(), 1);

        engine.query("question").await.unwrap();
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Exact match passage."));
        assert!(!prompt.contains("Close passage."));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let result = VectorStoreQueryEngine::new(
            sample_index(&dir),
            Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])),
            Arc::new(ScriptedLlm::new(vec![])),
            2,
            0.85,
        );
        assert!(result.is_err());
    }
}
