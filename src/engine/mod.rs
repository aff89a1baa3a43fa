//! Engine 모듈 - 저장된 인덱스 기반 질의 엔진
//!
//! - Storage: 인덱스 디렉토리(docstore / index_store / vector_store) 로더
//! - Tree: 트리 인덱스 select-leaf 탐색 후 답변 합성
//! - Vector: 임베딩 top-k + 유사도 컷오프 후 답변 합성
//! - Synthesis: 컨텍스트 + 질문 -> LLM 답변

mod storage;
mod synthesis;
mod tree;
mod vector;

use anyhow::Result;
use async_trait::async_trait;

// Re-exports
pub use storage::{IndexStruct, PersistedIndex, TreeStruct, VectorStoreStruct};
pub use synthesis::{synthesize, text_qa_prompt, EMPTY_RESPONSE};
pub use tree::{parse_choice, TreeQueryEngine};
pub use vector::VectorStoreQueryEngine;

// ============================================================================
// QueryEngine Trait
// ============================================================================

/// 질의 엔진 트레이트
///
/// 질문 하나에 합성된 답변 문자열 하나를 돌려줍니다.
/// 내부 인덱스 표현은 구현체에 숨겨져 있습니다.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, question: &str) -> Result<String>;

    /// 엔진 이름 (로그용)
    fn name(&self) -> &str;
}

// ============================================================================
// Test Doubles
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;

    use crate::llm::CompletionProvider;

    /// 미리 정한 응답을 순서대로 돌려주고 받은 프롬프트를 기록하는 LLM
    pub(crate) struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub(crate) fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(String::from).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
