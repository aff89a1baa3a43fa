//! 답변 합성 - 검색된 컨텍스트 + 질문 -> LLM 답변

use anyhow::{Context, Result};

use crate::llm::CompletionProvider;

/// 합성할 컨텍스트가 없을 때의 응답
pub const EMPTY_RESPONSE: &str = "Empty Response";

const SEPARATOR: &str = "---------------------";

/// 텍스트 QA 프롬프트 생성
pub fn text_qa_prompt(context: &str, question: &str) -> String {
    format!(
        "Context information is below.\n{SEPARATOR}\n{context}\n{SEPARATOR}\n\
         Given the context information and not prior knowledge, answer the question: {question}\n"
    )
}

/// 컨텍스트 텍스트들로 답변 합성
///
/// 모든 컨텍스트를 하나의 프롬프트로 묶어 한 번만 호출합니다.
/// 컨텍스트가 비어 있으면 LLM을 호출하지 않습니다.
pub async fn synthesize(
    llm: &dyn CompletionProvider,
    question: &str,
    contexts: &[&str],
) -> Result<String> {
    if contexts.is_empty() {
        tracing::debug!("No context for synthesis, returning empty response");
        return Ok(EMPTY_RESPONSE.to_string());
    }

    let prompt = text_qa_prompt(&contexts.join("\n\n"), question);
    let answer = llm
        .complete(&prompt)
        .await
        .with_context(|| format!("{} failed to synthesize an answer", llm.name()))?;

    Ok(answer.trim().to_string())
}
