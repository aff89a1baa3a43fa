//! Tree Query Engine - 트리 인덱스 select-leaf 탐색
//!
//! 루트부터 각 레벨에서 LLM이 가장 관련 있는 노드 하나를 고르고,
//! 리프에 도달하면 리프 텍스트로 답변을 합성합니다.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;

use crate::llm::CompletionProvider;

use super::storage::{IndexStruct, PersistedIndex};
use super::synthesis::{synthesize, EMPTY_RESPONSE};
use super::QueryEngine;

// ============================================================================
// Prompt
// ============================================================================

/// 후보 선택 프롬프트 생성
fn select_prompt(candidates: &[&str], question: &str) -> String {
    let numbered = candidates
        .iter()
        .enumerate()
        .map(|(i, text)| format!("({}) {}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Some choices are given below. It is provided in a numbered list (1 to {count}), \
         where each item in the list corresponds to a summary.\n\
         ---------------------\n\
         {numbered}\n\
         ---------------------\n\
         Using only the choices above and not prior knowledge, return the choice that is \
         most relevant to the question: '{question}'\n\
         Provide choice in the following format: 'ANSWER: <number>' and explain why this \
         summary was selected in relation to the question.\n",
        count = candidates.len(),
    )
}

/// LLM 응답에서 1-based 선택 번호 추출
///
/// `ANSWER: <n>` 형식을 우선하고, 없으면 처음 나오는 숫자를 사용합니다.
/// 범위(1..=count)를 벗어나면 `None`.
pub fn parse_choice(reply: &str, count: usize) -> Option<usize> {
    // 1: `ANSWER: <n>`, 2: 그 외 숫자
    static CHOICE_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = CHOICE_RE
        .get_or_init(|| Regex::new(r"(?i)ANSWER:\s*(\d+)|(\d+)").ok())
        .as_ref()?;

    let mut fallback = None;
    let mut answer = None;
    for caps in re.captures_iter(reply) {
        if let Some(m) = caps.get(1) {
            answer = Some(m);
            break;
        }
        if fallback.is_none() {
            fallback = caps.get(2);
        }
    }

    let choice: usize = answer.or(fallback)?.as_str().parse().ok()?;
    (1..=count).contains(&choice).then_some(choice)
}

// ============================================================================
// TreeQueryEngine
// ============================================================================

pub struct TreeQueryEngine {
    roots: Vec<String>,
    /// 노드 ID -> 위치순 정렬된 자식 ID
    children: HashMap<String, Vec<String>>,
    nodes: HashMap<String, String>,
    llm: Arc<dyn CompletionProvider>,
    max_depth: usize,
}

impl TreeQueryEngine {
    /// 트리 인덱스로 엔진 생성
    ///
    /// 참조된 모든 노드가 docstore에 있어야 합니다.
    pub fn new(index: PersistedIndex, llm: Arc<dyn CompletionProvider>) -> Result<Self> {
        let kind = index.structure.kind();
        let IndexStruct::Tree(tree) = index.structure else {
            bail!(
                "{} holds a {} index, expected a tree index",
                index.dir.display(),
                kind
            );
        };

        if tree.root_nodes.is_empty() {
            bail!("Tree index in {} has no root nodes", index.dir.display());
        }

        let position: HashMap<&str, usize> = tree
            .all_nodes
            .iter()
            .map(|(pos, id)| (id.as_str(), *pos))
            .collect();

        let roots: Vec<String> = tree.root_nodes.values().cloned().collect();

        let mut children = HashMap::with_capacity(tree.node_id_to_children_ids.len());
        for (parent, mut kids) in tree.node_id_to_children_ids {
            kids.sort_by_key(|id| position.get(id.as_str()).copied().unwrap_or(usize::MAX));
            children.insert(parent, kids);
        }

        for id in roots.iter().chain(children.values().flatten()) {
            if !index.nodes.contains_key(id) {
                bail!("Tree node {} missing from docstore in {}", id, index.dir.display());
            }
        }

        let max_depth = tree.all_nodes.len().max(roots.len()) + 1;

        Ok(Self {
            roots,
            children,
            nodes: index.nodes,
            llm,
            max_depth,
        })
    }

    fn text(&self, id: &str) -> &str {
        self.nodes.get(id).map(String::as_str).unwrap_or_default()
    }

    fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// 한 레벨에서 노드 선택 (후보가 하나면 LLM 호출 생략)
    async fn select<'a>(&self, level: &'a [String], question: &str) -> Result<Option<&'a str>> {
        if let [only] = level {
            return Ok(Some(only.as_str()));
        }

        let texts: Vec<&str> = level.iter().map(|id| self.text(id)).collect();
        let reply = self
            .llm
            .complete(&select_prompt(&texts, question))
            .await
            .context("Failed to select tree node")?;

        let choice = parse_choice(&reply, level.len());
        if choice.is_none() {
            tracing::warn!("Could not parse node choice from reply: {}", reply);
        }
        Ok(choice.map(|n| level[n - 1].as_str()))
    }
}

#[async_trait]
impl QueryEngine for TreeQueryEngine {
    async fn query(&self, question: &str) -> Result<String> {
        let mut level: &[String] = &self.roots;

        for depth in 0..self.max_depth {
            let Some(selected) = self.select(level, question).await? else {
                return Ok(EMPTY_RESPONSE.to_string());
            };
            tracing::debug!("Tree level {}: selected node {}", depth, selected);

            let children = self.children_of(selected);
            if children.is_empty() {
                return synthesize(self.llm.as_ref(), question, &[self.text(selected)]).await;
            }
            level = children;
        }

        bail!("Tree traversal exceeded depth {}", self.max_depth)
    }

    fn name(&self) -> &str {
        "tree_index"
    }
}

// ============================================================================
// Tests
// ============================================================================
