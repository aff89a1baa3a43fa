//! Persisted Index - 디스크에 저장된 인덱스 디렉토리 로더
//!
//! 디렉토리 구성:
//! - `docstore.json`: 노드 ID -> 노드 텍스트
//! - `index_store.json`: 인덱스 구조 (tree / vector_store) 하나
//! - `vector_store.json`: 노드 ID -> 임베딩 (vector_store 인덱스만)
//!
//! 읽기 전용입니다. 인덱스 생성/저장은 하지 않습니다.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

const DOCSTORE_FILE: &str = "docstore.json";
const INDEX_STORE_FILE: &str = "index_store.json";
const VECTOR_STORE_FILE: &str = "vector_store.json";

// ============================================================================
// Index Structs
// ============================================================================

/// 트리 인덱스 구조
///
/// `all_nodes`, `root_nodes` 키는 트리 내 위치(정렬 기준)입니다.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeStruct {
    #[serde(default)]
    pub all_nodes: BTreeMap<usize, String>,
    #[serde(default)]
    pub root_nodes: BTreeMap<usize, String>,
    #[serde(default)]
    pub node_id_to_children_ids: HashMap<String, Vec<String>>,
}

/// 벡터 스토어 인덱스 구조 (벡터 ID -> 노드 ID)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VectorStoreStruct {
    #[serde(default)]
    pub nodes_dict: HashMap<String, String>,
}

/// 인덱스 종류별 구조
#[derive(Debug, Clone)]
pub enum IndexStruct {
    Tree(TreeStruct),
    VectorStore(VectorStoreStruct),
}

impl IndexStruct {
    pub fn kind(&self) -> &'static str {
        match self {
            IndexStruct::Tree(_) => "tree",
            IndexStruct::VectorStore(_) => "vector_store",
        }
    }
}

// ============================================================================
// On-disk Layout
// ============================================================================

#[derive(Debug, Deserialize)]
struct DocStoreFile {
    #[serde(rename = "docstore/data", default)]
    data: HashMap<String, TypedEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexStoreFile {
    #[serde(rename = "index_store/data", default)]
    data: HashMap<String, TypedEntry>,
}

/// `{"__type__": ..., "__data__": ...}` 엔트리
///
/// `__data__`는 객체이거나 JSON 문자열로 직렬화된 객체입니다.
#[derive(Debug, Deserialize)]
struct TypedEntry {
    #[serde(rename = "__type__", default)]
    kind: Option<String>,
    #[serde(rename = "__data__")]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct StoredNode {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct VectorStoreFile {
    #[serde(default)]
    embedding_dict: HashMap<String, Vec<f32>>,
}

fn decode_data<T: DeserializeOwned>(value: Value) -> Result<T> {
    match value {
        Value::String(raw) => serde_json::from_str(&raw).context("Invalid embedded JSON data"),
        other => serde_json::from_value(other).context("Invalid data object"),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

// ============================================================================
// PersistedIndex
// ============================================================================

/// 로드된 인덱스 디렉토리
#[derive(Debug, Clone)]
pub struct PersistedIndex {
    pub dir: PathBuf,
    pub index_id: String,
    pub structure: IndexStruct,
    /// 노드 ID -> 텍스트
    pub nodes: HashMap<String, String>,
    /// 노드 ID -> 임베딩 (vector_store 인덱스만 채워짐)
    pub embeddings: HashMap<String, Vec<f32>>,
}

impl PersistedIndex {
    /// 인덱스 디렉토리 로드
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            bail!("Index directory not found: {}", dir.display());
        }

        let docstore: DocStoreFile = read_json(&dir.join(DOCSTORE_FILE))?;
        let mut nodes = HashMap::with_capacity(docstore.data.len());
        for (id, entry) in docstore.data {
            let node: StoredNode = decode_data(entry.data)
                .with_context(|| format!("Invalid docstore node {}", id))?;
            nodes.insert(id, node.text);
        }

        let index_store: IndexStoreFile = read_json(&dir.join(INDEX_STORE_FILE))?;
        if index_store.data.len() != 1 {
            bail!(
                "Expected exactly one index in {}, found {}",
                dir.join(INDEX_STORE_FILE).display(),
                index_store.data.len()
            );
        }
        let Some((index_id, entry)) = index_store.data.into_iter().next() else {
            bail!("Index store is empty");
        };

        let structure = match entry.kind.as_deref() {
            Some("tree") => IndexStruct::Tree(
                decode_data(entry.data).context("Invalid tree index structure")?,
            ),
            Some("vector_store") => IndexStruct::VectorStore(
                decode_data(entry.data).context("Invalid vector store index structure")?,
            ),
            other => bail!("Unsupported index type: {:?}", other),
        };

        let vector_path = dir.join(VECTOR_STORE_FILE);
        let embeddings = if matches!(structure, IndexStruct::VectorStore(_)) {
            let store: VectorStoreFile = read_json(&vector_path)?;
            store.embedding_dict
        } else {
            HashMap::new()
        };

        tracing::info!(
            "Loaded {} index {} from {} ({} nodes, {} embeddings)",
            structure.kind(),
            index_id,
            dir.display(),
            nodes.len(),
            embeddings.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            index_id,
            structure,
            nodes,
            embeddings,
        })
    }

    /// 노드 텍스트 조회
    pub fn node_text(&self, node_id: &str) -> Result<&str> {
        self.nodes
            .get(node_id)
            .map(String::as_str)
            .ok_or_else(|| anyhow::anyhow!("Node {} missing from docstore", node_id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    pub(crate) fn write_index(dir: &Path, docstore: Value, index_store: Value, vectors: Option<Value>) {
        std::fs::write(dir.join(DOCSTORE_FILE), docstore.to_string()).unwrap();
        std::fs::write(dir.join(INDEX_STORE_FILE), index_store.to_string()).unwrap();
        if let Some(vectors) = vectors {
            std::fs::write(dir.join(VECTOR_STORE_FILE), vectors.to_string()).unwrap();
        }
    }

    pub(crate) fn docstore(nodes: &[(&str, &str)]) -> Value {
        let data: serde_json::Map<String, Value> = nodes
            .iter()
            .map(|(id, text)| {
                (
                    id.to_string(),
                    json!({"__type__": "1", "__data__": {"text": text, "doc_id": id}}),
                )
            })
            .collect();
        json!({ "docstore/data": data })
    }

    pub(crate) fn tree_index_store(tree: Value) -> Value {
        json!({
            "index_store/data": {
                "tree-1": {"__type__": "tree", "__data__": tree.to_string()}
            }
        })
    }

    pub(crate) fn vector_index_store(ids: &[&str]) -> Value {
        let nodes: serde_json::Map<String, Value> = ids
            .iter()
            .map(|id| (id.to_string(), Value::String(id.to_string())))
            .collect();
        json!({
            "index_store/data": {
                "vec-1": {"__type__": "vector_store", "__data__": {"nodes_dict": nodes}}
            }
        })
    }

    #[test]
    fn test_load_tree_index() {
        let dir = TempDir::new().unwrap();
        write_index(
            dir.path(),
            docstore(&[("root", "summary"), ("leaf", "details")]),
            tree_index_store(json!({
                "index_id": "tree-1",
                "summary": null,
                "all_nodes": {"0": "leaf", "1": "root"},
                "root_nodes": {"1": "root"},
                "node_id_to_children_ids": {"root": ["leaf"]}
            })),
            None,
        );

        let index = PersistedIndex::load(dir.path()).unwrap();
        assert_eq!(index.index_id, "tree-1");
        assert_eq!(index.node_count(), 2);
        assert_eq!(index.node_text("leaf").unwrap(), "details");
        assert!(index.embeddings.is_empty());

        match index.structure {
            IndexStruct::Tree(tree) => {
                assert_eq!(tree.root_nodes.get(&1).map(String::as_str), Some("root"));
                assert_eq!(tree.node_id_to_children_ids["root"], vec!["leaf".to_string()]);
            }
            other => panic!("unexpected index type: {}", other.kind()),
        }
    }

    #[test]
    fn test_load_vector_store_index() {
        let dir = TempDir::new().unwrap();
        write_index(
            dir.path(),
            docstore(&[("n1", "first"), ("n2", "second")]),
            vector_index_store(&["n1", "n2"]),
            Some(json!({
                "embedding_dict": {"n1": [1.0, 0.0], "n2": [0.0, 1.0]},
                "text_id_to_ref_doc_id": {"n1": "d1", "n2": "d1"}
            })),
        );

        let index = PersistedIndex::load(dir.path()).unwrap();
        assert_eq!(index.structure.kind(), "vector_store");
        assert_eq!(index.embeddings["n2"], vec![0.0, 1.0]);
    }

    #[test]
    fn test_vector_store_without_vectors_file_fails() {
        let dir = TempDir::new().unwrap();
        write_index(
            dir.path(),
            docstore(&[("n1", "first")]),
            vector_index_store(&["n1"]),
            None,
        );
        assert!(PersistedIndex::load(dir.path()).is_err());
    }

    #[test]
    fn test_unknown_index_type_fails() {
        let dir = TempDir::new().unwrap();
        write_index(
            dir.path(),
            docstore(&[]),
            json!({"index_store/data": {"x": {"__type__": "keyword_table", "__data__": {}}}}),
            None,
        );
        let err = PersistedIndex::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported index type"));
    }

    #[test]
    fn test_missing_directory_fails() {
        assert!(PersistedIndex::load(Path::new("/nonexistent/tree")).is_err());
    }

    #[test]
    fn test_missing_node_lookup() {
        let dir = TempDir::new().unwrap();
        write_index(
            dir.path(),
            docstore(&[("n1", "first")]),
            tree_index_store(json!({"all_nodes": {"0": "n1"}, "root_nodes": {"0": "n1"}})),
            None,
        );
        let index = PersistedIndex::load(dir.path()).unwrap();
        assert!(index.node_text("ghost").is_err());
    }
}
