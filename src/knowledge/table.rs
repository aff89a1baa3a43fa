//! Knowledge Table - 사전 계산된 질문/답변 임베딩 테이블
//!
//! 시작 시 CSV에서 한 번 로드되며 이후 변경되지 않습니다.
//! 임베딩 컬럼(`ada_embedding`)은 `[0.1, -0.2, ...]` 형태의 배열 리터럴입니다.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

// ============================================================================
// Types
// ============================================================================

/// 지식 테이블의 한 행
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeRow {
    pub question: String,
    pub answer: String,
    pub embedding: Vec<f32>,
}

/// CSV 레코드 (그 외 컬럼은 무시)
#[derive(Debug, Deserialize)]
struct CsvRecord {
    question: String,
    answer: String,
    ada_embedding: String,
}

/// 불변 지식 테이블
///
/// 모든 행의 임베딩 차원이 같음을 보장합니다.
#[derive(Debug, Clone)]
pub struct KnowledgeTable {
    rows: Vec<KnowledgeRow>,
    dimension: usize,
}

// ============================================================================
// KnowledgeTable
// ============================================================================

impl KnowledgeTable {
    /// 행 목록으로 테이블 생성
    ///
    /// 빈 테이블, 빈 임베딩, 차원이 다른 행은 에러입니다.
    pub fn from_rows(rows: Vec<KnowledgeRow>) -> Result<Self> {
        let Some(first) = rows.first() else {
            bail!("Knowledge table is empty");
        };

        let dimension = first.embedding.len();
        if dimension == 0 {
            bail!("Row 1 has an empty embedding");
        }

        for (i, row) in rows.iter().enumerate() {
            if row.embedding.len() != dimension {
                bail!(
                    "Row {} has embedding dimension {}, expected {}",
                    i + 1,
                    row.embedding.len(),
                    dimension
                );
            }
        }

        Ok(Self { rows, dimension })
    }

    /// CSV 파일에서 로드
    pub fn load_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open knowledge CSV: {}", path.display()))?;

        let table = Self::from_reader(file)
            .with_context(|| format!("Failed to load knowledge CSV: {}", path.display()))?;

        tracing::info!(
            "Loaded knowledge table: {} rows (dimension: {}) from {}",
            table.len(),
            table.dimension(),
            path.display()
        );
        Ok(table)
    }

    /// CSV 리더에서 로드 (헤더 필수)
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (i, record) in csv_reader.deserialize::<CsvRecord>().enumerate() {
            let record = record.with_context(|| format!("Invalid CSV record at row {}", i + 1))?;
            let embedding = parse_embedding(&record.ada_embedding)
                .with_context(|| format!("Invalid embedding at row {}", i + 1))?;

            rows.push(KnowledgeRow {
                question: record.question,
                answer: record.answer,
                embedding,
            });
        }

        Self::from_rows(rows)
    }

    pub fn rows(&self) -> &[KnowledgeRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 임베딩 차원
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// 각 행 임베딩의 슬라이스 이터레이터
    pub fn embeddings(&self) -> impl Iterator<Item = &[f32]> {
        self.rows.iter().map(|row| row.embedding.as_slice())
    }
}

/// 임베딩 배열 리터럴 파싱 (`[0.1, -0.2, 3e-4]`)
pub fn parse_embedding(literal: &str) -> Result<Vec<f32>> {
    let values: Vec<f32> =
        serde_json::from_str(literal.trim()).context("Embedding is not a numeric array literal")?;

    if values.iter().any(|v| !v.is_finite()) {
        bail!("Embedding contains non-finite values");
    }
    Ok(values)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE_CSV: &str = "\
,question,answer,ada_embedding
0,How do I reset my password?,Use the reset link.,\"[1.0, 0.0, 0.0]\"
1,Where is the office?,Second floor.,\"[0.0, 1.0, 0.0]\"
2,What are the opening hours?,9 to 5.,\"[0.0, 0.0, 1.0]\"
";

    #[test]
    fn test_parse_embedding() {
        assert_eq!(parse_embedding("[0.5, -1.0, 2e-1]").unwrap(), vec![0.5, -1.0, 0.2]);
        assert_eq!(parse_embedding(" [1] ").unwrap(), vec![1.0]);
        assert!(parse_embedding("not a list").is_err());
        assert!(parse_embedding("[\"a\"]").is_err());
    }

    #[test]
    fn test_from_reader_ignores_extra_columns() {
        let table = KnowledgeTable::from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.dimension(), 3);
        assert_eq!(table.rows()[1].question, "Where is the office?");
        assert_eq!(table.rows()[1].answer, "Second floor.");
        assert_eq!(table.rows()[1].embedding, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_load_csv_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CSV.as_bytes()).unwrap();

        let table = KnowledgeTable::load_csv(file.path()).unwrap();
        assert_eq!(table.len(), 3);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_load_csv_missing_file() {
        let result = KnowledgeTable::load_csv(Path::new("/nonexistent/embeddings.csv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let csv = "question,answer,ada_embedding\nq1,a1,\"[1.0, 0.0]\"\nq2,a2,\"[1.0]\"\n";
        let err = KnowledgeTable::from_reader(csv.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("dimension"));
    }

    #[test]
    fn test_empty_table_rejected() {
        let csv = "question,answer,ada_embedding\n";
        assert!(KnowledgeTable::from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_missing_column_rejected() {
        let csv = "question,answer\nq1,a1\n";
        assert!(KnowledgeTable::from_reader(csv.as_bytes()).is_err());
    }
}
