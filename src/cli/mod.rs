//! CLI 모듈
//!
//! qna-rag CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{
    has_api_key, OpenAiConfig, ServerConfig, DEFAULT_CSV_PATH, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_SIMILARITY_CUTOFF, DEFAULT_SIMILARITY_TOP_K, DEFAULT_TOP_N, DEFAULT_TREE_DIR,
    DEFAULT_VECTOR_DIR,
};
use crate::embedding::create_embedder;
use crate::engine::PersistedIndex;
use crate::knowledge::{KnowledgeTable, SimilarityRanker};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "qna-rag")]
#[command(version, about = "임베딩 유사도 + 인덱스 질의 Q&A 서버", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// HTTP 서버 실행
    Serve(ServeArgs),

    /// 지식 테이블에서 유사 질문 검색 (1회)
    Ask {
        /// 질문
        question: String,

        /// 결과 개수
        #[arg(short, long, default_value_t = DEFAULT_TOP_N)]
        limit: usize,

        /// 임베딩 CSV 경로
        #[arg(long, env = "QNA_CSV_PATH", default_value = DEFAULT_CSV_PATH)]
        csv: PathBuf,
    },

    /// 상태 확인
    Status(DataArgs),
}

/// 데이터 파일 위치
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// 임베딩 CSV 경로
    #[arg(long, env = "QNA_CSV_PATH", default_value = DEFAULT_CSV_PATH)]
    pub csv: PathBuf,

    /// 트리 인덱스 디렉토리
    #[arg(long, env = "QNA_TREE_DIR", default_value = DEFAULT_TREE_DIR)]
    pub tree_dir: PathBuf,

    /// 벡터 스토어 인덱스 디렉토리
    #[arg(long, env = "QNA_VECTOR_DIR", default_value = DEFAULT_VECTOR_DIR)]
    pub vector_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// 바인드 주소
    #[arg(long, env = "QNA_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// 포트
    #[arg(short, long, env = "QNA_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[command(flatten)]
    pub data: DataArgs,

    /// /embbeding 결과 개수
    #[arg(long, env = "QNA_TOP_N", default_value_t = DEFAULT_TOP_N)]
    pub top_n: usize,

    /// 벡터 스토어 검색 노드 수
    #[arg(long, env = "QNA_SIMILARITY_TOP_K", default_value_t = DEFAULT_SIMILARITY_TOP_K)]
    pub similarity_top_k: usize,

    /// 벡터 스토어 유사도 컷오프
    #[arg(long, env = "QNA_SIMILARITY_CUTOFF", default_value_t = DEFAULT_SIMILARITY_CUTOFF)]
    pub similarity_cutoff: f32,
}

impl ServeArgs {
    /// 인자 + 환경변수 -> 서버 설정
    pub fn into_config(self, openai: OpenAiConfig) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            csv_path: self.data.csv,
            tree_dir: self.data.tree_dir,
            vector_dir: self.data.vector_dir,
            top_n: self.top_n,
            similarity_top_k: self.similarity_top_k,
            similarity_cutoff: self.similarity_cutoff,
            openai,
        }
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => cmd_serve(args).await,
        Commands::Ask {
            question,
            limit,
            csv,
        } => cmd_ask(&question, limit, &csv).await,
        Commands::Status(data) => cmd_status(&data),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 서버 실행 명령어 (serve)
async fn cmd_serve(args: ServeArgs) -> Result<()> {
    let openai = OpenAiConfig::from_env().context("OpenAI 설정 로드 실패")?;
    let config = args.into_config(openai);

    crate::server::serve(config).await
}

/// 유사 질문 검색 명령어 (ask)
async fn cmd_ask(question: &str, limit: usize, csv: &Path) -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\
             설정: export OPENAI_API_KEY=your-key (또는 .env 파일)"
        );
    }
    if limit == 0 {
        bail!("--limit는 1 이상이어야 합니다");
    }

    let table = Arc::new(KnowledgeTable::load_csv(csv).context("지식 테이블 로드 실패")?);
    let embedder = create_embedder(OpenAiConfig::from_env()?, table.dimension())?;
    let ranker = SimilarityRanker::new(table, Arc::new(embedder), limit)?;

    println!("[*] 검색 중: \"{}\"", question);
    let results = ranker.search(question).await.context("검색 실패")?;

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());
    for result in results {
        println!("{}. {}", result.rank, truncate_text(&result.question, 80));
        println!("   답변: {}", truncate_text(&result.answer, 200));
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(data: &DataArgs) -> Result<()> {
    println!("qna-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export OPENAI_API_KEY=your-key");
    }

    match KnowledgeTable::load_csv(&data.csv) {
        Ok(table) => println!(
            "[OK] 지식 테이블: {} 행 (차원 {}) - {}",
            table.len(),
            table.dimension(),
            data.csv.display()
        ),
        Err(e) => println!("[!] 지식 테이블 로드 실패: {:#}", e),
    }

    for (label, dir) in [("트리 인덱스", &data.tree_dir), ("벡터 스토어", &data.vector_dir)] {
        match PersistedIndex::load(dir) {
            Ok(index) => println!(
                "[OK] {}: {} ({} 노드) - {}",
                label,
                index.structure.kind(),
                index.node_count(),
                dir.display()
            ),
            Err(e) => println!("[!] {} 로드 실패: {:#}", label, e),
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_truncate_unicode() {
        let korean = "안녕하세요 세계";
        let truncated = truncate_text(korean, 5);
        assert_eq!(truncated, "안녕하세요...");
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["qna-rag", "serve"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, DEFAULT_PORT);
        assert_eq!(args.top_n, 3);
        assert_eq!(args.similarity_top_k, 2);
        assert!((args.similarity_cutoff - 0.85).abs() < f32::EPSILON);
        assert_eq!(args.data.tree_dir, PathBuf::from("./tree"));
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from([
            "qna-rag",
            "serve",
            "--port",
            "8080",
            "--csv",
            "data/q.csv",
            "--top-n",
            "5",
            "--similarity-cutoff",
            "0.7",
        ])
        .unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };

        let config = args.into_config(OpenAiConfig {
            api_key: "sk-test".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
        });
        assert_eq!(config.port, 8080);
        assert_eq!(config.csv_path, PathBuf::from("data/q.csv"));
        assert_eq!(config.top_n, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ask_requires_question() {
        assert!(Cli::try_parse_from(["qna-rag", "ask"]).is_err());
        let cli = Cli::try_parse_from(["qna-rag", "ask", "where is it?", "-l", "2"]).unwrap();
        match cli.command {
            Commands::Ask { question, limit, .. } => {
                assert_eq!(question, "where is it?");
                assert_eq!(limit, 2);
            }
            _ => panic!("expected ask"),
        }
    }
}
