//! Docent application binary - composition root.
//!
//! Ties the crates together into a single executable:
//! 1. Load configuration from TOML
//! 2. Initialize storage (SQLite history) and the in-memory retriever
//! 3. Pick the language-model backend (HTTP if configured, mock otherwise)
//! 4. Start the axum HTTP/WebSocket server
//!
//! Document ingestion happens outside this process; the retriever trait is
//! the seam a production vector store plugs into.

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use docent_core::config::DocentConfig;
use docent_core::error::DocentError;
use docent_retrieval::{ChunkIndex, DynRetriever, HashEmbedder, IndexRetriever};
use docent_server::{
    AppState, DynLanguageModel, HttpModel, MockModel, StreamingOrchestrator,
};
use docent_storage::{Database, HistoryRepository, SqliteHistory};

use cli::Cli;

/// Expand a leading `~/` against $HOME.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Pick the model backend: an OpenAI-compatible endpoint when
/// DOCENT_LLM_BASE_URL is set, the deterministic mock otherwise.
fn select_model(config: &DocentConfig) -> Arc<dyn DynLanguageModel> {
    match std::env::var("DOCENT_LLM_BASE_URL") {
        Ok(base_url) if !base_url.is_empty() => {
            let api_key = std::env::var("DOCENT_API_KEY").ok();
            tracing::info!(model = %config.llm.model, base_url = %base_url, "Using HTTP model backend");
            Arc::new(HttpModel::new(
                base_url,
                api_key,
                config.llm.model.clone(),
                config.llm.temperature,
            ))
        }
        _ => {
            tracing::info!("DOCENT_LLM_BASE_URL not set; using the mock model backend");
            Arc::new(MockModel::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), DocentError> {
    let cli = Cli::parse();

    let config_path = expand_home(&cli.config.to_string_lossy());
    let mut config = DocentConfig::load_or_default(&config_path);
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.general.data_dir = data_dir;
    }

    init_tracing(&config.general.log_level);
    tracing::info!(config = %config_path.display(), "Docent starting");

    // Storage: SQLite history under the data directory.
    let data_dir = expand_home(&config.general.data_dir);
    let database = Arc::new(Database::new(&data_dir.join("docent.db"))?);
    let history: Arc<dyn HistoryRepository> = Arc::new(SqliteHistory::new(database));

    // Retrieval: in-memory index; empty until an external ingester fills it.
    let index = Arc::new(ChunkIndex::new());
    let retriever: Arc<dyn DynRetriever> = Arc::new(IndexRetriever::new(
        index,
        HashEmbedder::new(),
        config.retrieval.top_k,
    ));

    let model = select_model(&config);

    let orchestrator = StreamingOrchestrator::new(
        retriever,
        model,
        history,
        config.chat.clone(),
        config.llm.clone(),
    );

    let state = AppState::new(config, orchestrator);
    docent_server::start_server(state).await
}
