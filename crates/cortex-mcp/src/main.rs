//! Cortex server entry point: wires the pipeline stages into `AppState` and
//! runs the combined REST + MCP HTTP server.

mod protocol;
mod rest;
mod server;
mod state;
mod tools;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use cron::Schedule;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use cortex_core::providers::{CachedEmbeddingProvider, EmbeddingProvider};
use cortex_core::{
    Config, EmbeddingCache, Flush, Gate, HybridSearch, LifecycleEngine, LocalEmbeddingProvider,
    MemoryWriter, Sieve, Store, SystemClock, VectorIndex, VectorIndexConfig,
};

use crate::protocol::http::{HttpTransport, HttpTransportConfig};
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "cortex-mcp", version, about = "Long-term memory server for conversational AI agents")]
struct Cli {
    /// Path to a JSON config file. Falls back to defaults and env overrides
    /// (`CORTEX_HOST`, `CORTEX_PORT`, `CORTEX_DB_PATH`, `CORTEX_AUTH_TOKEN`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the SQLite database path.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "cortex", "mcp")
        .map(|dirs| dirs.config_dir().join("config.json"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("Cortex server v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.clone().or_else(default_config_path);
    let mut config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    let config = Arc::new(config);

    let store = match Store::open(Some(config.db_path.clone())) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("failed to open store at {:?}: {e}", config.db_path);
            std::process::exit(1);
        }
    };
    info!(db_path = ?config.db_path, "store opened");

    let vector_index = Arc::new(VectorIndex::new(VectorIndexConfig::default()));
    if let Err(e) = vector_index.initialize(vector_index.dimensions()) {
        error!("failed to initialize vector index: {e}");
        std::process::exit(1);
    }

    let cache = Arc::new(EmbeddingCache::new(config.embedding_cache_capacity));
    let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(CachedEmbeddingProvider::new(
        LocalEmbeddingProvider::new(),
        cache,
    ));

    // Cortex has no remote chat/reranker adapter configured by default — the
    // deep sieve channel, gate expansion/rerank, and flush distillation all
    // degrade to their non-LLM paths until a provider is wired in.
    let chat = None;
    let reranker = None;

    let clock: Arc<dyn cortex_core::Clock> = Arc::new(SystemClock::default());

    let writer = Arc::new(MemoryWriter::new(
        store.clone(),
        vector_index.clone(),
        embeddings.clone(),
        chat.clone(),
        config.clone(),
        clock.clone(),
    ));
    let search = Arc::new(HybridSearch::new(
        store.clone(),
        vector_index.clone(),
        embeddings.clone(),
        config.clone(),
        clock.clone(),
    ));
    let gate = Arc::new(Gate::new(search.clone(), chat.clone(), reranker, config.clone()));
    let sieve = Arc::new(Sieve::new(store.clone(), writer.clone(), chat.clone(), config.clone()));
    let flush = Arc::new(Flush::new(store.clone(), writer.clone(), chat, config.clone()));
    let lifecycle = Arc::new(LifecycleEngine::new(
        store.clone(),
        vector_index.clone(),
        embeddings.clone(),
        None,
        config.clone(),
        clock,
    ));

    let app_state = AppState {
        store,
        writer,
        vector_index,
        embeddings,
        sieve,
        gate,
        flush,
        lifecycle: lifecycle.clone(),
        search,
        config: config.clone(),
    };

    spawn_lifecycle_scheduler(lifecycle, config.lifecycle_cron.clone());

    let transport = HttpTransport::new(HttpTransportConfig {
        host: config.host.clone(),
        port: config.port,
    });

    if let Err(e) = transport.run(app_state).await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}

/// Runs the background lifecycle sweep (spec §4.10) on the configured cron
/// schedule. `cron`'s expressions carry a leading seconds field that the
/// plain 5-field `lifecycle_cron` config value doesn't, so a `"0 "` field is
/// prepended before parsing.
fn spawn_lifecycle_scheduler(lifecycle: Arc<LifecycleEngine>, expression: String) {
    let schedule = match Schedule::from_str(&format!("0 {expression}")) {
        Ok(s) => s,
        Err(e) => {
            warn!("invalid lifecycle_cron '{expression}': {e}, background sweeps disabled");
            return;
        }
    };

    tokio::spawn(async move {
        loop {
            let now = chrono::Utc::now();
            let Some(next) = schedule.upcoming(chrono::Utc).find(|t| *t > now) else {
                warn!("lifecycle schedule produced no upcoming run, stopping scheduler");
                return;
            };
            let wait = (next - now).to_std().unwrap_or(std::time::Duration::from_secs(60));
            tokio::time::sleep(wait).await;

            match lifecycle.run(false).await {
                Ok(report) => info!(?report, "lifecycle sweep complete"),
                Err(e) => warn!("lifecycle sweep failed: {e}"),
            }
        }
    });
}
