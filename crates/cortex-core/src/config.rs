//! Configuration: JSON file → environment variables → built-in defaults
//! (spec §6.4, SPEC_FULL §13). Loaded once into an `Arc<Config>` at startup
//! and swappable atomically on hot-reload.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{CortexError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub auth_token: Option<String>,

    // --- MemoryWriter dedup thresholds (spec §4.9) ---
    pub exact_dup_threshold: f64,
    pub similarity_threshold: f64,
    pub legacy_dedup_threshold: f64,
    pub smart_update_enabled: bool,

    // --- Lifecycle thresholds (spec §4.10) ---
    pub promotion_threshold: f64,
    pub archive_threshold: f64,
    pub decay_lambda: f64,
    pub archive_ttl_days: i64,
    pub dedup_jaccard_threshold: f64,
    pub dedup_strip_prefixes: Vec<String>,
    pub compress_back_to_core: bool,
    pub lifecycle_cron: String,

    // --- HybridSearch fusion weights (spec §4.4) ---
    pub vector_weight: f32,
    pub text_weight: f32,
    pub access_boost_cap: i64,

    // --- Gate reranker fusion weight (spec §4.7 step 6) ---
    pub rerank_weight: f32,

    // --- Working memory (spec §4.5, §4.10) ---
    pub working_memory_ttl_hours: i64,

    // --- Per-call timeouts, seconds (spec §5) ---
    pub timeout_recall_secs: u64,
    pub timeout_ingest_secs: u64,
    pub timeout_flush_secs: u64,
    pub timeout_health_secs: u64,
    pub timeout_reranker_secs: u64,
    pub timeout_llm_secs: u64,
    pub timeout_vector_secs: u64,

    // --- Rate limiting (spec §6.1) ---
    pub rate_limit_per_minute: u32,

    // --- Cache (spec §2) ---
    pub embedding_cache_capacity: usize,
    pub profile_cache_ttl_hours: i64,

    // --- Sieve (spec §4.5) ---
    pub parallel_channels: bool,
    pub deep_channel_context_messages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            db_path: PathBuf::from("cortex/brain.db"),
            auth_token: None,

            exact_dup_threshold: 0.08,
            similarity_threshold: 0.35,
            legacy_dedup_threshold: 0.15,
            smart_update_enabled: true,

            promotion_threshold: 0.6,
            archive_threshold: 0.2,
            decay_lambda: 0.03,
            archive_ttl_days: 90,
            dedup_jaccard_threshold: 0.85,
            dedup_strip_prefixes: vec![
                "User said:".to_string(),
                "用户说：".to_string(),
                "Assistant:".to_string(),
            ],
            compress_back_to_core: true,
            lifecycle_cron: "0 3 * * *".to_string(),

            vector_weight: 0.7,
            text_weight: 0.3,
            access_boost_cap: 20,

            rerank_weight: 0.5,

            working_memory_ttl_hours: 24 * 7,

            timeout_recall_secs: 3,
            timeout_ingest_secs: 5,
            timeout_flush_secs: 5,
            timeout_health_secs: 2,
            timeout_reranker_secs: 10,
            timeout_llm_secs: 30,
            timeout_vector_secs: 10,

            rate_limit_per_minute: 120,

            embedding_cache_capacity: 4096,
            profile_cache_ttl_hours: 24,

            parallel_channels: true,
            deep_channel_context_messages: 6,
        }
    }
}

impl Config {
    /// Resolve config with full precedence: file → env → defaults (spec §6.4).
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut cfg = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| CortexError::internal(format!("reading config file: {e}")))?;
                cfg = serde_json::from_str(&text)
                    .map_err(|e| CortexError::validation(format!("invalid config file: {e}")))?;
            }
        }

        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CORTEX_HOST") {
            self.host = v;
        }
        if let Ok(v) = std::env::var("CORTEX_PORT") {
            if let Ok(p) = v.parse() {
                self.port = p;
            }
        }
        if let Ok(v) = std::env::var("CORTEX_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CORTEX_AUTH_TOKEN") {
            self.auth_token = Some(v);
        }
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| CortexError::internal(format!("serializing config: {e}")))?;
        std::fs::write(path, text)
            .map_err(|e| CortexError::internal(format!("writing config file: {e}")))?;
        Ok(())
    }
}

/// Hot-swappable config handle (spec §9 "Shared global state"). Readers take
/// a cheap `Arc` clone; a reload call swaps the whole config atomically.
#[derive(Clone)]
pub struct SharedConfig(Arc<RwLock<Arc<Config>>>);

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(config))))
    }

    pub fn get(&self) -> Arc<Config> {
        self.0.read().expect("config lock poisoned").clone()
    }

    pub fn swap(&self, new_config: Config) {
        *self.0.write().expect("config lock poisoned") = Arc::new(new_config);
    }
}
