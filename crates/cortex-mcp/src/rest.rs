//! `/api/v1/*` REST surface (spec §6.1). Thin routing only — every handler
//! maps request/response JSON onto a `cortex-core` call and an HTTP status;
//! no pipeline logic lives here.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, patch, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use cortex_core::{
    Category, CortexError, Layer, MemoryPatch, NewMemory, SearchFilters,
};

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recall", post(recall))
        .route("/ingest", post(ingest))
        .route("/flush", post(flush))
        .route("/search", post(search))
        .route("/memories", get(list_memories).post(create_memory))
        .route(
            "/memories/{id}",
            get(get_memory).patch(patch_memory).delete(delete_memory),
        )
        .route("/relations", get(list_relations))
        .route("/lifecycle/run", post(lifecycle_run))
        .route("/lifecycle/preview", post(lifecycle_preview))
        .route("/lifecycle/log", get(lifecycle_log))
        .route("/stats", get(stats))
        .route("/extraction-logs", get(extraction_logs))
        .route("/agents", get(list_agents))
        .route("/config", get(get_config))
        .route("/export", get(export))
        .route("/import", post(import))
        .route("/reindex", post(reindex))
}

/// Health is mounted separately at `/health` (not under `/api/*`) because it
/// must stay reachable without a bearer token (spec §6.1).
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

fn err_status(e: &CortexError) -> StatusCode {
    match e {
        CortexError::Validation(_) => StatusCode::BAD_REQUEST,
        CortexError::NotFound(_) => StatusCode::NOT_FOUND,
        CortexError::Conflict(_) => StatusCode::CONFLICT,
        CortexError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CortexError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CortexError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn cortex_error(e: CortexError) -> Response {
    let status = err_status(&e);
    (status, Json(json!({ "error": e.to_string(), "kind": e.kind() }))).into_response()
}

#[derive(Debug, Deserialize)]
struct RecallBody {
    agent_id: String,
    query: String,
    layers: Option<Vec<String>>,
    categories: Option<Vec<String>>,
    #[serde(default = "default_max_tokens")]
    max_tokens: usize,
}

fn default_max_tokens() -> usize {
    1000
}

async fn recall(State(state): State<Arc<AppState>>, Json(body): Json<RecallBody>) -> Response {
    let layers = body
        .layers
        .map(|ls| ls.iter().filter_map(|l| Layer::parse(l)).collect::<Vec<_>>())
        .filter(|ls| !ls.is_empty());
    let categories = body
        .categories
        .map(|cs| cs.iter().filter_map(|c| Category::parse(c)).collect::<Vec<_>>())
        .filter(|cs| !cs.is_empty());

    match state
        .gate
        .recall(cortex_core::RecallRequest {
            agent_id: body.agent_id,
            query: body.query,
            layers,
            categories,
            max_tokens: body.max_tokens,
        })
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => cortex_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct IngestBody {
    agent_id: String,
    user_message: String,
    assistant_message: String,
    #[serde(default)]
    recent_context: Vec<(String, String)>,
}

async fn ingest(State(state): State<Arc<AppState>>, Json(body): Json<IngestBody>) -> Response {
    let result = state
        .sieve
        .ingest(cortex_core::IngestRequest {
            agent_id: body.agent_id,
            user_message: body.user_message,
            assistant_message: body.assistant_message,
            recent_context: body.recent_context,
        })
        .await;
    Json(result).into_response()
}

#[derive(Debug, Deserialize)]
struct FlushBody {
    agent_id: String,
    session_id: String,
    messages: Vec<(String, String)>,
}

async fn flush(State(state): State<Arc<AppState>>, Json(body): Json<FlushBody>) -> Response {
    match state
        .flush
        .flush(cortex_core::FlushRequest {
            agent_id: body.agent_id,
            session_id: body.session_id,
            messages: body.messages,
        })
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => cortex_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    agent_id: String,
    query: String,
    layers: Option<Vec<String>>,
    categories: Option<Vec<String>>,
    #[serde(default = "default_search_limit")]
    limit: usize,
    #[serde(default)]
    debug: bool,
}

fn default_search_limit() -> usize {
    10
}

async fn search(State(state): State<Arc<AppState>>, Json(body): Json<SearchBody>) -> Response {
    let filters = SearchFilters {
        agent_id: body.agent_id,
        layers: body
            .layers
            .map(|ls| ls.iter().filter_map(|l| Layer::parse(l)).collect::<Vec<_>>())
            .filter(|ls| !ls.is_empty()),
        categories: body
            .categories
            .map(|cs| cs.iter().filter_map(|c| Category::parse(c)).collect::<Vec<_>>())
            .filter(|cs| !cs.is_empty()),
    };

    match state
        .search
        .search(&body.query, &filters, body.limit, body.debug)
        .await
    {
        Ok((results, debug)) => {
            let results: Vec<Value> = results
                .into_iter()
                .map(|r| {
                    json!({
                        "memory": r.memory,
                        "finalScore": r.final_score,
                        "textScore": r.text_score,
                        "vectorScore": r.vector_score,
                    })
                })
                .collect();
            Json(json!({ "results": results, "debug": debug })).into_response()
        }
        Err(e) => cortex_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct ListMemoriesQuery {
    agent_id: String,
    layer: Option<String>,
    #[serde(default = "default_list_limit")]
    limit: i64,
}

fn default_list_limit() -> i64 {
    100
}

async fn list_memories(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListMemoriesQuery>,
) -> Response {
    let layers = q.layer.as_deref().and_then(Layer::parse).map(|l| vec![l]);
    match state
        .store
        .list_active_memories(&q.agent_id, layers.as_deref(), q.limit)
    {
        Ok(memories) => Json(json!({ "memories": memories })).into_response(),
        Err(e) => cortex_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct CreateMemoryBody {
    agent_id: String,
    layer: String,
    category: String,
    content: String,
    source: String,
    importance: f64,
    confidence: f64,
    #[serde(default)]
    is_pinned: bool,
    #[serde(default)]
    metadata: Value,
}

async fn create_memory(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateMemoryBody>,
) -> Response {
    let Some(layer) = Layer::parse(&body.layer) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "unknown layer" }))).into_response();
    };
    let Some(category) = Category::parse(&body.category) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "unknown category" })))
            .into_response();
    };

    match state.store.insert_memory(NewMemory {
        layer,
        category,
        content: body.content,
        source: body.source,
        agent_id: body.agent_id,
        importance: body.importance,
        confidence: body.confidence,
        expires_at: None,
        is_pinned: body.is_pinned,
        metadata: body.metadata,
    }) {
        Ok(memory) => (StatusCode::CREATED, Json(memory)).into_response(),
        Err(e) => cortex_error(e),
    }
}

async fn get_memory(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.store.get_memory(&id) {
        Ok(Some(memory)) => Json(memory).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response(),
        Err(e) => cortex_error(e),
    }
}

#[derive(Debug, Deserialize, Default)]
struct PatchMemoryBody {
    importance: Option<f64>,
    confidence: Option<f64>,
    layer: Option<String>,
    is_pinned: Option<bool>,
    metadata: Option<Value>,
}

async fn patch_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PatchMemoryBody>,
) -> Response {
    let layer = match body.layer.as_deref().map(Layer::parse) {
        Some(None) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "unknown layer" })))
                .into_response();
        }
        Some(Some(l)) => Some(l),
        None => None,
    };

    let patch = MemoryPatch {
        importance: body.importance,
        confidence: body.confidence,
        layer,
        metadata: body.metadata,
        ..Default::default()
    };

    match state.store.update_memory(&id, patch) {
        Ok(memory) => Json(memory).into_response(),
        Err(e) => cortex_error(e),
    }
}

async fn delete_memory(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.store.delete_memory(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => cortex_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct AgentScopedQuery {
    agent_id: String,
    #[serde(default = "default_list_limit")]
    limit: i64,
}

async fn list_relations(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AgentScopedQuery>,
) -> Response {
    match state.store.list_relations(&q.agent_id, q.limit) {
        Ok(relations) => Json(json!({ "relations": relations })).into_response(),
        Err(e) => cortex_error(e),
    }
}

#[derive(Debug, Deserialize, Default)]
struct LifecycleRunBody {
    #[serde(default)]
    dry_run: bool,
}

async fn lifecycle_run(
    State(state): State<Arc<AppState>>,
    body: Option<Json<LifecycleRunBody>>,
) -> Response {
    let dry_run = body.map(|b| b.0.dry_run).unwrap_or(false);
    match state.lifecycle.run(dry_run).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => cortex_error(e),
    }
}

async fn lifecycle_preview(State(state): State<Arc<AppState>>) -> Response {
    match state.lifecycle.run(true).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => cortex_error(e),
    }
}

async fn lifecycle_log(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AgentScopedQuery>,
) -> Response {
    match state.store.list_lifecycle_log(&q.agent_id, q.limit) {
        Ok(entries) => Json(json!({ "entries": entries })).into_response(),
        Err(e) => cortex_error(e),
    }
}

async fn stats(State(state): State<Arc<AppState>>) -> Response {
    match state.store.stats() {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => cortex_error(e),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.store.stats() {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "degraded" })))
            .into_response(),
    }
}

async fn extraction_logs(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AgentScopedQuery>,
) -> Response {
    match state.store.list_extraction_log(&q.agent_id, q.limit) {
        Ok(entries) => Json(json!({ "entries": entries })).into_response(),
        Err(e) => cortex_error(e),
    }
}

async fn list_agents(State(state): State<Arc<AppState>>) -> Response {
    match state.store.list_agents() {
        Ok(agents) => Json(json!({ "agents": agents })).into_response(),
        Err(e) => cortex_error(e),
    }
}

async fn get_config(State(state): State<Arc<AppState>>) -> Response {
    Json(state.config.as_ref()).into_response()
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    agent_id: String,
}

async fn export(State(state): State<Arc<AppState>>, Query(q): Query<ExportQuery>) -> Response {
    match state.store.list_active_memories(&q.agent_id, None, i64::MAX) {
        Ok(memories) => Json(json!({ "agentId": q.agent_id, "memories": memories })).into_response(),
        Err(e) => cortex_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct ImportBody {
    agent_id: String,
    memories: Vec<ImportMemory>,
}

#[derive(Debug, Deserialize)]
struct ImportMemory {
    layer: String,
    category: String,
    content: String,
    #[serde(default = "default_import_source")]
    source: String,
    #[serde(default = "default_import_importance")]
    importance: f64,
    #[serde(default = "default_import_confidence")]
    confidence: f64,
    #[serde(default)]
    is_pinned: bool,
}

fn default_import_source() -> String {
    "import".to_string()
}
fn default_import_importance() -> f64 {
    0.5
}
fn default_import_confidence() -> f64 {
    0.8
}

async fn import(State(state): State<Arc<AppState>>, Json(body): Json<ImportBody>) -> Response {
    let mut imported = 0usize;
    let mut skipped = 0usize;

    for item in body.memories {
        let (Some(layer), Some(category)) =
            (Layer::parse(&item.layer), Category::parse(&item.category))
        else {
            skipped += 1;
            continue;
        };

        let outcome = state
            .store
            .insert_memory(NewMemory {
                layer,
                category,
                content: item.content,
                source: item.source,
                agent_id: body.agent_id.clone(),
                importance: item.importance,
                confidence: item.confidence,
                expires_at: None,
                is_pinned: item.is_pinned,
                metadata: json!({}),
            });

        match outcome {
            Ok(_) => imported += 1,
            Err(_) => skipped += 1,
        }
    }

    Json(json!({ "imported": imported, "skipped": skipped })).into_response()
}

#[derive(Debug, Deserialize)]
struct ReindexBody {
    agent_id: String,
}

/// Re-embeds and re-upserts every active memory for an agent into the
/// vector index, restoring the memory-without-vector half of the
/// consistency gap a crash between `insert_memory` and the vector upsert
/// can leave behind. The inverse (pruning vectors with no memory) isn't
/// implementable against `VectorIndex`'s API, which exposes no id listing.
async fn reindex(State(state): State<Arc<AppState>>, Json(body): Json<ReindexBody>) -> Response {
    let memories = match state.store.list_active_memories(&body.agent_id, None, i64::MAX) {
        Ok(m) => m,
        Err(e) => return cortex_error(e),
    };

    let mut reindexed = 0usize;
    let mut failed = 0usize;
    for memory in &memories {
        let upserted = match state.embeddings.embed(&memory.content).await {
            Ok(vector) => state
                .vector_index
                .upsert(&memory.id, &vector, &memory.agent_id)
                .is_ok(),
            Err(_) => false,
        };
        if upserted {
            reindexed += 1;
        } else {
            failed += 1;
        }
    }

    Json(json!({ "reindexed": reindexed, "failed": failed })).into_response()
}
