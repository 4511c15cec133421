//! HTTP transport: mounts the REST API (spec §6.1) and the MCP JSON-RPC
//! surface (`POST /mcp/message`, `GET /mcp/sse`) on one axum `Router`.
//!
//! Unlike the upstream Streamable-HTTP transport this is grounded on, there
//! is no per-session `McpServer` — one shared instance handles every
//! request, since the spec names no session lifecycle.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::rest;
use crate::server::McpServer;
use crate::state::AppState;

const SSE_KEEPALIVE: Duration = Duration::from_secs(15);

pub struct HttpTransportConfig {
    pub host: String,
    pub port: u16,
}

pub struct HttpTransport {
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        Self { config }
    }

    pub async fn run(self, state: AppState) -> Result<(), std::io::Error> {
        let auth_token = state.config.auth_token.clone();
        let rate_limit_per_minute = state.config.rate_limit_per_minute;
        let mcp_server = Arc::new(Mutex::new(McpServer::new(state.clone())));
        let shared_state = Arc::new(state);

        let per_second = (rate_limit_per_minute.max(1) as f64 / 60.0).ceil() as u64;
        let governor_config = std::sync::Arc::new(
            tower_governor::governor::GovernorConfigBuilder::default()
                .key_extractor(tower_governor::key_extractor::SmartIpKeyExtractor)
                .per_second(per_second.max(1))
                .burst_size(rate_limit_per_minute.max(1))
                .finish()
                .expect("rate limit config"),
        );

        let mut api = rest::router()
            .route("/mcp/message", post(mcp_message))
            .route("/mcp/sse", get(mcp_sse))
            .layer(tower_governor::GovernorLayer::new(governor_config))
            .with_state(shared_state.clone());

        if let Some(token) = auth_token {
            api = api.layer(middleware::from_fn_with_state(
                Arc::new(token),
                require_bearer_token,
            ));
        }

        let app = Router::new()
            .nest("/api/v1", api)
            .merge(rest::health_router().with_state(shared_state.clone()))
            .layer(axum::Extension(mcp_server));

        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        info!("Cortex HTTP server listening on http://{addr}");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Cortex HTTP server shutting down");
        Ok(())
    }
}

async fn require_bearer_token(
    State(expected): State<Arc<String>>,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let supplied = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match supplied {
        Some(token) if token == expected.as_str() => next.run(request).await,
        _ => (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": "unauthorized" })))
            .into_response(),
    }
}

async fn mcp_message(
    axum::Extension(server): axum::Extension<Arc<Mutex<McpServer>>>,
    body: String,
) -> Response {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!("failed to parse JSON-RPC request: {e}");
            let error_resp = JsonRpcResponse::error(None, JsonRpcError::parse_error());
            return (StatusCode::BAD_REQUEST, Json(error_resp)).into_response();
        }
    };

    let mut server = server.lock().await;
    match server.handle_request(request).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Announces server info and the tool list, then emits a comment keepalive
/// every 15 seconds for as long as the client stays connected.
async fn mcp_sse(
    axum::Extension(server): axum::Extension<Arc<Mutex<McpServer>>>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    use axum::response::sse::Event;

    let announcement = {
        let mut server = server.lock().await;
        let init = server
            .handle_request(JsonRpcRequest {
                jsonrpc: "2.0".to_string(),
                id: Some(serde_json::json!(0)),
                method: "initialize".to_string(),
                params: None,
            })
            .await;
        let tools = server
            .handle_request(JsonRpcRequest {
                jsonrpc: "2.0".to_string(),
                id: Some(serde_json::json!(0)),
                method: "tools/list".to_string(),
                params: None,
            })
            .await;
        serde_json::json!({ "server": init.and_then(|r| r.result), "tools": tools.and_then(|r| r.result) })
    };

    let initial = stream::once(async move {
        Ok(Event::default().event("server_info").data(announcement.to_string()))
    });

    let keepalive = stream::unfold((), move |_| async move {
        tokio::time::sleep(SSE_KEEPALIVE).await;
        Some((Ok(Event::default().comment("keepalive")), ()))
    });

    Sse::new(initial.chain(keepalive)).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(SSE_KEEPALIVE)
            .text("keepalive"),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
