//! `reagent serve` — HTTP front for the reasoning loop.
//!
//! Routes:
//! - `GET /health` — liveness and version
//! - `GET /v1/tools` — the tool catalogue
//! - `POST /v1/chat` — `{message, session?}` → `{reply, iterations, artifact, termination, tools}`
//!
//! Ctrl+C stops accepting connections and cancels in-flight runs at their next
//! safe point.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use reagent_agent::{Termination, ToolDescriptor, ToolMetrics};
use reagent_core::config::Config;

use crate::chat::ChatService;

#[derive(Clone)]
struct AppState {
    chat: Arc<ChatService>,
    shutdown: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    session: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    reply: String,
    iterations: usize,
    artifact: Option<String>,
    termination: Termination,
    tools: ToolMetrics,
}

/// Build the router. Runs started through it are cancelled when `shutdown` fires.
pub fn build_router(chat: Arc<ChatService>, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/tools", get(tools_handler))
        .route("/v1/chat", post(chat_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { chat, shutdown })
}

/// Run the server until Ctrl+C.
pub async fn run(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let chat = Arc::new(ChatService::from_config(&config)?);
    let addr = format!(
        "{}:{}",
        host.unwrap_or(config.server.host),
        port.unwrap_or(config.server.port)
    );

    let shutdown = CancellationToken::new();
    let app = build_router(chat.clone(), shutdown.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    crate::helpers::print_banner();
    println!("  Listening on http://{addr}");
    println!();
    info!(addr = %addr, model = chat.agent().model(), "server starting");

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

// ─────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn tools_handler(State(state): State<AppState>) -> Json<Vec<ToolDescriptor>> {
    let registry = state.chat.agent().registry();
    Json(registry.descriptors().into_iter().cloned().collect())
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<Value>)> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "message must not be empty"})),
        ));
    }

    let session = request
        .session
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let cancel = state.shutdown.child_token();
    let outcome = state.chat.respond(session, message, &cancel).await;

    Ok(Json(ChatResponse {
        reply: outcome.final_text,
        iterations: outcome.iterations_used,
        artifact: outcome.artifact,
        termination: outcome.termination,
        tools: outcome.tool_metrics,
    }))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
