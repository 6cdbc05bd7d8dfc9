//! HTTP reply server.
//!
//! Small JSON API in front of the reply pipeline, suitable for bridging a
//! messaging transport (a bot adapter, a webhook relay) to the persona.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/reply` | Produce one reply for an incoming message |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /reply` takes `{"conversation_key": "...", "text": "...",
//! "quoted_text": "..."}` (`quoted_text` optional) and returns the reply as
//! plain text. Pipeline failures never surface to the transport: the handler
//! body is the fixed fallback reply and the error goes to stderr. Only a
//! malformed request earns a 400.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! transports.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::pipeline::ServingContext;

/// Starts the reply server.
///
/// Loads the persona and index artifacts once, binds to `[server].bind`, and
/// serves until the process is terminated. Fatal when no persona artifact
/// exists.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let ctx = ServingContext::load(config.clone())?;

    println!("serving persona '{}'", ctx.persona.person_name);
    println!(
        "  retrieval: {}",
        match &ctx.index {
            Some(entries) if !entries.is_empty() => format!("{} indexed pairs", entries.len()),
            _ => "off (no index)".to_string(),
        }
    );
    println!("  model: {}", ctx.config.generation.effective_model());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/reply", post(handle_reply))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(ctx);

    println!("reply server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /reply ============

/// JSON request body for `POST /reply`.
#[derive(Deserialize)]
struct ReplyRequest {
    /// Transport-level conversation identifier; scopes the rolling history.
    conversation_key: String,
    /// The incoming message text.
    text: String,
    /// Message being replied to, when the transport carries one.
    #[serde(default)]
    quoted_text: Option<String>,
}

/// Handler for `POST /reply`. Returns the reply as plain text.
async fn handle_reply(
    State(ctx): State<Arc<ServingContext>>,
    Json(request): Json<ReplyRequest>,
) -> Result<String, AppError> {
    if request.conversation_key.trim().is_empty() {
        return Err(bad_request("conversation_key must not be empty"));
    }
    if request.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }

    let reply = ctx
        .handle_message(
            &request.conversation_key,
            &request.text,
            request.quoted_text.as_deref(),
        )
        .await;
    Ok(reply)
}
