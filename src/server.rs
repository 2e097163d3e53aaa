//! Chat HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Classify a patient message and answer it |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /chat` takes `{"message": "..."}` (a missing `message` counts as an
//! empty string) and returns
//! `{"agent_response": "...", "intent": "FAQ_ANSWER" | "SCHEDULING"}`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_ready", "message": "index 'clinic-faqs-index' not ready after 30 attempts" } }
//! ```
//!
//! | Code | Status | Raised for |
//! |------|--------|------------|
//! | `bad_request` | 400 | empty FAQ query |
//! | `not_ready` | 503 | vector index still initialising |
//! | `upstream_error` | 502 | Gemini or Pinecone failure |
//! | `configuration` | 500 | missing credentials, disabled embeddings |
//! | `internal` | 500 | anything else |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front ends can
//! call `/chat` directly.

use axum::{
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::error::RagError;
use crate::indexer::IndexOutcome;
use crate::models::{ChatRequest, ChatResponse};
use crate::services::Services;

/// Build services from `config`, optionally index, then serve on
/// `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Services::from_config(config)?;
    let listener = TcpListener::bind(&config.server.bind).await?;
    serve(listener, services, config.server.index_on_startup).await
}

/// Serve on an already-bound listener with prebuilt services.
///
/// With `index_on_startup`, the FAQ file is indexed before the first request
/// is accepted. Indexing failures are logged and do not stop the server.
///
/// # Errors
///
/// Fails only if the listener address cannot be read or axum stops with an
/// I/O error.
pub async fn serve(
    listener: TcpListener,
    services: Services,
    index_on_startup: bool,
) -> anyhow::Result<()> {
    if index_on_startup {
        run_startup_index(&services).await;
    }

    let addr = listener.local_addr()?;
    tracing::info!(%addr, index = services.index.index_name(), "chat server listening");
    println!("Chat server listening on http://{}", addr);

    axum::serve(listener, app(services)).await?;
    Ok(())
}

/// Router with all routes and layers, without binding.
pub fn app(services: Services) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
        tracing::info_span!(
            "request",
            id = %Uuid::new_v4(),
            method = %req.method(),
            path = %req.uri().path(),
        )
    });

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(trace)
        .with_state(services)
}

/// Indexing failures at startup are logged; the server still starts.
async fn run_startup_index(services: &Services) {
    match services.indexer().index_faq_data().await {
        Ok(report) if report.outcome == IndexOutcome::Completed => tracing::info!(
            entries = report.entries,
            batches = report.batches,
            "startup indexing complete"
        ),
        Ok(_) => tracing::warn!("startup indexing skipped"),
        Err(e) => tracing::error!(error = %e, "startup indexing failed"),
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// Converts failures into the JSON error contract.
struct AppError {
    status: StatusCode,
    code: &'static str,
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

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let (status, code) = match err.downcast_ref::<RagError>() {
            Some(RagError::EmptyQuery) => (StatusCode::BAD_REQUEST, "bad_request"),
            Some(RagError::IndexNotReady { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
            }
            Some(RagError::Api { .. }) | Some(RagError::InvalidResponse { .. }) => {
                (StatusCode::BAD_GATEWAY, "upstream_error")
            }
            Some(RagError::Configuration(_)) | Some(RagError::EmbeddingDisabled) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration")
            }
            None => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            tracing::error!(code, error = %err, "chat request failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /chat ============

async fn handle_chat(
    State(services): State<Services>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let response = services.router.handle(&request.message).await?;
    Ok(Json(response))
}
