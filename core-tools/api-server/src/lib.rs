//! Ingress server
//!
//! Accepts task submissions over HTTP and hands them to the engine through an
//! [`AdmissionHandle`]. A response only says whether the job was admitted;
//! the pipeline's outcome is reported to the submission's evaluation URL.
//!
//! # Endpoints
//!
//! - GET / - Server and queue status
//! - POST /ingest - Submit a task
//!
//! # Responses for POST /ingest
//!
//! | Status | Body                                         | When                        |
//! |--------|----------------------------------------------|-----------------------------|
//! | 200    | `{"status": "queued"}`                       | job admitted                |
//! | 400    | `{"error": "..."}`                           | malformed submission        |
//! | 401    | `{"error": "invalid_secret"}`                | shared secret mismatch      |
//! | 503    | `{"status": "queue_busy", "error": "..."}`   | no slot within the timeout  |

pub mod validation;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sdk::{AdmissionHandle, EngineError, SiteRequest};
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Ingress settings
#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// How long a submission may wait for a queue slot
    pub enqueue_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            enqueue_timeout: Duration::from_millis(200),
        }
    }
}

/// API server state shared across handlers
#[derive(Clone)]
struct ServerState {
    admission: AdmissionHandle,
    options: ServerOptions,
}

/// Build the ingress router
pub fn router(admission: AdmissionHandle, options: ServerOptions) -> Router {
    let state = ServerState { admission, options };

    Router::new()
        .route("/", get(status_handler))
        .route("/ingest", post(ingest_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: F,
) -> Result<(), EngineError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| EngineError::Network(format!("Failed to get local address: {}", e)))?;
    tracing::info!("Ingress listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Ingress shutting down gracefully");
        })
        .await
        .map_err(|e| EngineError::Network(format!("Ingress server error: {}", e)))
}

fn error_response(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

/// Server status endpoint
async fn status_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    let stats = state.admission.stats();
    Json(json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "time": chrono::Local::now().format("%d-%m-%Y %H:%M:%S").to_string(),
        "queue": {
            "capacity": stats.capacity,
            "len": stats.len,
            "workers": stats.workers,
        }
    }))
}

/// Submission endpoint
async fn ingest_handler(State(state): State<ServerState>, body: Bytes) -> Response {
    let request: SiteRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected undecodable submission");
            return error_response(StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }));
        }
    };

    let problems = validation::problems(&request);
    if !problems.is_empty() {
        tracing::debug!(task = %request.task, ?problems, "Rejected malformed submission");
        return error_response(
            StatusCode::BAD_REQUEST,
            json!({ "error": problems.join("; ") }),
        );
    }

    tracing::info!(?request, "Incoming submission");

    if !state.admission.verify_secret(&request.secret) {
        tracing::warn!(task = %request.task, "Rejected submission with invalid secret");
        return error_response(
            StatusCode::UNAUTHORIZED,
            json!({ "error": "invalid_secret" }),
        );
    }

    match state
        .admission
        .submit(request, state.options.enqueue_timeout)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "queued" }))).into_response(),
        Err(EngineError::QueueBusy) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "status": "queue_busy", "error": "queue_full_or_slow" }),
        ),
        Err(e) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "status": "unavailable", "error": e.to_string() }),
        ),
    }
}
