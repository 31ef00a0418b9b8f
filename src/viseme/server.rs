//! HTTP server for the remote sequencing endpoint.
//!
//! Serves the same computation as [`LocalSequencer`] over the wire contract
//! that [`RemoteSequencer`](super::RemoteSequencer) speaks.
//!
//! ## Endpoints
//!
//! - `POST /viseme/elevenlabs`: sequence text from per-character timestamps
//! - `GET /health`: liveness probe

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use super::local::{LocalSequencer, SequencingRevision};
use super::remote::{VISEME_ENDPOINT_PATH, VisemeRequest, VisemeResponse};
use crate::config::ServerConfig;
use crate::error::{LipSyncError, Result};

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details within an [`ErrorResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub message: String,
    /// Error type (e.g. `"invalid_request_error"`).
    #[serde(rename = "type")]
    pub error_type: String,
}

/// Response from `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Entries in the dictionary backing the sequencer.
    pub dictionary_entries: usize,
}

#[derive(Clone)]
struct AppState {
    sequencer: Arc<LocalSequencer>,
}

/// Viseme sequencing HTTP server running in a background task.
///
/// The task is aborted when the server is dropped.
pub struct VisemeServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl VisemeServer {
    /// Start the server.
    ///
    /// Binds to `{config.host}:{config.port}` (use port `0` for auto-assign)
    /// and begins serving in a background tokio task. The sequencer's
    /// dictionary serves every revision; the revision itself is chosen per
    /// request.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(sequencer: LocalSequencer, config: &ServerConfig) -> Result<Self> {
        let app = router(sequencer);

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| LipSyncError::Config(format!("viseme server bind failed: {e}")))?;
        let addr = listener.local_addr()?;

        info!("viseme server listening on http://{addr}{VISEME_ENDPOINT_PATH}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("viseme server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Base URL suitable for [`RemoteSequencer::new`](super::RemoteSequencer::new).
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }

    /// Wait until the server task exits (it only does so on error or abort).
    pub async fn wait(&mut self) {
        let _ = (&mut self.handle).await;
    }
}

impl Drop for VisemeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Build the router without binding, for embedding in a larger app.
pub fn router(sequencer: LocalSequencer) -> Router {
    let state = AppState {
        sequencer: Arc::new(sequencer),
    };
    Router::new()
        .route(VISEME_ENDPOINT_PATH, post(handle_sequence))
        .route("/health", get(handle_health))
        .with_state(state)
}

fn error_response(status: StatusCode, message: String, error_type: &str) -> Response {
    let body = ErrorResponse {
        error: ErrorBody {
            message,
            error_type: error_type.to_owned(),
        },
    };
    (status, Json(body)).into_response()
}

/// `POST /viseme/elevenlabs`
async fn handle_sequence(
    State(state): State<AppState>,
    Json(request): Json<VisemeRequest>,
) -> Response {
    let request_id = Uuid::new_v4();
    let Some(revision) = SequencingRevision::from_version(request.version) else {
        debug!(%request_id, version = request.version, "rejecting unsupported version");
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("unsupported version {}", request.version),
            "invalid_request_error",
        );
    };

    let sequencer = state.sequencer.as_ref().clone().with_revision(revision);
    let sequence = sequencer.sequence_with_end_times(
        &request.sentence,
        &request.start_seconds,
        &request.end_seconds,
    );
    debug!(
        %request_id,
        version = request.version,
        chars = request.start_seconds.len(),
        visemes = sequence.len(),
        "sequenced request"
    );

    Json(VisemeResponse {
        viseme_list: sequence.into_vec(),
    })
    .into_response()
}

/// `GET /health`
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_owned(),
        dictionary_entries: state.sequencer.dictionary().len(),
    })
}
