//! Route handler functions for all API endpoints.
//!
//! HTTP handlers extract parameters via axum extractors and return JSON;
//! the WebSocket handler drives the per-session frame loop, processing
//! query frames sequentially in arrival order.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use docent_core::protocol::{ProtocolFrame, QueryFrame};
use docent_core::session::SessionId;

use crate::error::ApiError;
use crate::orchestrator::{ChatError, GENERATION_FAILURE_MESSAGE};
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default = "default_session")]
    pub session_id: String,
    #[serde(default)]
    pub stream: bool,
}

fn default_session() -> String {
    "default".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub sources: Vec<String>,
    pub session_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub uptime_secs: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClearedResponse {
    pub message: String,
    pub cleared: bool,
}

// =============================================================================
// HTTP handlers
// =============================================================================

/// GET /health - liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model: state.config.llm.model.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// POST /chat - non-streaming request/response path.
///
/// This is the endpoint FallbackTransport targets when no persistent
/// connection is available; the caller treats the result as a synthetic
/// immediate `complete`.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session = SessionId::new(request.session_id.clone());
    let answer = state
        .orchestrator
        .respond(&session, &request.query)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ChatResponse {
        response: answer.content,
        sources: answer.sources,
        session_id: request.session_id,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// DELETE /sessions/{session_id} - clear server-side session state.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<SessionClearedResponse> {
    let session = SessionId::new(session_id.clone());
    let cleared = state.orchestrator.end_session(&session);
    Json(SessionClearedResponse {
        message: format!("Session {} cleared.", session_id),
        cleared,
    })
}

// =============================================================================
// WebSocket handler
// =============================================================================

/// GET /ws/{session_id} - the persistent connection.
pub async fn ws(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let session = SessionId::new(session_id);
    upgrade.on_upgrade(move |socket| stream_session(state, session, socket))
}

/// Per-connection loop: query frames in, protocol frames out.
///
/// Queries are processed one at a time in arrival order, so frames for one
/// exchange are never interleaved with another's on this connection. The
/// orchestrator additionally enforces at-most-one in-flight across
/// transports.
async fn stream_session(state: AppState, session: SessionId, mut socket: WebSocket) {
    info!(session = %session, "WebSocket session opened");

    while let Some(inbound) = socket.recv().await {
        let message = match inbound {
            Ok(message) => message,
            Err(e) => {
                debug!(session = %session, error = %e, "WebSocket read error");
                break;
            }
        };

        let text = match message {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let query = match serde_json::from_str::<QueryFrame>(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                // Malformed frames are dropped; the connection stays open.
                warn!(session = %session, error = %e, "Dropping malformed query frame");
                continue;
            }
        };

        if query.stream {
            match state.orchestrator.stream_query(&session, &query.query) {
                Ok(mut frames) => {
                    while let Some(frame) = frames.recv().await {
                        if send_frame(&mut socket, &frame).await.is_err() {
                            info!(session = %session, "Client disconnected mid-stream");
                            return;
                        }
                    }
                }
                Err(e) => {
                    // Rejected before any frame exists; nothing is emitted
                    // for the exchange.
                    warn!(session = %session, error = %e, "Rejected query");
                }
            }
        } else {
            let frame = match state.orchestrator.respond(&session, &query.query).await {
                Ok(answer) => Some(ProtocolFrame::Complete {
                    content: answer.content,
                    sources: answer.sources,
                }),
                Err(ChatError::Retrieval(_)) | Err(ChatError::Generation(_)) => {
                    Some(ProtocolFrame::Error {
                        content: GENERATION_FAILURE_MESSAGE.to_string(),
                    })
                }
                Err(e) => {
                    warn!(session = %session, error = %e, "Rejected query");
                    None
                }
            };
            if let Some(frame) = frame {
                if send_frame(&mut socket, &frame).await.is_err() {
                    return;
                }
            }
        }
    }

    info!(session = %session, "WebSocket session closed");
}

async fn send_frame(socket: &mut WebSocket, frame: &ProtocolFrame) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(text) => socket.send(WsMessage::Text(text.into())).await,
        Err(e) => {
            warn!(error = %e, "Failed to encode frame");
            Ok(())
        }
    }
}
