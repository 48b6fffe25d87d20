//! Docent server crate - axum HTTP/WebSocket server and the streaming
//! orchestrator.
//!
//! Serves the persistent connection at `/ws/{session_id}` (query frames in,
//! protocol frames out), the non-streaming fallback at `POST /chat`, plus
//! health and session teardown endpoints. The orchestrator guarantees
//! at-most-one in-flight generation per session and turns the retrieval +
//! generation pipeline into the partial/terminal frame sequence.

pub mod error;
pub mod handlers;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use llm::{DynLanguageModel, GenerationError, HttpModel, LanguageModel, MockModel};
pub use orchestrator::{ChatAnswer, ChatError, StreamingOrchestrator};
pub use routes::{create_router, start_server};
pub use state::AppState;
