//! Application state shared across all route handlers.
//!
//! AppState holds the configuration and the orchestrator. It is passed to
//! handlers via axum's State extractor; all fields are cheap to clone.

use std::sync::Arc;
use std::time::Instant;

use docent_core::config::DocentConfig;

use crate::orchestrator::StreamingOrchestrator;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<DocentConfig>,
    /// Session registry + generation pipeline.
    pub orchestrator: StreamingOrchestrator,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: DocentConfig, orchestrator: StreamingOrchestrator) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            start_time: Instant::now(),
        }
    }
}
