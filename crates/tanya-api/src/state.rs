//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use tanya_chat::ChatOrchestrator;
use tanya_core::config::TanyaConfig;
use tanya_storage::Database;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (read-only after startup).
    pub config: Arc<TanyaConfig>,
    /// SQLite database, used directly for token lookup.
    pub database: Arc<Database>,
    /// Chat engine behind every conversation endpoint.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: TanyaConfig,
        database: Arc<Database>,
        orchestrator: Arc<ChatOrchestrator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            database,
            orchestrator,
            start_time: Instant::now(),
        }
    }
}
