//! HTTP surface for Tanya.
//!
//! Bearer-token authenticated JSON API over the chat orchestrator, plus
//! static serving of rendered chart images.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use routes::{create_router, start_server};
pub use state::AppState;
