//! Tanya Storage crate - SQLite persistence for users, conversations and messages.
//!
//! Provides a WAL-mode SQLite database with versioned migrations and
//! repositories that keep every conversation's message log in replay order.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{ConversationRepository, MessageRepository, UserRepository};
