//! Database schema migrations.
//!
//! Applies the initial schema: users, conversations, messages and the
//! schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use tanya_core::error::TanyaError;

/// Run all pending database migrations.
///
/// Migrations are tracked by version in `schema_migrations`; each version
/// is applied at most once.
pub fn run_migrations(conn: &Connection) -> Result<(), TanyaError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| TanyaError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| TanyaError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
///
/// Timestamps are epoch milliseconds. `messages.seq` is an AUTOINCREMENT key
/// so it never reuses a value, even after deletes.
fn apply_v1(conn: &Connection) -> Result<(), TanyaError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY NOT NULL,
            name            TEXT NOT NULL,
            email           TEXT NOT NULL UNIQUE,
            token_hash      TEXT NOT NULL UNIQUE,
            created_at      INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY NOT NULL,
            user_id         TEXT NOT NULL,
            title           TEXT NOT NULL,
            created_at      INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user
            ON conversations (user_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS messages (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL UNIQUE,
            conversation_id TEXT NOT NULL,
            sender          TEXT NOT NULL
                            CHECK (sender IN ('user', 'bot')),
            content         TEXT NOT NULL,
            context_data    TEXT,
            created_at      INTEGER NOT NULL,
            FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages (conversation_id, created_at, seq);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| TanyaError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
