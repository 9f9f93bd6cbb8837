//! Error types for chart rendering.

use std::path::PathBuf;

/// Errors from a single render invocation.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Chart renderer timed out after {0} seconds")]
    Timeout(u64),
    #[error("Chart renderer exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("Chart renderer produced no file at {0}")]
    MissingOutput(PathBuf),
    #[error("Failed to launch chart renderer: {0}")]
    Spawn(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
