//! Shared configuration, error and domain types for Tanya.

pub mod config;
pub mod error;
pub mod types;

pub use config::TanyaConfig;
pub use error::{Result, TanyaError};
pub use types::*;
