//! Chart rendering for Tanya.
//!
//! The renderer itself is an external program treated as a black box. This
//! crate owns the invocation contract, the timeout, and output file naming.

pub mod error;
pub mod output;
pub mod renderer;
pub mod types;

pub use error::RenderError;
pub use output::chart_output_path;
pub use renderer::{ChartRenderer, ScriptRenderer};
pub use types::{ChartKind, RenderRequest};
