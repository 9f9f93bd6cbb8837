use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Chart kinds the renderer understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
}

impl ChartKind {
    /// Value passed to the renderer's `--type` flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
        }
    }

    /// Case-insensitive parse; unknown kinds yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "line" => Some(ChartKind::Line),
            "bar" => Some(ChartKind::Bar),
            "pie" => Some(ChartKind::Pie),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chart to draw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderRequest {
    /// Dataset the chart is drawn from.
    pub dataset: PathBuf,
    /// Where the image must be written.
    pub output: PathBuf,
    pub kind: ChartKind,
    /// Column (region or year) to plot.
    pub column: String,
}
