//! Chart directive parsing.
//!
//! A reply may carry one `[chart:type=<kind>,column=<name>]` directive. The
//! raw text is classified once, right after the gateway call; everything
//! downstream works on [`AssistantReply`].

use std::sync::LazyLock;

use regex::Regex;

use tanya_chart::ChartKind;

static DIRECTIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\[\s*chart\s*:\s*type\s*=\s*([^,\]\s]+)\s*,\s*column\s*=\s*([^\]\n]*?)\s*\]",
    )
    .expect("Invalid chart directive regex")
});

/// A validated chart request extracted from a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDirective {
    pub kind: ChartKind,
    /// Region or year to plot, as written by the model.
    pub column: String,
    /// Reply text without the directive, or a default caption.
    pub caption: String,
}

/// A model reply, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantReply {
    PlainText(String),
    Chart(ChartDirective),
}

/// Classify a raw reply.
///
/// Only the first directive counts. Anything that does not fully match the
/// grammar, names an unknown kind, or has an empty or dash-led column is
/// plain text.
pub fn parse_reply(raw: &str) -> AssistantReply {
    let Some(captures) = DIRECTIVE_PATTERN.captures(raw) else {
        return AssistantReply::PlainText(raw.to_string());
    };

    let kind = captures.get(1).and_then(|m| ChartKind::parse(m.as_str()));
    let column = captures
        .get(2)
        .map(|m| m.as_str().trim().trim_matches('"').trim())
        .unwrap_or_default();

    // The column is passed as a renderer argument; a leading dash would read as a flag.
    let (Some(kind), false) = (kind, column.is_empty() || column.starts_with('-')) else {
        return AssistantReply::PlainText(raw.to_string());
    };

    let Some(whole) = captures.get(0) else {
        return AssistantReply::PlainText(raw.to_string());
    };
    let remainder = format!("{}{}", &raw[..whole.start()], &raw[whole.end()..]);
    let caption = clean_caption(&remainder).unwrap_or_else(|| default_caption(kind, column));

    AssistantReply::Chart(ChartDirective {
        kind,
        column: column.to_string(),
        caption,
    })
}

/// Caption shown when the model wrote nothing besides the directive.
pub fn default_caption(kind: ChartKind, column: &str) -> String {
    let label = match kind {
        ChartKind::Line => "garis",
        ChartKind::Bar => "batang",
        ChartKind::Pie => "lingkaran",
    };
    format!("Berikut grafik {} untuk {}.", label, column)
}

fn clean_caption(text: &str) -> Option<String> {
    let cleaned = text.replace("``", "");
    let cleaned = cleaned.trim().trim_matches('`').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
