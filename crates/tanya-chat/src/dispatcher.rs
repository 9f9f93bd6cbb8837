//! Tool-call dispatch: turns a classified reply into the bot turn to persist.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use tanya_chart::{chart_output_path, ChartRenderer, RenderError, RenderRequest};
use tanya_core::config::{resolve_path, ChartConfig};

use crate::directive::{AssistantReply, ChartDirective};
use crate::prompt::CHART_APOLOGY;

/// What the bot says for one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum BotTurn {
    /// A single text message.
    Text(String),
    /// A caption followed by an image reference.
    Chart {
        caption: String,
        image_url: String,
        context: serde_json::Value,
    },
}

/// Runs chart directives through a [`ChartRenderer`].
pub struct ToolCallDispatcher {
    renderer: Arc<dyn ChartRenderer>,
    dataset: PathBuf,
    output_dir: PathBuf,
    public_url: String,
}

impl ToolCallDispatcher {
    pub fn new(
        renderer: Arc<dyn ChartRenderer>,
        dataset: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            renderer,
            dataset: dataset.into(),
            output_dir: output_dir.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(renderer: Arc<dyn ChartRenderer>, config: &ChartConfig) -> Self {
        Self::new(
            renderer,
            resolve_path(&config.dataset),
            resolve_path(&config.output_dir),
            config.public_url.clone(),
        )
    }

    /// Plain text passes through. A chart directive is rendered; if that
    /// fails the turn becomes the chart apology.
    pub async fn dispatch(&self, conversation_id: Uuid, reply: AssistantReply) -> BotTurn {
        match reply {
            AssistantReply::PlainText(text) => BotTurn::Text(text),
            AssistantReply::Chart(directive) => {
                match self.render(conversation_id, &directive).await {
                    Ok(turn) => turn,
                    Err(e) => {
                        error!(
                            conversation_id = %conversation_id,
                            kind = %directive.kind,
                            column = %directive.column,
                            error = %e,
                            "Chart rendering failed"
                        );
                        BotTurn::Text(CHART_APOLOGY.to_string())
                    }
                }
            }
        }
    }

    async fn render(
        &self,
        conversation_id: Uuid,
        directive: &ChartDirective,
    ) -> Result<BotTurn, RenderError> {
        let output = chart_output_path(&self.output_dir, conversation_id, Utc::now());
        let request = RenderRequest {
            dataset: self.dataset.clone(),
            output,
            kind: directive.kind,
            column: directive.column.clone(),
        };

        let renderer = self.renderer.clone();
        let written = tokio::task::spawn_blocking(move || renderer.render(&request))
            .await
            .map_err(|e| RenderError::Spawn(format!("render task failed: {}", e)))??;

        let file_name = written
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| RenderError::MissingOutput(written.clone()))?;
        let image_url = format!("{}/{}", self.public_url, file_name);

        info!(
            conversation_id = %conversation_id,
            kind = %directive.kind,
            column = %directive.column,
            file = %file_name,
            "Chart rendered"
        );

        Ok(BotTurn::Chart {
            caption: directive.caption.clone(),
            image_url,
            context: serde_json::json!({
                "type": directive.kind.as_str(),
                "column": directive.column,
                "file": file_name,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    use tanya_chart::ChartKind;

    /// Writes an empty file and records every request.
    #[derive(Default)]
    struct RecordingRenderer {
        requests: Mutex<Vec<RenderRequest>>,
    }

    impl ChartRenderer for RecordingRenderer {
        fn render(&self, request: &RenderRequest) -> Result<PathBuf, RenderError> {
            self.requests.lock().unwrap().push(request.clone());
            std::fs::write(&request.output, b"png")?;
            Ok(request.output.clone())
        }
    }

    struct FailingRenderer;

    impl ChartRenderer for FailingRenderer {
        fn render(&self, _request: &RenderRequest) -> Result<PathBuf, RenderError> {
            Err(RenderError::Timeout(20))
        }
    }

    fn make_directive() -> ChartDirective {
        ChartDirective {
            kind: ChartKind::Line,
            column: "Jawa Barat".to_string(),
            caption: "Berikut tren Jawa Barat.".to_string(),
        }
    }

    fn make_dispatcher(renderer: Arc<dyn ChartRenderer>, dir: &Path) -> ToolCallDispatcher {
        ToolCallDispatcher::new(renderer, dir.join("dataset.csv"), dir, "/charts/")
    }

    #[tokio::test]
    async fn test_plain_text_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(RecordingRenderer::default());
        let dispatcher = make_dispatcher(renderer.clone(), dir.path());

        let turn = dispatcher
            .dispatch(Uuid::new_v4(), AssistantReply::PlainText("Halo".to_string()))
            .await;
        assert_eq!(turn, BotTurn::Text("Halo".to_string()));
        assert!(renderer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chart_directive_renders() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(RecordingRenderer::default());
        let dispatcher = make_dispatcher(renderer.clone(), dir.path());
        let conversation_id = Uuid::new_v4();

        let turn = dispatcher
            .dispatch(conversation_id, AssistantReply::Chart(make_directive()))
            .await;

        let requests = renderer.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, ChartKind::Line);
        assert_eq!(requests[0].column, "Jawa Barat");
        assert_eq!(requests[0].dataset, dir.path().join("dataset.csv"));

        match turn {
            BotTurn::Chart {
                caption,
                image_url,
                context,
            } => {
                assert_eq!(caption, "Berikut tren Jawa Barat.");
                let prefix = format!("/charts/chart_{}_", conversation_id);
                assert!(image_url.starts_with(&prefix), "{}", image_url);
                assert!(image_url.ends_with(".png"));
                assert_eq!(context["type"], "line");
                assert_eq!(context["column"], "Jawa Barat");
            }
            other => panic!("expected chart turn, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_repeated_render_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(RecordingRenderer::default());
        let dispatcher = make_dispatcher(renderer.clone(), dir.path());
        let conversation_id = Uuid::new_v4();

        for _ in 0..3 {
            dispatcher
                .dispatch(conversation_id, AssistantReply::Chart(make_directive()))
                .await;
        }

        let requests = renderer.requests.lock().unwrap();
        let mut outputs: Vec<_> = requests.iter().map(|r| r.output.clone()).collect();
        outputs.sort();
        outputs.dedup();
        assert_eq!(outputs.len(), 3);
    }

    #[tokio::test]
    async fn test_render_failure_becomes_apology() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = make_dispatcher(Arc::new(FailingRenderer), dir.path());

        let turn = dispatcher
            .dispatch(Uuid::new_v4(), AssistantReply::Chart(make_directive()))
            .await;
        assert_eq!(turn, BotTurn::Text(CHART_APOLOGY.to_string()));
    }
}
