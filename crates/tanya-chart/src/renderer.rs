//! Chart renderer trait and the subprocess implementation.

use std::path::PathBuf;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use tanya_core::config::{resolve_path, ChartConfig};

use crate::error::RenderError;
use crate::types::RenderRequest;

/// Longest stderr excerpt kept in a [`RenderError::Failed`].
const MAX_STDERR_CHARS: usize = 500;

/// Draws a chart image for a request.
///
/// Implementations block; async callers run them on a blocking thread.
pub trait ChartRenderer: Send + Sync {
    /// Render the chart and return the path of the written image.
    fn render(&self, request: &RenderRequest) -> Result<PathBuf, RenderError>;
}

/// Runs an external script as
/// `<interpreter> <script> --file <dataset> --output <path> --type <kind> --column <name>`.
#[derive(Debug, Clone)]
pub struct ScriptRenderer {
    interpreter: String,
    script: PathBuf,
    timeout: Duration,
}

impl ScriptRenderer {
    pub fn new(interpreter: impl Into<String>, script: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ChartConfig) -> Self {
        Self::new(
            config.interpreter.clone(),
            resolve_path(&config.script),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

impl ChartRenderer for ScriptRenderer {
    fn render(&self, request: &RenderRequest) -> Result<PathBuf, RenderError> {
        if let Some(parent) = request.output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        debug!(
            script = %self.script.display(),
            kind = %request.kind,
            column = %request.column,
            output = %request.output.display(),
            "Launching chart renderer"
        );

        let started = Instant::now();
        let mut child = Command::new(&self.interpreter)
            .arg(&self.script)
            .arg("--file")
            .arg(&request.dataset)
            .arg("--output")
            .arg(&request.output)
            .arg("--type")
            .arg(request.kind.as_str())
            .arg("--column")
            .arg(&request.column)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RenderError::Spawn(format!("{}: {}", self.interpreter, e)))?;

        // Drained concurrently so a chatty script cannot fill the pipe and stall.
        let (stderr_tx, stderr_rx) = mpsc::channel();
        if let Some(mut pipe) = child.stderr.take() {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                let _ = stderr_tx.send(buf);
            });
        }

        let status = wait_with_timeout(&mut child, started, self.timeout)?;

        // A process the script left behind may still hold stderr open; the
        // deadline covers that wait too.
        let remaining = self.timeout.saturating_sub(started.elapsed());
        let stderr = match stderr_rx.recv_timeout(remaining) {
            Ok(buf) => buf,
            Err(mpsc::RecvTimeoutError::Disconnected) => Vec::new(),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Chart renderer left stderr open past its deadline"
                );
                return Err(RenderError::Timeout(self.timeout.as_secs()));
            }
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            warn!(code = ?status.code(), "Chart renderer failed");
            return Err(RenderError::Failed {
                code: status.code(),
                stderr: truncate(stderr.trim(), MAX_STDERR_CHARS),
            });
        }

        if !request.output.is_file() {
            return Err(RenderError::MissingOutput(request.output.clone()));
        }

        Ok(request.output.clone())
    }
}

/// Poll the child until it exits, killing it once `timeout` has elapsed
/// since `start`.
fn wait_with_timeout(
    child: &mut Child,
    start: Instant,
    timeout: Duration,
) -> Result<ExitStatus, RenderError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }

        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RenderError::Timeout(timeout.as_secs()));
        }

        thread::sleep(Duration::from_millis(50));
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
