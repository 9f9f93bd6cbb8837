use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TanyaError};

/// Top-level configuration for the Tanya service.
///
/// Loaded from `~/.tanya/config.toml` by default. Secrets are never stored
/// here: the LLM key is read from the environment variable named by
/// [`LlmConfig::api_key_env`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TanyaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub chart: ChartConfig,
}

impl TanyaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TanyaConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist. A file that exists but is broken is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("No config file at {}. Using defaults.", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chat.history_window == 0 {
            return Err(TanyaError::Config(
                "chat.history_window must be at least 1".to_string(),
            ));
        }
        if self.chat.max_message_length == 0 {
            return Err(TanyaError::Config(
                "chat.max_message_length must be at least 1".to_string(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(TanyaError::Config(
                "llm.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.chart.timeout_secs == 0 {
            return Err(TanyaError::Config(
                "chart.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(TanyaError::Config("llm.model must not be empty".to_string()));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.tanya/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Extra origins allowed by CORS (the server's own origin is always allowed).
    pub allowed_origins: Vec<String>,
    /// Requests per second accepted on the authenticated API.
    pub rate_limit_per_sec: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            allowed_origins: Vec::new(),
            rate_limit_per_sec: 50,
        }
    }
}

/// Generative-text API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the Gemini REST API.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Conversation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of turns sent to the model, including the new user message.
    pub history_window: usize,
    /// Maximum accepted user message length in characters.
    pub max_message_length: usize,
    /// Optional file replacing the built-in persona instructions.
    pub persona_file: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: 15,
            max_message_length: 2000,
            persona_file: None,
        }
    }
}

/// External chart renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Program used to run the renderer script.
    pub interpreter: String,
    /// Renderer script path.
    pub script: String,
    /// Dataset every chart is drawn from.
    pub dataset: String,
    /// Directory rendered images are written to and served from.
    pub output_dir: String,
    /// URL prefix under which `output_dir` is served.
    pub public_url: String,
    /// Renderer timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            script: "scripts/generate_chart.py".to_string(),
            dataset: "data/dataset.csv".to_string(),
            output_dir: "~/.tanya/charts".to_string(),
            public_url: "/charts".to_string(),
            timeout_secs: 20,
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn resolve_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}
