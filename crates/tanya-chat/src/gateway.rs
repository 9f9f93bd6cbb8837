//! Generative-text gateway.
//!
//! [`LlmGateway`] is the only way the chat engine talks to a model.
//! [`GeminiGateway`] implements it over the Gemini REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tanya_core::config::LlmConfig;

use crate::history::HistoryTurn;

/// Longest API error body kept in a [`GatewayError::Api`].
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Everything the model needs for one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: String,
    pub history: Vec<HistoryTurn>,
}

/// A model available to the configured key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
}

/// Gateway failures. Messages never contain request URLs or credentials.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("LLM request timed out after {0} seconds")]
    Timeout(u64),
    #[error("LLM transport error: {0}")]
    Http(String),
    #[error("LLM API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("LLM returned an empty response")]
    EmptyResponse,
    #[error("failed to parse LLM response: {0}")]
    Parse(String),
    #[error("API key variable {0} is not set")]
    MissingApiKey(String),
}

/// Text generation backend.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Generate a reply for the composed request.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, GatewayError>;

    /// Models available to this gateway.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError>;
}

// =============================================================================
// Gemini wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModelList {
    #[serde(default)]
    models: Vec<GeminiModel>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModel {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

/// Build the `generateContent` body. Consecutive turns of the same role are
/// merged into one content with several parts.
fn build_request(request: &GenerateRequest) -> GeminiRequest {
    let mut contents: Vec<GeminiContent> = Vec::new();
    for turn in &request.history {
        let role = turn.role.as_str();
        let part = GeminiPart {
            text: Some(turn.text.clone()),
        };
        match contents.last_mut() {
            Some(last) if last.role.as_deref() == Some(role) => last.parts.push(part),
            _ => contents.push(GeminiContent {
                role: Some(role.to_string()),
                parts: vec![part],
            }),
        }
    }

    let system_instruction = (!request.system_instruction.is_empty()).then(|| GeminiContent {
        role: None,
        parts: vec![GeminiPart {
            text: Some(request.system_instruction.clone()),
        }],
    });

    GeminiRequest {
        system_instruction,
        contents,
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GeminiResponse) -> Result<String, GatewayError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GatewayError::EmptyResponse);
    }
    Ok(text)
}

fn api_error(status: u16, body: &str) -> GatewayError {
    let message = match serde_json::from_str::<GeminiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    };
    GatewayError::Api { status, message }
}

// =============================================================================
// GeminiGateway
// =============================================================================

/// Gemini REST client. The API key is sent in the `x-goog-api-key` header.
#[derive(Clone)]
pub struct GeminiGateway {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Http(e.without_url().to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        })
    }

    /// Build from config, reading the key from the environment variable it names.
    pub fn from_config(config: &LlmConfig) -> Result<Self, GatewayError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GatewayError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(
            config.base_url.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout.as_secs())
        } else {
            GatewayError::Http(err.without_url().to_string())
        }
    }

    async fn read_error(&self, resp: reqwest::Response) -> GatewayError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        api_error(status, &body)
    }
}

impl std::fmt::Debug for GeminiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGateway")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmGateway for GeminiGateway {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, GatewayError> {
        let body = build_request(request);
        debug!(
            model = %request.model,
            turns = request.history.len(),
            "Sending generateContent request"
        );

        let resp = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, request.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !resp.status().is_success() {
            return Err(self.read_error(resp).await);
        }

        let data: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.without_url().to_string()))?;
        extract_text(data)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .get(format!("{}/models", self.base_url))
                .header("x-goog-api-key", &self.api_key)
                .query(&[("pageSize", "100")]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let resp = req.send().await.map_err(|e| self.transport_error(e))?;
            if !resp.status().is_success() {
                return Err(self.read_error(resp).await);
            }

            let page: GeminiModelList = resp
                .json()
                .await
                .map_err(|e| GatewayError::Parse(e.without_url().to_string()))?;

            models.extend(page.models.into_iter().map(|model| {
                let name = model
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(&model.name)
                    .to_string();
                ModelInfo {
                    display_name: model.display_name.unwrap_or_else(|| name.clone()),
                    name,
                    description: model.description,
                }
            }));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }
}
