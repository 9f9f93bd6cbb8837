//! Route handler functions for all API endpoints.
//!
//! Each handler extracts the authenticated user and path/body parameters,
//! calls into the chat orchestrator, and returns JSON responses.

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tanya_chat::{ChatReply, ModelInfo};
use tanya_core::types::{AuthenticatedUser, Conversation, Message, MessageContent, Sender};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

/// Body for POST /api/conversations. The body itself is optional.
#[derive(Debug, Default, Deserialize)]
pub struct StartConversationRequest {
    pub title: Option<String>,
}

/// Body for POST /api/conversations/{id}/ask.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub message: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationView {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationView {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            title: c.title,
            created_at: c.created_at,
        }
    }
}

/// One message as shown to the client. `kind` is `text` or `image`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub seq: i64,
    pub sender: Sender,
    #[serde(flatten)]
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageView {
    fn from(m: Message) -> Self {
        Self {
            content: m.parsed_content(),
            id: m.id,
            seq: m.seq,
            sender: m.sender,
            context_data: m.context_data,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationList {
    pub conversations: Vec<ConversationView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub conversation: ConversationView,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub models: Vec<ModelInfo>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /api/conversations - the caller's conversations, newest first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ConversationList>, ApiError> {
    let conversations = state.orchestrator.list_conversations(&user)?;
    Ok(Json(ConversationList {
        conversations: conversations.into_iter().map(Into::into).collect(),
    }))
}

/// POST /api/conversations - start a conversation opened by the greeting.
pub async fn start_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Bytes,
) -> Result<(StatusCode, Json<ConversationDetail>), ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartConversationRequest::default()
    } else {
        serde_json::from_slice::<StartConversationRequest>(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?
    };

    let (conversation, greeting) = state
        .orchestrator
        .start_conversation(&user, request.title.as_deref())?;

    Ok((
        StatusCode::CREATED,
        Json(ConversationDetail {
            conversation: conversation.into(),
            messages: vec![greeting.into()],
        }),
    ))
}

/// GET /api/conversations/{id} - a conversation and its messages in order.
pub async fn show_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ConversationDetail>, ApiError> {
    let id = conversation_id(id)?;
    let (conversation, messages) = state.orchestrator.show(&user, id)?;
    Ok(Json(ConversationDetail {
        conversation: conversation.into(),
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}

/// POST /api/conversations/{id}/ask - run one chat turn.
pub async fn ask(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let id = conversation_id(id)?;
    let Json(request) =
        body.map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e.body_text())))?;

    let reply = state.orchestrator.ask(&user, id, &request.message).await?;
    Ok(Json(reply))
}

/// GET /api/models - models available to the configured key.
pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelList>, ApiError> {
    let models = state.orchestrator.list_models().await?;
    Ok(Json(ModelList { models }))
}

/// A malformed id can never name a stored conversation.
fn conversation_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|_| ApiError::NotFound("Conversation not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_view_flattens_content() {
        let message = Message {
            id: Uuid::new_v4(),
            seq: 3,
            conversation_id: Uuid::new_v4(),
            sender: Sender::Bot,
            content: "image::/charts/chart_a.png".to_string(),
            context_data: Some(serde_json::json!({"type": "bar"})),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(MessageView::from(message)).unwrap();
        assert_eq!(json["kind"], "image");
        assert_eq!(json["url"], "/charts/chart_a.png");
        assert_eq!(json["sender"], "bot");
        assert_eq!(json["context_data"]["type"], "bar");
    }

    #[test]
    fn test_text_message_view_omits_context() {
        let message = Message {
            id: Uuid::new_v4(),
            seq: 1,
            conversation_id: Uuid::new_v4(),
            sender: Sender::User,
            content: "Halo".to_string(),
            context_data: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(MessageView::from(message)).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["text"], "Halo");
        assert!(json.get("context_data").is_none());
    }
}
