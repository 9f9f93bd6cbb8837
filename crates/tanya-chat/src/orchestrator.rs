//! Chat orchestrator: central coordinator for conversations and turns.
//!
//! Every operation takes the caller's identity explicitly and checks
//! ownership before touching anything.

use std::error::Error;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use tanya_chart::ChartRenderer;
use tanya_core::error::Result as CoreResult;
use tanya_core::types::{AuthenticatedUser, Conversation, Message, NewMessage};
use tanya_core::TanyaConfig;
use tanya_storage::{ConversationRepository, Database, MessageRepository};

use crate::directive::{parse_reply, AssistantReply};
use crate::dispatcher::{BotTurn, ToolCallDispatcher};
use crate::error::ChatError;
use crate::gateway::{GatewayError, LlmGateway, ModelInfo};
use crate::history::HistoryWindower;
use crate::locks::ConversationLocks;
use crate::prompt::{PromptComposer, GATEWAY_APOLOGY, GREETING};
use crate::response::{ChatReply, ResponseWriter};

/// Longest user input or error text written to the log.
const MAX_LOGGED_CHARS: usize = 200;

/// Longest accepted conversation title.
const MAX_TITLE_CHARS: usize = 120;

/// Central chat orchestrator.
pub struct ChatOrchestrator {
    conversations: ConversationRepository,
    messages: MessageRepository,
    windower: HistoryWindower,
    composer: PromptComposer,
    gateway: Arc<dyn LlmGateway>,
    dispatcher: ToolCallDispatcher,
    writer: ResponseWriter,
    locks: ConversationLocks,
    model: String,
    max_message_length: usize,
}

impl ChatOrchestrator {
    /// Wire the orchestrator from config. Fails only if a configured persona
    /// file cannot be read.
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn LlmGateway>,
        renderer: Arc<dyn ChartRenderer>,
        config: &TanyaConfig,
    ) -> CoreResult<Self> {
        let composer = PromptComposer::from_config(&config.chat)?;
        let dispatcher = ToolCallDispatcher::from_config(renderer, &config.chart);
        Ok(Self::with_parts(db, gateway, composer, dispatcher, config))
    }

    /// Wire the orchestrator from prebuilt parts.
    pub fn with_parts(
        db: Arc<Database>,
        gateway: Arc<dyn LlmGateway>,
        composer: PromptComposer,
        dispatcher: ToolCallDispatcher,
        config: &TanyaConfig,
    ) -> Self {
        Self {
            conversations: ConversationRepository::new(db.clone()),
            messages: MessageRepository::new(db.clone()),
            windower: HistoryWindower::new(config.chat.history_window),
            composer,
            gateway,
            dispatcher,
            writer: ResponseWriter::new(db),
            locks: ConversationLocks::new(),
            model: config.llm.model.clone(),
            max_message_length: config.chat.max_message_length,
        }
    }

    /// Start a conversation owned by `user`, opened with the bot greeting.
    pub fn start_conversation(
        &self,
        user: &AuthenticatedUser,
        title: Option<&str>,
    ) -> Result<(Conversation, Message), ChatError> {
        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => title.chars().take(MAX_TITLE_CHARS).collect(),
            None => default_title(),
        };

        let (conversation, greeting) =
            self.conversations
                .create_with_greeting(user.user_id, &title, GREETING)?;

        info!(
            conversation_id = %conversation.id,
            user_id = %user.user_id,
            "Conversation started"
        );
        Ok((conversation, greeting))
    }

    /// Conversations owned by `user`, newest first.
    pub fn list_conversations(
        &self,
        user: &AuthenticatedUser,
    ) -> Result<Vec<Conversation>, ChatError> {
        Ok(self.conversations.list_for_user(user.user_id)?)
    }

    /// A conversation with all its messages in replay order.
    pub fn show(
        &self,
        user: &AuthenticatedUser,
        conversation_id: Uuid,
    ) -> Result<(Conversation, Vec<Message>), ChatError> {
        let conversation = self.authorize(user, conversation_id)?;
        let messages = self.messages.list(conversation.id)?;
        Ok((conversation, messages))
    }

    /// Run one chat turn.
    ///
    /// Ownership and input are checked before anything is stored. Gateway and
    /// renderer failures become apology replies; only storage errors fail the
    /// call.
    pub async fn ask(
        &self,
        user: &AuthenticatedUser,
        conversation_id: Uuid,
        message: &str,
    ) -> Result<ChatReply, ChatError> {
        let conversation = self.authorize(user, conversation_id)?;

        let text = message.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }

        let _turn = self.locks.acquire(conversation.id).await;

        let stored = self.messages.append(conversation.id, &NewMessage::user(text))?;
        let prior = self.messages.recent(
            conversation.id,
            self.windower.prior_limit(),
            Some(stored.id),
        )?;
        let history = self.windower.with_latest(&prior, text);
        let request = self.composer.compose(&self.model, history);

        let reply = match self.gateway.generate(&request).await {
            Ok(raw) => {
                let cleaned = self.composer.sanitize(&raw);
                if cleaned.is_empty() {
                    warn!(
                        conversation_id = %conversation.id,
                        "Model reply was empty after sanitizing"
                    );
                    AssistantReply::PlainText(GATEWAY_APOLOGY.to_string())
                } else {
                    parse_reply(&cleaned)
                }
            }
            Err(e) => {
                log_gateway_failure(conversation.id, text, &e);
                AssistantReply::PlainText(GATEWAY_APOLOGY.to_string())
            }
        };

        let turn = self.dispatcher.dispatch(conversation.id, reply).await;
        let kind = match &turn {
            BotTurn::Text(_) => "text",
            BotTurn::Chart { .. } => "chart",
        };
        let reply = self.writer.write(conversation.id, turn)?;

        info!(conversation_id = %conversation.id, reply = kind, "Chat turn completed");
        Ok(reply)
    }

    /// Models the gateway can serve.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        self.gateway.list_models().await.inspect_err(|e| {
            error!(error = %truncate(&e.to_string(), MAX_LOGGED_CHARS), "Listing models failed");
        })
    }

    /// Resolve a conversation the caller owns.
    fn authorize(
        &self,
        user: &AuthenticatedUser,
        conversation_id: Uuid,
    ) -> Result<Conversation, ChatError> {
        let conversation = self
            .conversations
            .find_by_id(conversation_id)?
            .ok_or(ChatError::NotFound(conversation_id))?;

        if !conversation.is_owned_by(user) {
            warn!(
                conversation_id = %conversation_id,
                user_id = %user.user_id,
                "Rejected access to another user's conversation"
            );
            return Err(ChatError::Forbidden(conversation_id));
        }
        Ok(conversation)
    }
}

fn default_title() -> String {
    format!("Percakapan {}", Utc::now().format("%d-%m-%Y %H:%M"))
}

fn log_gateway_failure(conversation_id: Uuid, input: &str, err: &GatewayError) {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    error!(
        conversation_id = %conversation_id,
        user_input = %truncate(input, MAX_LOGGED_CHARS),
        error = %truncate(&chain, MAX_LOGGED_CHARS),
        "LLM gateway call failed"
    );
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
