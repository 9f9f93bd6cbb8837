//! Response writer: persists the bot turn and shapes the caller's reply.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tanya_core::types::NewMessage;
use tanya_storage::{Database, MessageRepository};

use crate::dispatcher::BotTurn;
use crate::error::ChatError;

/// Reply to one chat turn.
///
/// Serializes as `{"message": ...}` or `{"text": ..., "imageUrl": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatReply {
    Chart {
        text: String,
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
    Text {
        message: String,
    },
}

/// Appends bot messages for a turn, in order.
pub struct ResponseWriter {
    messages: MessageRepository,
}

impl ResponseWriter {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            messages: MessageRepository::new(db),
        }
    }

    /// Persist one message for a text turn, or caption then image for a
    /// chart turn.
    pub fn write(&self, conversation_id: Uuid, turn: BotTurn) -> Result<ChatReply, ChatError> {
        match turn {
            BotTurn::Text(message) => {
                self.messages
                    .append(conversation_id, &NewMessage::bot(message.clone()))?;
                Ok(ChatReply::Text { message })
            }
            BotTurn::Chart {
                caption,
                image_url,
                context,
            } => {
                self.messages
                    .append(conversation_id, &NewMessage::bot(caption.clone()))?;
                self.messages.append(
                    conversation_id,
                    &NewMessage::bot_image(image_url.clone(), context),
                )?;
                Ok(ChatReply::Chart {
                    text: caption,
                    image_url,
                })
            }
        }
    }
}
