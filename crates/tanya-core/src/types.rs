use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix marking message content as an image reference rather than text.
pub const IMAGE_PREFIX: &str = "image::";

// =============================================================================
// Enums
// =============================================================================

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The end user.
    User,
    /// The assistant (greetings, replies, captions, chart references).
    Bot,
}

impl Sender {
    /// Column value used in the `messages.sender` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }

    /// Parse the stored column value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Sender::User),
            "bot" => Some(Sender::Bot),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded message content.
///
/// Stored content is a plain string; a leading [`IMAGE_PREFIX`] turns it
/// into an image reference. Every consumer goes through [`MessageContent::parse`]
/// instead of checking the prefix itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    Image { url: String },
}

impl MessageContent {
    pub fn parse(stored: &str) -> Self {
        match stored.strip_prefix(IMAGE_PREFIX) {
            Some(url) => MessageContent::Image {
                url: url.to_string(),
            },
            None => MessageContent::Text {
                text: stored.to_string(),
            },
        }
    }

    /// Encode back into the stored string form.
    pub fn to_stored(&self) -> String {
        match self {
            MessageContent::Text { text } => text.clone(),
            MessageContent::Image { url } => format!("{}{}", IMAGE_PREFIX, url),
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        MessageContent::Image { url: url.into() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text { text: text.into() }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A registered user. Only identity is tracked here; sign-in lives elsewhere.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// The identity a request was authenticated as.
///
/// Passed explicitly into every conversation operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub name: String,
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            name: user.name.clone(),
        }
    }
}

/// A titled, user-owned thread of messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_owned_by(&self, user: &AuthenticatedUser) -> bool {
        self.user_id == user.user_id
    }
}

/// One persisted turn of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Storage-assigned sequence number; strictly increasing across inserts.
    pub seq: i64,
    pub conversation_id: Uuid,
    pub sender: Sender,
    /// Raw stored content (may carry the image prefix).
    pub content: String,
    /// Optional structured payload attached by the writer.
    pub context_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn parsed_content(&self) -> MessageContent {
        MessageContent::parse(&self.content)
    }

    pub fn is_image(&self) -> bool {
        self.content.starts_with(IMAGE_PREFIX)
    }
}

/// A message about to be appended to a conversation.
#[derive(Clone, Debug, PartialEq)]
pub struct NewMessage {
    pub sender: Sender,
    pub content: MessageContent,
    pub context_data: Option<serde_json::Value>,
}

impl NewMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            content: MessageContent::text(text),
            context_data: None,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            content: MessageContent::text(text),
            context_data: None,
        }
    }

    pub fn bot_image(url: impl Into<String>, context: serde_json::Value) -> Self {
        Self {
            sender: Sender::Bot,
            content: MessageContent::image(url),
            context_data: Some(context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_serialization() {
        let json = serde_json::to_string(&Sender::Bot).unwrap();
        assert_eq!(json, "\"bot\"");

        let deserialized: Sender = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(deserialized, Sender::User);
    }

    #[test]
    fn test_sender_parse_roundtrip() {
        for sender in [Sender::User, Sender::Bot] {
            assert_eq!(Sender::parse(sender.as_str()), Some(sender));
        }
        assert_eq!(Sender::parse("assistant"), None);
    }

    #[test]
    fn test_content_parse_plain_text() {
        let content = MessageContent::parse("Halo, ada yang bisa dibantu?");
        assert_eq!(content, MessageContent::text("Halo, ada yang bisa dibantu?"));
    }

    #[test]
    fn test_content_parse_image_prefix() {
        let content = MessageContent::parse("image::/charts/chart_1_2.png");
        assert_eq!(content, MessageContent::image("/charts/chart_1_2.png"));
        assert_eq!(content.to_stored(), "image::/charts/chart_1_2.png");
    }

    #[test]
    fn test_content_prefix_only_at_start() {
        let content = MessageContent::parse("see image::/x.png");
        assert!(matches!(content, MessageContent::Text { .. }));
    }

    #[test]
    fn test_content_serializes_with_kind_tag() {
        let json = serde_json::to_value(MessageContent::image("/charts/a.png")).unwrap();
        assert_eq!(json["kind"], "image");
        assert_eq!(json["url"], "/charts/a.png");
    }

    #[test]
    fn test_conversation_ownership() {
        let owner = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            name: "Sari".to_string(),
        };
        let stranger = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            name: "Budi".to_string(),
        };
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id: owner.user_id,
            title: "Percakapan".to_string(),
            created_at: Utc::now(),
        };
        assert!(conversation.is_owned_by(&owner));
        assert!(!conversation.is_owned_by(&stranger));
    }

    #[test]
    fn test_new_message_constructors() {
        let msg = NewMessage::bot_image("/charts/a.png", serde_json::json!({"type": "bar"}));
        assert_eq!(msg.sender, Sender::Bot);
        assert_eq!(msg.content.to_stored(), "image::/charts/a.png");
        assert!(msg.context_data.is_some());

        let msg = NewMessage::user("tren untuk Jawa Barat");
        assert_eq!(msg.sender, Sender::User);
        assert!(msg.context_data.is_none());
    }
}
