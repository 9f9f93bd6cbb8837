//! History windowing.
//!
//! Turns the tail of a stored conversation into role-tagged turns for the
//! model. Never touches storage.

use serde::{Deserialize, Serialize};

use tanya_core::types::{Message, MessageContent, Sender};

// =============================================================================
// Turns
// =============================================================================

/// Role of a turn as the model sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl From<Sender> for Role {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::User => Role::User,
            Sender::Bot => Role::Model,
        }
    }
}

/// One role-tagged text turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

impl HistoryTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }

    /// Convert a stored message. Chart images become a short placeholder so
    /// the model knows a chart was already shown.
    pub fn from_message(message: &Message) -> Self {
        let text = match message.parsed_content() {
            MessageContent::Text { text } => text,
            MessageContent::Image { .. } => image_placeholder(message),
        };
        Self {
            role: message.sender.into(),
            text,
        }
    }
}

fn image_placeholder(message: &Message) -> String {
    let context = message.context_data.as_ref();
    let kind = context.and_then(|c| c.get("type")).and_then(|v| v.as_str());
    let column = context.and_then(|c| c.get("column")).and_then(|v| v.as_str());
    match (kind, column) {
        (Some(kind), Some(column)) => format!("[Grafik {} untuk {} telah ditampilkan]", kind, column),
        _ => "[Grafik telah ditampilkan]".to_string(),
    }
}

// =============================================================================
// HistoryWindower
// =============================================================================

/// Selects the most recent messages of a conversation.
#[derive(Clone, Copy, Debug)]
pub struct HistoryWindower {
    window: usize,
}

impl HistoryWindower {
    /// `window` counts every turn sent to the model, including the new user
    /// message.
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// How many stored messages precede the new user turn.
    pub fn prior_limit(&self) -> usize {
        self.window.saturating_sub(1)
    }

    /// The last `window` messages in their original order. Shorter input is
    /// returned whole.
    pub fn window(&self, messages: &[Message]) -> Vec<HistoryTurn> {
        let start = messages.len().saturating_sub(self.window);
        messages[start..].iter().map(HistoryTurn::from_message).collect()
    }

    /// Window over `prior` (the stored history without the new user message)
    /// followed by `latest` as the final user turn.
    pub fn with_latest(&self, prior: &[Message], latest: &str) -> Vec<HistoryTurn> {
        let mut turns = Self::new(self.prior_limit()).window(prior);
        turns.push(HistoryTurn::user(latest));
        turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn make_message(seq: i64, sender: Sender, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            seq,
            conversation_id: Uuid::nil(),
            sender,
            content: content.to_string(),
            context_data: None,
            created_at: Utc::now(),
        }
    }

    fn make_messages(count: usize) -> Vec<Message> {
        (0..count)
            .map(|i| {
                let sender = if i % 2 == 0 { Sender::Bot } else { Sender::User };
                make_message(i as i64, sender, &format!("m{}", i))
            })
            .collect()
    }

    #[test]
    fn test_window_shorter_than_size_returns_all() {
        let messages = make_messages(4);
        let turns = HistoryWindower::new(15).window(&messages);
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].text, "m0");
        assert_eq!(turns[3].text, "m3");
    }

    #[test]
    fn test_window_keeps_last_w_in_order() {
        for len in 0..40 {
            let messages = make_messages(len);
            for w in 1..20 {
                let turns = HistoryWindower::new(w).window(&messages);
                let expected: Vec<String> = messages
                    .iter()
                    .skip(len.saturating_sub(w))
                    .map(|m| m.content.clone())
                    .collect();
                let actual: Vec<String> = turns.into_iter().map(|t| t.text).collect();
                assert_eq!(actual, expected, "len={} w={}", len, w);
            }
        }
    }

    #[test]
    fn test_roles_mapped_from_sender() {
        let messages = vec![
            make_message(1, Sender::Bot, "Halo!"),
            make_message(2, Sender::User, "tren untuk Jawa Barat"),
        ];
        let turns = HistoryWindower::new(15).window(&messages);
        assert_eq!(turns[0].role, Role::Model);
        assert_eq!(turns[1].role, Role::User);
    }

    #[test]
    fn test_with_latest_appends_user_turn() {
        let messages = make_messages(30);
        let windower = HistoryWindower::new(15);
        let turns = windower.with_latest(&messages, "data tahun 2022");

        assert_eq!(turns.len(), 15);
        assert_eq!(turns[0].text, "m16");
        assert_eq!(turns[13].text, "m29");
        assert_eq!(turns[14], HistoryTurn::user("data tahun 2022"));
    }

    #[test]
    fn test_with_latest_sends_exactly_window_turns() {
        for len in 0..30 {
            let messages = make_messages(len);
            for w in 1..20 {
                let turns = HistoryWindower::new(w).with_latest(&messages, "baru");
                assert_eq!(turns.len(), (w - 1).min(len) + 1, "len={} w={}", len, w);
                assert_eq!(turns.last(), Some(&HistoryTurn::user("baru")));
                if w > 1 && len > 0 {
                    assert_eq!(turns[turns.len() - 2].text, format!("m{}", len - 1));
                }
            }
        }
    }

    #[test]
    fn test_with_latest_window_of_one() {
        let messages = make_messages(3);
        let turns = HistoryWindower::new(1).with_latest(&messages, "hai");
        assert_eq!(turns, vec![HistoryTurn::user("hai")]);
    }

    #[test]
    fn test_image_message_becomes_placeholder() {
        let mut image = make_message(3, Sender::Bot, "image::/charts/chart_a.png");
        image.context_data = Some(serde_json::json!({"type": "line", "column": "Jawa Barat"}));
        let turn = HistoryTurn::from_message(&image);
        assert_eq!(turn.role, Role::Model);
        assert_eq!(turn.text, "[Grafik line untuk Jawa Barat telah ditampilkan]");

        let bare = make_message(4, Sender::Bot, "image::/charts/chart_b.png");
        assert_eq!(
            HistoryTurn::from_message(&bare).text,
            "[Grafik telah ditampilkan]"
        );
    }

    #[test]
    fn test_window_does_not_mutate_input() {
        let messages = make_messages(5);
        let before = messages.clone();
        let _ = HistoryWindower::new(2).window(&messages);
        assert_eq!(messages, before);
    }
}
