//! Error types for the chat engine.

use tanya_core::error::TanyaError;
use uuid::Uuid;

/// Errors from chat operations. Gateway and renderer failures never surface
/// here; they are turned into apology replies.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("conversation not found: {0}")]
    NotFound(Uuid),
    #[error("conversation {0} belongs to another user")]
    Forbidden(Uuid),
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<TanyaError> for ChatError {
    fn from(err: TanyaError) -> Self {
        ChatError::StorageError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::EmptyMessage;
        assert_eq!(err.to_string(), "message cannot be empty");

        let err = ChatError::MessageTooLong(2000);
        assert_eq!(
            err.to_string(),
            "message exceeds maximum length of 2000 characters"
        );

        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(
            ChatError::NotFound(id).to_string(),
            "conversation not found: 550e8400-e29b-41d4-a716-446655440000"
        );
        assert_eq!(
            ChatError::Forbidden(id).to_string(),
            "conversation 550e8400-e29b-41d4-a716-446655440000 belongs to another user"
        );
    }

    #[test]
    fn test_chat_error_from_tanya_error() {
        let storage_err = TanyaError::Storage("connection lost".to_string());
        let chat_err: ChatError = storage_err.into();
        assert!(matches!(chat_err, ChatError::StorageError(_)));
        assert!(chat_err.to_string().contains("connection lost"));
    }
}
