//! Repository implementations for SQLite-backed persistence.
//!
//! Provides UserRepository, ConversationRepository and MessageRepository
//! that operate on the Database struct using raw SQL. Ownership is not
//! checked here; callers resolve the conversation owner first.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use tanya_core::error::TanyaError;
use tanya_core::types::{Conversation, Message, NewMessage, Sender, User};

use crate::db::Database;

/// Repository for registered users and their API token hashes.
pub struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register a user. `token_hash` is the digest of the bearer token, never
    /// the token itself.
    pub fn create(&self, name: &str, email: &str, token_hash: &str) -> Result<User, TanyaError> {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, token_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    user.id.to_string(),
                    user.name,
                    user.email,
                    token_hash,
                    user.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| TanyaError::Storage(format!("Failed to create user: {}", e)))?;
            Ok(())
        })?;

        Ok(user)
    }

    /// Resolve a bearer token digest to its user.
    pub fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<User>, TanyaError> {
        self.db.with_conn(|conn| {
            let result = conn
                .query_row(
                    "SELECT id, name, email, created_at FROM users WHERE token_hash = ?1",
                    rusqlite::params![token_hash],
                    |row| Ok(row_to_user(row)),
                )
                .optional()
                .map_err(|e| TanyaError::Storage(e.to_string()))?;
            result.transpose()
        })
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>, TanyaError> {
        self.db.with_conn(|conn| {
            let result = conn
                .query_row(
                    "SELECT id, name, email, created_at FROM users WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                    |row| Ok(row_to_user(row)),
                )
                .optional()
                .map_err(|e| TanyaError::Storage(e.to_string()))?;
            result.transpose()
        })
    }

    /// All users, oldest first.
    pub fn list(&self) -> Result<Vec<User>, TanyaError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, email, created_at FROM users ORDER BY created_at ASC")
                .map_err(|e| TanyaError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| Ok(row_to_user(row)))
                .map_err(|e| TanyaError::Storage(e.to_string()))?;

            let mut users = Vec::new();
            for row in rows {
                let user = row.map_err(|e| TanyaError::Storage(e.to_string()))??;
                users.push(user);
            }
            Ok(users)
        })
    }

    /// Delete a user together with their conversations and messages.
    pub fn delete(&self, id: Uuid) -> Result<(), TanyaError> {
        self.db.with_conn(|conn| {
            let affected = conn
                .execute(
                    "DELETE FROM users WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                )
                .map_err(|e| TanyaError::Storage(format!("Failed to delete user: {}", e)))?;
            if affected == 0 {
                return Err(TanyaError::NotFound(format!("user {}", id)));
            }
            Ok(())
        })
    }
}

/// Repository for conversations.
pub struct ConversationRepository {
    db: Arc<Database>,
}

impl ConversationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a conversation and its opening bot greeting atomically.
    ///
    /// Either both rows exist afterwards or neither does.
    pub fn create_with_greeting(
        &self,
        user_id: Uuid,
        title: &str,
        greeting: &str,
    ) -> Result<(Conversation, Message), TanyaError> {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            created_at: Utc::now(),
        };
        let greeting = NewMessage::bot(greeting);

        self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| TanyaError::Storage(format!("Failed to begin transaction: {}", e)))?;

            tx.execute(
                "INSERT INTO conversations (id, user_id, title, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    conversation.id.to_string(),
                    conversation.user_id.to_string(),
                    conversation.title,
                    conversation.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| TanyaError::Storage(format!("Failed to create conversation: {}", e)))?;

            let message = insert_message(
                &tx,
                conversation.id,
                &greeting,
                conversation.created_at.timestamp_millis(),
            )?;

            tx.commit()
                .map_err(|e| TanyaError::Storage(format!("Failed to commit conversation: {}", e)))?;

            Ok((conversation.clone(), message))
        })
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, TanyaError> {
        self.db.with_conn(|conn| {
            let result = conn
                .query_row(
                    "SELECT id, user_id, title, created_at FROM conversations WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                    |row| Ok(row_to_conversation(row)),
                )
                .optional()
                .map_err(|e| TanyaError::Storage(e.to_string()))?;
            result.transpose()
        })
    }

    /// Conversations owned by `user_id`, newest first.
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, TanyaError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, title, created_at FROM conversations
                     WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC",
                )
                .map_err(|e| TanyaError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string()], |row| {
                    Ok(row_to_conversation(row))
                })
                .map_err(|e| TanyaError::Storage(e.to_string()))?;

            let mut conversations = Vec::new();
            for row in rows {
                let conversation = row.map_err(|e| TanyaError::Storage(e.to_string()))??;
                conversations.push(conversation);
            }
            Ok(conversations)
        })
    }
}

/// Repository for the append-only message log.
pub struct MessageRepository {
    db: Arc<Database>,
}

impl MessageRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a message to a conversation.
    ///
    /// The stored timestamp never goes backwards within a conversation, even
    /// if the wall clock does.
    pub fn append(&self, conversation_id: Uuid, message: &NewMessage) -> Result<Message, TanyaError> {
        self.db.with_conn(|conn| {
            insert_message(conn, conversation_id, message, Utc::now().timestamp_millis())
        })
    }

    /// Every message of a conversation in display order.
    pub fn list(&self, conversation_id: Uuid) -> Result<Vec<Message>, TanyaError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, seq, conversation_id, sender, content, context_data, created_at
                     FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY created_at ASC, seq ASC",
                )
                .map_err(|e| TanyaError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![conversation_id.to_string()], |row| {
                    Ok(row_to_message(row))
                })
                .map_err(|e| TanyaError::Storage(e.to_string()))?;

            collect_messages(rows)
        })
    }

    /// The newest `limit` messages, returned oldest first.
    ///
    /// `exclude` drops one message (usually the just-stored user turn) before
    /// the limit is applied.
    pub fn recent(
        &self,
        conversation_id: Uuid,
        limit: usize,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Message>, TanyaError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let excluded = exclude.map(|id| id.to_string()).unwrap_or_default();

        let mut messages = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, seq, conversation_id, sender, content, context_data, created_at
                     FROM messages
                     WHERE conversation_id = ?1 AND id != ?2
                     ORDER BY created_at DESC, seq DESC
                     LIMIT ?3",
                )
                .map_err(|e| TanyaError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![conversation_id.to_string(), excluded, limit as i64],
                    |row| Ok(row_to_message(row)),
                )
                .map_err(|e| TanyaError::Storage(e.to_string()))?;

            collect_messages(rows)
        })?;

        messages.reverse();
        Ok(messages)
    }

    pub fn count(&self, conversation_id: Uuid) -> Result<u64, TanyaError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
                    rusqlite::params![conversation_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| TanyaError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

// ============================================================================
// Helper functions for inserts and row-to-entity conversion.
// ============================================================================

/// Insert one message, clamping `now_ms` to the conversation's latest
/// timestamp so ordering by (created_at, seq) matches insertion order.
fn insert_message(
    conn: &rusqlite::Connection,
    conversation_id: Uuid,
    message: &NewMessage,
    now_ms: i64,
) -> Result<Message, TanyaError> {
    let id = Uuid::new_v4();
    let content = message.content.to_stored();
    let context_data = message
        .context_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let (seq, created_ms): (i64, i64) = conn
        .query_row(
            "INSERT INTO messages (id, conversation_id, sender, content, context_data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5,
                     MAX(?6, COALESCE((SELECT MAX(created_at) FROM messages
                                       WHERE conversation_id = ?2), 0)))
             RETURNING seq, created_at",
            rusqlite::params![
                id.to_string(),
                conversation_id.to_string(),
                message.sender.as_str(),
                content,
                context_data,
                now_ms,
            ],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| TanyaError::Storage(format!("Failed to append message: {}", e)))?;

    Ok(Message {
        id,
        seq,
        conversation_id,
        sender: message.sender,
        content,
        context_data: message.context_data.clone(),
        created_at: millis_to_datetime(created_ms),
    })
}

fn collect_messages<F>(rows: rusqlite::MappedRows<'_, F>) -> Result<Vec<Message>, TanyaError>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<Result<Message, TanyaError>>,
{
    let mut messages = Vec::new();
    for row in rows {
        let message = row.map_err(|e| TanyaError::Storage(e.to_string()))??;
        messages.push(message);
    }
    Ok(messages)
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn parse_uuid(value: &str) -> Result<Uuid, TanyaError> {
    Uuid::parse_str(value).map_err(|e| TanyaError::Storage(format!("Invalid UUID: {}", e)))
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User, TanyaError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;
    let name: String = row
        .get(1)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;
    let email: String = row
        .get(2)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;
    let created_ms: i64 = row
        .get(3)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;

    Ok(User {
        id: parse_uuid(&id_str)?,
        name,
        email,
        created_at: millis_to_datetime(created_ms),
    })
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> Result<Conversation, TanyaError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;
    let user_id_str: String = row
        .get(1)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;
    let title: String = row
        .get(2)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;
    let created_ms: i64 = row
        .get(3)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;

    Ok(Conversation {
        id: parse_uuid(&id_str)?,
        user_id: parse_uuid(&user_id_str)?,
        title,
        created_at: millis_to_datetime(created_ms),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, TanyaError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;
    let seq: i64 = row
        .get(1)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;
    let conversation_str: String = row
        .get(2)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;
    let sender_str: String = row
        .get(3)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;
    let content: String = row
        .get(4)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;
    let context_str: Option<String> = row
        .get(5)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;
    let created_ms: i64 = row
        .get(6)
        .map_err(|e| TanyaError::Storage(e.to_string()))?;

    let sender = Sender::parse(&sender_str)
        .ok_or_else(|| TanyaError::Storage(format!("Invalid sender: {}", sender_str)))?;
    let context_data = context_str
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;

    Ok(Message {
        id: parse_uuid(&id_str)?,
        seq,
        conversation_id: parse_uuid(&conversation_str)?,
        sender,
        content,
        context_data,
        created_at: millis_to_datetime(created_ms),
    })
}

/// Extension trait for rusqlite to support optional query results.
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tanya_core::types::MessageContent;

    fn make_db() -> Arc<Database> {
        Arc::new(Database::in_memory().unwrap())
    }

    fn make_user(db: &Arc<Database>, email: &str) -> User {
        UserRepository::new(db.clone())
            .create("Sari", email, &format!("hash-{}", email))
            .unwrap()
    }

    fn make_conversation(db: &Arc<Database>, user: &User) -> Conversation {
        ConversationRepository::new(db.clone())
            .create_with_greeting(user.id, "Percakapan", "Halo! Ada yang bisa saya bantu?")
            .unwrap()
            .0
    }

    #[test]
    fn test_user_create_and_find_by_token() {
        let db = make_db();
        let repo = UserRepository::new(db);
        let user = repo.create("Sari", "sari@example.com", "abc123").unwrap();

        let found = repo.find_by_token_hash("abc123").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.email, "sari@example.com");

        assert!(repo.find_by_token_hash("nope").unwrap().is_none());
        assert!(repo.find_by_id(user.id).unwrap().is_some());
    }

    #[test]
    fn test_user_duplicate_email_fails() {
        let db = make_db();
        let repo = UserRepository::new(db);
        repo.create("Sari", "sari@example.com", "a").unwrap();
        let err = repo.create("Sari 2", "sari@example.com", "b").unwrap_err();
        assert!(matches!(err, TanyaError::Storage(_)));
    }

    #[test]
    fn test_user_list_and_delete() {
        let db = make_db();
        let repo = UserRepository::new(db);
        let first = repo.create("Sari", "sari@example.com", "a").unwrap();
        repo.create("Budi", "budi@example.com", "b").unwrap();
        assert_eq!(repo.list().unwrap().len(), 2);

        repo.delete(first.id).unwrap();
        assert_eq!(repo.list().unwrap().len(), 1);
        assert!(matches!(
            repo.delete(first.id).unwrap_err(),
            TanyaError::NotFound(_)
        ));
    }

    #[test]
    fn test_conversation_starts_with_greeting() {
        let db = make_db();
        let user = make_user(&db, "sari@example.com");
        let (conversation, greeting) = ConversationRepository::new(db.clone())
            .create_with_greeting(user.id, "Data Kesehatan", "Halo!")
            .unwrap();

        assert_eq!(conversation.user_id, user.id);
        assert_eq!(greeting.sender, Sender::Bot);
        assert_eq!(greeting.content, "Halo!");

        let messages = MessageRepository::new(db).list(conversation.id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, greeting.id);
    }

    #[test]
    fn test_conversation_for_unknown_user_leaves_nothing() {
        let db = make_db();
        let result = ConversationRepository::new(db.clone()).create_with_greeting(
            Uuid::new_v4(),
            "Orphan",
            "Halo!",
        );
        assert!(result.is_err());

        let orphaned: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
                    .map_err(|e| TanyaError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(orphaned, 0);
    }

    #[test]
    fn test_list_for_user_newest_first_and_scoped() {
        let db = make_db();
        let sari = make_user(&db, "sari@example.com");
        let budi = make_user(&db, "budi@example.com");
        let first = make_conversation(&db, &sari);
        let second = make_conversation(&db, &sari);
        make_conversation(&db, &budi);

        let listed = ConversationRepository::new(db)
            .list_for_user(sari.id)
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn test_messages_keep_insertion_order() {
        let db = make_db();
        let user = make_user(&db, "sari@example.com");
        let conversation = make_conversation(&db, &user);
        let repo = MessageRepository::new(db);

        for i in 0..5 {
            repo.append(conversation.id, &NewMessage::user(format!("pesan {}", i)))
                .unwrap();
        }

        let messages = repo.list(conversation.id).unwrap();
        assert_eq!(messages.len(), 6);
        for pair in messages.windows(2) {
            assert!(pair[0].seq < pair[1].seq);
            assert!(pair[0].created_at <= pair[1].created_at);
        }
        assert_eq!(messages[5].content, "pesan 4");
    }

    #[test]
    fn test_timestamp_clamped_against_future_rows() {
        let db = make_db();
        let user = make_user(&db, "sari@example.com");
        let conversation = make_conversation(&db, &user);
        let future = Utc::now().timestamp_millis() + 60_000;

        db.with_conn(|conn| {
            insert_message(conn, conversation.id, &NewMessage::bot("dari masa depan"), future)
        })
        .unwrap();

        let appended = MessageRepository::new(db)
            .append(conversation.id, &NewMessage::user("sekarang"))
            .unwrap();
        assert_eq!(appended.created_at.timestamp_millis(), future);
    }

    #[test]
    fn test_image_message_with_context() {
        let db = make_db();
        let user = make_user(&db, "sari@example.com");
        let conversation = make_conversation(&db, &user);
        let repo = MessageRepository::new(db);

        let context = serde_json::json!({"type": "line", "column": "Jawa Barat"});
        repo.append(
            conversation.id,
            &NewMessage::bot_image("/charts/chart_a.png", context.clone()),
        )
        .unwrap();

        let messages = repo.list(conversation.id).unwrap();
        let image = &messages[1];
        assert!(image.is_image());
        assert_eq!(
            image.parsed_content(),
            MessageContent::image("/charts/chart_a.png")
        );
        assert_eq!(image.context_data, Some(context));
    }

    #[test]
    fn test_recent_window_excludes_and_orders() {
        let db = make_db();
        let user = make_user(&db, "sari@example.com");
        let conversation = make_conversation(&db, &user);
        let repo = MessageRepository::new(db);

        let mut last = None;
        for i in 0..20 {
            last = Some(
                repo.append(conversation.id, &NewMessage::user(format!("m{}", i)))
                    .unwrap(),
            );
        }
        let last = last.unwrap();

        let window = repo.recent(conversation.id, 14, Some(last.id)).unwrap();
        assert_eq!(window.len(), 14);
        assert_eq!(window.first().unwrap().content, "m5");
        assert_eq!(window.last().unwrap().content, "m18");
        assert!(window.iter().all(|m| m.id != last.id));

        let unfiltered = repo.recent(conversation.id, 3, None).unwrap();
        let contents: Vec<_> = unfiltered.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m17", "m18", "m19"]);

        assert!(repo.recent(conversation.id, 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_recent_short_conversation() {
        let db = make_db();
        let user = make_user(&db, "sari@example.com");
        let conversation = make_conversation(&db, &user);
        let repo = MessageRepository::new(db);

        let window = repo.recent(conversation.id, 14, None).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].sender, Sender::Bot);
    }

    #[test]
    fn test_count_messages() {
        let db = make_db();
        let user = make_user(&db, "sari@example.com");
        let conversation = make_conversation(&db, &user);
        let repo = MessageRepository::new(db);
        assert_eq!(repo.count(conversation.id).unwrap(), 1);

        repo.append(conversation.id, &NewMessage::user("hai")).unwrap();
        assert_eq!(repo.count(conversation.id).unwrap(), 2);
        assert_eq!(repo.count(Uuid::new_v4()).unwrap(), 0);
    }

    #[test]
    fn test_user_delete_cascades_to_conversations() {
        let db = make_db();
        let user = make_user(&db, "sari@example.com");
        let conversation = make_conversation(&db, &user);

        UserRepository::new(db.clone()).delete(user.id).unwrap();

        assert!(ConversationRepository::new(db.clone())
            .find_by_id(conversation.id)
            .unwrap()
            .is_none());
        assert_eq!(MessageRepository::new(db).count(conversation.id).unwrap(), 0);
    }
}
