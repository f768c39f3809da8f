//! Conversation history store.
//!
//! Persists prompt exchanges so conversational prompts can replay their
//! recent history on the next call.

use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;

/// Errors from the history store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("conversation not found: {0}")]
    NotFound(String),
}

/// A stored exchange message.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub role: String,
    pub content: String,
    pub timestamp: i64,
}

/// Listing entry for a conversation.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub id: String,
    pub prompt_name: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub message_count: usize,
}

/// CRUD access to conversations and their messages.
#[derive(Clone)]
pub struct ConversationStore {
    db: Database,
}

impl ConversationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create (or refresh) a conversation; a v4 uuid is minted when no id is
    /// supplied. Returns the conversation id.
    pub async fn create_conversation(
        &self,
        id: Option<String>,
        prompt_name: &str,
    ) -> Result<String, StoreError> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now().timestamp();
        let prompt_name = prompt_name.to_string();
        let conversation_id = id.clone();

        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO conversations (id, prompt_name, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)
                     ON CONFLICT(id) DO UPDATE SET updated_at = ?3",
                    rusqlite::params![conversation_id, prompt_name, now],
                )?;
                Ok(())
            })
            .await?;

        tracing::debug!(conversation = %id, "conversation created");
        Ok(id)
    }

    /// Append a message and touch the conversation's updated_at.
    pub async fn add_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();
        let conversation_id = conversation_id.to_string();
        let role = role.to_string();
        let content = content.to_string();

        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO messages (conversation_id, role, content, timestamp)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![conversation_id, role, content, now],
                )?;
                conn.execute(
                    "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                    rusqlite::params![now, conversation_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Messages for a conversation, oldest first. With a limit, only the
    /// most recent messages are returned (still oldest first).
    pub async fn messages(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let conversation_id = conversation_id.to_string();

        self.db
            .with_conn_async(move |conn| match limit {
                Some(limit) => {
                    let mut stmt = conn.prepare(
                        "SELECT role, content, timestamp FROM (
                             SELECT id, role, content, timestamp FROM messages
                             WHERE conversation_id = ?1
                             ORDER BY id DESC LIMIT ?2
                         ) ORDER BY id ASC",
                    )?;
                    let rows = stmt.query_map(
                        rusqlite::params![conversation_id, limit as i64],
                        stored_message,
                    )?;
                    rows.collect()
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT role, content, timestamp FROM messages
                         WHERE conversation_id = ?1 ORDER BY id ASC",
                    )?;
                    let rows = stmt.query_map(rusqlite::params![conversation_id], stored_message)?;
                    rows.collect()
                }
            })
            .await
    }

    /// All conversations with message counts, most recently updated first.
    pub async fn list(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        self.db
            .with_conn_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.id, c.prompt_name, c.created_at, c.updated_at, COUNT(m.id)
                     FROM conversations c
                     LEFT JOIN messages m ON c.id = m.conversation_id
                     GROUP BY c.id
                     ORDER BY c.updated_at DESC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(ConversationSummary {
                        id: row.get(0)?,
                        prompt_name: row.get(1)?,
                        created_at: row.get(2)?,
                        updated_at: row.get(3)?,
                        message_count: row.get::<_, i64>(4)? as usize,
                    })
                })?;
                rows.collect()
            })
            .await
    }

    /// Delete a conversation and its messages.
    pub async fn delete(&self, conversation_id: &str) -> Result<(), StoreError> {
        let id = conversation_id.to_string();
        let deleted = self
            .db
            .with_conn_async(move |conn| {
                conn.execute("DELETE FROM messages WHERE conversation_id = ?1", [&id])?;
                conn.execute("DELETE FROM conversations WHERE id = ?1", [&id])
            })
            .await?;
        if deleted == 0 {
            return Err(StoreError::NotFound(conversation_id.to_string()));
        }
        Ok(())
    }

    pub async fn exists(&self, conversation_id: &str) -> Result<bool, StoreError> {
        let id = conversation_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare("SELECT 1 FROM conversations WHERE id = ?1 LIMIT 1")?;
                stmt.exists([&id])
            })
            .await
    }
}

fn stored_message(row: &rusqlite::Row<'_>) -> Result<StoredMessage, rusqlite::Error> {
    Ok(StoredMessage {
        role: row.get(0)?,
        content: row.get(1)?,
        timestamp: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConversationStore {
        ConversationStore::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn create_add_and_fetch_messages() {
        let store = store();
        let id = store.create_conversation(None, "greeter").await.unwrap();
        assert!(store.exists(&id).await.unwrap());

        store.add_message(&id, "user", "hello").await.unwrap();
        store.add_message(&id, "assistant", "hi there").await.unwrap();

        let messages = store.messages(&id, None).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].content, "hi there");
    }

    #[tokio::test]
    async fn limit_returns_most_recent_oldest_first() {
        let store = store();
        let id = store.create_conversation(None, "p").await.unwrap();
        for i in 0..5 {
            store
                .add_message(&id, "user", &format!("m{}", i))
                .await
                .unwrap();
        }

        let recent = store.messages(&id, Some(2)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "m3");
        assert_eq!(recent[1].content, "m4");
    }

    #[tokio::test]
    async fn list_reports_message_counts() {
        let store = store();
        let a = store
            .create_conversation(Some("conv-a".to_string()), "p1")
            .await
            .unwrap();
        store.add_message(&a, "user", "x").await.unwrap();
        store
            .create_conversation(Some("conv-b".to_string()), "p2")
            .await
            .unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        let a_summary = all.iter().find(|c| c.id == "conv-a").unwrap();
        assert_eq!(a_summary.message_count, 1);
        assert_eq!(a_summary.prompt_name, "p1");
    }

    #[tokio::test]
    async fn delete_removes_conversation() {
        let store = store();
        let id = store.create_conversation(None, "p").await.unwrap();
        store.add_message(&id, "user", "x").await.unwrap();

        store.delete(&id).await.unwrap();
        assert!(!store.exists(&id).await.unwrap());
        assert!(matches!(
            store.delete(&id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
