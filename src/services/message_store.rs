// src/services/message_store.rs
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::message::{Message, MessageRow};

/// Append-only persistence of chat messages, keyed by session.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists a message as given and returns it.
    async fn insert(&self, message: Message) -> Result<Message, StoreError>;

    /// All messages of a session, oldest first. Ties keep insertion order.
    async fn list(&self, session_id: Uuid) -> Result<Vec<Message>, StoreError>;

    /// Removes every message of a session and returns how many were removed.
    async fn delete_all(&self, session_id: Uuid) -> Result<u64, StoreError>;
}

pub struct PgMessageStore {
    db_pool: PgPool,
}

impl PgMessageStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert(&self, message: Message) -> Result<Message, StoreError> {
        tracing::debug!(
            session_id = %message.session_id,
            role = %message.role,
            content_len = message.content.len(),
            "saving message"
        );

        sqlx::query(
            "INSERT INTO messages (id, session_id, role, content, sent_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.id)
        .bind(message.session_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.timestamp)
        .execute(&self.db_pool)
        .await?;

        Ok(message)
    }

    async fn list(&self, session_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, session_id, role, content, sent_at
             FROM messages
             WHERE session_id = $1
             ORDER BY sent_at ASC, seq ASC",
        )
        .bind(session_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter()
            .map(|row| Message::try_from(row).map_err(|e| StoreError::Corrupt(e.to_string())))
            .collect()
    }

    async fn delete_all(&self, session_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM messages WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Process-local store used when no database is configured, and by tests.
#[derive(Default)]
pub struct InMemoryMessageStore {
    sessions: Mutex<HashMap<Uuid, Vec<Message>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Vec<Message>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, message: Message) -> Result<Message, StoreError> {
        let mut sessions = self.sessions();
        let messages = sessions.entry(message.session_id).or_default();

        // Stable insert keeps equal timestamps in arrival order.
        let at = messages.partition_point(|m| m.timestamp <= message.timestamp);
        messages.insert(at, message.clone());

        Ok(message)
    }

    async fn list(&self, session_id: Uuid) -> Result<Vec<Message>, StoreError> {
        Ok(self.sessions().get(&session_id).cloned().unwrap_or_default())
    }

    async fn delete_all(&self, session_id: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .sessions()
            .remove(&session_id)
            .map(|messages| messages.len() as u64)
            .unwrap_or(0))
    }
}
