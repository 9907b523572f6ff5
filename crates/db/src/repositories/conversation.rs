use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use posada_core::domain::conversation::{
    ChatMessage, ConversationHistory, ConversationId, MessageLogEntry,
};
use posada_core::flows::ReservationInProgress;

use super::{ConversationStore, RepositoryError};
use crate::DbPool;

pub struct SqlConversationStore {
    pool: DbPool,
}

impl SqlConversationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationStore for SqlConversationStore {
    async fn save(&self, conversation: &ConversationHistory) -> Result<(), RepositoryError> {
        let (messages_json, reservation_json) = encode_payload(conversation)?;

        sqlx::query(
            "INSERT INTO conversation_history (
                id,
                client_id,
                messages_json,
                reservation_state_json,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                client_id = excluded.client_id,
                messages_json = excluded.messages_json,
                reservation_state_json = excluded.reservation_state_json,
                updated_at = excluded.updated_at",
        )
        .bind(conversation.id.as_str())
        .bind(conversation.client_id)
        .bind(messages_json)
        .bind(reservation_json)
        .bind(conversation.created_at.to_rfc3339())
        .bind(conversation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationHistory>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                client_id,
                messages_json,
                reservation_state_json,
                created_at,
                updated_at
             FROM conversation_history
             WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(conversation_from_row).transpose()
    }

    async fn update(&self, conversation: &ConversationHistory) -> Result<(), RepositoryError> {
        let (messages_json, reservation_json) = encode_payload(conversation)?;

        let result = sqlx::query(
            "UPDATE conversation_history
             SET client_id = ?, messages_json = ?, reservation_state_json = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(conversation.client_id)
        .bind(messages_json)
        .bind(reservation_json)
        .bind(conversation.updated_at.to_rfc3339())
        .bind(conversation.id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("conversation `{}`", conversation.id)));
        }
        Ok(())
    }

    async fn append_message_log(&self, entry: MessageLogEntry) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO message_log (client_id, content, registered_at) VALUES (?, ?, ?)")
            .bind(entry.client_id)
            .bind(&entry.content)
            .bind(entry.registered_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_for_client(
        &self,
        client_id: i64,
    ) -> Result<Vec<ConversationHistory>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                id,
                client_id,
                messages_json,
                reservation_state_json,
                created_at,
                updated_at
             FROM conversation_history
             WHERE client_id = ?
             ORDER BY updated_at DESC",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(conversation_from_row).collect()
    }
}

fn encode_payload(
    conversation: &ConversationHistory,
) -> Result<(String, Option<String>), RepositoryError> {
    let messages = serde_json::to_string(&conversation.messages)
        .map_err(|error| RepositoryError::Decode(format!("encode messages: {error}")))?;
    let reservation = conversation
        .reservation_in_progress
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|error| RepositoryError::Decode(format!("encode reservation state: {error}")))?;
    Ok((messages, reservation))
}

fn conversation_from_row(row: SqliteRow) -> Result<ConversationHistory, RepositoryError> {
    let messages_raw = row.try_get::<String, _>("messages_json")?;
    let messages = serde_json::from_str::<Vec<ChatMessage>>(&messages_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid messages_json: {error}")))?;

    let reservation_in_progress = row
        .try_get::<Option<String>, _>("reservation_state_json")?
        .filter(|raw| !raw.trim().is_empty() && raw.trim() != "null")
        .map(|raw| serde_json::from_str::<ReservationInProgress>(&raw))
        .transpose()
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid reservation_state_json: {error}"))
        })?;

    Ok(ConversationHistory {
        id: ConversationId(row.try_get("id")?),
        client_id: row.try_get("client_id")?,
        messages,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
        reservation_in_progress,
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
