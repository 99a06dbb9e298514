use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use concierge_core::collaborators::AnalyticsSink;
use concierge_core::domain::analytics::{AnalyticsRecord, MessageType};
use concierge_core::domain::conversation::ConversationKey;
use concierge_core::errors::CollaboratorError;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlAnalyticsSink {
    pool: DbPool,
}

impl SqlAnalyticsSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, record: &AnalyticsRecord) -> Result<(), RepositoryError> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO conversation_log (
                id,
                conversation_key,
                message_type,
                direction,
                content,
                intent,
                confidence_score,
                response_time_ms,
                escalated,
                metadata_json,
                recorded_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.record_id)
        .bind(record.conversation_key.as_str())
        .bind(record.message_type.as_str())
        .bind(&record.direction)
        .bind(record.content.as_deref())
        .bind(&record.intent)
        .bind(record.confidence_score)
        .bind(i64::try_from(record.response_time_ms).unwrap_or(i64::MAX))
        .bind(record.escalated)
        .bind(metadata)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_for_conversation(
        &self,
        key: &ConversationKey,
    ) -> Result<Vec<AnalyticsRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                id,
                conversation_key,
                message_type,
                direction,
                content,
                intent,
                confidence_score,
                response_time_ms,
                escalated,
                metadata_json,
                recorded_at
             FROM conversation_log
             WHERE conversation_key = ?
             ORDER BY recorded_at ASC, id ASC",
        )
        .bind(key.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }
}

#[async_trait]
impl AnalyticsSink for SqlAnalyticsSink {
    async fn record(&self, record: &AnalyticsRecord) -> Result<(), CollaboratorError> {
        Ok(self.insert(record).await?)
    }
}

fn record_from_row(row: SqliteRow) -> Result<AnalyticsRecord, RepositoryError> {
    let message_type = match row.try_get::<String, _>("message_type")?.as_str() {
        "text" => MessageType::Text,
        "interactive" => MessageType::Interactive,
        "image" => MessageType::Image,
        other => {
            return Err(RepositoryError::Decode(format!("unknown message_type `{other}`")));
        }
    };

    let metadata_raw = row.try_get::<String, _>("metadata_json")?;
    let metadata = serde_json::from_str::<BTreeMap<String, String>>(&metadata_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid metadata_json: {error}")))?;

    let recorded_at_raw = row.try_get::<String, _>("recorded_at")?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at_raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|_| RepositoryError::Decode(format!("invalid recorded_at `{recorded_at_raw}`")))?;

    let response_time_ms = row.try_get::<i64, _>("response_time_ms")?;

    Ok(AnalyticsRecord {
        record_id: row.try_get("id")?,
        conversation_key: ConversationKey(row.try_get("conversation_key")?),
        message_type,
        direction: row.try_get("direction")?,
        content: row.try_get("content")?,
        intent: row.try_get("intent")?,
        confidence_score: row.try_get("confidence_score")?,
        response_time_ms: u64::try_from(response_time_ms).map_err(|_| {
            RepositoryError::Decode(format!("negative response_time_ms {response_time_ms}"))
        })?,
        escalated: row.try_get("escalated")?,
        metadata,
        recorded_at,
    })
}

#[cfg(test)]
mod tests {
    use concierge_core::collaborators::AnalyticsSink;
    use concierge_core::domain::analytics::{AnalyticsRecord, MessageType};
    use concierge_core::domain::conversation::ConversationKey;

    use super::SqlAnalyticsSink;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn records_are_listed_per_conversation() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let sink = SqlAnalyticsSink::new(pool);

        let key = ConversationKey::new("15550001111");
        let mut record = AnalyticsRecord::inbound(key.clone(), MessageType::Text, "qa")
            .with_content("do you ship abroad?")
            .with_metadata("language", "en");
        record.confidence_score = Some(0.85);
        record.response_time_ms = 412;

        sink.record(&record).await.expect("record");
        sink.record(&AnalyticsRecord::inbound(
            ConversationKey::new("15550002222"),
            MessageType::Interactive,
            "catalog_browse",
        ))
        .await
        .expect("record other");

        let listed = sink.list_for_conversation(&key).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].record_id, record.record_id);
        assert_eq!(listed[0].confidence_score, Some(0.85));
        assert_eq!(listed[0].response_time_ms, 412);
        assert_eq!(listed[0].metadata.get("language").map(String::as_str), Some("en"));
        assert!(!listed[0].escalated);
    }
}
