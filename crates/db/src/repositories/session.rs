use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use concierge_core::collaborators::SessionCache;
use concierge_core::errors::CollaboratorError;

use super::RepositoryError;
use crate::DbPool;

/// List-per-key cache with a per-key expiry deadline, stored in SQLite.
///
/// Expired keys are purged lazily by the next operation that touches them.
pub struct SqlSessionCache {
    pool: DbPool,
}

impl SqlSessionCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn purge_if_expired(&self, key: &str) -> Result<(), RepositoryError> {
        let now_ms = Utc::now().timestamp_millis();
        let expired = sqlx::query(
            "SELECT COUNT(*) AS count FROM session_expiry WHERE session_key = ? AND expires_at_ms <= ?",
        )
        .bind(key)
        .bind(now_ms)
        .fetch_one(&self.pool)
        .await?
        .try_get::<i64, _>("count")?;

        if expired > 0 {
            self.delete_key(key).await?;
        }
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM session_entry WHERE session_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM session_expiry WHERE session_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn push_value(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        self.purge_if_expired(key).await?;
        sqlx::query("INSERT INTO session_entry (session_key, value, created_at_ms) VALUES (?, ?, ?)")
            .bind(key)
            .bind(value)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn last_values(&self, key: &str, count: usize) -> Result<Vec<String>, RepositoryError> {
        self.purge_if_expired(key).await?;
        let rows = sqlx::query(
            "SELECT value FROM (
                SELECT id, value FROM session_entry
                WHERE session_key = ?
                ORDER BY id DESC
                LIMIT ?
             ) ORDER BY id ASC",
        )
        .bind(key)
        .bind(i64::try_from(count).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.try_get::<String, _>("value").map_err(RepositoryError::from))
            .collect()
    }

    async fn keep_last(&self, key: &str, count: usize) -> Result<(), RepositoryError> {
        sqlx::query(
            "DELETE FROM session_entry
             WHERE session_key = ?
               AND id NOT IN (
                 SELECT id FROM session_entry
                 WHERE session_key = ?
                 ORDER BY id DESC
                 LIMIT ?
               )",
        )
        .bind(key)
        .bind(key)
        .bind(i64::try_from(count).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), RepositoryError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at_ms = Utc::now().timestamp_millis().saturating_add(ttl_ms);
        sqlx::query(
            "INSERT INTO session_expiry (session_key, expires_at_ms) VALUES (?, ?)
             ON CONFLICT(session_key) DO UPDATE SET expires_at_ms = excluded.expires_at_ms",
        )
        .bind(key)
        .bind(expires_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionCache for SqlSessionCache {
    async fn push(&self, key: &str, value: String) -> Result<(), CollaboratorError> {
        Ok(self.push_value(key, &value).await?)
    }

    async fn range_last(&self, key: &str, count: usize) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.last_values(key, count).await?)
    }

    async fn trim_to_last(&self, key: &str, count: usize) -> Result<(), CollaboratorError> {
        Ok(self.keep_last(key, count).await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CollaboratorError> {
        Ok(self.set_expiry(key, ttl).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), CollaboratorError> {
        Ok(self.delete_key(key).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use concierge_core::collaborators::SessionCache;

    use super::SqlSessionCache;
    use crate::{connect_with_settings, migrations};

    async fn cache() -> SqlSessionCache {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlSessionCache::new(pool)
    }

    #[tokio::test]
    async fn range_returns_most_recent_values_oldest_first() {
        let cache = cache().await;
        for value in ["a", "b", "c", "d"] {
            cache.push("session:1", value.to_owned()).await.expect("push");
        }

        let values = cache.range_last("session:1", 3).await.expect("range");
        assert_eq!(values, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn trim_keeps_only_the_tail() {
        let cache = cache().await;
        for index in 0..12 {
            cache.push("session:1", format!("turn-{index}")).await.expect("push");
        }
        cache.push("session:2", "other".to_owned()).await.expect("push");

        cache.trim_to_last("session:1", 10).await.expect("trim");

        let values = cache.range_last("session:1", 100).await.expect("range");
        assert_eq!(values.len(), 10);
        assert_eq!(values.first().map(String::as_str), Some("turn-2"));
        assert_eq!(cache.range_last("session:2", 10).await.expect("range"), vec!["other"]);
    }

    #[tokio::test]
    async fn expired_keys_read_as_empty() {
        let cache = cache().await;
        cache.push("session:1", "hello".to_owned()).await.expect("push");
        cache.expire("session:1", Duration::from_millis(1)).await.expect("expire");

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.range_last("session:1", 10).await.expect("range").is_empty());
    }

    #[tokio::test]
    async fn refreshed_keys_survive() {
        let cache = cache().await;
        cache.push("session:1", "hello".to_owned()).await.expect("push");
        cache.expire("session:1", Duration::from_secs(60)).await.expect("expire");

        assert_eq!(cache.range_last("session:1", 10).await.expect("range"), vec!["hello"]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let cache = cache().await;
        cache.push("session:1", "hello".to_owned()).await.expect("push");
        cache.expire("session:1", Duration::from_secs(60)).await.expect("expire");

        cache.delete("session:1").await.expect("first delete");
        cache.delete("session:1").await.expect("second delete");

        assert!(cache.range_last("session:1", 10).await.expect("range").is_empty());
    }
}
