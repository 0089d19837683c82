//! Run history operations.
//!
//! Run history is append-only. Records are written once when a subscription
//! run completes and are never updated or deleted afterwards.

use crate::types::SubscriptionId;
use crate::{Error, Result};

use super::{Database, NewRunHistory, RunHistoryRow};

impl Database {
    /// Insert a completed run into history
    ///
    /// Called after synthesis succeeds to record what the run fetched and
    /// produced. Returns the new record's id.
    pub async fn insert_run_history(&self, entry: &NewRunHistory) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO run_history (
                subscription_id, user_id, run_at, message_count,
                script, audio_url, messages_json, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.subscription_id)
        .bind(entry.user_id)
        .bind(entry.run_at)
        .bind(entry.message_count)
        .bind(&entry.script)
        .bind(&entry.audio_url)
        .bind(&entry.messages_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(result.last_insert_rowid())
    }

    /// Query run history for a subscription
    ///
    /// Returns records ordered by run time (most recent first).
    pub async fn query_run_history(
        &self,
        subscription_id: SubscriptionId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RunHistoryRow>> {
        let rows = sqlx::query_as::<_, RunHistoryRow>(
            r#"
            SELECT id, subscription_id, user_id, run_at, message_count,
                   script, audio_url, messages_json, created_at
            FROM run_history
            WHERE subscription_id = ?
            ORDER BY run_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(subscription_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows)
    }

    /// Count run history records for a subscription
    pub async fn count_run_history(&self, subscription_id: SubscriptionId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM run_history WHERE subscription_id = ?",
        )
        .bind(subscription_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(count)
    }

    /// Get a single run history record by ID
    pub async fn get_run_history(&self, id: i64) -> Result<Option<RunHistoryRow>> {
        let row = sqlx::query_as::<_, RunHistoryRow>(
            r#"
            SELECT id, subscription_id, user_id, run_at, message_count,
                   script, audio_url, messages_json, created_at
            FROM run_history
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(row)
    }
}
