//! Subscription CRUD and schedule advancement.

use crate::error::DatabaseError;
use crate::types::{SubscriptionId, UserId};
use crate::{Error, Result};

use super::{Database, InsertSubscriptionParams, Subscription};

impl Database {
    /// Insert a new subscription
    pub async fn insert_subscription(&self, params: InsertSubscriptionParams<'_>) -> Result<i64> {
        let InsertSubscriptionParams {
            user_id,
            title,
            cadence,
            senders,
            active,
            next_run,
        } = params;
        let senders_json = serde_json::to_string(senders)?;
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, title, cadence, active, senders,
                                      next_run, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(cadence)
        .bind(active as i32)
        .bind(senders_json)
        .bind(next_run)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert subscription: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Get subscription by ID
    pub async fn get_subscription(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, title, cadence, active, senders,
                   last_run, next_run, created_at
            FROM subscriptions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get subscription: {}",
                e
            )))
        })?;

        Ok(subscription)
    }

    /// Get all subscriptions for a user, in id order
    pub async fn get_subscriptions_for_user(&self, user_id: UserId) -> Result<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, title, cadence, active, senders,
                   last_run, next_run, created_at
            FROM subscriptions
            WHERE user_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get subscriptions for user: {}",
                e
            )))
        })?;

        Ok(subscriptions)
    }

    /// Get active subscriptions for a user due inside the window, in id order
    pub(super) async fn get_due_subscriptions(
        &self,
        user_id: UserId,
        window_start: i64,
        window_end: i64,
    ) -> Result<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, title, cadence, active, senders,
                   last_run, next_run, created_at
            FROM subscriptions
            WHERE user_id = ? AND active = 1 AND next_run >= ? AND next_run < ?
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get due subscriptions for user: {}",
                e
            )))
        })?;

        Ok(subscriptions)
    }

    /// Advance a subscription's schedule after a completed run
    ///
    /// Returns true if the subscription row was updated.
    pub async fn advance_subscription_schedule(
        &self,
        id: SubscriptionId,
        last_run: i64,
        next_run: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET last_run = ?, next_run = ?
            WHERE id = ?
            "#,
        )
        .bind(last_run)
        .bind(next_run)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to advance subscription schedule: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Enable or disable a subscription
    ///
    /// Returns true if the subscription row was updated.
    pub async fn set_subscription_active(
        &self,
        id: SubscriptionId,
        active: bool,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE subscriptions SET active = ? WHERE id = ?")
            .bind(active as i32)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update subscription active flag: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }
}
