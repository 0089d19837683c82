//! User CRUD and due-work discovery.

use crate::error::DatabaseError;
use crate::types::UserId;
use crate::{Error, Result};

use super::{Database, DueUser, User};

impl Database {
    /// Insert a new user
    pub async fn insert_user(&self, email: &str, display_name: Option<&str>) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO users (email, display_name, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(email)
        .bind(display_name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert user: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Get user by ID
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, display_name, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get user: {}",
                e
            )))
        })?;

        Ok(user)
    }

    /// Get user by email address
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, display_name, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get user by email: {}",
                e
            )))
        })?;

        Ok(user)
    }

    /// Load users with active subscriptions due inside the window
    ///
    /// Each returned user carries their mail accounts for the requested
    /// provider and the due subscriptions themselves, both in id order.
    /// Users whose subscriptions all fall outside the window are not
    /// returned.
    pub async fn load_due_users(
        &self,
        window_start: i64,
        window_end: i64,
        provider: &str,
    ) -> Result<Vec<DueUser>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT DISTINCT u.id, u.email, u.display_name, u.created_at
            FROM users u
            JOIN subscriptions s ON s.user_id = u.id
            WHERE s.active = 1 AND s.next_run >= ? AND s.next_run < ?
            ORDER BY u.id ASC
            "#,
        )
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to load users with due subscriptions: {}",
                e
            )))
        })?;

        let mut due = Vec::with_capacity(users.len());
        for user in users {
            let accounts = self
                .get_accounts_for_user(UserId::new(user.id), provider)
                .await?;
            let subscriptions = self
                .get_due_subscriptions(UserId::new(user.id), window_start, window_end)
                .await?;
            due.push(DueUser {
                user,
                accounts,
                subscriptions,
            });
        }

        Ok(due)
    }
}
