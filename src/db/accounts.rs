//! Mail account CRUD and token persistence.

use crate::error::DatabaseError;
use crate::types::UserId;
use crate::{Error, Result};

use super::{Database, InsertMailAccountParams, MailAccount};

impl Database {
    /// Insert a new mail account
    pub async fn insert_mail_account(&self, params: InsertMailAccountParams<'_>) -> Result<i64> {
        let InsertMailAccountParams {
            user_id,
            provider,
            address,
            access_token_enc,
            refresh_token_enc,
            token_expires_at,
        } = params;
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO mail_accounts (user_id, provider, address, access_token_enc,
                                      refresh_token_enc, token_expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(address)
        .bind(access_token_enc)
        .bind(refresh_token_enc)
        .bind(token_expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert mail account: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Get mail account by ID
    pub async fn get_mail_account(&self, id: i64) -> Result<Option<MailAccount>> {
        let account = sqlx::query_as::<_, MailAccount>(
            r#"
            SELECT id, user_id, provider, address, access_token_enc,
                   refresh_token_enc, token_expires_at, created_at
            FROM mail_accounts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get mail account: {}",
                e
            )))
        })?;

        Ok(account)
    }

    /// Get mail accounts for a user and provider, in id order
    pub async fn get_accounts_for_user(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<Vec<MailAccount>> {
        let accounts = sqlx::query_as::<_, MailAccount>(
            r#"
            SELECT id, user_id, provider, address, access_token_enc,
                   refresh_token_enc, token_expires_at, created_at
            FROM mail_accounts
            WHERE user_id = ? AND provider = ?
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get mail accounts for user: {}",
                e
            )))
        })?;

        Ok(accounts)
    }

    /// Persist a refreshed access token for a mail account
    ///
    /// Returns true if the account row was updated.
    pub async fn update_account_token(
        &self,
        account_id: i64,
        access_token_enc: &str,
        token_expires_at: Option<i64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE mail_accounts
            SET access_token_enc = ?, token_expires_at = ?
            WHERE id = ?
            "#,
        )
        .bind(access_token_enc)
        .bind(token_expires_at)
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update mail account token: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }
}
