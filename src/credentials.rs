//! Credential lifecycle for mail accounts.
//!
//! Tokens live encrypted at rest. One [`CredentialHandle`] is built per mail
//! account per job run: it decrypts the stored tokens once, hands out
//! snapshots to provider calls, and writes refreshed tokens back through the
//! cipher before any caller can observe them.

use crate::cipher::TokenCipher;
use crate::db::{Database, MailAccount};
use crate::error::CredentialError;
use crate::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Decrypted OAuth token state for one mail account
#[derive(Debug, Clone)]
pub struct TokenSnapshot {
    /// The mail account the tokens belong to
    pub account_id: i64,
    /// Bearer token presented to the provider
    pub access_token: String,
    /// Long-lived token used to renew the access token
    pub refresh_token: Option<String>,
    /// Expiration time of the access token
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSnapshot {
    /// Checks if the access token is expired (with 60 second buffer).
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|exp| Utc::now() + Duration::seconds(60) >= exp)
    }
}

/// Renewed access token issued by the provider during a call
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    /// New bearer token
    pub access_token: String,
    /// Expiration time of the new token
    pub expires_at: Option<DateTime<Utc>>,
}

/// Shared credential state for one mail account during a job run
///
/// Snapshots go out to concurrent provider calls through [`current`];
/// renewals come back through [`apply_refresh`], which persists the
/// encrypted token on the account row before the shared snapshot changes.
/// Readers never observe a token that is not yet durable.
///
/// [`current`]: CredentialHandle::current
/// [`apply_refresh`]: CredentialHandle::apply_refresh
pub struct CredentialHandle {
    account_id: i64,
    db: Arc<Database>,
    cipher: Arc<dyn TokenCipher>,
    token: RwLock<TokenSnapshot>,
}

impl CredentialHandle {
    /// Build a handle by decrypting the account's stored tokens
    pub fn load(
        account: &MailAccount,
        db: Arc<Database>,
        cipher: Arc<dyn TokenCipher>,
    ) -> Result<Self> {
        let access_enc = account.access_token_enc.as_deref().ok_or(
            CredentialError::MissingAccessToken {
                account_id: account.id,
            },
        )?;
        let access_token =
            cipher
                .decrypt(access_enc)
                .map_err(|e| CredentialError::DecryptFailed {
                    account_id: account.id,
                    reason: e.to_string(),
                })?;

        let refresh_token = match account.refresh_token_enc.as_deref() {
            Some(enc) => {
                Some(
                    cipher
                        .decrypt(enc)
                        .map_err(|e| CredentialError::DecryptFailed {
                            account_id: account.id,
                            reason: e.to_string(),
                        })?,
                )
            }
            None => None,
        };

        let expires_at = account
            .token_expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Ok(Self {
            account_id: account.id,
            db,
            cipher,
            token: RwLock::new(TokenSnapshot {
                account_id: account.id,
                access_token,
                refresh_token,
                expires_at,
            }),
        })
    }

    /// The mail account this handle serves
    pub fn account_id(&self) -> i64 {
        self.account_id
    }

    /// Clone of the latest token snapshot
    pub async fn current(&self) -> TokenSnapshot {
        self.token.read().await.clone()
    }

    /// Persist and adopt a token renewal reported by a provider call
    ///
    /// `None` means the call ran on the existing token and there is nothing
    /// to do. On `Some`, the new access token is encrypted and written to
    /// the mail account row first; only then does the in-memory snapshot
    /// change. A failed persist leaves the snapshot untouched and surfaces
    /// as a credential error, which ends the user's run.
    pub async fn apply_refresh(&self, refreshed: Option<RefreshedToken>) -> Result<()> {
        let Some(refreshed) = refreshed else {
            return Ok(());
        };

        // Write lock held across the db write so concurrent refreshes
        // serialize and the snapshot always matches the stored row.
        let mut token = self.token.write().await;

        let encrypted =
            self.cipher
                .encrypt(&refreshed.access_token)
                .map_err(|e| CredentialError::EncryptFailed {
                    account_id: self.account_id,
                    reason: e.to_string(),
                })?;

        let updated = self
            .db
            .update_account_token(
                self.account_id,
                &encrypted,
                refreshed.expires_at.map(|t| t.timestamp()),
            )
            .await
            .map_err(|e| CredentialError::PersistFailed {
                account_id: self.account_id,
                reason: e.to_string(),
            })?;
        if !updated {
            return Err(CredentialError::PersistFailed {
                account_id: self.account_id,
                reason: "mail account row no longer exists".to_string(),
            }
            .into());
        }

        token.access_token = refreshed.access_token;
        token.expires_at = refreshed.expires_at;

        tracing::debug!(
            account_id = self.account_id,
            "Persisted refreshed access token"
        );

        Ok(())
    }
}
