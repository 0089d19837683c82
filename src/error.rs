//! Error types for lettercast
//!
//! This module provides comprehensive error handling for the library, including:
//! - Domain-specific error types (Database, Credential, Provider, Schedule)
//! - Automatic conversions from sqlx, reqwest, serde_json and std::io errors
//! - A classifier for credential failures, which are fatal to the rest of a
//!   user's run rather than to a single subscription

use thiserror::Error;

/// Result type alias for lettercast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for lettercast
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "gmail.client_id")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Credential lifecycle error (missing, undecryptable, or unrefreshable token)
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Mail provider API error
    #[error("mail provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Content extraction error
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Speech synthesis error
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Schedule computation error
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Concurrent batch execution error
    #[error("executor error: {0}")]
    Executor(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is a credential failure.
    ///
    /// Credential failures poison every remaining subscription of the same
    /// user in the current job run: once a refresh or decrypt has failed
    /// there is no point calling the provider again with the same account.
    pub fn is_credential(&self) -> bool {
        matches!(self, Error::Credential(_))
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Credential lifecycle errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// User has no mail account for the supported provider
    #[error("user {user_id} has no usable mail account")]
    MissingAccount {
        /// The user whose account lookup failed
        user_id: i64,
    },

    /// Mail account exists but carries no access token
    #[error("mail account {account_id} has no access token")]
    MissingAccessToken {
        /// The account without a token
        account_id: i64,
    },

    /// Stored token could not be decrypted
    #[error("failed to decrypt token for account {account_id}: {reason}")]
    DecryptFailed {
        /// The account whose token failed to decrypt
        account_id: i64,
        /// The reason decryption failed
        reason: String,
    },

    /// Refreshed token could not be encrypted for storage
    #[error("failed to encrypt token for account {account_id}: {reason}")]
    EncryptFailed {
        /// The account whose token failed to encrypt
        account_id: i64,
        /// The reason encryption failed
        reason: String,
    },

    /// Token refresh against the identity provider failed
    #[error("failed to refresh token for account {account_id}: {reason}")]
    RefreshFailed {
        /// The account whose refresh failed
        account_id: i64,
        /// The reason the refresh failed
        reason: String,
    },

    /// Refreshed token could not be persisted
    #[error("failed to persist refreshed token for account {account_id}: {reason}")]
    PersistFailed {
        /// The account whose token write failed
        account_id: i64,
        /// The reason the write failed
        reason: String,
    },
}

/// Mail provider API errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Message listing call failed
    #[error("message list failed: {0}")]
    ListFailed(String),

    /// Single message fetch failed
    #[error("message fetch failed for {id}: {reason}")]
    FetchFailed {
        /// The provider message id that failed to fetch
        id: String,
        /// The reason the fetch failed
        reason: String,
    },

    /// Provider returned a non-success HTTP status
    #[error("provider returned status {code}: {detail}")]
    Status {
        /// HTTP status code returned by the provider
        code: u16,
        /// Response body or status text
        detail: String,
    },
}

/// Schedule computation errors
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Cadence string is not one of the supported values
    #[error("unsupported cadence: {0}")]
    UnsupportedCadence(String),
}
