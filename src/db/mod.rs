//! Database layer for lettercast
//!
//! Handles SQLite persistence for users, mail accounts, subscriptions, and
//! run history.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`users`] — User CRUD and due-work discovery
//! - [`accounts`] — Mail account CRUD and token persistence
//! - [`subscriptions`] — Subscription CRUD and schedule advancement
//! - [`history`] — Append-only run history

use crate::error::Result;
use crate::types::{Cadence, MessageMeta, SubscriptionId, UserId};
use sqlx::{FromRow, sqlite::SqlitePool};

mod accounts;
mod history;
mod migrations;
mod subscriptions;
mod users;

/// User record from database
#[derive(Debug, Clone, FromRow)]
pub struct User {
    /// Unique database ID
    pub id: i64,
    /// Email address (unique)
    pub email: String,
    /// Display name
    pub display_name: Option<String>,
    /// Unix timestamp when the user was created
    pub created_at: i64,
}

/// Mail account record from database
///
/// Tokens are stored encrypted; the credential layer decrypts them with
/// the configured cipher before use.
#[derive(Debug, Clone, FromRow)]
pub struct MailAccount {
    /// Unique database ID
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Mail provider identifier (e.g., "google")
    pub provider: String,
    /// Mailbox address at the provider
    pub address: String,
    /// Encrypted OAuth access token
    pub access_token_enc: Option<String>,
    /// Encrypted OAuth refresh token
    pub refresh_token_enc: Option<String>,
    /// Unix timestamp when the access token expires
    pub token_expires_at: Option<i64>,
    /// Unix timestamp when the account was linked
    pub created_at: i64,
}

/// Subscription record from database
#[derive(Debug, Clone, FromRow)]
pub struct Subscription {
    /// Unique database ID
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Newsletter title
    pub title: String,
    /// Delivery cadence
    pub cadence: Cadence,
    /// Whether digest jobs process this subscription (0 = no, 1 = yes)
    pub active: i32,
    /// JSON array of sender addresses whose mail belongs to this newsletter
    pub senders: String,
    /// Unix timestamp of the last successful run
    pub last_run: Option<i64>,
    /// Unix timestamp when the next run is due
    pub next_run: i64,
    /// Unix timestamp when the subscription was created
    pub created_at: i64,
}

impl Subscription {
    /// Sender addresses parsed from their JSON column
    pub fn sender_list(&self) -> Result<Vec<String>> {
        Ok(serde_json::from_str(&self.senders)?)
    }
}

/// Run-history record from database
#[derive(Debug, Clone, FromRow)]
pub struct RunHistoryRow {
    /// Unique database ID
    pub id: i64,
    /// Subscription the run belongs to
    pub subscription_id: i64,
    /// Owning user (denormalized for reporting queries)
    pub user_id: i64,
    /// Unix timestamp when the run happened
    pub run_at: i64,
    /// Number of messages fetched in the run
    pub message_count: i64,
    /// Generated narration script
    pub script: Option<String>,
    /// Stored audio location
    pub audio_url: Option<String>,
    /// JSON array of message metadata snapshots
    pub messages_json: String,
    /// Unix timestamp when the record was written
    pub created_at: i64,
}

impl RunHistoryRow {
    /// Message snapshots parsed from their JSON column
    pub fn messages(&self) -> Result<Vec<MessageMeta>> {
        Ok(serde_json::from_str(&self.messages_json)?)
    }
}

/// Parameters for inserting a new mail account
pub struct InsertMailAccountParams<'a> {
    /// Owning user
    pub user_id: UserId,
    /// Mail provider identifier (e.g., "google")
    pub provider: &'a str,
    /// Mailbox address at the provider
    pub address: &'a str,
    /// Encrypted access token
    pub access_token_enc: Option<&'a str>,
    /// Encrypted refresh token
    pub refresh_token_enc: Option<&'a str>,
    /// Unix timestamp when the access token expires
    pub token_expires_at: Option<i64>,
}

/// Parameters for inserting a new subscription
pub struct InsertSubscriptionParams<'a> {
    /// Owning user
    pub user_id: UserId,
    /// Newsletter title
    pub title: &'a str,
    /// Delivery cadence
    pub cadence: Cadence,
    /// Sender addresses whose mail belongs to this newsletter
    pub senders: &'a [String],
    /// Whether digest jobs should process this subscription
    pub active: bool,
    /// Unix timestamp when the first run is due
    pub next_run: i64,
}

/// New run-history record to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewRunHistory {
    /// Subscription the run belongs to
    pub subscription_id: SubscriptionId,
    /// Owning user (denormalized for reporting queries)
    pub user_id: UserId,
    /// Unix timestamp when the run happened
    pub run_at: i64,
    /// Number of messages fetched
    pub message_count: i64,
    /// Generated narration script, if the synthesizer returned one
    pub script: Option<String>,
    /// Stored audio location, if the synthesizer returned one
    pub audio_url: Option<String>,
    /// JSON array of message metadata snapshots
    pub messages_json: String,
}

/// A user with due subscriptions and the accounts eligible to serve them
#[derive(Debug, Clone)]
pub struct DueUser {
    /// The user record
    pub user: User,
    /// Mail accounts for the requested provider, in id order
    pub accounts: Vec<MailAccount>,
    /// Active subscriptions due inside the window, in id order
    pub subscriptions: Vec<Subscription>,
}

/// Database handle for lettercast
pub struct Database {
    pool: SqlitePool,
}
