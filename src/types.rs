//! Core types for lettercast

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a user
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Create a new UserId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for UserId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<UserId> for i64 {
    fn eq(&self, other: &UserId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for UserId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for UserId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for UserId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Unique identifier for a newsletter subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub i64);

impl SubscriptionId {
    /// Create a new SubscriptionId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for SubscriptionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<SubscriptionId> for i64 {
    fn from(id: SubscriptionId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for SubscriptionId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<SubscriptionId> for i64 {
    fn eq(&self, other: &SubscriptionId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SubscriptionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl sqlx::Type<sqlx::Sqlite> for SubscriptionId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for SubscriptionId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for SubscriptionId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Delivery cadence of a subscription
///
/// Stored as lowercase text. Unrecognized values are preserved in
/// `Other` so existing rows survive round trips; the schedule
/// calculator rejects them when computing the next run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Cadence {
    /// Every 7 days
    Weekly,
    /// Every 14 days
    Biweekly,
    /// Every calendar month (day clamped to the end of shorter months)
    Monthly,
    /// Unrecognized cadence string, kept verbatim
    Other(String),
}

impl Cadence {
    /// The stored string form
    pub fn as_str(&self) -> &str {
        match self {
            Cadence::Weekly => "weekly",
            Cadence::Biweekly => "biweekly",
            Cadence::Monthly => "monthly",
            Cadence::Other(s) => s,
        }
    }
}

impl From<&str> for Cadence {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "weekly" => Cadence::Weekly,
            "biweekly" => Cadence::Biweekly,
            "monthly" => Cadence::Monthly,
            _ => Cadence::Other(s.to_string()),
        }
    }
}

impl From<String> for Cadence {
    fn from(s: String) -> Self {
        Cadence::from(s.as_str())
    }
}

impl From<Cadence> for String {
    fn from(c: Cadence) -> Self {
        c.as_str().to_string()
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl sqlx::Type<sqlx::Sqlite> for Cadence {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for Cadence {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode(self.as_str().to_owned(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for Cadence {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Cadence::from(s))
    }
}

/// A fully fetched mail message with decoded bodies
#[derive(Clone, Debug, Default)]
pub struct FetchedMessage {
    /// Provider-assigned message identifier
    pub id: String,

    /// Conversation thread identifier
    pub thread_id: Option<String>,

    /// Short plain-text preview supplied by the provider
    pub snippet: Option<String>,

    /// Provider-reported receive time (epoch milliseconds)
    pub internal_date: Option<i64>,

    /// Message headers with original casing preserved in keys
    pub headers: HashMap<String, String>,

    /// Decoded text/plain body, if the message has one
    pub body_text: Option<String>,

    /// Decoded text/html body, if the message has one
    pub body_html: Option<String>,
}

impl FetchedMessage {
    /// Look up a header value by name, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Body-free snapshot of a fetched message, persisted with run history
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageMeta {
    /// Provider-assigned message identifier
    pub id: String,

    /// Conversation thread identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Short plain-text preview
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,

    /// Provider-reported receive time (epoch milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_date: Option<i64>,

    /// Message headers
    pub headers: HashMap<String, String>,
}

impl From<&FetchedMessage> for MessageMeta {
    fn from(m: &FetchedMessage) -> Self {
        Self {
            id: m.id.clone(),
            thread_id: m.thread_id.clone(),
            snippet: m.snippet.clone(),
            internal_date: m.internal_date,
            headers: m.headers.clone(),
        }
    }
}

/// One article extracted from a newsletter email
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExtractedArticle {
    /// Snippet text as it appeared in the email body
    pub text: String,

    /// Article title as it appeared in the email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Outbound link the snippet pointed at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// Anchor text of the link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_text: Option<String>,

    /// Full article text obtained by following the link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Title of the fetched article page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_title: Option<String>,

    /// Link URL after redirects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    /// How the article page was fetched (e.g., "http", "browser")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_method: Option<String>,

    /// Error encountered while following the link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

/// A newsletter email reduced to its article content
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExtractedEmail {
    /// Subject header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// From header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Date header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Articles found in the email body, in document order
    #[serde(default)]
    pub articles: Vec<ExtractedArticle>,
}

impl ExtractedEmail {
    /// Single-article form built from the message's plain text.
    ///
    /// Used when a message carries no HTML body, and as the fallback when
    /// the extraction service fails. Prefers the decoded text/plain body
    /// over the provider snippet.
    pub fn from_plain_text(message: &FetchedMessage) -> Self {
        let text = message
            .body_text
            .clone()
            .or_else(|| message.snippet.clone())
            .unwrap_or_default();
        Self {
            subject: message.header("Subject").map(str::to_owned),
            from: message.header("From").map(str::to_owned),
            date: message.header("Date").map(str::to_owned),
            articles: vec![ExtractedArticle {
                text,
                ..Default::default()
            }],
        }
    }
}

/// Outcome of one subscription's pipeline run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Pipeline completed and a history record was written
    Completed {
        /// Number of messages fetched in this run
        messages_fetched: usize,
        /// Row id of the run-history record
        history_id: i64,
        /// Where the synthesized audio was stored, if the synthesizer reported it
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_url: Option<String>,
    },
    /// Pipeline failed; schedule and history were left untouched
    Failed {
        /// Error message describing the failure
        error: String,
    },
}

/// Result entry for one subscription in a job report
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionRunResult {
    /// The subscription that ran
    pub subscription_id: SubscriptionId,

    /// Subscription title, for log and report readability
    pub title: String,

    /// What happened
    pub outcome: RunOutcome,
}

/// Per-user section of a job report
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRunReport {
    /// The user whose subscriptions were processed
    pub user_id: UserId,

    /// The user's email address
    pub email: String,

    /// Error that prevented every subscription of this user from running
    /// (missing account, undecryptable token)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Per-subscription outcomes in processing order
    pub subscriptions: Vec<SubscriptionRunResult>,
}

/// Aggregate report for one digest job
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobReport {
    /// When the job started
    pub run_at: DateTime<Utc>,

    /// Number of users that had due subscriptions in the window
    pub users_considered: usize,

    /// Per-user outcomes in processing order
    pub users: Vec<UserRunReport>,
}

impl JobReport {
    /// Number of subscription runs that completed
    pub fn completed(&self) -> usize {
        self.users
            .iter()
            .flat_map(|u| &u.subscriptions)
            .filter(|s| matches!(s.outcome, RunOutcome::Completed { .. }))
            .count()
    }

    /// Number of subscription runs that failed
    pub fn failed(&self) -> usize {
        self.users
            .iter()
            .flat_map(|u| &u.subscriptions)
            .filter(|s| matches!(s.outcome, RunOutcome::Failed { .. }))
            .count()
    }
}

/// Event emitted during digest job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Digest job started
    JobStarted {
        /// When the job started
        run_at: DateTime<Utc>,
        /// Number of users with due subscriptions
        users_due: usize,
    },

    /// One subscription's digest completed
    SubscriptionCompleted {
        /// The subscription that completed
        subscription_id: SubscriptionId,
        /// The owning user
        user_id: UserId,
        /// Number of messages in the digest
        messages_fetched: usize,
        /// Where the audio was stored, if reported
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_url: Option<String>,
    },

    /// One subscription's digest failed
    SubscriptionFailed {
        /// The subscription that failed
        subscription_id: SubscriptionId,
        /// The owning user
        user_id: UserId,
        /// Error message
        error: String,
    },

    /// Digest job finished
    JobCompleted {
        /// Subscription runs that completed
        completed: usize,
        /// Subscription runs that failed
        failed: usize,
    },
}
