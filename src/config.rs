//! Configuration types for lettercast

use crate::synthesis::SynthesisOptions;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// The only mail provider this engine currently talks to
pub const SUPPORTED_PROVIDER: &str = "google";

/// Upper bound on messages listed per subscription run
pub const MAX_EMAILS_CEILING: usize = 50;

/// Upper bound on concurrent message-body fetches
pub const MAX_FETCH_CONCURRENCY: usize = 20;

/// Fixed concurrency for content extraction
///
/// Extraction follows links out of each email, so it is bounded
/// independently of message fetching and is not configurable.
pub const EXTRACTION_CONCURRENCY: usize = 4;

/// Digest job tuning (fetch caps, concurrency, scheduler cadence)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    /// Maximum messages listed per subscription run (default: 10)
    ///
    /// Clamped to `1..=50` at run time regardless of the configured value.
    #[serde(default = "default_max_emails")]
    pub max_emails_per_newsletter: usize,

    /// Concurrent message-body fetches per subscription (default: 5)
    ///
    /// Clamped to `1..=20` at run time regardless of the configured value.
    #[serde(default = "default_fetch_concurrency")]
    pub gmail_fetch_concurrency: usize,

    /// How often the background scheduler checks whether a new UTC day
    /// has started (default: 300 seconds)
    #[serde(default = "default_check_interval", with = "duration_serde")]
    pub scheduler_check_interval: Duration,
}

impl JobConfig {
    /// Message-list cap clamped to the accepted range
    pub fn effective_max_emails(&self) -> usize {
        self.max_emails_per_newsletter.clamp(1, MAX_EMAILS_CEILING)
    }

    /// Fetch concurrency clamped to the accepted range
    pub fn effective_fetch_concurrency(&self) -> usize {
        self.gmail_fetch_concurrency.clamp(1, MAX_FETCH_CONCURRENCY)
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_emails_per_newsletter: default_max_emails(),
            gmail_fetch_concurrency: default_fetch_concurrency(),
            scheduler_check_interval: default_check_interval(),
        }
    }
}

/// Gmail API access configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GmailConfig {
    /// Base URL of the Gmail REST API (default: `https://gmail.googleapis.com`)
    #[serde(default = "default_gmail_base_url")]
    pub api_base_url: String,

    /// OAuth token endpoint used for refresh grants
    /// (default: `https://oauth2.googleapis.com/token`)
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth client id for refresh grants
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret for refresh grants
    #[serde(default)]
    pub client_secret: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_gmail_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_gmail_base_url(),
            token_url: default_token_url(),
            client_id: String::new(),
            client_secret: String::new(),
            timeout: default_gmail_timeout(),
        }
    }
}

/// Content-extraction service endpoint
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Base URL of the extraction service (default: `http://127.0.0.1:8081`)
    #[serde(default = "default_extractor_url")]
    pub base_url: String,

    /// Per-request timeout (default: 120 seconds)
    ///
    /// Extraction follows article links out of the email, so it runs far
    /// longer than a plain API call.
    #[serde(default = "default_extractor_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_url: default_extractor_url(),
            timeout: default_extractor_timeout(),
        }
    }
}

/// Speech-synthesis service endpoint
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Base URL of the synthesis service (default: `http://127.0.0.1:8082`)
    #[serde(default = "default_synthesis_url")]
    pub base_url: String,

    /// Per-request timeout (default: 300 seconds)
    #[serde(default = "default_synthesis_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Podcast format and voice assignments sent with every request
    #[serde(default)]
    pub options: SynthesisOptions,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            base_url: default_synthesis_url(),
            timeout: default_synthesis_timeout(),
            options: SynthesisOptions::default(),
        }
    }
}

/// Data storage configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path (default: "lettercast.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for Lettercast
///
/// Fields are organized into logical sub-configs:
/// - [`job`](JobConfig) — fetch caps, concurrency, scheduler cadence
/// - [`gmail`](GmailConfig) — Gmail API and OAuth refresh endpoints
/// - [`extractor`](ExtractorConfig) — content-extraction service
/// - [`synthesis`](SynthesisConfig) — speech-synthesis service
/// - [`persistence`](PersistenceConfig) — data storage
///
/// Every field has a default, so an empty document deserializes to a
/// working local configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Digest job tuning
    #[serde(flatten)]
    pub job: JobConfig,

    /// Gmail API access
    #[serde(default)]
    pub gmail: GmailConfig,

    /// Content-extraction service
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Speech-synthesis service
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

fn default_max_emails() -> usize {
    10
}

fn default_fetch_concurrency() -> usize {
    5
}

fn default_check_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_gmail_base_url() -> String {
    "https://gmail.googleapis.com".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_gmail_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_extractor_url() -> String {
    "http://127.0.0.1:8081".to_string()
}

fn default_extractor_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_synthesis_url() -> String {
    "http://127.0.0.1:8082".to_string()
}

fn default_synthesis_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("lettercast.db")
}

// Duration serialization helper (seconds as u64)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.job.max_emails_per_newsletter, 10);
        assert_eq!(config.job.gmail_fetch_concurrency, 5);
        assert_eq!(config.job.scheduler_check_interval, Duration::from_secs(300));
        assert_eq!(config.gmail.api_base_url, "https://gmail.googleapis.com");
        assert_eq!(config.gmail.timeout, Duration::from_secs(30));
        assert_eq!(config.extractor.timeout, Duration::from_secs(120));
        assert_eq!(config.synthesis.timeout, Duration::from_secs(300));
        assert_eq!(config.persistence.database_path, PathBuf::from("lettercast.db"));
    }

    #[test]
    fn effective_max_emails_is_clamped_to_provider_range() {
        let mut job = JobConfig::default();

        job.max_emails_per_newsletter = 0;
        assert_eq!(job.effective_max_emails(), 1, "zero must clamp up to 1");

        job.max_emails_per_newsletter = 500;
        assert_eq!(job.effective_max_emails(), 50, "oversized cap must clamp to 50");

        job.max_emails_per_newsletter = 25;
        assert_eq!(job.effective_max_emails(), 25, "in-range value passes through");
    }

    #[test]
    fn effective_fetch_concurrency_is_clamped() {
        let mut job = JobConfig::default();

        job.gmail_fetch_concurrency = 0;
        assert_eq!(job.effective_fetch_concurrency(), 1);

        job.gmail_fetch_concurrency = 100;
        assert_eq!(job.effective_fetch_concurrency(), 20);

        job.gmail_fetch_concurrency = 8;
        assert_eq!(job.effective_fetch_concurrency(), 8);
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["scheduler_check_interval"], 300);
        assert_eq!(json["gmail"]["timeout"], 30);
        assert_eq!(json["extractor"]["timeout"], 120);
        assert_eq!(json["synthesis"]["timeout"], 300);
    }

    #[test]
    fn timeout_overrides_parse_from_seconds() {
        let config: Config = serde_json::from_str(
            r#"{
                "max_emails_per_newsletter": 20,
                "gmail": {"timeout": 10, "client_id": "abc"},
                "synthesis": {"timeout": 600}
            }"#,
        )
        .unwrap();

        assert_eq!(config.job.max_emails_per_newsletter, 20);
        assert_eq!(config.gmail.timeout, Duration::from_secs(10));
        assert_eq!(config.gmail.client_id, "abc");
        assert_eq!(config.synthesis.timeout, Duration::from_secs(600));
        // untouched sections keep their defaults
        assert_eq!(config.extractor.timeout, Duration::from_secs(120));
    }
}
