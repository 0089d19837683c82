//! Shared test helpers for engine tests: fake collaborators and seeding.

use crate::cipher::NoOpCipher;
use crate::config::Config;
use crate::credentials::{RefreshedToken, TokenSnapshot};
use crate::db::{Database, InsertMailAccountParams, InsertSubscriptionParams};
use crate::engine::Lettercast;
use crate::error::{Error, ProviderError, Result};
use crate::extractor::ContentExtractor;
use crate::gmail::{MailProvider, MessageFetch, MessageList};
use crate::synthesis::{SpeechSynthesizer, SynthesisOptions, SynthesisResult};
use crate::types::{Cadence, ExtractedArticle, FetchedMessage, SubscriptionId, UserId};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Configurable in-memory mail provider.
///
/// Queries are routed to message id lists by substring match, so tests can
/// serve different subscriptions (different senders) different messages.
#[derive(Default)]
pub(crate) struct FakeProvider {
    messages: Mutex<HashMap<String, FetchedMessage>>,
    routes: Mutex<Vec<(String, Vec<String>)>>,
    fail_list_containing: Mutex<Vec<String>>,
    credential_fail_containing: Mutex<Vec<String>>,
    fail_fetch_ids: Mutex<Vec<String>>,
    refresh_on_list: Mutex<Option<RefreshedToken>>,
    /// Queries passed to list calls, in call order
    pub(crate) list_queries: Mutex<Vec<String>>,
    /// `max_results` passed to list calls, in call order
    pub(crate) list_max_results: Mutex<Vec<usize>>,
    /// Number of get_message calls
    pub(crate) fetch_calls: AtomicUsize,
}

impl FakeProvider {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `ids` for any list query containing `query_part`
    pub(crate) fn route(&self, query_part: &str, ids: &[&str]) {
        self.routes.lock().unwrap().push((
            query_part.to_string(),
            ids.iter().map(|s| s.to_string()).collect(),
        ));
    }

    pub(crate) fn add_message(&self, message: FetchedMessage) {
        self.messages
            .lock()
            .unwrap()
            .insert(message.id.clone(), message);
    }

    /// Fail list calls whose query contains `query_part` with a provider error
    pub(crate) fn fail_list_for(&self, query_part: &str) {
        self.fail_list_containing
            .lock()
            .unwrap()
            .push(query_part.to_string());
    }

    /// Fail list calls whose query contains `query_part` with a credential error
    pub(crate) fn fail_credentials_for(&self, query_part: &str) {
        self.credential_fail_containing
            .lock()
            .unwrap()
            .push(query_part.to_string());
    }

    /// Fail fetches of the given message id
    pub(crate) fn fail_fetch(&self, id: &str) {
        self.fail_fetch_ids.lock().unwrap().push(id.to_string());
    }

    /// Report a token renewal on the next list call
    pub(crate) fn refresh_on_next_list(&self, refreshed: RefreshedToken) {
        *self.refresh_on_list.lock().unwrap() = Some(refreshed);
    }
}

#[async_trait]
impl MailProvider for FakeProvider {
    async fn list_message_ids(
        &self,
        token: &TokenSnapshot,
        query: &str,
        max_results: usize,
    ) -> Result<MessageList> {
        self.list_queries.lock().unwrap().push(query.to_string());
        self.list_max_results.lock().unwrap().push(max_results);

        if self
            .credential_fail_containing
            .lock()
            .unwrap()
            .iter()
            .any(|part| query.contains(part.as_str()))
        {
            return Err(crate::error::CredentialError::RefreshFailed {
                account_id: token.account_id,
                reason: "invalid_grant".to_string(),
            }
            .into());
        }

        if self
            .fail_list_containing
            .lock()
            .unwrap()
            .iter()
            .any(|part| query.contains(part.as_str()))
        {
            return Err(ProviderError::ListFailed("provider unavailable".to_string()).into());
        }

        let ids = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(part, _)| query.contains(part.as_str()))
            .map(|(_, ids)| ids.clone())
            .unwrap_or_default();

        Ok(MessageList {
            ids,
            refreshed: self.refresh_on_list.lock().unwrap().take(),
        })
    }

    async fn get_message(&self, _token: &TokenSnapshot, id: &str) -> Result<MessageFetch> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self
            .fail_fetch_ids
            .lock()
            .unwrap()
            .iter()
            .any(|fail_id| fail_id == id)
        {
            return Err(ProviderError::FetchFailed {
                id: id.to_string(),
                reason: "message gone".to_string(),
            }
            .into());
        }

        let message = self
            .messages
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::FetchFailed {
                id: id.to_string(),
                reason: "unknown message id".to_string(),
            })?;

        Ok(MessageFetch {
            message,
            refreshed: None,
        })
    }
}

/// Counting extractor returning a fixed article list
pub(crate) struct FakeExtractor {
    /// Number of extract calls
    pub(crate) calls: AtomicUsize,
    fail: AtomicBool,
    articles: Mutex<Vec<ExtractedArticle>>,
}

impl FakeExtractor {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            articles: Mutex::new(vec![ExtractedArticle {
                text: "extracted article body".to_string(),
                title: Some("Extracted Title".to_string()),
                ..Default::default()
            }]),
        })
    }

    pub(crate) fn fail_all(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_articles(&self, articles: Vec<ExtractedArticle>) {
        *self.articles.lock().unwrap() = articles;
    }
}

#[async_trait]
impl ContentExtractor for FakeExtractor {
    async fn extract(&self, _html: &str, _text: Option<&str>) -> Result<Vec<ExtractedArticle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Extraction("extractor offline".to_string()));
        }
        Ok(self.articles.lock().unwrap().clone())
    }
}

/// Capturing synthesizer returning a fixed script and audio location
pub(crate) struct FakeSynthesizer {
    /// Number of synthesize calls
    pub(crate) calls: AtomicUsize,
    /// Digest texts passed in, in call order
    pub(crate) texts: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl FakeSynthesizer {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub(crate) fn fail_all(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, _options: &SynthesisOptions) -> Result<SynthesisResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Synthesis("tts backend down".to_string()));
        }
        Ok(SynthesisResult {
            script: Some("HOST: Welcome back.".to_string()),
            audio_url: Some("https://audio.test/episode.mp3".to_string()),
        })
    }
}

/// An engine wired to fakes, plus handles to the fakes for assertions.
/// The temp file must be kept alive for the lifetime of the database.
pub(crate) struct TestEngine {
    pub(crate) engine: Lettercast,
    pub(crate) provider: Arc<FakeProvider>,
    pub(crate) extractor: Arc<FakeExtractor>,
    pub(crate) synthesizer: Arc<FakeSynthesizer>,
    _db_file: NamedTempFile,
}

pub(crate) async fn create_test_engine() -> TestEngine {
    create_test_engine_with(Config::default()).await
}

pub(crate) async fn create_test_engine_with(config: Config) -> TestEngine {
    let db_file = NamedTempFile::new().unwrap();
    let db = Arc::new(Database::new(db_file.path()).await.unwrap());

    let provider = FakeProvider::new();
    let extractor = FakeExtractor::new();
    let synthesizer = FakeSynthesizer::new();

    let engine = Lettercast::with_collaborators(
        config,
        db,
        provider.clone(),
        extractor.clone(),
        synthesizer.clone(),
        Arc::new(NoOpCipher),
    );

    TestEngine {
        engine,
        provider,
        extractor,
        synthesizer,
        _db_file: db_file,
    }
}

pub(crate) async fn seed_user(db: &Database, email: &str) -> UserId {
    UserId::new(db.insert_user(email, Some("Test User")).await.unwrap())
}

pub(crate) async fn seed_account(db: &Database, user_id: UserId) -> i64 {
    db.insert_mail_account(InsertMailAccountParams {
        user_id,
        provider: "google",
        address: "inbox@example.com",
        access_token_enc: Some("access-token"),
        refresh_token_enc: Some("refresh-token"),
        token_expires_at: Some(4_000_000_000),
    })
    .await
    .unwrap()
}

/// Seed an active subscription due in today's window
pub(crate) async fn seed_subscription(
    db: &Database,
    user_id: UserId,
    title: &str,
    senders: &[&str],
    cadence: Cadence,
) -> SubscriptionId {
    let senders: Vec<String> = senders.iter().map(|s| s.to_string()).collect();
    let id = db
        .insert_subscription(InsertSubscriptionParams {
            user_id,
            title,
            cadence,
            senders: &senders,
            active: true,
            next_run: Utc::now().timestamp(),
        })
        .await
        .unwrap();
    SubscriptionId::new(id)
}

pub(crate) fn html_message(id: &str, from: &str, html: &str, text: &str) -> FetchedMessage {
    let mut message = plain_message(id, from, text);
    message.body_html = Some(html.to_string());
    message
}

pub(crate) fn plain_message(id: &str, from: &str, text: &str) -> FetchedMessage {
    let mut headers = HashMap::new();
    headers.insert("From".to_string(), from.to_string());
    headers.insert("Subject".to_string(), format!("Issue from {}", from));
    headers.insert(
        "Date".to_string(),
        "Mon, 5 Feb 2024 09:00:00 +0000".to_string(),
    );
    FetchedMessage {
        id: id.to_string(),
        thread_id: Some(format!("t-{}", id)),
        snippet: Some("preview".to_string()),
        internal_date: Some(1_707_123_600_000),
        headers,
        body_text: Some(text.to_string()),
        body_html: None,
    }
}
