//! Core digest engine split into focused submodules.
//!
//! The `Lettercast` struct and its methods are organized by domain:
//! - [`orchestrator`] - Digest job entry points and per-user batching
//! - [`pipeline`] - The per-subscription pipeline (list, fetch, extract,
//!   compose, synthesize, persist, reschedule)

mod orchestrator;
mod pipeline;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use orchestrator::JobOverrides;

use crate::cipher::{NoOpCipher, TokenCipher};
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::extractor::{ContentExtractor, HttpExtractor};
use crate::gmail::{GmailClient, MailProvider};
use crate::job_scheduler::JobScheduler;
use crate::synthesis::{HttpSynthesizer, SpeechSynthesizer};
use crate::types::Event;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Main engine instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Lettercast {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to seed users and inspect run history
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Mail provider client (trait object for pluggable implementations)
    pub(crate) provider: Arc<dyn MailProvider>,
    /// Content-extraction client
    pub(crate) extractor: Arc<dyn ContentExtractor>,
    /// Speech-synthesis client
    pub(crate) synthesizer: Arc<dyn SpeechSynthesizer>,
    /// Token cipher for credentials at rest
    pub(crate) cipher: Arc<dyn TokenCipher>,
    /// Cancellation token observed by background tasks
    pub(crate) shutdown_token: CancellationToken,
}

impl Lettercast {
    /// Create a new Lettercast engine instance
    ///
    /// This initializes all core components:
    /// - Opens/creates the SQLite database and runs migrations
    /// - Builds the HTTP clients for Gmail, extraction, and synthesis
    /// - Sets up the event broadcast channel
    ///
    /// Tokens are stored through [`NoOpCipher`] until a real cipher is
    /// supplied via [`with_cipher`](Self::with_cipher).
    pub async fn new(config: Config) -> Result<Self> {
        // Initialize database
        let db = Database::new(&config.persistence.database_path).await?;

        // Create broadcast channel with buffer size of 1000 events
        // This allows multiple subscribers to receive all events independently
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let provider: Arc<dyn MailProvider> = Arc::new(GmailClient::new(config.gmail.clone())?);
        let extractor: Arc<dyn ContentExtractor> =
            Arc::new(HttpExtractor::new(config.extractor.clone())?);
        let synthesizer: Arc<dyn SpeechSynthesizer> =
            Arc::new(HttpSynthesizer::new(config.synthesis.clone())?);

        let cipher: Arc<dyn TokenCipher> = Arc::new(NoOpCipher);
        tracing::info!(cipher = cipher.name(), "Token cipher initialized");

        Ok(Self {
            db: Arc::new(db),
            event_tx,
            config: Arc::new(config),
            provider,
            extractor,
            synthesizer,
            cipher,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Construct an engine around externally built collaborators
    ///
    /// Used by tests to substitute fakes for the provider, extractor, and
    /// synthesizer, and by embedders that manage their own database handle.
    pub fn with_collaborators(
        config: Config,
        db: Arc<Database>,
        provider: Arc<dyn MailProvider>,
        extractor: Arc<dyn ContentExtractor>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        cipher: Arc<dyn TokenCipher>,
    ) -> Self {
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
        Self {
            db,
            event_tx,
            config: Arc::new(config),
            provider,
            extractor,
            synthesizer,
            cipher,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Replace the token cipher
    ///
    /// Call before handling any accounts; existing rows encrypted with the
    /// previous cipher will no longer decrypt.
    pub fn with_cipher(mut self, cipher: Arc<dyn TokenCipher>) -> Self {
        tracing::info!(cipher = cipher.name(), "Token cipher replaced");
        self.cipher = cipher;
        self
    }

    /// Subscribe to digest events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but if a subscriber falls behind by more than 1000 events,
    /// it will receive a `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lettercast::{Lettercast, Config};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let engine = Lettercast::new(Config::default()).await?;
    ///
    ///     let mut events = engine.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "digest event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Start the background digest job scheduler
    ///
    /// The scheduler runs the digest job once per UTC day and exits when
    /// [`shutdown`](Self::shutdown) is called.
    pub fn spawn_job_scheduler(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = JobScheduler::new(Arc::new(self.clone()));

        let handle = tokio::spawn(async move {
            scheduler.run().await;
        });

        tracing::info!("Digest job scheduler background task started");

        handle
    }

    /// Gracefully shut down the engine
    ///
    /// Signals background tasks to stop. A digest job already in flight
    /// finishes its current subscription before the scheduler observes the
    /// signal; no new job is started afterwards.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.shutdown_token.cancel();

        // Database is in an Arc, so the connection pool closes when the
        // last reference is dropped.
        tracing::info!("Shutdown complete - database connections will close when engine is dropped");

        Ok(())
    }
}
