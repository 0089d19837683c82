//! # lettercast
//!
//! Backend library that turns subscribed email newsletters into podcast episodes.
//!
//! ## Design Philosophy
//!
//! lettercast is designed to be:
//! - **Batch-oriented** - One digest job per UTC day, no realtime machinery
//! - **Failure-contained** - One subscription's error never aborts its siblings
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use lettercast::{Lettercast, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         gmail: lettercast::config::GmailConfig {
//!             client_id: "client-id".to_string(),
//!             client_secret: "client-secret".to_string(),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!
//!     let engine = Lettercast::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Run one digest job immediately
//!     let report = engine.run_job().await?;
//!     println!("completed: {}, failed: {}", report.completed(), report.failed());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Token encryption boundary
pub mod cipher;
/// Digest text composition
pub mod compose;
/// Configuration types
pub mod config;
/// Per-account credential lifecycle
pub mod credentials;
/// Database persistence layer
pub mod db;
/// Core digest engine (decomposed into focused submodules)
pub mod engine;
/// Error types
pub mod error;
/// Content-extraction collaborator
pub mod extractor;
/// Bounded-concurrency batch execution
pub mod fanout;
/// Gmail provider client
pub mod gmail;
/// Background digest job scheduling
pub mod job_scheduler;
/// Schedule math for digest runs
pub mod schedule;
/// Speech-synthesis collaborator
pub mod synthesis;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use cipher::{NoOpCipher, TokenCipher};
pub use config::Config;
pub use db::Database;
pub use engine::{JobOverrides, Lettercast};
pub use error::{
    CredentialError, DatabaseError, Error, ProviderError, Result, ScheduleError,
};
pub use synthesis::{PodcastFormat, SynthesisOptions};
pub use types::{
    Cadence, Event, JobReport, RunOutcome, SubscriptionId, SubscriptionRunResult, UserId,
    UserRunReport,
};

/// Helper function to run the engine with graceful signal handling.
///
/// Starts the background job scheduler, waits for a termination signal, and
/// then calls the engine's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use lettercast::{Lettercast, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let engine = Lettercast::new(config).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(engine).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(engine: Lettercast) -> Result<()> {
    let scheduler = engine.spawn_job_scheduler();
    wait_for_signal().await;
    engine.shutdown().await?;
    let _ = scheduler.await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
