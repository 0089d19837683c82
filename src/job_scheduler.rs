//! Background digest job scheduling
//!
//! Runs the digest job once per UTC day. The scheduler wakes at a fixed
//! check interval, compares the current UTC date against the last date it
//! ran for, and triggers a job when the day has changed. A job failure does
//! not retrigger within the same day; the day still counts as attempted.
//!
//! # Example
//!
//! ```no_run
//! use lettercast::{Lettercast, Config};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Lettercast::new(Config::default()).await?;
//!
//! // Runs until engine.shutdown() is called
//! let handle = engine.spawn_job_scheduler();
//! # Ok(())
//! # }
//! ```

use crate::Lettercast;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Periodic trigger for the daily digest job
pub struct JobScheduler {
    /// Reference to the engine for running jobs and observing shutdown
    engine: Arc<Lettercast>,
}

impl JobScheduler {
    /// Creates a new job scheduler
    pub fn new(engine: Arc<Lettercast>) -> Self {
        Self { engine }
    }

    /// Starts the digest job scheduling loop
    ///
    /// Runs until the engine's shutdown token is cancelled. The first job
    /// fires on the first check after startup; later jobs fire on the first
    /// check after each UTC midnight.
    pub async fn run(self) {
        info!("Digest job scheduler started");

        let mut last_run_day: Option<NaiveDate> = None;
        let check_interval = self.engine.config.job.scheduler_check_interval;

        loop {
            if self.engine.shutdown_token.is_cancelled() {
                info!("Digest job scheduler shutting down");
                break;
            }

            let today = Utc::now().date_naive();
            if last_run_day != Some(today) {
                info!(day = %today, "Running daily digest job");

                match self.engine.run_job().await {
                    Ok(report) => {
                        info!(
                            users = report.users_considered,
                            completed = report.completed(),
                            failed = report.failed(),
                            "Scheduled digest job finished"
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Scheduled digest job failed");
                    }
                }

                // The day is marked even on failure: one attempt per UTC day
                last_run_day = Some(today);
            } else {
                debug!(day = %today, "Digest job already ran today");
            }

            tokio::select! {
                _ = self.engine.shutdown_token.cancelled() => {
                    info!("Digest job scheduler shutting down");
                    break;
                }
                _ = sleep(check_interval) => {}
            }
        }

        info!("Digest job scheduler stopped");
    }
}
