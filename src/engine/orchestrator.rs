//! Digest job entry points and per-user batching.
//!
//! A job walks every user with due subscriptions, builds one credential
//! handle per user, and runs the pipeline once per due subscription. Users
//! and subscriptions are processed sequentially in load order; no single
//! failure stops the batch, and the report names every considered user and
//! subscription with either a success detail or an error message.

use crate::config::{MAX_EMAILS_CEILING, MAX_FETCH_CONCURRENCY, SUPPORTED_PROVIDER};
use crate::credentials::CredentialHandle;
use crate::db::DueUser;
use crate::error::{CredentialError, Error, Result};
use crate::schedule;
use crate::types::{
    Event, JobReport, RunOutcome, SubscriptionId, SubscriptionRunResult, UserId, UserRunReport,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::Lettercast;
use super::pipeline::{JobContext, SubscriptionRun};

/// Operator overrides for a manually triggered digest job
///
/// Each field replaces its configured value for one job only; the stored
/// configuration is not changed. Values are clamped to the same ranges as
/// their configured counterparts.
#[derive(Debug, Clone, Default)]
pub struct JobOverrides {
    /// Message-list cap for this job
    pub max_emails_per_newsletter: Option<usize>,
    /// Message-fetch concurrency for this job
    pub gmail_fetch_concurrency: Option<usize>,
}

impl Lettercast {
    /// Run one digest job over every subscription due today
    pub async fn run_job(&self) -> Result<JobReport> {
        self.run_job_with(JobOverrides::default()).await
    }

    /// Run one digest job with operator overrides
    ///
    /// Only the due-work discovery query can fail the job as a whole. Every
    /// later failure is contained in the report as a user-level or
    /// subscription-level error entry.
    pub async fn run_job_with(&self, overrides: JobOverrides) -> Result<JobReport> {
        let run_at = chrono::Utc::now();
        let (window_start, window_end) = schedule::window_for(run_at);

        let job = JobContext {
            run_at,
            window_start,
            max_emails: overrides
                .max_emails_per_newsletter
                .unwrap_or(self.config.job.max_emails_per_newsletter)
                .clamp(1, MAX_EMAILS_CEILING),
            fetch_concurrency: overrides
                .gmail_fetch_concurrency
                .unwrap_or(self.config.job.gmail_fetch_concurrency)
                .clamp(1, MAX_FETCH_CONCURRENCY),
        };

        let due = self
            .db
            .load_due_users(
                window_start.timestamp(),
                window_end.timestamp(),
                SUPPORTED_PROVIDER,
            )
            .await?;

        info!(
            users_due = due.len(),
            window_start = %window_start,
            "Digest job started"
        );
        let _ = self.event_tx.send(Event::JobStarted {
            run_at,
            users_due: due.len(),
        });

        let mut users = Vec::with_capacity(due.len());
        for due_user in due {
            users.push(self.run_user(due_user, &job).await);
        }

        let report = JobReport {
            run_at,
            users_considered: users.len(),
            users,
        };

        info!(
            completed = report.completed(),
            failed = report.failed(),
            "Digest job finished"
        );
        let _ = self.event_tx.send(Event::JobCompleted {
            completed: report.completed(),
            failed: report.failed(),
        });

        Ok(report)
    }

    /// Process one user's due subscriptions sequentially
    async fn run_user(&self, due: DueUser, job: &JobContext) -> UserRunReport {
        let DueUser {
            user,
            accounts,
            subscriptions,
        } = due;

        // The first account in id order serves the whole run
        let Some(account) = accounts.first() else {
            warn!(
                user_id = user.id,
                provider = SUPPORTED_PROVIDER,
                "No mail account for provider, skipping subscriptions"
            );
            let e: Error = CredentialError::MissingAccount { user_id: user.id }.into();
            return UserRunReport {
                user_id: UserId::new(user.id),
                email: user.email,
                error: Some(e.to_string()),
                subscriptions: Vec::new(),
            };
        };

        let credential = match CredentialHandle::load(
            account,
            Arc::clone(&self.db),
            Arc::clone(&self.cipher),
        ) {
            Ok(handle) => Arc::new(handle),
            Err(e) => {
                warn!(
                    user_id = user.id,
                    account_id = account.id,
                    error = %e,
                    "Unusable credentials, skipping subscriptions"
                );
                return UserRunReport {
                    user_id: UserId::new(user.id),
                    email: user.email,
                    error: Some(e.to_string()),
                    subscriptions: Vec::new(),
                };
            }
        };

        let mut results = Vec::with_capacity(subscriptions.len());
        // Set once a credential failure makes further provider calls
        // pointless; the remaining subscriptions fail without being run
        let mut account_failure: Option<String> = None;

        for subscription in &subscriptions {
            let outcome = match &account_failure {
                Some(reason) => RunOutcome::Failed {
                    error: format!("skipped after credential failure: {}", reason),
                },
                None => {
                    let run = SubscriptionRun {
                        user: &user,
                        subscription,
                        credential: &credential,
                        job,
                    };
                    match self.run_subscription(run).await {
                        Ok(done) => RunOutcome::Completed {
                            messages_fetched: done.messages_fetched,
                            history_id: done.history_id,
                            audio_url: done.audio_url,
                        },
                        Err(e) => {
                            if e.is_credential() {
                                account_failure = Some(e.to_string());
                            }
                            RunOutcome::Failed {
                                error: e.to_string(),
                            }
                        }
                    }
                }
            };

            match &outcome {
                RunOutcome::Completed {
                    messages_fetched,
                    audio_url,
                    ..
                } => {
                    info!(
                        subscription_id = subscription.id,
                        user_id = user.id,
                        messages = messages_fetched,
                        "Subscription digest completed"
                    );
                    let _ = self.event_tx.send(Event::SubscriptionCompleted {
                        subscription_id: SubscriptionId::new(subscription.id),
                        user_id: UserId::new(user.id),
                        messages_fetched: *messages_fetched,
                        audio_url: audio_url.clone(),
                    });
                }
                RunOutcome::Failed { error } => {
                    error!(
                        subscription_id = subscription.id,
                        user_id = user.id,
                        error = %error,
                        "Subscription digest failed"
                    );
                    let _ = self.event_tx.send(Event::SubscriptionFailed {
                        subscription_id: SubscriptionId::new(subscription.id),
                        user_id: UserId::new(user.id),
                        error: error.clone(),
                    });
                }
            }

            results.push(SubscriptionRunResult {
                subscription_id: SubscriptionId::new(subscription.id),
                title: subscription.title.clone(),
                outcome,
            });
        }

        UserRunReport {
            user_id: UserId::new(user.id),
            email: user.email,
            error: None,
            subscriptions: results,
        }
    }
}
