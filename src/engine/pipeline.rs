//! The per-subscription digest pipeline.
//!
//! One run walks a fixed stage sequence: determine the fetch window, list
//! candidate messages, fetch bodies, extract article content, compose the
//! narration text, synthesize audio, persist history, advance the schedule.
//! There is no retry within a run; any stage failure surfaces at the
//! pipeline boundary and the subscription keeps its previous schedule.

use crate::compose;
use crate::config::EXTRACTION_CONCURRENCY;
use crate::credentials::CredentialHandle;
use crate::db::{NewRunHistory, Subscription, User};
use crate::error::{Error, Result};
use crate::extractor::ContentExtractor;
use crate::fanout;
use crate::gmail;
use crate::schedule;
use crate::types::{ExtractedEmail, FetchedMessage, MessageMeta, SubscriptionId, UserId};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use super::Lettercast;

/// Shared parameters of one digest job, fixed for every subscription in it
pub(crate) struct JobContext {
    /// Job start instant; becomes `last_run` and the history timestamp
    pub(crate) run_at: DateTime<Utc>,
    /// Start of the job's UTC-day window; fetch cutoff for first-ever runs
    pub(crate) window_start: DateTime<Utc>,
    /// Message-list cap, already clamped
    pub(crate) max_emails: usize,
    /// Message-fetch concurrency, already clamped
    pub(crate) fetch_concurrency: usize,
}

/// One subscription's slot in a running job
pub(crate) struct SubscriptionRun<'a> {
    pub(crate) user: &'a User,
    pub(crate) subscription: &'a Subscription,
    pub(crate) credential: &'a Arc<CredentialHandle>,
    pub(crate) job: &'a JobContext,
}

/// Detail of a completed pipeline run, folded into the job report
pub(crate) struct CompletedRun {
    pub(crate) messages_fetched: usize,
    pub(crate) history_id: i64,
    pub(crate) audio_url: Option<String>,
}

impl Lettercast {
    /// Run the whole pipeline for one subscription
    pub(crate) async fn run_subscription(&self, run: SubscriptionRun<'_>) -> Result<CompletedRun> {
        // 1. determine-window: fetch everything since the last successful
        // run, or since the start of the job's window for a first run
        let after = run
            .subscription
            .last_run
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or(run.job.window_start);

        // 2. list-candidates
        let senders = run.subscription.sender_list()?;
        let query = gmail::build_query(&senders, Some(after));
        debug!(
            subscription_id = run.subscription.id,
            query = %query,
            "Listing candidate messages"
        );
        let token = run.credential.current().await;
        let list = self
            .provider
            .list_message_ids(&token, &query, run.job.max_emails)
            .await?;
        run.credential.apply_refresh(list.refreshed).await?;
        debug!(
            subscription_id = run.subscription.id,
            candidates = list.ids.len(),
            "Candidate messages listed"
        );

        // 3. fetch-bodies
        let messages = self
            .fetch_bodies(list.ids, run.credential, run.job.fetch_concurrency)
            .await?;

        // 4. extract-content
        let emails = self.extract_all(&messages).await?;

        // 5. compose-text
        let digest = compose::compose_digest(&emails);
        if digest.is_empty() {
            return Err(Error::Extraction(
                "no readable content in fetched messages".to_string(),
            ));
        }

        // 6. synthesize
        let synthesis = self
            .synthesizer
            .synthesize(&digest, &self.config.synthesis.options)
            .await?;

        // 7. persist-history
        let metadata: Vec<MessageMeta> = messages.iter().map(MessageMeta::from).collect();
        let history_id = self
            .db
            .insert_run_history(&NewRunHistory {
                subscription_id: SubscriptionId::new(run.subscription.id),
                user_id: UserId::new(run.user.id),
                run_at: run.job.run_at.timestamp(),
                message_count: messages.len() as i64,
                script: synthesis.script,
                audio_url: synthesis.audio_url.clone(),
                messages_json: serde_json::to_string(&metadata)?,
            })
            .await?;

        // 8. reschedule: an unsupported cadence fails the run here, before
        // the write, so the stall shows up in every report until fixed
        let next = schedule::next_run(run.job.run_at, &run.subscription.cadence)?;
        let advanced = self
            .db
            .advance_subscription_schedule(
                SubscriptionId::new(run.subscription.id),
                run.job.run_at.timestamp(),
                next.timestamp(),
            )
            .await?;
        if !advanced {
            return Err(Error::NotFound(format!(
                "subscription {} no longer exists",
                run.subscription.id
            )));
        }

        Ok(CompletedRun {
            messages_fetched: messages.len(),
            history_id,
            audio_url: synthesis.audio_url,
        })
    }

    /// Fetch every candidate message body with bounded concurrency
    ///
    /// Each worker reads the credential snapshot immediately before its
    /// call, so a refresh performed for one message is reused by the next
    /// instead of triggering another refresh.
    async fn fetch_bodies(
        &self,
        ids: Vec<String>,
        credential: &Arc<CredentialHandle>,
        concurrency: usize,
    ) -> Result<Vec<FetchedMessage>> {
        let provider = Arc::clone(&self.provider);
        let credential = Arc::clone(credential);

        fanout::map_bounded(ids, concurrency, move |id| {
            let provider = Arc::clone(&provider);
            let credential = Arc::clone(&credential);
            async move {
                let token = credential.current().await;
                let fetch = provider.get_message(&token, &id).await?;
                credential.apply_refresh(fetch.refreshed).await?;
                Ok(fetch.message)
            }
        })
        .await
    }

    /// Extract article content from every fetched message
    ///
    /// Extraction follows article links out of the email, so it fans out
    /// under its own fixed bound rather than the fetch concurrency.
    async fn extract_all(&self, messages: &[FetchedMessage]) -> Result<Vec<ExtractedEmail>> {
        let extractor = Arc::clone(&self.extractor);

        fanout::map_bounded(messages.to_vec(), EXTRACTION_CONCURRENCY, move |message| {
            let extractor = Arc::clone(&extractor);
            async move { Ok(extract_one(extractor.as_ref(), &message).await) }
        })
        .await
    }
}

/// Extract one message's articles, falling back to its plain text.
///
/// A message without an HTML body never reaches the extraction service; an
/// extraction failure degrades to the same plain-text form instead of
/// failing the run.
async fn extract_one(extractor: &dyn ContentExtractor, message: &FetchedMessage) -> ExtractedEmail {
    let Some(html) = message.body_html.as_deref() else {
        return ExtractedEmail::from_plain_text(message);
    };

    match extractor.extract(html, message.body_text.as_deref()).await {
        Ok(articles) => ExtractedEmail {
            subject: message.header("Subject").map(str::to_owned),
            from: message.header("From").map(str::to_owned),
            date: message.header("Date").map(str::to_owned),
            articles,
        },
        Err(e) => {
            warn!(
                message_id = %message.id,
                error = %e,
                "Content extraction failed, using plain text"
            );
            ExtractedEmail::from_plain_text(message)
        }
    }
}
