//! Gmail provider boundary and REST client.
//!
//! [`MailProvider`] is the read-side seam the pipeline talks to; the
//! default implementation is [`GmailClient`] over the Gmail REST API.
//! Implementations that silently renew an expiring token to make a call
//! report the renewal in their result so the caller can persist it.

use crate::config::GmailConfig;
use crate::credentials::{RefreshedToken, TokenSnapshot};
use crate::error::{CredentialError, ProviderError};
use crate::types::FetchedMessage;
use crate::Result;
use async_trait::async_trait;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;

// Gmail pads base64url bodies inconsistently across parts
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Message ids returned by a list call
#[derive(Debug, Clone)]
pub struct MessageList {
    /// Provider message identifiers, newest first
    pub ids: Vec<String>,
    /// Token renewal performed to make the call, if any
    pub refreshed: Option<RefreshedToken>,
}

/// A fetched message and any token renewal performed to get it
#[derive(Debug, Clone)]
pub struct MessageFetch {
    /// The decoded message
    pub message: FetchedMessage,
    /// Token renewal performed to make the call, if any
    pub refreshed: Option<RefreshedToken>,
}

/// Read-side boundary to a mail provider
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// List message ids matching a provider query
    async fn list_message_ids(
        &self,
        token: &TokenSnapshot,
        query: &str,
        max_results: usize,
    ) -> Result<MessageList>;

    /// Fetch one message with decoded bodies
    async fn get_message(&self, token: &TokenSnapshot, id: &str) -> Result<MessageFetch>;
}

/// Build a Gmail search query for a subscription's senders since a point
/// in time
///
/// Produces `from:(a OR b) after:<epoch-seconds>`. Either clause holds up
/// on its own: no senders yields just the `after:` clause, no cutoff just
/// the senders clause.
pub fn build_query(senders: &[String], after: Option<DateTime<Utc>>) -> String {
    let mut parts = Vec::with_capacity(2);
    if !senders.is_empty() {
        parts.push(format!("from:({})", senders.join(" OR ")));
    }
    if let Some(after) = after {
        parts.push(format!("after:{}", after.timestamp()));
    }
    parts.join(" ")
}

/// Default [`MailProvider`] over the Gmail REST API
///
/// The base URL comes from configuration so tests can point the client at
/// a mock server.
pub struct GmailClient {
    http: reqwest::Client,
    config: GmailConfig,
}

impl GmailClient {
    /// Create a client from configuration
    pub fn new(config: GmailConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Renew the access token if it is expired
    ///
    /// Returns the bearer token to use for the call, plus the renewal to
    /// report back when one happened. An expired token with no refresh
    /// token cannot be renewed and fails the account.
    async fn ensure_fresh(
        &self,
        token: &TokenSnapshot,
    ) -> Result<(String, Option<RefreshedToken>)> {
        if !token.is_expired() {
            return Ok((token.access_token.clone(), None));
        }

        let Some(refresh_token) = token.refresh_token.as_deref() else {
            return Err(CredentialError::RefreshFailed {
                account_id: token.account_id,
                reason: "access token expired and no refresh token is stored".to_string(),
            }
            .into());
        };

        tracing::debug!(
            account_id = token.account_id,
            "Access token expired, refreshing"
        );

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| CredentialError::RefreshFailed {
                account_id: token.account_id,
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(CredentialError::RefreshFailed {
                account_id: token.account_id,
                reason: format!("token endpoint returned {}: {}", status, detail),
            }
            .into());
        }

        let renewed: TokenRefreshResponse =
            response
                .json()
                .await
                .map_err(|e| CredentialError::RefreshFailed {
                    account_id: token.account_id,
                    reason: format!("invalid token response: {}", e),
                })?;

        let expires_at = renewed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));

        Ok((
            renewed.access_token.clone(),
            Some(RefreshedToken {
                access_token: renewed.access_token,
                expires_at,
            }),
        ))
    }
}

#[async_trait]
impl MailProvider for GmailClient {
    async fn list_message_ids(
        &self,
        token: &TokenSnapshot,
        query: &str,
        max_results: usize,
    ) -> Result<MessageList> {
        let (access_token, refreshed) = self.ensure_fresh(token).await?;

        let url = format!("{}/gmail/v1/users/me/messages", self.config.api_base_url);
        let max_results = max_results.to_string();
        let response = self
            .http
            .get(&url)
            .bearer_auth(&access_token)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::ListFailed(e.to_string()))?;

        let response = expect_success(response, "message list").await?;

        let list: ListResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ListFailed(format!("invalid list response: {}", e)))?;

        Ok(MessageList {
            ids: list.messages.into_iter().map(|m| m.id).collect(),
            refreshed,
        })
    }

    async fn get_message(&self, token: &TokenSnapshot, id: &str) -> Result<MessageFetch> {
        let (access_token, refreshed) = self.ensure_fresh(token).await?;

        let url = format!(
            "{}/gmail/v1/users/me/messages/{}",
            self.config.api_base_url, id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&access_token)
            .query(&[("format", "full")])
            .send()
            .await
            .map_err(|e| ProviderError::FetchFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        let response = expect_success(response, "message fetch").await?;

        let raw: MessageResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::FetchFailed {
                    id: id.to_string(),
                    reason: format!("invalid message response: {}", e),
                })?;

        Ok(MessageFetch {
            message: decode_message(raw),
            refreshed,
        })
    }
}

/// Map a non-success response into a provider status error
async fn expect_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        code: status.as_u16(),
        detail: format!("{}: {}", what, detail),
    }
    .into())
}

#[derive(Debug, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageResponse {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    snippet: String,
    /// Gmail sends epoch milliseconds as a string
    #[serde(default)]
    internal_date: Option<String>,
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<MessageHeader>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct MessageHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

fn decode_message(raw: MessageResponse) -> FetchedMessage {
    let mut message = FetchedMessage {
        id: raw.id,
        thread_id: Some(raw.thread_id).filter(|t| !t.is_empty()),
        snippet: Some(raw.snippet).filter(|s| !s.is_empty()),
        internal_date: raw.internal_date.and_then(|ms| ms.parse::<i64>().ok()),
        headers: HashMap::new(),
        body_text: None,
        body_html: None,
    };

    if let Some(payload) = raw.payload {
        for header in &payload.headers {
            message
                .headers
                .insert(header.name.clone(), header.value.clone());
        }
        collect_bodies(&payload, &mut message);
    }

    message
}

/// Walk the MIME tree collecting the first text/plain and text/html bodies
fn collect_bodies(part: &MessagePart, message: &mut FetchedMessage) {
    if message.body_text.is_some() && message.body_html.is_some() {
        return;
    }

    match part.mime_type.as_str() {
        "text/plain" if message.body_text.is_none() => {
            message.body_text = decode_part_data(part);
        }
        "text/html" if message.body_html.is_none() => {
            message.body_html = decode_part_data(part);
        }
        _ => {}
    }

    for child in &part.parts {
        collect_bodies(child, message);
    }
}

fn decode_part_data(part: &MessagePart) -> Option<String> {
    let data = part.body.as_ref()?.data.as_deref()?;
    let bytes = BASE64_URL.decode(data).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
