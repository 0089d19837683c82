//! Live Gmail API tests.
//!
//! Disabled by default; run with `cargo test --features live-tests` and a
//! real OAuth token in the environment:
//!
//! ```text
//! GMAIL_ACCESS_TOKEN=ya29...   # required
//! GMAIL_QUERY="from:someone"   # optional, defaults to newer_than:7d
//! ```

#![cfg(feature = "live-tests")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use lettercast::config::GmailConfig;
use lettercast::credentials::TokenSnapshot;
use lettercast::gmail::{GmailClient, MailProvider};

fn live_token() -> Option<TokenSnapshot> {
    let access_token = std::env::var("GMAIL_ACCESS_TOKEN").ok()?;
    Some(TokenSnapshot {
        account_id: 0,
        access_token,
        refresh_token: None,
        expires_at: None,
    })
}

#[tokio::test]
async fn list_and_fetch_recent_messages() {
    let Some(token) = live_token() else {
        eprintln!("GMAIL_ACCESS_TOKEN not set, skipping live test");
        return;
    };
    let query = std::env::var("GMAIL_QUERY").unwrap_or_else(|_| "newer_than:7d".to_string());

    let client = GmailClient::new(GmailConfig::default()).unwrap();
    let list = client.list_message_ids(&token, &query, 5).await.unwrap();
    println!("listed {} messages for {:?}", list.ids.len(), query);

    for id in &list.ids {
        let fetch = client.get_message(&token, id).await.unwrap();
        let message = fetch.message;
        assert_eq!(&message.id, id);
        assert!(
            message.body_text.is_some() || message.body_html.is_some(),
            "message {} decoded without any body",
            id
        );
        println!(
            "  {} subject={:?} text={} html={}",
            message.id,
            message.header("Subject"),
            message.body_text.is_some(),
            message.body_html.is_some()
        );
    }
}
