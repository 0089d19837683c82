//! Digest composition.
//!
//! Pure text assembly: turns the extracted articles of one run into the
//! single narration document handed to the synthesizer. No I/O happens here,
//! so composition cannot fail; it returns an empty string when no email
//! produced readable content, and the pipeline treats that as its own error.

use crate::types::{ExtractedArticle, ExtractedEmail};
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// Separator between articles of the same email
const ARTICLE_SEPARATOR: &str = "\n\n---\n\n";

/// Separator between emails
const EMAIL_SEPARATOR: &str = "\n\n========\n\n";

/// Assemble the narration document for one digest run.
///
/// Emails appear in input order, each rendered as a short header block
/// (`From:` / `Subject:` / `Date:`, whichever headers the message carried)
/// followed by its articles. An email whose articles are all empty is
/// omitted entirely, header included.
pub fn compose_digest(emails: &[ExtractedEmail]) -> String {
    let blocks: Vec<String> = emails.iter().filter_map(render_email).collect();
    collapse_blank_runs(blocks.join(EMAIL_SEPARATOR).trim())
}

fn render_email(email: &ExtractedEmail) -> Option<String> {
    let articles: Vec<String> = email.articles.iter().filter_map(render_article).collect();
    let body = articles.join(ARTICLE_SEPARATOR);
    if body.trim().is_empty() {
        return None;
    }

    let mut header = Vec::new();
    if let Some(from) = email.from.as_deref() {
        header.push(format!("From: {}", from));
    }
    if let Some(subject) = email.subject.as_deref() {
        header.push(format!("Subject: {}", subject));
    }
    if let Some(date) = email.date.as_deref() {
        header.push(format!("Date: {}", date));
    }

    if header.is_empty() {
        Some(body)
    } else {
        Some(format!("{}\n\n{}", header.join("\n"), body))
    }
}

/// Render one article, preferring the full text fetched by the extraction
/// service over the snippet that appeared in the email body.
fn render_article(article: &ExtractedArticle) -> Option<String> {
    let (title, body) = match article.content.as_deref() {
        Some(content) if !content.trim().is_empty() => {
            (article.content_title.as_deref(), content)
        }
        _ if !article.text.trim().is_empty() => (article.title.as_deref(), article.text.as_str()),
        _ => return None,
    };

    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => Some(format!("{}\n\n{}", title, body.trim())),
        None => Some(body.trim().to_string()),
    }
}

fn collapse_blank_runs(text: &str) -> String {
    match blank_run_pattern() {
        Some(re) => re.replace_all(text, "\n\n").into_owned(),
        None => text.to_string(),
    }
}

fn blank_run_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"\n{3,}")
                .map_err(|e| warn!("Invalid blank-run pattern: {}", e))
                .ok()
        })
        .as_ref()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn email(subject: &str, articles: Vec<ExtractedArticle>) -> ExtractedEmail {
        ExtractedEmail {
            subject: Some(subject.to_string()),
            from: Some("news@example.com".to_string()),
            date: Some("Mon, 5 Feb 2024 09:00:00 +0000".to_string()),
            articles,
        }
    }

    fn snippet_article(text: &str) -> ExtractedArticle {
        ExtractedArticle {
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn prefers_fetched_content_over_snippet() {
        let digest = compose_digest(&[email(
            "Issue 1",
            vec![ExtractedArticle {
                text: "short teaser".into(),
                title: Some("Teaser Title".into()),
                content: Some("the full fetched article body".into()),
                content_title: Some("Fetched Title".into()),
                ..Default::default()
            }],
        )]);

        assert!(digest.contains("Fetched Title"));
        assert!(digest.contains("the full fetched article body"));
        assert!(!digest.contains("short teaser"));
        assert!(!digest.contains("Teaser Title"));
    }

    #[test]
    fn falls_back_to_snippet_when_content_is_blank() {
        let digest = compose_digest(&[email(
            "Issue 2",
            vec![ExtractedArticle {
                text: "snippet body".into(),
                title: Some("Snippet Title".into()),
                content: Some("   ".into()),
                ..Default::default()
            }],
        )]);

        assert!(digest.contains("Snippet Title"));
        assert!(digest.contains("snippet body"));
    }

    #[test]
    fn article_with_no_readable_text_contributes_nothing() {
        let digest = compose_digest(&[email(
            "Issue 3",
            vec![
                ExtractedArticle {
                    text: "  ".into(),
                    title: Some("Ghost".into()),
                    ..Default::default()
                },
                snippet_article("the only real article"),
            ],
        )]);

        assert!(digest.contains("the only real article"));
        assert!(!digest.contains("Ghost"));
        assert!(!digest.contains(ARTICLE_SEPARATOR));
    }

    #[test]
    fn email_with_no_readable_articles_is_omitted_entirely() {
        let digest = compose_digest(&[
            email("Empty Issue", vec![snippet_article("   ")]),
            email("Real Issue", vec![snippet_article("something to read")]),
        ]);

        assert!(!digest.contains("Empty Issue"));
        assert!(digest.contains("Real Issue"));
        assert!(!digest.contains(EMAIL_SEPARATOR));
    }

    #[test]
    fn all_empty_emails_compose_to_empty_string() {
        let digest = compose_digest(&[email("Empty", vec![snippet_article("")])]);
        assert!(digest.is_empty());

        assert!(compose_digest(&[]).is_empty());
    }

    #[test]
    fn header_block_renders_present_headers_in_order() {
        let digest = compose_digest(&[email("Issue 4", vec![snippet_article("body")])]);

        let from = digest.find("From: news@example.com").unwrap();
        let subject = digest.find("Subject: Issue 4").unwrap();
        let date = digest.find("Date: Mon, 5 Feb 2024").unwrap();
        assert!(from < subject && subject < date);
    }

    #[test]
    fn missing_headers_are_skipped() {
        let digest = compose_digest(&[ExtractedEmail {
            subject: Some("Only Subject".into()),
            from: None,
            date: None,
            articles: vec![snippet_article("body")],
        }]);

        assert!(digest.starts_with("Subject: Only Subject"));
        assert!(!digest.contains("From:"));
        assert!(!digest.contains("Date:"));
    }

    #[test]
    fn articles_and_emails_use_distinct_separators() {
        let digest = compose_digest(&[
            email(
                "Two Articles",
                vec![snippet_article("first"), snippet_article("second")],
            ),
            email("One Article", vec![snippet_article("third")]),
        ]);

        assert_eq!(digest.matches(ARTICLE_SEPARATOR).count(), 1);
        assert_eq!(digest.matches(EMAIL_SEPARATOR).count(), 1);

        let first = digest.find("first").unwrap();
        let second = digest.find("second").unwrap();
        let third = digest.find("third").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn runs_of_blank_lines_collapse_to_one() {
        let digest = compose_digest(&[email(
            "Gappy",
            vec![snippet_article("para one\n\n\n\n\npara two")],
        )]);

        assert!(digest.contains("para one\n\npara two"));
        assert!(!digest.contains("\n\n\n"));
    }
}
