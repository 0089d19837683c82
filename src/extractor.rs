//! Content-extraction boundary and HTTP client.
//!
//! Newsletter HTML goes to an extraction service that splits it into
//! articles and, where it can, follows the "read more" links to pull the
//! full article text. Extraction is best-effort: callers fall back to the
//! plain-text body when it fails, so an outage here degrades output
//! instead of failing runs.

use crate::config::ExtractorConfig;
use crate::types::ExtractedArticle;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Boundary to the content-extraction service
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extract structured articles from a newsletter email body
    async fn extract(&self, html: &str, text: Option<&str>) -> Result<Vec<ExtractedArticle>>;
}

/// Default [`ContentExtractor`] over the extraction service's REST API
pub struct HttpExtractor {
    http: reqwest::Client,
    config: ExtractorConfig,
}

impl HttpExtractor {
    /// Create a client from configuration
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    articles: Vec<ExtractedArticle>,
}

#[async_trait]
impl ContentExtractor for HttpExtractor {
    async fn extract(&self, html: &str, text: Option<&str>) -> Result<Vec<ExtractedArticle>> {
        let url = format!("{}/extract", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .json(&ExtractRequest { html, text })
            .send()
            .await
            .map_err(|e| Error::Extraction(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Extraction(format!(
                "extractor returned status {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let extraction: ExtractResponse = response
            .json()
            .await
            .map_err(|e| Error::Extraction(format!("invalid extractor response: {}", e)))?;

        Ok(extraction.articles)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base: &str) -> ExtractorConfig {
        ExtractorConfig {
            base_url: base.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn extract_maps_articles_with_fetched_content() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/extract"))
            .and(body_partial_json(serde_json::json!({
                "html": "<html>issue</html>",
                "text": "issue text"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "articles": [
                    {
                        "text": "Snippet one",
                        "link": "https://example.com/one",
                        "link_text": "Read more",
                        "title": "One",
                        "content": "Full article text",
                        "content_title": "One, in full",
                        "fetch_method": "httpx"
                    },
                    {
                        "text": "Snippet two"
                    }
                ],
                "all_links": [],
                "main_content": null
            })))
            .mount(&mock_server)
            .await;

        let extractor = HttpExtractor::new(test_config(&mock_server.uri())).unwrap();
        let articles = extractor
            .extract("<html>issue</html>", Some("issue text"))
            .await
            .unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].text, "Snippet one");
        assert_eq!(articles[0].content.as_deref(), Some("Full article text"));
        assert_eq!(articles[0].content_title.as_deref(), Some("One, in full"));
        assert_eq!(articles[1].text, "Snippet two");
        assert!(articles[1].content.is_none());
    }

    #[tokio::test]
    async fn extract_omits_absent_text_from_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/extract"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "articles": []
            })))
            .mount(&mock_server)
            .await;

        let extractor = HttpExtractor::new(test_config(&mock_server.uri())).unwrap();
        let articles = extractor.extract("<html></html>", None).await.unwrap();
        assert!(articles.is_empty());

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("text").is_none());
    }

    #[tokio::test]
    async fn extract_error_status_surfaces_as_extraction_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/extract"))
            .respond_with(ResponseTemplate::new(500).set_body_string("parser exploded"))
            .mount(&mock_server)
            .await;

        let extractor = HttpExtractor::new(test_config(&mock_server.uri())).unwrap();
        let err = extractor.extract("<html></html>", None).await.err().unwrap();

        match err {
            Error::Extraction(msg) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("parser exploded"));
            }
            other => panic!("Expected Extraction error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn extract_malformed_response_is_extraction_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/extract"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let extractor = HttpExtractor::new(test_config(&mock_server.uri())).unwrap();
        let err = extractor.extract("<html></html>", None).await.err().unwrap();

        match err {
            Error::Extraction(msg) => assert!(msg.contains("invalid extractor response")),
            other => panic!("Expected Extraction error, got {:?}", other),
        }
    }
}
