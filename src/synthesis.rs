//! Speech-synthesis boundary and HTTP client.
//!
//! The composed digest goes to a synthesis service that scripts it into a
//! podcast episode and renders the audio. This is the slowest collaborator
//! in the pipeline, so it gets the longest timeout.

use crate::config::SynthesisConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the episode is voiced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodcastFormat {
    /// Two speakers trading segments
    Interview,
    /// Single narrator
    Narration,
}

/// Voice and format choices sent with every synthesis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisOptions {
    /// Episode format (default: interview)
    #[serde(default = "default_format")]
    pub format: PodcastFormat,
    /// Role-to-voice assignments (default: host "alloy", guest "echo")
    #[serde(default = "default_voices")]
    pub voices: HashMap<String, String>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            format: default_format(),
            voices: default_voices(),
        }
    }
}

fn default_format() -> PodcastFormat {
    PodcastFormat::Interview
}

fn default_voices() -> HashMap<String, String> {
    HashMap::from([
        ("host".to_string(), "alloy".to_string()),
        ("guest".to_string(), "echo".to_string()),
    ])
}

/// Outcome of a synthesis call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SynthesisResult {
    /// Narration script the service generated
    #[serde(default)]
    pub script: Option<String>,
    /// Where the rendered audio was stored
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// Boundary to the speech-synthesis service
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Turn a composed digest into a podcast episode
    async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<SynthesisResult>;
}

/// Default [`SpeechSynthesizer`] over the synthesis service's REST API
pub struct HttpSynthesizer {
    http: reqwest::Client,
    config: SynthesisConfig,
}

impl HttpSynthesizer {
    /// Create a client from configuration
    pub fn new(config: SynthesisConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    format: PodcastFormat,
    voices: &'a HashMap<String, String>,
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<SynthesisResult> {
        let url = format!("{}/synthesize", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .json(&SynthesizeRequest {
                text,
                format: options.format,
                voices: &options.voices,
            })
            .send()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "synthesizer returned status {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let result: SynthesisResult = response
            .json()
            .await
            .map_err(|e| Error::Synthesis(format!("invalid synthesizer response: {}", e)))?;

        Ok(result)
    }
}
