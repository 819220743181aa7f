//! Client for the external image-synthesis provider.
//!
//! The provider speaks the OpenAI-compatible `images/generations` API and answers with a
//! URL to the rendered image. [`ImageGenerator`] is the seam the rest of the service
//! depends on so tests can swap the network call out.

use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::ProviderConfig;

/// Seed value asking the provider to pick a random seed.
pub const RANDOM_SEED: i64 = -1;

/// Generation parameters. Absent fields in incoming JSON take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationOptions {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub negative_prompt: String,
    pub seed: i64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            steps: 30,
            negative_prompt: String::new(),
            seed: RANDOM_SEED,
        }
    }
}

impl GenerationOptions {
    /// Returns the name of the first option that is not a positive integer.
    pub fn first_invalid(&self) -> Option<&'static str> {
        if self.width == 0 {
            Some("width")
        } else if self.height == 0 {
            Some("height")
        } else if self.steps == 0 {
            Some("steps")
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("provider request timed out")]
    Timeout,

    #[error("provider request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("provider response contained no image")]
    NoImage,
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout
        } else if e.is_decode() {
            GenerationError::Decode(e)
        } else {
            GenerationError::Transport(e)
        }
    }
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Renders `prompt` and returns a URL where the provider serves the result.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    response_format: &'static str,
    response_extension: &'static str,
    width: u32,
    height: u32,
    num_inference_steps: u32,
    negative_prompt: &'a str,
    seed: i64,
    loras: Option<()>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    url: Option<String>,
}

impl ImagesResponse {
    fn into_url(self) -> Option<String> {
        self.data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .filter(|u| !u.is_empty())
    }
}

/// HTTP implementation of [`ImageGenerator`].
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ProviderClient {
    pub fn new(cfg: &ProviderConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build provider http client")?;
        Ok(Self {
            http,
            endpoint: images_endpoint(&cfg.base_url),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }
}

fn images_endpoint(base_url: &str) -> String {
    format!("{}/images/generations", base_url.trim_end_matches('/'))
}

#[async_trait]
impl ImageGenerator for ProviderClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let body = ImagesRequest {
            model: &self.model,
            prompt,
            response_format: "url",
            response_extension: "png",
            width: options.width,
            height: options.height,
            num_inference_steps: options.steps,
            negative_prompt: &options.negative_prompt,
            seed: options.seed,
            loras: None,
        };
        debug!(model = %self.model, ?options, "requesting image from provider");

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "provider rejected generation");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ImagesResponse = resp.json().await?;
        let url = parsed.into_url().ok_or(GenerationError::NoImage)?;
        info!("provider returned image url");
        Ok(url)
    }
}
