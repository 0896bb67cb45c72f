
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::EmbeddingProvider;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OPENAI_DIMENSION: usize = 1536;
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Client for the hosted embeddings API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    model: String,
    dimension: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Build a client from the environment; fails fast when the API key is
    /// missing, before any chunking or embedding work begins.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).with_context(|| {
            format!("{API_KEY_ENV} is not set; required for the hosted embedding provider")
        })?;
        Self::new(DEFAULT_OPENAI_BASE_URL, api_key)
    }

    pub fn new(base_url: &str, api_key: String) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid embeddings API base URL")?;
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            dimension: DEFAULT_OPENAI_DIMENSION,
            agent,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("requesting embeddings for {} texts", texts.len());

        let url = self
            .base_url
            .join("/v1/embeddings")
            .context("failed to build embeddings URL")?;
        let request_json = serde_json::to_string(&EmbeddingsRequest {
            model: &self.model,
            input: texts,
        })
        .context("failed to serialize embeddings request")?;
        let auth = format!("Bearer {}", self.api_key);

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Authorization", auth.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| anyhow!("embeddings request failed: {e}"))?;

        let mut response: EmbeddingsResponse = serde_json::from_str(&response_text)
            .context("failed to parse embeddings response")?;

        if response.data.len() != texts.len() {
            return Err(anyhow!(
                "provider returned {} embeddings for {} inputs",
                response.data.len(),
                texts.len()
            ));
        }

        // The API documents rows in request order, but carries an explicit
        // index field; honor it.
        response.data.sort_by_key(|row| row.index);

        debug!("received {} embeddings", response.data.len());
        Ok(response.data.into_iter().map(|row| row.embedding).collect())
    }
}

impl EmbeddingProvider for OpenAiClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed(texts)
    }
}
