
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::EmbeddingProvider;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text:latest";
pub const DEFAULT_OLLAMA_DIMENSION: usize = 768;

/// Environment variable overriding the local server URL.
pub const OLLAMA_URL_ENV: &str = "LOCALKB_OLLAMA_URL";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Client for a locally served embedding model.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    dimension: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var(OLLAMA_URL_ENV).unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        Self::new(&base_url)
    }

    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid Ollama base URL")?;
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            dimension: DEFAULT_OLLAMA_DIMENSION,
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

    /// Check that the local server is responsive.
    pub fn ping(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("failed to build ping URL")?;

        debug!("pinging Ollama server at {}", url);

        self.agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| anyhow!("failed to ping Ollama server: {e}"))?;

        Ok(())
    }

    // One request per batch, no internal retry: a failed call must surface
    // to the store so it can report exact batch progress.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("requesting embeddings for {} texts", texts.len());

        let url = self
            .base_url
            .join("/api/embed")
            .context("failed to build embedding URL")?;
        let request_json = serde_json::to_string(&BatchEmbedRequest {
            model: &self.model,
            input: texts,
        })
        .context("failed to serialize embedding request")?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| anyhow!("embedding request failed: {e}"))?;

        let response: BatchEmbedResponse = serde_json::from_str(&response_text)
            .context("failed to parse embedding response")?;

        if response.embeddings.len() != texts.len() {
            return Err(anyhow!(
                "provider returned {} embeddings for {} inputs",
                response.embeddings.len(),
                texts.len()
            ));
        }

        debug!("received {} embeddings", response.embeddings.len());
        Ok(response.embeddings)
    }
}

impl EmbeddingProvider for OllamaClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed(texts)
    }
}
