// Embedding providers
// The configured model type is resolved once, at store construction, into
// a capability object; everything downstream only sees the trait.

pub mod ollama;
pub mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use crate::Result;
use crate::config::ModelType;

/// A resolved embedding capability: maps a batch of chunk texts to
/// fixed-dimension vectors, one per input, in input order.
pub trait EmbeddingProvider {
    /// Dimension of every vector this provider produces.
    fn dimension(&self) -> usize;

    /// Embed one batch of texts.
    ///
    /// A failure here is surfaced to the caller untouched; providers do not
    /// retry internally, so the store can report exact batch progress.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Resolve the configured model type into a concrete provider.
pub fn resolve_provider(model_type: ModelType) -> Result<Box<dyn EmbeddingProvider>> {
    match model_type {
        ModelType::OpenAi => Ok(Box::new(OpenAiClient::from_env()?)),
        ModelType::Ollama => Ok(Box::new(OllamaClient::from_env()?)),
    }
}
