//! LLM abstraction layer

mod canned;
mod ollama;

pub use canned::{
    CannedLlm, OFFLINE_CLINICAL_REVIEW, OFFLINE_DRAFT, OFFLINE_SAFETY_REVIEW, OFFLINE_SYNTHESIS,
};
pub use ollama::{list_models, ModelInfo, OllamaClient};

use anyhow::Result;
use async_trait::async_trait;

/// Trait for LLM backends
///
/// A backend turns one system prompt plus one user message into raw text.
/// It makes no promise about the shape of that text; validation happens in
/// [`crate::capability`].
#[async_trait]
pub trait Llm: Send + Sync {
    /// Send a system prompt and a user message, get the raw reply
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Get the model name
    fn model(&self) -> &str;
}
