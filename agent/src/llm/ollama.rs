//! Ollama LLM implementation

use anyhow::{Context, Result};
use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage},
    Ollama,
};
use serde::{Deserialize, Serialize};

use super::Llm;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 11434;

/// Information about an available model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: u64,
    pub modified_at: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<ModelInfo>,
}

/// Split a server URL into host and port, falling back to localhost:11434
fn host_and_port(raw: &str) -> (String, u16) {
    match url::Url::parse(raw) {
        Ok(url) => (
            url.host_str().unwrap_or(DEFAULT_HOST).to_string(),
            url.port().unwrap_or(DEFAULT_PORT),
        ),
        Err(e) => {
            tracing::warn!(url = %raw, error = %e, "Invalid Ollama URL, using default");
            (DEFAULT_HOST.to_string(), DEFAULT_PORT)
        }
    }
}

/// List available models from Ollama
pub async fn list_models(ollama_url: &str) -> Result<Vec<ModelInfo>> {
    let (host, port) = host_and_port(ollama_url);

    let client = reqwest::Client::new();
    let api_url = format!("http://{}:{}/api/tags", host, port);

    let response: OllamaTagsResponse = client
        .get(&api_url)
        .send()
        .await
        .with_context(|| format!("Failed to reach Ollama at {}", api_url))?
        .json()
        .await?;

    Ok(response.models)
}

/// Ollama client wrapper
pub struct OllamaClient {
    client: Ollama,
    model: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(url: &str, model: &str) -> Self {
        let (host, port) = host_and_port(url);

        Self {
            client: Ollama::new(format!("http://{}", host), port),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Llm for OllamaClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatMessageRequest::new(
            self.model.clone(),
            vec![
                ChatMessage::system(system.to_string()),
                ChatMessage::user(user.to_string()),
            ],
        );

        let response = self.client.send_chat_messages(request).await?;

        Ok(response.message.content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
