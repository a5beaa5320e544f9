use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::agent::classifier::LlmClient;

/// Minimal config for an Ollama-style `POST /api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Full endpoint URL, e.g. `http://127.0.0.1:11435/api/generate`.
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Sends a prompt to an Ollama-style generate endpoint and returns the raw response text.
pub async fn query_ollama_generate(
    client: &Client,
    prompt: &str,
    cfg: &OllamaConfig,
) -> anyhow::Result<String> {
    let request = OllamaRequest {
        model: &cfg.model,
        prompt,
        stream: false,
    };

    let res = client
        .post(&cfg.endpoint)
        .json(&request)
        .send()
        .await
        .context("ollama request failed")?
        .error_for_status()
        .context("ollama non-2xx response")?
        .json::<OllamaResponse>()
        .await
        .context("ollama response decode failed")?;

    Ok(res.response)
}

/// Reusable HTTP client bound to one endpoint and model.
pub struct OllamaClient {
    client: Client,
    cfg: OllamaConfig,
}

impl OllamaClient {
    pub fn new(cfg: OllamaConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("build llm http client")?;
        Ok(Self { client, cfg })
    }
}

impl LlmClient for OllamaClient {
    fn complete<'a>(
        &'a self,
        prompt: String,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move { query_ollama_generate(&self.client, &prompt, &self.cfg).await })
    }
}
