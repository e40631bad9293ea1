//! Ollama provider implementation for labagent
//!
//! This module implements the Provider trait for Ollama-compatible servers:
//! single-shot completions through `/api/generate` with bounded retries, and
//! model metadata through `/api/show`.

use crate::config::ServerConfig;
use crate::error::{LabAgentError, Result};
use crate::providers::{GenerateRequest, ModelMetadata, Provider};

use async_trait::async_trait;
use colored::Colorize;
use rand::seq::IndexedRandom;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama API provider
///
/// # Examples
///
/// ```no_run
/// use labagent::config::ServerConfig;
/// use labagent::providers::{GenerateRequest, OllamaProvider, Provider};
///
/// # async fn example() -> labagent::error::Result<()> {
/// let provider = OllamaProvider::new(ServerConfig::default())?;
/// let request = GenerateRequest::new("llama3.2:latest", "Hello!", "You are helpful.");
/// let text = provider.generate(&request).await?;
/// # Ok(())
/// # }
/// ```
pub struct OllamaProvider {
    client: Client,
    config: ServerConfig,
}

/// Request body for `/api/generate`
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

/// Response body from `/api/generate`
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
}

/// Request body for `/api/show`
#[derive(Debug, Serialize)]
struct OllamaShowRequest<'a> {
    name: &'a str,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration (URL, API key, timeouts, retries)
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use labagent::config::ServerConfig;
    /// use labagent::providers::OllamaProvider;
    ///
    /// let provider = OllamaProvider::new(ServerConfig::default());
    /// assert!(provider.is_ok());
    /// ```
    pub fn new(config: ServerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("labagent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LabAgentError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!("Initialized Ollama provider: url={}", config.url);

        Ok(Self { client, config })
    }

    /// Get the configured server URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => builder.bearer_auth(key),
            _ => builder,
        }
    }

    fn retry_message(&self) -> &str {
        self.config
            .retry_messages
            .choose(&mut rand::rng())
            .map(String::as_str)
            .unwrap_or("Retrying...")
    }

    async fn generate_once(&self, request: &GenerateRequest) -> Result<String> {
        let body = OllamaGenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            system: &request.system,
            stream: false,
        };

        let response = self
            .authorize(self.client.post(self.endpoint("api/generate")))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                LabAgentError::Provider(format!("Failed to connect to Ollama server: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LabAgentError::Provider(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let parsed: OllamaGenerateResponse = response.json().await.map_err(|e| {
            LabAgentError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;

        Ok(parsed.response)
    }

    async fn show_once(&self, name: &str) -> Result<ModelMetadata> {
        let response = self
            .authorize(self.client.post(self.endpoint("api/show")))
            .timeout(Duration::from_secs(self.config.metadata_timeout_seconds))
            .json(&OllamaShowRequest { name })
            .send()
            .await
            .map_err(|e| {
                tracing::debug!("Failed to fetch model details for {}: {}", name, e);
                LabAgentError::Provider(format!("Failed to fetch model details: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Ollama show for {} returned {}", name, status);
            return Err(LabAgentError::Provider(format!("Model not found: {}", name)).into());
        }

        response.json::<ModelMetadata>().await.map_err(|e| {
            LabAgentError::Provider(format!("Failed to parse model details: {}", e)).into()
        })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        if request.prompt.trim().is_empty() {
            return Err(LabAgentError::Provider("Prompt must not be empty".to_string()).into());
        }

        tracing::debug!(
            "Sending completion request: model={}, prompt_len={}",
            request.model,
            request.prompt.len()
        );

        let attempts = self.config.retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.generate_once(request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!("Completion attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                eprintln!("{}", self.retry_message().yellow());
                let delay = self.config.retry_delay_ms * u64::from(attempt);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        tracing::error!("Giving up after {} attempt(s): {}", attempts, last_error);
        Err(LabAgentError::Transport {
            attempts,
            message: last_error,
        }
        .into())
    }

    async fn show_model(&self, name: &str) -> Result<ModelMetadata> {
        self.show_once(name).await
    }
}
