//! Provider module for labagent
//!
//! This module contains the model-server abstraction and the Ollama HTTP
//! implementation used by the agent loop and the format detector.

pub mod ollama;

pub use ollama::OllamaProvider;

use crate::config::ServerConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single non-streaming completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Model to run
    pub model: String,
    /// Flattened conversation history
    pub prompt: String,
    /// Format-specific system prompt
    pub system: String,
}

impl GenerateRequest {
    /// Create a new completion request
    pub fn new(
        model: impl Into<String>,
        prompt: impl Into<String>,
        system: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: system.into(),
        }
    }
}

/// Model metadata as reported by the server's show endpoint
///
/// Every field is optional on the wire; servers differ in what they report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model parameters (an object on some servers, a text block on others)
    #[serde(default)]
    pub parameters: Value,
    /// Prompt template
    #[serde(default)]
    pub template: Option<String>,
    /// Architecture details keyed like `general.parameter_count`
    #[serde(default)]
    pub model_info: Value,
    /// Summary details such as `parameter_size: "8.0B"`
    #[serde(default)]
    pub details: Value,
}

impl ModelMetadata {
    /// Best-effort parameter count from whichever field the server filled
    ///
    /// Checks `parameters.num_params`, `parameters.parameter_count`,
    /// `model_info["general.parameter_count"]` and `details.parameter_size`
    /// in that order.
    pub fn parameter_count(&self) -> Option<f64> {
        self.parameters
            .get("num_params")
            .and_then(numeric)
            .or_else(|| self.parameters.get("parameter_count").and_then(numeric))
            .or_else(|| {
                self.model_info
                    .get("general.parameter_count")
                    .and_then(numeric)
            })
            .or_else(|| {
                self.details
                    .get("parameter_size")
                    .and_then(Value::as_str)
                    .and_then(parse_parameter_size)
            })
    }

    /// Whether the template mentions function or tool calling
    pub fn template_supports_tools(&self) -> bool {
        self.template
            .as_deref()
            .map(|t| {
                let lower = t.to_lowercase();
                lower.contains("function") || lower.contains("tool")
            })
            .unwrap_or(false)
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().or_else(|| parse_parameter_size(s)),
        _ => None,
    }
}

/// Parse a human parameter size like `"70.6B"`, `"350M"` or `"1.2T"`
///
/// # Examples
///
/// ```
/// use labagent::providers::parse_parameter_size;
///
/// assert_eq!(parse_parameter_size("8B"), Some(8e9));
/// assert_eq!(parse_parameter_size("n/a"), None);
/// ```
pub fn parse_parameter_size(size: &str) -> Option<f64> {
    let size = size.trim();
    let (number, scale) = match size.chars().last()?.to_ascii_uppercase() {
        'T' => (&size[..size.len() - 1], 1e12),
        'B' => (&size[..size.len() - 1], 1e9),
        'M' => (&size[..size.len() - 1], 1e6),
        'K' => (&size[..size.len() - 1], 1e3),
        _ => (size, 1.0),
    };
    number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n * scale)
}

/// Model server abstraction
///
/// Implementations talk to an LLM server. The agent loop only needs a
/// single-shot completion and, for format detection, model metadata.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Run one completion and return the generated text
    ///
    /// # Errors
    ///
    /// Returns an error when the server cannot produce a response after
    /// the provider's own retries
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;

    /// Fetch metadata for a model
    ///
    /// # Errors
    ///
    /// Returns an error when the server is unreachable or does not know
    /// the model
    async fn show_model(&self, name: &str) -> Result<ModelMetadata>;
}

/// Create the provider for a server configuration
///
/// # Errors
///
/// Returns error if the HTTP client cannot be initialised
pub fn create_provider(config: &ServerConfig) -> Result<Box<dyn Provider>> {
    Ok(Box::new(OllamaProvider::new(config.clone())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_parameter_size() {
        let size = parse_parameter_size("70.6B").unwrap();
        assert!((size - 70.6e9).abs() < 1.0);
        assert_eq!(parse_parameter_size("350m"), Some(350e6));
        assert_eq!(parse_parameter_size("1T"), Some(1e12));
        assert_eq!(parse_parameter_size("1200"), Some(1200.0));
        assert_eq!(parse_parameter_size(""), None);
        assert_eq!(parse_parameter_size("large"), None);
    }

    #[test]
    fn test_parameter_count_sources() {
        let from_params: ModelMetadata =
            serde_json::from_value(json!({"parameters": {"num_params": 7e9}})).unwrap();
        assert_eq!(from_params.parameter_count(), Some(7e9));

        let from_alt: ModelMetadata =
            serde_json::from_value(json!({"parameters": {"parameter_count": "40000000000"}}))
                .unwrap();
        assert_eq!(from_alt.parameter_count(), Some(40e9));

        let from_info: ModelMetadata = serde_json::from_value(
            json!({"model_info": {"general.parameter_count": 70553706496u64}}),
        )
        .unwrap();
        assert_eq!(from_info.parameter_count(), Some(70553706496.0));

        let from_details: ModelMetadata =
            serde_json::from_value(json!({"details": {"parameter_size": "8B"}})).unwrap();
        assert_eq!(from_details.parameter_count(), Some(8e9));
    }

    #[test]
    fn test_parameter_count_ignores_text_parameters() {
        let metadata: ModelMetadata = serde_json::from_value(json!({
            "parameters": "stop \"<|eot_id|>\"\ntemperature 0.7",
            "template": "{{ .Prompt }}"
        }))
        .unwrap();
        assert_eq!(metadata.parameter_count(), None);
        assert!(!metadata.template_supports_tools());
    }

    #[test]
    fn test_template_supports_tools() {
        let metadata = ModelMetadata {
            template: Some("{{ if .Tools }}Available Tools{{ end }}".to_string()),
            ..Default::default()
        };
        assert!(metadata.template_supports_tools());

        let metadata = ModelMetadata {
            template: Some("Call a FUNCTION".to_string()),
            ..Default::default()
        };
        assert!(metadata.template_supports_tools());

        assert!(!ModelMetadata::default().template_supports_tools());
    }
}
