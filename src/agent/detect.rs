//! Output format selection from model capabilities
//!
//! Larger models follow the fenced tool-block transcript reliably; small
//! local models do better with a strict JSON contract. The detector asks
//! the server about the model and falls back to name patterns when it
//! cannot.

use crate::agent::format::{FormatChoice, FormatSetting};
use crate::config::AgentConfig;
use crate::providers::{ModelMetadata, Provider};
use std::fmt;
use tracing::{debug, info};

/// Parameter count at or above which a model gets the React format
pub const LARGE_MODEL_THRESHOLD: f64 = 30e9;

/// Tag appended to model names that carry none
pub const DEFAULT_MODEL_TAG: &str = "latest";

/// Append the default tag when a model name has none
///
/// # Examples
///
/// ```
/// use labagent::agent::detect::normalize_model_name;
///
/// assert_eq!(normalize_model_name("llama3"), "llama3:latest");
/// assert_eq!(normalize_model_name("llama3:70b"), "llama3:70b");
/// ```
pub fn normalize_model_name(name: &str) -> String {
    if name.contains(':') {
        name.to_string()
    } else {
        format!("{}:{}", name, DEFAULT_MODEL_TAG)
    }
}

/// Why a format was chosen
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionReason {
    /// The caller forced a format
    Forced,
    /// Reported parameter count reached the threshold
    ParameterCount(f64),
    /// The prompt template mentions functions or tools
    ToolTemplate,
    /// The name contains a known large-model pattern
    NamePattern(String),
    /// Nothing pointed at a large model
    Default,
}

impl fmt::Display for DetectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forced => write!(f, "format forced by caller"),
            Self::ParameterCount(count) => {
                write!(f, "model reports {:.1}B parameters", count / 1e9)
            }
            Self::ToolTemplate => write!(f, "model template mentions function/tool calling"),
            Self::NamePattern(pattern) => {
                write!(f, "model name matches large-model pattern '{}'", pattern)
            }
            Self::Default => write!(f, "no large-model signal; using the JSON default"),
        }
    }
}

/// Outcome of format detection
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Chosen format
    pub format: FormatChoice,
    /// Why it was chosen
    pub reason: DetectionReason,
    /// Model name variant that answered the metadata query, if any
    pub metadata_from: Option<String>,
}

/// Chooses between the React and Json formats for a model
pub struct FormatDetector {
    patterns: Vec<String>,
    threshold: f64,
}

impl FormatDetector {
    /// Create a detector with the given large-model name patterns
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: patterns.into_iter().map(|p| p.to_lowercase()).collect(),
            threshold: LARGE_MODEL_THRESHOLD,
        }
    }

    /// Create a detector from the agent configuration
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.large_model_patterns.clone())
    }

    /// Override the parameter-count threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Resolve the format for a run
    ///
    /// A forced setting bypasses detection. Otherwise the server is asked
    /// for metadata under the original and the normalized name; any
    /// failure falls back to name patterns. Never fails.
    ///
    /// # Arguments
    ///
    /// * `provider` - Server to query for metadata
    /// * `model` - Model name as given by the caller
    /// * `setting` - Caller's format setting
    pub async fn resolve(
        &self,
        provider: &dyn Provider,
        model: &str,
        setting: FormatSetting,
    ) -> Detection {
        if let Some(format) = setting.forced() {
            debug!("Using forced format {}", format);
            return Detection {
                format,
                reason: DetectionReason::Forced,
                metadata_from: None,
            };
        }
        self.detect(provider, model).await
    }

    /// Detect the format for a model from its metadata and name
    pub async fn detect(&self, provider: &dyn Provider, model: &str) -> Detection {
        let detection = match self.fetch_metadata(provider, model).await {
            Some((variant, metadata)) => {
                let mut detection = self.decide(model, Some(&metadata));
                detection.metadata_from = Some(variant);
                detection
            }
            None => {
                debug!("No metadata for {}, using name-based detection", model);
                self.decide(model, None)
            }
        };

        info!(
            "Selected {} format for {}: {}",
            detection.format, model, detection.reason
        );
        detection
    }

    /// Detect the format from the model name alone
    pub fn detect_by_name(&self, model: &str) -> Detection {
        self.decide(model, None)
    }

    async fn fetch_metadata(
        &self,
        provider: &dyn Provider,
        model: &str,
    ) -> Option<(String, ModelMetadata)> {
        let normalized = normalize_model_name(model);
        let mut variants = vec![model.to_string()];
        if normalized != model {
            variants.push(normalized);
        }

        for variant in variants {
            match provider.show_model(&variant).await {
                Ok(metadata) => return Some((variant, metadata)),
                Err(e) => debug!("Metadata query for {} failed: {}", variant, e),
            }
        }
        None
    }

    fn decide(&self, model: &str, metadata: Option<&ModelMetadata>) -> Detection {
        let chosen = |format, reason| Detection {
            format,
            reason,
            metadata_from: None,
        };

        if let Some(metadata) = metadata {
            if let Some(count) = metadata.parameter_count() {
                if count >= self.threshold {
                    return chosen(FormatChoice::React, DetectionReason::ParameterCount(count));
                }
            }
            if metadata.template_supports_tools() {
                return chosen(FormatChoice::React, DetectionReason::ToolTemplate);
            }
        }

        let lower = model.to_lowercase();
        if let Some(pattern) = self.patterns.iter().find(|p| lower.contains(p.as_str())) {
            return chosen(
                FormatChoice::React,
                DetectionReason::NamePattern(pattern.clone()),
            );
        }

        chosen(FormatChoice::Json, DetectionReason::Default)
    }
}

impl Default for FormatDetector {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LabAgentError, Result};
    use crate::providers::GenerateRequest;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Serves metadata for a fixed set of names and records queries
    struct MetadataProvider {
        models: HashMap<String, ModelMetadata>,
        queried: Arc<Mutex<Vec<String>>>,
    }

    impl MetadataProvider {
        fn new(models: Vec<(&str, ModelMetadata)>) -> Self {
            Self {
                models: models
                    .into_iter()
                    .map(|(name, metadata)| (name.to_string(), metadata))
                    .collect(),
                queried: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn unreachable() -> Self {
            Self::new(Vec::new())
        }

        fn queried(&self) -> Vec<String> {
            self.queried.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for MetadataProvider {
        async fn generate(&self, _request: &GenerateRequest) -> Result<String> {
            Ok(String::new())
        }

        async fn show_model(&self, name: &str) -> Result<ModelMetadata> {
            self.queried.lock().unwrap().push(name.to_string());
            self.models
                .get(name)
                .cloned()
                .ok_or_else(|| LabAgentError::Provider(format!("Model not found: {}", name)).into())
        }
    }

    fn metadata(value: serde_json::Value) -> ModelMetadata {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_model_name() {
        assert_eq!(normalize_model_name("mistral"), "mistral:latest");
        assert_eq!(normalize_model_name("qwen2.5:7b"), "qwen2.5:7b");
    }

    #[tokio::test]
    async fn test_forced_format_skips_metadata() {
        let provider = MetadataProvider::unreachable();
        let detection = FormatDetector::default()
            .resolve(
                &provider,
                "llama3:70b",
                FormatSetting::Forced(FormatChoice::Json),
            )
            .await;
        assert_eq!(detection.format, FormatChoice::Json);
        assert_eq!(detection.reason, DetectionReason::Forced);
        assert!(provider.queried().is_empty());
    }

    #[tokio::test]
    async fn test_large_parameter_count_selects_react() {
        let provider = MetadataProvider::new(vec![(
            "mystery:latest",
            metadata(json!({"parameters": {"num_params": 34e9}})),
        )]);
        let detection = FormatDetector::default()
            .detect(&provider, "mystery:latest")
            .await;
        assert_eq!(detection.format, FormatChoice::React);
        assert_eq!(detection.reason, DetectionReason::ParameterCount(34e9));
        assert_eq!(detection.metadata_from.as_deref(), Some("mystery:latest"));
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let provider = MetadataProvider::new(vec![(
            "edge:latest",
            metadata(json!({"details": {"parameter_size": "30B"}})),
        )]);
        let detection = FormatDetector::default()
            .detect(&provider, "edge:latest")
            .await;
        assert_eq!(detection.format, FormatChoice::React);
    }

    #[tokio::test]
    async fn test_tool_template_selects_react() {
        let provider = MetadataProvider::new(vec![(
            "small:latest",
            metadata(json!({
                "details": {"parameter_size": "3B"},
                "template": "{{- if .Tools }}You may call a Tool{{ end }}"
            })),
        )]);
        let detection = FormatDetector::default()
            .detect(&provider, "small:latest")
            .await;
        assert_eq!(detection.format, FormatChoice::React);
        assert_eq!(detection.reason, DetectionReason::ToolTemplate);
    }

    #[tokio::test]
    async fn test_small_model_with_metadata_selects_json() {
        let provider = MetadataProvider::new(vec![(
            "llama3.2:latest",
            metadata(json!({
                "details": {"parameter_size": "3.2B"},
                "template": "{{ .System }} {{ .Prompt }}"
            })),
        )]);
        let detection = FormatDetector::default()
            .detect(&provider, "llama3.2:latest")
            .await;
        assert_eq!(detection.format, FormatChoice::Json);
        assert_eq!(detection.reason, DetectionReason::Default);
    }

    #[tokio::test]
    async fn test_normalized_name_is_tried_second() {
        let provider = MetadataProvider::new(vec![(
            "bigmodel:latest",
            metadata(json!({"model_info": {"general.parameter_count": 72e9}})),
        )]);
        let detection = FormatDetector::default().detect(&provider, "bigmodel").await;
        assert_eq!(detection.format, FormatChoice::React);
        assert_eq!(detection.metadata_from.as_deref(), Some("bigmodel:latest"));
        assert_eq!(provider.queried(), vec!["bigmodel", "bigmodel:latest"]);
    }

    #[tokio::test]
    async fn test_unreachable_large_name_falls_back_to_react() {
        let provider = MetadataProvider::unreachable();
        let detection = FormatDetector::default()
            .detect(&provider, "llama3-70b")
            .await;
        assert_eq!(detection.format, FormatChoice::React);
        assert!(matches!(detection.reason, DetectionReason::NamePattern(_)));
        assert_eq!(detection.metadata_from, None);
    }

    #[tokio::test]
    async fn test_unreachable_small_name_falls_back_to_json() {
        let provider = MetadataProvider::unreachable();
        let detection = FormatDetector::default()
            .detect(&provider, "tinyllama")
            .await;
        assert_eq!(detection.format, FormatChoice::Json);
        assert_eq!(detection.reason, DetectionReason::Default);
    }

    #[test]
    fn test_name_patterns_are_case_insensitive() {
        let detector = FormatDetector::new(vec!["GPT-4".to_string()]);
        assert_eq!(detector.detect_by_name("gpt-4o").format, FormatChoice::React);
        assert_eq!(detector.detect_by_name("Gpt-4-Turbo").format, FormatChoice::React);
        assert_eq!(detector.detect_by_name("phi3").format, FormatChoice::Json);
    }

    #[test]
    fn test_custom_threshold() {
        let detector = FormatDetector::new(Vec::new()).with_threshold(5e9);
        let detection = detector.decide(
            "x",
            Some(&metadata(json!({"details": {"parameter_size": "7B"}}))),
        );
        assert_eq!(detection.format, FormatChoice::React);
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            DetectionReason::ParameterCount(70e9).to_string(),
            "model reports 70.0B parameters"
        );
        assert!(DetectionReason::NamePattern("70b".to_string())
            .to_string()
            .contains("'70b'"));
    }
}
