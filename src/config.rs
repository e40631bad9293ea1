//! Configuration management for labagent
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::agent::format::FormatSetting;
use crate::error::{LabAgentError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for labagent
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Model server connection settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Agent loop behaviour
    #[serde(default)]
    pub agent: AgentConfig,
    /// Tool execution settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Connection settings for the Ollama-compatible model server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the server
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Optional bearer token sent as `Authorization: Bearer <key>`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Transport timeout for completion requests (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Timeout for model metadata lookups (seconds)
    #[serde(default = "default_metadata_timeout_seconds")]
    pub metadata_timeout_seconds: u64,

    /// Number of attempts made for a completion before giving up
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base delay between attempts (milliseconds), scaled by attempt number
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Lines shown to the user while a request is being retried
    #[serde(default = "default_retry_messages")]
    pub retry_messages: Vec<String>,
}

fn default_server_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_metadata_timeout_seconds() -> u64 {
    5
}

fn default_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_retry_messages() -> Vec<String> {
    vec!["Retrying...".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
            metadata_timeout_seconds: default_metadata_timeout_seconds(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_messages: default_retry_messages(),
        }
    }
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model used for completions
    #[serde(default = "default_model")]
    pub model: String,

    /// Output protocol: auto-detected or forced
    #[serde(default)]
    pub format: FormatSetting,

    /// Hard cap on LLM calls per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Model-name substrings that mark a model as large enough for the
    /// fenced tool-block protocol
    #[serde(default = "default_large_model_patterns")]
    pub large_model_patterns: Vec<String>,

    /// Log raw model responses and tool results at info level
    #[serde(default)]
    pub verbose: bool,
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_max_iterations() -> usize {
    5
}

fn default_large_model_patterns() -> Vec<String> {
    [
        "gpt-4",
        "gpt4",
        "claude-2",
        "claude-3",
        "claude3",
        "llama3-70b",
        "llama-70b",
        "mixtral-8x7b",
        "8x22b",
        "70b",
        "72b",
        "405b",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            format: FormatSetting::default(),
            max_iterations: default_max_iterations(),
            large_model_patterns: default_large_model_patterns(),
            verbose: false,
        }
    }
}

/// Tool execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Maximum size of a tool observation (bytes)
    #[serde(default = "default_max_output")]
    pub max_output_size: usize,
}

fn default_max_output() -> usize {
    1_048_576 // 1 MB
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_output_size: default_max_output(),
        }
    }
}

/// Default location of the user configuration file
///
/// Resolves to the platform config directory, e.g.
/// `~/.config/labagent/config.yaml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "hands-on-ai", "labagent")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Explicit configuration file; when `None` the default
    ///   location is tried
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if an existing file cannot be read or parsed
    pub fn load(path: Option<&str>, cli: &crate::cli::Cli) -> Result<Self> {
        let path = path.map(PathBuf::from).or_else(default_config_path);

        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(&p)?,
            Some(p) => {
                tracing::debug!("Config file not found at {}, using defaults", p.display());
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LabAgentError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| LabAgentError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("LABAGENT_SERVER") {
            self.server.url = url;
        }

        if let Ok(api_key) = std::env::var("LABAGENT_API_KEY") {
            if !api_key.is_empty() {
                self.server.api_key = Some(api_key);
            }
        }

        if let Ok(model) = std::env::var("LABAGENT_MODEL") {
            self.agent.model = model;
        }

        if let Ok(format) = std::env::var("LABAGENT_FORMAT") {
            match format.parse() {
                Ok(setting) => self.agent.format = setting,
                Err(_) => tracing::warn!("Invalid LABAGENT_FORMAT: {}", format),
            }
        }

        if let Ok(max_iterations) = std::env::var("LABAGENT_MAX_ITERATIONS") {
            if let Ok(value) = max_iterations.parse() {
                self.agent.max_iterations = value;
            } else {
                tracing::warn!("Invalid LABAGENT_MAX_ITERATIONS: {}", max_iterations);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(server) = &cli.server {
            self.server.url = server.clone();
        }
        if let Some(model) = &cli.model {
            self.agent.model = model.clone();
        }
        if cli.verbose {
            self.agent.verbose = true;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.server.url.is_empty() {
            return Err(LabAgentError::Config("server.url cannot be empty".to_string()).into());
        }

        if !self.server.url.starts_with("http://") && !self.server.url.starts_with("https://") {
            return Err(LabAgentError::Config(format!(
                "server.url must start with http:// or https://, got: {}",
                self.server.url
            ))
            .into());
        }

        if self.server.retries == 0 {
            return Err(
                LabAgentError::Config("server.retries must be at least 1".to_string()).into(),
            );
        }

        if self.agent.model.trim().is_empty() {
            return Err(LabAgentError::Config("agent.model cannot be empty".to_string()).into());
        }

        if self.agent.max_iterations == 0 {
            return Err(LabAgentError::Config(
                "agent.max_iterations must be greater than 0".to_string(),
            )
            .into());
        }

        if self.agent.max_iterations > 100 {
            return Err(LabAgentError::Config(
                "agent.max_iterations must be less than or equal to 100".to_string(),
            )
            .into());
        }

        if self.tools.max_output_size == 0 {
            return Err(LabAgentError::Config(
                "tools.max_output_size must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
