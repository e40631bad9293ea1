//! Error types for labagent
//!
//! This module defines the error taxonomy used throughout the crate,
//! using `thiserror` for ergonomic error handling.
//!
//! Most failures an agent run meets are *not* errors: unparseable model
//! output and failing tools are turned into text and fed back to the model.
//! The variants here cover what is left: bad configuration, an unreachable
//! server after all retries, and defects inside tool handlers.

use thiserror::Error;

/// Main error type for labagent operations
#[derive(Error, Debug)]
pub enum LabAgentError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (bad responses, unknown models, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// The completion endpoint stayed unreachable after every retry
    #[error("Transport error after {attempts} attempt(s): {message}")]
    Transport {
        /// Number of attempts made before giving up
        attempts: u32,
        /// Last failure reported by the HTTP layer
        message: String,
    },

    /// A tool handler reported a programming error rather than an
    /// ordinary failure; the agent run is aborted
    #[error("Tool '{tool}' failed with a defect: {message}")]
    ToolDefect {
        /// Name of the tool that failed
        tool: String,
        /// Defect description reported by the handler
        message: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for labagent operations
///
/// Uses `anyhow::Error` so callers get context chains while the concrete
/// `LabAgentError` stays available through `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;
