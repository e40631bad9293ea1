//! labagent - tool-using teaching agent library
//!
//! This library drives a local Ollama-compatible LLM through a bounded
//! tool-calling loop. Model replies are parsed in one of two textual
//! protocols (fenced `tool` blocks or strict JSON), chosen per model from
//! its reported capabilities.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `agent`: Response formats and parser, format detection, conversation
//!   state and the agent loop
//! - `providers`: Model server abstraction and the Ollama implementation
//! - `tools`: Tool contract, ordered registry and built-in demo tools
//! - `prompts`: Format-specific system prompts
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`, `commands`: Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use labagent::{run_agent, Config, ToolRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let mut tools = ToolRegistry::new();
//!     tools.register_fn("echo", "Repeat the input", |input| Ok(input.as_text()));
//!
//!     let answer = run_agent("Echo 'hello' back to me", &config, Arc::new(tools)).await;
//!     println!("{}", answer);
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod prompts;
pub mod providers;
pub mod tools;

// Re-export commonly used types
pub use agent::{run_agent, Agent, AgentRun, FormatChoice, FormatSetting, ParsedIntent};
pub use config::Config;
pub use error::{LabAgentError, Result};
pub use tools::{ToolError, ToolInput, ToolRegistry};
