//! Tools module for labagent
//!
//! This module contains the tool input/output contract, the ordered tool
//! registry the agent dispatches through, and the built-in demo tools.

pub mod builtin;

use crate::error::{LabAgentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Default cap on a single observation, in bytes
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 1_048_576;

/// Marker appended to observations that were cut short
pub const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// The single structured value handed to a tool handler
///
/// Models send either a bare string (`"input": "Chicago"`) or a keyword
/// object (`"input": {"location": "Chicago"}`). Any other JSON value is
/// carried as its textual rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    /// Plain text argument
    Text(String),
    /// Named arguments
    Object(Map<String, Value>),
}

impl ToolInput {
    /// Text view of the input; objects are rendered as compact JSON
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Object(map) => Value::Object(map.clone()).to_string(),
        }
    }

    /// Look up a string-valued named argument
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Object(map) => map.get(key).and_then(Value::as_str),
        }
    }

    /// Look up a named argument of any type
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Text(_) => None,
            Self::Object(map) => map.get(key),
        }
    }

    /// Convert back into a JSON value
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Object(map) => Value::Object(map.clone()),
        }
    }
}

impl From<Value> for ToolInput {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            Value::Object(map) => Self::Object(map),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<&str> for ToolInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ToolInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for ToolInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

/// Failure reported by a tool handler
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// Expected failure (bad input, unknown location, ...). Reported back
    /// to the model as an observation.
    #[error("{0}")]
    Failed(String),

    /// Programming error inside the handler. Aborts the agent run.
    #[error("{0}")]
    Defect(String),
}

/// Tool executor trait for implementing tool execution logic
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use labagent::tools::{ToolError, ToolExecutor, ToolInput};
///
/// struct Shout;
///
/// #[async_trait]
/// impl ToolExecutor for Shout {
///     async fn execute(&self, input: ToolInput) -> Result<String, ToolError> {
///         Ok(input.as_text().to_uppercase())
///     }
/// }
/// ```
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Named parameters that must be present in an object input
    ///
    /// The registry checks these before invoking [`ToolExecutor::execute`].
    fn required_parameters(&self) -> Vec<String> {
        Vec::new()
    }

    /// Executes the tool with the given input
    ///
    /// # Errors
    ///
    /// Returns `ToolError::Failed` for ordinary failures and
    /// `ToolError::Defect` for bugs that should stop the agent
    async fn execute(&self, input: ToolInput) -> std::result::Result<String, ToolError>;
}

type Handler = dyn Fn(ToolInput) -> std::result::Result<String, ToolError> + Send + Sync;

/// Adapter that turns a plain closure into a [`ToolExecutor`]
pub struct FnTool {
    handler: Box<Handler>,
    required: Vec<String>,
}

impl FnTool {
    /// Wrap a synchronous handler
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(ToolInput) -> std::result::Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            required: Vec::new(),
        }
    }

    /// Declare parameters that must be present in an object input
    pub fn with_required(mut self, params: &[&str]) -> Self {
        self.required = params.iter().map(|p| p.to_string()).collect();
        self
    }
}

#[async_trait]
impl ToolExecutor for FnTool {
    fn required_parameters(&self) -> Vec<String> {
        self.required.clone()
    }

    async fn execute(&self, input: ToolInput) -> std::result::Result<String, ToolError> {
        (self.handler)(input)
    }
}

/// Name and description of a registered tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSummary {
    /// Unique tool name
    pub name: String,
    /// Human-readable description shown to the model and to users
    pub description: String,
}

/// A registered tool
#[derive(Clone)]
pub struct Tool {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    executor: Arc<dyn ToolExecutor>,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Tool registry for managing available tools
///
/// Tools are kept in registration order. Registering an existing name
/// replaces its description and handler but keeps its position.
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
    max_output_size: usize,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self::with_max_output_size(DEFAULT_MAX_OUTPUT_SIZE)
    }

    /// Create an empty registry with a custom observation size cap
    ///
    /// # Arguments
    ///
    /// * `max_output_size` - Maximum observation size in bytes
    pub fn with_max_output_size(max_output_size: usize) -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            max_output_size,
        }
    }

    /// Register a tool executor in the registry
    ///
    /// # Arguments
    ///
    /// * `name` - Tool name
    /// * `description` - Description advertised to the model
    /// * `executor` - Tool executor implementation
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        executor: Arc<dyn ToolExecutor>,
    ) {
        let tool = Tool {
            name: name.into(),
            description: description.into(),
            executor,
        };

        match self.index.get(&tool.name) {
            Some(&position) => {
                debug!("Replacing tool '{}'", tool.name);
                self.tools[position] = tool;
            }
            None => {
                debug!("Registering tool '{}'", tool.name);
                self.index.insert(tool.name.clone(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Register a closure as a tool
    ///
    /// # Examples
    ///
    /// ```
    /// use labagent::tools::ToolRegistry;
    ///
    /// let mut registry = ToolRegistry::new();
    /// registry.register_fn("echo", "Repeat the input", |input| Ok(input.as_text()));
    /// assert_eq!(registry.len(), 1);
    /// ```
    pub fn register_fn<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) where
        F: Fn(ToolInput) -> std::result::Result<String, ToolError> + Send + Sync + 'static,
    {
        self.register(name, description, Arc::new(FnTool::new(handler)));
    }

    /// Get a registered tool by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// All tools as `{name, description}` pairs, in registration order
    pub fn list(&self) -> Vec<ToolSummary> {
        self.tools
            .iter()
            .map(|tool| ToolSummary {
                name: tool.name.clone(),
                description: tool.description.clone(),
            })
            .collect()
    }

    /// Registered tool names, in registration order
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name.clone()).collect()
    }

    /// Remove every tool
    pub fn clear(&mut self) {
        self.tools.clear();
        self.index.clear();
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool and turn the outcome into an observation
    ///
    /// Unknown tools, missing parameters and `ToolError::Failed` all come
    /// back as `Ok` with an error text the model can react to.
    ///
    /// # Arguments
    ///
    /// * `name` - Tool name requested by the model
    /// * `input` - Input value requested by the model
    ///
    /// # Errors
    ///
    /// Returns `LabAgentError::ToolDefect` when the handler reports
    /// `ToolError::Defect`
    pub async fn dispatch(&self, name: &str, input: ToolInput) -> Result<String> {
        let Some(tool) = self.get(name) else {
            warn!("Model requested unknown tool '{}'", name);
            let available = if self.is_empty() {
                "none".to_string()
            } else {
                self.names().join(", ")
            };
            return Ok(format!(
                "Error: Tool '{}' not found. Available tools: {}",
                name, available
            ));
        };

        if let Some(missing) = missing_parameter(&tool.executor.required_parameters(), &input) {
            warn!("Tool '{}' called without parameter '{}'", name, missing);
            return Ok(format!(
                "Error executing tool '{}': missing required parameter '{}'",
                name, missing
            ));
        }

        debug!("Executing tool '{}' with input: {}", name, input);
        match tool.executor.execute(input).await {
            Ok(output) => Ok(truncate_output(output, self.max_output_size)),
            Err(ToolError::Failed(message)) => {
                warn!("Tool '{}' failed: {}", name, message);
                Ok(format!("Error executing tool '{}': {}", name, message))
            }
            Err(ToolError::Defect(message)) => {
                error!("Tool '{}' reported a defect: {}", name, message);
                Err(LabAgentError::ToolDefect {
                    tool: name.to_string(),
                    message,
                }
                .into())
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn missing_parameter<'a>(required: &'a [String], input: &ToolInput) -> Option<&'a str> {
    required
        .iter()
        .find(|param| input.get(param).is_none())
        .map(String::as_str)
}

/// Truncate output to at most `max_size` bytes plus a marker
///
/// Cuts on a character boundary.
pub fn truncate_output(mut output: String, max_size: usize) -> String {
    if output.len() <= max_size {
        return output;
    }
    let mut cut = max_size;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }
    output.truncate(cut);
    output.push_str(TRUNCATION_MARKER);
    output
}
