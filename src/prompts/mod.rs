//! System prompts for the two output formats
//!
//! This module renders the registered tools into a list and wraps it in the
//! format-specific instructions the model receives as its system prompt.

pub mod json_prompt;
pub mod react_prompt;

use crate::agent::format::FormatChoice;
use crate::tools::ToolSummary;

/// Renders tools as `- name: description` lines
///
/// # Examples
///
/// ```
/// use labagent::prompts::format_tool_list;
/// use labagent::tools::ToolSummary;
///
/// let tools = vec![ToolSummary {
///     name: "calculator".to_string(),
///     description: "Does maths".to_string(),
/// }];
/// assert_eq!(format_tool_list(&tools), "- calculator: Does maths");
/// assert_eq!(format_tool_list(&[]), "No tools are available.");
/// ```
pub fn format_tool_list(tools: &[ToolSummary]) -> String {
    if tools.is_empty() {
        return "No tools are available.".to_string();
    }
    tools
        .iter()
        .map(|tool| format!("- {}: {}", tool.name, tool.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the system prompt for a format
///
/// # Arguments
///
/// * `format` - Active output format
/// * `tools` - Registered tools, in registration order
pub fn build_system_prompt(format: FormatChoice, tools: &[ToolSummary]) -> String {
    let tool_list = format_tool_list(tools);
    match format {
        FormatChoice::React => react_prompt::generate_react_prompt(&tool_list),
        FormatChoice::Json => json_prompt::generate_json_prompt(&tool_list),
    }
}
