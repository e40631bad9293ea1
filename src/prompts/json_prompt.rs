//! Strict JSON system prompt
//!
//! The safe default for small local models: every reply is a single JSON
//! object in a ` ```json ` fence, either a tool call or a final answer.

/// Generates the system prompt for the strict JSON protocol
///
/// # Arguments
///
/// * `tool_list` - Pre-rendered list of available tools
///
/// # Examples
///
/// ```
/// use labagent::prompts::json_prompt::generate_json_prompt;
///
/// let prompt = generate_json_prompt("- weather_data: weather");
/// assert!(prompt.contains("```json"));
/// assert!(prompt.contains("\"answer\""));
/// ```
pub fn generate_json_prompt(tool_list: &str) -> String {
    format!(
        r#"You are an agent that answers questions and may call tools to do so.

AVAILABLE TOOLS:
{tool_list}

To call a tool, reply with VALID JSON in exactly this shape:
```json
{{
  "thought": "why this tool helps",
  "tool": "tool_name",
  "input": "the value to pass to the tool"
}}
```

When no tool is needed, or once you have gathered what you need, reply with:
```json
{{
  "thought": "how you reached the answer",
  "answer": "your final answer for the user"
}}
```

RULES:
1. Every reply MUST be one valid JSON object wrapped in ```json and ``` markers.
2. Use only the exact tool names listed above.
3. Call one tool per reply and wait for its result.
4. Think step by step about what information you still need.

EXAMPLE:
User: What's the weather in Chicago and do I need an umbrella?

Reply:
```json
{{
  "thought": "I need the current weather in Chicago first",
  "tool": "weather_data",
  "input": "Chicago"
}}
```

After the result arrives:
```json
{{
  "thought": "Now I should check how likely rain is",
  "tool": "rain_chance",
  "input": "Chicago"
}}
```

Finally:
```json
{{
  "thought": "I have the weather and the rain forecast",
  "answer": "It is 12°C and windy in Chicago with a 20% chance of rain, so an umbrella is optional."
}}
```"#
    )
}
