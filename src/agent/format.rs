//! Output formats and model response parsing
//!
//! The agent speaks one of two textual protocols with the model:
//!
//! - **React**: tool calls arrive as fenced ```` ```tool ```` blocks holding
//!   `{"tool": ..., "input": ...}`. A response without any valid block is
//!   the final answer.
//! - **Json**: every response is a single JSON object, ideally fenced as
//!   ```` ```json ````, carrying either `{thought?, tool, input}` or
//!   `{thought?, answer}`.
//!
//! Small local models rarely emit clean JSON, so the Json path runs a chain
//! of repair strategies before falling back to per-field regex extraction.

use crate::tools::ToolInput;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Protocol the model is instructed to use for structured output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatChoice {
    /// Fenced `tool` blocks; plain text is the final answer
    React,
    /// A strict JSON object per response
    Json,
}

impl fmt::Display for FormatChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::React => write!(f, "react"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for FormatChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "react" => Ok(Self::React),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "Unknown format '{}'. Must be one of: json, react",
                other
            )),
        }
    }
}

/// Caller-facing format setting: detect from the model, or force one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FormatSetting {
    /// Inspect the model and choose
    #[default]
    Auto,
    /// Skip detection entirely
    Forced(FormatChoice),
}

impl FormatSetting {
    /// The forced choice, if detection is bypassed
    pub fn forced(&self) -> Option<FormatChoice> {
        match self {
            Self::Auto => None,
            Self::Forced(choice) => Some(*choice),
        }
    }
}

impl fmt::Display for FormatSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Forced(choice) => write!(f, "{}", choice),
        }
    }
}

impl FromStr for FormatSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse::<FormatChoice>()
            .map(Self::Forced)
            .map_err(|_| format!("Unknown format '{}'. Must be one of: auto, json, react", s))
    }
}

impl TryFrom<String> for FormatSetting {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FormatSetting> for String {
    fn from(value: FormatSetting) -> Self {
        value.to_string()
    }
}

/// A single tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Reasoning the model attached to the call
    pub thought: Option<String>,
    /// Registered tool name
    pub tool: String,
    /// Argument passed to the tool handler
    pub input: ToolInput,
}

impl ToolCall {
    /// Create a tool call without a thought
    pub fn new(tool: impl Into<String>, input: impl Into<ToolInput>) -> Self {
        Self {
            thought: None,
            tool: tool.into(),
            input: input.into(),
        }
    }

    /// Attach the model's reasoning
    pub fn with_thought(mut self, thought: impl Into<String>) -> Self {
        self.thought = Some(thought.into());
        self
    }

    fn to_json(&self) -> Value {
        let mut map = Map::new();
        if let Some(thought) = &self.thought {
            map.insert("thought".to_string(), Value::String(thought.clone()));
        }
        map.insert("tool".to_string(), Value::String(self.tool.clone()));
        map.insert("input".to_string(), self.input.to_value());
        Value::Object(map)
    }
}

/// What the model meant, extracted from one raw response
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedIntent {
    /// One or more tool calls, in the order they appeared (never empty)
    ToolCalls(Vec<ToolCall>),
    /// The deliverable answer for the user
    FinalAnswer {
        /// Reasoning the model attached to the answer
        thought: Option<String>,
        /// Answer text, verbatim
        answer: String,
    },
    /// Nothing usable could be extracted
    ParseFailure {
        /// The response as received
        raw_text: String,
        /// Why extraction failed
        reason: String,
    },
}

impl ParsedIntent {
    /// Shorthand for a final answer without a thought
    pub fn answer(answer: impl Into<String>) -> Self {
        Self::FinalAnswer {
            thought: None,
            answer: answer.into(),
        }
    }

    fn failure(raw_text: &str, reason: impl Into<String>) -> Self {
        Self::ParseFailure {
            raw_text: raw_text.to_string(),
            reason: reason.into(),
        }
    }

    /// Render this intent as the text a well-behaved model would emit
    ///
    /// Parsing the rendered text with the same format yields the intent
    /// back, with two lossy cases: in the Json format only the first tool
    /// call survives, since the protocol carries one object per response;
    /// in the React format a final answer is plain text, so its thought is
    /// dropped.
    pub fn render(&self, format: FormatChoice) -> String {
        match (self, format) {
            (Self::ToolCalls(calls), FormatChoice::React) => calls
                .iter()
                .map(|call| fenced("tool", &call.to_json()))
                .collect::<Vec<_>>()
                .join("\n\n"),
            (Self::ToolCalls(calls), FormatChoice::Json) => calls
                .iter()
                .map(|call| fenced("json", &call.to_json()))
                .collect::<Vec<_>>()
                .join("\n\n"),
            (Self::FinalAnswer { answer, .. }, FormatChoice::React) => answer.clone(),
            (Self::FinalAnswer { thought, answer }, FormatChoice::Json) => {
                let mut map = Map::new();
                if let Some(thought) = thought {
                    map.insert("thought".to_string(), Value::String(thought.clone()));
                }
                map.insert("answer".to_string(), Value::String(answer.clone()));
                fenced("json", &Value::Object(map))
            }
            (Self::ParseFailure { raw_text, .. }, _) => raw_text.clone(),
        }
    }
}

fn fenced(label: &str, value: &Value) -> String {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("```{}\n{}\n```", label, body)
}

/// A strategy that rewrites a malformed JSON candidate
///
/// Repairs run in registration order; each one receives the output of the
/// previous one and the parser retries after every rewrite.
pub trait JsonRepair: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Returns the rewritten candidate, or `None` when nothing applies
    fn repair(&self, candidate: &str) -> Option<String>;
}

/// Wraps bare word keys in quotes: `{tool: "x"}` -> `{"tool": "x"}`
///
/// Text inside string values is left untouched.
pub struct QuoteBareKeys {
    pattern: Regex,
}

impl QuoteBareKeys {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(
                r#""(?:[^"\\]|\\.)*"|([\{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*):"#,
            )
            .expect("Invalid regex pattern"),
        }
    }
}

impl Default for QuoteBareKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonRepair for QuoteBareKeys {
    fn name(&self) -> &'static str {
        "quote_bare_keys"
    }

    fn repair(&self, candidate: &str) -> Option<String> {
        // String literals match the first alternative and are kept as-is.
        let fixed = self
            .pattern
            .replace_all(candidate, |caps: &Captures| match caps.get(2) {
                Some(key) => format!("{}\"{}\"{}:", &caps[1], key.as_str(), &caps[3]),
                None => caps[0].to_string(),
            })
            .into_owned();
        (fixed != candidate).then_some(fixed)
    }
}

/// Inserts commas between adjacent `"key": "value"` pairs
pub struct InsertMissingCommas {
    pattern: Regex,
}

impl InsertMissingCommas {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r#"("\w+"\s*:\s*"[^"]*")\s*(")"#).expect("Invalid regex pattern"),
        }
    }
}

impl Default for InsertMissingCommas {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonRepair for InsertMissingCommas {
    fn name(&self) -> &'static str {
        "insert_missing_commas"
    }

    fn repair(&self, candidate: &str) -> Option<String> {
        // Matches consume the opening quote of the next key, so one pass
        // only fixes every other gap.
        let mut current = candidate.to_string();
        loop {
            let next = self.pattern.replace_all(&current, "${1},${2}").into_owned();
            if next == current {
                break;
            }
            current = next;
        }
        (current != candidate).then_some(current)
    }
}

const FALLBACK_FIELDS: [&str; 4] = ["thought", "tool", "input", "answer"];

/// Extracts a [`ParsedIntent`] from raw model output
///
/// # Examples
///
/// ```
/// use labagent::agent::format::{FormatChoice, ParsedIntent, ResponseParser};
///
/// let parser = ResponseParser::new();
/// let intent = parser.parse(
///     "```json\n{\"thought\": \"easy\", \"answer\": \"42\"}\n```",
///     FormatChoice::Json,
/// );
/// assert!(matches!(intent, ParsedIntent::FinalAnswer { ref answer, .. } if answer == "42"));
/// ```
pub struct ResponseParser {
    tool_block: Regex,
    json_fence: Regex,
    fields: Vec<(&'static str, Regex)>,
    repairs: Vec<Box<dyn JsonRepair>>,
}

impl ResponseParser {
    /// Create a parser with the default repair chain
    pub fn new() -> Self {
        Self::without_repairs()
            .with_repair(Box::new(QuoteBareKeys::new()))
            .with_repair(Box::new(InsertMissingCommas::new()))
    }

    /// Create a parser that only accepts strictly valid JSON objects
    /// (the regex field fallback still applies)
    pub fn without_repairs() -> Self {
        let fields = FALLBACK_FIELDS
            .iter()
            .map(|field| {
                let pattern = format!(r#"(?i)"?{}"?\s*:\s*"([^"]*)""#, field);
                (*field, Regex::new(&pattern).expect("Invalid regex pattern"))
            })
            .collect();

        Self {
            tool_block: Regex::new(r"(?s)```tool\s+(\{.*?\})\s+```")
                .expect("Invalid regex pattern"),
            json_fence: Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```")
                .expect("Invalid regex pattern"),
            fields,
            repairs: Vec::new(),
        }
    }

    /// Append a repair strategy to the end of the chain
    pub fn with_repair(mut self, repair: Box<dyn JsonRepair>) -> Self {
        self.repairs.push(repair);
        self
    }

    /// Names of the configured repairs, in order
    pub fn repair_names(&self) -> Vec<&'static str> {
        self.repairs.iter().map(|r| r.name()).collect()
    }

    /// Parse one raw response according to the active format
    pub fn parse(&self, text: &str, format: FormatChoice) -> ParsedIntent {
        match format {
            FormatChoice::React => self.parse_react(text),
            FormatChoice::Json => self.parse_json(text),
        }
    }

    fn parse_react(&self, text: &str) -> ParsedIntent {
        let mut calls = Vec::new();

        for capture in self.tool_block.captures_iter(text) {
            let block = &capture[1];
            let object = match serde_json::from_str::<Value>(block) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!("Tool block is not a JSON object: {}", block);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to parse tool call: {} ({})", block, e);
                    continue;
                }
            };

            match tool_call_from_object(&object) {
                Some(call) => calls.push(call),
                None => warn!("Tool block lacks 'tool' or 'input': {}", block),
            }
        }

        if calls.is_empty() {
            debug!("No tool blocks found, treating response as final answer");
            ParsedIntent::answer(text)
        } else {
            debug!("Parsed {} tool call(s) from response", calls.len());
            ParsedIntent::ToolCalls(calls)
        }
    }

    fn parse_json(&self, text: &str) -> ParsedIntent {
        let candidate = self.extract_candidate(text);

        let strict_error = match parse_object(candidate) {
            Ok(object) => return classify(object, text),
            Err(e) => e,
        };
        warn!("Failed to parse JSON from model response: {}", strict_error);

        let mut current = candidate.to_string();
        for repair in &self.repairs {
            let Some(fixed) = repair.repair(&current) else {
                continue;
            };
            match parse_object(&fixed) {
                Ok(object) => {
                    debug!("JSON repaired by {}", repair.name());
                    return classify(object, text);
                }
                Err(e) => debug!("Repair {} did not help: {}", repair.name(), e),
            }
            current = fixed;
        }

        match self.extract_fields(text) {
            Some(object) => {
                tracing::info!("Extracted partial JSON data using regex fallbacks");
                classify(object, text)
            }
            None => ParsedIntent::failure(text, strict_error),
        }
    }

    /// Fenced block first, then the outermost `{...}` span, then the text
    fn extract_candidate<'a>(&self, text: &'a str) -> &'a str {
        let scope = self
            .json_fence
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or(text);

        match (scope.find('{'), scope.rfind('}')) {
            (Some(start), Some(end)) if end > start => &scope[start..=end],
            _ => scope,
        }
    }

    fn extract_fields(&self, text: &str) -> Option<Map<String, Value>> {
        let found = |name: &str| -> Option<String> {
            self.fields
                .iter()
                .find(|(field, _)| *field == name)
                .and_then(|(_, pattern)| pattern.captures(text))
                .map(|c| c[1].to_string())
        };

        let mut object = Map::new();
        if let Some(thought) = found("thought") {
            object.insert("thought".to_string(), Value::String(thought));
        }
        if let Some(answer) = found("answer") {
            object.insert("answer".to_string(), Value::String(answer));
        }
        if let (Some(tool), Some(input)) = (found("tool"), found("input")) {
            object.insert("tool".to_string(), Value::String(tool));
            object.insert("input".to_string(), Value::String(input));
        }

        (!object.is_empty()).then_some(object)
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_object(candidate: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got: {}", other)),
        Err(e) => Err(e.to_string()),
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn tool_call_from_object(object: &Map<String, Value>) -> Option<ToolCall> {
    let tool = text_field(object, "tool")?;
    let input = object.get("input").filter(|v| !v.is_null())?;
    Some(ToolCall {
        thought: text_field(object, "thought"),
        tool,
        input: ToolInput::from(input.clone()),
    })
}

fn classify(object: Map<String, Value>, raw_text: &str) -> ParsedIntent {
    let thought = text_field(&object, "thought");

    if let Some(answer) = text_field(&object, "answer") {
        return ParsedIntent::FinalAnswer { thought, answer };
    }

    if let Some(call) = tool_call_from_object(&object) {
        return ParsedIntent::ToolCalls(vec![call]);
    }

    if thought.is_some() {
        ParsedIntent::failure(
            raw_text,
            "response contained a thought but neither a tool call nor an answer",
        )
    } else {
        ParsedIntent::failure(raw_text, "response contained neither a tool call nor an answer")
    }
}
