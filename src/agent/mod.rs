//! Agent module for labagent
//!
//! This module contains the response formats and parser, format detection,
//! conversation state, and the bounded tool-calling loop.

pub mod conversation;
pub mod core;
pub mod detect;
pub mod format;

pub use conversation::Conversation;
pub use core::{answer_or_error, run_agent, Agent, AgentRun, RunOptions, RunOutcome};
pub use detect::{normalize_model_name, Detection, DetectionReason, FormatDetector};
pub use format::{FormatChoice, FormatSetting, ParsedIntent, ResponseParser, ToolCall};
