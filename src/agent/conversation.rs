//! Conversation state for a single agent run
//!
//! The conversation is the only memory the model has: every turn is
//! flattened into the prompt of the next completion. It grows monotonically
//! and is dropped when the run returns.

use crate::agent::format::FormatChoice;
use std::fmt;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// The original user prompt
    User,
    /// A raw model response
    Assistant,
    /// A tool result fed back to the model
    Observation,
    /// A corrective note after an unparseable response
    Instruction,
}

impl fmt::Display for TurnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Observation => "observation",
            Self::Instruction => "instruction",
        };
        write!(f, "{}", label)
    }
}

/// One entry of the conversation history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Producer of the turn
    pub kind: TurnKind,
    /// Text exactly as it is sent to the model
    pub content: String,
}

/// Ordered turn history of one agent run
///
/// # Examples
///
/// ```
/// use labagent::agent::Conversation;
///
/// let mut conversation = Conversation::new("What is 2 + 2?");
/// conversation.add_assistant("```tool\n{\"tool\": \"calculator\", \"input\": \"2+2\"}\n```");
/// conversation.add_observation("calculator", "4");
/// assert_eq!(conversation.observation_count(), 1);
/// assert!(conversation.render().ends_with("Tool result for calculator:\n4"));
/// ```
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Start a conversation from the user's prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn {
                kind: TurnKind::User,
                content: prompt.into(),
            }],
        }
    }

    fn push(&mut self, kind: TurnKind, content: String) {
        self.turns.push(Turn { kind, content });
    }

    /// Append a raw model response
    pub fn add_assistant(&mut self, response: impl Into<String>) {
        self.push(TurnKind::Assistant, response.into());
    }

    /// Append a tool result as `Tool result for <name>:\n<result>`
    pub fn add_observation(&mut self, tool: &str, result: &str) {
        self.push(
            TurnKind::Observation,
            format!("Tool result for {}:\n{}", tool, result),
        );
    }

    /// Append the corrective note sent after an unparseable response
    pub fn add_parse_failure(&mut self, reason: &str, format: FormatChoice) {
        let instruction = match format {
            FormatChoice::Json => {
                "Please provide a valid JSON response following the format in the instructions."
            }
            FormatChoice::React => {
                "Please either call a tool using a ```tool block or answer the user directly."
            }
        };
        self.push(
            TurnKind::Instruction,
            format!("Error parsing response: {}\n{}", reason, instruction),
        );
    }

    /// Flatten the history into a completion prompt
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|turn| turn.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All turns, oldest first
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns, including the user prompt
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false: a conversation starts with the user prompt
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of tool results appended so far
    pub fn observation_count(&self) -> usize {
        self.count(TurnKind::Observation)
    }

    /// Number of model responses appended so far
    pub fn assistant_count(&self) -> usize {
        self.count(TurnKind::Assistant)
    }

    fn count(&self, kind: TurnKind) -> usize {
        self.turns.iter().filter(|t| t.kind == kind).count()
    }
}
