//! Command-line interface definition for labagent
//!
//! This module defines the CLI structure using clap's derive API.

use crate::agent::format::FormatSetting;
use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};

/// labagent - a tool-using teaching agent for local LLM servers
///
/// Ask questions that the model answers by calling tools, in a JSON or
/// fenced tool-block protocol chosen from the model's capabilities.
#[derive(Parser, Debug, Clone)]
#[command(name = "labagent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Model server URL (overrides config and LABAGENT_SERVER)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Model to use (overrides config and LABAGENT_MODEL)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Enable verbose logging (raw model responses and tool results)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for labagent
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Ask the agent a single question
    Ask {
        /// The question to ask
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,

        /// Output format: auto, json or react
        #[arg(short, long)]
        format: Option<FormatSetting>,

        /// Maximum number of model calls (1-100)
        #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..=100))]
        max_iterations: Option<usize>,
    },

    /// Start an interactive session (exit, quit or q to leave)
    Interactive {
        /// Output format: auto, json or react
        #[arg(short, long)]
        format: Option<FormatSetting>,
    },

    /// List the available tools
    Tools,

    /// Show which output format a model would use, and why
    Detect {
        /// Model name (defaults to the configured model)
        model: Option<String>,
    },

    /// Print the effective configuration as YAML
    Config,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::format::FormatChoice;

    #[test]
    fn test_cli_parse_ask() {
        let cli = Cli::try_parse_from([
            "labagent",
            "ask",
            "What's",
            "the",
            "weather?",
            "--format",
            "json",
            "--max-iterations",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask {
                prompt,
                format,
                max_iterations,
            } => {
                assert_eq!(prompt.join(" "), "What's the weather?");
                assert_eq!(format, Some(FormatSetting::Forced(FormatChoice::Json)));
                assert_eq!(max_iterations, Some(3));
            }
            other => panic!("Expected Ask command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_ask_requires_prompt() {
        assert!(Cli::try_parse_from(["labagent", "ask"]).is_err());
    }

    #[test]
    fn test_cli_max_iterations_bounds() {
        for bad in ["0", "101", "1000", "-1"] {
            let result =
                Cli::try_parse_from(["labagent", "ask", "hi", "--max-iterations", bad]);
            assert!(result.is_err(), "accepted --max-iterations {}", bad);
        }

        let cli = Cli::try_parse_from(["labagent", "ask", "hi", "--max-iterations", "100"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ask {
                max_iterations: Some(100),
                ..
            }
        ));
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        let result = Cli::try_parse_from(["labagent", "ask", "hi", "--format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "labagent",
            "interactive",
            "--model",
            "llama3:70b",
            "-v",
            "--server",
            "http://gpu:11434",
        ])
        .unwrap();

        assert_eq!(cli.model.as_deref(), Some("llama3:70b"));
        assert_eq!(cli.server.as_deref(), Some("http://gpu:11434"));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Interactive { format: None }));
    }

    #[test]
    fn test_cli_parse_detect() {
        let cli = Cli::try_parse_from(["labagent", "detect", "mixtral:8x7b"]).unwrap();
        match cli.command {
            Commands::Detect { model } => assert_eq!(model.as_deref(), Some("mixtral:8x7b")),
            other => panic!("Expected Detect command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_tools_and_config() {
        assert!(matches!(
            Cli::try_parse_from(["labagent", "tools"]).unwrap().command,
            Commands::Tools
        ));
        assert!(matches!(
            Cli::try_parse_from(["labagent", "--config", "x.yaml", "config"])
                .unwrap()
                .command,
            Commands::Config
        ));
    }
}
