//! Interactive session handler
//!
//! A readline loop that sends every line to a fresh agent run. Each
//! question starts a new conversation; there is no memory across turns.

use crate::agent::format::FormatSetting;
use crate::agent::{answer_or_error, RunOptions};
use crate::commands::build_agent;
use crate::config::Config;
use crate::error::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Start the interactive session
///
/// # Arguments
///
/// * `config` - Effective configuration
/// * `format` - Optional format override for every question
///
/// # Errors
///
/// Returns error if the agent or the line editor cannot be created
pub async fn run_interactive(config: &Config, format: Option<FormatSetting>) -> Result<()> {
    let agent = build_agent(config)?;

    let mut options = RunOptions::from(&config.agent);
    if let Some(format) = format {
        options.format = format;
    }

    let detection = agent.detect_format(&options.model, options.format).await;
    // Detect once so the banner and every run agree.
    options.format = FormatSetting::Forced(detection.format);

    let mut rl = DefaultEditor::new()?;
    print_welcome_banner(&options.model, &detection.format.to_string(), agent.tools().len());

    loop {
        match rl.readline(&format!("{} ", "you>".cyan().bold())) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if is_exit_command(trimmed) {
                    break;
                }

                rl.add_history_entry(trimmed)?;

                let answer = answer_or_error(agent.run_with(trimmed, &options).await);
                println!("{} {}\n", "agent>".green().bold(), answer);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                tracing::error!("Readline error: {}", e);
                return Err(e.into());
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn is_exit_command(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "exit" | "quit" | "q")
}

fn print_welcome_banner(model: &str, format: &str, tool_count: usize) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║              labagent interactive session                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
    println!("Model:  {}", model.bold());
    println!("Format: {}", format);
    println!("Tools:  {} available (run `labagent tools` to list them)\n", tool_count);
    println!("Type 'exit', 'quit' or 'q' to leave\n");
}
