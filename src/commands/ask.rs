//! Single-question command

use crate::agent::format::FormatSetting;
use crate::agent::{answer_or_error, RunOptions, RunOutcome};
use crate::commands::build_agent;
use crate::config::Config;
use crate::error::Result;
use colored::Colorize;

/// Ask the agent one question and print the answer
///
/// Transport errors and tool defects are printed as `Error: ...` rather
/// than returned.
///
/// # Arguments
///
/// * `config` - Effective configuration
/// * `prompt` - The question
/// * `format` - Optional format override
/// * `max_iterations` - Optional iteration cap override
///
/// # Errors
///
/// Returns error only if the agent cannot be constructed
pub async fn run_ask(
    config: &Config,
    prompt: &str,
    format: Option<FormatSetting>,
    max_iterations: Option<usize>,
) -> Result<()> {
    let agent = build_agent(config)?;

    let mut options = RunOptions::from(&config.agent);
    if let Some(format) = format {
        options.format = format;
    }
    if let Some(max_iterations) = max_iterations {
        options.max_iterations = max_iterations;
    }

    let result = agent.run_with(prompt, &options).await;

    if let Ok(run) = &result {
        tracing::debug!(
            "Run finished with {:?} after {} iteration(s) using {} format",
            run.outcome,
            run.iterations,
            run.format()
        );
        if options.verbose {
            eprintln!(
                "{}",
                format!("[format: {} - {}]", run.format(), run.detection.reason).dimmed()
            );
        }
        if run.outcome == RunOutcome::IterationLimit {
            println!("{}", run.answer.yellow());
            return Ok(());
        }
    }

    println!("{}", answer_or_error(result));
    Ok(())
}
