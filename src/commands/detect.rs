//! Format detection command

use crate::agent::FormatDetector;
use crate::config::Config;
use crate::error::Result;
use crate::providers::create_provider;
use colored::Colorize;

/// Print the format a model would get and the reason
///
/// Detection itself never fails; unreachable servers fall back to the
/// model name.
///
/// # Errors
///
/// Returns error if the provider cannot be created
pub async fn detect_format(config: &Config, model: Option<&str>) -> Result<()> {
    let model = model.unwrap_or(&config.agent.model);
    let provider = create_provider(&config.server)?;
    let detector = FormatDetector::from_config(&config.agent);

    let detection = detector.detect(provider.as_ref(), model).await;

    println!("Model:  {}", model);
    println!("Format: {}", detection.format.to_string().green().bold());
    println!("Reason: {}", detection.reason);
    match &detection.metadata_from {
        Some(variant) => println!("Source: metadata for '{}'", variant),
        None => println!("Source: model name only (no metadata available)"),
    }
    Ok(())
}
