//! Effective configuration command

use crate::config::Config;
use crate::error::Result;

/// Print the effective configuration as YAML
///
/// The API key is masked.
///
/// # Errors
///
/// Returns error if the configuration cannot be serialized
pub fn show_config(config: &Config) -> Result<()> {
    print!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &Config) -> Result<String> {
    let mut shown = config.clone();
    if shown.server.api_key.is_some() {
        shown.server.api_key = Some("********".to_string());
    }
    Ok(serde_yaml::to_string(&shown)?)
}
