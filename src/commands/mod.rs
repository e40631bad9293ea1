//! Command handlers for the CLI
//!
//! Each submodule implements one subcommand on top of the library:
//! providers, tools and the agent.

pub mod ask;
pub mod config;
pub mod detect;
pub mod interactive;
pub mod tools;

use crate::agent::Agent;
use crate::config::Config;
use crate::error::Result;
use crate::providers::{create_provider, Provider};
use crate::tools::builtin::register_builtin_tools;
use crate::tools::ToolRegistry;
use std::sync::Arc;

/// Registry with the built-in tools, capped per the configuration
pub fn build_tool_registry(config: &Config) -> ToolRegistry {
    let mut registry = ToolRegistry::with_max_output_size(config.tools.max_output_size);
    register_builtin_tools(&mut registry);
    registry
}

/// Agent wired to the configured server and the built-in tools
///
/// # Errors
///
/// Returns error if the provider cannot be created or the agent
/// configuration is invalid
pub fn build_agent(config: &Config) -> Result<Agent> {
    let provider: Arc<dyn Provider> = Arc::from(create_provider(&config.server)?);
    Agent::new(
        provider,
        Arc::new(build_tool_registry(config)),
        config.agent.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_tool_registry_has_builtins() {
        let registry = build_tool_registry(&Config::default());
        assert_eq!(
            registry.names(),
            vec!["calculator", "weather_data", "rain_chance"]
        );
    }

    #[test]
    fn test_build_agent_with_defaults() {
        let agent = build_agent(&Config::default()).unwrap();
        assert_eq!(agent.tools().len(), 3);
        assert_eq!(agent.config().max_iterations, 5);
    }
}
