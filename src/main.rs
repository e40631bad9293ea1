//! labagent - tool-using teaching agent CLI
//!
//! Main entry point for the labagent application.

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use labagent::cli::{Cli, Commands};
use labagent::commands;
use labagent::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref(), &cli)?;
    config.validate()?;

    match cli.command {
        Commands::Ask {
            prompt,
            format,
            max_iterations,
        } => {
            let prompt = prompt.join(" ");
            tracing::debug!("Asking: {}", prompt);
            commands::ask::run_ask(&config, &prompt, format, max_iterations).await
        }
        Commands::Interactive { format } => {
            tracing::info!("Starting interactive session");
            commands::interactive::run_interactive(&config, format).await
        }
        Commands::Tools => {
            commands::tools::list_tools(&config);
            Ok(())
        }
        Commands::Detect { model } => {
            commands::detect::detect_format(&config, model.as_deref()).await
        }
        Commands::Config => commands::config::show_config(&config),
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins; otherwise `--verbose` or `LABAGENT_LOG=debug` turn on
/// debug output for this crate.
fn init_tracing(verbose: bool) {
    let debug_requested = verbose
        || std::env::var("LABAGENT_LOG")
            .map(|level| level.eq_ignore_ascii_case("debug"))
            .unwrap_or(false);
    let default_directive = if debug_requested {
        "labagent=debug"
    } else {
        "labagent=warn"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
