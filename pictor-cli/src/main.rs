//! Pictor CLI
//!
//! Command-line interface for generating and editing images through the
//! remote images API, single-shot or in concurrent batches.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pictor")]
#[command(about = "Generate or edit images via the Images API", long_about = None)]
struct Cli {
    /// API base URL
    #[arg(
        long,
        env = "PICTOR_API_BASE",
        default_value = pictor_client::DEFAULT_BASE_URL
    )]
    api_base: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout is reserved for user-facing output.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pictor_cli=info,pictor_runner=info,pictor_client=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        api_base: cli.api_base,
    };

    handle_command(cli.command, &config).await
}
