//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod batch;
mod edit;
mod generate;
mod shared;

pub use batch::BatchArgs;
pub use edit::EditArgs;
pub use generate::GenerateArgs;
pub use shared::SharedArgs;

use anyhow::{Result, bail};
use clap::Subcommand;
use colored::Colorize;
use tracing::warn;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new image
    Generate(GenerateArgs),
    /// Generate multiple prompts concurrently (line-delimited input)
    GenerateBatch(BatchArgs),
    /// Edit an existing image
    Edit(EditArgs),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Generate(args) => generate::handle_generate(args, config).await,
        Commands::GenerateBatch(args) => batch::handle_batch(args, config).await,
        Commands::Edit(args) => edit::handle_edit(args, config).await,
    }
}

/// Check the API credential before doing any network work.
///
/// Dry runs are allowed to proceed without a key.
pub(crate) fn ensure_api_key(dry_run: bool) -> Result<Option<String>> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(Some(key)),
        _ if dry_run => {
            warn!("OPENAI_API_KEY is not set; dry-run only");
            Ok(None)
        }
        _ => bail!("OPENAI_API_KEY is not set. Export it before running."),
    }
}

/// Print the written output paths.
pub(crate) fn print_written(paths: &[std::path::PathBuf]) {
    for path in paths {
        println!("{} {}", "Wrote".green(), path.display());
    }
}
