//! purgery-cli: submit purges to, and probe, a running purgery ingress.
#![deny(clippy::all, clippy::pedantic)]

mod args;
mod client;

#[cfg(test)]
mod tests;

use clap::Parser;

use args::{Cli, Commands};
use client::{CliError, build_ctx_from_cli};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = build_ctx_from_cli(&cli)?;

    match cli.command {
        Commands::Purge { url } => {
            ctx.purge(&url).await?;
            println!("queued {url}");
        }
        Commands::Health => {
            ctx.health().await?;
            println!("ok");
        }
    }

    Ok(())
}
