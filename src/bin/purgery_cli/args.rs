//! Command-line surface for `purgery-cli`.

#![deny(clippy::all, clippy::pedantic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "purgery-cli", version, about = "purgery ingress client", long_about = None)]
pub struct Cli {
    /// Ingress root URL, e.g. <http://127.0.0.1:8080>
    #[arg(long, env = "PURGERY_API_URL")]
    pub api: Option<String>,

    /// Path to file containing API key (takes precedence over env)
    #[arg(long, env = "PURGERY_API_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// API key from env (CLI flag intentionally disabled to avoid shell history leaks)
    #[arg(hide = true, env = "PURGERY_API_KEY")]
    pub api_key_env: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Queue a URL for purging on every cache node
    Purge {
        /// Absolute http(s) URL to purge
        url: String,
    },
    /// Check that the ingress can reach its store
    Health,
}
