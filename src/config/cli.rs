use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the purgery binary.
#[derive(Debug, Parser)]
#[command(
    name = "purgery",
    version,
    about = "Propagates URL purges from an HTTP ingress to cache nodes"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PURGERY_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the ingress API and the purge worker.
    Serve(Box<ServeArgs>),
    /// Apply pending Postgres migrations and exit.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreOverride {
    /// Override the store URL (postgres://… or memory://).
    #[arg(long = "store-url", value_name = "URL")]
    pub store_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub store: StoreOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub store: StoreOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the store pool size.
    #[arg(long = "store-max-connections", value_name = "COUNT")]
    pub store_max_connections: Option<u32>,

    /// Override the consumer identity the worker checkpoints under.
    #[arg(long = "consumer-id", value_name = "ID")]
    pub consumer_id: Option<String>,

    /// Override the checkpoint key namespace.
    #[arg(long = "queue-namespace", value_name = "NAME")]
    pub queue_namespace: Option<String>,

    /// Override how long a poll waits for new entries.
    #[arg(long = "queue-block-for-ms", value_name = "MILLIS")]
    pub queue_block_for_ms: Option<u64>,

    /// Override the pause after a failed purge.
    #[arg(long = "queue-backoff-ms", value_name = "MILLIS")]
    pub queue_backoff_ms: Option<u64>,

    /// Override the cache node address (host:port).
    #[arg(long = "cache-addr", value_name = "HOST:PORT")]
    pub cache_addr: Option<String>,
}
