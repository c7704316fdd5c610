//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, MigrateArgs, ServeArgs, ServeOverrides, StoreOverride};

use std::{fmt, net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::queue::QueueOptions;
use crate::infra::purge::HttpPurgerOptions;
use crate::util::safe::MAX_COMPARE_LEN;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "purgery";
const ENV_PREFIX: &str = "PURGERY";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_STORE_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_STORE_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_NAMESPACE: &str = "purgery";
const DEFAULT_BLOCK_FOR_MS: u64 = 1_000;
const DEFAULT_CHECKPOINT_TTL_SECS: u64 = 60;
const DEFAULT_BACKOFF_MS: u64 = 50;
const DEFAULT_PURGE_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_PURGE_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Fully validated settings for the `serve` command.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    pub queue: QueueSettings,
    pub purge: PurgeSettings,
    pub auth: AuthSettings,
}

/// The subset `migrate` needs; it never touches the queue or the cache node.
#[derive(Debug, Clone)]
pub struct MigrateSettings {
    pub logging: LoggingSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub url: String,
    pub max_connections: NonZeroU32,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub namespace: String,
    pub consumer_id: String,
    pub block_for: Duration,
    pub checkpoint_ttl: Duration,
    pub backoff: Duration,
}

impl QueueSettings {
    pub fn options(&self) -> QueueOptions {
        QueueOptions {
            namespace: self.namespace.clone(),
            consumer_id: self.consumer_id.clone(),
            block_for: self.block_for,
            checkpoint_ttl: self.checkpoint_ttl,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PurgeSettings {
    pub cache_addr: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl PurgeSettings {
    pub fn options(&self) -> HttpPurgerOptions {
        HttpPurgerOptions {
            cache_addr: self.cache_addr.clone(),
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
        }
    }
}

#[derive(Clone)]
pub struct AuthSettings {
    pub api_key: String,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load `serve` settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut raw = layered(cli)?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_store_override(&args.store),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Load the settings `migrate` needs; queue, purge and auth keys may be absent.
pub fn load_migrate(cli: &CliArgs, args: &MigrateArgs) -> Result<MigrateSettings, LoadError> {
    let mut raw = layered(cli)?;
    raw.apply_store_override(&args.store);

    Ok(MigrateSettings {
        logging: build_logging_settings(raw.logging)?,
        store: build_store_settings(raw.store)?,
    })
}

fn layered(cli: &CliArgs) -> Result<RawSettings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    Ok(builder.build()?.try_deserialize()?)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    store: RawStoreSettings,
    queue: RawQueueSettings,
    purge: RawPurgeSettings,
    auth: RawAuthSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_store_override(&overrides.store);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(value) = overrides.store_max_connections {
            self.store.max_connections = Some(value);
        }
        if let Some(id) = overrides.consumer_id.as_ref() {
            self.queue.consumer_id = Some(id.clone());
        }
        if let Some(namespace) = overrides.queue_namespace.as_ref() {
            self.queue.namespace = Some(namespace.clone());
        }
        if let Some(millis) = overrides.queue_block_for_ms {
            self.queue.block_for_ms = Some(millis);
        }
        if let Some(millis) = overrides.queue_backoff_ms {
            self.queue.backoff_ms = Some(millis);
        }
        if let Some(addr) = overrides.cache_addr.as_ref() {
            self.purge.cache_addr = Some(addr.clone());
        }
    }

    fn apply_store_override(&mut self, overrides: &StoreOverride) {
        if let Some(url) = overrides.store_url.as_ref() {
            self.store.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            store,
            queue,
            purge,
            auth,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            store: build_store_settings(store)?,
            queue: build_queue_settings(queue)?,
            purge: build_purge_settings(purge)?,
            auth: build_auth_settings(auth)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let url = required(store.url, "store.url")?;

    let max_connections = non_zero_u32(
        store
            .max_connections
            .unwrap_or(DEFAULT_STORE_MAX_CONNECTIONS)
            .into(),
        "store.max_connections",
    )?;

    let connect_secs = store
        .connect_timeout_seconds
        .unwrap_or(DEFAULT_STORE_CONNECT_TIMEOUT_SECS);
    if connect_secs == 0 {
        return Err(LoadError::invalid(
            "store.connect_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(StoreSettings {
        url,
        max_connections,
        connect_timeout: Duration::from_secs(connect_secs),
    })
}

fn build_queue_settings(queue: RawQueueSettings) -> Result<QueueSettings, LoadError> {
    let consumer_id = required(queue.consumer_id, "queue.consumer_id")?;
    let namespace = queue
        .namespace
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

    let block_for_ms = queue.block_for_ms.unwrap_or(DEFAULT_BLOCK_FOR_MS);
    if block_for_ms == 0 {
        return Err(LoadError::invalid(
            "queue.block_for_ms",
            "must be greater than zero",
        ));
    }

    let ttl_secs = queue
        .checkpoint_ttl_seconds
        .unwrap_or(DEFAULT_CHECKPOINT_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "queue.checkpoint_ttl_seconds",
            "must be greater than zero",
        ));
    }
    let block_for = Duration::from_millis(block_for_ms);
    let checkpoint_ttl = Duration::from_secs(ttl_secs);
    if block_for >= checkpoint_ttl {
        return Err(LoadError::invalid(
            "queue.block_for_ms",
            "must be shorter than queue.checkpoint_ttl_seconds",
        ));
    }

    Ok(QueueSettings {
        namespace,
        consumer_id,
        block_for,
        checkpoint_ttl,
        backoff: Duration::from_millis(queue.backoff_ms.unwrap_or(DEFAULT_BACKOFF_MS)),
    })
}

fn build_purge_settings(purge: RawPurgeSettings) -> Result<PurgeSettings, LoadError> {
    let cache_addr = required(purge.cache_addr, "purge.cache_addr")?;

    let connect_secs = purge
        .connect_timeout_seconds
        .unwrap_or(DEFAULT_PURGE_CONNECT_TIMEOUT_SECS);
    let request_secs = purge
        .request_timeout_seconds
        .unwrap_or(DEFAULT_PURGE_REQUEST_TIMEOUT_SECS);
    if connect_secs == 0 {
        return Err(LoadError::invalid(
            "purge.connect_timeout_seconds",
            "must be greater than zero",
        ));
    }
    if request_secs == 0 {
        return Err(LoadError::invalid(
            "purge.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(PurgeSettings {
        cache_addr,
        connect_timeout: Duration::from_secs(connect_secs),
        request_timeout: Duration::from_secs(request_secs),
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let api_key = auth
        .api_key
        .filter(|value| !value.is_empty())
        .ok_or_else(|| LoadError::invalid("auth.api_key", "must be set"))?;

    // Longer keys could never match: the comparison rejects oversized input.
    if api_key.len() > MAX_COMPARE_LEN {
        return Err(LoadError::invalid(
            "auth.api_key",
            format!("must be at most {MAX_COMPARE_LEN} bytes"),
        ));
    }

    Ok(AuthSettings { api_key })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    connect_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawQueueSettings {
    namespace: Option<String>,
    consumer_id: Option<String>,
    block_for_ms: Option<u64>,
    checkpoint_ttl_seconds: Option<u64>,
    backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPurgeSettings {
    cache_addr: Option<String>,
    connect_timeout_seconds: Option<u64>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    api_key: Option<String>,
}

impl fmt::Debug for RawAuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawAuthSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, LoadError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| LoadError::invalid(key, "must be set"))
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
