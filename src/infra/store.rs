//! Store selection from the configured URL.

use std::sync::Arc;

use tracing::info;

use crate::application::repos::PurgeLogRepo;
use crate::config::StoreSettings;

use super::db::PostgresRepositories;
use super::error::InfraError;
use super::memory::MemoryPurgeLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl StoreKind {
    pub fn from_url(url: &str) -> Result<Self, InfraError> {
        match url.split_once("://").map(|(scheme, _)| scheme) {
            Some("postgres" | "postgresql") => Ok(Self::Postgres),
            Some("memory") => Ok(Self::Memory),
            _ => Err(InfraError::configuration(format!(
                "unsupported store url `{url}`; expected postgres:// or memory://"
            ))),
        }
    }
}

/// Dial the store, applying migrations for Postgres.
pub async fn open(settings: &StoreSettings) -> Result<Arc<dyn PurgeLogRepo>, InfraError> {
    match StoreKind::from_url(&settings.url)? {
        StoreKind::Memory => {
            info!("using in-memory purge log; entries do not survive restarts");
            Ok(Arc::new(MemoryPurgeLog::new()))
        }
        StoreKind::Postgres => {
            info!("dialing postgres purge log");
            let pool = PostgresRepositories::connect(
                &settings.url,
                settings.max_connections.get(),
                settings.connect_timeout,
            )
            .await
            .map_err(|err| InfraError::database(err.to_string()))?;

            PostgresRepositories::run_migrations(&pool)
                .await
                .map_err(|err| InfraError::database(err.to_string()))?;

            info!("postgres purge log ready");
            Ok(Arc::new(PostgresRepositories::new(pool)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_kind_follows_the_url_scheme() {
        assert_eq!(
            StoreKind::from_url("postgres://u:p@localhost/purgery").expect("postgres"),
            StoreKind::Postgres
        );
        assert_eq!(
            StoreKind::from_url("postgresql://localhost/purgery").expect("postgres"),
            StoreKind::Postgres
        );
        assert_eq!(
            StoreKind::from_url("memory://").expect("memory"),
            StoreKind::Memory
        );
        assert!(StoreKind::from_url("redis://localhost").is_err());
        assert!(StoreKind::from_url("localhost").is_err());
    }
}
