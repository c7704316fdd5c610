//! Postgres-backed repository implementations.

mod purge_log;
mod util;

use std::sync::Arc;
use std::time::Duration;

use sqlx::{
    postgres::{PgListener, PgPool, PgPoolOptions},
    query,
};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
    // Reused across blocking reads so no notification slips between two polls.
    listener: Arc<Mutex<Option<PgListener>>>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }
}
