use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgListener, query, query_as};
use tracing::{debug, warn};

use crate::application::repos::{PurgeLogRepo, RepoError};
use crate::domain::position::{LogPosition, now_millis};
use crate::domain::purge::PurgeEntry;

use super::PostgresRepositories;
use super::util::{map_sqlx_error, position_from_row, position_to_row};

/// Channel notified, in the appending transaction, for every new entry.
const NOTIFY_CHANNEL: &str = "purgery_log";

// The head row lock serializes appenders, so positions commit in order.
const APPEND_SQL: &str = "WITH head AS ( \
        UPDATE purge_log_head \
           SET position_ms = GREATEST(position_ms, $1), \
               position_seq = CASE WHEN $1 > position_ms THEN 0 ELSE position_seq + 1 END \
         WHERE id = 1 \
     RETURNING position_ms, position_seq \
    ) \
    INSERT INTO purge_log (position_ms, position_seq, url) \
    SELECT position_ms, position_seq, $2 FROM head \
    RETURNING position_ms, position_seq";

// Keep the larger position; always refresh expiry.
const UPSERT_CHECKPOINT_SQL: &str = "INSERT INTO purge_checkpoints \
        (key, position_ms, position_seq, expires_at) \
    VALUES ($1, $2, $3, now() + make_interval(secs => $4::double precision)) \
    ON CONFLICT (key) DO UPDATE SET \
        position_ms = CASE \
            WHEN (purge_checkpoints.position_ms, purge_checkpoints.position_seq) \
                 < (EXCLUDED.position_ms, EXCLUDED.position_seq) \
            THEN EXCLUDED.position_ms ELSE purge_checkpoints.position_ms END, \
        position_seq = CASE \
            WHEN (purge_checkpoints.position_ms, purge_checkpoints.position_seq) \
                 < (EXCLUDED.position_ms, EXCLUDED.position_seq) \
            THEN EXCLUDED.position_seq ELSE purge_checkpoints.position_seq END, \
        expires_at = EXCLUDED.expires_at";

const FIRST_AFTER_SQL: &str = "SELECT position_ms, position_seq, url \
    FROM purge_log \
    WHERE (position_ms, position_seq) > ($1, $2) \
    ORDER BY position_ms, position_seq \
    LIMIT 1";

impl PostgresRepositories {
    async fn first_after(&self, after: LogPosition) -> Result<Option<PurgeEntry>, RepoError> {
        let (millis, seq) = position_to_row(after)?;
        let row: Option<(i64, i64, String)> = query_as(FIRST_AFTER_SQL)
            .bind(millis)
            .bind(seq)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(|(millis, seq, url)| {
            Ok(PurgeEntry {
                position: position_from_row(millis, seq)?,
                url,
            })
        })
        .transpose()
    }

    async fn listen(&self) -> Result<PgListener, RepoError> {
        let mut listener = PgListener::connect_with(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        listener
            .listen(NOTIFY_CHANNEL)
            .await
            .map_err(map_sqlx_error)?;
        debug!(channel = NOTIFY_CHANNEL, "listening for purge log appends");
        Ok(listener)
    }
}

#[async_trait]
impl PurgeLogRepo for PostgresRepositories {
    async fn append(&self, url: &str) -> Result<LogPosition, RepoError> {
        let now = i64::try_from(now_millis()).map_err(RepoError::from_persistence)?;
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let (millis, seq): (i64, i64) = query_as(APPEND_SQL)
            .bind(now)
            .bind(url)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let position = position_from_row(millis, seq)?;

        query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(position.to_string())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(position)
    }

    async fn bootstrap_checkpoint(
        &self,
        key: &str,
        candidate: LogPosition,
        ttl: Duration,
    ) -> Result<LogPosition, RepoError> {
        let (millis, seq) = position_to_row(candidate)?;
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        // Any stored row wins, stale or not. The follow-up SELECT runs on a
        // fresh snapshot, so it sees whichever writer committed.
        query(
            "INSERT INTO purge_checkpoints (key, position_ms, position_seq, expires_at) \
             VALUES ($1, $2, $3, now() + make_interval(secs => $4::double precision)) \
             ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .bind(millis)
        .bind(seq)
        .bind(ttl.as_secs_f64())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let (millis, seq, stale): (i64, i64, bool) = query_as(
            "SELECT position_ms, position_seq, expires_at <= now() \
             FROM purge_checkpoints WHERE key = $1",
        )
        .bind(key)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        let position = position_from_row(millis, seq)?;
        if stale {
            debug!(key, %position, "resuming from a stale checkpoint");
        }
        Ok(position)
    }

    async fn read_after(
        &self,
        after: LogPosition,
        block_for: Duration,
    ) -> Result<Option<PurgeEntry>, RepoError> {
        let mut slot = self.listener.lock().await;
        // Taken out of the slot so a failed listener is dropped, not reused.
        let mut listener = match slot.take() {
            Some(listener) => listener,
            None => self.listen().await?,
        };
        let deadline = tokio::time::Instant::now() + block_for;

        loop {
            if let Some(entry) = self.first_after(after).await? {
                *slot = Some(listener);
                return Ok(Some(entry));
            }

            match tokio::time::timeout_at(deadline, listener.recv()).await {
                Err(_) => {
                    *slot = Some(listener);
                    return Ok(None);
                }
                Ok(Ok(notification)) => {
                    debug!(position = notification.payload(), "purge log append observed");
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "purge log listener failed");
                    return Err(map_sqlx_error(err));
                }
            }
        }
    }

    async fn advance_checkpoint(
        &self,
        key: &str,
        position: LogPosition,
        ttl: Duration,
    ) -> Result<(), RepoError> {
        let (millis, seq) = position_to_row(position)?;
        query(UPSERT_CHECKPOINT_SQL)
            .bind(key)
            .bind(millis)
            .bind(seq)
            .bind(ttl.as_secs_f64())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn load_checkpoint(&self, key: &str) -> Result<Option<LogPosition>, RepoError> {
        let row: Option<(i64, i64)> = query_as(
            "SELECT position_ms, position_seq FROM purge_checkpoints WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(|(millis, seq)| position_from_row(millis, seq))
            .transpose()
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
