//! Process-local purge log selected with a `memory://` store URL.
//!
//! Same contract as the Postgres adapter, minus durability across restarts.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;

use crate::application::repos::{PurgeLogRepo, RepoError};
use crate::domain::position::{LogPosition, now_millis};
use crate::domain::purge::PurgeEntry;
use crate::util::lock::mutex_lock;

const SOURCE: &str = "infra::memory";

#[derive(Debug, Clone, Copy)]
struct StoredCheckpoint {
    position: LogPosition,
    expires_at: Instant,
}

#[derive(Default)]
struct State {
    head: LogPosition,
    entries: BTreeMap<LogPosition, String>,
    checkpoints: HashMap<String, StoredCheckpoint>,
}

pub struct MemoryPurgeLog {
    state: Mutex<State>,
    appended: Notify,
    available: AtomicBool,
}

impl MemoryPurgeLog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            appended: Notify::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Append with an explicit clock reading; positions still never decrease.
    pub fn append_at(&self, url: &str, now_millis: u64) -> LogPosition {
        let position = {
            let mut state = mutex_lock(&self.state, SOURCE, "append");
            let position = LogPosition::successor(state.head, now_millis);
            state.head = position;
            state.entries.insert(position, url.to_string());
            position
        };
        self.appended.notify_waiters();
        position
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.state, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Simulate the store going away; every operation fails while unset.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), RepoError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepoError::from_persistence("memory store is unavailable"))
        }
    }

    fn first_after(&self, after: LogPosition) -> Option<PurgeEntry> {
        let state = mutex_lock(&self.state, SOURCE, "read_after");
        state
            .entries
            .range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded))
            .next()
            .map(|(position, url)| PurgeEntry {
                position: *position,
                url: url.clone(),
            })
    }
}

impl Default for MemoryPurgeLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PurgeLogRepo for MemoryPurgeLog {
    async fn append(&self, url: &str) -> Result<LogPosition, RepoError> {
        self.ensure_available()?;
        Ok(self.append_at(url, now_millis()))
    }

    async fn bootstrap_checkpoint(
        &self,
        key: &str,
        candidate: LogPosition,
        ttl: Duration,
    ) -> Result<LogPosition, RepoError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut state = mutex_lock(&self.state, SOURCE, "bootstrap_checkpoint");

        if let Some(stored) = state.checkpoints.get(key) {
            if stored.expires_at <= now {
                debug!(key, position = %stored.position, "resuming from a stale checkpoint");
            }
            return Ok(stored.position);
        }
        state.checkpoints.insert(
            key.to_string(),
            StoredCheckpoint {
                position: candidate,
                expires_at: now + ttl,
            },
        );
        Ok(candidate)
    }

    async fn read_after(
        &self,
        after: LogPosition,
        block_for: Duration,
    ) -> Result<Option<PurgeEntry>, RepoError> {
        self.ensure_available()?;
        let deadline = tokio::time::Instant::now() + block_for;

        loop {
            // Register interest before checking so an append in between is not missed.
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(entry) = self.first_after(after) {
                return Ok(Some(entry));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
            self.ensure_available()?;
        }
    }

    async fn advance_checkpoint(
        &self,
        key: &str,
        position: LogPosition,
        ttl: Duration,
    ) -> Result<(), RepoError> {
        self.ensure_available()?;
        let expires_at = Instant::now() + ttl;
        let mut state = mutex_lock(&self.state, SOURCE, "advance_checkpoint");

        let stored = state
            .checkpoints
            .entry(key.to_string())
            .or_insert(StoredCheckpoint {
                position,
                expires_at,
            });
        stored.position = stored.position.max(position);
        stored.expires_at = expires_at;
        Ok(())
    }

    async fn load_checkpoint(&self, key: &str) -> Result<Option<LogPosition>, RepoError> {
        self.ensure_available()?;
        let state = mutex_lock(&self.state, SOURCE, "load_checkpoint");
        Ok(state.checkpoints.get(key).map(|stored| stored.position))
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.ensure_available()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn positions_strictly_increase() {
        let log = MemoryPurgeLog::new();
        let a = log.append_at("http://example.com/a", 5_000);
        let b = log.append_at("http://example.com/b", 5_000);
        let c = log.append_at("http://example.com/c", 4_000);
        let d = log.append_at("http://example.com/d", 6_000);

        assert!(a < b && b < c && c < d);
        assert_eq!(log.len(), 4);
    }

    #[tokio::test]
    async fn bootstrap_keeps_the_first_value() {
        let log = MemoryPurgeLog::new();
        let first = log
            .bootstrap_checkpoint("k", LogPosition::new(1_000, 0), TTL)
            .await
            .expect("bootstrap");
        let second = log
            .bootstrap_checkpoint("k", LogPosition::new(9_000, 0), TTL)
            .await
            .expect("bootstrap");

        assert_eq!(first, LogPosition::new(1_000, 0));
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn stale_checkpoint_survives_bootstrap() {
        let log = MemoryPurgeLog::new();
        log.advance_checkpoint("k", LogPosition::new(5_000, 1), Duration::ZERO)
            .await
            .expect("advance");
        assert_eq!(
            log.load_checkpoint("k").await.expect("load"),
            Some(LogPosition::new(5_000, 1))
        );

        let resumed = log
            .bootstrap_checkpoint("k", LogPosition::new(9_000, 0), TTL)
            .await
            .expect("bootstrap");
        assert_eq!(resumed, LogPosition::new(5_000, 1));
    }

    #[tokio::test]
    async fn advance_never_moves_backwards() {
        let log = MemoryPurgeLog::new();
        log.advance_checkpoint("k", LogPosition::new(5_000, 3), TTL)
            .await
            .expect("advance");
        log.advance_checkpoint("k", LogPosition::new(5_000, 1), TTL)
            .await
            .expect("advance");

        assert_eq!(
            log.load_checkpoint("k").await.expect("load"),
            Some(LogPosition::new(5_000, 3))
        );
    }

    #[tokio::test]
    async fn read_after_wakes_on_append() {
        let log = Arc::new(MemoryPurgeLog::new());
        let reader = log.clone();

        let handle = tokio::spawn(async move {
            reader
                .read_after(LogPosition::ZERO, Duration::from_secs(5))
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let position = log.append_at("http://example.com/a", 1_000);

        let entry = handle
            .await
            .expect("reader joins")
            .expect("read")
            .expect("entry");
        assert_eq!(entry.position, position);
    }

    #[tokio::test]
    async fn read_after_times_out_empty() {
        let log = MemoryPurgeLog::new();
        log.append_at("http://example.com/a", 1_000);

        let entry = log
            .read_after(LogPosition::new(1_000, 0), Duration::from_millis(10))
            .await
            .expect("read");
        assert!(entry.is_none());
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let log = MemoryPurgeLog::new();
        log.set_available(false);

        assert!(log.append("http://example.com/a").await.is_err());
        assert!(log.ping().await.is_err());
        assert!(
            log.read_after(LogPosition::ZERO, Duration::ZERO)
                .await
                .is_err()
        );
    }
}
