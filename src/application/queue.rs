//! Queue facade over the purge log and a single consumer's checkpoint.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::domain::position::LogPosition;
use crate::domain::purge::PurgeEntry;

use super::repos::{PurgeLogRepo, RepoError};

const METRIC_ENQUEUED_TOTAL: &str = "purgery_enqueued_total";

/// Timing knobs for one consumer identity.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub namespace: String,
    pub consumer_id: String,
    pub block_for: Duration,
    pub checkpoint_ttl: Duration,
}

/// The handle the ingress and the worker share.
///
/// `next` and `store` are used as a pair: only store positions that `next`
/// returned, and store after every successful purge or the entry will be
/// delivered again.
#[derive(Clone)]
pub struct PurgeQueue {
    repo: Arc<dyn PurgeLogRepo>,
    checkpoint_key: Arc<str>,
    block_for: Duration,
    checkpoint_ttl: Duration,
}

impl PurgeQueue {
    pub fn new(repo: Arc<dyn PurgeLogRepo>, options: &QueueOptions) -> Self {
        Self {
            repo,
            checkpoint_key: checkpoint_key(&options.namespace, &options.consumer_id).into(),
            block_for: options.block_for,
            checkpoint_ttl: options.checkpoint_ttl,
        }
    }

    pub fn checkpoint_key(&self) -> &str {
        &self.checkpoint_key
    }

    #[instrument(skip(self))]
    pub async fn enqueue(&self, url: &str) -> Result<LogPosition, RepoError> {
        let position = self.repo.append(url).await?;
        counter!(METRIC_ENQUEUED_TOTAL).increment(1);
        debug!(%position, "purge enqueued");
        Ok(position)
    }

    /// Initialise the checkpoint to the current second if none is stored and
    /// return the stored value.
    pub async fn bootstrap(&self) -> Result<LogPosition, RepoError> {
        let candidate = LogPosition::bootstrap_at(OffsetDateTime::now_utc());
        self.repo
            .bootstrap_checkpoint(&self.checkpoint_key, candidate, self.checkpoint_ttl)
            .await
    }

    /// Next entry after the checkpoint, or `None` once `block_for` elapses.
    pub async fn next(&self) -> Result<Option<PurgeEntry>, RepoError> {
        let checkpoint = self.bootstrap().await?;
        self.repo.read_after(checkpoint, self.block_for).await
    }

    /// Commit `position` as this consumer's checkpoint.
    pub async fn store(&self, position: LogPosition) -> Result<(), RepoError> {
        self.repo
            .advance_checkpoint(&self.checkpoint_key, position, self.checkpoint_ttl)
            .await
    }

    pub async fn checkpoint(&self) -> Result<Option<LogPosition>, RepoError> {
        self.repo.load_checkpoint(&self.checkpoint_key).await
    }

    pub async fn ping(&self) -> Result<(), RepoError> {
        self.repo.ping().await
    }
}

pub fn checkpoint_key(namespace: &str, consumer_id: &str) -> String {
    format!("{namespace}:checkpoints:{consumer_id}")
}
