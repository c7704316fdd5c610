//! Repository traits describing persistence adapters.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::position::LogPosition;
use crate::domain::purge::PurgeEntry;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Durable purge log plus the per-consumer checkpoints that track it.
///
/// Implementations must serialize conflicting operations themselves; a single
/// instance is shared by the ingress and the worker.
#[async_trait]
pub trait PurgeLogRepo: Send + Sync {
    /// Append `url` and return the position assigned to it.
    async fn append(&self, url: &str) -> Result<LogPosition, RepoError>;

    /// Store `candidate` under `key` unless a checkpoint already exists, then
    /// return whichever value is stored. Atomic across processes. Expiry is a
    /// liveness hint only: a stale checkpoint is still returned unchanged.
    async fn bootstrap_checkpoint(
        &self,
        key: &str,
        candidate: LogPosition,
        ttl: Duration,
    ) -> Result<LogPosition, RepoError>;

    /// Return the first entry positioned strictly after `after`, waiting up to
    /// `block_for` for one to be appended.
    async fn read_after(
        &self,
        after: LogPosition,
        block_for: Duration,
    ) -> Result<Option<PurgeEntry>, RepoError>;

    /// Move the checkpoint under `key` forward to `position` and refresh its
    /// expiry. A position behind the stored one only refreshes the expiry.
    async fn advance_checkpoint(
        &self,
        key: &str,
        position: LogPosition,
        ttl: Duration,
    ) -> Result<(), RepoError>;

    /// Checkpoint stored under `key`, if any, regardless of expiry.
    async fn load_checkpoint(&self, key: &str) -> Result<Option<LogPosition>, RepoError>;

    async fn ping(&self) -> Result<(), RepoError>;
}
