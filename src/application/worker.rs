//! Purge worker: polls the queue, purges each entry and commits the checkpoint.
//!
//! Retries are implicit. A failed purge leaves the checkpoint where it was, so
//! the next poll reads the same entry again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{debug, error, info, warn};

use crate::domain::position::LogPosition;
use crate::domain::purge::parse_purge_url;
use crate::shutdown::Shutdown;

use super::purger::Purger;
use super::queue::PurgeQueue;

const METRIC_PURGE_TOTAL: &str = "purgery_purge_total";
const METRIC_DROPPED_TOTAL: &str = "purgery_dropped_total";
const METRIC_PURGE_MS: &str = "purgery_purge_ms";

/// Result of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing arrived within the blocking window.
    Empty,
    /// Entry purged and checkpoint committed.
    Purged(LogPosition),
    /// Malformed entry skipped and checkpoint committed.
    Dropped(LogPosition),
    /// Store or purge failure; the checkpoint did not move.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Polling,
    Backoff,
}

pub struct PurgeWorker {
    queue: PurgeQueue,
    purger: Arc<dyn Purger>,
    backoff: Duration,
}

impl PurgeWorker {
    pub fn new(queue: PurgeQueue, purger: Arc<dyn Purger>, backoff: Duration) -> Self {
        Self {
            queue,
            purger,
            backoff,
        }
    }

    /// Run until `shutdown` fires. Work in flight at that point is abandoned.
    pub async fn run(self, shutdown: Shutdown) {
        info!(
            checkpoint_key = self.queue.checkpoint_key(),
            "purge worker started"
        );

        let mut state = WorkerState::Polling;
        while !shutdown.is_triggered() {
            state = match state {
                WorkerState::Polling => {
                    let outcome = tokio::select! {
                        _ = shutdown.wait() => break,
                        outcome = self.poll_once() => outcome,
                    };
                    match outcome {
                        PollOutcome::Failed => WorkerState::Backoff,
                        _ => WorkerState::Polling,
                    }
                }
                WorkerState::Backoff => {
                    tokio::select! {
                        _ = shutdown.wait() => break,
                        _ = tokio::time::sleep(self.backoff) => WorkerState::Polling,
                    }
                }
            };
        }

        info!("purge worker stopped");
    }

    pub async fn poll_once(&self) -> PollOutcome {
        let entry = match self.queue.next().await {
            Ok(Some(entry)) => entry,
            Ok(None) => return PollOutcome::Empty,
            Err(err) => {
                error!(error = %err, "failed to read the purge log");
                return PollOutcome::Failed;
            }
        };

        let url = match parse_purge_url(&entry.url) {
            Ok(url) => url,
            Err(err) => {
                warn!(
                    position = %entry.position,
                    url = %entry.url,
                    error = %err,
                    "dropping malformed purge entry"
                );
                counter!(METRIC_DROPPED_TOTAL).increment(1);
                return self.commit(entry.position, PollOutcome::Dropped(entry.position)).await;
            }
        };

        let started_at = Instant::now();
        let result = self.purger.purge(&url).await;
        histogram!(METRIC_PURGE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(()) => {
                counter!(METRIC_PURGE_TOTAL, "outcome" => "success").increment(1);
                debug!(position = %entry.position, url = %url, "purged");
                self.commit(entry.position, PollOutcome::Purged(entry.position)).await
            }
            Err(err) => {
                counter!(METRIC_PURGE_TOTAL, "outcome" => "failure").increment(1);
                warn!(
                    position = %entry.position,
                    url = %url,
                    error = %err,
                    "purge failed; entry will be retried"
                );
                PollOutcome::Failed
            }
        }
    }

    async fn commit(&self, position: LogPosition, outcome: PollOutcome) -> PollOutcome {
        match self.queue.store(position).await {
            Ok(()) => outcome,
            Err(err) => {
                error!(%position, error = %err, "failed to store checkpoint");
                PollOutcome::Failed
            }
        }
    }
}
