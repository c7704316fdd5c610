//! Producer side: validate purge requests and hand them to the queue.

use thiserror::Error;
use tracing::warn;

use crate::domain::error::DomainError;
use crate::domain::position::LogPosition;
use crate::domain::purge::parse_purge_url;

use super::queue::PurgeQueue;
use super::repos::RepoError;

#[derive(Debug, Error)]
pub enum IngressError {
    #[error(transparent)]
    InvalidUrl(#[from] DomainError),
    #[error("purge queue unavailable: {0}")]
    Unavailable(#[from] RepoError),
}

#[derive(Clone)]
pub struct PurgeIngress {
    queue: PurgeQueue,
}

impl PurgeIngress {
    pub fn new(queue: PurgeQueue) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &PurgeQueue {
        &self.queue
    }

    /// Validate `raw_url` and append it exactly as submitted.
    pub async fn submit(&self, raw_url: &str) -> Result<LogPosition, IngressError> {
        parse_purge_url(raw_url)?;

        self.queue.enqueue(raw_url).await.map_err(|err| {
            warn!(url = raw_url, error = %err, "failed to enqueue purge");
            IngressError::Unavailable(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::application::queue::QueueOptions;
    use crate::application::repos::PurgeLogRepo;
    use crate::infra::memory::MemoryPurgeLog;

    fn ingress(log: Arc<MemoryPurgeLog>) -> PurgeIngress {
        let options = QueueOptions {
            namespace: "purgery".to_string(),
            consumer_id: "test".to_string(),
            block_for: Duration::from_millis(10),
            checkpoint_ttl: Duration::from_secs(60),
        };
        PurgeIngress::new(PurgeQueue::new(log, &options))
    }

    #[tokio::test]
    async fn malformed_urls_never_reach_the_log() {
        let log = Arc::new(MemoryPurgeLog::new());
        let ingress = ingress(log.clone());

        let err = ingress.submit("not-a-url").await.expect_err("rejected");
        assert!(matches!(err, IngressError::InvalidUrl(_)));
        assert_eq!(log.len(), 0);
    }

    #[tokio::test]
    async fn unavailable_store_is_reported_distinctly() {
        let log = Arc::new(MemoryPurgeLog::new());
        log.set_available(false);
        let ingress = ingress(log);

        let err = ingress
            .submit("http://example.com/a")
            .await
            .expect_err("store down");
        assert!(matches!(err, IngressError::Unavailable(_)));
    }

    #[tokio::test]
    async fn valid_urls_are_appended_once() {
        let log = Arc::new(MemoryPurgeLog::new());
        let ingress = ingress(log.clone());

        ingress.submit("http://x/y").await.expect("accepted");
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn submitted_url_is_logged_verbatim() {
        let log = Arc::new(MemoryPurgeLog::new());
        let ingress = ingress(log.clone());

        let position = ingress
            .submit("http://Example.COM")
            .await
            .expect("accepted");
        let entry = log
            .read_after(LogPosition::ZERO, Duration::ZERO)
            .await
            .expect("read")
            .expect("entry");

        assert_eq!(entry.position, position);
        assert_eq!(entry.url, "http://Example.COM");
    }
}
