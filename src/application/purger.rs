//! Contract for the component that evicts a URL from the cache nodes.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum PurgeError {
    /// The cache node could not be reached or the exchange timed out.
    #[error("purge transport failed: {0}")]
    Transport(String),
    /// The cache node answered with a non-2xx status.
    #[error("purge rejected with status code {0}")]
    Status(u16),
}

#[async_trait]
pub trait Purger: Send + Sync {
    /// Evict `url`. Implementations must bound the time spent per call.
    async fn purge(&self, url: &Url) -> Result<(), PurgeError>;
}
