//! HTTP `PURGE` executor aimed at a single cache node.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, header::HOST};
use tracing::debug;
use url::Url;

use crate::application::purger::{PurgeError, Purger};

use super::error::InfraError;

#[derive(Debug, Clone)]
pub struct HttpPurgerOptions {
    /// `host:port` of the cache node every purge is sent to.
    pub cache_addr: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

/// Sends `PURGE <path>` to the cache node, carrying the purged URL's host in
/// the `Host` header so the node can locate the cached object.
#[derive(Clone)]
pub struct HttpPurger {
    client: Client,
    base: Url,
}

impl HttpPurger {
    pub fn new(options: &HttpPurgerOptions) -> Result<Self, InfraError> {
        let base = Url::parse(&format!("http://{}/", options.cache_addr)).map_err(|err| {
            InfraError::configuration(format!(
                "invalid cache node address `{}`: {err}",
                options.cache_addr
            ))
        })?;

        let client = Client::builder()
            .user_agent(concat!("purgery/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build http client: {err}"))
            })?;

        Ok(Self { client, base })
    }

    fn target(&self, url: &Url) -> Url {
        let mut target = self.base.clone();
        target.set_path(url.path());
        target.set_query(url.query());
        target
    }
}

fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[async_trait]
impl Purger for HttpPurger {
    async fn purge(&self, url: &Url) -> Result<(), PurgeError> {
        let method = Method::from_bytes(b"PURGE")
            .map_err(|err| PurgeError::Transport(err.to_string()))?;
        let target = self.target(url);

        let mut request = self.client.request(method, target);
        if let Some(host) = host_header(url) {
            request = request.header(HOST, host);
        }

        let response = request
            .send()
            .await
            .map_err(|err| PurgeError::Transport(err.to_string()))?;
        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "cache node answered purge");

        if status.is_success() {
            Ok(())
        } else {
            Err(PurgeError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    fn purger(server: &MockServer) -> HttpPurger {
        HttpPurger::new(&HttpPurgerOptions {
            cache_addr: server.address().to_string(),
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(2),
        })
        .expect("purger")
    }

    #[tokio::test]
    async fn sends_purge_to_the_cache_node_with_original_host() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.path("/assets/app.js")
                    .query_param("v", "3")
                    .header("host", "example.com");
                then.status(200);
            })
            .await;

        let url = Url::parse("http://example.com/assets/app.js?v=3").expect("url");
        purger(&server).purge(&url).await.expect("purged");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/a");
                then.status(405);
            })
            .await;

        let url = Url::parse("http://example.com/a").expect("url");
        let err = purger(&server).purge(&url).await.expect_err("rejected");
        assert!(matches!(err, PurgeError::Status(405)));
    }

    #[tokio::test]
    async fn unreachable_node_is_a_transport_error() {
        let purger = HttpPurger::new(&HttpPurgerOptions {
            cache_addr: "127.0.0.1:1".to_string(),
            connect_timeout: Duration::from_millis(200),
            request_timeout: Duration::from_millis(500),
        })
        .expect("purger");

        let url = Url::parse("http://example.com/a").expect("url");
        let err = purger.purge(&url).await.expect_err("unreachable");
        assert!(matches!(err, PurgeError::Transport(_)));
    }

    #[test]
    fn rejects_invalid_cache_addresses() {
        let result = HttpPurger::new(&HttpPurgerOptions {
            cache_addr: "not a host:port".to_string(),
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
        });
        assert!(result.is_err());
    }
}
