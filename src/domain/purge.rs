use url::Url;

use super::error::DomainError;
use super::position::LogPosition;

/// An entry read back from the purge log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeEntry {
    pub position: LogPosition,
    pub url: String,
}

/// Parse `raw` as an absolute `http` URL with a host.
///
/// Both the ingress and the worker gate on this; the worker drops entries
/// that fail it instead of retrying them.
pub fn parse_purge_url(raw: &str) -> Result<Url, DomainError> {
    let url = Url::parse(raw).map_err(|err| DomainError::invalid_url(raw, err.to_string()))?;

    if url.scheme() != "http" {
        return Err(DomainError::invalid_url(
            raw,
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(DomainError::invalid_url(raw, "missing host")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_absolute_http_urls() {
        for raw in [
            "http://example.com/a",
            "http://x/y",
            "http://example.com:8080/assets/app.js?v=3",
            "http://127.0.0.1/",
        ] {
            assert!(parse_purge_url(raw).is_ok(), "{raw} should be accepted");
        }
    }

    #[test]
    fn rejects_everything_else() {
        for raw in [
            "",
            "not-a-url",
            "/relative/path",
            "https://example.com/a",
            "ftp://example.com/a",
            "mailto:ops@example.com",
        ] {
            assert!(parse_purge_url(raw).is_err(), "{raw} should be rejected");
        }
    }
}
