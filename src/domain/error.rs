use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid log position `{value}`")]
    InvalidPosition { value: String },
    #[error("invalid purge url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl DomainError {
    pub fn invalid_position(value: impl Into<String>) -> Self {
        Self::InvalidPosition {
            value: value.into(),
        }
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
