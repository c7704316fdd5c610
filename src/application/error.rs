use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{config::LoadError, infra::error::InfraError};

/// Diagnostic attached to error responses and picked up by the response logger.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn from_message(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            source,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Plain-text error response; the public body is the canonical status text.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(source: &'static str, status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            report: ErrorReport::from_message(source, detail),
        }
    }

    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        Self {
            status,
            report: ErrorReport::from_error(source, error),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = self.status.canonical_reason().unwrap_or("Error");
        let mut response = (self.status, body).into_response();
        self.report.attach(&mut response);
        response
    }
}

/// Process exit codes for startup failures.
pub mod exit_code {
    pub const UNEXPECTED: i32 = 1;
    pub const LOAD_CONFIG: i32 = 3;
    pub const DIAL_STORE: i32 = 4;
    pub const BIND: i32 = 5;
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error("failed to dial the purge store: {0}")]
    Store(#[source] InfraError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => exit_code::LOAD_CONFIG,
            AppError::Store(_) => exit_code::DIAL_STORE,
            AppError::Bind { .. } => exit_code::BIND,
            AppError::Infra(_) | AppError::Unexpected(_) => exit_code::UNEXPECTED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_failures_have_distinct_exit_codes() {
        let config = AppError::from(LoadError::invalid("queue.consumer_id", "must be set"));
        let store = AppError::Store(InfraError::database("connection refused"));
        let bind = AppError::Bind {
            addr: "127.0.0.1:80".parse().expect("addr"),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        let other = AppError::unexpected("boom");

        assert_eq!(config.exit_code(), exit_code::LOAD_CONFIG);
        assert_eq!(store.exit_code(), exit_code::DIAL_STORE);
        assert_eq!(bind.exit_code(), exit_code::BIND);
        assert_eq!(other.exit_code(), exit_code::UNEXPECTED);
    }

    #[test]
    fn report_collects_error_chain() {
        let err = AppError::Store(InfraError::database("connection refused"));
        let report = ErrorReport::from_error("test", &err);

        assert_eq!(report.messages.len(), 2);
        assert!(report.messages[1].contains("connection refused"));
    }

    #[test]
    fn http_error_body_is_status_text_and_report_is_attached() {
        let response =
            HttpError::new("test", StatusCode::UNAUTHORIZED, "bad credentials").into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.source, "test");
        assert_eq!(report.messages, vec!["bad credentials".to_string()]);
    }
}
