#![deny(clippy::all, clippy::pedantic)]

use std::fs;

use purgery::infra::http::PurgeRequest;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

use crate::args::Cli;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("api URL is required (use --api or PURGERY_API_URL)")]
    MissingApi,
    #[error("api key is required (use --key-file or PURGERY_API_KEY)")]
    MissingKey,
    #[error("failed to read key file: {0}")]
    KeyFile(std::io::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("internal server error")]
    InternalServerError,
    #[error("ingress is unhealthy")]
    Unhealthy,
    #[error("unexpected status code: {0}")]
    UnexpectedStatus(u16),
}

#[derive(Clone, Debug)]
pub struct Ctx {
    pub client: Client,
    pub root: String,
    pub key: String,
}

impl Ctx {
    pub fn new(api: &str, key: String) -> Result<Self, CliError> {
        let root = api.trim_end_matches('/').to_string();
        Url::parse(&root)?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self { client, root, key })
    }

    pub fn user_agent() -> &'static str {
        concat!("purgery-cli/", env!("CARGO_PKG_VERSION"))
    }

    pub fn url(&self, path: &str) -> Result<Url, CliError> {
        Url::parse(&format!("{}{path}", self.root)).map_err(CliError::Url)
    }

    /// Queue `url` for purging. The key travels as the Basic-auth username.
    pub async fn purge(&self, url: &str) -> Result<(), CliError> {
        let body = PurgeRequest {
            url: url.to_string(),
        };
        let resp = self
            .client
            .post(self.url("/purge")?)
            .basic_auth(&self.key, Some(""))
            .json(&body)
            .send()
            .await?;

        match resp.status() {
            StatusCode::NO_CONTENT => Ok(()),
            StatusCode::UNPROCESSABLE_ENTITY => Err(CliError::InvalidUrl(url.to_string())),
            StatusCode::INTERNAL_SERVER_ERROR => Err(CliError::InternalServerError),
            other => Err(CliError::UnexpectedStatus(other.as_u16())),
        }
    }

    pub async fn health(&self) -> Result<(), CliError> {
        let resp = self.client.get(self.url("/health")?).send().await?;

        match resp.status() {
            StatusCode::NO_CONTENT => Ok(()),
            StatusCode::SERVICE_UNAVAILABLE => Err(CliError::Unhealthy),
            other => Err(CliError::UnexpectedStatus(other.as_u16())),
        }
    }
}

pub fn build_ctx_from_cli(cli: &Cli) -> Result<Ctx, CliError> {
    let api = cli.api.clone().ok_or(CliError::MissingApi)?;
    let key = if let Some(path) = &cli.key_file {
        fs::read_to_string(path)
            .map_err(CliError::KeyFile)?
            .trim()
            .to_string()
    } else {
        cli.api_key_env.clone().ok_or(CliError::MissingKey)?
    };

    Ctx::new(&api, key)
}
