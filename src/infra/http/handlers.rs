use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::ingress::IngressError;

use super::HttpState;

const SOURCE: &str = "infra::http::handlers";

/// Body of `POST /purge`; shared with the command-line client.
#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeRequest {
    pub url: String,
}

/// `POST /purge`.
pub async fn purge(State(state): State<HttpState>, body: Bytes) -> Result<StatusCode, HttpError> {
    let payload: PurgeRequest = serde_json::from_slice(&body).map_err(|err| {
        HttpError::from_error(SOURCE, StatusCode::UNPROCESSABLE_ENTITY, &err)
    })?;

    match state.ingress.submit(&payload.url).await {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(err @ IngressError::InvalidUrl(_)) => Err(HttpError::from_error(
            SOURCE,
            StatusCode::UNPROCESSABLE_ENTITY,
            &err,
        )),
        Err(err @ IngressError::Unavailable(_)) => Err(HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            &err,
        )),
    }
}

/// `GET /health`: 204 while the store answers, 503 otherwise.
pub async fn health(State(state): State<HttpState>) -> Response {
    match state.ingress.queue().ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error("infra::http::health", &err).attach(&mut response);
            response
        }
    }
}
