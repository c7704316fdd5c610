use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::application::error::HttpError;
use crate::util::safe;

use super::HttpState;

const SOURCE: &str = "infra::http::auth";
const CHALLENGE: &str = "Basic realm=\"purgery\"";

/// HTTP Basic auth where the username carries the API key and the password is
/// ignored.
pub async fn basic_auth(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let username = basic_username(request.headers().get(header::AUTHORIZATION));

    match username {
        Some(username) if safe::compare(&state.api_key, &username) => next.run(request).await,
        Some(_) => unauthorized("api key mismatch"),
        None => unauthorized("missing or malformed basic credentials"),
    }
}

fn unauthorized(detail: &'static str) -> Response {
    let mut response = HttpError::new(SOURCE, StatusCode::UNAUTHORIZED, detail).into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static(CHALLENGE),
    );
    response
}

fn basic_username(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let (scheme, encoded) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (username, _password) = credentials.split_once(':')?;
    Some(username.to_string())
}
