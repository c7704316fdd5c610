//! Ingress HTTP surface: `POST /purge` and `GET /health`.

mod auth;
mod handlers;
mod middleware;

pub use handlers::PurgeRequest;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::ingress::PurgeIngress;

#[derive(Clone)]
pub struct HttpState {
    pub ingress: PurgeIngress,
    pub api_key: Arc<str>,
}

impl HttpState {
    pub fn new(ingress: PurgeIngress, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            ingress,
            api_key: api_key.into(),
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    let purge_routes = Router::new()
        .route("/purge", post(handlers::purge))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::basic_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(purge_routes)
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
