use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ClientIpConfig;
use crate::storage::Storage;

use super::handlers::{health_check, redirect_url, RedirectState};

pub fn create_redirect_router(storage: Arc<dyn Storage>, client_ip: ClientIpConfig) -> Router {
    let state = Arc::new(RedirectState { storage, client_ip });

    Router::new()
        .route("/", get(health_check))
        .route("/{slug}", get(redirect_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
