use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header::HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::ClientIpConfig;
use crate::storage::Storage;

use super::recorder::{click_metadata, record_visit};

pub struct RedirectState {
    pub storage: Arc<dyn Storage>,
    pub client_ip: ClientIpConfig,
}

/// Record the visit and redirect to the destination
pub async fn redirect_url(
    State(state): State<Arc<RedirectState>>,
    Path(slug): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let metadata = click_metadata(&headers, addr.ip(), &state.client_ip);

    match record_visit(state.storage.as_ref(), &slug, metadata).await {
        Ok(Some((link, _))) => Redirect::temporary(&link.original_url).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "URL not found").into_response(),
        Err(e) => {
            tracing::error!(slug = %slug, error = %e, "failed to process redirect");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
