use axum::{
    extract::{ConnectInfo, Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::ClientIpConfig;
use crate::redirect::recorder::{click_metadata, record_visit};
use crate::storage::Storage;

use super::error::{internal, not_found, ApiResult};

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub client_ip: ClientIpConfig,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectTarget {
    pub original_url: String,
    pub short_url: String,
}

/// Record a visit and return the destination instead of redirecting
pub async fn resolve_redirect(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> ApiResult<Json<RedirectTarget>> {
    let metadata = click_metadata(&headers, addr.ip(), &state.client_ip);

    match record_visit(state.storage.as_ref(), &slug, metadata).await {
        Ok(Some((link, _))) => Ok(Json(RedirectTarget {
            original_url: link.original_url,
            short_url: link.slug,
        })),
        Ok(None) => Err(not_found("URL not found")),
        Err(e) => Err(internal("Failed to process redirect", e)),
    }
}
