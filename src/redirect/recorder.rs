//! Visit recording shared by the redirect server and the redirect API

use anyhow::Result;
use axum::http::{
    header::{REFERER, USER_AGENT},
    HeaderMap,
};
use std::net::IpAddr;
use tracing::debug;

use crate::analytics::extract_client_ip;
use crate::config::ClientIpConfig;
use crate::models::{ClickMetadata, ClickOutcome, ShortLink};
use crate::storage::{unix_now, NewClick, Storage};

fn header_string(headers: &HeaderMap, name: impl axum::http::header::AsHeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Capture client IP, user-agent and referer. Missing headers become empty
/// strings.
pub fn click_metadata(headers: &HeaderMap, socket_ip: IpAddr, config: &ClientIpConfig) -> ClickMetadata {
    ClickMetadata {
        ip_address: extract_client_ip(headers, socket_ip, config).to_string(),
        user_agent: header_string(headers, USER_AGENT),
        referer: header_string(headers, REFERER),
    }
}

/// Resolve `slug` and record one visit to it. `Ok(None)` when the slug is
/// unknown, in which case nothing is written.
pub async fn record_visit(
    storage: &dyn Storage,
    slug: &str,
    metadata: ClickMetadata,
) -> Result<Option<(ShortLink, ClickOutcome)>> {
    let Some(link) = storage.get_link(slug).await? else {
        return Ok(None);
    };

    let click = NewClick {
        link_id: link.id,
        owner_id: link.user_id,
        metadata,
        created_at: unix_now()?,
    };

    let outcome = storage.record_click(&click).await?;
    debug!(
        slug = %link.slug,
        unique = outcome.unique,
        earnings_micros = outcome.earnings_micros,
        "recorded visit"
    );

    Ok(Some((link, outcome)))
}
