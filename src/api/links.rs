use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::models::{CreateUrlRequest, LinkUpdate, ShortLink, UpdateUrlRequest};
use crate::storage::StorageError;

use super::error::{
    bad_request, forbidden, internal, json_body, not_found, ApiResult, SuccessResponse,
};
use super::AppState;

const SLUG_LEN: usize = 7;
const SLUG_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SLUG_TAKEN: &str = "This short URL is already taken";

/// Random 7-character alphanumeric slug
pub fn generate_slug() -> String {
    std::iter::repeat_with(|| SLUG_ALPHABET[rand::random_range(0..SLUG_ALPHABET.len())] as char)
        .take(SLUG_LEN)
        .collect()
}

/// Lowercase, with every run of non-alphanumeric characters collapsed to a
/// single `-` and no leading or trailing dashes
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Only absolute http(s) URLs are accepted as destinations
pub fn validate_destination(raw: &str) -> Result<String, &'static str> {
    let parsed = url::Url::parse(raw.trim()).map_err(|_| "Invalid URL")?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(raw.trim().to_string()),
        _ => Err("URL must use http or https"),
    }
}

/// Load a link and check that `user` owns it
async fn owned_link(state: &AppState, slug: &str, user: AuthenticatedUser) -> ApiResult<ShortLink> {
    match state.storage.get_link(slug).await {
        Ok(Some(link)) if link.user_id == user.id => Ok(link),
        Ok(Some(_)) => Err(forbidden()),
        Ok(None) => Err(not_found("URL not found")),
        Err(e) => Err(internal("Failed to fetch URL", e)),
    }
}

pub async fn list_urls(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<ShortLink>>> {
    state
        .storage
        .list_links(user.id)
        .await
        .map(Json)
        .map_err(|e| internal("Failed to fetch URLs", e))
}

pub async fn create_url(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateUrlRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ShortLink>)> {
    let payload = json_body(payload)?;

    let original_url = match payload.original_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => validate_destination(url).map_err(bad_request)?,
        _ => return Err(bad_request("Original URL is required")),
    };

    let slug = match payload.custom_slug.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(custom) => {
            let slug = slugify(custom);
            if slug.is_empty() {
                return Err(bad_request("Custom short URL must contain letters or digits"));
            }
            slug
        }
        None => generate_slug(),
    };

    match state.storage.create_link(&slug, &original_url, user.id).await {
        Ok(link) => {
            info!("User {} created short link {}", user.id, link.slug);
            Ok((StatusCode::CREATED, Json(link)))
        }
        Err(StorageError::Conflict) => Err(bad_request(SLUG_TAKEN)),
        Err(e) => Err(internal("Failed to create URL", e)),
    }
}

pub async fn get_url(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ShortLink>> {
    owned_link(&state, &slug, user).await.map(Json)
}

pub async fn update_url(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(slug): Path<String>,
    payload: Result<Json<UpdateUrlRequest>, JsonRejection>,
) -> ApiResult<Json<ShortLink>> {
    let payload = json_body(payload)?;
    owned_link(&state, &slug, user).await?;

    let original_url = match payload.original_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Some(validate_destination(url).map_err(bad_request)?),
        _ => None,
    };

    let new_slug = match payload.short_url.as_deref().map(str::trim) {
        Some(requested) if !requested.is_empty() && requested != slug => {
            let normalized = slugify(requested);
            if normalized.is_empty() {
                return Err(bad_request("Custom short URL must contain letters or digits"));
            }
            Some(normalized)
        }
        _ => None,
    };

    let update = LinkUpdate {
        original_url,
        slug: new_slug,
    };

    match state.storage.update_link(&slug, &update).await {
        Ok(link) => Ok(Json(link)),
        Err(StorageError::Conflict) => Err(bad_request(SLUG_TAKEN)),
        Err(StorageError::NotFound) => Err(not_found("URL not found")),
        Err(e) => Err(internal("Failed to update URL", e)),
    }
}

pub async fn delete_url(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(slug): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    owned_link(&state, &slug, user).await?;

    match state.storage.delete_link(&slug).await {
        Ok(true) => {
            info!("User {} deleted short link {}", user.id, slug);
            Ok(SuccessResponse::new("URL deleted successfully"))
        }
        Ok(false) => Err(not_found("URL not found")),
        Err(e) => Err(internal("Failed to delete URL", e)),
    }
}
