pub mod api_key;
pub mod password;

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::api::error::ErrorResponse;
use crate::config::AuthMode;
use crate::storage::Storage;

pub use api_key::{generate_api_key, hash_api_key};
pub use password::{hash_password, verify_password};

/// Identity of the caller, inserted into request extensions by [`auth_middleware`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i64,
}

pub struct AuthService {
    mode: AuthMode,
    storage: Arc<dyn Storage>,
}

impl AuthService {
    pub fn new(mode: AuthMode, storage: Arc<dyn Storage>) -> Self {
        Self { mode, storage }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Resolve the caller from request headers. `Ok(None)` means the request
    /// carries no valid credentials.
    pub async fn authenticate(&self, headers: &HeaderMap) -> anyhow::Result<Option<AuthenticatedUser>> {
        match self.mode {
            AuthMode::ApiKey => {
                let Some(key) = presented_api_key(headers) else {
                    return Ok(None);
                };
                if !api_key::is_well_formed(key) {
                    return Ok(None);
                }
                let user = self.storage.find_user_by_api_key(&hash_api_key(key)).await?;
                Ok(user.map(|u| AuthenticatedUser { id: u.id }))
            }
            AuthMode::None => {
                let Some(id) = headers
                    .get("x-user-id")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.trim().parse::<i64>().ok())
                else {
                    return Ok(None);
                };
                let user = self.storage.get_user(id).await?;
                Ok(user.map(|u| AuthenticatedUser { id: u.id }))
            }
        }
    }
}

/// `Authorization: Bearer <key>` takes precedence over `X-API-Key`
fn presented_api_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer.or_else(|| {
        headers
            .get("x-api-key")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
    })
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("Unauthorized")),
    )
        .into_response()
}

pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_service.authenticate(&headers).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => {
            debug!("Rejected unauthenticated request to {}", request.uri().path());
            unauthorized()
        }
        Err(e) => {
            error!("Failed to authenticate request: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal server error")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_preferred_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer sk_one"));
        headers.insert("x-api-key", HeaderValue::from_static("sk_two"));
        assert_eq!(presented_api_key(&headers), Some("sk_one"));
    }

    #[test]
    fn test_x_api_key_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        headers.insert("x-api-key", HeaderValue::from_static("sk_two"));
        assert_eq!(presented_api_key(&headers), Some("sk_two"));
    }

    #[test]
    fn test_no_credentials() {
        assert_eq!(presented_api_key(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_header_identity_mode() {
        let storage = crate::storage::SqliteStorage::new("sqlite::memory:", 1)
            .await
            .unwrap();
        storage.init().await.unwrap();
        let storage: Arc<dyn Storage> = Arc::new(storage);
        let user = storage.create_user("a@example.com", None, None).await.unwrap();

        let service = AuthService::new(AuthMode::None, Arc::clone(&storage));
        assert_eq!(service.mode(), AuthMode::None);

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_str(&user.id.to_string()).unwrap());
        let caller = service.authenticate(&headers).await.unwrap();
        assert_eq!(caller, Some(AuthenticatedUser { id: user.id }));

        // API-key mode ignores the header identity
        let service = AuthService::new(AuthMode::ApiKey, storage);
        assert_eq!(service.mode(), AuthMode::ApiKey);
        assert_eq!(service.authenticate(&headers).await.unwrap(), None);
    }
}
