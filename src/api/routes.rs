use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::auth::{auth_middleware, AuthService};
use crate::config::{ClientIpConfig, CorsConfig};
use crate::storage::Storage;

use super::analytics::{get_audience, get_overview, get_top_urls};
use super::handlers::{health_check, resolve_redirect, AppState};
use super::links::{create_url, delete_url, get_url, list_urls, update_url};
use super::user::{
    change_password, create_withdrawal, generate_api_key_handler, get_api_key, get_profile,
    get_settings, list_withdrawals, revoke_api_key, update_profile, update_settings,
};

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-user-id"),
        ])
        .max_age(Duration::from_secs(60 * 60))
}

pub fn create_api_router(
    storage: Arc<dyn Storage>,
    auth_service: Arc<AuthService>,
    client_ip: ClientIpConfig,
    cors: &CorsConfig,
) -> Router {
    let state = Arc::new(AppState { storage, client_ip });

    let protected_routes = Router::new()
        .route("/urls", get(list_urls).post(create_url))
        .route(
            "/urls/{slug}",
            get(get_url).put(update_url).delete(delete_url),
        )
        .route("/analytics/overview", get(get_overview))
        .route("/analytics/top-urls", get(get_top_urls))
        .route("/analytics/audience", get(get_audience))
        .route("/user/profile", get(get_profile).put(update_profile))
        .route("/user/settings", get(get_settings).patch(update_settings))
        .route("/user/password", post(change_password))
        .route(
            "/user/api-key",
            get(get_api_key)
                .post(generate_api_key_handler)
                .delete(revoke_api_key),
        )
        .route(
            "/user/withdrawals",
            get(list_withdrawals).post(create_withdrawal),
        )
        .route_layer(middleware::from_fn(move |headers, req, next| {
            let auth = Arc::clone(&auth_service);
            auth_middleware(auth, headers, req, next)
        }))
        .with_state(Arc::clone(&state));

    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/redirect/{slug}", get(resolve_redirect))
        .with_state(state);

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors)),
        )
}
