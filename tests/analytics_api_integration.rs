//! Integration tests for analytics API endpoints
//!
//! Seeds click events directly through storage and checks the overview,
//! top-URLs and audience responses end to end.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use shortcash::api::create_api_router;
use shortcash::auth::AuthService;
use shortcash::config::{AuthMode, ClientIpConfig, CorsConfig};
use shortcash::models::ClickMetadata;
use shortcash::storage::{NewClick, SqliteStorage, Storage};
use std::sync::Arc;
use tower::ServiceExt;

const DAY: i64 = 24 * 60 * 60;

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn create_app(storage: &Arc<dyn Storage>) -> Router {
    let auth = Arc::new(AuthService::new(AuthMode::None, Arc::clone(storage)));
    create_api_router(
        Arc::clone(storage),
        auth,
        ClientIpConfig::default(),
        &CorsConfig::default(),
    )
}

async fn get_json(app: Router, uri: &str, user_id: i64) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("x-user-id", user_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

async fn visit(
    storage: &Arc<dyn Storage>,
    link_id: i64,
    owner_id: i64,
    ip: &str,
    user_agent: &str,
    referer: &str,
    created_at: i64,
) {
    storage
        .record_click(&NewClick {
            link_id,
            owner_id,
            metadata: ClickMetadata {
                ip_address: ip.to_string(),
                user_agent: user_agent.to_string(),
                referer: referer.to_string(),
            },
            created_at,
        })
        .await
        .unwrap();
}

fn sum_values(items: &Value) -> i64 {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["value"].as_i64().unwrap())
        .sum()
}

#[tokio::test]
async fn test_overview_without_previous_activity() {
    let storage = create_test_storage().await;
    let user = storage.create_user("a@example.com", None, None).await.unwrap();
    let link = storage.create_link("promo1", "https://example.com", user.id).await.unwrap();

    visit(&storage, link.id, user.id, "1.2.3.4", "X", "", now()).await;
    visit(&storage, link.id, user.id, "1.2.3.4", "X", "", now()).await;
    visit(&storage, link.id, user.id, "5.6.7.8", "Y", "", now()).await;

    let (status, json) = get_json(create_app(&storage), "/api/analytics/overview?timeRange=7d", user.id).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(json["totalClicks"], 3);
    assert!((json["totalEarnings"].as_f64().unwrap() - 0.006).abs() < 1e-9);
    assert!((json["balance"].as_f64().unwrap() - 0.006).abs() < 1e-9);
    assert_eq!(json["clicksPercentChange"], 0.0);
    assert_eq!(json["earningsPercentChange"], 0.0);
    assert_eq!(json["activeUrlsCount"], 1);
    assert_eq!(json["newUrlsCount"], 1);
    assert!((json["avgEarningsPerClick"].as_f64().unwrap() - 0.002).abs() < 1e-9);

    let daily = json["dailyData"].as_array().unwrap();
    assert_eq!(daily.len(), 8);
    let clicks: i64 = daily.iter().map(|d| d["clicks"].as_i64().unwrap()).sum();
    assert_eq!(clicks, 3);
}

#[tokio::test]
async fn test_overview_period_over_period_change() {
    let storage = create_test_storage().await;
    let user = storage.create_user("a@example.com", None, None).await.unwrap();
    let link = storage.create_link("promo1", "https://example.com", user.id).await.unwrap();

    // One visit in the previous 7-day window, two in the current one
    visit(&storage, link.id, user.id, "1.1.1.1", "X", "", now() - 10 * DAY).await;
    visit(&storage, link.id, user.id, "2.2.2.2", "X", "", now() - DAY).await;
    visit(&storage, link.id, user.id, "3.3.3.3", "X", "", now()).await;

    let (status, json) = get_json(create_app(&storage), "/api/analytics/overview?timeRange=7d", user.id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["clicksPercentChange"], 100.0);
    assert_eq!(json["earningsPercentChange"], 100.0);
    assert_eq!(json["totalClicks"], 3);
}

#[tokio::test]
async fn test_overview_defaults_to_thirty_days() {
    let storage = create_test_storage().await;
    let user = storage.create_user("a@example.com", None, None).await.unwrap();

    let (status, json) = get_json(create_app(&storage), "/api/analytics/overview?timeRange=bogus", user.id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["dailyData"].as_array().unwrap().len(), 31);
    assert_eq!(json["totalClicks"], 0);
    assert_eq!(json["avgEarningsPerClick"], 0.0);
}

#[tokio::test]
async fn test_top_urls_ranked_by_period_metric() {
    let storage = create_test_storage().await;
    let user = storage.create_user("a@example.com", None, None).await.unwrap();
    let old = storage.create_link("old", "https://old.example", user.id).await.unwrap();
    let fresh = storage.create_link("fresh", "https://fresh.example", user.id).await.unwrap();

    // old: popular long ago, fresh: popular this week
    for i in 0..5 {
        visit(&storage, old.id, user.id, &format!("10.0.0.{}", i), "X", "", now() - 60 * DAY).await;
    }
    for i in 0..3 {
        visit(&storage, fresh.id, user.id, &format!("10.0.1.{}", i), "X", "", now()).await;
    }

    let (status, json) = get_json(
        create_app(&storage),
        "/api/analytics/top-urls?timeRange=7d&metric=clicks&limit=5",
        user.id,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["url"], "fresh");
    assert_eq!(rows[0]["clicks"], 3);
    assert_eq!(rows[0]["totalClicks"], 3);
    assert_eq!(rows[1]["url"], "old");
    assert_eq!(rows[1]["clicks"], 0);
    assert_eq!(rows[1]["totalClicks"], 5);
    assert_eq!(rows[1]["originalUrl"], "https://old.example");
}

#[tokio::test]
async fn test_top_urls_candidates_chosen_by_lifetime_metric() {
    let storage = create_test_storage().await;
    let user = storage.create_user("a@example.com", None, None).await.unwrap();
    let old = storage.create_link("old", "https://old.example", user.id).await.unwrap();
    let fresh = storage.create_link("fresh", "https://fresh.example", user.id).await.unwrap();

    for i in 0..5 {
        visit(&storage, old.id, user.id, &format!("10.0.0.{}", i), "X", "", now() - 60 * DAY).await;
    }
    visit(&storage, fresh.id, user.id, "10.0.1.1", "X", "", now()).await;

    // With limit=1 only the lifetime leader is considered, even though it has
    // no clicks in the window
    let (_, json) = get_json(
        create_app(&storage),
        "/api/analytics/top-urls?timeRange=7d&limit=1",
        user.id,
    )
    .await;
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["url"], "old");
    assert_eq!(rows[0]["clicks"], 0);
}

#[tokio::test]
async fn test_audience_breakdowns_sum_to_hundred() {
    let storage = create_test_storage().await;
    let user = storage.create_user("a@example.com", None, None).await.unwrap();
    let link = storage.create_link("promo1", "https://example.com", user.id).await.unwrap();

    let visits = [
        ("8.8.8.8", "Mozilla/5.0 (iPhone) Mobile", "https://facebook.com/x"),
        ("51.1.1.1", "Mozilla/5.0 (Windows NT 10.0)", "https://www.google.com/"),
        ("77.1.1.1", "Mozilla/5.0 (Windows NT 10.0)", ""),
        ("", "Mozilla/5.0 (iPad) Mobile", "https://mail.example"),
        ("192.168.1.10", "Mozilla/5.0 (Linux; Android 14)", "https://news.example"),
        ("133.1.1.1", "Mozilla/5.0 (Macintosh)", "direct"),
        ("103.5.5.5", "Mozilla/5.0 (Macintosh)", ""),
    ];
    for (ip, ua, referer) in visits {
        visit(&storage, link.id, user.id, ip, ua, referer, now()).await;
    }

    let (status, json) = get_json(create_app(&storage), "/api/analytics/audience", user.id).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(json["totalClicks"], 7);
    assert_eq!(sum_values(&json["deviceData"]), 100);
    assert_eq!(sum_values(&json["referrerData"]), 100);
    assert_eq!(sum_values(&json["locationData"]), 100);

    let devices: Vec<&str> = json["deviceData"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(devices, vec!["Desktop", "Mobile", "Tablet"]);

    let locations = json["locationData"].as_array().unwrap();
    assert!(locations.len() <= 6);
    assert!(locations.iter().all(|l| l["name"] != "Unknown"));
    assert!(locations.iter().any(|l| l["name"] == "Other"));
}

#[tokio::test]
async fn test_audience_without_events() {
    let storage = create_test_storage().await;
    let user = storage.create_user("a@example.com", None, None).await.unwrap();

    let (status, json) = get_json(create_app(&storage), "/api/analytics/audience?timeRange=90d", user.id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalClicks"], 0);
    assert_eq!(sum_values(&json["deviceData"]), 0);
    assert_eq!(sum_values(&json["referrerData"]), 0);
    assert!(json["locationData"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_analytics_scoped_to_caller() {
    let storage = create_test_storage().await;
    let owner = storage.create_user("owner@example.com", None, None).await.unwrap();
    let other = storage.create_user("other@example.com", None, None).await.unwrap();
    let link = storage.create_link("mine", "https://example.com", owner.id).await.unwrap();
    visit(&storage, link.id, owner.id, "1.2.3.4", "X", "", now()).await;

    let (_, json) = get_json(create_app(&storage), "/api/analytics/overview", other.id).await;
    assert_eq!(json["totalClicks"], 0);

    let (_, json) = get_json(create_app(&storage), "/api/analytics/top-urls", other.id).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_analytics_requires_authentication() {
    let storage = create_test_storage().await;

    let response = create_app(&storage)
        .oneshot(
            Request::builder()
                .uri("/api/analytics/overview")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_query_string_is_json_bad_request() {
    let storage = create_test_storage().await;
    let user = storage.create_user("a@example.com", None, None).await.unwrap();

    let response = create_app(&storage)
        .oneshot(
            Request::builder()
                .uri("/api/analytics/top-urls?limit=abc")
                .header("x-user-id", user.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(axum::http::header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Invalid query parameters");
    assert!(!json["details"].as_array().unwrap().is_empty());
}
