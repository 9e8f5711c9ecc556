//! Integration tests for the storage backends
//!
//! Covers click attribution, balance accounting, withdrawals, settings and
//! API-key lookup.
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests (needs DATABASE_URL)
//! - By default, both backends are tested

use shortcash::analytics::RankMetric;
use shortcash::models::{
    ClickMetadata, LinkUpdate, PaymentMethod, ProfileUpdate, User, UNIQUE_VIEW_EARNINGS_MICROS,
};
use shortcash::storage::{NewClick, PostgresStorage, SqliteStorage, Storage, StorageError};
use std::sync::Arc;

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true,
    }
}

/// Helper to create SQLite test storage
async fn create_sqlite_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Helper to create PostgreSQL test storage
async fn create_postgres_storage() -> Option<Arc<dyn Storage>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    Some(Arc::new(storage))
}

/// Suffix names so repeated runs against a persistent database do not collide
fn unique(name: &str) -> String {
    format!("{}-{:08x}", name, rand::random::<u32>())
}

async fn create_user(storage: &Arc<dyn Storage>) -> User {
    storage
        .create_user(&format!("{}@example.com", unique("owner")), Some("Owner"), None)
        .await
        .unwrap()
}

fn click(link_id: i64, owner_id: i64, ip: &str, ua: &str, created_at: i64) -> NewClick {
    NewClick {
        link_id,
        owner_id,
        metadata: ClickMetadata {
            ip_address: ip.to_string(),
            user_agent: ua.to_string(),
            referer: String::new(),
        },
        created_at,
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

async fn check_click_attribution(storage: Arc<dyn Storage>) {
    let user = create_user(&storage).await;
    let slug = unique("promo1");
    let link = storage
        .create_link(&slug, "https://example.com/sale", user.id)
        .await
        .unwrap();

    let first = storage
        .record_click(&click(link.id, user.id, "1.2.3.4", "X", now()))
        .await
        .unwrap();
    let repeat = storage
        .record_click(&click(link.id, user.id, "1.2.3.4", "X", now()))
        .await
        .unwrap();
    let other = storage
        .record_click(&click(link.id, user.id, "5.6.7.8", "Y", now()))
        .await
        .unwrap();

    assert!(first.unique);
    assert_eq!(first.earnings_micros, UNIQUE_VIEW_EARNINGS_MICROS);
    assert!(!repeat.unique);
    assert_eq!(repeat.earnings_micros, 0);
    assert!(other.unique);

    let link = storage.get_link(&slug).await.unwrap().unwrap();
    assert_eq!(link.clicks, 3);
    assert_eq!(link.earnings_micros, 2 * UNIQUE_VIEW_EARNINGS_MICROS);

    let owner = storage.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(owner.balance_micros, 2 * UNIQUE_VIEW_EARNINGS_MICROS);

    let events = storage.list_click_events(user.id, 0, None).await.unwrap();
    assert_eq!(events.len(), 3);
    let earned: i64 = events.iter().map(|e| e.earnings_micros).sum();
    assert_eq!(earned, 2 * UNIQUE_VIEW_EARNINGS_MICROS);
}

#[tokio::test]
async fn test_click_attribution_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_click_attribution(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_click_attribution_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        eprintln!("Skipping PostgreSQL test: DATABASE_URL not set or unreachable");
        return;
    };
    check_click_attribution(storage).await;
}

#[tokio::test]
async fn test_same_visitor_on_different_links_earns_twice() {
    let storage = create_sqlite_storage().await;
    let user = create_user(&storage).await;
    let a = storage.create_link("a", "https://a.example", user.id).await.unwrap();
    let b = storage.create_link("b", "https://b.example", user.id).await.unwrap();

    assert!(storage.record_click(&click(a.id, user.id, "1.2.3.4", "X", now())).await.unwrap().unique);
    assert!(storage.record_click(&click(b.id, user.id, "1.2.3.4", "X", now())).await.unwrap().unique);

    let owner = storage.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(owner.balance_micros, 2 * UNIQUE_VIEW_EARNINGS_MICROS);
}

#[tokio::test]
async fn test_concurrent_duplicate_clicks_credit_once() {
    let storage = create_sqlite_storage().await;
    let user = create_user(&storage).await;
    let link = storage.create_link("race", "https://example.com", user.id).await.unwrap();

    let mut handles = vec![];
    for _ in 0..10 {
        let storage = Arc::clone(&storage);
        let (link_id, owner_id) = (link.id, user.id);
        handles.push(tokio::spawn(async move {
            storage
                .record_click(&click(link_id, owner_id, "9.9.9.9", "Same", now()))
                .await
        }));
    }

    let mut unique_count = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().unique {
            unique_count += 1;
        }
    }

    assert_eq!(unique_count, 1, "exactly one visit should be unique");

    let link = storage.get_link("race").await.unwrap().unwrap();
    assert_eq!(link.clicks, 10);
    assert_eq!(link.earnings_micros, UNIQUE_VIEW_EARNINGS_MICROS);

    let owner = storage.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(owner.balance_micros, UNIQUE_VIEW_EARNINGS_MICROS);
}

#[tokio::test]
async fn test_duplicate_slug_conflicts() {
    let storage = create_sqlite_storage().await;
    let user = create_user(&storage).await;

    storage.create_link("taken", "https://one.example", user.id).await.unwrap();
    let err = storage
        .create_link("taken", "https://two.example", user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn test_update_link_slug_and_destination() {
    let storage = create_sqlite_storage().await;
    let user = create_user(&storage).await;
    storage.create_link("old", "https://old.example", user.id).await.unwrap();
    storage.create_link("other", "https://other.example", user.id).await.unwrap();

    let updated = storage
        .update_link(
            "old",
            &LinkUpdate {
                original_url: Some("https://new.example".to_string()),
                slug: Some("new".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.slug, "new");
    assert_eq!(updated.original_url, "https://new.example");
    assert!(storage.get_link("old").await.unwrap().is_none());

    let err = storage
        .update_link(
            "new",
            &LinkUpdate {
                original_url: None,
                slug: Some("other".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let err = storage
        .update_link("missing", &LinkUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn test_delete_link_removes_click_history() {
    let storage = create_sqlite_storage().await;
    let user = create_user(&storage).await;
    let link = storage.create_link("gone", "https://example.com", user.id).await.unwrap();
    storage
        .record_click(&click(link.id, user.id, "1.2.3.4", "X", now()))
        .await
        .unwrap();

    assert!(storage.delete_link("gone").await.unwrap());
    assert!(!storage.delete_link("gone").await.unwrap());
    assert!(storage.list_click_events(user.id, 0, None).await.unwrap().is_empty());

    // Earned balance stays with the user
    let owner = storage.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(owner.balance_micros, UNIQUE_VIEW_EARNINGS_MICROS);
}

#[tokio::test]
async fn test_click_event_window_and_scoping() {
    let storage = create_sqlite_storage().await;
    let owner = create_user(&storage).await;
    let stranger = create_user(&storage).await;
    let mine = storage.create_link("mine", "https://example.com", owner.id).await.unwrap();
    let theirs = storage.create_link("theirs", "https://example.com", stranger.id).await.unwrap();

    for (ts, ip) in [(100, "1.1.1.1"), (200, "2.2.2.2"), (300, "3.3.3.3")] {
        storage.record_click(&click(mine.id, owner.id, ip, "X", ts)).await.unwrap();
    }
    storage.record_click(&click(theirs.id, stranger.id, "4.4.4.4", "X", 200)).await.unwrap();

    let window = storage.list_click_events(owner.id, 150, Some(300)).await.unwrap();
    let stamps: Vec<i64> = window.iter().map(|e| e.created_at).collect();
    assert_eq!(stamps, vec![200, 300]);

    let open = storage.list_click_events(owner.id, 0, None).await.unwrap();
    assert_eq!(open.len(), 3);
    assert!(open.iter().all(|e| e.link_id == mine.id));
}

#[tokio::test]
async fn test_click_events_restricted_to_requested_links() {
    let storage = create_sqlite_storage().await;
    let owner = create_user(&storage).await;
    let first = storage.create_link("first", "https://example.com", owner.id).await.unwrap();
    let second = storage.create_link("second", "https://example.com", owner.id).await.unwrap();
    let third = storage.create_link("third", "https://example.com", owner.id).await.unwrap();

    storage.record_click(&click(first.id, owner.id, "1.1.1.1", "X", 100)).await.unwrap();
    storage.record_click(&click(first.id, owner.id, "2.2.2.2", "X", 300)).await.unwrap();
    storage.record_click(&click(second.id, owner.id, "3.3.3.3", "X", 200)).await.unwrap();
    storage.record_click(&click(third.id, owner.id, "4.4.4.4", "X", 250)).await.unwrap();

    let events = storage
        .list_link_click_events(&[first.id, second.id], 150)
        .await
        .unwrap();
    let seen: Vec<(i64, i64)> = events.iter().map(|e| (e.link_id, e.created_at)).collect();
    assert_eq!(seen, vec![(second.id, 200), (first.id, 300)]);

    assert!(storage.list_link_click_events(&[], 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_link_summary_and_top_links() {
    let storage = create_sqlite_storage().await;
    let user = create_user(&storage).await;

    let busy = storage.create_link("busy", "https://example.com", user.id).await.unwrap();
    let rich = storage.create_link("rich", "https://example.com", user.id).await.unwrap();
    storage.create_link("idle", "https://example.com", user.id).await.unwrap();

    // busy: 3 clicks from one visitor, rich: 2 clicks from two visitors
    for _ in 0..3 {
        storage.record_click(&click(busy.id, user.id, "1.1.1.1", "X", now())).await.unwrap();
    }
    storage.record_click(&click(rich.id, user.id, "1.1.1.1", "X", now())).await.unwrap();
    storage.record_click(&click(rich.id, user.id, "2.2.2.2", "X", now())).await.unwrap();

    let summary = storage.link_summary(user.id, 0).await.unwrap();
    assert_eq!(summary.total_clicks, 5);
    assert_eq!(summary.total_earnings_micros, 3 * UNIQUE_VIEW_EARNINGS_MICROS);
    assert_eq!(summary.link_count, 3);
    assert_eq!(summary.new_link_count, 3);

    let future = storage.link_summary(user.id, now() + 3600).await.unwrap();
    assert_eq!(future.new_link_count, 0);

    let by_clicks = storage.top_links(user.id, RankMetric::Clicks, 2).await.unwrap();
    let slugs: Vec<&str> = by_clicks.iter().map(|l| l.slug.as_str()).collect();
    assert_eq!(slugs, vec!["busy", "rich"]);

    let by_earnings = storage.top_links(user.id, RankMetric::Earnings, 1).await.unwrap();
    assert_eq!(by_earnings[0].slug, "rich");
}

#[tokio::test]
async fn test_empty_summary() {
    let storage = create_sqlite_storage().await;
    let user = create_user(&storage).await;

    let summary = storage.link_summary(user.id, 0).await.unwrap();
    assert_eq!(summary.total_clicks, 0);
    assert_eq!(summary.total_earnings_micros, 0);
    assert_eq!(summary.link_count, 0);
}

async fn check_withdrawal_accounting(storage: Arc<dyn Storage>) {
    let user = create_user(&storage).await;
    let link = storage
        .create_link(&unique("payout"), "https://example.com", user.id)
        .await
        .unwrap();
    storage
        .record_click(&click(link.id, user.id, "1.2.3.4", "X", now()))
        .await
        .unwrap();
    storage
        .record_click(&click(link.id, user.id, "5.6.7.8", "X", now()))
        .await
        .unwrap();

    let err = storage
        .create_withdrawal(user.id, 10_000, PaymentMethod::Paypal, "pay@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InsufficientBalance));

    let withdrawal = storage
        .create_withdrawal(user.id, 4_000, PaymentMethod::Bank, "pay@example.com")
        .await
        .unwrap();
    assert_eq!(withdrawal.amount_micros, 4_000);
    assert_eq!(withdrawal.status, "pending");
    assert_eq!(withdrawal.payment_method, "bank");

    let owner = storage.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(owner.balance_micros, 2 * UNIQUE_VIEW_EARNINGS_MICROS - 4_000);

    // Exactly the remaining balance is allowed
    storage
        .create_withdrawal(user.id, 2_000, PaymentMethod::Paypal, "pay@example.com")
        .await
        .unwrap();
    let owner = storage.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(owner.balance_micros, 0);

    let history = storage.list_withdrawals(user.id).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_withdrawal_accounting_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_withdrawal_accounting(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_withdrawal_accounting_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        eprintln!("Skipping PostgreSQL test: DATABASE_URL not set or unreachable");
        return;
    };
    check_withdrawal_accounting(storage).await;
}

#[tokio::test]
async fn test_concurrent_withdrawals_never_overdraw() {
    let storage = create_sqlite_storage().await;
    let user = create_user(&storage).await;
    let link = storage.create_link("w", "https://example.com", user.id).await.unwrap();
    storage.record_click(&click(link.id, user.id, "1.2.3.4", "X", now())).await.unwrap();

    let mut handles = vec![];
    for _ in 0..5 {
        let storage = Arc::clone(&storage);
        let user_id = user.id;
        handles.push(tokio::spawn(async move {
            storage
                .create_withdrawal(user_id, 2_000, PaymentMethod::Paypal, "pay@example.com")
                .await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(StorageError::InsufficientBalance) => {}
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    assert_eq!(accepted, 1);
    let owner = storage.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(owner.balance_micros, 1_000);
}

#[tokio::test]
async fn test_profile_update_and_username_conflict() {
    let storage = create_sqlite_storage().await;
    let alice = create_user(&storage).await;
    let bob = create_user(&storage).await;

    let updated = storage
        .update_profile(
            alice.id,
            &ProfileUpdate {
                username: Some("alice".to_string()),
                payment_method: Some(PaymentMethod::Crypto),
                city: Some("Dhaka".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.username.as_deref(), Some("alice"));
    assert_eq!(updated.payment_method.as_deref(), Some("crypto"));
    assert_eq!(updated.city.as_deref(), Some("Dhaka"));
    // Untouched fields keep their values
    assert_eq!(updated.name.as_deref(), Some("Owner"));

    let err = storage
        .update_profile(
            bob.id,
            &ProfileUpdate {
                username: Some("alice".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let err = storage
        .update_profile(i64::MAX, &ProfileUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let storage = create_sqlite_storage().await;
    storage.create_user("dup@example.com", None, None).await.unwrap();
    let err = storage
        .create_user("dup@example.com", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let found = storage.find_user_by_email("dup@example.com").await.unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn test_settings_default_then_saved() {
    let storage = create_sqlite_storage().await;
    let user = create_user(&storage).await;

    let mut settings = storage.get_settings(user.id).await.unwrap().unwrap();
    assert!(settings.notifications.email);
    assert_eq!(settings.security.session_timeout, 30);

    settings.notifications.marketing = true;
    settings.security.session_timeout = 45;
    storage.save_settings(user.id, &settings).await.unwrap();

    let stored = storage.get_settings(user.id).await.unwrap().unwrap();
    assert_eq!(stored, settings);

    assert!(storage.get_settings(i64::MAX).await.unwrap().is_none());
}

#[tokio::test]
async fn test_api_key_lookup_rotation_and_revoke() {
    let storage = create_sqlite_storage().await;
    let user = create_user(&storage).await;

    assert!(storage.find_user_by_api_key("digest-1").await.unwrap().is_none());

    storage.rotate_api_key(user.id, "digest-1", 1_700_000_000).await.unwrap();
    let found = storage.find_user_by_api_key("digest-1").await.unwrap().unwrap();
    assert_eq!(found.id, user.id);

    let settings = storage.get_settings(user.id).await.unwrap().unwrap();
    assert!(settings.api.api_key_enabled);
    assert!(settings.api.last_generated.is_some());

    // Rotation invalidates the previous key
    storage.rotate_api_key(user.id, "digest-2", 1_700_000_100).await.unwrap();
    assert!(storage.find_user_by_api_key("digest-1").await.unwrap().is_none());
    assert!(storage.find_user_by_api_key("digest-2").await.unwrap().is_some());

    // Saving preferences keeps the key
    storage.save_settings(user.id, &settings).await.unwrap();
    assert!(storage.find_user_by_api_key("digest-2").await.unwrap().is_some());

    storage.revoke_api_key(user.id).await.unwrap();
    assert!(storage.find_user_by_api_key("digest-2").await.unwrap().is_none());
    let settings = storage.get_settings(user.id).await.unwrap().unwrap();
    assert!(!settings.api.api_key_enabled);
}

#[tokio::test]
async fn test_password_hash_update() {
    let storage = create_sqlite_storage().await;
    let user = create_user(&storage).await;

    assert!(storage.set_password_hash(user.id, "$argon2id$fake").await.unwrap());
    let stored = storage.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(stored.password_hash.as_deref(), Some("$argon2id$fake"));

    assert!(!storage.set_password_hash(i64::MAX, "x").await.unwrap());
}
