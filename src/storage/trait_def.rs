use crate::analytics::RankMetric;
use crate::models::{
    ClickEvent, ClickMetadata, ClickOutcome, LinkUpdate, PaymentMethod, ProfileUpdate,
    ShortLink, User, UserSettings, Withdrawal,
};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            sqlx::Error::RowNotFound => StorageError::NotFound,
            _ => StorageError::Other(err.into()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A visit to persist
#[derive(Debug, Clone)]
pub struct NewClick {
    pub link_id: i64,
    pub owner_id: i64,
    pub metadata: ClickMetadata,
    pub created_at: i64,
}

/// Lifetime counters over one user's links
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkSummary {
    pub total_clicks: i64,
    pub total_earnings_micros: i64,
    pub link_count: i64,
    /// Links created at or after the `created_since` bound
    pub new_link_count: i64,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    // Users

    /// Create a user account. Fails with `Conflict` when the email is taken.
    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: Option<&str>,
    ) -> StorageResult<User>;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Resolve the owner of an enabled API key by its SHA-256 digest
    async fn find_user_by_api_key(&self, key_hash: &str) -> Result<Option<User>>;

    /// Apply a profile edit. `Conflict` on a taken username, `NotFound` when
    /// the user does not exist.
    async fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> StorageResult<User>;

    async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> Result<bool>;

    // Settings

    /// Settings merged with defaults, or `None` when the user does not exist
    async fn get_settings(&self, user_id: i64) -> Result<Option<UserSettings>>;

    /// Persist the notification, appearance and security sections
    async fn save_settings(&self, user_id: i64, settings: &UserSettings) -> Result<()>;

    /// Replace the user's API key digest and enable key access
    async fn rotate_api_key(&self, user_id: i64, key_hash: &str, generated_at: i64) -> Result<()>;

    /// Drop the stored key digest and disable key access
    async fn revoke_api_key(&self, user_id: i64) -> Result<()>;

    // Links

    /// Create a short link. Fails with `Conflict` when the slug is taken.
    async fn create_link(
        &self,
        slug: &str,
        original_url: &str,
        user_id: i64,
    ) -> StorageResult<ShortLink>;

    async fn get_link(&self, slug: &str) -> Result<Option<ShortLink>>;

    /// Links owned by `user_id`, newest first
    async fn list_links(&self, user_id: i64) -> Result<Vec<ShortLink>>;

    /// `Conflict` when the new slug is taken, `NotFound` when `slug` is unknown
    async fn update_link(&self, slug: &str, update: &LinkUpdate) -> StorageResult<ShortLink>;

    /// Delete a link together with its click history
    async fn delete_link(&self, slug: &str) -> Result<bool>;

    // Clicks

    /// Record a visit and attribute earnings in one transaction.
    ///
    /// The visit is unique when inserting its (link, IP, user-agent) marker
    /// into `unique_views` succeeds; only then are the link earnings and the
    /// owner's balance credited.
    async fn record_click(&self, click: &NewClick) -> Result<ClickOutcome>;

    /// Click events on links owned by `user_id` created in `[start, end]`,
    /// oldest first. `end = None` leaves the window open.
    async fn list_click_events(
        &self,
        user_id: i64,
        start: i64,
        end: Option<i64>,
    ) -> Result<Vec<ClickEvent>>;

    /// Click events on the given links created at or after `start`, oldest
    /// first. An empty `link_ids` yields no events.
    async fn list_link_click_events(&self, link_ids: &[i64], start: i64) -> Result<Vec<ClickEvent>>;

    async fn link_summary(&self, user_id: i64, created_since: i64) -> Result<LinkSummary>;

    /// The caller's links ordered by lifetime `metric`, descending
    async fn top_links(
        &self,
        user_id: i64,
        metric: RankMetric,
        limit: i64,
    ) -> Result<Vec<ShortLink>>;

    // Withdrawals

    /// Debit the balance and record a pending withdrawal atomically.
    /// Fails with `InsufficientBalance` when the balance is below `amount_micros`.
    async fn create_withdrawal(
        &self,
        user_id: i64,
        amount_micros: i64,
        payment_method: PaymentMethod,
        payment_email: &str,
    ) -> StorageResult<Withdrawal>;

    /// Withdrawals for `user_id`, newest first
    async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>>;
}
