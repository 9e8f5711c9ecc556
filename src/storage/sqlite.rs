use crate::analytics::RankMetric;
use crate::models::{
    ClickEvent, ClickOutcome, LinkUpdate, PaymentMethod, ProfileUpdate, SettingsRow, ShortLink,
    User, UserSettings, Withdrawal, WithdrawalStatus, UNIQUE_VIEW_EARNINGS_MICROS,
};
use crate::storage::{unix_now, LinkSummary, NewClick, Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                username TEXT UNIQUE,
                name TEXT,
                address TEXT,
                city TEXT,
                country TEXT,
                zip_code TEXT,
                payment_email TEXT,
                payment_method TEXT,
                password_hash TEXT,
                balance_micros INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        // One nullable column per preference; NULL means "default"
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_settings (
                user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                notify_email INTEGER,
                notify_marketing INTEGER,
                notify_security INTEGER,
                notify_updates INTEGER,
                theme TEXT,
                reduced_motion INTEGER,
                font_size TEXT,
                session_timeout INTEGER,
                two_factor_enabled INTEGER,
                api_key_hash TEXT UNIQUE,
                api_key_enabled INTEGER,
                api_key_last_generated INTEGER
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                clicks INTEGER NOT NULL DEFAULT 0,
                earnings_micros INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_user_id ON links(user_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS click_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                ip_address TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                referer TEXT NOT NULL,
                earnings_micros INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_click_events_link_time ON click_events(link_id, created_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        // First-seen marker per (link, visitor); its primary key decides uniqueness
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS unique_views (
                link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                visitor_key TEXT NOT NULL,
                first_seen_at INTEGER NOT NULL,
                PRIMARY KEY (link_id, visitor_key)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS withdrawals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                amount_micros INTEGER NOT NULL,
                payment_method TEXT NOT NULL,
                payment_email TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_withdrawals_user_id ON withdrawals(user_id)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: Option<&str>,
    ) -> StorageResult<User> {
        let created_at = unix_now()?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(email) DO NOTHING
            RETURNING id, email, username, name, address, city, country, zip_code,
                      payment_email, payment_method, password_hash, balance_micros, created_at
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(created_at)
        .fetch_optional(self.pool.as_ref())
        .await?;

        user.ok_or(StorageError::Conflict)
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, name, address, city, country, zip_code,
                   payment_email, payment_method, password_hash, balance_micros, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, name, address, city, country, zip_code,
                   payment_email, payment_method, password_hash, balance_micros, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn find_user_by_api_key(&self, key_hash: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.username, u.name, u.address, u.city, u.country, u.zip_code,
                   u.payment_email, u.payment_method, u.password_hash, u.balance_micros,
                   u.created_at
            FROM users u
            JOIN user_settings s ON s.user_id = u.id
            WHERE s.api_key_hash = ? AND s.api_key_enabled = 1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> StorageResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                username = COALESCE(?, username),
                payment_email = COALESCE(?, payment_email),
                payment_method = COALESCE(?, payment_method),
                address = COALESCE(?, address),
                city = COALESCE(?, city),
                country = COALESCE(?, country),
                zip_code = COALESCE(?, zip_code)
            WHERE id = ?
            RETURNING id, email, username, name, address, city, country, zip_code,
                      payment_email, payment_method, password_hash, balance_micros, created_at
            "#,
        )
        .bind(update.name.as_deref())
        .bind(update.username.as_deref())
        .bind(update.payment_email.as_deref())
        .bind(update.payment_method.map(|m| m.as_str()))
        .bind(update.address.as_deref())
        .bind(update.city.as_deref())
        .bind(update.country.as_deref())
        .bind(update.zip_code.as_deref())
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        user.ok_or(StorageError::NotFound)
    }

    async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_settings(&self, user_id: i64) -> Result<Option<UserSettings>> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT s.notify_email, s.notify_marketing, s.notify_security, s.notify_updates,
                   s.theme, s.reduced_motion, s.font_size, s.session_timeout,
                   s.two_factor_enabled, s.api_key_enabled, s.api_key_last_generated
            FROM users u
            LEFT JOIN user_settings s ON s.user_id = u.id
            WHERE u.id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(SettingsRow::into_settings))
    }

    async fn save_settings(&self, user_id: i64, settings: &UserSettings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (
                user_id, notify_email, notify_marketing, notify_security, notify_updates,
                theme, reduced_motion, font_size, session_timeout, two_factor_enabled
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                notify_email = excluded.notify_email,
                notify_marketing = excluded.notify_marketing,
                notify_security = excluded.notify_security,
                notify_updates = excluded.notify_updates,
                theme = excluded.theme,
                reduced_motion = excluded.reduced_motion,
                font_size = excluded.font_size,
                session_timeout = excluded.session_timeout,
                two_factor_enabled = excluded.two_factor_enabled
            "#,
        )
        .bind(user_id)
        .bind(settings.notifications.email)
        .bind(settings.notifications.marketing)
        .bind(settings.notifications.security)
        .bind(settings.notifications.updates)
        .bind(settings.appearance.theme.as_str())
        .bind(settings.appearance.reduced_motion)
        .bind(settings.appearance.font_size.as_str())
        .bind(settings.security.session_timeout)
        .bind(settings.security.two_factor_enabled)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn rotate_api_key(&self, user_id: i64, key_hash: &str, generated_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, api_key_hash, api_key_enabled, api_key_last_generated)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                api_key_hash = excluded.api_key_hash,
                api_key_enabled = excluded.api_key_enabled,
                api_key_last_generated = excluded.api_key_last_generated
            "#,
        )
        .bind(user_id)
        .bind(key_hash)
        .bind(true)
        .bind(generated_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn revoke_api_key(&self, user_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE user_settings
            SET api_key_hash = NULL, api_key_enabled = ?
            WHERE user_id = ?
            "#,
        )
        .bind(false)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_link(
        &self,
        slug: &str,
        original_url: &str,
        user_id: i64,
    ) -> StorageResult<ShortLink> {
        let created_at = unix_now()?;

        let link = sqlx::query_as::<_, ShortLink>(
            r#"
            INSERT INTO links (slug, original_url, user_id, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(slug) DO NOTHING
            RETURNING id, slug, original_url, user_id, clicks, earnings_micros, created_at
            "#,
        )
        .bind(slug)
        .bind(original_url)
        .bind(user_id)
        .bind(created_at)
        .fetch_optional(self.pool.as_ref())
        .await?;

        link.ok_or(StorageError::Conflict)
    }

    async fn get_link(&self, slug: &str) -> Result<Option<ShortLink>> {
        let link = sqlx::query_as::<_, ShortLink>(
            r#"
            SELECT id, slug, original_url, user_id, clicks, earnings_micros, created_at
            FROM links
            WHERE slug = ?
            "#,
        )
        .bind(slug)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn list_links(&self, user_id: i64) -> Result<Vec<ShortLink>> {
        let links = sqlx::query_as::<_, ShortLink>(
            r#"
            SELECT id, slug, original_url, user_id, clicks, earnings_micros, created_at
            FROM links
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn update_link(&self, slug: &str, update: &LinkUpdate) -> StorageResult<ShortLink> {
        let link = sqlx::query_as::<_, ShortLink>(
            r#"
            UPDATE links SET
                original_url = COALESCE(?, original_url),
                slug = COALESCE(?, slug)
            WHERE slug = ?
            RETURNING id, slug, original_url, user_id, clicks, earnings_micros, created_at
            "#,
        )
        .bind(update.original_url.as_deref())
        .bind(update.slug.as_deref())
        .bind(slug)
        .fetch_optional(self.pool.as_ref())
        .await?;

        link.ok_or(StorageError::NotFound)
    }

    async fn delete_link(&self, slug: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM links WHERE slug = ?")
            .bind(slug)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_click(&self, click: &NewClick) -> Result<ClickOutcome> {
        let mut tx = self.pool.begin().await?;

        let marker = sqlx::query(
            r#"
            INSERT INTO unique_views (link_id, visitor_key, first_seen_at)
            VALUES (?, ?, ?)
            ON CONFLICT(link_id, visitor_key) DO NOTHING
            "#,
        )
        .bind(click.link_id)
        .bind(click.metadata.visitor_key())
        .bind(click.created_at)
        .execute(&mut *tx)
        .await?;

        let unique = marker.rows_affected() == 1;
        let earnings_micros = if unique {
            UNIQUE_VIEW_EARNINGS_MICROS
        } else {
            0
        };

        sqlx::query(
            r#"
            INSERT INTO click_events (link_id, ip_address, user_agent, referer, earnings_micros, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(click.link_id)
        .bind(&click.metadata.ip_address)
        .bind(&click.metadata.user_agent)
        .bind(&click.metadata.referer)
        .bind(earnings_micros)
        .bind(click.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE links
            SET clicks = clicks + 1, earnings_micros = earnings_micros + ?
            WHERE id = ?
            "#,
        )
        .bind(earnings_micros)
        .bind(click.link_id)
        .execute(&mut *tx)
        .await?;

        if unique {
            sqlx::query("UPDATE users SET balance_micros = balance_micros + ? WHERE id = ?")
                .bind(earnings_micros)
                .bind(click.owner_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(ClickOutcome {
            unique,
            earnings_micros,
        })
    }

    async fn list_click_events(
        &self,
        user_id: i64,
        start: i64,
        end: Option<i64>,
    ) -> Result<Vec<ClickEvent>> {
        let events = sqlx::query_as::<_, ClickEvent>(
            r#"
            SELECT c.id, c.link_id, c.ip_address, c.user_agent, c.referer,
                   c.earnings_micros, c.created_at
            FROM click_events c
            JOIN links l ON l.id = c.link_id
            WHERE l.user_id = ? AND c.created_at >= ? AND c.created_at <= ?
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end.unwrap_or(i64::MAX))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(events)
    }

    async fn list_link_click_events(&self, link_ids: &[i64], start: i64) -> Result<Vec<ClickEvent>> {
        if link_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT id, link_id, ip_address, user_agent, referer, earnings_micros, created_at
            FROM click_events
            WHERE created_at >= "#,
        );
        query.push_bind(start);
        query.push(" AND link_id IN (");
        let mut ids = query.separated(", ");
        for id in link_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
        query.push(" ORDER BY created_at ASC, id ASC");

        let events = query
            .build_query_as::<ClickEvent>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(events)
    }

    async fn link_summary(&self, user_id: i64, created_since: i64) -> Result<LinkSummary> {
        let (total_clicks, total_earnings_micros, link_count, new_link_count) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"
                SELECT COALESCE(SUM(clicks), 0),
                       COALESCE(SUM(earnings_micros), 0),
                       COUNT(*),
                       COALESCE(SUM(CASE WHEN created_at >= ? THEN 1 ELSE 0 END), 0)
                FROM links
                WHERE user_id = ?
                "#,
            )
            .bind(created_since)
            .bind(user_id)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(LinkSummary {
            total_clicks,
            total_earnings_micros,
            link_count,
            new_link_count,
        })
    }

    async fn top_links(
        &self,
        user_id: i64,
        metric: RankMetric,
        limit: i64,
    ) -> Result<Vec<ShortLink>> {
        let query = format!(
            r#"
            SELECT id, slug, original_url, user_id, clicks, earnings_micros, created_at
            FROM links
            WHERE user_id = ?
            ORDER BY {} DESC, id ASC
            LIMIT ?
            "#,
            metric.column()
        );

        let links = sqlx::query_as::<_, ShortLink>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(links)
    }

    async fn create_withdrawal(
        &self,
        user_id: i64,
        amount_micros: i64,
        payment_method: PaymentMethod,
        payment_email: &str,
    ) -> StorageResult<Withdrawal> {
        let created_at = unix_now()?;
        let mut tx = self.pool.begin().await?;

        let debit = sqlx::query(
            r#"
            UPDATE users
            SET balance_micros = balance_micros - ?
            WHERE id = ? AND balance_micros >= ?
            "#,
        )
        .bind(amount_micros)
        .bind(user_id)
        .bind(amount_micros)
        .execute(&mut *tx)
        .await?;

        if debit.rows_affected() == 0 {
            return Err(StorageError::InsufficientBalance);
        }

        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"
            INSERT INTO withdrawals (user_id, amount_micros, payment_method, payment_email, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, user_id, amount_micros, payment_method, payment_email, status, created_at
            "#,
        )
        .bind(user_id)
        .bind(amount_micros)
        .bind(payment_method.as_str())
        .bind(payment_email)
        .bind(WithdrawalStatus::Pending.as_str())
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(withdrawal)
    }

    async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            r#"
            SELECT id, user_id, amount_micros, payment_method, payment_email, status, created_at
            FROM withdrawals
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(withdrawals)
    }
}
