//! Per-user preferences.
//!
//! Settings live in the `user_settings` table with one nullable column per
//! field. A missing row or a NULL column means "use the default", so defaults
//! are merged in when a row is read rather than written up front.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const MIN_SESSION_TIMEOUT: i64 = 5;
pub const MAX_SESSION_TIMEOUT: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "system" => Some(Theme::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl FontSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontSize::Small => "small",
            FontSize::Medium => "medium",
            FontSize::Large => "large",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "small" => Some(FontSize::Small),
            "medium" => Some(FontSize::Medium),
            "large" => Some(FontSize::Large),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub email: bool,
    pub marketing: bool,
    pub security: bool,
    pub updates: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email: true,
            marketing: false,
            security: true,
            updates: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppearanceSettings {
    pub theme: Theme,
    pub reduced_motion: bool,
    pub font_size: FontSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySettings {
    /// Minutes
    pub session_timeout: i64,
    pub two_factor_enabled: bool,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            session_timeout: 30,
            two_factor_enabled: false,
        }
    }
}

/// API key status. The key itself is never part of the settings view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    pub api_key_enabled: bool,
    /// RFC 3339 timestamp of the last key rotation
    pub last_generated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub notifications: NotificationSettings,
    pub appearance: AppearanceSettings,
    pub security: SecuritySettings,
    pub api: ApiSettings,
}

/// Raw `user_settings` columns as read through a LEFT JOIN on `users`
#[derive(Debug, Clone, Default, FromRow)]
pub struct SettingsRow {
    pub notify_email: Option<bool>,
    pub notify_marketing: Option<bool>,
    pub notify_security: Option<bool>,
    pub notify_updates: Option<bool>,
    pub theme: Option<String>,
    pub reduced_motion: Option<bool>,
    pub font_size: Option<String>,
    pub session_timeout: Option<i64>,
    pub two_factor_enabled: Option<bool>,
    pub api_key_enabled: Option<bool>,
    pub api_key_last_generated: Option<i64>,
}

impl SettingsRow {
    pub fn into_settings(self) -> UserSettings {
        let defaults = UserSettings::default();

        let session_timeout = self
            .session_timeout
            .filter(|t| (MIN_SESSION_TIMEOUT..=MAX_SESSION_TIMEOUT).contains(t))
            .unwrap_or(defaults.security.session_timeout);

        UserSettings {
            notifications: NotificationSettings {
                email: self.notify_email.unwrap_or(defaults.notifications.email),
                marketing: self
                    .notify_marketing
                    .unwrap_or(defaults.notifications.marketing),
                security: self
                    .notify_security
                    .unwrap_or(defaults.notifications.security),
                updates: self.notify_updates.unwrap_or(defaults.notifications.updates),
            },
            appearance: AppearanceSettings {
                theme: self
                    .theme
                    .as_deref()
                    .and_then(Theme::parse)
                    .unwrap_or(defaults.appearance.theme),
                reduced_motion: self
                    .reduced_motion
                    .unwrap_or(defaults.appearance.reduced_motion),
                font_size: self
                    .font_size
                    .as_deref()
                    .and_then(FontSize::parse)
                    .unwrap_or(defaults.appearance.font_size),
            },
            security: SecuritySettings {
                session_timeout,
                two_factor_enabled: self
                    .two_factor_enabled
                    .unwrap_or(defaults.security.two_factor_enabled),
            },
            api: ApiSettings {
                api_key_enabled: self.api_key_enabled.unwrap_or(false),
                last_generated: self
                    .api_key_last_generated
                    .and_then(|ts| DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.to_rfc3339()),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsPatch {
    pub email: Option<bool>,
    pub marketing: Option<bool>,
    pub security: Option<bool>,
    pub updates: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppearancePatch {
    pub theme: Option<Theme>,
    pub reduced_motion: Option<bool>,
    pub font_size: Option<FontSize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPatch {
    pub session_timeout: Option<i64>,
    pub two_factor_enabled: Option<bool>,
}

/// Partial settings update. The `api` section is managed through the API-key
/// endpoints and is ignored here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub notifications: Option<NotificationsPatch>,
    pub appearance: Option<AppearancePatch>,
    pub security: Option<SecurityPatch>,
}

impl SettingsPatch {
    /// Merges the patch into `current` section by section and validates the
    /// result. On failure `current` is left untouched.
    pub fn apply(self, current: &UserSettings) -> Result<UserSettings, Vec<String>> {
        let mut merged = current.clone();

        if let Some(n) = self.notifications {
            let target = &mut merged.notifications;
            target.email = n.email.unwrap_or(target.email);
            target.marketing = n.marketing.unwrap_or(target.marketing);
            target.security = n.security.unwrap_or(target.security);
            target.updates = n.updates.unwrap_or(target.updates);
        }

        if let Some(a) = self.appearance {
            let target = &mut merged.appearance;
            target.theme = a.theme.unwrap_or(target.theme);
            target.reduced_motion = a.reduced_motion.unwrap_or(target.reduced_motion);
            target.font_size = a.font_size.unwrap_or(target.font_size);
        }

        if let Some(s) = self.security {
            let target = &mut merged.security;
            target.session_timeout = s.session_timeout.unwrap_or(target.session_timeout);
            target.two_factor_enabled = s.two_factor_enabled.unwrap_or(target.two_factor_enabled);
        }

        merged.validate()?;
        Ok(merged)
    }
}

impl UserSettings {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if !(MIN_SESSION_TIMEOUT..=MAX_SESSION_TIMEOUT).contains(&self.security.session_timeout) {
            errors.push(format!(
                "security.sessionTimeout must be between {MIN_SESSION_TIMEOUT} and {MAX_SESSION_TIMEOUT}"
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
