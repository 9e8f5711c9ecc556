use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::FromRow;

use super::money::serialize_micros;

/// One recorded visit to a short link
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub id: i64,
    pub link_id: i64,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    #[serde(rename = "earnings", serialize_with = "serialize_micros")]
    pub earnings_micros: i64,
    pub created_at: i64,
}

/// Request metadata captured at redirect time
#[derive(Debug, Clone, Default)]
pub struct ClickMetadata {
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
}

impl ClickMetadata {
    /// Stable digest of the (IP, user-agent) pair that identifies a visitor
    pub fn visitor_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.ip_address.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.user_agent.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Result of recording a click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickOutcome {
    pub unique: bool,
    pub earnings_micros: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(ip: &str, ua: &str) -> ClickMetadata {
        ClickMetadata {
            ip_address: ip.to_string(),
            user_agent: ua.to_string(),
            referer: String::new(),
        }
    }

    #[test]
    fn test_visitor_key_ignores_referer() {
        let mut a = meta("1.2.3.4", "X");
        let b = meta("1.2.3.4", "X");
        a.referer = "https://google.com".to_string();
        assert_eq!(a.visitor_key(), b.visitor_key());
    }

    #[test]
    fn test_visitor_key_separates_fields() {
        assert_ne!(meta("1.2.3.4", "X").visitor_key(), meta("5.6.7.8", "X").visitor_key());
        assert_ne!(meta("1.2.3.4", "X").visitor_key(), meta("1.2.3.4", "Y").visitor_key());
        assert_ne!(meta("1.2.3.4a", "").visitor_key(), meta("1.2.3.4", "a").visitor_key());
    }
}
