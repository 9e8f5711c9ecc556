use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::money::serialize_micros;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShortLink {
    pub id: i64,
    #[serde(rename = "shortUrl")]
    pub slug: String,
    pub original_url: String,
    pub user_id: i64,
    pub clicks: i64,
    #[serde(rename = "earnings", serialize_with = "serialize_micros")]
    pub earnings_micros: i64,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlRequest {
    pub original_url: Option<String>,
    pub custom_slug: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUrlRequest {
    pub original_url: Option<String>,
    pub short_url: Option<String>,
}

/// Validated owner edit applied by the storage layer
#[derive(Debug, Clone, Default)]
pub struct LinkUpdate {
    pub original_url: Option<String>,
    pub slug: Option<String>,
}
