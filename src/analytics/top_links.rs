//! Best-performing links over a window.
//!
//! Candidates are chosen by lifetime counters in storage and then re-ranked by
//! the activity inside the window. A link that is strong in the window but weak
//! overall can therefore be missing from the result.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::analytics::time_range::TimeRange;
use crate::models::money::serialize_micros;
use crate::models::{ClickEvent, ShortLink};
use crate::storage::Storage;

pub const DEFAULT_LIMIT: i64 = 5;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankMetric {
    #[default]
    Clicks,
    Earnings,
}

impl RankMetric {
    /// `earnings` selects earnings, anything else ranks by clicks
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("earnings") => RankMetric::Earnings,
            _ => RankMetric::Clicks,
        }
    }

    /// Column on `links` holding the lifetime value of this metric
    pub fn column(&self) -> &'static str {
        match self {
            RankMetric::Clicks => "clicks",
            RankMetric::Earnings => "earnings_micros",
        }
    }
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopLink {
    /// Short slug
    pub url: String,
    pub original_url: String,
    /// Clicks inside the window
    pub clicks: i64,
    #[serde(rename = "earnings", serialize_with = "serialize_micros")]
    pub earnings_micros: i64,
    pub total_clicks: i64,
    #[serde(rename = "totalEarnings", serialize_with = "serialize_micros")]
    pub total_earnings_micros: i64,
}

impl TopLink {
    fn period_value(&self, metric: RankMetric) -> i64 {
        match metric {
            RankMetric::Clicks => self.clicks,
            RankMetric::Earnings => self.earnings_micros,
        }
    }
}

/// Attach window counters to each candidate and sort by `metric` descending.
/// Ties keep the candidate order.
pub fn rank_top_links(
    candidates: Vec<ShortLink>,
    events: &[ClickEvent],
    metric: RankMetric,
) -> Vec<TopLink> {
    let mut per_link: HashMap<i64, (i64, i64)> = HashMap::new();
    for event in events {
        let entry = per_link.entry(event.link_id).or_default();
        entry.0 += 1;
        entry.1 += event.earnings_micros;
    }

    let mut ranked: Vec<TopLink> = candidates
        .into_iter()
        .map(|link| {
            let (clicks, earnings_micros) = per_link.get(&link.id).copied().unwrap_or_default();
            TopLink {
                url: link.slug,
                original_url: link.original_url,
                clicks,
                earnings_micros,
                total_clicks: link.clicks,
                total_earnings_micros: link.earnings_micros,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.period_value(metric).cmp(&a.period_value(metric)));
    ranked
}

pub async fn load_top_links(
    storage: &dyn Storage,
    user_id: i64,
    range: TimeRange,
    metric: RankMetric,
    limit: i64,
    now: DateTime<Utc>,
) -> Result<Vec<TopLink>> {
    let window = range.window(now);
    let candidates = storage.top_links(user_id, metric, limit).await?;
    let ids: Vec<i64> = candidates.iter().map(|link| link.id).collect();
    let events = storage
        .list_link_click_events(&ids, window.start.timestamp())
        .await?;

    Ok(rank_top_links(candidates, &events, metric))
}
