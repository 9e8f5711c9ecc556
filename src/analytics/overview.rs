//! Dashboard overview: lifetime totals, period-over-period change and a
//! daily click/earnings series.

use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::analytics::time_range::{TimeRange, Window};
use crate::models::money::serialize_micros;
use crate::models::ClickEvent;
use crate::storage::{LinkSummary, Storage};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    /// ISO date, `YYYY-MM-DD`
    pub date: String,
    /// Chart label, `M/D`
    pub label: String,
    pub clicks: i64,
    #[serde(rename = "earnings", serialize_with = "serialize_micros")]
    pub earnings_micros: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    #[serde(rename = "balance", serialize_with = "serialize_micros")]
    pub balance_micros: i64,
    pub total_clicks: i64,
    #[serde(rename = "totalEarnings", serialize_with = "serialize_micros")]
    pub total_earnings_micros: i64,
    pub clicks_percent_change: f64,
    pub earnings_percent_change: f64,
    pub active_urls_count: i64,
    pub new_urls_count: i64,
    pub avg_earnings_per_click: f64,
    pub daily_data: Vec<DailyPoint>,
}

/// `(current - previous) / previous * 100`, or 0 when there is no baseline
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

/// One zero-seeded entry per UTC calendar day in `[window.start, window.end]`,
/// filled with the events that fall on those days.
pub fn daily_series(window: Window, events: &[ClickEvent]) -> Vec<DailyPoint> {
    let first = window.start.date_naive();
    let last = window.end.date_naive();

    let mut days: BTreeMap<NaiveDate, (i64, i64)> = first
        .iter_days()
        .take_while(|day| *day <= last)
        .map(|day| (day, (0, 0)))
        .collect();

    for event in events {
        let Some(created) = DateTime::from_timestamp(event.created_at, 0) else {
            continue;
        };
        if let Some((clicks, earnings)) = days.get_mut(&created.date_naive()) {
            *clicks += 1;
            *earnings += event.earnings_micros;
        }
    }

    days.into_iter()
        .map(|(day, (clicks, earnings_micros))| DailyPoint {
            date: day.format("%Y-%m-%d").to_string(),
            label: format!("{}/{}", day.month(), day.day()),
            clicks,
            earnings_micros,
        })
        .collect()
}

fn sum_earnings(events: &[ClickEvent]) -> i64 {
    events.iter().map(|e| e.earnings_micros).sum()
}

pub fn build_overview(
    window: Window,
    summary: LinkSummary,
    balance_micros: i64,
    current: &[ClickEvent],
    previous: &[ClickEvent],
) -> Overview {
    let current_clicks = current.len() as f64;
    let previous_clicks = previous.len() as f64;
    let current_earnings = sum_earnings(current);
    let previous_earnings = sum_earnings(previous);

    let avg_earnings_per_click = if current.is_empty() {
        0.0
    } else {
        crate::models::micros_to_amount(current_earnings) / current_clicks
    };

    Overview {
        balance_micros,
        total_clicks: summary.total_clicks,
        total_earnings_micros: summary.total_earnings_micros,
        clicks_percent_change: percent_change(current_clicks, previous_clicks),
        earnings_percent_change: percent_change(
            current_earnings as f64,
            previous_earnings as f64,
        ),
        active_urls_count: summary.link_count,
        new_urls_count: summary.new_link_count,
        avg_earnings_per_click,
        daily_data: daily_series(window, current),
    }
}

pub async fn load_overview(
    storage: &dyn Storage,
    user_id: i64,
    range: TimeRange,
    now: DateTime<Utc>,
) -> Result<Overview> {
    let window = range.window(now);
    let previous_window = range.previous_window(now);

    let summary = storage
        .link_summary(user_id, window.start.timestamp())
        .await?;

    let current = storage
        .list_click_events(user_id, window.start.timestamp(), Some(window.end.timestamp()))
        .await?;

    let previous = storage
        .list_click_events(
            user_id,
            previous_window.start.timestamp(),
            Some(previous_window.end.timestamp()),
        )
        .await?;

    let balance_micros = storage
        .get_user(user_id)
        .await?
        .map(|user| user.balance_micros)
        .unwrap_or(0);

    Ok(build_overview(
        window,
        summary,
        balance_micros,
        &current,
        &previous,
    ))
}
