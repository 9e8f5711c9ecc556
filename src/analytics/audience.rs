//! Audience breakdowns by device, traffic source and location

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::analytics::geoip::{country_for_ip, UNKNOWN};
use crate::analytics::time_range::TimeRange;
use crate::models::ClickEvent;
use crate::storage::Storage;

const OTHER_LOCATION: &str = "Other";
const TOP_LOCATIONS: usize = 5;

const SOCIAL_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "linkedin.com",
    "pinterest.com",
    "tiktok.com",
    "reddit.com",
    "tumblr.com",
    "snapchat.com",
    "youtube.com",
    "vimeo.com",
    "discord.com",
    "whatsapp.com",
    "telegram.org",
    "t.me",
    "fb.com",
    "fb.me",
    "lnkd.in",
    "pin.it",
];

const SEARCH_DOMAINS: &[&str] = &[
    "google.com",
    "google.",
    "bing.com",
    "yahoo.com",
    "duckduckgo.com",
    "baidu.com",
    "yandex.com",
    "ecosia.org",
    "ask.com",
    "aol.com",
    "search.",
    "qwant.com",
    "startpage.com",
    "searchencrypt.com",
];

const EMAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "outlook.com",
    "yahoo.com",
    "mail.",
    "hotmail.com",
    "protonmail.com",
    "zoho.com",
    "icloud.com",
    "aol.com",
    "gmx.",
    "webmail.",
    "email.",
    "inbox.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceKind {
    const ALL: [DeviceKind; 3] = [DeviceKind::Desktop, DeviceKind::Mobile, DeviceKind::Tablet];

    pub fn label(&self) -> &'static str {
        match self {
            DeviceKind::Desktop => "Desktop",
            DeviceKind::Mobile => "Mobile",
            DeviceKind::Tablet => "Tablet",
        }
    }

    /// Substring tests are case-sensitive
    pub fn classify(user_agent: &str) -> Self {
        if user_agent.contains("Mobile") || user_agent.contains("Android") {
            if user_agent.contains("iPad") || user_agent.contains("Tablet") {
                DeviceKind::Tablet
            } else {
                DeviceKind::Mobile
            }
        } else {
            DeviceKind::Desktop
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficSource {
    Direct,
    Social,
    Search,
    Email,
    Other,
}

impl TrafficSource {
    const ALL: [TrafficSource; 5] = [
        TrafficSource::Direct,
        TrafficSource::Social,
        TrafficSource::Search,
        TrafficSource::Email,
        TrafficSource::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TrafficSource::Direct => "Direct",
            TrafficSource::Social => "Social Media",
            TrafficSource::Search => "Search Engines",
            TrafficSource::Email => "Email",
            TrafficSource::Other => "Other Websites",
        }
    }

    /// Domain lists are checked in order: social, search, then email
    pub fn classify(referer: &str) -> Self {
        let referer = referer.to_lowercase();
        let matches_any = |domains: &[&str]| domains.iter().any(|d| referer.contains(d));

        if referer.is_empty() || referer == "direct" || referer.contains("bookmark") {
            TrafficSource::Direct
        } else if matches_any(SOCIAL_DOMAINS) {
            TrafficSource::Social
        } else if matches_any(SEARCH_DOMAINS) {
            TrafficSource::Search
        } else if matches_any(EMAIL_DOMAINS) {
            TrafficSource::Email
        } else {
            TrafficSource::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Share {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Audience {
    pub device_data: Vec<Share>,
    pub referrer_data: Vec<Share>,
    pub location_data: Vec<Share>,
    pub total_clicks: i64,
}

/// Rounded percentages of `total` that sum to exactly 100.
///
/// The first bucket holding the largest rounded value absorbs the rounding
/// remainder. With `total == 0` every bucket is 0.
pub fn percentages(counts: &[u64], total: u64) -> Vec<i64> {
    if total == 0 {
        return vec![0; counts.len()];
    }

    let mut values: Vec<i64> = counts
        .iter()
        .map(|count| (*count as f64 / total as f64 * 100.0).round() as i64)
        .collect();

    let sum: i64 = values.iter().sum();
    if sum != 100 {
        let max = values.iter().copied().max().unwrap_or(0);
        if let Some(slot) = values.iter_mut().find(|v| **v == max) {
            *slot += 100 - sum;
        }
    }
    values
}

fn shares(names: Vec<String>, counts: &[u64], total: u64) -> Vec<Share> {
    names
        .into_iter()
        .zip(percentages(counts, total))
        .map(|(name, value)| Share { name, value })
        .collect()
}

pub fn device_breakdown(events: &[ClickEvent]) -> Vec<Share> {
    let mut counts: HashMap<DeviceKind, u64> = HashMap::new();
    for event in events {
        *counts.entry(DeviceKind::classify(&event.user_agent)).or_default() += 1;
    }

    let ordered: Vec<u64> = DeviceKind::ALL
        .iter()
        .map(|kind| counts.get(kind).copied().unwrap_or(0))
        .collect();
    let names = DeviceKind::ALL.iter().map(|k| k.label().to_string()).collect();
    shares(names, &ordered, events.len() as u64)
}

pub fn referrer_breakdown(events: &[ClickEvent]) -> Vec<Share> {
    let mut counts: HashMap<TrafficSource, u64> = HashMap::new();
    for event in events {
        *counts.entry(TrafficSource::classify(&event.referer)).or_default() += 1;
    }

    let ordered: Vec<u64> = TrafficSource::ALL
        .iter()
        .map(|source| counts.get(source).copied().unwrap_or(0))
        .collect();
    let names = TrafficSource::ALL.iter().map(|s| s.label().to_string()).collect();
    shares(names, &ordered, events.len() as u64)
}

/// The five most common countries followed by `Other`, which also carries
/// unresolved addresses. `Other` is omitted when empty.
pub fn location_breakdown(events: &[ClickEvent]) -> Vec<Share> {
    if events.is_empty() {
        return Vec::new();
    }

    let mut by_country: HashMap<&'static str, u64> = HashMap::new();
    let mut other = 0u64;
    for event in events {
        match country_for_ip(&event.ip_address) {
            UNKNOWN => other += 1,
            country => *by_country.entry(country).or_default() += 1,
        }
    }

    let mut ranked: Vec<(&'static str, u64)> = by_country.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut names = Vec::new();
    let mut counts = Vec::new();
    for (index, (country, count)) in ranked.into_iter().enumerate() {
        if index < TOP_LOCATIONS {
            names.push(country.to_string());
            counts.push(count);
        } else {
            other += count;
        }
    }
    if other > 0 {
        names.push(OTHER_LOCATION.to_string());
        counts.push(other);
    }

    shares(names, &counts, events.len() as u64)
}

pub fn build_audience(events: &[ClickEvent]) -> Audience {
    Audience {
        device_data: device_breakdown(events),
        referrer_data: referrer_breakdown(events),
        location_data: location_breakdown(events),
        total_clicks: events.len() as i64,
    }
}

pub async fn load_audience(
    storage: &dyn Storage,
    user_id: i64,
    range: TimeRange,
    now: DateTime<Utc>,
) -> Result<Audience> {
    let window = range.window(now);
    let events = storage
        .list_click_events(user_id, window.start.timestamp(), None)
        .await?;

    Ok(build_audience(&events))
}
