//! Rolling analytics windows

use chrono::{DateTime, Duration, Months, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    SevenDays,
    #[default]
    ThirtyDays,
    NinetyDays,
    TwelveMonths,
}

impl TimeRange {
    /// Parses `7d`, `30d`, `90d` or `12m`; anything else selects 30 days
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("7d") => TimeRange::SevenDays,
            Some("30d") => TimeRange::ThirtyDays,
            Some("90d") => TimeRange::NinetyDays,
            Some("12m") => TimeRange::TwelveMonths,
            _ => TimeRange::ThirtyDays,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::SevenDays => "7d",
            TimeRange::ThirtyDays => "30d",
            TimeRange::NinetyDays => "90d",
            TimeRange::TwelveMonths => "12m",
        }
    }

    /// Moves `at` back by one window length
    pub fn shift_back(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeRange::SevenDays => at - Duration::days(7),
            TimeRange::ThirtyDays => at - Duration::days(30),
            TimeRange::NinetyDays => at - Duration::days(90),
            TimeRange::TwelveMonths => at
                .checked_sub_months(Months::new(12))
                .unwrap_or_else(|| at - Duration::days(365)),
        }
    }

    /// Current window `[start, now]`
    pub fn window(&self, now: DateTime<Utc>) -> Window {
        Window {
            start: self.shift_back(now),
            end: now,
        }
    }

    /// The window immediately preceding the current one
    pub fn previous_window(&self, now: DateTime<Utc>) -> Window {
        let current = self.window(now);
        Window {
            start: self.shift_back(current.start),
            end: self.shift_back(current.end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Query string shared by the analytics endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub time_range: Option<String>,
    pub metric: Option<String>,
    pub limit: Option<i64>,
}

impl AnalyticsQuery {
    pub fn range(&self) -> TimeRange {
        TimeRange::parse(self.time_range.as_deref())
    }
}
