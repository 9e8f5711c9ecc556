//! Click analytics
//!
//! Read paths over recorded click events: the dashboard overview, top links
//! and audience breakdowns. Each path has a pure builder that works on a
//! slice of events and an async loader that pulls those events from storage.

pub mod audience;
pub mod geoip;
pub mod ip_extractor;
pub mod overview;
pub mod time_range;
pub mod top_links;

pub use audience::{build_audience, load_audience, Audience, Share};
pub use geoip::country_for_ip;
pub use ip_extractor::extract_client_ip;
pub use overview::{build_overview, load_overview, DailyPoint, Overview};
pub use time_range::{AnalyticsQuery, TimeRange, Window};
pub use top_links::{clamp_limit, load_top_links, rank_top_links, RankMetric, TopLink};
