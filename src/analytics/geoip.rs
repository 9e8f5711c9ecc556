//! Static IPv4 country lookup
//!
//! A small hand-maintained table of IPv4 ranges mapped to country names.
//! Lookup is a linear scan and the first containing range wins, so more
//! specific ranges that overlap a broader one must come before it.

pub const LOCAL_NETWORK: &str = "Local Network";
pub const UNKNOWN: &str = "Unknown";

struct IpRange {
    start: u32,
    end: u32,
    country: &'static str,
}

const fn v4(a: u8, b: u8, c: u8, d: u8) -> u32 {
    ((a as u32) << 24) | ((b as u32) << 16) | ((c as u32) << 8) | d as u32
}

const fn range(start: u32, end: u32, country: &'static str) -> IpRange {
    IpRange {
        start,
        end,
        country,
    }
}

const IP_RANGES: &[IpRange] = &[
    // United States
    range(v4(3, 0, 0, 0), v4(3, 255, 255, 255), "United States"),
    range(v4(4, 0, 0, 0), v4(4, 255, 255, 255), "United States"),
    range(v4(8, 0, 0, 0), v4(8, 255, 255, 255), "United States"),
    // United Kingdom
    range(v4(51, 0, 0, 0), v4(51, 255, 255, 255), "United Kingdom"),
    range(v4(62, 0, 0, 0), v4(62, 255, 255, 255), "United Kingdom"),
    range(v4(86, 0, 0, 0), v4(86, 255, 255, 255), "United Kingdom"),
    // Germany
    range(v4(77, 0, 0, 0), v4(77, 255, 255, 255), "Germany"),
    range(v4(178, 0, 0, 0), v4(178, 255, 255, 255), "Germany"),
    // Canada
    range(v4(24, 0, 0, 0), v4(24, 255, 255, 255), "Canada"),
    range(v4(99, 224, 0, 0), v4(99, 239, 255, 255), "Canada"),
    // Australia
    range(v4(1, 120, 0, 0), v4(1, 127, 255, 255), "Australia"),
    range(v4(203, 0, 0, 0), v4(203, 63, 255, 255), "Australia"),
    // France
    range(v4(80, 0, 0, 0), v4(80, 255, 255, 255), "France"),
    range(v4(90, 0, 0, 0), v4(90, 255, 255, 255), "France"),
    // Japan
    range(v4(133, 0, 0, 0), v4(133, 255, 255, 255), "Japan"),
    range(v4(126, 0, 0, 0), v4(126, 255, 255, 255), "Japan"),
    // Brazil
    range(v4(177, 0, 0, 0), v4(177, 255, 255, 255), "Brazil"),
    range(v4(191, 0, 0, 0), v4(191, 255, 255, 255), "Brazil"),
    // China
    range(v4(58, 0, 0, 0), v4(58, 255, 255, 255), "China"),
    range(v4(59, 0, 0, 0), v4(59, 255, 255, 255), "China"),
    range(v4(123, 0, 0, 0), v4(123, 255, 255, 255), "China"),
    // India
    range(v4(117, 0, 0, 0), v4(117, 255, 255, 255), "India"),
    range(v4(122, 0, 0, 0), v4(122, 255, 255, 255), "India"),
    range(v4(103, 0, 0, 0), v4(103, 255, 255, 255), "India"),
    // Russia
    range(v4(5, 0, 0, 0), v4(5, 255, 255, 255), "Russia"),
    range(v4(178, 64, 0, 0), v4(178, 127, 255, 255), "Russia"),
    // South Korea
    range(v4(1, 208, 0, 0), v4(1, 223, 255, 255), "South Korea"),
    range(v4(175, 192, 0, 0), v4(175, 223, 255, 255), "South Korea"),
    // Indonesia
    range(v4(36, 64, 0, 0), v4(36, 127, 255, 255), "Indonesia"),
    range(v4(110, 136, 0, 0), v4(110, 143, 255, 255), "Indonesia"),
    // South Africa
    range(v4(41, 0, 0, 0), v4(41, 255, 255, 255), "South Africa"),
    range(v4(102, 128, 0, 0), v4(102, 191, 255, 255), "South Africa"),
    // Bangladesh
    range(v4(103, 4, 12, 0), v4(103, 4, 15, 255), "Bangladesh"),
    range(v4(103, 48, 16, 0), v4(103, 48, 31, 255), "Bangladesh"),
    range(v4(103, 112, 96, 0), v4(103, 112, 127, 255), "Bangladesh"),
    range(v4(114, 130, 0, 0), v4(114, 130, 127, 255), "Bangladesh"),
    range(v4(103, 152, 84, 0), v4(103, 152, 87, 255), "Bangladesh"),
    range(v4(203, 76, 96, 0), v4(203, 76, 127, 255), "Bangladesh"),
    range(v4(27, 147, 128, 0), v4(27, 147, 191, 255), "Bangladesh"),
    range(v4(103, 4, 144, 0), v4(103, 4, 151, 255), "Bangladesh"),
    range(v4(203, 112, 160, 0), v4(203, 112, 191, 255), "Bangladesh"),
    range(v4(45, 112, 48, 0), v4(45, 112, 63, 255), "Bangladesh"),
];

/// Packs a dotted quad into a big-endian integer.
///
/// Anything that is not exactly four decimal octets packs to 0, which no
/// table range contains.
pub fn ip_to_key(ip: &str) -> u32 {
    let octets: Vec<&str> = ip.trim().split('.').collect();
    if octets.len() != 4 {
        return 0;
    }

    let mut key = 0u32;
    for octet in octets {
        match octet.parse::<u8>() {
            Ok(value) => key = (key << 8) | value as u32,
            Err(_) => return 0,
        }
    }
    key
}

fn is_local_prefix(ip: &str) -> bool {
    if ip.starts_with("127.") || ip.starts_with("10.") || ip.starts_with("192.168.") {
        return true;
    }

    if let Some(rest) = ip.strip_prefix("172.") {
        return rest
            .split('.')
            .next()
            .and_then(|second| second.parse::<u8>().ok())
            .is_some_and(|second| (16..=31).contains(&second));
    }

    false
}

/// Resolve a country label for a dotted-quad IP string.
///
/// Returns the first matching table country, [`LOCAL_NETWORK`] for loopback
/// and RFC 1918 prefixes, or [`UNKNOWN`].
pub fn country_for_ip(ip: &str) -> &'static str {
    let ip = ip.trim();
    if ip.is_empty() {
        return UNKNOWN;
    }

    let key = ip_to_key(ip);
    if let Some(range) = IP_RANGES
        .iter()
        .find(|range| key >= range.start && key <= range.end)
    {
        return range.country;
    }

    if is_local_prefix(ip) {
        return LOCAL_NETWORK;
    }

    UNKNOWN
}
