//! Client IP extraction from HTTP headers with trust validation
//!
//! - `None` mode: the socket peer address, headers are ignored
//! - `Standard` mode: `Forwarded` then `X-Forwarded-For`, walked right-to-left
//!   past a fixed number of hops or past addresses in trusted CIDRs
//! - `Cloudflare` mode: `CF-Connecting-IP`
//!
//! Whatever address is chosen, IPv4-mapped IPv6 addresses are reduced to plain
//! IPv4 so the geo lookup sees a dotted quad.

use axum::http::HeaderMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::{ClientIpConfig, TrustedProxyMode};

pub fn extract_client_ip(headers: &HeaderMap, socket_addr: IpAddr, config: &ClientIpConfig) -> IpAddr {
    let ip = match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => extract_standard_ip(headers, socket_addr, config),
        TrustedProxyMode::None => socket_addr,
    };
    ip.to_canonical()
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

fn extract_standard_ip(headers: &HeaderMap, socket_addr: IpAddr, config: &ClientIpConfig) -> IpAddr {
    let chain = forwarded_chain(headers)
        .or_else(|| x_forwarded_for_chain(headers))
        .unwrap_or_default();

    if chain.is_empty() {
        return socket_addr;
    }

    select_from_chain(&chain, config)
}

/// `for=` addresses of an RFC 7239 `Forwarded` header, leftmost first
fn forwarded_chain(headers: &HeaderMap) -> Option<Vec<IpAddr>> {
    let forwarded = headers.get("forwarded")?.to_str().ok()?;

    let chain: Vec<IpAddr> = forwarded
        .split(',')
        .flat_map(|element| element.split(';'))
        .filter_map(|param| {
            let param = param.trim();
            let (key, value) = param.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case("for") {
                return None;
            }
            parse_forwarded_node(value.trim())
        })
        .collect();

    if chain.is_empty() {
        None
    } else {
        Some(chain)
    }
}

/// Accepts `192.0.2.60`, `"192.0.2.60:8080"`, `"[2001:db8::1]:4711"`
fn parse_forwarded_node(value: &str) -> Option<IpAddr> {
    let value = value.trim_matches('"');

    if let Some(rest) = value.strip_prefix('[') {
        let (addr, _) = rest.split_once(']')?;
        return addr.parse().ok();
    }

    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }

    // IPv4 with port
    let (addr, _) = value.rsplit_once(':')?;
    addr.parse().ok()
}

fn x_forwarded_for_chain(headers: &HeaderMap) -> Option<Vec<IpAddr>> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    let chain: Vec<IpAddr> = xff
        .split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    if chain.is_empty() {
        None
    } else {
        Some(chain)
    }
}

/// Pick the client out of a non-empty proxy chain.
///
/// With a hop count, skip that many entries from the right. With trusted
/// CIDRs, take the rightmost entry outside them. Otherwise the rightmost entry
/// is the only one a single proxy vouches for.
fn select_from_chain(chain: &[IpAddr], config: &ClientIpConfig) -> IpAddr {
    let leftmost = chain[0];

    if let Some(hops) = config.num_trusted_proxies {
        return if chain.len() > hops {
            chain[chain.len() - hops - 1]
        } else {
            leftmost
        };
    }

    if !config.trusted_proxies.is_empty() {
        return chain
            .iter()
            .rev()
            .find(|ip| !config.trusted_proxies.iter().any(|net| net.contains(*ip)))
            .copied()
            .unwrap_or(leftmost);
    }

    chain[chain.len() - 1]
}
