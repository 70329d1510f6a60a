//! Client identity used as the rate limiting key.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Used when neither proxy headers nor the peer address identify the caller.
pub const FALLBACK_CLIENT_ID: &str = "127.0.0.1";

/// Where the client address is taken from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientSource {
    /// The socket peer address. Proxy headers are ignored.
    #[default]
    Peer,
    /// Headers written by `hops` trusted reverse proxies in front of the service.
    ///
    /// `X-Real-IP` wins, otherwise the `X-Forwarded-For` entry `hops` positions from the
    /// right. Entries further left are supplied by the caller and never used.
    Proxy { hops: usize },
}

/// Resolve the client identifier for a request.
///
/// Only values that parse as an IP address are accepted from headers; anything else falls
/// back to the socket peer address.
#[must_use]
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>, source: ClientSource) -> String {
    if let ClientSource::Proxy { hops } = source {
        if let Some(ip) = real_ip(headers).or_else(|| forwarded_ip(headers, hops)) {
            return ip.to_string();
        }
    }

    peer.map_or_else(|| FALLBACK_CLIENT_ID.to_string(), |addr| addr.ip().to_string())
}

fn real_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

fn forwarded_ip(headers: &HeaderMap, hops: usize) -> Option<IpAddr> {
    let entries: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();

    let index = entries.len().checked_sub(hops.max(1))?;
    entries.get(index).and_then(|entry| entry.parse().ok())
}
