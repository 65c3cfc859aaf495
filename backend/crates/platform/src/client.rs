//! Client identification utilities
//!
//! Common functions for identifying clients via HTTP headers.

use axum::http::{HeaderMap, header};
use std::net::IpAddr;

/// Maximum stored User-Agent length
const MAX_USER_AGENT_LENGTH: usize = 512;

/// Request origin details recorded with sessions and audit entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client IP address (socket peer, or forwarded hop behind a trusted proxy)
    pub ip: Option<IpAddr>,
    /// User-Agent string, truncated to a bounded length
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn new(ip: Option<IpAddr>, user_agent: Option<String>) -> Self {
        Self { ip, user_agent }
    }

    /// Build from request headers and the direct connection address
    ///
    /// `X-Forwarded-For` is only read when `direct_ip` is one of
    /// `trusted_proxies`.
    pub fn from_headers(
        headers: &HeaderMap,
        direct_ip: Option<IpAddr>,
        trusted_proxies: &[IpAddr],
    ) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(MAX_USER_AGENT_LENGTH).collect());

        Self {
            ip: extract_client_ip(headers, direct_ip, trusted_proxies),
            user_agent,
        }
    }

    /// Get IP as string (for database storage and rate-limit keys)
    pub fn ip_string(&self) -> Option<String> {
        self.ip.map(|ip| ip.to_string())
    }

    /// IP rendered for identifiers; `unknown` when not determinable
    pub fn ip_or_unknown(&self) -> String {
        self.ip_string().unwrap_or_else(|| "unknown".to_string())
    }
}

/// Extract client IP address from headers
///
/// The socket peer is the client unless it is a trusted proxy. Behind a
/// trusted proxy, `X-Forwarded-For` is walked right to left and the first
/// hop that is not itself a trusted proxy is the client. Entries left of
/// that hop are client-supplied and ignored.
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    let peer = direct_ip?;
    if !trusted_proxies.contains(&peer) {
        return Some(peer);
    }

    let hops = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect::<Vec<_>>();

    let mut client = peer;
    for hop in hops.iter().rev() {
        // A malformed hop breaks the chain; keep the last proxy seen
        let Ok(ip) = hop.parse::<IpAddr>() else {
            break;
        };
        client = ip;
        if !trusted_proxies.contains(&ip) {
            break;
        }
    }
    Some(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_client_info_from_headers() {
        let mut headers = forwarded("203.0.113.9");
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 Test Browser"),
        );

        let info = ClientInfo::from_headers(&headers, Some(ip("10.0.0.1")), &[ip("10.0.0.1")]);
        assert_eq!(info.user_agent.as_deref(), Some("Mozilla/5.0 Test Browser"));
        assert_eq!(info.ip_string().as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_client_info_missing_everything() {
        let info = ClientInfo::from_headers(&HeaderMap::new(), None, &[]);
        assert!(info.user_agent.is_none());
        assert_eq!(info.ip_or_unknown(), "unknown");
    }

    #[test]
    fn test_user_agent_truncated() {
        let mut headers = HeaderMap::new();
        let long = "a".repeat(MAX_USER_AGENT_LENGTH + 100);
        headers.insert(header::USER_AGENT, HeaderValue::from_str(&long).unwrap());

        let info = ClientInfo::from_headers(&headers, None, &[]);
        assert_eq!(info.user_agent.unwrap().len(), MAX_USER_AGENT_LENGTH);
    }

    #[test]
    fn test_forwarded_for_ignored_from_untrusted_peer() {
        let headers = forwarded("192.168.1.1");
        let peer = ip("198.51.100.7");

        assert_eq!(extract_client_ip(&headers, Some(peer), &[]), Some(peer));
        assert_eq!(
            extract_client_ip(&headers, Some(peer), &[ip("10.0.0.1")]),
            Some(peer)
        );
    }

    #[test]
    fn test_forwarded_for_takes_rightmost_untrusted_hop() {
        let headers = forwarded("1.2.3.4, 203.0.113.9, 10.0.0.2");
        let trusted = [ip("10.0.0.1"), ip("10.0.0.2")];

        let client = extract_client_ip(&headers, Some(ip("10.0.0.1")), &trusted);
        assert_eq!(client, Some(ip("203.0.113.9")));
    }

    #[test]
    fn test_forwarded_for_all_trusted_uses_leftmost() {
        let headers = forwarded("10.0.0.2");
        let trusted = [ip("10.0.0.1"), ip("10.0.0.2")];

        let client = extract_client_ip(&headers, Some(ip("10.0.0.1")), &trusted);
        assert_eq!(client, Some(ip("10.0.0.2")));
    }

    #[test]
    fn test_forwarded_for_malformed_hop_stops_walk() {
        let headers = forwarded("203.0.113.9, garbage");
        let trusted = [ip("10.0.0.1")];

        let client = extract_client_ip(&headers, Some(ip("10.0.0.1")), &trusted);
        assert_eq!(client, Some(ip("10.0.0.1")));
    }

    #[test]
    fn test_extract_client_ip_direct() {
        let headers = HeaderMap::new();
        let direct = ip("127.0.0.1");

        assert_eq!(extract_client_ip(&headers, Some(direct), &[direct]), Some(direct));
        assert_eq!(extract_client_ip(&headers, None, &[]), None);
    }
}
