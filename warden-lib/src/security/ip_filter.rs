use ipnet::IpNet;
use std::net::{IpAddr, SocketAddr};

/// Parse a client identifier into an IP address.
///
/// Accepts a bare address ("10.0.0.1", "::1") or a socket address
/// ("10.0.0.1:443", "[::1]:443"). Anything else yields `None`.
pub fn parse_client_ip(client: &str) -> Option<IpAddr> {
    let trimmed = client.trim();
    trimmed
        .parse::<IpAddr>()
        .ok()
        .or_else(|| trimmed.parse::<SocketAddr>().ok().map(|s| s.ip()))
}

/// Check if a client belongs to one of the exempt networks
///
/// Returns `true` if the client should bypass limiting.
///
/// # Logic:
/// - Empty exempt list: nobody is exempt
/// - Client identifiers that are not IP addresses are never exempt
pub fn is_exempt(client: &str, exempt: &[IpNet]) -> bool {
    if exempt.is_empty() {
        return false;
    }
    match parse_client_ip(client) {
        Some(ip) => exempt.iter().any(|net| net.contains(&ip)),
        None => false,
    }
}
