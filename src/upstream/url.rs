//! Target URL validation.
//!
//! Every check fails closed: anything that does not parse as an absolute URL
//! with an accepted scheme is rejected, and no check touches the network.

use url::Url;

/// Schemes accepted for any target.
pub const ALLOWED_SCHEMES: [&str; 4] = ["http", "https", "ws", "wss"];

/// Schemes accepted for WebSocket relay targets.
pub const SOCKET_SCHEMES: [&str; 2] = ["ws", "wss"];

/// Returns true if `s` is an absolute URL with scheme http, https, ws or wss.
pub fn validate(s: &str) -> bool {
    parse_target(s).is_some()
}

/// Parse `s` as a forwarding target.
pub fn parse_target(s: &str) -> Option<Url> {
    parse_with(s, &ALLOWED_SCHEMES)
}

/// Parse `s` as a WebSocket relay target (ws or wss only).
pub fn parse_socket_target(s: &str) -> Option<Url> {
    parse_with(s, &SOCKET_SCHEMES)
}

fn parse_with(s: &str, schemes: &[&str]) -> Option<Url> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    let url = Url::parse(trimmed).ok()?;
    if !schemes.contains(&url.scheme()) || !url.has_host() {
        return None;
    }
    Some(url)
}
