//! Header allow-lists.
//!
//! Outbound headers are built from an explicit table: each entry names a
//! header and a rule saying where its value comes from. Nothing outside the
//! table is ever sent upstream, and nothing outside the response allow-sets
//! is ever copied back to the caller.

use axum::http::{
    header::{
        ACCEPT, ACCEPT_RANGES, AUTHORIZATION, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH,
        CONTENT_TYPE, ETAG, LAST_MODIFIED, RANGE, USER_AGENT,
    },
    HeaderMap, HeaderName, HeaderValue,
};

/// Fallback identifier when the configured user agent is not a valid header value.
pub const DEFAULT_USER_AGENT: &str = concat!("relay-proxy/", env!("CARGO_PKG_VERSION"));

/// Upstream headers copied into a buffered forward result.
pub const FORWARD_RESPONSE_HEADERS: [HeaderName; 5] =
    [CONTENT_TYPE, CONTENT_LENGTH, CACHE_CONTROL, ETAG, LAST_MODIFIED];

/// Upstream headers copied into a streamed download.
pub const DOWNLOAD_RESPONSE_HEADERS: [HeaderName; 7] = [
    CONTENT_TYPE,
    CONTENT_LENGTH,
    CACHE_CONTROL,
    ETAG,
    LAST_MODIFIED,
    CONTENT_DISPOSITION,
    ACCEPT_RANGES,
];

/// Where an outbound header's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderRule {
    /// Copy the inbound value; fall back to `default` when absent.
    Inbound { default: Option<HeaderValue> },
    /// Always send this value, whatever the caller sent.
    Fixed(HeaderValue),
}

#[derive(Debug, Clone)]
pub struct HeaderEntry {
    pub name: HeaderName,
    pub rule: HeaderRule,
}

impl HeaderEntry {
    fn inbound(name: HeaderName) -> Self {
        Self {
            name,
            rule: HeaderRule::Inbound { default: None },
        }
    }

    fn inbound_or(name: HeaderName, default: &'static str) -> Self {
        Self {
            name,
            rule: HeaderRule::Inbound {
                default: Some(HeaderValue::from_static(default)),
            },
        }
    }

    fn fixed(name: HeaderName, value: HeaderValue) -> Self {
        Self {
            name,
            rule: HeaderRule::Fixed(value),
        }
    }
}

/// An ordered outbound header table.
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    entries: Vec<HeaderEntry>,
}

impl HeaderPolicy {
    /// Table for buffered forwarding.
    pub fn forwarding(user_agent: &str, custom_header: Option<&str>) -> Self {
        let mut entries = vec![
            HeaderEntry::inbound_or(CONTENT_TYPE, "application/json"),
            HeaderEntry::fixed(USER_AGENT, user_agent_value(user_agent)),
            HeaderEntry::inbound_or(ACCEPT, "application/json"),
            HeaderEntry::inbound(AUTHORIZATION),
        ];
        if let Some(name) = custom_header.and_then(|h| HeaderName::from_bytes(h.as_bytes()).ok()) {
            entries.push(HeaderEntry::inbound(name));
        }
        Self { entries }
    }

    /// Table for streamed downloads.
    pub fn download(user_agent: &str) -> Self {
        Self {
            entries: vec![
                HeaderEntry::fixed(USER_AGENT, user_agent_value(user_agent)),
                HeaderEntry::fixed(ACCEPT, HeaderValue::from_static("*/*")),
                HeaderEntry::inbound(AUTHORIZATION),
                HeaderEntry::inbound(RANGE),
            ],
        }
    }

    /// Names of the inbound headers this table may read.
    pub fn inbound_names(&self) -> impl Iterator<Item = &HeaderName> {
        self.entries
            .iter()
            .filter(|e| matches!(e.rule, HeaderRule::Inbound { .. }))
            .map(|e| &e.name)
    }

    /// Build the outbound header map from the caller's headers.
    pub fn apply(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::with_capacity(self.entries.len());
        for entry in &self.entries {
            let value = match &entry.rule {
                HeaderRule::Fixed(value) => Some(value.clone()),
                HeaderRule::Inbound { default } => inbound
                    .get(&entry.name)
                    .cloned()
                    .or_else(|| default.clone()),
            };
            if let Some(value) = value {
                out.insert(entry.name.clone(), value);
            }
        }
        out
    }
}

fn user_agent_value(user_agent: &str) -> HeaderValue {
    HeaderValue::from_str(user_agent)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT))
}

/// The three CORS headers every forward result carries.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET, POST, PUT, DELETE, PATCH, OPTIONS"),
    ("access-control-allow-headers", "Content-Type, Authorization, X-Requested-With"),
];

/// Overwrite the CORS headers in `headers` with the fixed set.
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

/// Copy only the `allowed` headers from an upstream response.
pub fn copy_allowed(upstream: &HeaderMap, allowed: &[HeaderName]) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(allowed.len());
    for name in allowed {
        if let Some(value) = upstream.get(name) {
            out.insert(name.clone(), value.clone());
        }
    }
    out
}
