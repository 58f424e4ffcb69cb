//! Inbound request description handed to the forwarding core.

use axum::http::{HeaderMap, Method};
use bytes::Bytes;

use crate::upstream::headers::HeaderPolicy;

/// What the routing layer extracted from an inbound request.
///
/// Built once per request and consumed by the Forwarder or the Downloader.
/// Only headers some outbound table can read are kept.
#[derive(Debug, Clone)]
pub struct ForwardSpec {
    pub method: Method,
    pub target: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Caller query pairs in order, without the target parameter.
    pub query: Vec<(String, String)>,
}

impl ForwardSpec {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: None,
            query: Vec::new(),
        }
    }

    /// Keep the inbound headers `policy` reads, dropping everything else.
    pub fn with_headers(mut self, inbound: &HeaderMap, policy: &HeaderPolicy) -> Self {
        for name in policy.inbound_names() {
            if let Some(value) = inbound.get(name) {
                self.headers.insert(name.clone(), value.clone());
            }
        }
        self
    }

    /// Attach a body. Empty bodies count as absent.
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = if body.is_empty() { None } else { Some(body) };
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn keeps_only_policy_headers() {
        let mut inbound = HeaderMap::new();
        inbound.insert("authorization", HeaderValue::from_static("Bearer t"));
        inbound.insert("cookie", HeaderValue::from_static("session=1"));
        inbound.insert("range", HeaderValue::from_static("bytes=0-9"));

        let policy = HeaderPolicy::download("ua");
        let spec = ForwardSpec::new(Method::GET, "http://x.com").with_headers(&inbound, &policy);

        assert_eq!(spec.headers.len(), 2);
        assert!(spec.headers.get("cookie").is_none());
    }

    #[test]
    fn empty_body_is_absent() {
        let spec = ForwardSpec::new(Method::POST, "http://x.com").with_body(Bytes::new());
        assert!(spec.body.is_none());
    }
}
