//! Outbound request options.
//!
//! # Responsibilities
//! - Derive host, port and path from the target URL
//! - Re-append the caller's own query parameters to the path
//! - Build outbound headers from the allow-list table
//! - Decide whether a body (and its content-length) is sent
//!
//! # Design Decisions
//! - Derived once per request and never mutated
//! - `ws`/`wss` targets are requested over `http`/`https`
//! - TLS verification is an explicit per-request flag

use std::time::Duration;

use axum::http::{header::CONTENT_LENGTH, HeaderMap, HeaderValue, Method};
use bytes::Bytes;
use url::{form_urlencoded, Url};

use crate::error::{ProxyError, ProxyResult};
use crate::forward::spec::ForwardSpec;
use crate::upstream::headers::HeaderPolicy;
use crate::upstream::url::parse_target;

/// Everything needed to issue one outbound request.
#[derive(Debug, Clone)]
pub struct OutboundOptions {
    pub scheme: &'static str,
    pub host: String,
    pub port: u16,
    /// Path plus query, including the re-appended caller parameters.
    pub path: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub verify_tls: bool,
    pub timeout: Duration,
}

/// Port used when the target does not name one.
pub fn default_port(scheme: &str) -> u16 {
    match scheme {
        "https" | "wss" => 443,
        _ => 80,
    }
}

/// Methods that carry a request body upstream.
pub fn sends_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Append caller query pairs to `path`, choosing `?` or `&` as separator.
pub fn append_query(path: &str, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return path.to_string();
    }
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}{}", path, separator, encoded)
}

impl OutboundOptions {
    /// Derive options from an inbound spec.
    ///
    /// Fails with `Validation` when the target is empty or not an accepted URL.
    pub fn from_spec(
        spec: &ForwardSpec,
        policy: &HeaderPolicy,
        timeout: Duration,
        verify_tls: bool,
    ) -> ProxyResult<Self> {
        if spec.target.trim().is_empty() {
            return Err(ProxyError::Validation("URL parameter is required".into()));
        }
        let url = parse_target(&spec.target)
            .ok_or_else(|| ProxyError::Validation(format!("Invalid URL provided: {}", spec.target)))?;
        let host = url
            .host_str()
            .ok_or_else(|| ProxyError::Validation(format!("URL has no host: {}", spec.target)))?
            .to_string();

        let scheme = match url.scheme() {
            "https" | "wss" => "https",
            _ => "http",
        };
        let port = url.port().unwrap_or_else(|| default_port(url.scheme()));

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        let path = append_query(&path, &spec.query);

        let mut headers = policy.apply(&spec.headers);
        let body = match &spec.body {
            Some(body) if sends_body(&spec.method) => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
                Some(body.clone())
            }
            _ => None,
        };

        Ok(Self {
            scheme,
            host,
            port,
            path,
            method: spec.method.clone(),
            headers,
            body,
            verify_tls,
            timeout,
        })
    }

    /// Full outbound URL.
    pub fn url(&self) -> ProxyResult<Url> {
        let raw = format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path);
        Url::parse(&raw)
            .map_err(|e| ProxyError::Transport(format!("failed to build outbound URL {}: {}", raw, e)))
    }

    /// `host:port` label for logs.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(spec: &ForwardSpec) -> OutboundOptions {
        OutboundOptions::from_spec(
            spec,
            &HeaderPolicy::forwarding("ua", None),
            Duration::from_secs(30),
            false,
        )
        .unwrap()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn derives_default_ports() {
        let https = options(&ForwardSpec::new(Method::GET, "https://x.com/a"));
        assert_eq!(https.port, 443);
        assert_eq!(https.scheme, "https");

        let wss = options(&ForwardSpec::new(Method::GET, "wss://x.com"));
        assert_eq!(wss.port, 443);
        assert_eq!(wss.scheme, "https");

        let ws = options(&ForwardSpec::new(Method::GET, "ws://x.com"));
        assert_eq!(ws.port, 80);
        assert_eq!(ws.scheme, "http");

        let explicit = options(&ForwardSpec::new(Method::GET, "http://x.com:8081/"));
        assert_eq!(explicit.port, 8081);
    }

    #[test]
    fn appends_query_with_question_mark() {
        let spec = ForwardSpec::new(Method::GET, "http://x.com/items")
            .with_query(pairs(&[("page", "2"), ("q", "a b")]));
        assert_eq!(options(&spec).path, "/items?page=2&q=a+b");
    }

    #[test]
    fn appends_query_with_ampersand() {
        let spec = ForwardSpec::new(Method::GET, "http://x.com/items?sort=asc")
            .with_query(pairs(&[("page", "2")]));
        let opts = options(&spec);
        assert_eq!(opts.path, "/items?sort=asc&page=2");
        assert_eq!(opts.url().unwrap().as_str(), "http://x.com/items?sort=asc&page=2");
    }

    #[test]
    fn no_caller_query_leaves_path_alone() {
        let spec = ForwardSpec::new(Method::GET, "http://x.com/items?sort=asc");
        assert_eq!(options(&spec).path, "/items?sort=asc");
    }

    #[test]
    fn body_only_for_write_methods() {
        let body = Bytes::from_static(br#"{"a":1}"#);

        let post = options(&ForwardSpec::new(Method::POST, "http://x.com").with_body(body.clone()));
        assert_eq!(post.headers.get(CONTENT_LENGTH).unwrap(), "7");
        assert!(post.body.is_some());

        let get = options(&ForwardSpec::new(Method::GET, "http://x.com").with_body(body));
        assert!(get.headers.get(CONTENT_LENGTH).is_none());
        assert!(get.body.is_none());
    }

    #[test]
    fn rejects_missing_and_invalid_targets() {
        let policy = HeaderPolicy::forwarding("ua", None);
        for target in ["", "ftp://x.com", "not a url"] {
            let err = OutboundOptions::from_spec(
                &ForwardSpec::new(Method::GET, target),
                &policy,
                Duration::from_secs(1),
                false,
            )
            .unwrap_err();
            assert!(matches!(err, ProxyError::Validation(_)), "target {:?}", target);
        }
    }
}
