//! Inbound request handling.
//!
//! # Responsibilities
//! - Split the caller query into the target URL and the pairs to forward
//! - Resolve fixed-route targets from a base URL and the matched remainder
//! - Turn an inbound request into a [`ForwardSpec`]
//!
//! # Design Decisions
//! - Request ID is added by the tower-http layers before any handler runs
//! - The target parameter is removed everywhere it occurs; all other pairs
//!   keep their order and multiplicity

use axum::http::{HeaderMap, HeaderName, Method};
use bytes::Bytes;
use url::form_urlencoded;

use crate::forward::ForwardSpec;
use crate::upstream::HeaderPolicy;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id of a request, or `"unknown"` before the id layer ran.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Split a raw query string into the `param` value and the remaining pairs.
///
/// The first occurrence of `param` wins.
pub fn split_query(raw: Option<&str>, param: &str) -> (Option<String>, Vec<(String, String)>) {
    let mut target = None;
    let mut rest = Vec::new();
    let Some(raw) = raw else {
        return (target, rest);
    };
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        if key == param {
            if target.is_none() {
                target = Some(value.into_owned());
            }
        } else {
            rest.push((key.into_owned(), value.into_owned()));
        }
    }
    (target, rest)
}

/// Query pairs of a request that carries no target parameter.
pub fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Join a fixed-route base URL and the path remainder after its prefix.
pub fn route_target(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, rest)
    }
}

/// Build the `ForwardSpec` handed to the forwarding core.
pub fn build_spec(
    method: Method,
    target: String,
    headers: &HeaderMap,
    policy: &HeaderPolicy,
    query: Vec<(String, String)>,
    body: Bytes,
) -> ForwardSpec {
    ForwardSpec::new(method, target)
        .with_headers(headers, policy)
        .with_query(query)
        .with_body(body)
}
