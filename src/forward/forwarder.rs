//! Buffered request forwarding.
//!
//! # Responsibilities
//! - Validate the target and derive outbound options
//! - Send one request under the forwarding deadline
//! - Buffer the full response and decode JSON bodies
//! - Copy the response header allow-set and add the CORS headers
//!
//! # Design Decisions
//! - Deadline covers the whole exchange (head and body)
//! - On expiry the exchange future is dropped, which closes its socket
//! - Undecodable JSON is returned as the raw bytes it arrived as

use std::time::{Duration, Instant};

use axum::http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use serde_json::Value;

use crate::config::RelayConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::forward::spec::ForwardSpec;
use crate::observability::metrics;
use crate::upstream::classify::to_proxy_error;
use crate::upstream::headers::{apply_cors_headers, copy_allowed, FORWARD_RESPONSE_HEADERS};
use crate::upstream::{HeaderPolicy, OutboundOptions, UpstreamClient};

/// Buffered upstream body.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardBody {
    Json(Value),
    Raw(Bytes),
}

/// Fully materialized upstream response.
#[derive(Debug, Clone)]
pub struct ForwardResult {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ForwardBody,
}

impl ForwardResult {
    /// Build a result from what upstream sent.
    pub fn from_upstream(status: StatusCode, upstream: &HeaderMap, body: Bytes) -> Self {
        let mut headers = copy_allowed(upstream, &FORWARD_RESPONSE_HEADERS);
        apply_cors_headers(&mut headers);
        Self {
            status,
            body: decode_body(upstream.get(CONTENT_TYPE), body),
            headers,
        }
    }
}

/// Decode a JSON body when upstream says it is JSON; otherwise keep the bytes.
pub fn decode_body(content_type: Option<&HeaderValue>, bytes: Bytes) -> ForwardBody {
    let is_json = content_type
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);
    if !is_json {
        return ForwardBody::Raw(bytes);
    }
    match serde_json::from_slice(&bytes) {
        Ok(value) => ForwardBody::Json(value),
        Err(e) => {
            tracing::debug!(error = %e, "Upstream JSON did not decode, returning raw body");
            ForwardBody::Raw(bytes)
        }
    }
}

/// Sends caller requests upstream and buffers the answer.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: UpstreamClient,
    policy: HeaderPolicy,
    timeout: Duration,
    verify_tls: bool,
}

impl Forwarder {
    pub fn new(client: UpstreamClient, config: &RelayConfig) -> Self {
        Self {
            client,
            policy: HeaderPolicy::forwarding(
                &config.outbound.user_agent,
                config.outbound.custom_header.as_deref(),
            ),
            timeout: config.timeouts.forward(),
            verify_tls: config.outbound.verify_tls,
        }
    }

    /// Outbound header table, used by the routing layer to trim inbound headers.
    pub fn policy(&self) -> &HeaderPolicy {
        &self.policy
    }

    pub async fn forward(&self, spec: ForwardSpec) -> ProxyResult<ForwardResult> {
        let start = Instant::now();
        let options = OutboundOptions::from_spec(&spec, &self.policy, self.timeout, self.verify_tls)?;
        let request = self.client.request(&options)?;

        tracing::debug!(
            method = %options.method,
            upstream = %options.authority(),
            path = %options.path,
            "Forwarding request"
        );

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, headers, body))
        };

        let (status, headers, body) = match tokio::time::timeout(options.timeout, exchange).await {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) => {
                let err = to_proxy_error(&e, options.timeout);
                tracing::warn!(
                    upstream = %options.authority(),
                    kind = err.kind(),
                    error = %err,
                    "Upstream request failed"
                );
                metrics::record_upstream_failure(err.kind());
                return Err(err);
            }
            Err(_) => {
                tracing::warn!(
                    upstream = %options.authority(),
                    timeout_ms = options.timeout.as_millis() as u64,
                    "Upstream deadline exceeded, connection aborted"
                );
                metrics::record_upstream_failure("timeout");
                return Err(ProxyError::UpstreamTimeout(options.timeout));
            }
        };

        tracing::debug!(
            upstream = %options.authority(),
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upstream responded"
        );
        metrics::record_forward(options.method.as_str(), status.as_u16(), start);

        Ok(ForwardResult::from_upstream(status, &headers, body))
    }
}
