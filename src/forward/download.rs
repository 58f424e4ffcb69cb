//! Streaming download forwarding.
//!
//! # Responsibilities
//! - Send one request with the download header table
//! - Emit the upstream status and extended header allow-set
//! - Relay body chunks as they arrive, never buffering the whole body
//! - Account progress per chunk for large declared sizes
//!
//! # Data Flow
//! ```text
//! upstream head ──(deadline)──▶ status + headers
//! upstream chunk ──(idle deadline)──▶ progress.record() ──▶ caller body
//!                                 └─ error after first byte ──▶ abort stream
//! ```
//!
//! # Design Decisions
//! - The first chunk is awaited before the response is committed, so a body
//!   that fails immediately still gets a clean 500
//! - Once a byte is out, failures can only cut the stream short

use std::time::Duration;

use axum::{body::Body, http::HeaderMap, response::Response};
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::config::RelayConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::forward::progress::DownloadProgress;
use crate::forward::spec::ForwardSpec;
use crate::observability::metrics;
use crate::upstream::classify::{describe, to_proxy_error};
use crate::upstream::headers::{copy_allowed, DOWNLOAD_RESPONSE_HEADERS};
use crate::upstream::{HeaderPolicy, OutboundOptions, UpstreamClient};

/// Relays upstream downloads chunk by chunk.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: UpstreamClient,
    policy: HeaderPolicy,
    timeout: Duration,
    verify_tls: bool,
    progress_threshold: u64,
}

impl Downloader {
    pub fn new(client: UpstreamClient, config: &RelayConfig) -> Self {
        Self {
            client,
            policy: HeaderPolicy::download(&config.outbound.user_agent),
            timeout: config.timeouts.download(),
            verify_tls: config.outbound.verify_tls,
            progress_threshold: config.download.progress_threshold_bytes,
        }
    }

    pub fn policy(&self) -> &HeaderPolicy {
        &self.policy
    }

    /// Start a download and return the streaming response.
    ///
    /// Status and headers are returned only after the first body chunk
    /// arrives, so a slow first byte delays them by up to the download
    /// deadline. An empty body returns at once.
    pub async fn download(&self, spec: ForwardSpec) -> ProxyResult<Response> {
        let options = OutboundOptions::from_spec(&spec, &self.policy, self.timeout, self.verify_tls)?;
        let request = self.client.request(&options)?;
        let upstream = options.authority();

        tracing::info!(upstream = %upstream, path = %options.path, "Starting download");

        let response = match tokio::time::timeout(options.timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let err = to_proxy_error(&e, options.timeout);
                tracing::warn!(upstream = %upstream, kind = err.kind(), error = %err, "Download request failed");
                metrics::record_upstream_failure(err.kind());
                return Err(err);
            }
            Err(_) => {
                tracing::warn!(upstream = %upstream, "Download deadline exceeded, connection aborted");
                metrics::record_upstream_failure("timeout");
                return Err(ProxyError::UpstreamTimeout(options.timeout));
            }
        };

        let status = response.status();
        let headers = copy_allowed(response.headers(), &DOWNLOAD_RESPONSE_HEADERS);
        let expected = response.content_length().unwrap_or(0);

        let mut transfer = Transfer {
            chunks: response.bytes_stream().boxed(),
            progress: DownloadProgress::new(expected, self.progress_threshold),
            idle: options.timeout,
            upstream,
            done: false,
        };

        let first = transfer.next_chunk().await.map_err(|message| {
            tracing::warn!(upstream = %transfer.upstream, error = %message, "Download failed before first byte");
            metrics::record_upstream_failure("download");
            ProxyError::Download(message)
        })?;

        let body = match first {
            None => {
                transfer.finish();
                Body::empty()
            }
            Some(chunk) => Body::from_stream(relay_chunks(transfer, chunk)),
        };

        Ok(build_response(status, headers, body))
    }
}

fn build_response(status: axum::http::StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

struct Transfer {
    chunks: BoxStream<'static, reqwest::Result<Bytes>>,
    progress: DownloadProgress,
    idle: Duration,
    upstream: String,
    done: bool,
}

impl Transfer {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, String> {
        match tokio::time::timeout(self.idle, self.chunks.next()).await {
            Ok(Some(Ok(chunk))) => Ok(Some(chunk)),
            Ok(Some(Err(e))) => Err(describe(&e)),
            Ok(None) => Ok(None),
            Err(_) => Err(format!("no data received for {:?}", self.idle)),
        }
    }

    fn account(&mut self, chunk: &Bytes) {
        metrics::record_download_bytes(chunk.len() as u64);
        if let Some(obs) = self.progress.record(chunk.len()) {
            tracing::debug!(
                upstream = %self.upstream,
                transferred = obs.transferred,
                expected = obs.expected,
                percent = format_args!("{:.1}", obs.percent),
                bytes_per_sec = obs.bytes_per_sec as u64,
                "Download progress"
            );
        }
    }

    fn finish(&self) {
        tracing::info!(
            upstream = %self.upstream,
            bytes = self.progress.transferred(),
            elapsed_ms = self.progress.elapsed().as_millis() as u64,
            "Download complete"
        );
    }
}

/// Body stream starting with the already received first chunk.
fn relay_chunks(
    transfer: Transfer,
    first: Bytes,
) -> impl futures_util::Stream<Item = Result<Bytes, ProxyError>> + Send + 'static {
    stream::unfold((transfer, Some(first)), |(mut transfer, pending)| async move {
        if transfer.done {
            return None;
        }
        let next = match pending {
            Some(chunk) => Ok(Some(chunk)),
            None => transfer.next_chunk().await,
        };
        match next {
            Ok(Some(chunk)) => {
                transfer.account(&chunk);
                Some((Ok(chunk), (transfer, None)))
            }
            Ok(None) => {
                transfer.finish();
                None
            }
            Err(message) => {
                transfer.done = true;
                let bytes = transfer.progress.transferred();
                tracing::warn!(
                    upstream = %transfer.upstream,
                    bytes,
                    expected = transfer.progress.expected(),
                    error = %message,
                    "Download interrupted, aborting stream"
                );
                metrics::record_upstream_failure("stream");
                Some((Err(ProxyError::Stream { bytes, message }), (transfer, None)))
            }
        }
    })
}
