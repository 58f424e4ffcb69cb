//! Caller-facing error taxonomy.
//!
//! # Responsibilities
//! - Name every way a forwarding, download or relay attempt can fail
//! - Map each failure to a stable HTTP status code
//! - Render pre-response failures as a JSON body with the CORS headers
//!
//! # Design Decisions
//! - Validation failures never reach the network
//! - `Stream` only exists inside a response body; by then the status is
//!   already on the wire and the only remaining action is to abort

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::upstream::headers::apply_cors_headers;

/// Result alias used throughout the forwarding core.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Failure of a forwarding, download or relay attempt.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing or malformed target URL. Never attempts a network call.
    #[error("{0}")]
    Validation(String),

    /// Name resolution failure or connection refused.
    #[error("unable to connect to target server: {0}")]
    UpstreamUnreachable(String),

    /// The per-operation deadline fired; the outbound connection was dropped.
    #[error("target server did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    /// Any other failure while building or executing the outbound call.
    #[error("proxy request failed: {0}")]
    Transport(String),

    /// The download failed before a single body byte reached the caller.
    #[error("download failed: {0}")]
    Download(String),

    /// The download failed after bytes were sent; the stream is cut short.
    #[error("stream interrupted after {bytes} bytes: {message}")]
    Stream { bytes: u64, message: String },
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Validation(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Transport(_)
            | ProxyError::Download(_)
            | ProxyError::Stream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short title placed in the `error` field of the JSON body.
    pub fn title(&self) -> &'static str {
        match self {
            ProxyError::Validation(_) => "Bad Request",
            ProxyError::UpstreamUnreachable(_) => "Bad Gateway",
            ProxyError::UpstreamTimeout(_) => "Gateway Timeout",
            ProxyError::Transport(_) => "Internal Server Error",
            ProxyError::Download(_) | ProxyError::Stream { .. } => "Download Error",
        }
    }

    /// Label used for the upstream failure counter.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Validation(_) => "validation",
            ProxyError::UpstreamUnreachable(_) => "unreachable",
            ProxyError::UpstreamTimeout(_) => "timeout",
            ProxyError::Transport(_) => "transport",
            ProxyError::Download(_) => "download",
            ProxyError::Stream { .. } => "stream",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ProxyError::Validation(_) => "Invalid target URL",
            ProxyError::UpstreamUnreachable(_) => "Unable to connect to target server",
            ProxyError::UpstreamTimeout(_) => "Target server did not respond in time",
            ProxyError::Transport(_) => "Proxy request failed",
            ProxyError::Download(_) | ProxyError::Stream { .. } => "Download failed",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: &'static str,
    details: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.title(),
            message: self.message(),
            details: self.to_string(),
        };
        let mut response = (self.status_code(), Json(body)).into_response();
        apply_cors_headers(response.headers_mut());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ProxyError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::UpstreamUnreachable("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ProxyError::UpstreamTimeout(Duration::from_secs(30)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(ProxyError::Transport("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ProxyError::Download("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn error_response_is_json_with_cors() {
        let response = ProxyError::UpstreamUnreachable("dns error".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Bad Gateway");
        assert_eq!(json["message"], "Unable to connect to target server");
    }
}
