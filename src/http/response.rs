//! Response rendering for buffered forwards.
//!
//! # Design Decisions
//! - Decoded JSON is re-serialized, so the upstream `content-length` is
//!   dropped and recomputed
//! - Raw bodies go back byte for byte with the upstream headers untouched

use axum::{
    body::Body,
    http::header::CONTENT_LENGTH,
    response::{IntoResponse, Response},
};

use crate::error::ProxyError;
use crate::forward::{ForwardBody, ForwardResult};

impl IntoResponse for ForwardResult {
    fn into_response(self) -> Response {
        let ForwardResult {
            status,
            mut headers,
            body,
        } = self;

        let body = match body {
            ForwardBody::Json(value) => match serde_json::to_vec(&value) {
                Ok(encoded) => {
                    headers.remove(CONTENT_LENGTH);
                    Body::from(encoded)
                }
                Err(e) => return ProxyError::Transport(e.to_string()).into_response(),
            },
            ForwardBody::Raw(bytes) => Body::from(bytes),
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use bytes::Bytes;

    #[tokio::test]
    async fn json_body_is_reencoded_without_stale_length() {
        let mut upstream = HeaderMap::new();
        upstream.insert("content-type", HeaderValue::from_static("application/json"));
        upstream.insert("content-length", HeaderValue::from_static("99"));
        let result = ForwardResult::from_upstream(
            StatusCode::CREATED,
            &upstream,
            Bytes::from_static(br#"{ "id" : 7 }"#),
        );

        let response = result.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get("content-length").is_none());
        assert_eq!(response.headers().get("access-control-allow-origin").unwrap(), "*");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"id":7}"#);
    }

    #[tokio::test]
    async fn raw_body_is_passed_through() {
        let mut upstream = HeaderMap::new();
        upstream.insert("content-type", HeaderValue::from_static("text/plain"));
        let result = ForwardResult::from_upstream(StatusCode::OK, &upstream, Bytes::from_static(b"plain"));

        let response = result.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"plain");
    }
}
