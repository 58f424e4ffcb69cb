//! Transport failure classification.
//!
//! # Responsibilities
//! - Walk an error's source chain looking for the root cause
//! - Map refused connections and DNS failures to 502, deadlines to 504
//! - Map everything else to 500
//!
//! # Design Decisions
//! - Pure function over `&dyn Error`, so it can be tested without sockets
//! - DNS failures are recognised by message: resolvers surface them as
//!   uncategorised I/O errors

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use crate::error::ProxyError;

/// Root cause of an outbound failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ConnectionRefused,
    NameResolution,
    Timeout,
    Other,
}

const DNS_MARKERS: [&str; 5] = [
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "nodename nor servname",
    "no such host",
];

/// Classify an outbound error by inspecting its whole source chain.
pub fn classify(err: &(dyn StdError + 'static)) -> FailureKind {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(kind) = classify_one(e) {
            return kind;
        }
        current = e.source();
    }
    FailureKind::Other
}

fn classify_one(e: &(dyn StdError + 'static)) -> Option<FailureKind> {
    if let Some(req) = e.downcast_ref::<reqwest::Error>() {
        if req.is_timeout() {
            return Some(FailureKind::Timeout);
        }
    }
    if e.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
        return Some(FailureKind::Timeout);
    }
    if let Some(io_err) = e.downcast_ref::<io::Error>() {
        match io_err.kind() {
            io::ErrorKind::ConnectionRefused => return Some(FailureKind::ConnectionRefused),
            io::ErrorKind::TimedOut => return Some(FailureKind::Timeout),
            _ => {}
        }
    }

    let message = e.to_string().to_ascii_lowercase();
    if DNS_MARKERS.iter().any(|marker| message.contains(marker)) {
        return Some(FailureKind::NameResolution);
    }
    None
}

/// Translate an outbound error into the caller-facing taxonomy.
pub fn to_proxy_error(err: &(dyn StdError + 'static), deadline: Duration) -> ProxyError {
    let detail = describe(err);
    match classify(err) {
        FailureKind::ConnectionRefused | FailureKind::NameResolution => {
            ProxyError::UpstreamUnreachable(detail)
        }
        FailureKind::Timeout => ProxyError::UpstreamTimeout(deadline),
        FailureKind::Other => ProxyError::Transport(detail),
    }
}

/// Render an error with its causes, innermost last.
pub fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        current = e.source();
    }
    out
}
