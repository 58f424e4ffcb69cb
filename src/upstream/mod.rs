//! Upstream subsystem: everything about talking to the caller's target.
//!
//! # Data Flow
//! ```text
//! ForwardSpec
//!     → url.rs (fail-closed target validation)
//!     → headers.rs (allow-list table → outbound headers)
//!     → options.rs (host, port, path + caller query, body)
//!     → client.rs (reqwest request, no pooling)
//!     → on failure: classify.rs (502 / 504 / 500)
//! ```

pub mod classify;
pub mod client;
pub mod headers;
pub mod options;
pub mod tls;
pub mod url;

pub use client::UpstreamClient;
pub use headers::HeaderPolicy;
pub use options::OutboundOptions;
