//! Forwarding core: buffered forwards and streamed downloads.
//!
//! # Data Flow
//! ```text
//! routing layer → ForwardSpec
//!     → forwarder.rs (30s, buffered, JSON decode) → ForwardResult
//!     → download.rs  (60s, chunk by chunk)        → streamed Response
//! ```
//!
//! # Design Decisions
//! - Both operations are stateless per request
//! - Pre-response failures become a clean status; post-response failures
//!   can only abort the stream

pub mod download;
pub mod forwarder;
pub mod progress;
pub mod spec;

pub use download::Downloader;
pub use forwarder::{ForwardBody, ForwardResult, Forwarder};
pub use progress::{DownloadProgress, ProgressObservation};
pub use spec::ForwardSpec;
