//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs    (Axum setup, request ID, tracing, body limit)
//!     → request.rs   (target extraction, query split, ForwardSpec)
//!     → forward / download / relay core
//!     → response.rs  (ForwardResult → HTTP response)
//!     → websocket.rs (relay upgrades)
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServerError};
