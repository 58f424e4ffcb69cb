//! WebSocket relay subsystem.
//!
//! # Data Flow
//! ```text
//! upgrade request (x-target-url)
//!     → connect.rs  (dial target under the connect deadline)
//!     → registry.rs (session Connecting → Open → removed)
//!     → bridge.rs   (readers, bounded outboxes, writers)
//!     → frame.rs    (axum / tungstenite message conversion)
//! ```
//!
//! # Design Decisions
//! - One session per accepted upgrade; no pooling of target sockets
//! - Terminal events on either side end the whole session

pub mod bridge;
pub mod connect;
pub mod frame;
pub mod registry;

pub use bridge::{run_bridge, EndReason, Peer, SessionOutcome};
pub use connect::{connect_target, ConnectError, TargetSocket};
pub use frame::{CloseReason, Relayed};
pub use registry::{SessionGuard, SessionId, SessionInfo, SessionRegistry, SessionState};
