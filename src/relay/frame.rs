//! Socket-neutral relay messages.
//!
//! The client side speaks axum's WebSocket types and the target side speaks
//! tungstenite's. Both are converted into [`Relayed`] so the bridge never
//! depends on which library produced a message. Text stays text and binary
//! stays binary.

use axum::extract::ws::{CloseFrame as ClientCloseFrame, Message as ClientMessage};
use bytes::Bytes;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as TargetCloseFrame;
use tokio_tungstenite::tungstenite::Message as TargetMessage;

/// Close code sent when the other side failed or vanished.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Close code sent to a source whose messages can no longer be delivered.
pub const CLOSE_BAD_GATEWAY: u16 = 1014;

/// Close code and reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// A message travelling through the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relayed {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseReason>),
}

impl Relayed {
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Relayed::Close(Some(CloseReason::new(code, reason)))
    }

    /// Text and binary messages; everything else is a control frame.
    pub fn is_data(&self) -> bool {
        matches!(self, Relayed::Text(_) | Relayed::Binary(_))
    }
}

impl From<ClientMessage> for Relayed {
    fn from(msg: ClientMessage) -> Self {
        match msg {
            ClientMessage::Text(text) => Relayed::Text(text.as_str().to_owned()),
            ClientMessage::Binary(data) => Relayed::Binary(data),
            ClientMessage::Ping(data) => Relayed::Ping(data),
            ClientMessage::Pong(data) => Relayed::Pong(data),
            ClientMessage::Close(frame) => Relayed::Close(frame.map(|f| CloseReason {
                code: f.code,
                reason: f.reason.as_str().to_owned(),
            })),
        }
    }
}

impl From<Relayed> for ClientMessage {
    fn from(msg: Relayed) -> Self {
        match msg {
            Relayed::Text(text) => ClientMessage::Text(text.into()),
            Relayed::Binary(data) => ClientMessage::Binary(data),
            Relayed::Ping(data) => ClientMessage::Ping(data),
            Relayed::Pong(data) => ClientMessage::Pong(data),
            Relayed::Close(reason) => ClientMessage::Close(reason.map(|r| ClientCloseFrame {
                code: r.code,
                reason: r.reason.into(),
            })),
        }
    }
}

impl From<TargetMessage> for Relayed {
    fn from(msg: TargetMessage) -> Self {
        match msg {
            TargetMessage::Text(text) => Relayed::Text(text.as_str().to_owned()),
            TargetMessage::Binary(data) => Relayed::Binary(data),
            TargetMessage::Ping(data) => Relayed::Ping(data),
            TargetMessage::Pong(data) => Relayed::Pong(data),
            TargetMessage::Close(frame) => Relayed::Close(frame.map(|f| CloseReason {
                code: u16::from(f.code),
                reason: f.reason.as_str().to_owned(),
            })),
            // Raw frames never come out of a read.
            TargetMessage::Frame(frame) => Relayed::Binary(Bytes::copy_from_slice(frame.payload())),
        }
    }
}

impl From<Relayed> for TargetMessage {
    fn from(msg: Relayed) -> Self {
        match msg {
            Relayed::Text(text) => TargetMessage::Text(text.into()),
            Relayed::Binary(data) => TargetMessage::Binary(data),
            Relayed::Ping(data) => TargetMessage::Ping(data),
            Relayed::Pong(data) => TargetMessage::Pong(data),
            Relayed::Close(reason) => TargetMessage::Close(reason.map(|r| TargetCloseFrame {
                code: CloseCode::from(r.code),
                reason: r.reason.into(),
            })),
        }
    }
}
