//! WebSocket relay endpoint.
//!
//! # Responsibilities
//! - Validate the target header before any socket is opened
//! - Dial the target before accepting the client upgrade
//! - Announce the session to the client, then hand both sockets to the bridge
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Relay ←──── WebSocket frames ────→ Target
//! ```
//!
//! # Design Decisions
//! - A target that cannot be reached answers 502 and the upgrade never happens
//! - A session exists only once the target socket is open
//! - Message-level forwarding; framing and boundaries are preserved
//! - Close frames propagated in both directions
//! - Ping/pong answered by each side's own socket

use std::time::Instant;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use url::Url;

use crate::error::ProxyError;
use crate::http::server::AppState;
use crate::relay::{connect_target, run_bridge, SessionGuard, TargetSocket};
use crate::upstream::url::parse_socket_target;

/// Text notification sent to the client once the target socket is open.
pub fn connected_notice(target: &Url) -> String {
    json!({
        "type": "connected",
        "target": target.as_str(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
    .to_string()
}

/// Upgrade handler for the relay endpoint.
pub async fn relay_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let header = state.config.endpoints.target_header.as_str();
    let target = match headers.get(header).and_then(|v| v.to_str().ok()) {
        None => {
            return ProxyError::Validation(format!("missing {} header", header)).into_response();
        }
        Some(raw) => match parse_socket_target(raw) {
            Some(url) => url,
            None => {
                return ProxyError::Validation(format!(
                    "{} must be an absolute ws:// or wss:// URL",
                    header
                ))
                .into_response();
            }
        },
    };

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let socket = match connect_target(
        &target,
        state.config.outbound.verify_tls,
        state.config.timeouts.relay_connect(),
    )
    .await
    {
        Ok(socket) => socket,
        Err(e) => {
            tracing::warn!(target = %target, error = %e, "Relay target unreachable");
            return ProxyError::from(e).into_response();
        }
    };
    let session = state.registry.begin(target.as_str());

    let capacity = state.config.relay.outbox_capacity;
    upgrade.on_upgrade(move |client| relay_session(client, socket, session, target, capacity))
}

async fn relay_session(
    client: WebSocket,
    target_socket: TargetSocket,
    session: SessionGuard,
    target: Url,
    capacity: usize,
) {
    let started = Instant::now();
    session.mark_open();
    let (mut client_tx, client_rx) = client.split();

    if let Err(e) = client_tx
        .send(Message::Text(connected_notice(&target).into()))
        .await
    {
        tracing::debug!(session_id = %session.id(), error = %e, "Client gone before relay started");
        return;
    }
    tracing::info!(session_id = %session.id(), target = %target, "Relay session open");

    let (target_tx, target_rx) = target_socket.split();
    let outcome = run_bridge(client_tx, client_rx, target_tx, target_rx, capacity).await;
    session.mark_closed();

    tracing::info!(
        session_id = %session.id(),
        target = %target,
        to_target = outcome.to_target,
        to_client = outcome.to_client,
        client_end = ?outcome.client,
        target_end = ?outcome.target,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Relay session closed"
    );
}
