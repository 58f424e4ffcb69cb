//! Outbound WebSocket dialling.

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::ProxyError;
use crate::upstream::tls::websocket_connector;

/// Open socket to a relay target.
pub type TargetSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("TLS setup failed: {0}")]
    Tls(#[from] rustls::Error),
    #[error("handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),
    #[error("no handshake within {0:?}")]
    Timeout(Duration),
}

impl From<ConnectError> for ProxyError {
    fn from(err: ConnectError) -> Self {
        ProxyError::UpstreamUnreachable(err.to_string())
    }
}

/// Dial `target` and complete the WebSocket handshake within `deadline`.
pub async fn connect_target(
    target: &Url,
    verify_tls: bool,
    deadline: Duration,
) -> Result<TargetSocket, ConnectError> {
    let connector = websocket_connector(verify_tls)?;
    let handshake = connect_async_tls_with_config(target.as_str(), None, false, connector);

    match tokio::time::timeout(deadline, handshake).await {
        Ok(Ok((socket, response))) => {
            tracing::debug!(
                target = %target,
                status = response.status().as_u16(),
                "Relay target connected"
            );
            Ok(socket)
        }
        Ok(Err(e)) => Err(ConnectError::Handshake(e)),
        Err(_) => Err(ConnectError::Timeout(deadline)),
    }
}
