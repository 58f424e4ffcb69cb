//! Bidirectional message bridge between two sockets.
//!
//! # Responsibilities
//! - Forward every text and binary message in both directions, in order
//! - Mirror a close from either side onto the other
//! - Close the surviving side with 1011 when its peer errors or vanishes
//! - Close a source with 1014 when its messages can no longer be delivered
//!
//! # Data Flow
//! ```text
//! client stream ─▶ reader(client) ─▶ outbox(target) ─▶ writer(target) ─▶ target sink
//! target stream ─▶ reader(target) ─▶ outbox(client) ─▶ writer(client) ─▶ client sink
//!                         │                                  │
//!                         └──────── cancellation token ──────┘
//! ```
//!
//! # Design Decisions
//! - Each writer is the only task touching its sink; everything else enqueues
//! - Outboxes are bounded, so a slow side slows its peer's reader
//! - The first terminal event records a close in the peer's single-slot
//!   close channel, then raises the token; writers drain queued data, send
//!   the recorded close and only then shut their sink
//! - Generic over `Sink`/`Stream` so the bridge runs against in-memory channels

use std::fmt;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::relay::frame::{CloseReason, Relayed, CLOSE_BAD_GATEWAY, CLOSE_INTERNAL_ERROR};

/// Upper bound on flushing a final close to a sink.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

const DESTINATION_UNAVAILABLE: &str = "destination unavailable";

/// Which socket of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    Client,
    Target,
}

impl Peer {
    fn failure_reason(self) -> &'static str {
        match self {
            Peer::Client => "client connection error",
            Peer::Target => "target connection error",
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Client => f.write_str("client"),
            Peer::Target => f.write_str("target"),
        }
    }
}

/// How one side's reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The side sent a close frame.
    Closed(Option<CloseReason>),
    /// The side's stream yielded an error.
    Error(String),
    /// The side's stream ended without a close frame.
    Disconnected,
    /// The peer could no longer accept this side's messages.
    Undeliverable,
    /// The other side ended the session first.
    Cancelled,
}

/// Summary of a finished bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub to_target: u64,
    pub to_client: u64,
    pub client: EndReason,
    pub target: EndReason,
}

/// Sending half of one side's outbox.
///
/// Data and the terminal close travel on separate channels. The close slot
/// holds a single entry and the first close to arrive wins, so a full data
/// queue can never push the final close code out.
#[derive(Clone)]
struct Outbox {
    data: mpsc::Sender<Relayed>,
    close: mpsc::Sender<Option<CloseReason>>,
}

impl Outbox {
    /// Record the close this side's writer sends after draining its data.
    fn finish(&self, reason: Option<CloseReason>) {
        if self.close.try_send(reason).is_err() {
            tracing::trace!("Terminal close already recorded");
        }
    }
}

fn outbox(capacity: usize) -> (Outbox, mpsc::Receiver<Relayed>, mpsc::Receiver<Option<CloseReason>>) {
    let (data, data_rx) = mpsc::channel(capacity);
    let (close, close_rx) = mpsc::channel(1);
    (Outbox { data, close }, data_rx, close_rx)
}

/// Run the bridge until both directions have finished.
///
/// `capacity` bounds each side's outbox.
pub async fn run_bridge<CW, CR, CM, CE, TW, TR, TM, TE>(
    client_sink: CW,
    client_stream: CR,
    target_sink: TW,
    target_stream: TR,
    capacity: usize,
) -> SessionOutcome
where
    CW: Sink<CM> + Unpin,
    CW::Error: fmt::Display,
    CR: Stream<Item = Result<CM, CE>> + Unpin,
    CM: From<Relayed> + Into<Relayed>,
    CE: fmt::Display,
    TW: Sink<TM> + Unpin,
    TW::Error: fmt::Display,
    TR: Stream<Item = Result<TM, TE>> + Unpin,
    TM: From<Relayed> + Into<Relayed>,
    TE: fmt::Display,
{
    let capacity = capacity.max(1);
    let (to_client, to_client_rx, client_close_rx) = outbox(capacity);
    let (to_target, to_target_rx, target_close_rx) = outbox(capacity);
    let cancel = CancellationToken::new();

    let ((to_target_count, client), (to_client_count, target), (), ()) = tokio::join!(
        read_side(
            Peer::Client,
            client_stream,
            to_target.clone(),
            to_client.clone(),
            cancel.clone(),
        ),
        read_side(
            Peer::Target,
            target_stream,
            to_client.clone(),
            to_target.clone(),
            cancel.clone(),
        ),
        write_side(
            Peer::Client,
            client_sink,
            to_client_rx,
            client_close_rx,
            to_target,
            cancel.clone(),
        ),
        write_side(
            Peer::Target,
            target_sink,
            to_target_rx,
            target_close_rx,
            to_client,
            cancel.clone(),
        ),
    );

    SessionOutcome {
        to_target: to_target_count,
        to_client: to_client_count,
        client,
        target,
    }
}

/// Read one side and enqueue its messages for the other.
async fn read_side<R, M, E>(
    peer: Peer,
    mut stream: R,
    forward: Outbox,
    own: Outbox,
    cancel: CancellationToken,
) -> (u64, EndReason)
where
    R: Stream<Item = Result<M, E>> + Unpin,
    M: Into<Relayed>,
    E: fmt::Display,
{
    let mut relayed = 0u64;

    let end = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break EndReason::Cancelled,
            next = stream.next() => next,
        };

        let msg: Relayed = match next {
            Some(Ok(msg)) => msg.into(),
            Some(Err(e)) => {
                tracing::debug!(peer = %peer, error = %e, "Relay read failed");
                forward.finish(Some(CloseReason::new(CLOSE_INTERNAL_ERROR, peer.failure_reason())));
                break EndReason::Error(e.to_string());
            }
            None => {
                tracing::debug!(peer = %peer, "Relay stream ended without close");
                forward.finish(Some(CloseReason::new(CLOSE_INTERNAL_ERROR, peer.failure_reason())));
                break EndReason::Disconnected;
            }
        };

        match msg {
            Relayed::Close(reason) => {
                forward.finish(reason.clone());
                break EndReason::Closed(reason);
            }
            data if data.is_data() => {
                let delivered = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break EndReason::Cancelled,
                    sent = forward.data.send(data) => sent.is_ok(),
                };
                if !delivered {
                    own.finish(Some(CloseReason::new(CLOSE_BAD_GATEWAY, DESTINATION_UNAVAILABLE)));
                    break EndReason::Undeliverable;
                }
                relayed += 1;
            }
            _ => continue,
        }
    };

    cancel.cancel();
    (relayed, end)
}

/// Drain one side's outbox into its sink, then send its terminal close.
async fn write_side<W, M>(
    peer: Peer,
    mut sink: W,
    mut outbox: mpsc::Receiver<Relayed>,
    mut close: mpsc::Receiver<Option<CloseReason>>,
    source: Outbox,
    cancel: CancellationToken,
) where
    W: Sink<M> + Unpin,
    W::Error: fmt::Display,
    M: From<Relayed>,
{
    let mut healthy = true;

    loop {
        let msg = tokio::select! {
            biased;
            msg = outbox.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
            _ = cancel.cancelled() => break,
        };

        if let Err(e) = sink.send(M::from(msg)).await {
            tracing::debug!(peer = %peer, error = %e, "Relay write failed");
            source.finish(Some(CloseReason::new(CLOSE_BAD_GATEWAY, DESTINATION_UNAVAILABLE)));
            cancel.cancel();
            healthy = false;
            break;
        }
    }
    drop(source);

    if healthy {
        if let Ok(reason) = close.try_recv() {
            if let Err(e) = sink.send(M::from(Relayed::Close(reason))).await {
                tracing::debug!(peer = %peer, error = %e, "Relay close write failed");
            }
        }
    }

    if tokio::time::timeout(CLOSE_GRACE, sink.close()).await.is_err() {
        tracing::debug!(peer = %peer, "Sink close timed out");
    }
}
