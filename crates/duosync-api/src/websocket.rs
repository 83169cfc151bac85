//! Push-channel WebSocket connection.
//!
//! One [`WsConnection`] owns exactly one underlying socket for its whole
//! life: `Idle → Connecting → Open → Closed`. `Closed` is terminal; callers
//! reconnect by creating a new handle. No retry happens here; reconnect
//! policy lives with whoever consumes the events.
//!
//! Every connected handle reports through a bounded [`mpsc`] channel,
//! tagging each [`TransportEvent`] with the caller-chosen [`ConnectionId`]
//! so that events from a superseded handle can be told apart.
//!
//! # Example
//!
//! ```rust,ignore
//! use duosync_api::websocket::{WsConnection, TransportEvent};
//! use tokio::sync::mpsc;
//!
//! let (tx, mut rx) = mpsc::channel(64);
//! let mut conn = WsConnection::new("ws://localhost:8000/ws".parse()?);
//! conn.connect(1, tx)?;
//!
//! while let Some(tagged) = rx.recv().await {
//!     if let TransportEvent::Message(text) = tagged.event {
//!         println!("{text}");
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use strum::Display;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

/// Caller-assigned identifier distinguishing successive connection handles.
pub type ConnectionId = u64;

/// How long the TCP connect plus upgrade handshake may take.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// ── Connection state ─────────────────────────────────────────────────

/// Lifecycle of a single connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The handshake never completed (refused, DNS, TLS, bad upgrade).
    ConnectFailed(String),
    /// The socket broke after it was open.
    Error(String),
    /// The server closed the connection or the stream ended.
    Remote { code: Option<u16>, reason: String },
    /// [`WsConnection::close`] was called or the handle was dropped.
    Local,
}

/// Events emitted by a connection handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Closed(CloseReason),
}

/// A [`TransportEvent`] tagged with the handle that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub id: ConnectionId,
    pub event: TransportEvent,
}

// ── WsConnection ─────────────────────────────────────────────────────

/// Handle to one push-channel connection.
///
/// Dropping the handle closes the connection.
pub struct WsConnection {
    url: Url,
    state: watch::Receiver<ConnectionState>,
    handshake_timeout: Duration,
    /// Held until `connect` hands it to the background task.
    state_tx: Option<watch::Sender<ConnectionState>>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    cancel: CancellationToken,
}

impl WsConnection {
    /// Create an idle handle. Nothing touches the network until
    /// [`connect`](Self::connect).
    pub fn new(url: Url) -> Self {
        let (state_tx, state) = watch::channel(ConnectionState::Idle);
        Self {
            url,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            state,
            state_tx: Some(state_tx),
            outbound: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Bound the handshake. A peer that accepts TCP but never upgrades
    /// ends in [`CloseReason::ConnectFailed`] once this elapses.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Start connecting in the background.
    ///
    /// Events are delivered on `events` tagged with `id`. Exactly one
    /// [`TransportEvent::Closed`] follows, whatever happens. Calling this
    /// twice, or after [`close`](Self::close), is an error.
    pub fn connect(
        &mut self,
        id: ConnectionId,
        events: mpsc::Sender<TaggedEvent>,
    ) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::InvalidState("connection handle already closed"));
        }
        let Some(state_tx) = self.state_tx.take() else {
            return Err(Error::InvalidState("connection handle already started"));
        };

        state_tx.send_replace(ConnectionState::Connecting);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.outbound = Some(outbound_tx);

        let task = ConnectionTask {
            url: self.url.clone(),
            handshake_timeout: self.handshake_timeout,
            id,
            events,
            state_tx,
            cancel: self.cancel.clone(),
        };
        tokio::spawn(task.run(outbound_rx));
        Ok(())
    }

    /// Queue a text frame. Returns `false` unless the connection is open.
    pub fn send(&self, text: impl Into<String>) -> bool {
        if self.state() != ConnectionState::Open {
            return false;
        }
        self.outbound
            .as_ref()
            .is_some_and(|tx| tx.send(text.into()).is_ok())
    }

    /// Close the connection. Idempotent; safe on a closed or idle handle.
    pub fn close(&self) {
        self.cancel.cancel();
        // An idle handle has no task to publish the transition.
        if let Some(state_tx) = &self.state_tx {
            state_tx.send_replace(ConnectionState::Closed);
        }
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background task ──────────────────────────────────────────────────

struct ConnectionTask {
    url: Url,
    handshake_timeout: Duration,
    id: ConnectionId,
    events: mpsc::Sender<TaggedEvent>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl ConnectionTask {
    async fn run(self, outbound: mpsc::UnboundedReceiver<String>) {
        let reason = self.connect_and_read(outbound).await;

        match &reason {
            CloseReason::Local => tracing::debug!(conn_id = self.id, "WebSocket closed locally"),
            CloseReason::Remote { code, reason } => {
                tracing::info!(conn_id = self.id, ?code, reason = %reason, "WebSocket closed by server");
            }
            CloseReason::ConnectFailed(e) | CloseReason::Error(e) => {
                tracing::warn!(conn_id = self.id, error = %e, "WebSocket failed");
            }
        }

        self.state_tx.send_replace(ConnectionState::Closed);
        // The receiver may already be gone during teardown.
        let _ = self.emit(TransportEvent::Closed(reason)).await;
    }

    /// Establish the socket and pump frames until it drops.
    async fn connect_and_read(
        &self,
        mut outbound: mpsc::UnboundedReceiver<String>,
    ) -> CloseReason {
        tracing::info!(conn_id = self.id, url = %self.url, "Connecting to push channel");

        let connected = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return CloseReason::Local,
            result = tokio::time::timeout(
                self.handshake_timeout,
                tokio_tungstenite::connect_async(self.url.as_str()),
            ) => result,
        };

        let ws_stream = match connected {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return CloseReason::ConnectFailed(e.to_string()),
            Err(_) => return CloseReason::ConnectFailed("handshake timed out".into()),
        };

        let (mut write, mut read) = ws_stream.split();

        self.state_tx.send_replace(ConnectionState::Open);
        tracing::info!(conn_id = self.id, "WebSocket connected");
        if self.emit(TransportEvent::Opened).await.is_err() {
            return CloseReason::Local;
        }

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    // Best effort; the peer may already be gone.
                    let _ = write.send(Message::Close(None)).await;
                    return CloseReason::Local;
                }
                Some(text) = outbound.recv() => {
                    if let Err(e) = write.send(Message::text(text)).await {
                        return CloseReason::Error(e.to_string());
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        tracing::trace!(conn_id = self.id, len = text.len(), "WebSocket text frame");
                        let message = TransportEvent::Message(text.as_str().to_owned());
                        if self.emit(message).await.is_err() {
                            return CloseReason::Local;
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite queues the pong automatically
                        tracing::trace!(conn_id = self.id, "WebSocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return match frame {
                            Some(cf) => CloseReason::Remote {
                                code: Some(u16::from(cf.code)),
                                reason: cf.reason.as_str().to_owned(),
                            },
                            None => CloseReason::Remote { code: None, reason: String::new() },
                        };
                    }
                    Some(Err(e)) => return CloseReason::Error(e.to_string()),
                    None => {
                        return CloseReason::Remote {
                            code: None,
                            reason: "stream ended".into(),
                        };
                    }
                    // Binary, Pong, Frame -- ignore
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    async fn emit(&self, event: TransportEvent) -> Result<(), mpsc::error::SendError<TaggedEvent>> {
        self.events.send(TaggedEvent { id: self.id, event }).await
    }
}

// ── Tests ────────────────────────────────────────────────────────────
