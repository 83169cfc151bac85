// ── Transport seams ──
//
// The controller talks to the outside world through two traits: a push
// connector that hands out one connection per attempt, and a pull source
// that fetches a status batch. Production implementations wrap
// `WsConnection` and `HubClient`; tests substitute scripted fakes.

use std::time::Duration;

use async_trait::async_trait;
use duosync_api::{
    ConnectionId, ConnectionState, DEFAULT_HANDSHAKE_TIMEOUT, HubClient, TaggedEvent,
    WsConnection,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::error::CoreError;
use crate::model::StatusBatch;
use crate::normalize::normalize;

// ── Push side ───────────────────────────────────────────────────────

/// One live push connection, as seen by the controller.
pub trait PushConnection: Send + Sync {
    /// Queue a text frame. `false` if the connection is not open.
    fn send(&self, text: &str) -> bool;
    /// Idempotent.
    fn close(&self);
    fn is_open(&self) -> bool;
}

/// Opens push connections.
///
/// Every opened connection reports on `events`, tagged with `id`, and ends
/// with exactly one `Closed`.
pub trait PushConnector: Send + Sync {
    fn open(
        &self,
        id: ConnectionId,
        events: mpsc::Sender<TaggedEvent>,
    ) -> Result<Box<dyn PushConnection>, CoreError>;
}

impl PushConnection for WsConnection {
    fn send(&self, text: &str) -> bool {
        WsConnection::send(self, text)
    }

    fn close(&self) {
        WsConnection::close(self);
    }

    fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }
}

/// Push connector backed by the hub WebSocket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
    handshake_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Give up on an attempt whose upgrade has not finished after `timeout`.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl PushConnector for WsConnector {
    fn open(
        &self,
        id: ConnectionId,
        events: mpsc::Sender<TaggedEvent>,
    ) -> Result<Box<dyn PushConnection>, CoreError> {
        let mut conn =
            WsConnection::new(self.url.clone()).with_handshake_timeout(self.handshake_timeout);
        conn.connect(id, events)?;
        Ok(Box::new(conn))
    }
}

// ── Pull side ───────────────────────────────────────────────────────

/// Fetches the current status of every device.
///
/// Never fails: an unreachable or empty hub yields an empty batch.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self) -> StatusBatch;
}

/// Pull source backed by the hub's HTTP status routes.
///
/// Tries `GET /devices/status` first, then the device endpoint listing.
#[derive(Debug, Clone)]
pub struct HubStatusSource {
    client: HubClient,
}

impl HubStatusSource {
    pub fn new(client: HubClient) -> Self {
        Self { client }
    }

    /// Like [`StatusSource::fetch`], but surfaces the error when neither
    /// route answered.
    pub async fn try_fetch(&self) -> Result<StatusBatch, CoreError> {
        let primary_failed = match self.client.devices_status().await {
            Ok(value) => {
                let batch = normalize(&value);
                if !batch.is_empty() {
                    return Ok(batch);
                }
                debug!("aggregated status route returned no devices");
                false
            }
            Err(e) => {
                log_pull_failure("devices/status", &e);
                true
            }
        };

        match self.client.device_list().await {
            Ok(value) => Ok(normalize(&value)),
            Err(e) => {
                log_pull_failure(self.client.device_endpoint(), &e);
                if primary_failed && !e.is_not_found() {
                    Err(e.into())
                } else {
                    Ok(StatusBatch::new())
                }
            }
        }
    }
}

#[async_trait]
impl StatusSource for HubStatusSource {
    async fn fetch(&self) -> StatusBatch {
        self.try_fetch().await.unwrap_or_default()
    }
}

/// A missing route means "no data yet", not a failure.
fn log_pull_failure(route: &str, err: &duosync_api::Error) {
    if err.is_not_found() {
        debug!(route, "no status data available");
    } else {
        warn!(route, error = %err, "status pull failed");
    }
}
