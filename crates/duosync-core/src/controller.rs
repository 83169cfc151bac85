// ── Sync controller ──
//
// Keeps the state store in step with the hub. One background task (the
// engine) owns all sync state and runs every transition, refresh decision
// and store write from a single `select!` loop, so nothing here needs a
// lock. `SyncController` is the cloneable handle consumers hold.
//
//   Bootstrapping ─▶ Connected ◀─▶ Reconnecting ─▶ Degraded
//                        ▲                            │
//                        └──────── push probe ────────┘

use std::sync::Arc;
use std::time::Duration;

use duosync_api::{ConnectionId, TaggedEvent, TransportEvent};
use strum::Display;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::command::CommandDispatcher;
use crate::config::{BackoffPolicy, SyncConfig};
use crate::error::CoreError;
use crate::message::{REQUEST_STATUS_FRAME, SyncMessage};
use crate::model::{StatusBatch, StatusPatch};
use crate::store::StateStore;
use crate::transport::{
    HubStatusSource, PushConnection, PushConnector, StatusSource, WsConnector,
};

const REQUEST_CHANNEL_SIZE: usize = 64;
const TRANSPORT_CHANNEL_SIZE: usize = 256;
const PULL_CHANNEL_SIZE: usize = 8;

// ── Public state types ───────────────────────────────────────────────

/// Externally observable controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SyncPhase {
    /// Initial pull issued, first push connection pending.
    Bootstrapping,
    /// Push channel open.
    Connected,
    /// Push channel lost; reconnect scheduled.
    Reconnecting { attempt: u32 },
    /// Retry budget exhausted (or push disabled); polling.
    Degraded,
    /// Torn down.
    Stopped,
}

/// Which path currently carries status updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TransportMode {
    Push,
    Pull,
}

/// Why a refresh request was not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    InFlight,
    TooSoon,
    Stopped,
}

/// Result of [`SyncController::request_refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A refresh went out over the given path.
    Started(TransportMode),
    /// Coalesced away.
    Skipped(SkipReason),
}

impl RefreshOutcome {
    pub fn is_started(self) -> bool {
        matches!(self, Self::Started(_))
    }
}

// ── SyncController ───────────────────────────────────────────────────

enum Request {
    Refresh {
        reply: oneshot::Sender<RefreshOutcome>,
    },
    UpdateStatus {
        device_id: String,
        patch: StatusPatch,
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running sync engine.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. The engine stops on
/// [`shutdown`](Self::shutdown) or once every handle is dropped.
#[derive(Clone)]
pub struct SyncController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: SyncConfig,
    store: Arc<StateStore>,
    commands: CommandDispatcher,
    phase: watch::Receiver<SyncPhase>,
    requests: mpsc::Sender<Request>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncController {
    /// Start syncing against the hub described by `config`.
    ///
    /// Must be called inside a tokio runtime. Returns once the engine is
    /// spawned; the first pull and push attempt happen in the background.
    pub fn spawn(config: SyncConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let client = config.hub_client()?;
        let connector =
            Arc::new(WsConnector::new(config.push_url()?).with_handshake_timeout(config.timeout));
        let source = Arc::new(HubStatusSource::new(client));
        Self::spawn_with(config, connector, source)
    }

    /// Start syncing through caller-supplied transports.
    pub fn spawn_with(
        config: SyncConfig,
        connector: Arc<dyn PushConnector>,
        source: Arc<dyn StatusSource>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let commands = CommandDispatcher::new(config.hub_client()?);
        let store = Arc::new(StateStore::new());
        let (phase_tx, phase) = watch::channel(SyncPhase::Bootstrapping);
        let (requests, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_CHANNEL_SIZE);
        let (pull_tx, pull_rx) = mpsc::channel(PULL_CHANNEL_SIZE);
        let cancel = CancellationToken::new();

        let engine = Engine {
            policy: Policy::from(&config),
            store: Arc::clone(&store),
            connector,
            source,
            phase: phase_tx,
            cancel: cancel.clone(),
            requests: request_rx,
            transport_tx,
            transport_rx,
            pull_tx,
            pull_rx,
            state: SyncState::default(),
        };
        let handle = tokio::spawn(engine.run());

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                store,
                commands,
                phase,
                requests,
                cancel,
                task: Mutex::new(Some(handle)),
            }),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Read-only access to synchronized state.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.inner.store
    }

    /// Device control against the same hub.
    pub fn commands(&self) -> &CommandDispatcher {
        &self.inner.commands
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to phase changes.
    pub fn phase(&self) -> watch::Receiver<SyncPhase> {
        self.inner.phase.clone()
    }

    pub fn current_phase(&self) -> SyncPhase {
        *self.inner.phase.borrow()
    }

    /// Whether the push channel is open. For display only.
    pub fn is_connected(&self) -> bool {
        self.current_phase() == SyncPhase::Connected
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Ask for fresh status. Coalesced: at most one refresh is in flight,
    /// and accepted refreshes are spaced by `refresh_min_interval`.
    pub async fn request_refresh(&self) -> RefreshOutcome {
        let stopped = RefreshOutcome::Skipped(SkipReason::Stopped);
        if self.inner.cancel.is_cancelled() {
            return stopped;
        }

        let (reply, rx) = oneshot::channel();
        if self
            .inner
            .requests
            .send(Request::Refresh { reply })
            .await
            .is_err()
        {
            return stopped;
        }
        rx.await.unwrap_or(stopped)
    }

    /// Apply a local patch (e.g. an optimistic command effect) through the
    /// engine. Resolves once the store has committed it.
    pub async fn update_device_status(
        &self,
        device_id: impl Into<String>,
        patch: StatusPatch,
    ) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ControllerStopped);
        }

        let (reply, rx) = oneshot::channel();
        self.inner
            .requests
            .send(Request::UpdateStatus {
                device_id: device_id.into(),
                patch,
                reply,
            })
            .await
            .map_err(|_| CoreError::ControllerStopped)?;
        rx.await.map_err(|_| CoreError::ControllerStopped)
    }

    /// Stop the engine: cancel timers, stop polling, close the push
    /// connection and wait for the task to finish. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        if let Some(handle) = self.inner.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "sync engine ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("phase", &self.current_phase())
            .finish_non_exhaustive()
    }
}

// ── Engine ───────────────────────────────────────────────────────────

/// Timing knobs copied out of `SyncConfig`.
struct Policy {
    push_enabled: bool,
    backoff: BackoffPolicy,
    poll_interval: Duration,
    refresh_min_interval: Duration,
    reprobe_every_polls: u32,
}

impl From<&SyncConfig> for Policy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            push_enabled: config.push_enabled,
            backoff: config.backoff.clone(),
            poll_interval: config.poll_interval,
            refresh_min_interval: config.refresh_min_interval,
            reprobe_every_polls: config.reprobe_every_polls,
        }
    }
}

/// Mutable sync state. Only the engine task touches it.
struct SyncState {
    mode: TransportMode,
    connection_attempts: u32,
    /// Start of the last accepted refresh.
    last_refresh: Option<Instant>,
    refresh_in_flight: bool,
    connection: Option<Box<dyn PushConnection>>,
    /// Id of `connection`; events tagged otherwise are stale.
    active_id: Option<ConnectionId>,
    next_id: ConnectionId,
    reconnect_at: Option<Instant>,
    poll: Option<Interval>,
    polls_since_probe: u32,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            mode: TransportMode::Pull,
            connection_attempts: 0,
            last_refresh: None,
            refresh_in_flight: false,
            connection: None,
            active_id: None,
            next_id: 0,
            reconnect_at: None,
            poll: None,
            polls_since_probe: 0,
        }
    }
}

struct Engine {
    policy: Policy,
    store: Arc<StateStore>,
    connector: Arc<dyn PushConnector>,
    source: Arc<dyn StatusSource>,
    phase: watch::Sender<SyncPhase>,
    cancel: CancellationToken,
    requests: mpsc::Receiver<Request>,
    /// Cloned into every connection the engine opens.
    transport_tx: mpsc::Sender<TaggedEvent>,
    transport_rx: mpsc::Receiver<TaggedEvent>,
    /// Cloned into every spawned pull.
    pull_tx: mpsc::Sender<StatusBatch>,
    pull_rx: mpsc::Receiver<StatusBatch>,
    state: SyncState,
}

impl Engine {
    async fn run(mut self) {
        self.bootstrap();

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                Some(tagged) = self.transport_rx.recv() => self.on_transport(tagged),
                Some(batch) = self.pull_rx.recv() => self.on_pull_result(&batch),
                request = self.requests.recv() => match request {
                    Some(request) => self.on_request(request),
                    // Every handle is gone.
                    None => break,
                },
                () = sleep_until(self.state.reconnect_at) => self.on_reconnect_due(),
                () = next_tick(&mut self.state.poll) => self.on_poll_tick(),
            }
        }

        self.teardown();
    }

    fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, phase: SyncPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            debug!(from = %previous, to = %phase, "sync phase changed");
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    fn bootstrap(&mut self) {
        info!(push = self.policy.push_enabled, "starting device sync");
        self.state.last_refresh = Some(Instant::now());
        self.start_pull();

        if self.policy.push_enabled {
            self.open_push();
        } else {
            self.enter_degraded();
        }
    }

    fn teardown(&mut self) {
        self.state.reconnect_at = None;
        self.state.poll = None;
        self.state.active_id = None;
        if let Some(conn) = self.state.connection.take() {
            conn.close();
        }
        self.set_phase(SyncPhase::Stopped);
        info!("device sync stopped");
    }

    // ── Push connection ──────────────────────────────────────────────

    fn open_push(&mut self) {
        self.state.next_id += 1;
        let id = self.state.next_id;

        match self.connector.open(id, self.transport_tx.clone()) {
            Ok(conn) => {
                debug!(conn_id = id, "push connection requested");
                if let Some(stale) = self.state.connection.replace(conn) {
                    stale.close();
                }
                self.state.active_id = Some(id);
            }
            Err(e) => {
                warn!(conn_id = id, error = %e, "could not start push connection");
                self.on_connection_lost();
            }
        }
    }

    fn on_transport(&mut self, tagged: TaggedEvent) {
        if self.state.active_id != Some(tagged.id) {
            trace!(conn_id = tagged.id, "dropping event from superseded connection");
            return;
        }

        match tagged.event {
            TransportEvent::Opened => self.on_opened(tagged.id),
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::Closed(reason) => {
                self.state.connection = None;
                self.state.active_id = None;
                debug!(conn_id = tagged.id, ?reason, "push connection closed");
                self.on_connection_lost();
            }
        }
    }

    fn on_opened(&mut self, id: ConnectionId) {
        let recovered = self.phase() == SyncPhase::Degraded;
        self.state.mode = TransportMode::Push;
        self.state.connection_attempts = 0;
        self.state.reconnect_at = None;
        self.state.poll = None;
        self.state.polls_since_probe = 0;
        self.set_phase(SyncPhase::Connected);

        if recovered {
            info!(conn_id = id, "push channel recovered, polling stopped");
        } else {
            info!(conn_id = id, "push channel connected");
        }
    }

    fn on_connection_lost(&mut self) {
        self.state.mode = TransportMode::Pull;

        if self.phase() == SyncPhase::Degraded {
            debug!("push probe failed, still polling");
            return;
        }

        self.state.connection_attempts += 1;
        let attempt = self.state.connection_attempts;

        if attempt > self.policy.backoff.max_retries {
            warn!(
                attempts = attempt,
                "push retry budget exhausted, falling back to polling"
            );
            self.enter_degraded();
            return;
        }

        let delay = self.policy.backoff.delay(attempt);
        info!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "push channel lost, reconnecting"
        );
        self.state.reconnect_at = Some(Instant::now() + delay);
        self.set_phase(SyncPhase::Reconnecting { attempt });
    }

    fn on_reconnect_due(&mut self) {
        self.state.reconnect_at = None;
        self.open_push();
    }

    fn enter_degraded(&mut self) {
        self.state.mode = TransportMode::Pull;
        self.state.reconnect_at = None;
        self.state.polls_since_probe = 0;

        // First tick fires immediately.
        let mut poll = tokio::time::interval(self.policy.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.state.poll = Some(poll);

        self.set_phase(SyncPhase::Degraded);
    }

    fn on_poll_tick(&mut self) {
        let outcome = self.try_refresh();
        trace!(?outcome, "poll tick");

        let every = self.policy.reprobe_every_polls;
        if every == 0 || !self.policy.push_enabled || self.state.connection.is_some() {
            return;
        }
        self.state.polls_since_probe += 1;
        if self.state.polls_since_probe >= every {
            self.state.polls_since_probe = 0;
            info!("probing push channel");
            self.open_push();
        }
    }

    // ── Inbound data ─────────────────────────────────────────────────

    fn on_message(&mut self, text: &str) {
        match SyncMessage::parse(text) {
            SyncMessage::InitialSnapshot(batch) | SyncMessage::BatchUpdate(batch) => {
                debug!(devices = batch.len(), "applying pushed batch");
                self.store.replace_all(&batch);
            }
            SyncMessage::DeviceUpdate { device_id, patch } => {
                trace!(device_id = %device_id, "applying pushed device update");
                self.store.update(&device_id, &patch);
            }
            other => debug!(kind = other.kind(), "ignoring push frame"),
        }
    }

    fn on_pull_result(&mut self, batch: &StatusBatch) {
        self.state.refresh_in_flight = false;
        if batch.is_empty() {
            debug!("pull returned no devices");
            return;
        }
        debug!(devices = batch.len(), "applying pulled statuses");
        self.store.replace_all(batch);
    }

    // ── Requests ─────────────────────────────────────────────────────

    fn on_request(&mut self, request: Request) {
        match request {
            Request::Refresh { reply } => {
                let outcome = self.try_refresh();
                debug!(?outcome, "manual refresh");
                // The caller may have given up waiting.
                let _ = reply.send(outcome);
            }
            Request::UpdateStatus {
                device_id,
                patch,
                reply,
            } => {
                self.store.update(&device_id, &patch);
                let _ = reply.send(());
            }
        }
    }

    /// Refresh gate shared by manual requests and poll ticks.
    fn try_refresh(&mut self) -> RefreshOutcome {
        if self.state.refresh_in_flight {
            return RefreshOutcome::Skipped(SkipReason::InFlight);
        }

        let now = Instant::now();
        let min = self.policy.refresh_min_interval;
        if self
            .state
            .last_refresh
            .is_some_and(|last| now.duration_since(last) < min)
        {
            return RefreshOutcome::Skipped(SkipReason::TooSoon);
        }
        self.state.last_refresh = Some(now);

        if self.state.mode == TransportMode::Push
            && self
                .state
                .connection
                .as_ref()
                .is_some_and(|conn| conn.is_open() && conn.send(REQUEST_STATUS_FRAME))
        {
            return RefreshOutcome::Started(TransportMode::Push);
        }

        self.start_pull();
        RefreshOutcome::Started(TransportMode::Pull)
    }

    /// Fetch in a separate task; the result comes back on `pull_rx`. Once
    /// the engine is gone the send fails and the result is dropped.
    fn start_pull(&mut self) {
        self.state.refresh_in_flight = true;
        let source = Arc::clone(&self.source);
        let results = self.pull_tx.clone();

        tokio::spawn(async move {
            let batch = source.fetch().await;
            let _ = results.send(batch).await;
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
