//! Sync engine: connection lifecycle, push/pull orchestration, heartbeat,
//! and reconnect with backoff.
//!
//! The engine owns exactly one connection lifecycle at a time
//! (`disconnected → connecting → connected → reconnecting`). It never
//! mutates domain state itself; inbound events are handed to the injected
//! `EventApplier` and the projector serializes all writes.

use crate::client::RelayClient;
use crate::error::{Result, SyncError};
use crate::socket::{Socket, SocketEvent};
use crate::types::{ConnectionStatus, EngineStatus, EventEnvelope, PullRequest, WireEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskdeck_core::clock::SharedClock;
use taskdeck_core::events::{EventLog, RemoteEvent, CURRENT_PAYLOAD_VERSION};
use taskdeck_core::projector::EventApplier;
use taskdeck_core::sync::{
    epoch_checkpoint, reconnect_delay, CheckpointStore, InitialSyncProgress, InitialSyncSnapshot,
    FALLBACK_PULL_INTERVAL_SECS, HEARTBEAT_INTERVAL_SECS, MAX_CONSECUTIVE_HEARTBEAT_FAILURES,
    MAX_RECONNECT_ATTEMPTS, PERIODIC_PUSH_INTERVAL_SECS, PULL_PAGE_LIMIT,
};
use taskdeck_core::telemetry::SharedTelemetry;
use tokio::sync::{mpsc, watch, OnceCell};
use tokio::task::JoinHandle;

/// Bearer token source. Called for every request cycle; a 401 triggers one
/// refresh-and-retry. Failing aborts the current sync operation.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Stable hardware device id, identical across restarts.
#[async_trait]
pub trait DeviceIdProvider: Send + Sync {
    async fn device_id(&self) -> Result<String>;
}

/// Tunables for the engine's long-lived tasks.
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    pub base_url: String,
    pub periodic_push_interval: Duration,
    pub fallback_pull_interval: Duration,
    pub heartbeat_interval: Duration,
    pub max_heartbeat_failures: u32,
    pub max_reconnect_attempts: u32,
    pub pull_page_limit: i64,
}

impl SyncEngineConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            periodic_push_interval: Duration::from_secs(PERIODIC_PUSH_INTERVAL_SECS),
            fallback_pull_interval: Duration::from_secs(FALLBACK_PULL_INTERVAL_SECS),
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            max_heartbeat_failures: MAX_CONSECUTIVE_HEARTBEAT_FAILURES,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            pull_page_limit: PULL_PAGE_LIMIT,
        }
    }
}

/// Collaborators injected into the engine.
pub struct SyncEngineDeps {
    pub tokens: Arc<dyn TokenProvider>,
    pub device_ids: Arc<dyn DeviceIdProvider>,
    pub event_log: Arc<dyn EventLog>,
    pub applier: Arc<dyn EventApplier>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub clock: SharedClock,
    pub telemetry: SharedTelemetry,
}

#[derive(Debug, Default)]
struct EngineStats {
    last_push_at: Option<DateTime<Utc>>,
    last_pull_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    consecutive_failures: u32,
}

struct EngineInner {
    config: SyncEngineConfig,
    client: RelayClient,
    tokens: Arc<dyn TokenProvider>,
    device_ids: Arc<dyn DeviceIdProvider>,
    event_log: Arc<dyn EventLog>,
    applier: Arc<dyn EventApplier>,
    checkpoints: Arc<dyn CheckpointStore>,
    clock: SharedClock,
    telemetry: SharedTelemetry,
    progress: InitialSyncProgress,
    status_tx: watch::Sender<ConnectionStatus>,
    socket: tokio::sync::Mutex<Option<Socket>>,
    own_device_id: OnceCell<String>,
    stats: Mutex<EngineStats>,
    // One push / one pull in flight at a time; overlapping triggers coalesce.
    push_lock: tokio::sync::Mutex<()>,
    pull_lock: tokio::sync::Mutex<()>,
}

/// The stateful sync client.
pub struct SyncEngine {
    inner: Arc<EngineInner>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

/// Boundary filter for inbound events; pulled pages and socket frames go
/// through the same gate.
fn should_accept(event: &WireEvent, own_device_id: &str, initial_sync: bool) -> bool {
    match event.payload_version {
        Some(version) if version >= CURRENT_PAYLOAD_VERSION => {}
        _ => return false,
    }
    // The initial sync rebuilds an empty store, so the device's own events
    // are wanted; afterwards they are echoes of local state.
    if !initial_sync && event.device_id == own_device_id {
        return false;
    }
    true
}

impl SyncEngine {
    pub fn new(config: SyncEngineConfig, deps: SyncEngineDeps) -> Result<Self> {
        let client = RelayClient::new(&config.base_url)?;
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                client,
                tokens: deps.tokens,
                device_ids: deps.device_ids,
                event_log: deps.event_log,
                applier: deps.applier,
                checkpoints: deps.checkpoints,
                clock: deps.clock,
                telemetry: deps.telemetry,
                progress: InitialSyncProgress::new(),
                status_tx,
                socket: tokio::sync::Mutex::new(None),
                own_device_id: OnceCell::new(),
                stats: Mutex::new(EngineStats::default()),
                push_lock: tokio::sync::Mutex::new(()),
                pull_lock: tokio::sync::Mutex::new(()),
            }),
            supervisor: Mutex::new(None),
        })
    }

    /// Launch the connection supervisor. `nudge_rx` is the receiving half of
    /// the services' `PushNudge` channel.
    pub fn start(&self, nudge_rx: mpsc::UnboundedReceiver<()>) {
        let mut guard = self.supervisor.lock().unwrap();
        if guard.is_some() {
            log::warn!("[sync] engine already started");
            return;
        }
        let inner = Arc::clone(&self.inner);
        *guard = Some(tokio::spawn(async move {
            EngineInner::run(inner, nudge_rx).await;
        }));
    }

    /// Tear the connection down. Pending events stay pending; the checkpoint
    /// is wherever the last successful page left it.
    pub async fn stop(&self) {
        let handle = self.supervisor.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.abort();
        }
        *self.inner.socket.lock().await = None;
        self.inner.status_tx.send_replace(ConnectionStatus::Disconnected);
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status_tx.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn initial_sync_progress(&self) -> InitialSyncSnapshot {
        self.inner.progress.snapshot()
    }

    /// Engine health snapshot for status surfaces.
    pub fn engine_status(&self) -> Result<EngineStatus> {
        let stats = self.inner.stats.lock().unwrap();
        Ok(EngineStatus {
            connection: *self.inner.status_tx.borrow(),
            pending_events: self.inner.event_log.pending_count()?,
            checkpoint: self.inner.checkpoints.get()?,
            last_push_at: stats.last_push_at,
            last_pull_at: stats.last_pull_at,
            last_error: stats.last_error.clone(),
            consecutive_failures: stats.consecutive_failures,
        })
    }

    /// Drain the pending queue now, outside the periodic cadence.
    pub async fn manual_push(&self) -> Result<usize> {
        self.inner.push_pending().await
    }

    /// Pull until the relay reports no more pages.
    pub async fn manual_pull(&self) -> Result<usize> {
        self.inner.pull_until_caught_up().await
    }
}

impl EngineInner {
    async fn run(inner: Arc<EngineInner>, mut nudge_rx: mpsc::UnboundedReceiver<()>) {
        let mut attempt: u32 = 0;
        let mut nudges_open = true;

        loop {
            let status = if attempt == 0 {
                ConnectionStatus::Connecting
            } else {
                ConnectionStatus::Reconnecting
            };
            inner.status_tx.send_replace(status);

            match inner.connect_socket().await {
                Ok((socket, mut socket_rx)) => {
                    attempt = 0;
                    *inner.socket.lock().await = Some(socket);
                    inner.status_tx.send_replace(ConnectionStatus::Connected);
                    log::info!("[sync] connected");

                    // Startup: drain local writes, then close the inbound gap.
                    if let Err(err) = inner.push_pending().await {
                        inner.note_error(&err);
                    }
                    if let Err(err) = inner.pull_until_caught_up().await {
                        inner.note_error(&err);
                    }

                    let mut heartbeat = tokio::time::interval(inner.config.heartbeat_interval);
                    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    heartbeat.tick().await; // first tick fires immediately
                    let mut push_tick = tokio::time::interval(inner.config.periodic_push_interval);
                    push_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    push_tick.tick().await;
                    // The socket is the primary inbound path; the fallback
                    // pull covers frames lost while it was degraded.
                    let mut pull_tick = tokio::time::interval(inner.config.fallback_pull_interval);
                    pull_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    pull_tick.tick().await;
                    let mut heartbeat_failures: u32 = 0;

                    loop {
                        tokio::select! {
                            frame = socket_rx.recv() => match frame {
                                Some(SocketEvent::Frame(events)) => {
                                    if let Err(err) = inner.project_wire_events(events).await {
                                        inner.note_error(&err);
                                    }
                                }
                                Some(SocketEvent::Closed) | None => {
                                    log::info!("[sync] socket lost; reconnecting");
                                    break;
                                }
                            },
                            _ = heartbeat.tick() => {
                                let alive = {
                                    let socket = inner.socket.lock().await;
                                    socket.as_ref().map(|s| s.send_ping().is_ok()).unwrap_or(false)
                                };
                                if alive {
                                    heartbeat_failures = 0;
                                } else {
                                    heartbeat_failures += 1;
                                    log::warn!(
                                        "[sync] heartbeat failure {}/{}",
                                        heartbeat_failures,
                                        inner.config.max_heartbeat_failures
                                    );
                                    if heartbeat_failures >= inner.config.max_heartbeat_failures {
                                        break;
                                    }
                                }
                            },
                            _ = push_tick.tick() => {
                                if let Err(err) = inner.push_pending().await {
                                    inner.note_error(&err);
                                }
                            },
                            _ = pull_tick.tick() => {
                                if let Err(err) = inner.pull_until_caught_up().await {
                                    inner.note_error(&err);
                                }
                            },
                            nudge = nudge_rx.recv(), if nudges_open => match nudge {
                                Some(_) => {
                                    if let Err(err) = inner.push_pending().await {
                                        inner.note_error(&err);
                                    }
                                }
                                None => nudges_open = false,
                            },
                        }
                    }
                    *inner.socket.lock().await = None;
                }
                Err(err) => {
                    log::warn!("[sync] connect failed: {}", err);
                    inner.note_error(&err);
                }
            }

            attempt += 1;
            if attempt > inner.config.max_reconnect_attempts {
                log::error!(
                    "[sync] giving up after {} reconnect attempts",
                    inner.config.max_reconnect_attempts
                );
                inner.status_tx.send_replace(ConnectionStatus::Disconnected);
                return;
            }
            inner.status_tx.send_replace(ConnectionStatus::Reconnecting);
            let delay = reconnect_delay(attempt);
            log::info!("[sync] reconnect attempt {} in {:?}", attempt, delay);
            tokio::time::sleep(delay).await;
        }
    }

    async fn connect_socket(&self) -> Result<(Socket, mpsc::Receiver<SocketEvent>)> {
        let token = self.tokens.access_token().await?;
        // Resolve and cache the stable device id up front; filters need it.
        self.own_device_id().await?;
        let url = self.client.websocket_url(&token)?;
        Socket::connect(&url).await
    }

    async fn own_device_id(&self) -> Result<&str> {
        let id = self
            .own_device_id
            .get_or_try_init(|| async { self.device_ids.device_id().await })
            .await?;
        Ok(id.as_str())
    }

    fn note_error(&self, error: &SyncError) {
        let mut stats = self.stats.lock().unwrap();
        stats.last_error = Some(error.to_string());
        stats.consecutive_failures = stats.consecutive_failures.saturating_add(1);
        // Projection/storage failures are captured as errors; transport
        // hiccups stay breadcrumbs, they are routine.
        if let SyncError::Core(core_error) = error {
            self.telemetry.capture(core_error, "sync engine");
        } else {
            self.telemetry.breadcrumb(
                "sync",
                "engine operation failed",
                serde_json::json!({ "error": error.to_string() }),
            );
        }
    }

    fn note_success(&self, pushed: bool) {
        let mut stats = self.stats.lock().unwrap();
        stats.last_error = None;
        stats.consecutive_failures = 0;
        let now = self.clock.now();
        if pushed {
            stats.last_push_at = Some(now);
        } else {
            stats.last_pull_at = Some(now);
        }
    }

    // ── Outbound ────────────────────────────────────────────────────────────

    async fn push_pending(&self) -> Result<usize> {
        let _guard = self.push_lock.lock().await;

        let pending = self.event_log.fetch_pending()?;
        if pending.is_empty() {
            return Ok(0);
        }
        let envelope = EventEnvelope {
            events: pending.iter().map(WireEvent::from_event).collect(),
        };

        // Socket first, fire-and-forget; HTTP below is authoritative.
        {
            let socket = self.socket.lock().await;
            if let Some(socket) = socket.as_ref() {
                if let Err(err) = socket.send_envelope(&envelope) {
                    log::debug!("[sync] optimistic socket push failed: {}", err);
                }
            }
        }

        let response = self.push_with_reauth(&envelope).await?;
        let acknowledged = response.acknowledged;
        // An id in both lists counts as acknowledged; the relay owns
        // acceptance and the ack is the stronger signal.
        let rejected: Vec<String> = response
            .rejected
            .into_iter()
            .filter(|id| !acknowledged.contains(id))
            .collect();

        let accepted_count = acknowledged.len();
        self.event_log.mark_synced(acknowledged).await?;
        if !rejected.is_empty() {
            log::warn!(
                "[sync] relay rejected {} events: {:?}",
                rejected.len(),
                response.errors
            );
            let reason = if response.errors.is_empty() {
                None
            } else {
                Some(response.errors.join("; "))
            };
            self.event_log.mark_rejected(rejected, reason).await?;
        }
        self.note_success(true);
        Ok(accepted_count)
    }

    async fn push_with_reauth(&self, envelope: &EventEnvelope) -> Result<crate::types::PushResponse> {
        let token = self.tokens.access_token().await?;
        match self.client.push(&token, envelope).await {
            Err(err) if err.status_code() == Some(401) => {
                log::info!("[sync] push got 401; refreshing token and retrying once");
                let token = self.tokens.access_token().await?;
                self.client.push(&token, envelope).await
            }
            other => other,
        }
    }

    async fn pull_with_reauth(&self, request: &PullRequest) -> Result<crate::types::PullResponse> {
        let token = self.tokens.access_token().await?;
        match self.client.pull(&token, request).await {
            Err(err) if err.status_code() == Some(401) => {
                log::info!("[sync] pull got 401; refreshing token and retrying once");
                let token = self.tokens.access_token().await?;
                self.client.pull(&token, request).await
            }
            other => other,
        }
    }

    // ── Inbound ─────────────────────────────────────────────────────────────

    /// Cursor-paginated pull. The checkpoint advances only after the current
    /// page has fully projected, so a failure replays the page on the next
    /// attempt.
    async fn pull_until_caught_up(&self) -> Result<usize> {
        let _guard = self.pull_lock.lock().await;

        let mut checkpoint = self.checkpoints.get()?;
        let initial_sync = checkpoint.is_none();
        if initial_sync {
            log::info!("[sync] no checkpoint; running initial sync");
            self.progress.begin();
        }

        let own_device_id = self.own_device_id().await?.to_string();
        let result = async {
            let mut pulled = 0usize;
            loop {
                let request = PullRequest {
                    since: checkpoint.clone().unwrap_or_else(epoch_checkpoint),
                    limit: self.config.pull_page_limit,
                };
                let response = self.pull_with_reauth(&request).await?;
                let events = response.events.unwrap_or_default();
                let page_size = events.len();
                if initial_sync {
                    self.progress.add_total(page_size);
                }

                let now = self.clock.now();
                let remote: Vec<RemoteEvent> = events
                    .into_iter()
                    .filter(|event| should_accept(event, &own_device_id, initial_sync))
                    .map(|event| event.into_remote(now))
                    .collect();
                self.applier.apply_batch(remote).await?;

                if initial_sync {
                    self.progress.add_processed(page_size);
                }
                pulled += page_size;

                match response.next_checkpoint {
                    Some(next) => {
                        self.checkpoints.set(next.clone()).await?;
                        checkpoint = Some(next);
                    }
                    // Without a fresh cursor the same request would repeat.
                    None if response.has_more => {
                        log::warn!("[sync] relay reported more pages without a checkpoint");
                        break;
                    }
                    None => {}
                }
                if !response.has_more {
                    break;
                }
            }
            Ok(pulled)
        }
        .await;

        if initial_sync {
            self.progress.finish();
        }
        if result.is_ok() {
            self.note_success(false);
        }
        result
    }

    /// Socket-delivered events run through the same filter and applier path
    /// as pulled pages.
    async fn project_wire_events(&self, events: Vec<WireEvent>) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let own_device_id = self.own_device_id().await?.to_string();
        let initial_sync = self.checkpoints.get()?.is_none();
        let now = self.clock.now();
        let remote: Vec<RemoteEvent> = events
            .into_iter()
            .filter(|event| should_accept(event, &own_device_id, initial_sync))
            .map(|event| event.into_remote(now))
            .collect();
        Ok(self.applier.apply_batch(remote).await?)
    }
}

#[cfg(test)]
mod tests;
