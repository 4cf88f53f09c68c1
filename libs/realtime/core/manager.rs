use crate::bus::EventBus;
use crate::config::RealtimeConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
use crate::core::envelope::Envelope;
use crate::core::tungstenite::TungsteniteConnector;
use crate::events;
use crate::traits::*;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How long connect() waits for a previous transport to finish closing
const PREVIOUS_TRANSPORT_GRACE: Duration = Duration::from_secs(5);

/// Commands for the transport task
#[derive(Debug)]
enum Outbound {
    /// Write a frame to the transport
    Frame(WsMessage),
    /// Close the transport with a normal-closure code
    Close,
}

/// Who asked for a connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// An explicit connect() call; failures are returned, never retried
    Caller,
    /// A backoff timer; failures feed the retry budget
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryDecision {
    Scheduled { attempt: u32, delay: Duration },
    Exhausted { attempts: u32 },
}

/// What happened when a transport reported its close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseOutcome {
    /// Closed by disconnect() or replaced by a newer connection
    Superseded,
    Retry(RetryDecision),
}

/// A spawned transport task
struct TransportTask {
    handle: JoinHandle<()>,
    /// Set by whoever emits `disconnected` for this transport
    reported: Arc<AtomicBool>,
}

/// Mutable connection bookkeeping, guarded by `Shared::inner`
///
/// Never held across an await.
struct Inner {
    attempts: u32,
    intentional_close: bool,
    /// Bumped by every connect attempt and by disconnect(); stale
    /// transports and in-flight opens compare against it
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    transport_task: Option<TransportTask>,
    reconnect_timer: Option<JoinHandle<()>>,
}

struct Shared {
    config: RealtimeConfig,
    strategy: Box<dyn ReconnectionStrategy>,
    connector: Arc<dyn Connector>,
    bus: EventBus,
    state: AtomicConnectionState,
    metrics: AtomicMetrics,
    inner: Mutex<Inner>,
}

/// Owner of the single socket connection
///
/// Connects, disconnects cleanly, reconnects with linear backoff after
/// abnormal closures, and refuses to open a second transport while one
/// is already being opened. Every transition is published on the
/// [`EventBus`] (`connected`, `disconnected`, `error`, `reconnect_failed`).
///
/// Cloning is cheap; all clones drive the same connection.
///
/// # Example
/// ```ignore
/// let bus = EventBus::new();
/// let manager = ConnectionManager::new(RealtimeConfig::new("wss://api.example.com/ws"), bus.clone());
///
/// let _sub = bus.on(events::CONNECTED, |_| {
///     info!("socket up");
///     Ok(())
/// });
///
/// manager.connect().await?;
/// manager.send("ping", &json!({}));
/// manager.disconnect();
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Create a manager that dials the configured URL with tokio-tungstenite
    pub fn new(config: RealtimeConfig, bus: EventBus) -> Self {
        Self::with_connector(config, bus, Arc::new(TungsteniteConnector))
    }

    /// Create a manager with a custom transport connector
    pub fn with_connector(config: RealtimeConfig, bus: EventBus, connector: Arc<dyn Connector>) -> Self {
        let strategy = Box::new(config.backoff());
        Self {
            shared: Arc::new(Shared {
                config,
                strategy,
                connector,
                bus,
                state: AtomicConnectionState::new(ConnectionState::Idle),
                metrics: AtomicMetrics::new(),
                inner: Mutex::new(Inner {
                    attempts: 0,
                    intentional_close: false,
                    generation: 0,
                    outbound: None,
                    transport_task: None,
                    reconnect_timer: None,
                }),
            }),
        }
    }

    /// Open the connection
    ///
    /// Returns immediately if already connected or connecting. A failed
    /// open is returned to the caller and does not schedule a retry.
    ///
    /// The attempt runs on its own task, so dropping the returned future
    /// (a `timeout` or `select!` around it) does not abandon the attempt.
    pub async fn connect(&self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.open(Origin::Caller).await })
            .await
            .unwrap_or_else(|e| Err(RealtimeError::WebSocket(format!("connection attempt failed: {}", e))))
    }

    /// Close the connection and stop reconnecting
    ///
    /// Cancels any pending reconnect, closes the transport with a
    /// normal-closure code and resets the attempt counter. Idempotent.
    pub fn disconnect(&self) {
        self.shared.disconnect();
    }

    /// Send an event to the server
    ///
    /// The envelope is written only while connected; otherwise it is
    /// dropped and `false` is returned. Nothing is queued for later.
    pub fn send<T>(&self, event: &str, payload: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        let outbound = {
            let inner = self.shared.inner.lock();
            match (&inner.outbound, self.shared.state.get()) {
                (Some(outbound), ConnectionState::Connected) => outbound.clone(),
                (_, state) => {
                    debug!("Dropping '{}' while {:?}", event, state);
                    return false;
                }
            }
        };

        let frame = match serde_json::to_value(payload)
            .map_err(RealtimeError::from)
            .and_then(|data| Envelope::new(event, data).encode())
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode '{}': {}", event, e);
                return false;
            }
        };

        if self.shared.config.debug {
            debug!("-> {}", frame);
        }

        outbound.send(Outbound::Frame(WsMessage::Text(frame))).is_ok()
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.shared.state.is_connected()
    }

    #[inline]
    pub fn is_connecting(&self) -> bool {
        self.shared.state.is_connecting()
    }

    /// Reconnect attempts made since the last successful connection
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.inner.lock().attempts
    }

    /// Opening a transport now, or waiting out a backoff delay before the
    /// next automatic attempt
    pub fn is_reconnecting(&self) -> bool {
        self.is_connecting() || self.shared.inner.lock().reconnect_timer.is_some()
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_sent: self.shared.metrics.messages_sent(),
            messages_received: self.shared.metrics.messages_received(),
            reconnect_count: self.shared.metrics.reconnect_count(),
            connection_state: self.shared.state.get(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.shared.config
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.shared.config.url)
            .field("state", &self.shared.state.get())
            .finish()
    }
}

impl Shared {
    async fn open(self: &Arc<Self>, origin: Origin) -> Result<()> {
        let (generation, previous_task) = {
            let mut inner = self.inner.lock();

            let state = self.state.get();
            if matches!(state, ConnectionState::Connected | ConnectionState::Connecting) {
                debug!("connect() ignored, already {:?}", state);
                return Ok(());
            }

            match origin {
                Origin::Caller => {
                    if let Some(timer) = inner.reconnect_timer.take() {
                        debug!("Explicit connect() cancels pending reconnect");
                        timer.abort();
                    }
                    inner.intentional_close = false;
                }
                Origin::Retry => {
                    // The handle belongs to the task running this future
                    inner.reconnect_timer = None;
                    if inner.intentional_close {
                        return Ok(());
                    }
                }
            }

            inner.generation += 1;
            self.state.set(ConnectionState::Connecting);
            (inner.generation, inner.transport_task.take())
        };

        // A transport torn down by disconnect() reports `disconnected`
        // before this attempt can report `connected`
        if let Some(previous) = previous_task {
            let abort = previous.handle.abort_handle();
            if tokio::time::timeout(PREVIOUS_TRANSPORT_GRACE, previous.handle)
                .await
                .is_err()
            {
                warn!("Previous transport did not close in time, aborting it");
                abort.abort();
                if !previous.reported.swap(true, Ordering::SeqCst) {
                    self.bus.emit(events::DISCONNECTED, &Value::Null);
                }
            }
        }

        info!("Connecting to {}", self.config.url);

        match self.connector.open(&self.config.url).await {
            Ok(transport) => self.on_open(generation, transport).await,
            Err(e) => self.on_open_failed(generation, origin, e),
        }
    }

    async fn on_open(self: &Arc<Self>, generation: u64, transport: Transport) -> Result<()> {
        let (start_tx, start_rx) = oneshot::channel();

        let leftover = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                Some(transport)
            } else {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let reported = Arc::new(AtomicBool::new(false));
                inner.attempts = 0;
                inner.outbound = Some(outbound_tx);
                inner.transport_task = Some(TransportTask {
                    handle: tokio::spawn(run_transport(
                        Arc::clone(self),
                        generation,
                        transport,
                        outbound_rx,
                        start_rx,
                        Arc::clone(&reported),
                    )),
                    reported,
                });
                self.state.set(ConnectionState::Connected);
                None
            }
        };

        if let Some(Transport { mut sink, .. }) = leftover {
            debug!("Connection attempt superseded by disconnect(), closing transport");
            let _ = sink.close(NORMAL_CLOSURE).await;
            return Ok(());
        }

        info!("Connected to {}", self.config.url);
        self.bus.emit(events::CONNECTED, &Value::Null);

        // The transport task reads only after `connected` went out
        let _ = start_tx.send(());
        Ok(())
    }

    fn on_open_failed(self: &Arc<Self>, generation: u64, origin: Origin, error: RealtimeError) -> Result<()> {
        let decision = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                debug!("Failed connection attempt was superseded: {}", error);
                return match origin {
                    Origin::Caller => Err(error),
                    Origin::Retry => Ok(()),
                };
            }

            self.state.set(ConnectionState::Disconnected);
            match origin {
                Origin::Caller => None,
                Origin::Retry => Some(self.schedule_retry(&mut inner)),
            }
        };

        warn!("Failed to connect to {}: {}", self.config.url, error);
        self.bus
            .emit(events::ERROR, &json!({ "message": error.to_string() }));

        if let Some(RetryDecision::Exhausted { attempts }) = decision {
            self.report_exhausted(attempts);
        }

        match origin {
            Origin::Caller => Err(error),
            Origin::Retry => Ok(()),
        }
    }

    /// Schedule the next reconnect or give up
    fn schedule_retry(self: &Arc<Self>, inner: &mut Inner) -> RetryDecision {
        let attempt = inner.attempts + 1;

        let Some(delay) = self.strategy.next_delay(attempt) else {
            self.state.set(ConnectionState::ReconnectExhausted);
            return RetryDecision::Exhausted {
                attempts: inner.attempts,
            };
        };

        inner.attempts = attempt;
        self.metrics.increment_reconnects();
        info!(
            "Reconnecting in {:?} (attempt {}/{})",
            delay,
            attempt,
            self.strategy.max_attempts()
        );

        let shared = Arc::clone(self);
        inner.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = shared.open(Origin::Retry).await {
                debug!("Reconnect attempt {} ended with: {}", attempt, e);
            }
        }));

        RetryDecision::Scheduled { attempt, delay }
    }

    fn report_exhausted(&self, attempts: u32) {
        error!("Reconnection failed after {} attempts, giving up", attempts);
        self.bus
            .emit(events::RECONNECT_FAILED, &json!({ "attempts": attempts }));
    }

    /// Called by the transport task once its transport has closed
    fn transport_closed(self: &Arc<Self>, generation: u64) -> CloseOutcome {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.intentional_close {
            return CloseOutcome::Superseded;
        }

        inner.outbound = None;
        inner.transport_task = None;
        self.state.set(ConnectionState::Disconnected);

        CloseOutcome::Retry(self.schedule_retry(&mut inner))
    }

    fn disconnect(&self) {
        let mut inner = self.inner.lock();

        inner.intentional_close = true;
        inner.generation += 1;
        inner.attempts = 0;

        if let Some(timer) = inner.reconnect_timer.take() {
            debug!("Cancelling pending reconnect");
            timer.abort();
        }

        if let Some(outbound) = inner.outbound.take() {
            info!("Disconnecting from {}", self.config.url);
            let _ = outbound.send(Outbound::Close);
        }

        if self.state.get() != ConnectionState::Idle {
            self.state.set(ConnectionState::Disconnected);
        }
    }
}

/// Per-connection task owning the open transport
async fn run_transport(
    shared: Arc<Shared>,
    generation: u64,
    transport: Transport,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    start_rx: oneshot::Receiver<()>,
    reported: Arc<AtomicBool>,
) {
    let Transport {
        mut sink,
        mut source,
    } = transport;
    let debug_frames = shared.config.debug;

    let _ = start_rx.await;

    loop {
        tokio::select! {
            inbound = source.recv() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    shared.metrics.increment_received();
                    if debug_frames {
                        debug!("<- {}", text);
                    }
                    shared.bus.dispatch_frame(&text);
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    shared.metrics.increment_received();
                    debug!("Ignoring binary frame ({} bytes)", data.len());
                }
                Some(Err(e)) => {
                    error!("Transport error: {}", e);
                    shared.bus.emit(events::ERROR, &json!({ "message": e.to_string() }));
                }
                None => {
                    warn!("Connection closed by server");
                    break;
                }
            },

            command = outbound_rx.recv() => match command {
                Some(Outbound::Frame(message)) => {
                    if let Err(e) = sink.send(message).await {
                        error!("Failed to write frame: {}", e);
                        shared.bus.emit(events::ERROR, &json!({ "message": e.to_string() }));
                        break;
                    }
                    shared.metrics.increment_sent();
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = sink.close(NORMAL_CLOSURE).await {
                        debug!("Close handshake failed: {}", e);
                    }
                    break;
                }
            },
        }
    }

    let outcome = shared.transport_closed(generation);
    if !reported.swap(true, Ordering::SeqCst) {
        shared.bus.emit(events::DISCONNECTED, &Value::Null);
    }

    match outcome {
        CloseOutcome::Retry(RetryDecision::Exhausted { attempts }) => shared.report_exhausted(attempts),
        CloseOutcome::Retry(RetryDecision::Scheduled { attempt, delay }) => {
            debug!("Reconnect attempt {} armed for {:?} from now", attempt, delay)
        }
        CloseOutcome::Superseded => debug!("Transport closed after disconnect()"),
    }
}
