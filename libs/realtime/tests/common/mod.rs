//! Common test utilities for realtime integration tests
//!
//! `MockConnector` scripts transport opens in-process so tests can run on
//! paused tokio time. `MockWsServer` is a real tokio-tungstenite echo
//! server for end-to-end checks.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use realtime::*;
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

pub const MOCK_URL: &str = "ws://mock.test/ws";

/// Config pointing at the mock endpoint
pub fn mock_config(base_delay_ms: u64, max_attempts: u32) -> RealtimeConfig {
    RealtimeConfig::new(MOCK_URL)
        .with_reconnect_base_delay(Duration::from_millis(base_delay_ms))
        .with_max_reconnect_attempts(max_attempts)
}

/// Manager wired to a fresh mock connector
pub fn mock_manager(config: RealtimeConfig) -> (Arc<MockConnector>, ConnectionManager) {
    let connector = MockConnector::new();
    let manager = ConnectionManager::with_connector(config, EventBus::new(), connector.clone());
    (connector, manager)
}

/// Let spawned tasks run to quiescence without reaching any backoff timer
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// ============================================================================
// Event log
// ============================================================================

/// Records every emission of the given events, in order
pub struct EventLog {
    entries: Arc<Mutex<Vec<(String, Value)>>>,
    _subscriptions: Vec<Subscription>,
}

impl EventLog {
    pub fn lifecycle(bus: &EventBus) -> Self {
        Self::record(bus, &events::LIFECYCLE_EVENTS)
    }

    pub fn record(bus: &EventBus, names: &[&str]) -> Self {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let subscriptions = names
            .iter()
            .map(|name| {
                let entries = Arc::clone(&entries);
                let event = name.to_string();
                bus.on(name, move |data| {
                    entries.lock().push((event.clone(), data.clone()));
                    Ok(())
                })
            })
            .collect();

        Self {
            entries,
            _subscriptions: subscriptions,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.entries.lock().iter().filter(|(name, _)| name == event).count()
    }

    pub fn payloads(&self, event: &str) -> Vec<Value> {
        self.entries
            .lock()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, data)| data.clone())
            .collect()
    }
}

// ============================================================================
// Scripted connector
// ============================================================================

/// Outcome of one transport open
#[derive(Debug, Clone)]
pub enum Plan {
    Accept,
    Refuse(String),
}

impl Plan {
    pub fn refuse() -> Self {
        Plan::Refuse("connection refused".to_string())
    }
}

struct Script {
    queued: VecDeque<Plan>,
    fallback: Plan,
    open_delay: Option<Duration>,
    links: Vec<MockLink>,
    open_times: Vec<Instant>,
}

/// In-process connector whose opens follow a script
///
/// Queued plans are consumed first; afterwards every open follows the
/// fallback plan (accept unless changed).
pub struct MockConnector {
    opens: AtomicUsize,
    script: Mutex<Script>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            opens: AtomicUsize::new(0),
            script: Mutex::new(Script {
                queued: VecDeque::new(),
                fallback: Plan::Accept,
                open_delay: None,
                links: Vec::new(),
                open_times: Vec::new(),
            }),
        })
    }

    pub fn queue(&self, plan: Plan) {
        self.script.lock().queued.push_back(plan);
    }

    pub fn set_fallback(&self, plan: Plan) {
        self.script.lock().fallback = plan;
    }

    /// Delay every open by `delay` before it resolves
    pub fn set_open_delay(&self, delay: Duration) {
        self.script.lock().open_delay = Some(delay);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// When each open started
    pub fn open_times(&self) -> Vec<Instant> {
        self.script.lock().open_times.clone()
    }

    /// Server side of the `index`th accepted transport
    pub fn link(&self, index: usize) -> MockLink {
        self.script.lock().links[index].clone()
    }

    pub fn last_link(&self) -> MockLink {
        let script = self.script.lock();
        script.links[script.links.len() - 1].clone()
    }

    pub fn link_count(&self) -> usize {
        self.script.lock().links.len()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, _url: &str) -> Result<Transport> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let (plan, delay) = {
            let mut script = self.script.lock();
            script.open_times.push(Instant::now());
            let plan = script
                .queued
                .pop_front()
                .unwrap_or_else(|| script.fallback.clone());
            (plan, script.open_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match plan {
            Plan::Refuse(reason) => Err(RealtimeError::WebSocket(reason)),
            Plan::Accept => {
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let link = MockLink {
                    inbound: inbound_tx,
                    written: Arc::new(Mutex::new(Vec::new())),
                    close_code: Arc::new(Mutex::new(None)),
                    close_hangs: Arc::new(AtomicBool::new(false)),
                };
                let transport = Transport::new(
                    MockSink {
                        written: Arc::clone(&link.written),
                        close_code: Arc::clone(&link.close_code),
                        close_hangs: Arc::clone(&link.close_hangs),
                    },
                    MockSource {
                        inbound: inbound_rx,
                        done: false,
                    },
                );
                self.script.lock().links.push(link);
                Ok(transport)
            }
        }
    }
}

enum Inbound {
    Frame(WsMessage),
    Error(String),
    Close,
}

/// Server side of one mock transport
#[derive(Clone)]
pub struct MockLink {
    inbound: mpsc::UnboundedSender<Inbound>,
    written: Arc<Mutex<Vec<WsMessage>>>,
    close_code: Arc<Mutex<Option<u16>>>,
    close_hangs: Arc<AtomicBool>,
}

impl MockLink {
    pub fn push_text(&self, text: &str) {
        let _ = self.inbound.send(Inbound::Frame(WsMessage::Text(text.to_string())));
    }

    pub fn push_event(&self, event: &str, data: Value) {
        let frame = Envelope::new(event, data).encode().unwrap();
        self.push_text(&frame);
    }

    pub fn push_binary(&self, data: Vec<u8>) {
        let _ = self.inbound.send(Inbound::Frame(WsMessage::Binary(data)));
    }

    /// Surface a read error on the client side
    pub fn fail(&self, reason: &str) {
        let _ = self.inbound.send(Inbound::Error(reason.to_string()));
    }

    /// Close from the server side (abnormal for the client)
    pub fn close(&self) {
        let _ = self.inbound.send(Inbound::Close);
    }

    /// Envelopes the client wrote, decoded
    pub fn sent(&self) -> Vec<Envelope> {
        self.written
            .lock()
            .iter()
            .filter_map(|message| message.as_text().map(|text| Envelope::decode(text).unwrap()))
            .collect()
    }

    /// `(event, data)` pairs the client wrote
    pub fn sent_events(&self) -> Vec<(String, Value)> {
        self.sent().into_iter().map(Envelope::into_parts).collect()
    }

    /// Make the client's close handshake on this transport never finish
    pub fn hang_on_close(&self) {
        self.close_hangs.store(true, Ordering::SeqCst);
    }

    /// Close code the client used, if it closed this transport
    pub fn close_code(&self) -> Option<u16> {
        *self.close_code.lock()
    }
}

struct MockSink {
    written: Arc<Mutex<Vec<WsMessage>>>,
    close_code: Arc<Mutex<Option<u16>>>,
    close_hangs: Arc<AtomicBool>,
}

#[async_trait]
impl TransportSink for MockSink {
    async fn send(&mut self, message: WsMessage) -> Result<()> {
        if self.close_code.lock().is_some() {
            return Err(RealtimeError::ConnectionClosed("sink closed".to_string()));
        }
        self.written.lock().push(message);
        Ok(())
    }

    async fn close(&mut self, code: u16) -> Result<()> {
        *self.close_code.lock() = Some(code);
        if self.close_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

struct MockSource {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    done: bool,
}

#[async_trait]
impl TransportSource for MockSource {
    async fn recv(&mut self) -> Option<Result<WsMessage>> {
        if self.done {
            return None;
        }
        match self.inbound.recv().await {
            Some(Inbound::Frame(message)) => Some(Ok(message)),
            Some(Inbound::Error(reason)) => Some(Err(RealtimeError::WebSocket(reason))),
            Some(Inbound::Close) | None => {
                self.done = true;
                None
            }
        }
    }
}

// ============================================================================
// Real WebSocket server
// ============================================================================

/// A simple echo WebSocket server for end-to-end tests
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    connections: Arc<AtomicUsize>,
}

impl MockWsServer {
    /// Create and start a new echo server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut accept_shutdown = shutdown_rx.clone();
        let connections = Arc::new(AtomicUsize::new(0));
        let connections_clone = connections.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                connections_clone.fetch_add(1, Ordering::SeqCst);
                                let shutdown = shutdown_rx.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = accept_shutdown.changed() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown,
            connections,
        }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, mut shutdown: watch::Receiver<bool>) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if msg.is_text() || msg.is_binary() {
                                // Echo the message back
                                if write.send(msg).await.is_err() {
                                    break;
                                }
                            } else if msg.is_close() {
                                break;
                            }
                        }
                        Some(Err(_)) | None => break,
                    }
                }
                _ = shutdown.changed() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Shutdown the server, dropping every open connection
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
