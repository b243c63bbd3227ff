//! Broadcast hub: listener, connection registry, and fan-out
//!
//! One dedicated tokio task (the hub loop) owns the connection registry
//! and the throttle gate. Every public entry point posts a command onto
//! the loop's queue instead of touching that state directly, so all
//! registry mutation, socket fan-out, and gate transitions happen on a
//! single logical timeline regardless of the calling context. Commands
//! are processed strictly in arrival order.

use crate::connection::{
    keepalive_probe, read_frames, write_frames, ClientConnection, OutboundFrame,
};
use crate::events::HubEvent;
use futures::StreamExt;
use lancast_status::{flatten, ThrottleGate};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Default port for the client-facing listener
pub const DEFAULT_LISTEN_PORT: u16 = 8090;

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Interval between keepalive pings per connection
    pub keepalive_interval: Duration,
    /// Minimum interval between status broadcasts
    pub min_send_interval: Duration,
    /// Capacity of each connection's outbound frame queue
    pub outbound_capacity: usize,
    /// Capacity of the upward event channel
    pub event_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(15),
            min_send_interval: lancast_status::gate::MIN_SEND_INTERVAL,
            outbound_capacity: 64,
            event_capacity: 256,
        }
    }
}

/// Commands marshaled onto the hub loop.
///
/// Public entry points and the per-connection I/O tasks both funnel
/// through this queue; it is the only way hub state is ever touched.
pub(crate) enum HubCommand {
    StartListening {
        port: u16,
        reply: oneshot::Sender<bool>,
    },
    StopListening {
        reply: oneshot::Sender<()>,
    },
    BroadcastText {
        text: String,
    },
    SubmitStatus {
        status: Value,
        force: bool,
    },
    Register {
        socket: WebSocketStream<TcpStream>,
        remote_addr: SocketAddr,
    },
    Inbound {
        id: Uuid,
        text: String,
    },
    Disconnected {
        id: Uuid,
        code: Option<u16>,
        reason: Option<String>,
    },
    Shutdown,
}

/// State readable from any context without going through the loop.
struct HubShared {
    connections: AtomicUsize,
    listening: AtomicBool,
    port: AtomicU16,
}

/// Client-facing broadcast hub.
///
/// Accepts WebSocket connections, tracks them in a registry, and fans
/// text frames out to every open connection. The throttled status
/// pipeline ([`submit_status`](Self::submit_status)) flattens nested
/// status documents and suppresses unchanged or too-frequent sends before
/// broadcasting.
///
/// Must be created inside a tokio runtime. Dropping the hub shuts the
/// loop down; [`shutdown`](Self::shutdown) does so gracefully.
pub struct BroadcastHub {
    commands: flume::Sender<HubCommand>,
    events: async_channel::Receiver<HubEvent>,
    shared: Arc<HubShared>,
    loop_task: JoinHandle<()>,
}

impl BroadcastHub {
    /// Creates a hub with default configuration and spawns its loop.
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Creates a hub with the given configuration and spawns its loop.
    pub fn with_config(config: HubConfig) -> Self {
        let (commands, command_rx) = flume::unbounded();
        let (event_tx, events) = async_channel::bounded(config.event_capacity);
        let shared = Arc::new(HubShared {
            connections: AtomicUsize::new(0),
            listening: AtomicBool::new(false),
            port: AtomicU16::new(0),
        });

        let hub_loop = HubLoop {
            registry: HashMap::new(),
            gate: ThrottleGate::new(config.min_send_interval),
            accept_task: None,
            commands: commands.clone(),
            events: event_tx,
            shared: Arc::clone(&shared),
            config,
        };
        let loop_task = tokio::spawn(hub_loop.run(command_rx));

        Self {
            commands,
            events,
            shared,
            loop_task,
        }
    }

    /// Binds and starts accepting on `0.0.0.0:port`.
    ///
    /// Returns false when the port cannot be bound; the hub stays in its
    /// pre-call state. Calling while already listening returns true
    /// without re-binding.
    pub async fn start_listening(&self, port: u16) -> bool {
        let (reply, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(HubCommand::StartListening { port, reply })
            .is_err()
        {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Closes every connection, clears the registry, and drops the
    /// listener.
    pub async fn stop_listening(&self) {
        let (reply, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(HubCommand::StopListening { reply })
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    /// Sends the text to every open connection.
    ///
    /// Safe to call from any context: the call is queued onto the hub
    /// loop and never executed inline, so fan-out is never interleaved
    /// with registry mutation. Ordering across successive calls is
    /// preserved.
    pub fn broadcast_text(&self, text: impl Into<String>) {
        let _ = self.commands.send(HubCommand::BroadcastText { text: text.into() });
    }

    /// Serializes the document to compact JSON and broadcasts it.
    pub fn broadcast_json(&self, document: &Value) {
        match serde_json::to_string(document) {
            Ok(text) => self.broadcast_text(text),
            Err(e) => error!(error = %e, "Failed to serialize broadcast document"),
        }
    }

    /// Submits a nested status document to the throttled broadcast
    /// pipeline.
    ///
    /// The document is moved into the hub loop (callers keep their own
    /// copy by cloning), flattened there, and broadcast unless the gate
    /// suppresses it. `force` bypasses both change detection and the
    /// minimum send interval.
    pub fn submit_status(&self, status: Value, force: bool) {
        let _ = self.commands.send(HubCommand::SubmitStatus { status, force });
    }

    /// Number of currently open connections.
    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::Relaxed)
    }

    /// Whether the listener is currently accepting connections.
    pub fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::Relaxed)
    }

    /// Bound port, or 0 when not listening.
    pub fn listening_port(&self) -> u16 {
        self.shared.port.load(Ordering::Relaxed)
    }

    /// Returns a receiver for hub events.
    ///
    /// Multiple receivers compete for events; clone per consumer only
    /// when each event should go to exactly one of them.
    pub fn event_receiver(&self) -> async_channel::Receiver<HubEvent> {
        self.events.clone()
    }

    /// Gracefully stops listening and ends the hub loop.
    pub async fn shutdown(mut self) {
        self.stop_listening().await;
        let _ = self.commands.send(HubCommand::Shutdown);
        let _ = (&mut self.loop_task).await;
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BroadcastHub {
    fn drop(&mut self) {
        let _ = self.commands.send(HubCommand::Shutdown);
    }
}

/// State owned exclusively by the hub loop task.
struct HubLoop {
    registry: HashMap<Uuid, ClientConnection>,
    gate: ThrottleGate,
    accept_task: Option<JoinHandle<()>>,
    /// Handed to reader tasks so they can report frames and disconnects
    commands: flume::Sender<HubCommand>,
    events: async_channel::Sender<HubEvent>,
    shared: Arc<HubShared>,
    config: HubConfig,
}

impl HubLoop {
    async fn run(mut self, command_rx: flume::Receiver<HubCommand>) {
        debug!("Hub loop started");

        while let Ok(command) = command_rx.recv_async().await {
            match command {
                HubCommand::StartListening { port, reply } => {
                    let ok = self.start_listening(port).await;
                    let _ = reply.send(ok);
                }
                HubCommand::StopListening { reply } => {
                    self.stop_listening();
                    let _ = reply.send(());
                }
                HubCommand::BroadcastText { text } => self.broadcast(&text),
                HubCommand::SubmitStatus { status, force } => {
                    self.submit_status(&status, force)
                }
                HubCommand::Register {
                    socket,
                    remote_addr,
                } => self.register(socket, remote_addr),
                HubCommand::Inbound { id, text } => {
                    trace!(connection_id = %id, len = text.len(), "Frame received");
                    self.emit(HubEvent::MessageReceived {
                        connection_id: id,
                        text,
                    });
                }
                HubCommand::Disconnected { id, code, reason } => {
                    self.remove(id, code, reason)
                }
                HubCommand::Shutdown => break,
            }
        }

        self.stop_listening();
        debug!("Hub loop stopped");
    }

    async fn start_listening(&mut self, port: u16) -> bool {
        if self.accept_task.is_some() {
            info!(
                port = self.shared.port.load(Ordering::Relaxed),
                "Already listening"
            );
            return true;
        }

        let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match TcpListener::bind(bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!(port = port, error = %e, "Listen failed");
                return false;
            }
        };

        let commands = self.commands.clone();
        self.accept_task = Some(tokio::spawn(accept_loop(listener, commands)));
        self.shared.listening.store(true, Ordering::Relaxed);
        self.shared.port.store(port, Ordering::Relaxed);

        info!(addr = %bind_addr, "Listening for client connections");
        true
    }

    fn stop_listening(&mut self) {
        let had_clients = !self.registry.is_empty();

        for (_, connection) in self.registry.drain() {
            connection.shut_down();
        }
        self.shared.connections.store(0, Ordering::Relaxed);
        if had_clients {
            self.emit(HubEvent::ConnectionCountChanged { count: 0 });
        }

        if let Some(task) = self.accept_task.take() {
            // aborting the accept loop drops the listener with it
            task.abort();
            self.shared.listening.store(false, Ordering::Relaxed);
            self.shared.port.store(0, Ordering::Relaxed);
            info!("Listener stopped");
        }
    }

    fn register(&mut self, socket: WebSocketStream<TcpStream>, remote_addr: SocketAddr) {
        let id = Uuid::new_v4();
        let (outbound, outbound_rx) = flume::bounded(self.config.outbound_capacity);
        let (sink, stream) = socket.split();

        tokio::spawn(write_frames(sink, outbound_rx, id));
        let reader_task = tokio::spawn(read_frames(stream, id, self.commands.clone()));
        let keepalive_task = tokio::spawn(keepalive_probe(
            outbound.clone(),
            id,
            self.config.keepalive_interval,
        ));

        self.registry.insert(
            id,
            ClientConnection {
                id,
                remote_addr: remote_addr.to_string(),
                outbound,
                reader_task,
                keepalive_task,
            },
        );

        let count = self.registry.len();
        self.shared.connections.store(count, Ordering::Relaxed);
        self.emit(HubEvent::ConnectionCountChanged { count });

        info!(
            connection_id = %id,
            remote_addr = %remote_addr,
            total = count,
            "Client connected"
        );
    }

    fn remove(&mut self, id: Uuid, code: Option<u16>, reason: Option<String>) {
        // stop_listening may have drained the entry already
        let Some(connection) = self.registry.remove(&id) else {
            return;
        };

        info!(
            connection_id = %id,
            remote_addr = %connection.remote_addr,
            code = ?code,
            reason = ?reason,
            "Client disconnected"
        );

        connection.keepalive_task.abort();
        // dropping the entry closes the outbound queue; the writer drains
        // what is left and ends
        drop(connection);

        let count = self.registry.len();
        self.shared.connections.store(count, Ordering::Relaxed);
        self.emit(HubEvent::ConnectionCountChanged { count });
    }

    fn broadcast(&self, text: &str) {
        for connection in self.registry.values() {
            if let Err(e) = connection
                .outbound
                .try_send(OutboundFrame::Text(text.to_owned()))
            {
                debug!(
                    connection_id = %connection.id,
                    error = %e,
                    "Dropping frame for slow or closed connection"
                );
            }
        }
        trace!(
            len = text.len(),
            clients = self.registry.len(),
            "Broadcast queued"
        );
    }

    fn submit_status(&mut self, status: &Value, force: bool) {
        let flat = flatten(status);
        let Some(flat) = self.gate.admit(flat, force) else {
            return;
        };

        match serde_json::to_string(&Value::Object(flat)) {
            Ok(text) => {
                debug!(payload = %text, "Flat status broadcast");
                self.broadcast(&text);
            }
            Err(e) => error!(error = %e, "Failed to serialize flat status"),
        }
    }

    fn emit(&self, event: HubEvent) {
        if let Err(e) = self.events.try_send(event) {
            debug!(error = %e, "Hub event dropped");
        }
    }
}

/// Accepts sockets and hands them to the hub loop after the WebSocket
/// handshake. The handshake runs off the accept loop so a slow client
/// cannot stall new connections.
async fn accept_loop(listener: TcpListener, commands: flume::Sender<HubCommand>) {
    loop {
        match listener.accept().await {
            Ok((stream, remote_addr)) => {
                let commands = commands.clone();
                tokio::spawn(async move {
                    match tokio_tungstenite::accept_async(stream).await {
                        Ok(socket) => {
                            let _ = commands.send(HubCommand::Register {
                                socket,
                                remote_addr,
                            });
                        }
                        Err(e) => {
                            warn!(remote_addr = %remote_addr, error = %e, "Handshake failed")
                        }
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "Accept error");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listen_reports_port_and_state() {
        let hub = BroadcastHub::new();
        assert!(!hub.is_listening());
        assert_eq!(hub.listening_port(), 0);

        assert!(hub.start_listening(18071).await);
        assert!(hub.is_listening());
        assert_eq!(hub.listening_port(), 18071);

        hub.shutdown().await;
    }

    #[tokio::test]
    async fn listen_is_idempotent() {
        let hub = BroadcastHub::new();
        assert!(hub.start_listening(18072).await);
        assert!(hub.start_listening(18072).await);
        assert_eq!(hub.listening_port(), 18072);
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn occupied_port_fails_cleanly() {
        let blocker = TcpListener::bind("0.0.0.0:18073").await.unwrap();

        let hub = BroadcastHub::new();
        assert!(!hub.start_listening(18073).await);
        assert!(!hub.is_listening());
        assert_eq!(hub.listening_port(), 0);

        drop(blocker);
        // the failed attempt left no partial listener behind
        assert!(hub.start_listening(18073).await);
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn stop_listening_resets_state() {
        let hub = BroadcastHub::new();
        assert!(hub.start_listening(18074).await);
        hub.stop_listening().await;
        assert!(!hub.is_listening());
        assert_eq!(hub.listening_port(), 0);
        assert_eq!(hub.connection_count(), 0);
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn broadcast_without_clients_is_harmless() {
        let hub = BroadcastHub::new();
        hub.broadcast_text("nobody is listening");
        hub.broadcast_json(&serde_json::json!({"ping": 1}));
        hub.submit_status(serde_json::json!({"isOnline": true}), false);
        assert_eq!(hub.connection_count(), 0);
        hub.shutdown().await;
    }
}
