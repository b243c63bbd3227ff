//! Per-connection state and I/O tasks
//!
//! Each accepted WebSocket gets three tasks: a writer draining the
//! connection's outbound queue into the socket, a reader forwarding inbound
//! frames to the hub loop, and a keepalive timer queueing a ping at a fixed
//! interval. The registry entry owns the queue sender and the task handles;
//! dropping the entry tears the tasks down.

use crate::hub::HubCommand;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};
use uuid::Uuid;

/// Frame queued for a single connection's writer task.
#[derive(Debug, Clone)]
pub(crate) enum OutboundFrame {
    /// UTF-8 text frame
    Text(String),
    /// Keepalive probe
    Ping,
    /// Graceful close request; the writer sends a close frame and ends
    Close,
}

/// Registry entry for one open client connection.
///
/// Owned exclusively by the hub loop; nothing outside the loop ever holds
/// one of these.
pub(crate) struct ClientConnection {
    pub id: Uuid,
    /// Peer address, kept for diagnostics only
    pub remote_addr: String,
    /// Sender side of the writer task's queue
    pub outbound: flume::Sender<OutboundFrame>,
    pub reader_task: JoinHandle<()>,
    pub keepalive_task: JoinHandle<()>,
}

impl ClientConnection {
    /// Detaches the connection's event sources and requests a graceful
    /// close. Used by the bulk teardown in `stop_listening`; the normal
    /// disconnect path needs none of this because the reader has already
    /// exited.
    pub fn shut_down(self) {
        self.reader_task.abort();
        self.keepalive_task.abort();
        let _ = self.outbound.try_send(OutboundFrame::Close);
    }
}

/// Drains the outbound queue into the socket.
///
/// Ends when the queue closes (registry entry dropped), a close was
/// requested, or a send fails; the reader observes the broken transport
/// and drives removal.
pub(crate) async fn write_frames(
    mut sink: SplitSink<WebSocketStream<TcpStream>, Message>,
    outbound: flume::Receiver<OutboundFrame>,
    id: Uuid,
) {
    while let Ok(frame) = outbound.recv_async().await {
        let message = match frame {
            OutboundFrame::Text(text) => Message::Text(text.into()),
            OutboundFrame::Ping => Message::Ping(Bytes::new()),
            OutboundFrame::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        };

        if let Err(e) = sink.send(message).await {
            debug!(connection_id = %id, error = %e, "Send failed");
            break;
        }
    }

    debug!(connection_id = %id, "Writer task ended");
}

/// Forwards inbound frames to the hub loop and reports the disconnect.
///
/// Exactly one `Disconnected` command is sent per connection, carrying the
/// close code/reason when the peer supplied them.
pub(crate) async fn read_frames(
    mut stream: SplitStream<WebSocketStream<TcpStream>>,
    id: Uuid,
    commands: flume::Sender<HubCommand>,
) {
    let mut close_code: Option<u16> = None;
    let mut close_reason: Option<String> = None;

    while let Some(next) = stream.next().await {
        match next {
            Ok(Message::Text(text)) => {
                let _ = commands.send(HubCommand::Inbound {
                    id,
                    text: text.to_string(),
                });
            }
            Ok(Message::Pong(payload)) => {
                // replies to the keepalive probe; observed but unused
                debug!(connection_id = %id, bytes = payload.len(), "Pong received");
            }
            Ok(Message::Ping(_)) => {
                // tungstenite queues the pong reply itself
            }
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    close_code = Some(frame.code.into());
                    close_reason = Some(frame.reason.to_string());
                }
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(connection_id = %id, error = %e, "Socket error");
                close_reason = Some(e.to_string());
                break;
            }
        }
    }

    let _ = commands.send(HubCommand::Disconnected {
        id,
        code: close_code,
        reason: close_reason,
    });
}

/// Queues a ping on the connection's outbound channel at a fixed interval.
///
/// Ends when the queue closes. The probe never evicts the connection;
/// transport-level disconnect detection is the only removal trigger.
pub(crate) async fn keepalive_probe(
    outbound: flume::Sender<OutboundFrame>,
    id: Uuid,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick fires immediately; the probe starts one interval in
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if outbound.try_send(OutboundFrame::Ping).is_err() {
            break;
        }
        debug!(connection_id = %id, "Keepalive ping queued");
    }
}
