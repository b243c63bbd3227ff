//! Real-time broadcast hub for local-network status consumers
//!
//! The hub accepts WebSocket connections on a configurable port and fans
//! text frames out to every open connection. All connection-registry
//! mutation and socket fan-out happen on a single owning task; public
//! entry points marshal their arguments onto that task over a command
//! queue, so they are safe to call from any context.
//!
//! # Architecture
//!
//! ```text
//!   producer threads          clients
//!        │                       │
//!  broadcast_text /        TCP accept + WS
//!  submit_status            handshake
//!        │                       │
//!        ▼                       ▼
//!  ┌──────────────── command queue ───────────────┐
//!  │                 hub loop task                │
//!  │  registry (per-connection outbound queues)   │
//!  │  throttle gate (dedupe + min interval)       │
//!  └───────┬──────────────┬───────────────┬───────┘
//!          ▼              ▼               ▼
//!     writer task    writer task     writer task   → one per client
//! ```
//!
//! Status documents submitted via `submit_status` are flattened and run
//! through the throttle gate before being broadcast as compact JSON.

mod connection;
pub mod events;
pub mod hub;

pub use events::HubEvent;
pub use hub::{BroadcastHub, HubConfig, DEFAULT_LISTEN_PORT};
