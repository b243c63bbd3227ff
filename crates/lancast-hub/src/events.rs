//! Events the hub surfaces to its embedding application

use uuid::Uuid;

/// Event emitted by the hub for external consumers.
///
/// Delivery is best-effort: events are dropped when the channel is full
/// rather than stalling the hub loop.
#[derive(Debug, Clone)]
pub enum HubEvent {
    /// A client sent a text frame. The payload is forwarded verbatim;
    /// interpretation is the consumer's concern.
    MessageReceived {
        /// Connection the frame arrived on
        connection_id: Uuid,
        /// Raw frame text
        text: String,
    },

    /// The number of open connections changed.
    ConnectionCountChanged {
        /// New total
        count: usize,
    },
}
