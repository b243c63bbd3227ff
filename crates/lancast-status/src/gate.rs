//! Outbound throttle and change-detection gate
//!
//! The gate is a rate/change filter, not a queue: a suppressed document is
//! dropped. It holds the last flat document that actually went out and a
//! monotonic timestamp of that send.

use crate::flatten::FlatStatus;
use std::time::{Duration, Instant};
use tracing::trace;

/// Minimum interval between two status broadcasts.
pub const MIN_SEND_INTERVAL: Duration = Duration::from_millis(150);

/// Decides whether a flattened status document should be broadcast.
///
/// Two independent suppression rules apply unless the caller forces the
/// send: the document is identical to the last one sent, or the last send
/// happened less than the minimum interval ago. Before the first send both
/// timers and snapshots are unset, so the first document always passes.
#[derive(Debug)]
pub struct ThrottleGate {
    last_flat: Option<FlatStatus>,
    last_send: Option<Instant>,
    min_interval: Duration,
}

impl ThrottleGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_flat: None,
            last_send: None,
            min_interval,
        }
    }

    /// Admits or suppresses a flat document.
    ///
    /// Returns the document when it should be broadcast, after recording it
    /// as the new last-sent snapshot and restarting the send timer. Returns
    /// `None` when suppressed; the gate state is untouched in that case.
    pub fn admit(&mut self, flat: FlatStatus, force: bool) -> Option<FlatStatus> {
        if !force {
            if self.last_flat.as_ref() == Some(&flat) {
                trace!("status broadcast suppressed: unchanged");
                return None;
            }
            if let Some(sent) = self.last_send {
                if sent.elapsed() < self.min_interval {
                    trace!(
                        elapsed_ms = sent.elapsed().as_millis() as u64,
                        "status broadcast suppressed: too soon"
                    );
                    return None;
                }
            }
        }

        self.last_send = Some(Instant::now());
        self.last_flat = Some(flat.clone());
        Some(flat)
    }

    /// The last document that passed the gate, if any.
    pub fn last_sent(&self) -> Option<&FlatStatus> {
        self.last_flat.as_ref()
    }
}

impl Default for ThrottleGate {
    fn default() -> Self {
        Self::new(MIN_SEND_INTERVAL)
    }
}
