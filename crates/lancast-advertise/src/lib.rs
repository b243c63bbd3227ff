//! mDNS/DNS-SD service advertisement for the lancast hub
//!
//! This crate owns the announce side of presence: publishing one service
//! record on the local network, updating it in place, withdrawing it, and
//! re-announcing it after network changes.
//!
//! The lifecycle deliberately splits two lifetimes:
//! - the discovery backend (daemon sockets and threads) is created once
//!   and kept across `stop`/`start` cycles
//! - the published record is cheap and dropped on every `stop`
//!
//! # Example
//!
//! ```no_run
//! use lancast_advertise::ServiceAdvertiser;
//! use std::collections::BTreeMap;
//!
//! fn main() -> lancast_advertise::Result<()> {
//!     let mut advertiser = ServiceAdvertiser::new();
//!     advertiser.start("_lancast._tcp.local.", "unit-1", 8090, BTreeMap::new())?;
//!
//!     // later: re-announce after a network change
//!     advertiser.republish();
//!
//!     advertiser.stop();
//!     Ok(())
//! }
//! ```

pub mod advertiser;
pub mod backend;
pub mod error;
pub mod types;

pub use advertiser::ServiceAdvertiser;
pub use backend::{DiscoveryBackend, MdnsBackend};
pub use error::{AdvertiseError, Result};
pub use types::{AdvertisedService, LifecycleState, ServiceParams};
