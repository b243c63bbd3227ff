//! Status flattening and outbound throttling for the lancast hub
//!
//! This crate holds the two stateless-or-small pieces of the broadcast
//! pipeline:
//!
//! - [`flatten`] turns a nested status document into a single-level
//!   key/value document with deterministic key naming. It is a pure
//!   function and safe to call from any context.
//! - [`ThrottleGate`] decides whether a flattened document is worth
//!   sending at all, combining change detection with a minimum
//!   inter-send interval. Suppressed documents are dropped, never queued.
//!
//! Neither piece performs any I/O; the hub owns the gate and drives both.

pub mod flatten;
pub mod gate;

pub use flatten::{flatten, FlatStatus};
pub use gate::ThrottleGate;
