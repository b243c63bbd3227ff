//! Discovery backend abstraction and the mDNS implementation
//!
//! The advertiser only needs an advertise-or-update/withdraw capability;
//! everything protocol-level (record construction, multicast I/O, conflict
//! resolution) lives behind [`DiscoveryBackend`]. The production
//! implementation wraps the `mdns-sd` service daemon.

use crate::error::{AdvertiseError, Result};
use crate::types::AdvertisedService;
use mdns_sd::{ServiceDaemon, ServiceInfo};
use std::collections::HashMap;

/// Advertise/update/withdraw capability provided by the discovery stack.
///
/// `advertise` is an upsert: announcing a record whose fullname is already
/// registered updates it in place.
pub trait DiscoveryBackend: Sized + Send {
    /// Brings up the backend (socket setup, daemon threads).
    fn connect() -> Result<Self>;

    /// Announces or updates a service record.
    fn advertise(&self, record: &AdvertisedService) -> Result<()>;

    /// Withdraws a previously announced record by its full name.
    fn withdraw(&self, fullname: &str) -> Result<()>;
}

/// mDNS/DNS-SD backend over the `mdns-sd` service daemon
pub struct MdnsBackend {
    daemon: ServiceDaemon,
}

impl DiscoveryBackend for MdnsBackend {
    fn connect() -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| AdvertiseError::BackendInit(e.to_string()))?;
        Ok(Self { daemon })
    }

    fn advertise(&self, record: &AdvertisedService) -> Result<()> {
        let host = format!("{}.local.", record.instance_name);
        let properties: HashMap<String, String> = record
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let info = ServiceInfo::new(
            &record.service_type,
            &record.instance_name,
            &host,
            "",
            record.port,
            properties,
        )
        .map_err(|e| AdvertiseError::Backend(e.to_string()))?
        .enable_addr_auto();

        self.daemon
            .register(info)
            .map_err(|e| AdvertiseError::Backend(e.to_string()))
    }

    fn withdraw(&self, fullname: &str) -> Result<()> {
        self.daemon
            .unregister(fullname)
            .map(|_status_rx| ())
            .map_err(|e| AdvertiseError::Backend(e.to_string()))
    }
}

impl Drop for MdnsBackend {
    fn drop(&mut self) {
        let _ = self.daemon.shutdown();
    }
}
