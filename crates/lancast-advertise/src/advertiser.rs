//! Advertisement lifecycle management

use crate::backend::{DiscoveryBackend, MdnsBackend};
use crate::error::Result;
use crate::types::{AdvertisedService, LifecycleState, ServiceParams};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Owns the lifecycle of a single advertised service record.
///
/// The advertiser separates two lifetimes: the backend handle (expensive,
/// torn down rarely) and the published record (cheap, dropped on every
/// `stop`). Stopping withdraws the record but keeps the backend alive so a
/// subsequent `start` or `republish` does not pay the bring-up cost again.
///
/// All operations must be driven from a single context; the advertiser
/// performs no cross-context marshaling of its own and never touches
/// connection state.
pub struct ServiceAdvertiser<B: DiscoveryBackend = MdnsBackend> {
    backend: Option<B>,
    record: Option<AdvertisedService>,
    cached: Option<ServiceParams>,
    state: LifecycleState,
}

impl ServiceAdvertiser {
    /// Creates an advertiser over the system mDNS daemon, in the
    /// `Unpublished` state.
    ///
    /// The daemon is brought up lazily on the first `start`, so creation
    /// itself cannot fail.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: DiscoveryBackend> ServiceAdvertiser<B> {
    /// Announces the service, or updates the announcement in place.
    ///
    /// Safe to call repeatedly: a second call with new attributes or port
    /// updates the existing record without flapping the announcement. The
    /// parameters are cached for later [`republish`](Self::republish).
    ///
    /// # Errors
    ///
    /// Returns an error when the parameters fail validation or the backend
    /// cannot be brought up; the lifecycle state is unchanged in both
    /// cases. Failures of the announcement call itself are diagnostic-only.
    pub fn start(
        &mut self,
        service_type: &str,
        instance_name: &str,
        port: u16,
        attributes: BTreeMap<String, String>,
    ) -> Result<()> {
        let params = ServiceParams {
            service_type: service_type.to_string(),
            instance_name: instance_name.to_string(),
            port,
            attributes,
        };
        params.validate()?;

        // Make sure the backend exists; it may have been torn down.
        if self.backend.is_none() {
            self.backend = Some(B::connect()?);
        }

        let record = AdvertisedService::from_params(&params);
        self.cached = Some(params);

        self.announce(&record, "Published");
        self.record = Some(record);
        self.state = LifecycleState::Published;
        Ok(())
    }

    /// Withdraws the current record and clears the cached parameters.
    ///
    /// The backend is intentionally retained so a later `start` or
    /// `republish` is cheap; only the published record is dropped.
    pub fn stop(&mut self) {
        if let (Some(backend), Some(record)) = (&self.backend, &self.record) {
            match backend.withdraw(&record.fullname()) {
                Ok(()) => info!(
                    service_type = %record.service_type,
                    instance = %record.instance_name,
                    "Unpublished service"
                ),
                Err(e) => warn!(
                    instance = %record.instance_name,
                    error = %e,
                    "Failed to withdraw service record"
                ),
            }
        }

        self.record = None;
        self.cached = None;
        self.state = LifecycleState::Unpublished;
        info!("Advertiser stopped");
    }

    /// Re-announces without caller-supplied parameters.
    ///
    /// Prefers a light update of the current record. When the record was
    /// invalidated but parameters are still cached, the record is rebuilt
    /// from the cache and announced again. With neither, this is a no-op
    /// reported as a warning.
    pub fn republish(&mut self) {
        if let (Some(backend), Some(record)) = (&self.backend, &self.record) {
            match backend.advertise(record) {
                Ok(()) => info!(
                    service_type = %record.service_type,
                    instance = %record.instance_name,
                    "Re-announced service"
                ),
                Err(e) => warn!(
                    instance = %record.instance_name,
                    error = %e,
                    "Failed to re-announce service"
                ),
            }
            return;
        }

        let Some(params) = self.cached.clone() else {
            warn!("Republish skipped; no cached parameters");
            return;
        };

        if self.backend.is_none() {
            match B::connect() {
                Ok(backend) => self.backend = Some(backend),
                Err(e) => {
                    warn!(error = %e, "Republish skipped; backend unavailable");
                    return;
                }
            }
        }

        let record = AdvertisedService::from_params(&params);
        self.announce(&record, "Rebuilt and announced");
        self.record = Some(record);
        self.state = LifecycleState::Published;
    }

    /// Whether a record is currently announced.
    pub fn is_published(&self) -> bool {
        self.state == LifecycleState::Published
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The currently published record, if any.
    pub fn current(&self) -> Option<&AdvertisedService> {
        self.record.as_ref()
    }

    /// Issues the advertise-or-update call; failures are diagnostic-only.
    fn announce(&self, record: &AdvertisedService, verb: &str) {
        let Some(backend) = &self.backend else { return };
        match backend.advertise(record) {
            Ok(()) => info!(
                service_type = %record.service_type,
                instance = %record.instance_name,
                port = record.port,
                "{verb} service"
            ),
            Err(e) => warn!(
                instance = %record.instance_name,
                error = %e,
                "Failed to announce service"
            ),
        }
    }
}

impl<B: DiscoveryBackend> Default for ServiceAdvertiser<B> {
    fn default() -> Self {
        Self {
            backend: None,
            record: None,
            cached: None,
            state: LifecycleState::Unpublished,
        }
    }
}
