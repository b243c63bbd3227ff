//! Types for the advertised service record

use crate::error::{AdvertiseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters describing a service announcement.
///
/// Cached by the advertiser on every successful `start` so a later
/// `republish` can rebuild the record without the caller resupplying them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceParams {
    /// Service type label, e.g. `_lancast._tcp.local.`
    pub service_type: String,

    /// Instance name as shown to browsers on the network
    pub instance_name: String,

    /// Port the advertised service listens on
    pub port: u16,

    /// TXT attributes, ordered by key
    pub attributes: BTreeMap<String, String>,
}

impl ServiceParams {
    /// Validates the parameters required to publish.
    ///
    /// A zero port or empty identifiers refuse the transition to
    /// `Published`; nothing is announced with invalid parameters.
    pub fn validate(&self) -> Result<()> {
        if self.service_type.is_empty() {
            return Err(AdvertiseError::InvalidParams(
                "service type must not be empty".into(),
            ));
        }
        if self.instance_name.is_empty() {
            return Err(AdvertiseError::InvalidParams(
                "instance name must not be empty".into(),
            ));
        }
        if self.port == 0 {
            return Err(AdvertiseError::InvalidParams("port must not be 0".into()));
        }
        Ok(())
    }
}

/// The currently published service record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvertisedService {
    /// Service type label
    pub service_type: String,

    /// Instance name
    pub instance_name: String,

    /// Advertised port
    pub port: u16,

    /// TXT attributes, ordered by key
    pub attributes: BTreeMap<String, String>,

    /// When this record was (last) announced
    pub published_at: DateTime<Utc>,
}

impl AdvertisedService {
    /// Builds a record from parameters, stamping the announcement time.
    pub fn from_params(params: &ServiceParams) -> Self {
        Self {
            service_type: params.service_type.clone(),
            instance_name: params.instance_name.clone(),
            port: params.port,
            attributes: params.attributes.clone(),
            published_at: Utc::now(),
        }
    }

    /// Full service name as registered with the discovery layer,
    /// `<instance>.<type>`.
    pub fn fullname(&self) -> String {
        format!("{}.{}", self.instance_name, self.service_type)
    }
}

/// Lifecycle state of the advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// No record is currently announced
    Unpublished,

    /// A record is announced on the network
    Published,
}
