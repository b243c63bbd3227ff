//! Configuration for the lancast binary
//!
//! Settings come from an optional YAML file merged with `LANCAST_*`
//! environment variable overrides (e.g. `LANCAST_HUB__LISTEN_PORT=9000`).

use anyhow::{bail, Context, Result};
use lancast_hub::DEFAULT_LISTEN_PORT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Broadcast hub settings
    #[serde(default)]
    pub hub: HubSection,

    /// Service advertisement settings
    #[serde(default)]
    pub advertise: AdvertiseSection,
}

/// Hub settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSection {
    /// Port the WebSocket listener binds on
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

/// Advertisement settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvertiseSection {
    /// Announce the service via mDNS
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Service type label
    #[serde(default = "default_service_type")]
    pub service_type: String,

    /// Instance name; defaults to `lancast-<hostname>`
    #[serde(default)]
    pub instance_name: Option<String>,

    /// Advertised port; defaults to the hub listen port
    #[serde(default)]
    pub port: Option<u16>,

    /// TXT attributes
    #[serde(default)]
    pub txt: BTreeMap<String, String>,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
        }
    }
}

impl Default for AdvertiseSection {
    fn default() -> Self {
        Self {
            enabled: true,
            service_type: default_service_type(),
            instance_name: None,
            port: None,
            txt: BTreeMap::new(),
        }
    }
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

fn default_service_type() -> String {
    "_lancast._tcp.local.".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Loads configuration from an optional file, merged with environment
    /// variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LANCAST")
                .separator("__")
                .try_parsing(true),
        );

        let merged = builder.build().context("Failed to load configuration")?;
        merged
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Validates the merged configuration.
    pub fn validate(&self) -> Result<()> {
        if self.hub.listen_port == 0 {
            bail!("hub.listen_port must not be 0");
        }
        if self.advertise.enabled {
            if self.advertise.service_type.is_empty() {
                bail!("advertise.service_type must not be empty");
            }
            if self.advertise.port == Some(0) {
                bail!("advertise.port must not be 0");
            }
        }
        Ok(())
    }

    /// Instance name to advertise, defaulting to `lancast-<hostname>`.
    pub fn instance_name(&self) -> String {
        self.advertise.instance_name.clone().unwrap_or_else(|| {
            let host = hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "node".to_string());
            format!("lancast-{host}")
        })
    }

    /// Port to advertise, defaulting to the hub listen port.
    pub fn advertised_port(&self) -> u16 {
        self.advertise.port.unwrap_or(self.hub.listen_port)
    }
}
