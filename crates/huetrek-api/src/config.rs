use std::net::SocketAddrV4;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// A paired bridge, as stored in the bridge registry.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct BridgeConfig {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub credential: String,
}

impl BridgeConfig {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: address.into(),
            credential: credential.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct HueTrekConfig {
    pub state_file: Utf8PathBuf,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub demo_fallback: bool,
    #[serde(default)]
    pub pinned_certificates: Vec<Utf8PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct DiscoveryConfig {
    pub cloud_url: Url,
    pub ssdp_target: SocketAddrV4,
    pub ssdp_timeout_secs: u64,
    #[serde(default)]
    pub mdns: bool,
    pub mdns_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct PairingConfig {
    pub devicetype: String,
    pub poll_interval_secs: u64,
    pub attempts: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct SyncConfig {
    /// Zero turns periodic refetching off
    pub poll_interval_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub huetrek: HueTrekConfig,
    pub discovery: DiscoveryConfig,
    pub pairing: PairingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl HueTrekConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DiscoveryConfig {
    #[must_use]
    pub const fn ssdp_timeout(&self) -> Duration {
        Duration::from_secs(self.ssdp_timeout_secs)
    }

    #[must_use]
    pub const fn mdns_timeout(&self) -> Duration {
        Duration::from_secs(self.mdns_timeout_secs)
    }
}

impl PairingConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Option<Duration> {
        match self.poll_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
