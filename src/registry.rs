use std::fmt::{self, Display};

use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::error::{ApiError, ApiResult};
use crate::storage::KeyValueStore;

pub const KEY_BRIDGE_CONFIGURATIONS: &str = "bridgeConfigurations";
pub const KEY_CURRENT_BRIDGE: &str = "currentBridgeId";

/// Stored in place of a bridge id while the offline demo bridge is selected.
pub const DEMO_BRIDGE_ID: &str = "demo";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurrentBridge {
    None,
    Bridge(Uuid),
    Demo,
}

impl Display for CurrentBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Bridge(id) => write!(f, "{id}"),
            Self::Demo => write!(f, "{DEMO_BRIDGE_ID}"),
        }
    }
}

/// The set of paired bridges, and which one is in use.
///
/// Every mutation is written through to the backing [`KeyValueStore`]
/// before returning.
pub struct BridgeRegistry {
    store: Box<dyn KeyValueStore>,
    configs: Vec<BridgeConfig>,
    current: CurrentBridge,
}

impl BridgeRegistry {
    pub fn load(store: Box<dyn KeyValueStore>, demo_fallback: bool) -> Self {
        let configs = match store.get(KEY_BRIDGE_CONFIGURATIONS) {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|err| {
                log::warn!("Failed to parse stored bridge configurations: {err}");
                vec![]
            }),
            None => vec![],
        };

        let mut res = Self {
            store,
            configs,
            current: CurrentBridge::None,
        };

        let stored = res.store.get(KEY_CURRENT_BRIDGE);
        res.current = match stored.as_deref() {
            Some(DEMO_BRIDGE_ID) => CurrentBridge::Demo,
            Some(text) => match Uuid::parse_str(text) {
                Ok(id) if res.position(&id).is_some() => CurrentBridge::Bridge(id),
                _ => {
                    log::warn!("Stored current bridge {text:?} is not known");
                    CurrentBridge::None
                }
            },
            None => CurrentBridge::None,
        };

        if res.current == CurrentBridge::None && demo_fallback {
            log::info!("No usable bridge configured, falling back to demo bridge");
            res.current = CurrentBridge::Demo;
        }

        log::debug!(
            "Loaded {} bridge configurations, current: {}",
            res.configs.len(),
            res.current
        );

        res
    }

    #[must_use]
    pub fn configs(&self) -> &[BridgeConfig] {
        &self.configs
    }

    #[must_use]
    pub const fn current(&self) -> CurrentBridge {
        self.current
    }

    #[must_use]
    pub fn current_config(&self) -> Option<&BridgeConfig> {
        match self.current {
            CurrentBridge::Bridge(id) => self.configs.iter().find(|c| c.id == id),
            CurrentBridge::None | CurrentBridge::Demo => None,
        }
    }

    pub fn get(&self, id: &Uuid) -> ApiResult<&BridgeConfig> {
        self.configs
            .iter()
            .find(|c| c.id == *id)
            .ok_or(ApiError::UnknownBridge(*id))
    }

    /// Look up a bridge by id, id prefix or exact name.
    pub fn find(&self, key: &str) -> ApiResult<&BridgeConfig> {
        let key = key.trim();
        self.configs
            .iter()
            .find(|c| c.id.to_string() == key || c.name == key)
            .or_else(|| {
                let mut matches = self
                    .configs
                    .iter()
                    .filter(|c| !key.is_empty() && c.id.to_string().starts_with(key));
                match (matches.next(), matches.next()) {
                    (Some(config), None) => Some(config),
                    _ => None,
                }
            })
            .ok_or_else(|| ApiError::BridgeNotFound(key.to_string()))
    }

    /// Name given to the next bridge added through pairing.
    #[must_use]
    pub fn next_default_name(&self) -> String {
        format!("Bridge {}", self.configs.len() + 1)
    }

    /// Add a bridge and make it current. A config with an id that is already
    /// known replaces the existing entry.
    pub fn add(&mut self, config: BridgeConfig) -> ApiResult<()> {
        let id = config.id;
        if let Some(pos) = self.position(&id) {
            self.configs[pos] = config;
        } else {
            self.configs.push(config);
        }
        self.current = CurrentBridge::Bridge(id);
        self.persist()
    }

    pub fn rename(&mut self, id: &Uuid, name: &str) -> ApiResult<()> {
        let pos = self.position(id).ok_or(ApiError::UnknownBridge(*id))?;
        self.configs[pos].name = name.to_string();
        self.persist()
    }

    pub fn remove(&mut self, id: &Uuid) -> ApiResult<BridgeConfig> {
        let pos = self.position(id).ok_or(ApiError::UnknownBridge(*id))?;
        let removed = self.configs.remove(pos);

        if self.current == CurrentBridge::Bridge(*id) {
            self.current = self
                .configs
                .first()
                .map_or(CurrentBridge::None, |c| CurrentBridge::Bridge(c.id));
        }

        self.persist()?;
        Ok(removed)
    }

    pub fn switch_current(&mut self, id: &Uuid) -> ApiResult<()> {
        self.position(id).ok_or(ApiError::UnknownBridge(*id))?;
        self.current = CurrentBridge::Bridge(*id);
        self.persist()
    }

    pub fn use_demo(&mut self) -> ApiResult<()> {
        self.current = CurrentBridge::Demo;
        self.persist()
    }

    fn position(&self, id: &Uuid) -> Option<usize> {
        self.configs.iter().position(|c| c.id == *id)
    }

    fn persist(&mut self) -> ApiResult<()> {
        let json = serde_json::to_string(&self.configs)?;
        self.store.set(KEY_BRIDGE_CONFIGURATIONS, json)?;
        match self.current {
            CurrentBridge::None => self.store.remove(KEY_CURRENT_BRIDGE),
            current => self.store.set(KEY_CURRENT_BRIDGE, current.to_string()),
        }
    }
}
