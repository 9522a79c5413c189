use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::bridge::BridgeBackend;
use crate::backend::bridge::client::{BridgeClient, HttpRegistrar};
use crate::backend::demo::DemoBridge;
use crate::backend::BridgeApi;
use crate::config::{AppConfig, BridgeConfig};
use crate::discovery::{Discoverer, DiscoveryEngine};
use crate::error::ApiResult;
use crate::pairing::PairingEngine;
use crate::registry::{BridgeRegistry, CurrentBridge};
use crate::resource::BridgeStore;
use crate::storage::{KeyValueStore, YamlFileStore};
use crate::transport::{build_http_client, policy_from_config};

/// Everything a front end needs: the bridge registry, the mirrored state of
/// the current bridge, discovery and pairing.
#[derive(Clone)]
pub struct AppState {
    conf: Arc<AppConfig>,
    http: reqwest::Client,
    registry: Arc<Mutex<BridgeRegistry>>,
    pub store: Arc<Mutex<BridgeStore>>,
    discoverer: Arc<Discoverer>,
    demo: Arc<DemoBridge>,
    backend: Arc<Mutex<Option<JoinHandle<ApiResult<()>>>>>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> ApiResult<Self> {
        let kv = YamlFileStore::load(config.huetrek.state_file.clone());
        Self::with_store(config, Box::new(kv))
    }

    pub fn with_store(config: AppConfig, kv: Box<dyn KeyValueStore>) -> ApiResult<Self> {
        let policy = policy_from_config(&config.huetrek)?;
        let http = build_http_client(policy.as_ref(), config.huetrek.request_timeout())?;

        let registry = BridgeRegistry::load(kv, config.huetrek.demo_fallback);
        let engine = DiscoveryEngine::from_config(&config.discovery, http.clone());

        Ok(Self {
            conf: Arc::new(config),
            http,
            registry: Arc::new(Mutex::new(registry)),
            store: Arc::new(Mutex::new(BridgeStore::new())),
            discoverer: Arc::new(Discoverer::new(engine)),
            demo: Arc::new(DemoBridge::new()),
            backend: Arc::new(Mutex::new(None)),
        })
    }

    #[must_use]
    pub fn config(&self) -> Arc<AppConfig> {
        self.conf.clone()
    }

    #[must_use]
    pub fn registry(&self) -> Arc<Mutex<BridgeRegistry>> {
        self.registry.clone()
    }

    #[must_use]
    pub fn discoverer(&self) -> Arc<Discoverer> {
        self.discoverer.clone()
    }

    #[must_use]
    pub fn pairing(&self) -> PairingEngine {
        PairingEngine::new(
            Arc::new(HttpRegistrar::new(self.http.clone())),
            self.conf.pairing.devicetype.clone(),
        )
    }

    /// Client for the current bridge, or `None` if no bridge is selected.
    pub async fn bridge_api(&self) -> ApiResult<Option<(String, Arc<dyn BridgeApi>)>> {
        let registry = self.registry.lock().await;
        let res: Option<(String, Arc<dyn BridgeApi>)> = match registry.current() {
            CurrentBridge::None => None,
            CurrentBridge::Demo => Some(("demo".to_string(), self.demo.clone())),
            CurrentBridge::Bridge(id) => {
                let config = registry.get(&id)?;
                let client = BridgeClient::new(config, self.http.clone())?;
                Some((config.name.clone(), Arc::new(client)))
            }
        };
        drop(registry);
        Ok(res)
    }

    /// Replace the running backend with one for the current bridge.
    ///
    /// The store is emptied first, so nothing from the previous bridge stays
    /// visible. Returns `false` if no bridge is selected.
    pub async fn activate(&self) -> ApiResult<bool> {
        let mut backend = self.backend.lock().await;
        if let Some(old) = backend.take() {
            Self::stop_backend(old).await;
        }

        self.store.lock().await.clear();

        let Some((name, api)) = self.bridge_api().await? else {
            log::info!("No bridge selected");
            return Ok(false);
        };

        log::info!("Activating bridge [{name}]");
        let svc = BridgeBackend::new(name, api, self.store.clone())
            .with_poll_interval(self.conf.sync.poll_interval());
        *backend = Some(svc.spawn().await);
        drop(backend);

        Ok(true)
    }

    pub async fn add_bridge(&self, config: BridgeConfig) -> ApiResult<()> {
        self.registry.lock().await.add(config)?;
        self.activate().await?;
        Ok(())
    }

    pub async fn switch_bridge(&self, id: &Uuid) -> ApiResult<()> {
        self.registry.lock().await.switch_current(id)?;
        self.activate().await?;
        Ok(())
    }

    pub async fn rename_bridge(&self, id: &Uuid, name: &str) -> ApiResult<()> {
        self.registry.lock().await.rename(id, name)
    }

    pub async fn remove_bridge(&self, id: &Uuid) -> ApiResult<BridgeConfig> {
        let (removed, was_current) = {
            let mut registry = self.registry.lock().await;
            let was_current = registry.current() == CurrentBridge::Bridge(*id);
            (registry.remove(id)?, was_current)
        };

        if was_current {
            self.activate().await?;
        }
        Ok(removed)
    }

    pub async fn use_demo(&self) -> ApiResult<()> {
        self.registry.lock().await.use_demo()?;
        self.activate().await?;
        Ok(())
    }

    /// Pair with the bridge at `address` (polling while the link button has
    /// not been pressed), store it and make it current.
    pub async fn pair_and_add(
        &self,
        address: &str,
        name: Option<String>,
        cancel: &CancellationToken,
    ) -> ApiResult<BridgeConfig> {
        let pairing = &self.conf.pairing;
        let credential = self
            .pairing()
            .pair_until_linked(address, pairing.poll_interval(), pairing.attempts, cancel)
            .await?;

        let name = match name {
            Some(name) => name,
            None => self.registry.lock().await.next_default_name(),
        };

        let config = BridgeConfig::new(name, address, credential);
        self.add_bridge(config.clone()).await?;
        Ok(config)
    }

    pub async fn shutdown(&self) {
        self.discoverer.abort().await;
        let backend = self.backend.lock().await.take();
        if let Some(backend) = backend {
            Self::stop_backend(backend).await;
        }
    }

    /// Abort a backend task and wait until it can no longer touch the store.
    async fn stop_backend(task: JoinHandle<ApiResult<()>>) {
        task.abort();
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => log::warn!("Bridge backend stopped with error: {err}"),
            Err(err) if err.is_cancelled() => {}
            Err(err) => log::error!("Bridge backend panicked: {err}"),
        }
    }
}
