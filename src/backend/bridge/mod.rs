mod backend_event;
pub mod client;
pub mod import;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use hue::legacy_api::ApiResourceType;
use huetrek_api::backend::BackendRequest;

use crate::backend::BridgeApi;
use crate::error::ApiResult;
use crate::resource::BridgeStore;

/// Keeps a [`BridgeStore`] in sync with one bridge.
///
/// The backend is the only consumer of the store's request queue. It fetches
/// everything on start, then serves queued requests and periodic refreshes
/// until the queue closes or the task is aborted.
pub struct BridgeBackend {
    name: String,
    api: Arc<dyn BridgeApi>,
    state: Arc<Mutex<BridgeStore>>,
    poll_interval: Option<Duration>,
}

impl BridgeBackend {
    pub fn new(
        name: impl Into<String>,
        api: Arc<dyn BridgeApi>,
        state: Arc<Mutex<BridgeStore>>,
    ) -> Self {
        Self {
            name: name.into(),
            api,
            state,
            poll_interval: None,
        }
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Option<Duration>) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Fetch one resource type and swap it into the store in a single step.
    pub async fn fetch(&self, rtype: ApiResourceType) -> ApiResult<()> {
        let value = self.api.get_resource(rtype).await?;

        match rtype {
            ApiResourceType::Lights => {
                let lights = import::import_lights(value)?;
                self.state.lock().await.replace_lights(lights);
            }
            ApiResourceType::Groups => {
                let groups = import::import_groups(value)?;
                self.state.lock().await.replace_groups(groups);
            }
            ApiResourceType::Sensors => {
                let sensors = import::import_sensors(value)?;
                self.state.lock().await.replace_sensors(sensors);
            }
        }

        Ok(())
    }

    async fn fetch_reporting(&self, rtype: ApiResourceType, retry: BackendRequest) -> bool {
        match self.fetch(rtype).await {
            Ok(()) => true,
            Err(err) => {
                log::error!("[{}] Failed to fetch {rtype}: {err}", self.name);
                self.state.lock().await.report_error(&err, retry);
                false
            }
        }
    }

    /// Fetch all resource types concurrently.
    pub async fn run_sync(&self, reason: &str) -> bool {
        log::info!("[{}] Sync requested: {reason}", self.name);

        let (lights, groups, sensors) = tokio::join!(
            self.fetch_reporting(ApiResourceType::Lights, BackendRequest::FetchAll),
            self.fetch_reporting(ApiResourceType::Groups, BackendRequest::FetchAll),
            self.fetch_reporting(ApiResourceType::Sensors, BackendRequest::FetchAll),
        );

        let ok = lights && groups && sensors;
        if ok {
            log::debug!("[{}] Sync completed", self.name);
        }
        ok
    }

    pub async fn event_loop(&self, chan: &mut Receiver<Arc<BackendRequest>>) -> ApiResult<()> {
        self.run_sync("startup").await;

        let Some(period) = self.poll_interval else {
            loop {
                match chan.recv().await {
                    Ok(req) => self.handle_backend_event(req).await,
                    Err(RecvError::Lagged(n)) => self.lagged(n).await,
                    Err(RecvError::Closed) => return Ok(()),
                }
            }
        };

        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately, and startup already synced
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.run_sync("periodic").await;
                }
                req = chan.recv() => match req {
                    Ok(req) => self.handle_backend_event(req).await,
                    Err(RecvError::Lagged(n)) => self.lagged(n).await,
                    Err(RecvError::Closed) => return Ok(()),
                }
            }
        }
    }

    async fn lagged(&self, n: u64) {
        log::warn!("[{}] Dropped {n} queued requests, resyncing", self.name);
        self.run_sync("lagged").await;
    }

    /// Subscribe to the request queue and run the event loop on a new task.
    pub async fn spawn(self) -> JoinHandle<ApiResult<()>> {
        let mut chan = self.state.lock().await.backend_event_stream();
        tokio::spawn(async move { self.event_loop(&mut chan).await })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tokio::sync::Mutex;

    use hue::legacy_api::{ApiLightStateUpdate, ApiResourceType, ApiUpdateReply};
    use huetrek_api::backend::BackendRequest;

    use crate::backend::BridgeApi;
    use crate::backend::bridge::BridgeBackend;
    use crate::error::{ApiError, ApiResult};
    use crate::model::Light;
    use crate::resource::{BridgeStore, StoreEvent};

    /// Serves fixed collections; fails every request while `fail` is set
    struct FixedBridge {
        fail: bool,
    }

    #[async_trait]
    impl BridgeApi for FixedBridge {
        async fn get_resource(&self, rtype: ApiResourceType) -> ApiResult<Value> {
            if self.fail {
                return Err(ApiError::NoData);
            }
            Ok(match rtype {
                ApiResourceType::Lights => json!({
                    "1": {"name": "Zeta", "state": {"on": true, "reachable": true}},
                    "2": {"name": "Alpha", "state": {"on": false, "reachable": true}},
                }),
                ApiResourceType::Groups => json!({}),
                ApiResourceType::Sensors => json!({}),
            })
        }

        async fn put_state(
            &self,
            _rtype: ApiResourceType,
            _id: &str,
            _upd: &ApiLightStateUpdate,
        ) -> ApiResult<ApiUpdateReply> {
            Ok(vec![])
        }
    }

    fn backend(fail: bool) -> (BridgeBackend, Arc<Mutex<BridgeStore>>) {
        let store = Arc::new(Mutex::new(BridgeStore::new()));
        let api = Arc::new(FixedBridge { fail });
        (BridgeBackend::new("test", api, store.clone()), store)
    }

    #[tokio::test]
    async fn sync_fills_store() {
        let (backend, store) = backend(false);

        assert!(backend.run_sync("test").await);

        let store = store.lock().await;
        let names: Vec<_> = store.lights().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Zeta"]);
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_collection() {
        let (backend, store) = backend(true);
        store
            .lock()
            .await
            .replace_lights(vec![Light::new("1", "Old")]);

        assert!(!backend.run_sync("test").await);

        let store = store.lock().await;
        assert_eq!(store.lights().len(), 1);
        let err = store.error().unwrap();
        assert_eq!(err.message, "No data received");
        assert_eq!(err.retry, BackendRequest::FetchAll);
    }

    #[tokio::test]
    async fn queued_requests_are_served() {
        let (backend, store) = backend(false);
        let mut events = store.lock().await.subscribe();
        let handle = backend.spawn().await;

        for _ in 0..3 {
            assert!(matches!(events.recv().await.unwrap(), StoreEvent::Replaced(_)));
        }

        store
            .lock()
            .await
            .request_refresh(Some(ApiResourceType::Lights))
            .unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            StoreEvent::Replaced(ApiResourceType::Lights)
        );

        handle.abort();
    }
}
