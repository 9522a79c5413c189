use std::sync::Arc;

use hue::legacy_api::{ApiLightStateUpdate, ApiResourceType};
use huetrek_api::backend::BackendRequest;

use crate::backend::bridge::BridgeBackend;

impl BridgeBackend {
    async fn backend_state_update(
        &self,
        rtype: ApiResourceType,
        id: &str,
        upd: &ApiLightStateUpdate,
        req: &BackendRequest,
    ) -> bool {
        if upd.is_empty() {
            return true;
        }

        match self.api.put_state(rtype, id, upd).await {
            Ok(reply) => {
                log::debug!("[{}] Updated {rtype}/{id}: {} fields", self.name, reply.len());
                true
            }
            Err(err) => {
                // the optimistic value stays until the next fetch says otherwise
                log::error!("[{}] Failed to update {rtype}/{id}: {err}", self.name);
                self.state.lock().await.report_error(&err, req.clone());
                false
            }
        }
    }

    pub(super) async fn handle_backend_event(&self, req: Arc<BackendRequest>) {
        let updated = match &*req {
            BackendRequest::Fetch(rtype) => {
                self.fetch_reporting(*rtype, BackendRequest::Fetch(*rtype))
                    .await;
                return;
            }
            BackendRequest::FetchAll => {
                self.run_sync("requested").await;
                return;
            }
            BackendRequest::LightUpdate(id, upd) => {
                self.backend_state_update(ApiResourceType::Lights, id, upd, &req)
                    .await
            }
            BackendRequest::GroupUpdate(id, upd) => {
                self.backend_state_update(ApiResourceType::Groups, id, upd, &req)
                    .await
            }
        };

        // reconcile with the bridge, whatever the outcome
        for rtype in req.refresh_after() {
            if updated {
                self.fetch_reporting(*rtype, BackendRequest::Fetch(*rtype))
                    .await;
            } else if let Err(err) = self.fetch(*rtype).await {
                log::debug!("[{}] Reconcile of {rtype} failed: {err}", self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tokio::sync::Mutex;

    use hue::error::HueApiV1Error;
    use hue::legacy_api::{ApiLightStateUpdate, ApiResourceType, ApiUpdateReply, HueError};
    use huetrek_api::backend::BackendRequest;

    use crate::backend::BridgeApi;
    use crate::backend::bridge::BridgeBackend;
    use crate::error::{ApiError, ApiResult};
    use crate::model::{Field, Light};
    use crate::resource::BridgeStore;

    /// Refuses every read and write
    struct RefusingBridge;

    #[async_trait]
    impl BridgeApi for RefusingBridge {
        async fn get_resource(&self, _rtype: ApiResourceType) -> ApiResult<Value> {
            Ok(json!([
                {"error": {"type": 1, "address": "/", "description": "unauthorized user"}}
            ]))
        }

        async fn put_state(
            &self,
            _rtype: ApiResourceType,
            _id: &str,
            _upd: &ApiLightStateUpdate,
        ) -> ApiResult<ApiUpdateReply> {
            Err(ApiError::BridgeProtocol(HueError::new(
                HueApiV1Error::DeviceIsSetToOff,
                "/lights/1/state/bri",
                "parameter, bri, is not modifiable. Device is set to off.",
            )))
        }
    }

    #[tokio::test]
    async fn failed_mutation_keeps_optimistic_value() {
        let store = Arc::new(Mutex::new(BridgeStore::new()));
        let backend = BridgeBackend::new("test", Arc::new(RefusingBridge), store.clone());

        let req = {
            let mut lock = store.lock().await;
            let _queue = lock.backend_event_stream();
            lock.replace_lights(vec![Light::new("1", "Desk")]);
            lock.set_light_brightness("1", 100).unwrap();
            BackendRequest::LightUpdate("1".into(), ApiLightStateUpdate::new().with_bri(100))
        };

        backend.handle_backend_event(Arc::new(req.clone())).await;

        let lock = store.lock().await;
        assert_eq!(lock.light("1").unwrap().brightness(), Field::Known(100));

        let err = lock.error().unwrap();
        assert_eq!(err.retry, req);
        assert!(err.message.contains("not modifiable"));
    }

    #[tokio::test]
    async fn failed_fetch_binds_retry_to_request() {
        let store = Arc::new(Mutex::new(BridgeStore::new()));
        let backend = BridgeBackend::new("test", Arc::new(RefusingBridge), store.clone());

        let req = BackendRequest::Fetch(ApiResourceType::Sensors);
        backend.handle_backend_event(Arc::new(req.clone())).await;

        let lock = store.lock().await;
        let err = lock.error().unwrap();
        assert_eq!(err.retry, req);
        assert_eq!(err.message, "unauthorized user");
    }
}
