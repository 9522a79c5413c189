pub mod bridge;
pub mod demo;

use async_trait::async_trait;
use serde_json::Value;

use hue::legacy_api::{ApiLightStateUpdate, ApiResourceType, ApiUpdateReply, HueApiResult, NewUserReply};

use crate::error::ApiResult;

/// Read and write access to one paired bridge.
#[async_trait]
pub trait BridgeApi: Send + Sync {
    /// Raw collection for `rtype`, as returned by the bridge.
    async fn get_resource(&self, rtype: ApiResourceType) -> ApiResult<Value>;

    /// Write `upd` to `lights/<id>/state` or `groups/<id>/action`.
    async fn put_state(
        &self,
        rtype: ApiResourceType,
        id: &str,
        upd: &ApiLightStateUpdate,
    ) -> ApiResult<ApiUpdateReply>;
}

/// Credential registration with a bridge that has not been paired yet.
#[async_trait]
pub trait Registrar: Send + Sync {
    async fn register(
        &self,
        address: &str,
        devicetype: &str,
    ) -> ApiResult<Vec<HueApiResult<NewUserReply>>>;
}
