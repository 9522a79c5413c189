use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use hue::legacy_api::{
    ApiLightStateUpdate, ApiResourceType, ApiUpdateReply, HueApiResult, HueError, NewUser,
    NewUserReply,
};

use crate::backend::{BridgeApi, Registrar};
use crate::config::BridgeConfig;
use crate::error::{ApiError, ApiResult};

/// Base url of the v1 api on a bridge, without credential
pub fn api_url(address: &str) -> ApiResult<Url> {
    Ok(Url::parse(&format!("http://{address}/api/"))?)
}

/// Parse a bridge reply body. An empty body is reported as [`ApiError::NoData`]
/// rather than as a decoding failure.
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::NoData);
    }
    Ok(serde_json::from_slice(body)?)
}

async fn check_status(response: reqwest::Response, action: &str) -> ApiResult<Vec<u8>> {
    let status = response.status();
    let body = response.bytes().await?;

    if status.is_success() {
        return Ok(body.to_vec());
    }

    // error arrays can also arrive with a 4xx status
    if let Ok(mut errors) = serde_json::from_slice::<Vec<HueApiResult<Value>>>(&body) {
        if let Some(HueApiResult::Error(err)) = errors.pop() {
            return Err(ApiError::BridgeProtocol(err));
        }
    }

    let text = String::from_utf8_lossy(&body);
    Err(ApiError::UnexpectedResponse(format!(
        "{status} during {action}: {text}"
    )))
}

pub struct BridgeClient {
    name: String,
    base_url: Url,
    http: reqwest::Client,
}

impl BridgeClient {
    pub fn new(config: &BridgeConfig, http: reqwest::Client) -> ApiResult<Self> {
        let base_url = api_url(&config.address)?.join(&format!("{}/", config.credential))?;
        Ok(Self {
            name: config.name.clone(),
            base_url,
            http,
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(endpoint.trim_start_matches('/'))?)
    }
}

#[async_trait]
impl BridgeApi for BridgeClient {
    async fn get_resource(&self, rtype: ApiResourceType) -> ApiResult<Value> {
        let url = self.endpoint_url(rtype.as_str())?;
        log::trace!("[{}] GET {rtype}", self.name);

        let response = self.http.get(url).send().await?;
        let body = check_status(response, &format!("GET {rtype}")).await?;
        decode_body(&body)
    }

    async fn put_state(
        &self,
        rtype: ApiResourceType,
        id: &str,
        upd: &ApiLightStateUpdate,
    ) -> ApiResult<ApiUpdateReply> {
        let endpoint = match rtype {
            ApiResourceType::Groups => format!("groups/{id}/action"),
            _ => format!("{rtype}/{id}/state"),
        };
        log::debug!("[{}] PUT {endpoint} {}", self.name, serde_json::to_string(upd)?);

        let url = self.endpoint_url(&endpoint)?;
        let response = self.http.put(url).json(upd).send().await?;
        let body = check_status(response, &format!("PUT {endpoint}")).await?;
        let reply: ApiUpdateReply = decode_body(&body)?;

        if let Some(err) = first_error(&reply) {
            return Err(ApiError::BridgeProtocol(err));
        }

        Ok(reply)
    }
}

fn first_error<T>(reply: &[HueApiResult<T>]) -> Option<HueError> {
    reply.iter().find_map(|res| match res {
        HueApiResult::Error(err) => Some(err.clone()),
        HueApiResult::Success(_) => None,
    })
}

/// Performs the link-button handshake over plain http.
pub struct HttpRegistrar {
    http: reqwest::Client,
}

impl HttpRegistrar {
    #[must_use]
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Registrar for HttpRegistrar {
    async fn register(
        &self,
        address: &str,
        devicetype: &str,
    ) -> ApiResult<Vec<HueApiResult<NewUserReply>>> {
        let url = api_url(address)?;
        let req = NewUser {
            devicetype: devicetype.to_string(),
        };

        let response = self.http.post(url).json(&req).send().await?;
        let body = check_status(response, "POST /api").await?;
        decode_body(&body)
    }
}
