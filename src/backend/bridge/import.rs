use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use hue::legacy_api::{ApiResourceType, HueApiResult};

use crate::error::{ApiError, ApiResult};
use crate::model::{Group, Light, Sensor};

/// Unwrap a collection reply (`{"<id>": {...}, ...}`).
///
/// The bridge answers a bad request with an array of errors instead, e.g. an
/// unauthorized credential; the first of those becomes the error.
pub fn collection(value: Value) -> ApiResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Array(items) => {
            let errors: Vec<HueApiResult<Value>> = serde_json::from_value(Value::Array(items))
                .map_err(|_| ApiError::UnexpectedResponse("array instead of collection".into()))?;
            errors
                .into_iter()
                .find_map(|res| res.into_result().err())
                .map_or_else(
                    || Err(ApiError::UnexpectedResponse("array instead of collection".into())),
                    |err| Err(ApiError::BridgeProtocol(err)),
                )
        }
        other => Err(ApiError::UnexpectedResponse(format!(
            "expected collection, got {other}"
        ))),
    }
}

/// Decode every entry of a collection, skipping entries that fail to decode.
fn import<A, T>(
    value: Value,
    rtype: ApiResourceType,
    convert: impl Fn(String, A) -> T,
) -> ApiResult<Vec<T>>
where
    A: DeserializeOwned,
{
    let map = collection(value)?;
    let total = map.len();

    let res: Vec<T> = map
        .into_iter()
        .filter_map(|(id, entry)| match serde_json::from_value::<A>(entry) {
            Ok(obj) => Some(convert(id, obj)),
            Err(err) => {
                log::warn!("Skipping {rtype} entry {id:?}: {err}");
                None
            }
        })
        .collect();

    log::debug!("Imported {} of {total} {rtype}", res.len());
    Ok(res)
}

pub fn import_lights(value: Value) -> ApiResult<Vec<Light>> {
    import(value, ApiResourceType::Lights, Light::from_api)
}

pub fn import_groups(value: Value) -> ApiResult<Vec<Group>> {
    import(value, ApiResourceType::Groups, Group::from_api)
}

pub fn import_sensors(value: Value) -> ApiResult<Vec<Sensor>> {
    import(value, ApiResourceType::Sensors, Sensor::from_api)
}
