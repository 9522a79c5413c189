use async_trait::async_trait;
use maplit::btreemap;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use hue::error::HueApiV1Error;
use hue::legacy_api::{ApiLightStateUpdate, ApiResourceType, ApiUpdateReply, HueApiResult, HueError};

use crate::backend::BridgeApi;
use crate::error::{ApiError, ApiResult};

/// Offline bridge served from memory, used when no real bridge is selected.
///
/// Writes are applied to the in-memory model, so the usual
/// mutate-then-refetch cycle behaves as it would against real hardware.
pub struct DemoBridge {
    state: Mutex<Map<String, Value>>,
}

impl Default for DemoBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoBridge {
    #[must_use]
    pub fn new() -> Self {
        let lights = btreemap! {
            "1" => json!({
                "name": "Living room ceiling",
                "type": "Extended color light",
                "modelid": "LCT015",
                "manufacturername": "Signify Netherlands B.V.",
                "productname": "Hue color lamp",
                "uniqueid": "00:17:88:01:00:00:00:01-0b",
                "state": {"on": true, "bri": 200, "hue": 8402, "sat": 140, "colormode": "hs", "reachable": true},
            }),
            "2" => json!({
                "name": "Living room floor",
                "type": "Extended color light",
                "modelid": "LCT015",
                "manufacturername": "Signify Netherlands B.V.",
                "productname": "Hue color lamp",
                "uniqueid": "00:17:88:01:00:00:00:02-0b",
                "state": {"on": false, "bri": 120, "hue": 46920, "sat": 254, "colormode": "hs", "reachable": true},
            }),
            "3" => json!({
                "name": "Bedroom",
                "type": "Dimmable light",
                "modelid": "LWB010",
                "manufacturername": "Signify Netherlands B.V.",
                "productname": "Hue white lamp",
                "uniqueid": "00:17:88:01:00:00:00:03-0b",
                "state": {"on": true, "bri": 60, "reachable": true},
            }),
            "4" => json!({
                "name": "Office desk",
                "type": "Color temperature light",
                "modelid": "LTW012",
                "manufacturername": "Signify Netherlands B.V.",
                "productname": "Hue ambiance candle",
                "uniqueid": "00:17:88:01:00:00:00:04-0b",
                "state": {"on": false, "bri": 254, "ct": 366, "colormode": "ct", "reachable": false},
            }),
        };

        let groups = btreemap! {
            "1" => json!({
                "name": "Living room",
                "lights": ["1", "2"],
                "type": "Room",
                "class": "Living room",
                "state": {"all_on": false, "any_on": true},
                "action": {"on": true, "bri": 200, "hue": 8402, "sat": 140, "colormode": "hs"},
            }),
            "2" => json!({
                "name": "Upstairs",
                "lights": ["3", "4"],
                "type": "Zone",
                "state": {"all_on": false, "any_on": true},
                "action": {"on": true, "bri": 60, "ct": 366, "alert": "none"},
            }),
        };

        let sensors = btreemap! {
            "1" => json!({
                "name": "Daylight",
                "type": "Daylight",
                "manufacturername": "Signify Netherlands B.V.",
                "state": {"daylight": true, "lastupdated": "2024-06-01T05:12:00"},
                "config": {"on": true},
            }),
            "2" => json!({
                "name": "Hallway dial",
                "type": "ZLLRelativeRotary",
                "manufacturername": "Signify Netherlands B.V.",
                "productname": "Hue tap dial switch",
                "state": {
                    "rotaryevent": 2,
                    "expectedrotation": 45,
                    "expectedeventduration": 400,
                    "lastupdated": "2024-06-01T18:40:11",
                },
                "config": {"on": true, "battery": 92, "reachable": true},
            }),
        };

        let mut state = Map::new();
        state.insert("lights".into(), json!(lights));
        state.insert("groups".into(), json!(groups));
        state.insert("sensors".into(), json!(sensors));

        Self {
            state: Mutex::new(state),
        }
    }

    fn not_found(address: &str) -> ApiError {
        ApiError::BridgeProtocol(HueError::new(
            HueApiV1Error::ResourceNotAvailable,
            address,
            &format!("resource, {address}, not available"),
        ))
    }

    /// Merge `upd` into `target`, returning one success entry per field.
    fn apply(
        target: &mut Map<String, Value>,
        prefix: &str,
        upd: &ApiLightStateUpdate,
    ) -> ApiResult<ApiUpdateReply> {
        let Value::Object(fields) = serde_json::to_value(upd)? else {
            return Ok(vec![]);
        };

        let mut reply = vec![];
        for (key, value) in fields {
            let mut entry = Map::new();
            entry.insert(format!("{prefix}/{key}"), value.clone());
            target.insert(key, value);
            reply.push(HueApiResult::Success(entry));
        }
        Ok(reply)
    }

    fn object_at<'a>(
        root: &'a mut Map<String, Value>,
        path: &[&str],
    ) -> Option<&'a mut Map<String, Value>> {
        path.iter()
            .try_fold(root, |node, key| node.get_mut(*key)?.as_object_mut())
    }

    fn refresh_group_state(state: &mut Map<String, Value>) {
        let lights = state.get("lights").cloned().unwrap_or_default();
        let Some(groups) = state.get_mut("groups").and_then(Value::as_object_mut) else {
            return;
        };

        for group in groups.values_mut() {
            let members: Vec<bool> = group["lights"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .map(|id| lights[id]["state"]["on"].as_bool().unwrap_or(false))
                .collect();
            group["state"] = json!({
                "all_on": !members.is_empty() && members.iter().all(|on| *on),
                "any_on": members.iter().any(|on| *on),
            });
        }
    }
}

#[async_trait]
impl BridgeApi for DemoBridge {
    async fn get_resource(&self, rtype: ApiResourceType) -> ApiResult<Value> {
        let state = self.state.lock().await;
        Ok(state.get(rtype.as_str()).cloned().unwrap_or_else(|| json!({})))
    }

    async fn put_state(
        &self,
        rtype: ApiResourceType,
        id: &str,
        upd: &ApiLightStateUpdate,
    ) -> ApiResult<ApiUpdateReply> {
        let mut state = self.state.lock().await;

        let reply = match rtype {
            ApiResourceType::Lights => {
                let prefix = format!("/lights/{id}/state");
                let target = Self::object_at(&mut state, &["lights", id, "state"])
                    .ok_or_else(|| Self::not_found(&format!("/lights/{id}")))?;
                Self::apply(target, &prefix, upd)?
            }
            ApiResourceType::Groups => {
                let prefix = format!("/groups/{id}/action");
                let target = Self::object_at(&mut state, &["groups", id, "action"])
                    .ok_or_else(|| Self::not_found(&format!("/groups/{id}")))?;
                let reply = Self::apply(target, &prefix, upd)?;

                let members: Vec<String> = state["groups"][id]["lights"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|v| v.as_str().map(ToString::to_string))
                    .collect();
                for light in members {
                    if let Some(target) = Self::object_at(&mut state, &["lights", light.as_str(), "state"]) {
                        Self::apply(target, "", upd)?;
                    }
                }
                reply
            }
            ApiResourceType::Sensors => {
                return Err(ApiError::BridgeProtocol(HueError::new(
                    HueApiV1Error::MethodNotAvailable,
                    &format!("/sensors/{id}/state"),
                    "method, PUT, not available for resource, /sensors/state",
                )));
            }
        };

        Self::refresh_group_state(&mut state);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use hue::legacy_api::{ApiLightStateUpdate, ApiResourceType};

    use crate::backend::BridgeApi;
    use crate::backend::bridge::import::{import_groups, import_lights, import_sensors};
    use crate::backend::demo::DemoBridge;
    use crate::error::ApiError;
    use crate::model::Field;

    #[tokio::test]
    async fn demo_data_imports_cleanly() {
        let demo = DemoBridge::new();

        let lights = import_lights(demo.get_resource(ApiResourceType::Lights).await.unwrap()).unwrap();
        let groups = import_groups(demo.get_resource(ApiResourceType::Groups).await.unwrap()).unwrap();
        let sensors =
            import_sensors(demo.get_resource(ApiResourceType::Sensors).await.unwrap()).unwrap();

        assert_eq!(lights.len(), 4);
        assert_eq!(groups.len(), 2);
        assert_eq!(sensors.len(), 2);
        assert!(sensors.iter().any(|s| s.rotary.is_some()));
    }

    #[tokio::test]
    async fn group_write_reaches_members() {
        let demo = DemoBridge::new();
        let upd = ApiLightStateUpdate::new().with_on(true);

        let reply = demo.put_state(ApiResourceType::Groups, "1", &upd).await.unwrap();
        assert_eq!(reply.len(), 1);

        let lights = import_lights(demo.get_resource(ApiResourceType::Lights).await.unwrap()).unwrap();
        let floor = lights.iter().find(|l| l.id == "2").unwrap();
        assert_eq!(floor.on(), Field::Known(true));

        let groups = import_groups(demo.get_resource(ApiResourceType::Groups).await.unwrap()).unwrap();
        let living = groups.iter().find(|g| g.id == "1").unwrap();
        assert!(living.all_on);
    }

    #[tokio::test]
    async fn unknown_light_is_a_bridge_error() {
        let demo = DemoBridge::new();
        let upd = ApiLightStateUpdate::new().with_bri(10);

        let res = demo.put_state(ApiResourceType::Lights, "99", &upd).await;
        assert!(matches!(res, Err(ApiError::BridgeProtocol(err)) if err.typ == 3));
    }
}
