use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::HueApiV1Error;
use crate::hs::Hsb;

/// Error object returned by the bridge, e.g. `{"type": 101, ...}`
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[error("{description}")]
pub struct HueError {
    #[serde(rename = "type")]
    pub typ: u32,
    #[serde(default)]
    pub address: String,
    pub description: String,
}

impl HueError {
    #[must_use]
    pub fn new(kind: HueApiV1Error, address: &str, description: &str) -> Self {
        Self {
            typ: kind.code(),
            address: address.to_string(),
            description: description.to_string(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> HueApiV1Error {
        HueApiV1Error::from_code(self.typ)
    }

    #[must_use]
    pub const fn is_link_button(&self) -> bool {
        matches!(self.kind(), HueApiV1Error::LinkButtonNotPressed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HueApiResult<T> {
    Success(T),
    Error(HueError),
}

impl<T> HueApiResult<T> {
    pub fn into_result(self) -> Result<T, HueError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Error(err) => Err(err),
        }
    }
}

/// Reply to a PUT on a state/action sub-resource: one entry per changed field
pub type ApiUpdateReply = Vec<HueApiResult<Map<String, Value>>>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApiResourceType {
    Groups,
    Lights,
    Sensors,
}

impl ApiResourceType {
    pub const ALL: [Self; 3] = [Self::Lights, Self::Groups, Self::Sensors];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Groups => "groups",
            Self::Lights => "lights",
            Self::Sensors => "sensors",
        }
    }
}

impl Display for ApiResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record returned by the cloud discovery endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiDiscoveryEntry {
    pub id: String,
    pub internalipaddress: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub devicetype: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserReply {
    pub username: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LightColorMode {
    Ct,
    Xy,
    Hs,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiLightState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ct: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colormode: Option<LightColorMode>,
    pub reachable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiLight {
    pub name: String,
    pub state: ApiLightState,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub light_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modelid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturername: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub productname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniqueid: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ApiGroupState {
    pub all_on: bool,
    pub any_on: bool,
}

/// Last commanded state of a group. Everything past `sat` is passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiGroupAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ct: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colormode: Option<LightColorMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiGroup {
    pub name: String,
    pub lights: Vec<String>,
    #[serde(rename = "type")]
    pub group_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub state: ApiGroupState,
    pub action: ApiGroupAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiSensorState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotaryevent: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectedrotation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectedeventduration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastupdated: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSensorConfig {
    pub on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSensor {
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    #[serde(default)]
    pub manufacturername: String,
    #[serde(default)]
    pub productname: String,
    pub state: ApiSensorState,
    pub config: ApiSensorConfig,
}

/// Body of a PUT to `lights/<id>/state` or `groups/<id>/action`. Only set
/// fields are sent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ApiLightStateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
}

impl ApiLightStateUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_on(mut self, on: bool) -> Self {
        self.on = Some(on);
        self
    }

    #[must_use]
    pub const fn with_bri(mut self, bri: u8) -> Self {
        self.bri = Some(bri);
        self
    }

    #[must_use]
    pub fn with_hsb(mut self, hsb: &Hsb) -> Self {
        let (hs, bri) = hsb.to_bridge();
        self.hue = Some(hs.hue);
        self.sat = Some(hs.sat);
        self.bri = Some(bri);
        self
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.on.is_none()
            && self.bri.is_none()
            && self.hue.is_none()
            && self.sat.is_none()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::HueApiV1Error;
    use crate::hs::Hsb;
    use crate::legacy_api::{
        ApiDiscoveryEntry, ApiGroup, ApiLight, ApiLightStateUpdate, ApiSensor, HueApiResult,
        NewUser, NewUserReply,
    };

    #[test]
    fn decode_link_button_error() {
        let reply: Vec<HueApiResult<NewUserReply>> = serde_json::from_value(json!([
            {"error": {"type": 101, "address": "", "description": "link button not pressed"}}
        ]))
        .unwrap();

        let err = reply.into_iter().next().unwrap().into_result().unwrap_err();
        assert!(err.is_link_button());
        assert_eq!(err.kind(), HueApiV1Error::LinkButtonNotPressed);
        assert_eq!(err.to_string(), "link button not pressed");
    }

    #[test]
    fn new_user_body_has_only_devicetype() {
        let body = serde_json::to_value(NewUser {
            devicetype: "hue_ios_app".into(),
        })
        .unwrap();

        assert_eq!(body, json!({"devicetype": "hue_ios_app"}));
    }

    #[test]
    fn extra_reply_fields_are_ignored() {
        let reply: Vec<HueApiResult<NewUserReply>> = serde_json::from_value(json!([
            {"success": {"username": "abc123", "clientkey": "0011AABB"}}
        ]))
        .unwrap();
        let user = reply.into_iter().next().unwrap().into_result().unwrap();
        assert_eq!(user.username, "abc123");

        let entry: ApiDiscoveryEntry = serde_json::from_value(json!(
            {"id": "001788fffe000000", "internalipaddress": "192.168.1.20", "port": 443}
        ))
        .unwrap();
        assert_eq!(entry.internalipaddress, "192.168.1.20");
    }

    #[test]
    fn update_only_sends_changed_fields() {
        let upd = ApiLightStateUpdate::new().with_on(true);
        assert_eq!(serde_json::to_value(upd).unwrap(), json!({"on": true}));

        let upd = ApiLightStateUpdate::new().with_hsb(&Hsb {
            hue: 0.0,
            sat: 1.0,
            bri: 1.0,
        });
        assert_eq!(
            serde_json::to_value(upd).unwrap(),
            json!({"bri": 254, "hue": 0, "sat": 255})
        );

        assert!(ApiLightStateUpdate::new().is_empty());
    }

    #[test]
    fn light_without_optional_state() {
        let light: ApiLight = serde_json::from_value(json!({
            "name": "Plug",
            "type": "On/Off plug-in unit",
            "state": {"on": false, "reachable": true, "colormode": "somethingnew"}
        }))
        .unwrap();

        assert_eq!(light.state.on, Some(false));
        assert_eq!(light.state.bri, None);
        assert_eq!(light.light_type.as_deref(), Some("On/Off plug-in unit"));
    }

    #[test]
    fn group_keeps_passthrough_fields() {
        let group: ApiGroup = serde_json::from_value(json!({
            "name": "Kitchen",
            "lights": ["1", "2"],
            "type": "Room",
            "class": "Kitchen",
            "state": {"all_on": false, "any_on": true},
            "action": {"on": true, "bri": 100, "ct": 366, "xy": [0.4, 0.4], "alert": "none"}
        }))
        .unwrap();

        assert_eq!(group.action.ct, Some(366));
        assert_eq!(group.action.hue, None);
        assert!(group.state.any_on);
    }

    #[test]
    fn sensor_keeps_unknown_state() {
        let sensor: ApiSensor = serde_json::from_value(json!({
            "name": "Daylight",
            "type": "Daylight",
            "state": {"daylight": true, "lastupdated": "2024-01-01T10:00:00"},
            "config": {"on": true}
        }))
        .unwrap();

        assert_eq!(sensor.state.lastupdated.as_deref(), Some("2024-01-01T10:00:00"));
        assert_eq!(sensor.state.extra.get("daylight"), Some(&json!(true)));
        assert_eq!(sensor.config.battery, None);
        assert!(sensor.manufacturername.is_empty());
    }
}
