use serde::Serialize;
use serde_json::{Map, Value};

use hue::legacy_api::ApiSensor;

use crate::model::field::Field;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RotaryState {
    pub event: Option<i64>,
    pub expected_rotation: Option<i64>,
    pub expected_duration: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Sensor {
    pub id: String,
    pub name: String,
    pub sensor_type: String,
    pub manufacturer: String,
    pub product_name: String,
    pub on: bool,
    pub battery: Field<u8>,
    pub reachable: Field<bool>,
    pub last_updated: Option<String>,
    pub rotary: Option<RotaryState>,
    pub extra_state: Map<String, Value>,
}

impl Sensor {
    #[must_use]
    pub fn from_api(id: String, api: ApiSensor) -> Self {
        let state = api.state;
        let rotary = if state.rotaryevent.is_some()
            || state.expectedrotation.is_some()
            || state.expectedeventduration.is_some()
        {
            Some(RotaryState {
                event: state.rotaryevent,
                expected_rotation: state.expectedrotation,
                expected_duration: state.expectedeventduration,
            })
        } else {
            None
        };

        Self {
            id,
            name: api.name,
            sensor_type: api.sensor_type,
            manufacturer: api.manufacturername,
            product_name: api.productname,
            on: api.config.on,
            battery: api.config.battery.map(|b| b.min(100)).into(),
            reachable: api.config.reachable.into(),
            last_updated: state.lastupdated,
            rotary,
            extra_state: state.extra,
        }
    }
}
