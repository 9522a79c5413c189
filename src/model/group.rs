use std::collections::BTreeSet;

use serde::Serialize;

use hue::hs::Hsb;
use hue::legacy_api::{ApiGroup, ApiGroupAction, LightColorMode};

use crate::model::field::Field;

/// Last commanded state of a group
#[derive(Clone, Debug, Default, Serialize)]
pub struct GroupAction {
    pub on: Field<bool>,
    pub brightness: Field<u8>,
    pub hue: Field<u16>,
    pub saturation: Field<u8>,

    pub effect: Option<String>,
    pub xy: Option<[f64; 2]>,
    pub ct: Option<u16>,
    pub alert: Option<String>,
    pub colormode: Option<LightColorMode>,
}

impl From<ApiGroupAction> for GroupAction {
    fn from(action: ApiGroupAction) -> Self {
        Self {
            on: action.on.into(),
            brightness: action.bri.map(|bri| bri.min(hue::MAX_BRIGHTNESS)).into(),
            hue: action.hue.into(),
            saturation: action.sat.into(),
            effect: action.effect,
            xy: action.xy,
            ct: action.ct,
            alert: action.alert,
            colormode: action.colormode,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub lights: BTreeSet<String>,
    pub group_type: String,
    pub class: Option<String>,
    pub all_on: bool,
    pub any_on: bool,
    pub action: GroupAction,
}

impl Group {
    #[must_use]
    pub fn from_api(id: String, api: ApiGroup) -> Self {
        Self {
            id,
            name: api.name,
            lights: api.lights.into_iter().collect(),
            group_type: api.group_type,
            class: api.class,
            all_on: api.state.all_on,
            any_on: api.state.any_on,
            action: api.action.into(),
        }
    }

    pub fn set_on(&mut self, on: bool) {
        self.action.on = Field::Known(on);
        self.all_on = on;
        self.any_on = on;
    }

    pub fn set_brightness(&mut self, bri: u8) {
        self.action.brightness = Field::Known(bri.min(hue::MAX_BRIGHTNESS));
    }

    pub fn set_hsb(&mut self, hsb: &Hsb) {
        let (hs, bri) = hsb.to_bridge();
        self.action.hue = Field::Known(hs.hue);
        self.action.saturation = Field::Known(hs.sat);
        self.action.brightness = Field::Known(bri);
        self.action.colormode = Some(LightColorMode::Hs);
    }
}
