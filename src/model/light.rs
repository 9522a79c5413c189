use serde::Serialize;

use hue::hs::{Hsb, RawHS, Rgb};
use hue::legacy_api::{ApiLight, LightColorMode};

use crate::model::field::Field;

/// Presentation color cached on a light, derived from hue, saturation and
/// brightness.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DerivedColor {
    pub hue: f64,
    pub sat: f64,
    pub bri: f64,
    pub rgb: [f64; 3],
}

impl DerivedColor {
    fn new(hsb: Hsb) -> Self {
        let Rgb { r, g, b } = hsb.to_rgb();
        Self {
            hue: hsb.hue,
            sat: hsb.sat,
            bri: hsb.bri,
            rgb: [r, g, b],
        }
    }

    #[must_use]
    pub fn hex(&self) -> String {
        Rgb::new(self.rgb[0], self.rgb[1], self.rgb[2]).to_hex()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Light {
    pub id: String,
    pub name: String,
    pub reachable: bool,

    on: Field<bool>,
    brightness: Field<u8>,
    hue: Field<u16>,
    saturation: Field<u8>,
    color: Option<DerivedColor>,

    pub colormode: Option<LightColorMode>,
    pub ct: Option<u16>,
    pub xy: Option<[f64; 2]>,
    pub light_type: Option<String>,
    pub modelid: Option<String>,
    pub manufacturer: Option<String>,
    pub productname: Option<String>,
    pub uniqueid: Option<String>,
}

impl Light {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            reachable: true,
            on: Field::Unknown,
            brightness: Field::Unknown,
            hue: Field::Unknown,
            saturation: Field::Unknown,
            color: None,
            colormode: None,
            ct: None,
            xy: None,
            light_type: None,
            modelid: None,
            manufacturer: None,
            productname: None,
            uniqueid: None,
        }
    }

    #[must_use]
    pub fn from_api(id: String, api: ApiLight) -> Self {
        let state = api.state;
        let mut light = Self {
            reachable: state.reachable,
            on: state.on.into(),
            brightness: state.bri.map(|bri| bri.min(hue::MAX_BRIGHTNESS)).into(),
            hue: state.hue.into(),
            saturation: state.sat.into(),
            colormode: state.colormode,
            ct: state.ct,
            xy: state.xy,
            light_type: api.light_type,
            modelid: api.modelid,
            manufacturer: api.manufacturername,
            productname: api.productname,
            uniqueid: api.uniqueid,
            ..Self::new(id, api.name)
        };
        light.refresh_color();
        light
    }

    #[must_use]
    pub const fn on(&self) -> Field<bool> {
        self.on
    }

    #[must_use]
    pub const fn brightness(&self) -> Field<u8> {
        self.brightness
    }

    #[must_use]
    pub const fn hue(&self) -> Field<u16> {
        self.hue
    }

    #[must_use]
    pub const fn saturation(&self) -> Field<u8> {
        self.saturation
    }

    /// Cached color, present only when hue, saturation and brightness are all known
    #[must_use]
    pub const fn color(&self) -> Option<&DerivedColor> {
        self.color.as_ref()
    }

    pub const fn set_on(&mut self, on: bool) {
        self.on = Field::Known(on);
    }

    pub fn set_brightness(&mut self, bri: u8) {
        self.brightness = Field::Known(bri.min(hue::MAX_BRIGHTNESS));
        self.refresh_color();
    }

    /// Store a color in bridge scale, exactly as it will be sent.
    pub fn set_hsb(&mut self, hsb: &Hsb) {
        let (hs, bri) = hsb.to_bridge();
        self.hue = Field::Known(hs.hue);
        self.saturation = Field::Known(hs.sat);
        self.brightness = Field::Known(bri);
        self.colormode = Some(LightColorMode::Hs);
        self.refresh_color();
    }

    fn refresh_color(&mut self) {
        self.color = match (self.hue, self.saturation, self.brightness) {
            (Field::Known(hue), Field::Known(sat), Field::Known(bri)) => Some(DerivedColor::new(
                Hsb::from_bridge(RawHS { hue, sat }, bri),
            )),
            _ => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use hue::hs::{Hsb, Rgb};
    use hue::legacy_api::ApiLight;

    use crate::model::field::Field;
    use crate::model::light::Light;

    fn light(state: serde_json::Value) -> Light {
        let api: ApiLight = serde_json::from_value(json!({"name": "Desk", "state": state})).unwrap();
        Light::from_api("7".into(), api)
    }

    #[test]
    fn color_needs_all_channels() {
        let l = light(json!({"on": true, "bri": 100, "reachable": true}));
        assert_eq!(l.brightness(), Field::Known(100));
        assert_eq!(l.hue(), Field::Unknown);
        assert!(l.color().is_none());

        let l = light(json!({"on": true, "bri": 254, "hue": 0, "sat": 255, "reachable": true}));
        let color = l.color().unwrap();
        assert!((color.rgb[0] - 1.0).abs() < 1e-9);
        assert!(color.rgb[1].abs() < 1e-9);
        assert_eq!(color.hex(), "ff0000");
    }

    #[test]
    fn setters_recompute_color() {
        let mut l = light(json!({"on": true, "bri": 254, "hue": 0, "sat": 255, "reachable": true}));

        l.set_brightness(127);
        let color = l.color().unwrap();
        assert!((color.bri - 0.5).abs() < 1e-9);

        l.set_hsb(&Hsb::from_rgb(Rgb::new(0.0, 0.0, 1.0)));
        let color = l.color().unwrap();
        assert_eq!(color.hex(), "0000ff");
        assert_eq!(l.brightness(), Field::Known(254));
    }

    #[test]
    fn brightness_is_clamped() {
        let mut l = Light::new("1", "x");
        l.set_brightness(255);
        assert_eq!(l.brightness(), Field::Known(254));
    }
}
