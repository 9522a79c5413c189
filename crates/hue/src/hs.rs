use serde::{Deserialize, Serialize};

use crate::error::{HueError, HueResult};
use crate::{MAX_BRIGHTNESS, MAX_SATURATION};

/// Hue and saturation as the bridge sends them on the wire.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RawHS {
    pub hue: u16,
    pub sat: u8,
}

/// Hue, saturation and brightness, every channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsb {
    pub hue: f64,
    pub sat: f64,
    pub bri: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Hsb {
    /* hue reads divide by 65536, while writes multiply by 65535 */
    pub const HUE_READ_DIVISOR: f64 = 65536.0;
    pub const HUE_WRITE_FACTOR: f64 = 65535.0;

    #[must_use]
    pub fn from_bridge(hs: RawHS, bri: u8) -> Self {
        Self {
            hue: f64::from(hs.hue) / Self::HUE_READ_DIVISOR,
            sat: f64::from(hs.sat) / f64::from(MAX_SATURATION),
            bri: f64::from(bri) / f64::from(MAX_BRIGHTNESS),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn to_bridge(&self) -> (RawHS, u8) {
        let hue = (self.hue * Self::HUE_WRITE_FACTOR)
            .round()
            .clamp(0.0, f64::from(u16::MAX)) as u16;
        let sat = (self.sat * f64::from(MAX_SATURATION))
            .round()
            .clamp(0.0, f64::from(MAX_SATURATION)) as u8;
        let bri = (self.bri * f64::from(MAX_BRIGHTNESS))
            .round()
            .clamp(0.0, f64::from(MAX_BRIGHTNESS)) as u8;

        (RawHS { hue, sat }, bri)
    }

    /// Hue angle in degrees, always in `[0, 360)`.
    #[must_use]
    pub fn hue_degrees(&self) -> f64 {
        self.hue * 360.0
    }

    #[must_use]
    pub fn from_rgb(rgb: Rgb) -> Self {
        let Rgb { r, g, b } = rgb;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let sat = if max > 0.0 { delta / max } else { 0.0 };

        let sector = if delta <= 0.0 {
            0.0
        } else if max <= r {
            (g - b) / delta
        } else if max <= g {
            2.0 + (b - r) / delta
        } else {
            4.0 + (r - g) / delta
        };

        let mut hue = sector * 60.0;
        if hue < 0.0 {
            hue += 360.0;
        }
        // a tiny negative angle plus 360 can round up to exactly 360
        if hue >= 360.0 {
            hue -= 360.0;
        }

        Self {
            hue: hue / 360.0,
            sat,
            bri: max,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn to_rgb(&self) -> Rgb {
        let Self { hue, sat, bri } = *self;

        let h6 = hue * 6.0;
        let sector = h6.floor();
        let f = h6 - sector;

        let p = bri * (1.0 - sat);
        let q = bri * (1.0 - sat * f);
        let t = bri * (1.0 - sat * (1.0 - f));

        let (r, g, b) = match (sector as i64).rem_euclid(6) {
            0 => (bri, t, p),
            1 => (q, bri, p),
            2 => (p, bri, t),
            3 => (p, q, bri),
            4 => (t, p, bri),
            _ => (bri, p, q),
        };

        Rgb { r, g, b }
    }
}

impl Rgb {
    #[must_use]
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    /// Parse `rrggbb`, with or without a leading `#`.
    pub fn from_hex(text: &str) -> HueResult<Self> {
        let digits = text.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return Err(HueError::InvalidColor(text.to_string()));
        }

        let mut bytes = [0u8; 3];
        hex::decode_to_slice(digits, &mut bytes)?;

        Ok(Self::new(
            f64::from(bytes[0]) / 255.0,
            f64::from(bytes[1]) / 255.0,
            f64::from(bytes[2]) / 255.0,
        ))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn to_hex(&self) -> String {
        let bytes = [self.r, self.g, self.b].map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8);
        hex::encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use crate::hs::{Hsb, RawHS, Rgb};

    const TOLERANCE: f64 = 1.0 / 254.0;

    fn assert_close(a: Rgb, b: Rgb, eps: f64) {
        assert!(
            (a.r - b.r).abs() <= eps && (a.g - b.g).abs() <= eps && (a.b - b.b).abs() <= eps,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn rgb_bridge_round_trip() {
        for r in 0..=10 {
            for g in 0..=10 {
                for b in 0..=10 {
                    let rgb = Rgb::new(
                        f64::from(r) / 10.0,
                        f64::from(g) / 10.0,
                        f64::from(b) / 10.0,
                    );

                    let (hs, bri) = Hsb::from_rgb(rgb).to_bridge();
                    let back = Hsb::from_bridge(hs, bri).to_rgb();

                    assert_close(rgb, back, TOLERANCE);
                }
            }
        }
    }

    #[test]
    fn hue_stays_in_range() {
        let samples = [
            Rgb::new(1.0, 0.0, 0.0),
            Rgb::new(1.0, 0.0, 0.000_000_1),
            Rgb::new(1.0, 0.0, 1e-17),
            Rgb::new(0.0, 1.0, 0.0),
            Rgb::new(0.0, 0.0, 1.0),
            Rgb::new(1.0, 0.0, 1.0),
            Rgb::new(0.5, 0.5, 0.5),
            Rgb::new(0.0, 0.0, 0.0),
        ];

        for rgb in samples {
            let deg = Hsb::from_rgb(rgb).hue_degrees();
            assert!((0.0..360.0).contains(&deg), "{rgb:?} -> {deg}");
        }
    }

    #[test]
    fn near_full_turn_wraps_to_zero() {
        // -6e-16 + 360.0 rounds to exactly 360.0
        let hsb = Hsb::from_rgb(Rgb::new(1.0, 0.0, 1e-17));
        assert!(hsb.hue.abs() < f64::EPSILON);
    }

    #[test]
    fn gray_has_no_saturation() {
        let hsb = Hsb::from_rgb(Rgb::new(0.4, 0.4, 0.4));
        assert!(hsb.sat.abs() < f64::EPSILON);
        assert!(hsb.hue.abs() < f64::EPSILON);
        assert!((hsb.bri - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn bridge_read_uses_asymmetric_divisor() {
        let hsb = Hsb::from_bridge(RawHS { hue: 65535, sat: 255 }, 254);
        assert!(hsb.hue < 1.0);
        assert!((hsb.sat - 1.0).abs() < f64::EPSILON);
        assert!((hsb.bri - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bridge_write_scales_and_rounds() {
        let hsb = Hsb {
            hue: 0.5,
            sat: 0.5,
            bri: 0.5,
        };
        let (hs, bri) = hsb.to_bridge();
        assert_eq!(hs, RawHS { hue: 32768, sat: 128 });
        assert_eq!(bri, 127);
    }

    #[test]
    fn hex_colors() {
        let rgb = Rgb::from_hex("#ff8000").unwrap();
        assert_close(rgb, Rgb::new(1.0, 128.0 / 255.0, 0.0), 1e-9);
        assert_eq!(rgb.to_hex(), "ff8000");

        assert!(Rgb::from_hex("fff").is_err());
        assert!(Rgb::from_hex("zzzzzz").is_err());
    }
}
