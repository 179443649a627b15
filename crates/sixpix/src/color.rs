//! The SIXEL color model: four channels on a 0-100 integer scale.

use crate::{Result, SixelError};

/// A color on the SIXEL wire scale, 0-100 per channel.
///
/// Alpha 0 denotes a fully transparent color and normalizes the other
/// channels to zero so that equality (the palette key) treats all fully
/// transparent colors as the same value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SixelColor {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl SixelColor {
    /// The fully transparent color.
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    /// Creates a color, validating every channel against the 0-100 scale.
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Result<Self> {
        for (channel, value) in [("red", r), ("green", g), ("blue", b), ("alpha", a)] {
            if value > 100 {
                return Err(SixelError::ChannelOutOfRange {
                    channel,
                    value: value as i64,
                });
            }
        }
        if a == 0 {
            Ok(Self::TRANSPARENT)
        } else {
            Ok(Self { r, g, b, a })
        }
    }

    /// Creates an opaque color from 0-100 scaled RGB channels.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Result<Self> {
        Self::new(r, g, b, 100)
    }

    /// Converts 8-bit RGBA to the 0-100 scale (truncating, like the wire
    /// palette emission).
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        if a == 0 {
            return Self::TRANSPARENT;
        }
        let scale = |v: u8| (v as u16 * 100 / 255) as u8;
        Self {
            r: scale(r),
            g: scale(g),
            b: scale(b),
            a: scale(a),
        }
    }

    /// Creates a color from the SIXEL HLS color system (cSys 1).
    ///
    /// The hue origin of SIXEL HLS is rotated 240 degrees from conventional
    /// HLS; reference decoders depend on the exact offset, so it is kept
    /// verbatim.
    pub fn from_hls(h: i32, l: i32, s: i32) -> Result<Self> {
        let lum = l as f64;
        let sat = s as f64;
        let (max, min) = if l > 50 {
            let spread = sat * (1.0 - lum / 100.0);
            (lum + spread, lum - spread)
        } else {
            let spread = sat * lum / 100.0;
            (lum + spread, lum - spread)
        };

        let h = (h + 240).rem_euclid(360);
        let hf = h as f64;
        let ramp = |t: f64| min + (max - min) * t / 60.0;
        let (r, g, b) = match h {
            0..=59 => (max, ramp(hf), min),
            60..=119 => (ramp(120.0 - hf), max, min),
            120..=179 => (min, max, ramp(hf - 120.0)),
            180..=239 => (min, ramp(240.0 - hf), max),
            240..=299 => (ramp(hf - 240.0), min, max),
            _ => (max, min, ramp(360.0 - hf)),
        };

        Self::from_rgb(r.round() as u8, g.round() as u8, b.round() as u8)
    }

    /// Converts to 8-bit RGBA (rounding).
    pub fn to_rgba8(self) -> [u8; 4] {
        let scale = |v: u8| ((v as f64) * 255.0 / 100.0).round() as u8;
        [scale(self.r), scale(self.g), scale(self.b), scale(self.a)]
    }

    /// Composites a partially transparent color against `background`.
    ///
    /// Alpha 100 is a no-op and alpha 0 yields the background unchanged;
    /// anything in between interpolates each channel by alpha/100 and
    /// discharges the alpha to 100. SIXEL alpha is binary, so this runs
    /// before quantization, never on the wire.
    pub fn blend(self, background: SixelColor) -> SixelColor {
        match self.a {
            100 => self,
            0 => background,
            a => {
                let t = a as f64 / 100.0;
                let lerp =
                    |c: u8, bg: u8| ((c as f64) * t + (bg as f64) * (1.0 - t)).round() as u8;
                SixelColor {
                    r: lerp(self.r, background.r),
                    g: lerp(self.g, background.g),
                    b: lerp(self.b, background.b),
                    a: 100,
                }
            }
        }
    }

    #[inline]
    pub fn r(self) -> u8 {
        self.r
    }

    #[inline]
    pub fn g(self) -> u8 {
        self.g
    }

    #[inline]
    pub fn b(self) -> u8 {
        self.b
    }

    #[inline]
    pub fn a(self) -> u8 {
        self.a
    }

    #[inline]
    pub fn is_transparent(self) -> bool {
        self.a == 0
    }
}
