use serde::{Deserialize, Serialize};

use crate::foundation::math::lerp;

/// Straight-alpha RGBA8 color.
///
/// Accepted spellings: `#RRGGBB`, `#RRGGBBAA`, a palette name such as `RED` or `teal`
/// (case-insensitive), or an `[r, g, b]` / `[r, g, b, a]` byte array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

const PALETTE: &[(&str, Color)] = &[
    ("RED", Color::rgb(0xFC, 0x62, 0x55)),
    ("BLUE", Color::rgb(0x58, 0xC4, 0xDD)),
    ("YELLOW", Color::rgb(0xFF, 0xFF, 0x00)),
    ("GREEN", Color::rgb(0x83, 0xC1, 0x67)),
    ("ORANGE", Color::rgb(0xFF, 0x86, 0x2F)),
    ("PURPLE", Color::rgb(0x9A, 0x72, 0xAC)),
    ("PINK", Color::rgb(0xD1, 0x47, 0xBD)),
    ("TEAL", Color::rgb(0x5C, 0xD0, 0xB3)),
    ("GOLD", Color::rgb(0xF0, 0xAC, 0x5F)),
    ("MAROON", Color::rgb(0xC5, 0x5F, 0x73)),
    ("GRAY", Color::rgb(0x88, 0x88, 0x88)),
    ("GREY", Color::rgb(0x88, 0x88, 0x88)),
    ("WHITE", Color::rgb(0xFF, 0xFF, 0xFF)),
    ("BLACK", Color::rgb(0x00, 0x00, 0x00)),
];

impl Color {
    /// Opaque color from channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Color from channels including alpha.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    /// Parse a hex string or palette name.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        let upper = s.to_ascii_uppercase();
        if let Some((_, c)) = PALETTE.iter().find(|(name, _)| *name == upper) {
            return Ok(*c);
        }
        if (s.len() == 6 || s.len() == 8)
            && let Ok(c) = parse_hex(s)
        {
            return Ok(c);
        }
        Err(format!("unknown color \"{s}\""))
    }

    /// `#RRGGBB` for opaque colors, `#RRGGBBAA` otherwise.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    /// Channel-wise interpolation, `t` clamped to `[0, 1]`.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| -> u8 {
            lerp(f64::from(a), f64::from(b), t).round().clamp(0.0, 255.0) as u8
        };
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    pub(crate) fn to_cpu(self) -> vello_cpu::peniko::Color {
        vello_cpu::peniko::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

fn parse_hex(s: &str) -> Result<Color, String> {
    fn hex_byte(pair: &str) -> Result<u8, String> {
        u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
    }

    if !s.is_ascii() {
        return Err("hex color must be ASCII".to_owned());
    }
    match s.len() {
        6 => Ok(Color::rgb(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
        )),
        8 => Ok(Color::rgba(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
            hex_byte(&s[6..8])?,
        )),
        _ => Err("hex color must be #RRGGBB or #RRGGBBAA (case-insensitive)".to_owned()),
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Str(String),
            Arr(Vec<u8>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Str(s) => Color::parse(&s).map_err(serde::de::Error::custom),
            Repr::Arr(v) => match v.as_slice() {
                [r, g, b] => Ok(Color::rgb(*r, *g, *b)),
                [r, g, b, a] => Ok(Color::rgba(*r, *g, *b, *a)),
                _ => Err(serde::de::Error::custom(
                    "rgba array must have len 3 ([r,g,b]) or 4 ([r,g,b,a])",
                )),
            },
        }
    }
}
