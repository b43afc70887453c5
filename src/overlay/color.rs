use std::fmt;

use crate::error::{OverlayError, OverlayResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Accepts `#RRGGBB` or `#RGB`, with or without the leading `#`.
    ///
    /// Caller colors are validated up front in every color mode, so a malformed
    /// value fails the call before any decoding happens.
    pub fn parse_hex(value: &str) -> OverlayResult<Self> {
        let invalid = || {
            OverlayError::render(format!(
                "style color '{}' is not a #RRGGBB or #RGB hex value",
                value
            ))
        };
        let raw = value.trim();
        let hex = raw.strip_prefix('#').unwrap_or(raw);
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let expanded = match hex.len() {
            3 => hex.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
            6 => hex.to_string(),
            _ => return Err(invalid()),
        };
        let channel =
            |idx: usize| u8::from_str_radix(&expanded[idx..idx + 2], 16).map_err(|_| invalid());
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn complement(self) -> Self {
        Self::new(255 - self.r, 255 - self.g, 255 - self.b)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A color with straight alpha, written out as separate SVG color/opacity attributes.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Rgba {
    pub rgb: Rgb,
    pub alpha: f32,
}

impl Rgba {
    pub fn new(rgb: Rgb, alpha: f32) -> Self {
        Self {
            rgb,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }
}
