//! RGB colors and background key estimates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from the first three bytes of an `rgb24` buffer.
    pub fn from_rgb24(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [r, g, b, ..] => Some(Self::new(*r, *g, *b)),
            _ => None,
        }
    }

    /// Uppercase hex encoding without a leading `#`.
    pub fn to_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

/// Result of background color estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KeyEstimate {
    /// Normalized hex color (uppercase, no marker)
    pub hex: String,
    pub rgb: Rgb,
    /// Number of samples that actually succeeded
    pub samples: usize,
}

impl KeyEstimate {
    pub fn new(rgb: Rgb, samples: usize) -> Self {
        Self {
            hex: rgb.to_hex(),
            rgb,
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_encoding() {
        assert_eq!(Rgb::new(0, 255, 0).to_hex(), "00FF00");
        assert_eq!(Rgb::new(10, 200, 10).to_hex(), "0AC80A");
    }

    #[test]
    fn test_from_rgb24() {
        assert_eq!(Rgb::from_rgb24(&[1, 2, 3, 4]), Some(Rgb::new(1, 2, 3)));
        assert_eq!(Rgb::from_rgb24(&[1, 2]), None);
        assert_eq!(Rgb::from_rgb24(&[]), None);
    }
}
