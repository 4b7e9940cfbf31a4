//! Key color and chroma parameter validation.
//!
//! Every value interpolated into an FFmpeg filter string comes through here.
//! Command builders only accept a [`ChromaKey`], which cannot be built
//! without passing both validators.

use std::fmt;

use crate::error::{MediaError, MediaResult};

/// Validate and normalize a hex color.
///
/// Accepts an optional leading `#` followed by exactly six hex digits in any
/// case. Returns the uppercase digits without the marker.
pub fn validate_color(input: &str) -> MediaResult<String> {
    let digits = input.strip_prefix('#').unwrap_or(input);

    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(MediaError::invalid_parameter(
            "hex",
            format!(
                "Invalid hex color format: {input}. Expected 6 hex characters (e.g., '00FF00')"
            ),
        ));
    }

    Ok(digits.to_ascii_uppercase())
}

/// Validate similarity and blend.
///
/// Both must be finite and inside `0.0..=1.0`.
pub fn validate_similarity_blend(similarity: f64, blend: f64) -> MediaResult<(f64, f64)> {
    Ok((
        check_unit_range("similarity", similarity)?,
        check_unit_range("blend", blend)?,
    ))
}

fn check_unit_range(field: &'static str, value: f64) -> MediaResult<f64> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(MediaError::invalid_parameter(
            field,
            format!("Invalid {field} value: {value}. Must be between 0.0 and 1.0"),
        ));
    }
    Ok(value)
}

/// Validated chroma-key parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromaKey {
    color: String,
    similarity: f64,
    blend: f64,
}

impl ChromaKey {
    /// Validate all three parameters.
    pub fn new(hex: &str, similarity: f64, blend: f64) -> MediaResult<Self> {
        let color = validate_color(hex)?;
        let (similarity, blend) = validate_similarity_blend(similarity, blend)?;
        Ok(Self {
            color,
            similarity,
            blend,
        })
    }

    /// Normalized uppercase hex color.
    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn similarity(&self) -> f64 {
        self.similarity
    }

    pub fn blend(&self) -> f64 {
        self.blend
    }

    /// The `chromakey` filter expression.
    pub fn filter(&self) -> String {
        format!(
            "chromakey=0x{}:{}:{}",
            self.color, self.similarity, self.blend
        )
    }
}

impl fmt::Display for ChromaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} (similarity={}, blend={})", self.color, self.similarity, self.blend)
    }
}
