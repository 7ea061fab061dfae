//! Channel storage formats and precision settings
//!
//! Every channel is computed in `f32` but stored at the precision its format
//! allows. Writing a texel quantizes it, so a channel never holds a value its
//! format could not represent.

use half::f16;
use serde::{Deserialize, Serialize};

/// Precision for channels holding unbounded values (heights, fluxes, depth)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FloatPrecision {
    Half,
    #[default]
    Full,
}

/// Precision for channels holding 0..1 values (color, material, foam)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Precision01 {
    #[default]
    Byte,
    Half,
    Full,
}

impl From<FloatPrecision> for Precision01 {
    fn from(value: FloatPrecision) -> Self {
        match value {
            FloatPrecision::Half => Self::Half,
            FloatPrecision::Full => Self::Full,
        }
    }
}

/// Number of custom values stored next to foam in channel F
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CustomDataType {
    #[default]
    None,
    One,
    Three,
}

/// Storage type of a single component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Unsigned normalized byte, 0..1 in steps of 1/255
    Byte,
    /// IEEE 754 binary16
    Half,
    /// IEEE 754 binary32
    Float,
}

impl ComponentKind {
    /// Size of one component in bytes
    #[must_use]
    pub const fn byte_size(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Float => 4,
        }
    }

    /// Round a value to what this component can store
    #[inline]
    #[must_use]
    pub fn quantize(self, value: f32) -> f32 {
        match self {
            Self::Byte => (value.clamp(0.0, 1.0) * 255.0).round() / 255.0,
            Self::Half => f16::from_f32(value).to_f32(),
            Self::Float => value,
        }
    }
}

/// Pixel format tag of a channel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    R8,
    RHalf,
    RFloat,
    RG16,
    RGHalf,
    RGFloat,
    ARGB32,
    ARGBHalf,
    ARGBFloat,
}

impl TextureFormat {
    /// Number of meaningful components (1, 2 or 4)
    #[must_use]
    pub const fn components(self) -> usize {
        match self {
            Self::R8 | Self::RHalf | Self::RFloat => 1,
            Self::RG16 | Self::RGHalf | Self::RGFloat => 2,
            Self::ARGB32 | Self::ARGBHalf | Self::ARGBFloat => 4,
        }
    }

    /// Storage type of each component
    #[must_use]
    pub const fn kind(self) -> ComponentKind {
        match self {
            Self::R8 | Self::RG16 | Self::ARGB32 => ComponentKind::Byte,
            Self::RHalf | Self::RGHalf | Self::ARGBHalf => ComponentKind::Half,
            Self::RFloat | Self::RGFloat | Self::ARGBFloat => ComponentKind::Float,
        }
    }

    /// Bytes used by one texel
    #[must_use]
    pub const fn bytes_per_texel(self) -> usize {
        self.components() * self.kind().byte_size()
    }

    /// Single-component format for a 0..1 precision
    #[must_use]
    pub const fn r(precision: Precision01) -> Self {
        match precision {
            Precision01::Byte => Self::R8,
            Precision01::Half => Self::RHalf,
            Precision01::Full => Self::RFloat,
        }
    }

    /// Two-component format for a 0..1 precision
    #[must_use]
    pub const fn rg(precision: Precision01) -> Self {
        match precision {
            Precision01::Byte => Self::RG16,
            Precision01::Half => Self::RGHalf,
            Precision01::Full => Self::RGFloat,
        }
    }

    /// Four-component format for a 0..1 precision
    #[must_use]
    pub const fn rgba(precision: Precision01) -> Self {
        match precision {
            Precision01::Byte => Self::ARGB32,
            Precision01::Half => Self::ARGBHalf,
            Precision01::Full => Self::ARGBFloat,
        }
    }

    /// Foam channel format, widened by the amount of custom data
    #[must_use]
    pub const fn foam(custom: CustomDataType, precision: Precision01) -> Self {
        match custom {
            CustomDataType::None => Self::r(precision),
            CustomDataType::One => Self::rg(precision),
            CustomDataType::Three => Self::rgba(precision),
        }
    }
}

/// Formats of the six column channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFormats {
    pub a: TextureFormat,
    pub b: TextureFormat,
    pub c: TextureFormat,
    pub d: TextureFormat,
    pub e: TextureFormat,
    pub f: TextureFormat,
}

impl ChannelFormats {
    /// Formats for the given per-channel precisions
    #[must_use]
    pub fn from_precisions(
        a: FloatPrecision,
        b: FloatPrecision,
        c: FloatPrecision,
        d: Precision01,
        e: Precision01,
        f: Precision01,
        custom: CustomDataType,
    ) -> Self {
        Self {
            a: TextureFormat::rg(a.into()),
            b: TextureFormat::rgba(b.into()),
            c: TextureFormat::r(c.into()),
            d: TextureFormat::rgba(d),
            e: TextureFormat::rgba(e),
            f: TextureFormat::foam(custom, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_quantization_clamps_and_rounds() {
        assert_eq!(ComponentKind::Byte.quantize(2.0), 1.0);
        assert_eq!(ComponentKind::Byte.quantize(-1.0), 0.0);
        assert_eq!(ComponentKind::Byte.quantize(0.5), 128.0 / 255.0);
    }

    #[test]
    fn test_half_quantization_keeps_exact_values() {
        assert_eq!(ComponentKind::Half.quantize(0.25), 0.25);
        assert!((ComponentKind::Half.quantize(0.1) - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_foam_format_follows_custom_data() {
        assert_eq!(TextureFormat::foam(CustomDataType::None, Precision01::Byte), TextureFormat::R8);
        assert_eq!(TextureFormat::foam(CustomDataType::One, Precision01::Half), TextureFormat::RGHalf);
        assert_eq!(
            TextureFormat::foam(CustomDataType::Three, Precision01::Full),
            TextureFormat::ARGBFloat
        );
    }

    #[test]
    fn test_default_channel_formats() {
        let formats = ChannelFormats::from_precisions(
            FloatPrecision::Full,
            FloatPrecision::Full,
            FloatPrecision::Full,
            Precision01::Byte,
            Precision01::Byte,
            Precision01::Byte,
            CustomDataType::None,
        );
        assert_eq!(formats.a, TextureFormat::RGFloat);
        assert_eq!(formats.b, TextureFormat::ARGBFloat);
        assert_eq!(formats.c, TextureFormat::RFloat);
        assert_eq!(formats.d, TextureFormat::ARGB32);
        assert_eq!(formats.f, TextureFormat::R8);
        assert_eq!(formats.d.bytes_per_texel(), 4);
    }
}
