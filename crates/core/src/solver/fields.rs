//! Channel buffers holding per-column data
//!
//! A channel is a 2D grid of four-component texels stored in row-major order.
//! The [`TextureFormat`] decides how many components are meaningful and at what
//! precision they are kept. Components the format does not carry always read
//! back as zero.

use super::format::TextureFormat;
use crate::core_types::{PixelRect, Texel};

/// Channel data container
///
/// Stores texels as a flat `Vec<Texel>` in row-major order (y * width + x).
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBuffer {
    data: Vec<Texel>,
    width: usize,
    height: usize,
    format: TextureFormat,
}

impl ChannelBuffer {
    /// Create a new channel with given dimensions, initialized to zero
    ///
    /// # Arguments
    ///
    /// * `width` - Grid width in columns
    /// * `height` - Grid height in columns
    /// * `format` - Storage format
    ///
    /// # Returns
    ///
    /// New channel initialized to all zeros
    #[must_use]
    pub fn new(width: usize, height: usize, format: TextureFormat) -> Self {
        Self {
            data: vec![Texel::zeros(); width * height],
            width,
            height,
            format,
        }
    }

    /// Create a new channel with every texel set to `value` (quantized)
    #[must_use]
    pub fn with_value(width: usize, height: usize, format: TextureFormat, value: Texel) -> Self {
        let value = quantize(format, value);
        Self {
            data: vec![value; width * height],
            width,
            height,
            format,
        }
    }

    /// Build a channel from computed texels, quantizing each one
    ///
    /// # Panics
    ///
    /// Panics if `texels.len() != width * height`
    #[must_use]
    pub fn from_texels(width: usize, height: usize, format: TextureFormat, mut texels: Vec<Texel>) -> Self {
        assert_eq!(texels.len(), width * height, "Texel count does not match dimensions");
        for texel in &mut texels {
            *texel = quantize(format, *texel);
        }
        Self {
            data: texels,
            width,
            height,
            format,
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Get reference to channel data
    #[must_use]
    pub fn as_slice(&self) -> &[Texel] {
        &self.data
    }

    /// Consume the channel and return its texels
    #[must_use]
    pub fn into_texels(self) -> Vec<Texel> {
        self.data
    }

    /// Whether (x, y) lies inside the channel
    #[inline]
    #[must_use]
    pub fn contains(&self, x: isize, y: isize) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Get texel at grid position
    ///
    /// # Arguments
    ///
    /// * `x` - X coordinate (0 to width-1)
    /// * `y` - Y coordinate (0 to height-1)
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Texel {
        assert!(
            x < self.width && y < self.height,
            "Coordinates out of bounds"
        );
        self.data[y * self.width + x]
    }

    /// Get texel with coordinates clamped to the channel edges
    #[inline]
    #[must_use]
    pub fn get_clamped(&self, x: isize, y: isize) -> Texel {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.data[y * self.width + x]
    }

    /// Bilinear sample at a fractional pixel position, clamped at the edges
    ///
    /// Pixel (x, y) is centered on integer coordinates. NaN reads the first
    /// row or column.
    #[must_use]
    pub fn sample_bilinear(&self, x: f32, y: f32) -> Texel {
        if self.data.is_empty() {
            return Texel::zeros();
        }
        let x = clamp_coordinate(x, self.width);
        let y = clamp_coordinate(y, self.height);
        let x0 = x.floor();
        let y0 = y.floor();
        let tx = x - x0;
        let ty = y - y0;
        let (ix, iy) = (x0 as isize, y0 as isize);

        let top = self.get_clamped(ix, iy).lerp(&self.get_clamped(ix + 1, iy), tx);
        let bottom = self.get_clamped(ix, iy + 1).lerp(&self.get_clamped(ix + 1, iy + 1), tx);
        top.lerp(&bottom, ty)
    }

    /// Set texel at grid position, quantized to the channel format
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: Texel) {
        assert!(
            x < self.width && y < self.height,
            "Coordinates out of bounds"
        );
        self.data[y * self.width + x] = quantize(self.format, value);
    }

    /// Fill entire channel with a value
    pub fn fill(&mut self, value: Texel) {
        self.data.fill(quantize(self.format, value));
    }

    /// Copy a sub-rectangle into a new channel of the same format
    ///
    /// # Panics
    ///
    /// Panics if the rectangle does not fit inside the channel
    #[must_use]
    pub fn crop(&self, rect: PixelRect) -> Self {
        assert!(
            rect.x_max() <= self.width && rect.y_max() <= self.height,
            "Rectangle out of bounds"
        );
        let mut data = Vec::with_capacity(rect.area());
        for y in rect.y..rect.y_max() {
            let row = y * self.width;
            data.extend_from_slice(&self.data[row + rect.x..row + rect.x_max()]);
        }
        Self {
            data,
            width: rect.width,
            height: rect.height,
            format: self.format,
        }
    }

    /// Write `source` back at the rectangle origin, only where `mask(x, y)` holds
    ///
    /// `x` and `y` passed to the mask are channel coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `source` does not match the rectangle size or the rectangle
    /// does not fit inside the channel
    pub fn copy_back_masked<M>(&mut self, rect: PixelRect, source: &Self, mask: M)
    where
        M: Fn(usize, usize) -> bool,
    {
        assert!(
            source.width == rect.width && source.height == rect.height,
            "Source does not match rectangle"
        );
        assert!(
            rect.x_max() <= self.width && rect.y_max() <= self.height,
            "Rectangle out of bounds"
        );
        for (x, y) in rect.pixels() {
            if mask(x, y) {
                self.data[y * self.width + x] =
                    quantize(self.format, source.data[(y - rect.y) * source.width + (x - rect.x)]);
            }
        }
    }

    /// Overwrite a rectangle with row-major texels
    ///
    /// # Panics
    ///
    /// Panics if `texels.len() != rect.area()` or the rectangle does not fit
    pub fn replace_rect(&mut self, rect: PixelRect, texels: &[Texel]) {
        assert_eq!(texels.len(), rect.area(), "Texel count does not match rectangle");
        assert!(
            rect.x_max() <= self.width && rect.y_max() <= self.height,
            "Rectangle out of bounds"
        );
        for (i, (x, y)) in rect.pixels().enumerate() {
            self.data[y * self.width + x] = quantize(self.format, texels[i]);
        }
    }

    /// Same channel contents re-quantized into another format
    #[must_use]
    pub fn converted(&self, format: TextureFormat) -> Self {
        Self::from_texels(self.width, self.height, format, self.data.clone())
    }
}

/// Round a texel to what `format` can store, zeroing missing components
#[inline]
#[must_use]
pub fn quantize(format: TextureFormat, value: Texel) -> Texel {
    let kind = format.kind();
    let components = format.components();
    Texel::from_fn(|i, _| {
        if i < components {
            kind.quantize(value[i])
        } else {
            0.0
        }
    })
}

/// Keep a sample coordinate inside `[0, size - 1]` before it is cast
#[inline]
fn clamp_coordinate(value: f32, size: usize) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, size.saturating_sub(1) as f32)
    }
}
