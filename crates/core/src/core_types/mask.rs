//! Soft shape masks sampled in normalized footprint space

use super::Texel;

/// Component of a mask texel used as the falloff weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskChannel {
    Red,
    Green,
    Blue,
    #[default]
    Alpha,
}

impl MaskChannel {
    /// Pick this component out of a texel
    #[must_use]
    pub fn pick(self, texel: &Texel) -> f32 {
        match self {
            Self::Red => texel.x,
            Self::Green => texel.y,
            Self::Blue => texel.z,
            Self::Alpha => texel.w,
        }
    }
}

/// Small RGBA image used as a footprint mask or direction map
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeMask {
    width: usize,
    height: usize,
    texels: Vec<Texel>,
}

impl ShapeMask {
    /// Create a mask from row-major texels
    ///
    /// Returns `None` when the texel count does not match the dimensions or
    /// either dimension is zero.
    #[must_use]
    pub fn new(width: usize, height: usize, texels: Vec<Texel>) -> Option<Self> {
        if width == 0 || height == 0 || texels.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            texels,
        })
    }

    /// Build a mask by evaluating `f(u, v)` at every texel center
    #[must_use]
    pub fn from_fn(width: usize, height: usize, f: impl Fn(f32, f32) -> Texel) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut texels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let u = (x as f32 + 0.5) / width as f32;
                let v = (y as f32 + 0.5) / height as f32;
                texels.push(f(u, v));
            }
        }
        Self {
            width,
            height,
            texels,
        }
    }

    /// Mask width in texels
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Mask height in texels
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Bilinear sample at normalized `(u, v)`, clamped to the edge texels
    #[must_use]
    pub fn sample(&self, u: f32, v: f32) -> Texel {
        let fx = (u * self.width as f32 - 0.5).clamp(0.0, (self.width - 1) as f32);
        let fy = (v * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let at = |x: usize, y: usize| self.texels[y * self.width + x];
        let top = at(x0, y0).lerp(&at(x1, y0), tx);
        let bottom = at(x0, y1).lerp(&at(x1, y1), tx);
        top.lerp(&bottom, ty)
    }

    /// Weight of `channel` at normalized `(u, v)`
    #[must_use]
    pub fn weight(&self, u: f32, v: f32, channel: MaskChannel) -> f32 {
        channel.pick(&self.sample(u, v))
    }
}
