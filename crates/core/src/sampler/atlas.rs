//! Shared scratch atlas that sample requests write into

use crate::core_types::Texel;

pub const ATLAS_WIDTH: usize = 256;
pub const ATLAS_HEIGHT: usize = 256;

/// Fixed-size RGBA f32 scratch image filled front to back
#[derive(Debug, Clone)]
pub struct SampleAtlas {
    texels: Vec<Texel>,
    used: usize,
}

impl Default for SampleAtlas {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleAtlas {
    #[must_use]
    pub fn new() -> Self {
        Self {
            texels: vec![Texel::zeros(); ATLAS_WIDTH * ATLAS_HEIGHT],
            used: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.texels.len()
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.used
    }

    /// Store `values` in the next free pixels and return their positions
    ///
    /// Returns `None`, writing nothing, when they do not all fit.
    pub fn write(&mut self, values: &[Texel]) -> Option<Vec<(u16, u16)>> {
        if values.len() > self.remaining() {
            return None;
        }
        let pixels = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let index = self.used + i;
                self.texels[index] = *value;
                ((index % ATLAS_WIDTH) as u16, (index / ATLAS_WIDTH) as u16)
            })
            .collect();
        self.used += values.len();
        Some(pixels)
    }

    /// Copy of the whole atlas; allocation restarts at the first pixel
    pub fn take_batch(&mut self) -> Vec<Texel> {
        self.used = 0;
        self.texels.clone()
    }
}

/// Texel at atlas pixel `(x, y)` of a batch copy, zero when missing
#[must_use]
pub fn batch_texel(batch: &[Texel], pixel: (u16, u16)) -> Texel {
    batch
        .get(pixel.0 as usize + pixel.1 as usize * ATLAS_WIDTH)
        .copied()
        .unwrap_or_else(Texel::zeros)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixels_fill_rows() {
        let mut atlas = SampleAtlas::new();
        let first = atlas.write(&vec![Texel::zeros(); ATLAS_WIDTH - 1]).unwrap();
        assert_eq!(first.last(), Some(&(254, 0)));
        let second = atlas.write(&[Texel::new(1.0, 2.0, 3.0, 4.0); 2]).unwrap();
        assert_eq!(second, vec![(255, 0), (0, 1)]);

        let batch = atlas.take_batch();
        assert_eq!(batch_texel(&batch, (0, 1)).y, 2.0);
        assert_eq!(atlas.used(), 0);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let mut atlas = SampleAtlas::new();
        assert!(atlas.write(&vec![Texel::zeros(); ATLAS_WIDTH * ATLAS_HEIGHT - 3]).is_some());
        assert!(atlas.write(&[Texel::zeros(); 4]).is_none());
        assert_eq!(atlas.remaining(), 3);
        assert!(atlas.write(&[Texel::zeros(); 3]).is_some());
    }
}
