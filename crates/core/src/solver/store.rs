//! Column state store: the six per-column channels of one grid
//!
//! | Channel | Contents |
//! |---|---|
//! | A | ground height, wet height |
//! | B | outflow flux toward -x, +x, -z, +z |
//! | C | fluid depth |
//! | D | color RGBA |
//! | E | emission, smoothness, metallic, viscosity |
//! | F | foam, custom 1..3 |
//!
//! Stages never write a channel they read. They return new buffers, and
//! [`ColumnStore::swap`] substitutes one, handing the previous buffer back.

use super::fields::ChannelBuffer;
use super::format::{ChannelFormats, TextureFormat};
use crate::core_types::{PixelRect, Texel};
use tracing::info;

/// Names one of the six channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Channel {
    pub const ALL: [Channel; 6] = [Channel::A, Channel::B, Channel::C, Channel::D, Channel::E, Channel::F];
}

/// New C, D, E and F buffers produced together by one stage
#[derive(Debug, Clone)]
pub struct FluidBuffers {
    pub depth: ChannelBuffer,
    pub color: ChannelBuffer,
    pub material: ChannelBuffer,
    pub foam: ChannelBuffer,
}

/// Owns the six channels of an activated grid, all with the same dimensions
#[derive(Debug, Clone)]
pub struct ColumnStore {
    width: usize,
    height: usize,
    a: ChannelBuffer,
    b: ChannelBuffer,
    c: ChannelBuffer,
    d: ChannelBuffer,
    e: ChannelBuffer,
    f: ChannelBuffer,
}

impl ColumnStore {
    /// Allocate zeroed channels
    #[must_use]
    pub fn allocate(width: usize, height: usize, formats: &ChannelFormats) -> Self {
        info!(
            "Allocating {}x{} column channels ({} bytes per column)",
            width,
            height,
            formats.a.bytes_per_texel()
                + formats.b.bytes_per_texel()
                + formats.c.bytes_per_texel()
                + formats.d.bytes_per_texel()
                + formats.e.bytes_per_texel()
                + formats.f.bytes_per_texel()
        );
        Self {
            width,
            height,
            a: ChannelBuffer::new(width, height, formats.a),
            b: ChannelBuffer::new(width, height, formats.b),
            c: ChannelBuffer::new(width, height, formats.c),
            d: ChannelBuffer::new(width, height, formats.d),
            e: ChannelBuffer::new(width, height, formats.e),
            f: ChannelBuffer::new(width, height, formats.f),
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
    pub fn full_rect(&self) -> PixelRect {
        PixelRect::full(self.width, self.height)
    }

    #[must_use]
    pub fn channel(&self, channel: Channel) -> &ChannelBuffer {
        match channel {
            Channel::A => &self.a,
            Channel::B => &self.b,
            Channel::C => &self.c,
            Channel::D => &self.d,
            Channel::E => &self.e,
            Channel::F => &self.f,
        }
    }

    pub(crate) fn channel_mut(&mut self, channel: Channel) -> &mut ChannelBuffer {
        match channel {
            Channel::A => &mut self.a,
            Channel::B => &mut self.b,
            Channel::C => &mut self.c,
            Channel::D => &mut self.d,
            Channel::E => &mut self.e,
            Channel::F => &mut self.f,
        }
    }

    /// Ground and wet heights
    #[must_use]
    pub fn a(&self) -> &ChannelBuffer {
        &self.a
    }

    /// Outflow fluxes
    #[must_use]
    pub fn b(&self) -> &ChannelBuffer {
        &self.b
    }

    /// Depth
    #[must_use]
    pub fn c(&self) -> &ChannelBuffer {
        &self.c
    }

    /// Color
    #[must_use]
    pub fn d(&self) -> &ChannelBuffer {
        &self.d
    }

    /// Emission, smoothness, metallic, viscosity
    #[must_use]
    pub fn e(&self) -> &ChannelBuffer {
        &self.e
    }

    /// Foam and custom data
    #[must_use]
    pub fn f(&self) -> &ChannelBuffer {
        &self.f
    }

    /// Substitute a channel, returning the buffer it replaces
    ///
    /// The incoming buffer keeps its own format, so a swap is also how a
    /// channel changes format.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` does not match the grid dimensions
    pub fn swap(&mut self, channel: Channel, buffer: ChannelBuffer) -> ChannelBuffer {
        assert!(
            buffer.width() == self.width && buffer.height() == self.height,
            "Channel dimensions must match the grid"
        );
        std::mem::replace(self.channel_mut(channel), buffer)
    }

    /// Substitute C, D, E and F together
    pub fn swap_fluids(&mut self, fluids: FluidBuffers) -> FluidBuffers {
        FluidBuffers {
            depth: self.swap(Channel::C, fluids.depth),
            color: self.swap(Channel::D, fluids.color),
            material: self.swap(Channel::E, fluids.material),
            foam: self.swap(Channel::F, fluids.foam),
        }
    }

    /// Reallocate a channel as zeros when its format differs from `format`
    ///
    /// Returns `true` if the channel was reallocated.
    pub fn ensure_format(&mut self, channel: Channel, format: TextureFormat) -> bool {
        if self.channel(channel).format() == format {
            return false;
        }
        info!("Reallocating channel {:?} as {:?}", channel, format);
        let (width, height) = (self.width, self.height);
        *self.channel_mut(channel) = ChannelBuffer::new(width, height, format);
        true
    }

    /// Overwrite a rectangle of one channel with a constant
    pub fn replace_rect(&mut self, channel: Channel, rect: PixelRect, value: Texel) {
        let texels = vec![value; rect.area()];
        self.channel_mut(channel).replace_rect(rect, &texels);
    }

    /// Overwrite a rectangle of one channel with row-major texels
    pub fn replace_rect_from(&mut self, channel: Channel, rect: PixelRect, texels: &[Texel]) {
        self.channel_mut(channel).replace_rect(rect, texels);
    }

    /// Overwrite ground and wet heights everywhere
    pub fn replace_heights(&mut self, ground: f32, wet: f32) {
        self.a.fill(Texel::new(ground, wet, 0.0, 0.0));
    }

    /// Overwrite depth, color, material and foam everywhere
    pub fn replace_fluids(&mut self, depth: f32, color: Texel, esmv: Texel, foam: f32) {
        self.c.fill(Texel::new(depth, 0.0, 0.0, 0.0));
        self.d.fill(color);
        self.e.fill(esmv);
        self.f.fill(Texel::new(foam, 0.0, 0.0, 0.0));
    }

    /// Zero every outflow flux
    pub fn replace_outflow(&mut self) {
        self.b.fill(Texel::zeros());
    }

    /// Sum of depth over the whole grid
    #[must_use]
    pub fn total_depth(&self) -> f32 {
        self.c.as_slice().iter().map(|t| t.x).sum()
    }

    /// Sum of depth inside a rectangle
    #[must_use]
    pub fn depth_in_rect(&self, rect: PixelRect) -> f32 {
        rect.pixels().map(|(x, y)| self.c.get(x, y).x).sum()
    }
}
