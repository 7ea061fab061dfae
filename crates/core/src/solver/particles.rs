//! Particle pool and particle sub-stepper
//!
//! Particles live in six `limit x 1` channels mirroring the grid layout:
//! A = (velocity, age), B = (position, life), C = depth, D = color,
//! E = material, F = foam/custom. A particle is live while `age < life`.
//! When a live particle falls to the fluid surface it deposits its fluid into
//! the column below it and is retired.

use super::fields::ChannelBuffer;
use super::format::TextureFormat;
use super::store::{Channel, ColumnStore, FluidBuffers};
use crate::core_types::{Texel, Vec3};
use crate::grid::GridLayout;
use tracing::info;

/// Everything stored for one particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleState {
    pub velocity: Vec3,
    pub age: f32,
    pub position: Vec3,
    pub life: f32,
    pub depth: f32,
    pub color: Texel,
    pub esmv: Texel,
    /// Foam followed by custom data
    pub foam: Texel,
}

impl ParticleState {
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.age < self.life
    }
}

/// Fixed-capacity ring of particles
#[derive(Debug, Clone)]
pub struct ParticlePool {
    limit: usize,
    next: usize,
    a: ChannelBuffer,
    b: ChannelBuffer,
    c: ChannelBuffer,
    d: ChannelBuffer,
    e: ChannelBuffer,
    f: ChannelBuffer,
}

impl ParticlePool {
    /// Allocate an empty pool; fluid channels share the grid's C..F formats
    #[must_use]
    pub fn allocate(limit: usize, store: &ColumnStore) -> Self {
        info!("Allocating particle pool with {} slots", limit);
        Self {
            limit,
            next: 0,
            a: ChannelBuffer::new(limit, 1, TextureFormat::ARGBFloat),
            b: ChannelBuffer::new(limit, 1, TextureFormat::ARGBFloat),
            c: ChannelBuffer::new(limit, 1, store.c().format()),
            d: ChannelBuffer::new(limit, 1, store.d().format()),
            e: ChannelBuffer::new(limit, 1, store.e().format()),
            f: ChannelBuffer::new(limit, 1, store.f().format()),
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slot the next [`add`](Self::add) will overwrite
    #[must_use]
    pub fn next_slot(&self) -> usize {
        self.next
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

    fn channel_mut(&mut self, channel: Channel) -> &mut ChannelBuffer {
        match channel {
            Channel::A => &mut self.a,
            Channel::B => &mut self.b,
            Channel::C => &mut self.c,
            Channel::D => &mut self.d,
            Channel::E => &mut self.e,
            Channel::F => &mut self.f,
        }
    }

    /// Substitute a particle channel, returning the buffer it replaces
    ///
    /// # Panics
    ///
    /// Panics if `buffer` is not `limit x 1`
    pub fn swap(&mut self, channel: Channel, buffer: ChannelBuffer) -> ChannelBuffer {
        assert!(
            buffer.width() == self.limit && buffer.height() == 1,
            "Particle channel dimensions must match the pool"
        );
        std::mem::replace(self.channel_mut(channel), buffer)
    }

    /// Reallocate a channel as zeros when its format differs
    pub fn ensure_format(&mut self, channel: Channel, format: TextureFormat) -> bool {
        if self.channel(channel).format() == format {
            return false;
        }
        let limit = self.limit;
        *self.channel_mut(channel) = ChannelBuffer::new(limit, 1, format);
        true
    }

    /// Write a particle into the next slot, replacing whatever was there
    ///
    /// Returns the slot written. The slot index then advances, wrapping at
    /// the pool limit.
    pub fn add(&mut self, particle: &ParticleState) -> usize {
        let slot = self.next;
        self.write(slot, particle);
        self.next = (self.next + 1) % self.limit;
        slot
    }

    fn write(&mut self, slot: usize, p: &ParticleState) {
        self.a.set(slot, 0, Texel::new(p.velocity.x, p.velocity.y, p.velocity.z, p.age));
        self.b.set(slot, 0, Texel::new(p.position.x, p.position.y, p.position.z, p.life));
        self.c.set(slot, 0, Texel::new(p.depth, 0.0, 0.0, 0.0));
        self.d.set(slot, 0, p.color);
        self.e.set(slot, 0, p.esmv);
        self.f.set(slot, 0, p.foam);
    }

    /// Read back one slot
    ///
    /// # Panics
    ///
    /// Panics if `slot >= limit`
    #[must_use]
    pub fn get(&self, slot: usize) -> ParticleState {
        let a = self.a.get(slot, 0);
        let b = self.b.get(slot, 0);
        ParticleState {
            velocity: a.xyz(),
            age: a.w,
            position: b.xyz(),
            life: b.w,
            depth: self.c.get(slot, 0).x,
            color: self.d.get(slot, 0),
            esmv: self.e.get(slot, 0),
            foam: self.f.get(slot, 0),
        }
    }

    /// Number of live particles
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.a
            .as_slice()
            .iter()
            .zip(self.b.as_slice())
            .filter(|(a, b)| a.w < b.w)
            .count()
    }
}

/// Result of the contribute pass
#[derive(Debug, Clone)]
pub struct Contribution {
    /// New grid C..F with landed particles deposited
    pub fluids: FluidBuffers,
    /// New particle B with landed particles retired
    pub positions: ChannelBuffer,
    /// New particle C with landed particles emptied
    pub depths: ChannelBuffer,
    /// Particles deposited this pass
    pub landed: usize,
}

/// Deposit every live particle at or below the fluid surface into its column
///
/// The first pass accumulates deposits in slot order into copies of the grid
/// channels. The second pass re-reads every particle against the deposited
/// columns: landed particles are retired, and a surviving particle the raised
/// surface has overtaken is lifted onto it so it lands on the next pass.
#[must_use]
pub fn contribute(pool: &ParticlePool, store: &ColumnStore, layout: &GridLayout) -> Contribution {
    let (width, height) = (store.width(), store.height());
    let a = store.a().as_slice();
    let mut depth = store.c().as_slice().to_vec();
    let mut color = store.d().as_slice().to_vec();
    let mut material = store.e().as_slice().to_vec();
    let mut foam = store.f().as_slice().to_vec();
    let mut landed_slots = vec![false; pool.limit];

    for slot in 0..pool.limit {
        let particle = pool.get(slot);
        if !particle.is_live() || particle.depth <= 0.0 {
            continue;
        }
        let Some(idx) = column_index(layout, &particle.position, width, height) else {
            continue;
        };
        let surface = a[idx].x + depth[idx].x;
        if particle.position.y > surface {
            continue;
        }

        let old = depth[idx].x.max(0.0);
        let total = old + particle.depth;
        color[idx] = (color[idx] * old + particle.color * particle.depth) / total;
        material[idx] = (material[idx] * old + particle.esmv * particle.depth) / total;
        foam[idx] = (foam[idx] * old + particle.foam * particle.depth) / total;
        depth[idx].x += particle.depth;
        landed_slots[slot] = true;
    }

    let mut positions = pool.b.as_slice().to_vec();
    let mut depths = pool.c.as_slice().to_vec();
    for (slot, landed) in landed_slots.iter().enumerate() {
        if *landed {
            positions[slot].w = 0.0;
            depths[slot].x = 0.0;
            continue;
        }
        let particle = pool.get(slot);
        if !particle.is_live() || particle.depth <= 0.0 {
            continue;
        }
        if let Some(idx) = column_index(layout, &particle.position, width, height) {
            let surface = a[idx].x + depth[idx].x;
            if positions[slot].y < surface {
                positions[slot].y = surface;
            }
        }
    }
    let landed = landed_slots.iter().filter(|l| **l).count();

    Contribution {
        fluids: FluidBuffers {
            depth: ChannelBuffer::from_texels(width, height, store.c().format(), depth),
            color: ChannelBuffer::from_texels(width, height, store.d().format(), color),
            material: ChannelBuffer::from_texels(width, height, store.e().format(), material),
            foam: ChannelBuffer::from_texels(width, height, store.f().format(), foam),
        },
        positions: ChannelBuffer::from_texels(pool.limit, 1, pool.b.format(), positions),
        depths: ChannelBuffer::from_texels(pool.limit, 1, pool.c.format(), depths),
        landed,
    }
}

/// Flat index of the column under `position`, if it lies inside the grid
fn column_index(layout: &GridLayout, position: &Vec3, width: usize, height: usize) -> Option<usize> {
    let pixel = layout.world_point_to_pixel(position);
    let (px, py) = (pixel.x.round(), pixel.y.round());
    if px >= 0.0 && py >= 0.0 && px < width as f32 && py < height as f32 {
        Some(py as usize * width + px as usize)
    } else {
        None
    }
}

/// Velocity retained after `delta` seconds for a per-second drag
///
/// The drag factor is `1 - (1 - drag)^delta`; the velocity keeps the rest.
#[inline]
#[must_use]
pub fn drag_retention(drag: f32, delta: f32) -> f32 {
    let factor = 1.0 - (1.0 - drag.clamp(0.0, 1.0)).powf(delta);
    1.0 - factor
}

/// New particle A after gravity and drag; live particles also age
#[must_use]
pub fn integrate_forces(pool: &ParticlePool, delta: f32, gravity: &Vec3, drag: f32) -> ChannelBuffer {
    let retain = drag_retention(drag, delta);
    let texels = pool
        .a
        .as_slice()
        .iter()
        .zip(pool.b.as_slice())
        .map(|(a, b)| {
            if a.w < b.w {
                let velocity = (a.xyz() + gravity * delta) * retain;
                Texel::new(velocity.x, velocity.y, velocity.z, a.w + delta)
            } else {
                *a
            }
        })
        .collect();
    ChannelBuffer::from_texels(pool.limit, 1, pool.a.format(), texels)
}

/// New particle B with live particles moved along their velocity
#[must_use]
pub fn integrate_motion(pool: &ParticlePool, delta: f32) -> ChannelBuffer {
    let texels = pool
        .a
        .as_slice()
        .iter()
        .zip(pool.b.as_slice())
        .map(|(a, b)| {
            if a.w < b.w {
                let position = b.xyz() + a.xyz() * delta;
                Texel::new(position.x, position.y, position.z, b.w)
            } else {
                *b
            }
        })
        .collect();
    ChannelBuffer::from_texels(pool.limit, 1, pool.b.format(), texels)
}
