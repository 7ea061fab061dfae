//! Modifier application over a grid's columns
//!
//! An apply runs in four steps:
//! 1. The modifier's world box is mapped to a pixel rectangle of the grid.
//! 2. The target channels are cropped to that rectangle as scratch buffers.
//! 3. The mode's pixel operation runs on every column whose center lies in the
//!    footprint, writing only into the scratch buffers.
//! 4. The scratch buffers are copied back, masked to those same columns.
//!
//! With depth monitoring enabled the rectangle's depth is summed before and
//! after, and the difference is reported as `pre - post`.

use super::ops::{ColumnTexels, ModifierInputs, PixelContext};
use super::Modifier;
use crate::core_types::{Bounds, Mat4, PixelRect, Point, Texel, Transform, Vec2, Vec3};
use crate::grid::GridLayout;
use crate::sampler::kernels::area_depth;
use crate::solver::{Channel, ChannelBuffer, ColumnStore};
use tracing::debug;

/// Matrices and bounds of a modifier, computed once per apply
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedModifier {
    world_bounds: Bounds,
    world_to_local: Mat4,
    /// World to footprint `(u, _, v)`, `None` for an empty footprint
    footprint: Option<Mat4>,
    range: Option<(f32, f32)>,
    yaw: f32,
}

impl PreparedModifier {
    #[must_use]
    pub fn new(modifier: &Modifier) -> Self {
        let world_to_local = modifier.transform.world_to_local();
        let local = modifier.local_bounds(false);
        let size = local.size();
        let min = local.min();

        let footprint = (size.x > 0.0 && size.z > 0.0).then(|| {
            Mat4::new_nonuniform_scaling(&Vec3::new(1.0 / size.x, 1.0, 1.0 / size.z))
                * Mat4::new_translation(&Vec3::new(-min.x, 0.0, -min.z))
                * world_to_local
        });
        let range = modifier
            .mode
            .has_range()
            .then_some((modifier.height_min, modifier.height_max));

        Self {
            world_bounds: modifier.world_bounds(),
            world_to_local,
            footprint,
            range,
            yaw: modifier.transform.yaw(),
        }
    }

    #[must_use]
    pub fn world_bounds(&self) -> &Bounds {
        &self.world_bounds
    }

    /// Footprint coordinates of a world point, when it lies inside
    fn footprint_uv(&self, world: &Vec3) -> Option<(f32, f32)> {
        let footprint = self.footprint.as_ref()?;
        let p = footprint.transform_point(&Point::from(*world));
        ((0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.z)).then_some((p.x, p.z))
    }

    fn local_height(&self, world: &Vec3) -> f32 {
        self.world_to_local.transform_point(&Point::from(*world)).y
    }
}

/// The grid a modifier is applied to
pub struct GridTarget<'a> {
    pub layout: &'a GridLayout,
    pub transform: &'a Transform,
    pub overflow: bool,
    pub store: &'a mut ColumnStore,
}

/// Outcome of an apply that touched the grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApplyReport {
    pub rect: PixelRect,
    /// Columns inside the footprint
    pub columns: usize,
    /// `pre - post` depth sum, when monitoring
    pub depth_delta: Option<f32>,
}

fn read_column(store: &ColumnStore, x: usize, y: usize) -> ColumnTexels {
    ColumnTexels {
        outflow: store.b().get(x, y),
        depth: store.c().get(x, y).x,
        color: store.d().get(x, y),
        esmv: store.e().get(x, y),
        foam: store.f().get(x, y),
    }
}

fn column_texel(column: &ColumnTexels, channel: Channel) -> Texel {
    match channel {
        Channel::B => column.outflow,
        Channel::C => Texel::new(column.depth, 0.0, 0.0, 0.0),
        Channel::D => column.color,
        Channel::E => column.esmv,
        Channel::F => column.foam,
        Channel::A => Texel::zeros(),
    }
}

/// Rotate a grid-plane vector by `angle` radians around up
fn rotate_xz(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos + v.y * sin, -v.x * sin + v.y * cos)
}

/// Force direction in grid space for one pixel
fn force_direction(modifier: &Modifier, relative_yaw: f32, u: f32, v: f32) -> Vec2 {
    if modifier.mode.is_uniform_force() {
        let angle = relative_yaw + modifier.angle.to_radians();
        return Vec2::new(angle.sin(), angle.cos());
    }
    let local = match &modifier.directions {
        Some(directions) => {
            let texel = directions.sample(u, v);
            Vec2::new(texel.x * 2.0 - 1.0, texel.y * 2.0 - 1.0)
        }
        None => Vec2::new(u - 0.5, v - 0.5).try_normalize(1.0e-6).unwrap_or_else(Vec2::zeros),
    };
    rotate_xz(local, relative_yaw)
}

/// Apply `modifier` to the grid once, scaled by `multiplier`
///
/// Returns `None` when nothing could change: a non-positive multiplier, zero
/// strength, an empty footprint, or a footprint outside the grid.
pub fn apply_to_grid(
    modifier: &Modifier,
    prepared: &PreparedModifier,
    multiplier: f32,
    target: GridTarget<'_>,
) -> Option<ApplyReport> {
    let multiplier = modifier.mode.effective_multiplier(multiplier);
    if multiplier <= 0.0 || modifier.strength == 0.0 || prepared.footprint.is_none() {
        return None;
    }

    let GridTarget {
        layout,
        transform,
        overflow,
        store,
    } = target;

    let rect = layout.pixel_rect(&prepared.world_bounds);
    if rect.is_empty() {
        debug!("{:?} modifier outside grid, skipped", modifier.mode);
        return None;
    }

    let monitor = modifier.should_monitor();
    let pre = monitor.then(|| area_depth(store, rect));

    let inputs = ModifierInputs {
        fluid: modifier.fluid,
        color: modifier.color,
        esmv: modifier.esmv,
        channels: modifier.channels,
        overflow,
    };
    let operation = modifier.mode.operation();
    let relative_yaw = prepared.yaw - transform.yaw();
    let strength = modifier.strength * multiplier;

    let mut scratch: Vec<(Channel, ChannelBuffer)> = modifier
        .mode
        .targets()
        .iter()
        .map(|&channel| (channel, store.channel(channel).crop(rect)))
        .collect();
    let mut inside = vec![false; rect.area()];

    for (i, (x, y)) in rect.pixels().enumerate() {
        let column = read_column(store, x, y);
        let ground = store.a().get(x, y).x;
        let ground_world = layout.column_world_position(x as f32, y as f32, ground);
        let Some((u, v)) = prepared.footprint_uv(&ground_world) else {
            continue;
        };

        let surface_world = layout.column_world_position(x as f32, y as f32, ground + column.depth.max(0.0));
        let surface_offset = prepared.local_height(&surface_world);
        if let Some((min, max)) = prepared.range {
            if surface_offset < min || surface_offset > max {
                continue;
            }
        }

        let weight = modifier
            .shape
            .as_ref()
            .map_or(1.0, |shape| shape.weight(u, v, modifier.shape_channel));
        let ctx = PixelContext {
            strength: strength * weight,
            surface_offset,
            ground_offset: prepared.local_height(&ground_world),
            direction: force_direction(modifier, relative_yaw, u, v),
        };

        let mut updated = column;
        operation(&mut updated, &ctx, &inputs);
        inside[i] = true;
        for (channel, buffer) in &mut scratch {
            buffer.set(x - rect.x, y - rect.y, column_texel(&updated, *channel));
        }
    }

    let columns = inside.iter().filter(|&&hit| hit).count();
    for (channel, buffer) in &scratch {
        store
            .channel_mut(*channel)
            .copy_back_masked(rect, buffer, |x, y| inside[(y - rect.y) * rect.width + (x - rect.x)]);
    }

    let depth_delta = pre.map(|pre| pre - area_depth(store, rect));
    Some(ApplyReport {
        rect,
        columns,
        depth_delta,
    })
}
