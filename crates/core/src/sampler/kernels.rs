//! CPU read kernels producing the texels a sample request stores
//!
//! Point samples read five texels at a fractional pixel position. Area
//! samples reduce one grid column strip (fixed x, a range of rows) to a
//! single texel.

use crate::core_types::{Mat4, MaskChannel, PixelRect, Point, ShapeMask, Texel, Transform, Vec3};
use crate::grid::GridLayout;
use crate::solver::ColumnStore;
use std::ops::Range;

/// Texels written per point sample
pub const POINT_TEXELS: usize = 5;

fn surface_at(store: &ColumnStore, x: f32, y: f32) -> f32 {
    store.a().sample_bilinear(x, y).x + store.c().sample_bilinear(x, y).x
}

/// Read a point sample at fractional pixel `(x, y)`
///
/// | Texel | Contents |
/// |---|---|
/// | 0 | velocity x, velocity z, ground height, wet height |
/// | 1 | world surface normal xyz, depth |
/// | 2 | color |
/// | 3 | emission, smoothness, metallic, viscosity |
/// | 4 | foam, custom 1..3 |
#[must_use]
pub fn point_texels(
    store: &ColumnStore,
    layout: &GridLayout,
    transform: &Transform,
    x: f32,
    y: f32,
) -> [Texel; POINT_TEXELS] {
    let a = store.a().sample_bilinear(x, y);
    let b = store.b().sample_bilinear(x, y);
    let depth = store.c().sample_bilinear(x, y).x;

    let separation = layout.column_separation();
    let dx = (surface_at(store, x + 1.0, y) - surface_at(store, x - 1.0, y)) / (2.0 * separation.x);
    let dz = (surface_at(store, x, y + 1.0) - surface_at(store, x, y - 1.0)) / (2.0 * separation.y);
    let normal = transform
        .transform_vector(&Vec3::new(-dx, 1.0, -dz))
        .try_normalize(1.0e-6)
        .unwrap_or_else(Vec3::y);

    [
        Texel::new(b.y - b.x, b.w - b.z, a.x, a.y),
        Texel::new(normal.x, normal.y, normal.z, depth),
        store.d().sample_bilinear(x, y),
        store.e().sample_bilinear(x, y),
        store.f().sample_bilinear(x, y),
    ]
}

/// Sum of depth inside a rectangle
#[must_use]
pub fn area_depth(store: &ColumnStore, rect: PixelRect) -> f32 {
    store.depth_in_rect(rect)
}

/// Footprint of an area sample
#[derive(Debug, Clone, Copy)]
pub struct AreaShape<'a> {
    /// World to footprint `(u, _, v)`
    pub matrix: Mat4,
    pub mask: Option<&'a ShapeMask>,
    pub channel: MaskChannel,
    /// Columns whose ground lies above this plane are skipped
    pub plane_normal: Vec3,
    pub plane_point: Vec3,
}

/// Reduce column `x` over `rows` to (total depth, deepest depth, deepest row, deepest ground)
///
/// Each column's depth is weighted by the shape mask at its footprint
/// position; columns outside the footprint count for nothing.
#[must_use]
pub fn area_column(store: &ColumnStore, layout: &GridLayout, shape: &AreaShape<'_>, x: usize, rows: Range<usize>) -> Texel {
    let mut total = 0.0;
    let mut deepest = 0.0;
    let mut deepest_row = 0.0;
    let mut deepest_ground = 0.0;

    for y in rows {
        let ground = store.a().get(x, y).x;
        let world = layout.column_world_position(x as f32, y as f32, ground);
        if shape.plane_normal.dot(&(world - shape.plane_point)) > 0.0 {
            continue;
        }
        let p = shape.matrix.transform_point(&Point::from(world));
        if !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.z) {
            continue;
        }
        let weight = shape.mask.map_or(1.0, |mask| mask.weight(p.x, p.z, shape.channel));
        let depth = store.c().get(x, y).x * weight;
        total += depth;
        if depth > deepest {
            deepest = depth;
            deepest_row = y as f32;
            deepest_ground = ground;
        }
    }

    Texel::new(total, deepest, deepest_row, deepest_ground)
}
