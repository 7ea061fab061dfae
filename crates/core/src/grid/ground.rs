//! Ground heights for channel A
//!
//! Ground is found by casting straight down from `height_max` through every
//! column. Casts go through a [`HeightSource`], and results are written in
//! 64x64 chunks so a local change only rebuilds the chunks it touches.

use super::mapper::GridLayout;
use crate::core_types::{PixelRect, Point, Texel, Transform, Vec3};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

/// Columns per chunk side
pub const CHUNK_SIZE: usize = 64;

/// Keeps edge samples inside the outermost columns
const EDGE_EPSILON: f32 = 0.01;

/// Scene geometry that can be cast against from above
pub trait HeightSource: Send + Sync {
    /// Height of the first surface below `origin` within `max_distance`
    fn cast_down(&self, origin: &Vec3, max_distance: f32) -> Option<f32>;

    /// Downward cast of a sphere of `radius`
    ///
    /// The default takes the highest hit among the center and four points on
    /// the sphere's horizontal rim.
    fn cast_sphere_down(&self, origin: &Vec3, radius: f32, max_distance: f32) -> Option<f32> {
        let offsets = [
            Vec3::zeros(),
            Vec3::new(radius, 0.0, 0.0),
            Vec3::new(-radius, 0.0, 0.0),
            Vec3::new(0.0, 0.0, radius),
            Vec3::new(0.0, 0.0, -radius),
        ];
        offsets
            .iter()
            .filter_map(|offset| self.cast_down(&(origin + offset), max_distance))
            .reduce(f32::max)
    }
}

fn within_cast(origin: &Vec3, max_distance: f32, height: f32) -> Option<f32> {
    (height <= origin.y && height >= origin.y - max_distance).then_some(height)
}

/// Infinite horizontal plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatGround {
    pub height: f32,
}

impl FlatGround {
    #[must_use]
    pub fn new(height: f32) -> Self {
        Self { height }
    }
}

impl HeightSource for FlatGround {
    fn cast_down(&self, origin: &Vec3, max_distance: f32) -> Option<f32> {
        within_cast(origin, max_distance, self.height)
    }
}

/// Regular grid of world heights on the XZ plane
///
/// Sample `(i, j)` sits at `origin + (i, j) * cell_size`. Casts outside the
/// grid miss.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    origin_x: f32,
    origin_z: f32,
    cell_size: f32,
    nx: usize,
    nz: usize,
    heights: Vec<f32>,
}

impl HeightField {
    /// Create a height field from row-major samples
    ///
    /// # Panics
    ///
    /// Panics if `heights.len() != nx * nz`, or either axis has fewer than 2 samples
    #[must_use]
    pub fn new(origin_x: f32, origin_z: f32, cell_size: f32, nx: usize, nz: usize, heights: Vec<f32>) -> Self {
        assert_eq!(heights.len(), nx * nz, "Heightmap size mismatch");
        assert!(nx >= 2 && nz >= 2, "Heightmap needs at least 2x2 samples");
        Self {
            origin_x,
            origin_z,
            cell_size,
            nx,
            nz,
            heights,
        }
    }

    /// Query height at world (x, z) using bilinear interpolation
    #[must_use]
    pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        let gx = (x - self.origin_x) / self.cell_size;
        let gz = (z - self.origin_z) / self.cell_size;
        if !(gx >= 0.0 && gz >= 0.0 && gx <= (self.nx - 1) as f32 && gz <= (self.nz - 1) as f32) {
            return None;
        }

        let ix0 = (gx.floor() as usize).min(self.nx - 2);
        let iz0 = (gz.floor() as usize).min(self.nz - 2);
        let fx = gx - ix0 as f32;
        let fz = gz - iz0 as f32;

        let h00 = self.heights[iz0 * self.nx + ix0];
        let h10 = self.heights[iz0 * self.nx + ix0 + 1];
        let h01 = self.heights[(iz0 + 1) * self.nx + ix0];
        let h11 = self.heights[(iz0 + 1) * self.nx + ix0 + 1];

        let h0 = h00 * (1.0 - fx) + h10 * fx;
        let h1 = h01 * (1.0 - fx) + h11 * fx;
        Some(h0 * (1.0 - fz) + h1 * fz)
    }
}

impl HeightSource for HeightField {
    fn cast_down(&self, origin: &Vec3, max_distance: f32) -> Option<f32> {
        self.height_at(origin.x, origin.z)
            .and_then(|h| within_cast(origin, max_distance, h))
    }
}

/// Height source backed by a closure of world (x, z)
pub struct HeightFn<F>(pub F);

impl<F> HeightSource for HeightFn<F>
where
    F: Fn(f32, f32) -> Option<f32> + Send + Sync,
{
    fn cast_down(&self, origin: &Vec3, max_distance: f32) -> Option<f32> {
        (self.0)(origin.x, origin.z).and_then(|h| within_cast(origin, max_distance, h))
    }
}

/// FIFO of chunks waiting for a ground rebuild, without duplicates
#[derive(Debug, Clone, Default)]
pub struct DirtyChunks {
    queue: VecDeque<(usize, usize)>,
    queued: FxHashSet<(usize, usize)>,
}

impl DirtyChunks {
    /// Queue a chunk unless it is already waiting
    pub fn push(&mut self, chunk: (usize, usize)) {
        if self.queued.insert(chunk) {
            self.queue.push_back(chunk);
        }
    }

    /// Oldest queued chunk
    pub fn pop(&mut self) -> Option<(usize, usize)> {
        let chunk = self.queue.pop_front()?;
        self.queued.remove(&chunk);
        Some(chunk)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.queued.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Chunks per axis needed to cover the grid
#[must_use]
pub fn chunk_count(layout: &GridLayout) -> (usize, usize) {
    let (width, height) = layout.column_count();
    (width.div_ceil(CHUNK_SIZE), height.div_ceil(CHUNK_SIZE))
}

/// Pixel rectangle of a chunk, clipped to the grid
#[must_use]
pub fn chunk_rect(layout: &GridLayout, chunk: (usize, usize)) -> PixelRect {
    let (width, height) = layout.column_count();
    let x = (chunk.0 * CHUNK_SIZE).min(width);
    let y = (chunk.1 * CHUNK_SIZE).min(height);
    PixelRect::new(x, y, (x + CHUNK_SIZE).min(width) - x, (y + CHUNK_SIZE).min(height) - y)
}

/// Chunks touched by a world-space circle, clipped to the grid
#[must_use]
pub fn chunks_in_radius(
    layout: &GridLayout,
    transform: &Transform,
    world_center: &Vec3,
    world_radius: f32,
) -> Vec<(usize, usize)> {
    let corner = (transform.right() + transform.forward()) * world_radius;
    let a = layout.world_point_to_pixel(&(world_center - corner));
    let b = layout.world_point_to_pixel(&(world_center + corner));
    let (chunks_x, chunks_z) = chunk_count(layout);

    let chunk_index = |v: f32, count: usize| -> Option<isize> {
        let index = (v / CHUNK_SIZE as f32).floor();
        index.is_finite().then(|| (index as isize).clamp(-1, count as isize))
    };
    let (Some(min_x), Some(max_x), Some(min_z), Some(max_z)) = (
        chunk_index(a.x.min(b.x), chunks_x),
        chunk_index(a.x.max(b.x), chunks_x),
        chunk_index(a.y.min(b.y), chunks_z),
        chunk_index(a.y.max(b.y), chunks_z),
    ) else {
        return Vec::new();
    };

    let mut chunks = Vec::new();
    for z in min_z.max(0)..=max_z.min(chunks_z as isize - 1) {
        for x in min_x.max(0)..=max_x.min(chunks_x as isize - 1) {
            chunks.push((x as usize, z as usize));
        }
    }
    chunks
}

/// Settings used while casting ground
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundCast {
    pub height_min: f32,
    pub height_max: f32,
    /// Sphere radius in columns (0 casts a ray)
    pub height_radius: f32,
    pub table_depth: f32,
}

/// Cast every column of a chunk, returning its rect and row-major (ground, wet) texels
///
/// Misses, or a missing source, write `height_min`. Wet height resets to
/// `-table_depth`.
#[must_use]
pub fn build_chunk(
    layout: &GridLayout,
    transform: &Transform,
    source: Option<&dyn HeightSource>,
    cast: &GroundCast,
    chunk: (usize, usize),
) -> (PixelRect, Vec<Texel>) {
    let rect = chunk_rect(layout, chunk);
    let (width, height) = layout.column_count();
    let separation = layout.column_separation();

    let mut corner = transform.transform_point(&Point::from(layout.column_min())).coords;
    corner.y = cast.height_max;
    let step_x = transform.transform_vector(&Vec3::new(separation.x, 0.0, 0.0));
    let step_z = transform.transform_vector(&Vec3::new(0.0, 0.0, separation.y));
    let clamp_x = (width - 1) as f32 - EDGE_EPSILON;
    let clamp_z = (height - 1) as f32 - EDGE_EPSILON;
    let radius = step_x.norm() * cast.height_radius;
    let max_distance = cast.height_max - cast.height_min;

    let texels = rect
        .pixels()
        .map(|(x, z)| {
            let ground = source
                .and_then(|source| {
                    let origin = corner
                        + step_x * (x as f32).clamp(EDGE_EPSILON, clamp_x)
                        + step_z * (z as f32).clamp(EDGE_EPSILON, clamp_z);
                    if radius == 0.0 {
                        source.cast_down(&origin, max_distance)
                    } else {
                        source.cast_sphere_down(&origin, radius, max_distance)
                    }
                })
                .unwrap_or(cast.height_min);
            Texel::new(ground, -cast.table_depth, 0.0, 0.0)
        })
        .collect();

    (rect, texels)
}
