//! World, pixel and normalized coordinate mapping for a column grid
//!
//! Pixel space puts column `(i, j)` at `(i, j)` with the third axis holding the
//! negated local height. Coordinate space is pixel space divided by
//! `column_count - 1`, so the grid spans 0..1 on both axes.

use crate::core_types::{Bounds, Mat4, PixelRect, Point, Transform, Vec2, Vec3};
use crate::simulation::SimulationConfig;

/// Column counts the config would produce, before activation
///
/// `round(size / separation * sqrt(resolution)) + 1` per axis, capped at
/// `max_texture_size`. Values below 2 mean the grid cannot activate.
#[must_use]
pub fn estimated_column_count(config: &SimulationConfig) -> (i64, i64) {
    let detail = config.resolution.max(0.0).sqrt();
    let max = config.max_texture_size as i64;
    let estimate = |size: f32| -> i64 {
        let columns = (size / config.separation * detail).round();
        if columns.is_finite() {
            (columns as i64 + 1).min(max)
        } else {
            0
        }
    };
    (estimate(config.size.x), estimate(config.size.z))
}

/// Local-space box covered by the columns and the height range
#[must_use]
pub fn local_bounds(config: &SimulationConfig) -> Bounds {
    let mut size = Vec3::zeros();
    if config.stretch {
        size.x = config.size.x;
        size.z = config.size.z;
    } else {
        let (ecc_x, ecc_z) = estimated_column_count(config);
        let step = config.separation / config.resolution.sqrt();
        size.x = (ecc_x - 1) as f32 * step;
        size.z = (ecc_z - 1) as f32 * step;
    }

    let mut center = if config.center { Vec3::zeros() } else { size * 0.5 };
    center.y = (config.height_min + config.height_max) * 0.5;
    size.y = config.height_max - config.height_min;

    Bounds::from_center_size(center, size)
}

/// Axis swap taking (x, y, z) to (x, z, -y)
fn pixel_rotation() -> Mat4 {
    Mat4::new(
        1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, -1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Fixed column layout of an activated grid plus its current matrices
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    column_count: (usize, usize),
    column_min: Vec3,
    column_max: Vec3,
    column_separation: Vec2,
    world_to_pixel: Mat4,
    pixel_to_world: Mat4,
    world_to_coord: Mat4,
    coord_to_world: Mat4,
}

impl GridLayout {
    /// Lay out columns for `config`, or `None` when fewer than 2 columns fit on an axis
    #[must_use]
    pub fn new(config: &SimulationConfig, transform: &Transform) -> Option<Self> {
        let (ecc_x, ecc_z) = estimated_column_count(config);
        if ecc_x <= 1 || ecc_z <= 1 {
            return None;
        }

        let bounds = local_bounds(config);
        let min = bounds.min();
        let max = bounds.max();
        let column_min = Vec3::new(min.x, 0.0, min.z);
        let column_max = Vec3::new(max.x, 0.0, max.z);
        let column_separation = Vec2::new(
            (column_max.x - column_min.x) / (ecc_x - 1) as f32,
            (column_max.z - column_min.z) / (ecc_z - 1) as f32,
        );

        let mut layout = Self {
            column_count: (ecc_x as usize, ecc_z as usize),
            column_min,
            column_max,
            column_separation,
            world_to_pixel: Mat4::identity(),
            pixel_to_world: Mat4::identity(),
            world_to_coord: Mat4::identity(),
            coord_to_world: Mat4::identity(),
        };
        layout.update_matrices(transform);
        Some(layout)
    }

    /// Recompute the four matrices for the transform's current placement
    pub fn update_matrices(&mut self, transform: &Transform) {
        let translation = Mat4::new_translation(&-self.column_min);
        let rotation = pixel_rotation();
        let sep = self.column_separation;
        let (count_x, count_z) = self.column_count;
        let scale_pixel = Mat4::new_nonuniform_scaling(&Vec3::new(safe_recip(sep.x), 1.0, safe_recip(sep.y)));
        let scale_coord = Mat4::new_nonuniform_scaling(&Vec3::new(
            safe_recip((count_x - 1) as f32 * sep.x),
            1.0,
            safe_recip((count_z - 1) as f32 * sep.y),
        ));
        let world_to_local = transform.world_to_local();

        self.world_to_pixel = rotation * scale_pixel * translation * world_to_local;
        self.world_to_coord = rotation * scale_coord * translation * world_to_local;
        self.pixel_to_world = self.world_to_pixel.try_inverse().unwrap_or_else(Mat4::zeros);
        self.coord_to_world = self.world_to_coord.try_inverse().unwrap_or_else(Mat4::zeros);
    }

    /// Columns along x and z
    #[must_use]
    pub fn column_count(&self) -> (usize, usize) {
        self.column_count
    }

    /// Local position of column (0, 0)
    #[must_use]
    pub fn column_min(&self) -> Vec3 {
        self.column_min
    }

    /// Local position of the last column
    #[must_use]
    pub fn column_max(&self) -> Vec3 {
        self.column_max
    }

    /// Local distance between neighbouring columns on x and z
    #[must_use]
    pub fn column_separation(&self) -> Vec2 {
        self.column_separation
    }

    /// Area represented by one column
    #[must_use]
    pub fn volume_per_column(&self) -> f32 {
        self.column_separation.x * self.column_separation.y
    }

    #[must_use]
    pub fn world_to_pixel(&self) -> &Mat4 {
        &self.world_to_pixel
    }

    #[must_use]
    pub fn pixel_to_world(&self) -> &Mat4 {
        &self.pixel_to_world
    }

    #[must_use]
    pub fn world_to_coord(&self) -> &Mat4 {
        &self.world_to_coord
    }

    #[must_use]
    pub fn coord_to_world(&self) -> &Mat4 {
        &self.coord_to_world
    }

    /// Pixel position of a world point
    #[must_use]
    pub fn world_point_to_pixel(&self, world: &Vec3) -> Vec3 {
        self.world_to_pixel.transform_point(&Point::from(*world)).coords
    }

    /// World position of pixel `(x, y)` at local height 0
    #[must_use]
    pub fn pixel_point_to_world(&self, x: f32, y: f32) -> Vec3 {
        self.pixel_to_world.transform_point(&Point::new(x, y, 0.0)).coords
    }

    /// World position of a column with its y replaced by `height`
    #[must_use]
    pub fn column_world_position(&self, x: f32, y: f32, height: f32) -> Vec3 {
        let mut position = self.pixel_point_to_world(x, y);
        position.y = height;
        position
    }

    /// Pixel rectangle touched by a world-space box, clamped to the grid
    ///
    /// Both box corners are mapped to pixel space; the rectangle spans
    /// `floor(min)` to `ceil(max + 0.5)` and may be empty.
    #[must_use]
    pub fn pixel_rect(&self, world_bounds: &Bounds) -> PixelRect {
        let a = self.world_point_to_pixel(&world_bounds.min());
        let b = self.world_point_to_pixel(&world_bounds.max());
        let (width, height) = self.column_count;

        let clamp = |v: f32, size: usize| -> usize {
            if v.is_nan() {
                0
            } else {
                v.clamp(0.0, size as f32) as usize
            }
        };
        let min_x = clamp(a.x.min(b.x).floor(), width);
        let min_y = clamp(a.y.min(b.y).floor(), height);
        let max_x = clamp((a.x.max(b.x) + 0.5).ceil(), width);
        let max_y = clamp((a.y.max(b.y) + 0.5).ceil(), height);

        PixelRect::new(min_x, min_y, max_x.saturating_sub(min_x), max_y.saturating_sub(min_y))
    }

    /// Whether a world point lies over the columns on the local XZ plane
    #[must_use]
    pub fn overlap_xz(&self, transform: &Transform, world: &Vec3) -> bool {
        let local = transform.inverse_transform_point(&Point::from(*world));
        local.x >= self.column_min.x
            && local.x <= self.column_max.x
            && local.z >= self.column_min.z
            && local.z <= self.column_max.z
    }

    /// XZ distance from a world point to the column area, 0 inside
    ///
    /// Measured in local space and rescaled to world units by the ratio of
    /// world to local distance between the point and the grid center.
    #[must_use]
    pub fn distance_xz(&self, transform: &Transform, world: &Vec3) -> f32 {
        let local_center = (self.column_min + self.column_max) * 0.5;
        let world_center = transform.transform_point(&Point::from(local_center)).coords;
        let local_point = transform.inverse_transform_point(&Point::from(*world)).coords;

        let world_sep = distance_xz(&world_center, world);
        let local_sep = distance_xz(&local_center, &local_point);
        let mut local_dist = distance_to_rect_xz(&self.column_min, &self.column_max, &local_point);

        if local_sep > 0.0 {
            local_dist *= world_sep / local_sep;
        }
        local_dist
    }
}

fn safe_recip(v: f32) -> f32 {
    if v != 0.0 {
        1.0 / v
    } else {
        0.0
    }
}

fn distance_xz(a: &Vec3, b: &Vec3) -> f32 {
    Vec2::new(a.x - b.x, a.z - b.z).norm()
}

fn distance_to_rect_xz(min: &Vec3, max: &Vec3, point: &Vec3) -> f32 {
    let dx = (min.x - point.x).max(0.0).max(point.x - max.x);
    let dz = (min.z - point.z).max(0.0).max(point.z - max.z);
    Vec2::new(dx, dz).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config(size: f32, separation: f32) -> SimulationConfig {
        SimulationConfig::with_size(size, size, separation)
    }

    #[test]
    fn test_estimated_columns() {
        assert_eq!(estimated_column_count(&config(100.0, 1.0)), (101, 101));
        assert_eq!(estimated_column_count(&config(3.0, 1.0)), (4, 4));

        let mut dense = config(10.0, 1.0);
        dense.resolution = 4.0;
        assert_eq!(estimated_column_count(&dense), (21, 21));

        let mut capped = config(100.0, 1.0);
        capped.max_texture_size = 16;
        assert_eq!(estimated_column_count(&capped), (16, 16));
    }

    #[test]
    fn test_tiny_grid_never_activates() {
        assert!(GridLayout::new(&config(0.2, 1.0), &Transform::identity()).is_none());
    }

    #[test]
    fn test_separation_and_volume() {
        let layout = GridLayout::new(&config(3.0, 1.0), &Transform::identity()).expect("active");
        assert_eq!(layout.column_count(), (4, 4));
        assert_relative_eq!(layout.column_separation().x, 1.0);
        assert_relative_eq!(layout.volume_per_column(), 1.0);
    }

    #[test]
    fn test_world_pixel_round_trip() {
        let transform = Transform::from_position(Vec3::new(10.0, 2.0, -5.0)).with_yaw(30.0);
        let layout = GridLayout::new(&config(8.0, 0.5), &transform).expect("active");

        let world = layout.pixel_point_to_world(3.0, 7.0);
        let pixel = layout.world_point_to_pixel(&world);
        assert_relative_eq!(pixel.x, 3.0, epsilon = 1e-3);
        assert_relative_eq!(pixel.y, 7.0, epsilon = 1e-3);
        assert_relative_eq!(pixel.z, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_pixel_axes_follow_local_xz() {
        let layout = GridLayout::new(&config(3.0, 1.0), &Transform::identity()).expect("active");
        let pixel = layout.world_point_to_pixel(&Vec3::new(2.0, 5.0, 1.0));
        assert_relative_eq!(pixel.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(pixel.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(pixel.z, -5.0, epsilon = 1e-5);

        let coord = layout.world_to_coord().transform_point(&Point::new(3.0, 0.0, 3.0));
        assert_relative_eq!(coord.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(coord.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_centered_bounds() {
        let mut centered = config(4.0, 1.0);
        centered.center = true;
        let layout = GridLayout::new(&centered, &Transform::identity()).expect("active");
        assert_relative_eq!(layout.column_min().x, -2.0);
        assert_relative_eq!(layout.column_max().z, 2.0);
    }

    #[test]
    fn test_pixel_rect_clamps() {
        let layout = GridLayout::new(&config(3.0, 1.0), &Transform::identity()).expect("active");
        let inside = Bounds::from_center_size(Vec3::new(1.5, 0.0, 1.5), Vec3::new(2.0, 0.0, 2.0));
        assert_eq!(layout.pixel_rect(&inside), PixelRect::new(0, 0, 3, 3));

        let outside = Bounds::from_center_size(Vec3::new(50.0, 0.0, 50.0), Vec3::new(1.0, 0.0, 1.0));
        assert!(layout.pixel_rect(&outside).is_empty());
    }

    #[test]
    fn test_overlap_and_distance() {
        let transform = Transform::identity();
        let layout = GridLayout::new(&config(3.0, 1.0), &transform).expect("active");
        assert!(layout.overlap_xz(&transform, &Vec3::new(1.0, 100.0, 2.0)));
        assert!(!layout.overlap_xz(&transform, &Vec3::new(-1.0, 0.0, 2.0)));
        assert_relative_eq!(layout.distance_xz(&transform, &Vec3::new(1.0, 0.0, 1.0)), 0.0);
        assert_relative_eq!(layout.distance_xz(&transform, &Vec3::new(5.0, 0.0, 1.0)), 2.0, epsilon = 1e-5);
    }
}
