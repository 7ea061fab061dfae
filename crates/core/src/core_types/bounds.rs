//! Axis-aligned boxes and integer pixel rectangles

use super::{Point, Transform, Vec3};

/// Axis-aligned box stored as center and half-size
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    /// Box center
    pub center: Vec3,
    /// Half of the box size along each axis
    pub extents: Vec3,
}

impl Bounds {
    /// Create bounds from a center and full size
    #[must_use]
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        Self {
            center,
            extents: size * 0.5,
        }
    }

    /// Minimum corner
    #[must_use]
    pub fn min(&self) -> Vec3 {
        self.center - self.extents
    }

    /// Maximum corner
    #[must_use]
    pub fn max(&self) -> Vec3 {
        self.center + self.extents
    }

    /// Full size
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.extents * 2.0
    }

    /// World-space box enclosing `local` after it has been oriented by `transform`
    ///
    /// Each local half-axis is transformed and its absolute components are
    /// summed, so rotated footprints grow to their enclosing box.
    #[must_use]
    pub fn world_from_local(transform: &Transform, local: &Bounds) -> Self {
        let center = transform.transform_point(&Point::from(local.center)).coords;
        let axis_x = transform.transform_vector(&Vec3::new(local.extents.x, 0.0, 0.0));
        let axis_y = transform.transform_vector(&Vec3::new(0.0, local.extents.y, 0.0));
        let axis_z = transform.transform_vector(&Vec3::new(0.0, 0.0, local.extents.z));
        let extents = axis_x.abs() + axis_y.abs() + axis_z.abs();
        Self { center, extents }
    }
}

/// Integer pixel rectangle, half-open on the max side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    /// First column
    pub x: usize,
    /// First row
    pub y: usize,
    /// Column count
    pub width: usize,
    /// Row count
    pub height: usize,
}

impl PixelRect {
    /// Create a rectangle
    #[must_use]
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole `width` x `height` buffer
    #[must_use]
    pub const fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    /// One past the last column
    #[must_use]
    pub const fn x_max(&self) -> usize {
        self.x + self.width
    }

    /// One past the last row
    #[must_use]
    pub const fn y_max(&self) -> usize {
        self.y + self.height
    }

    /// Number of pixels covered
    #[must_use]
    pub const fn area(&self) -> usize {
        self.width * self.height
    }

    /// True when the rectangle covers nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Iterate `(x, y)` pixel coordinates, row by row
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.y..self.y_max()).flat_map(move |y| (self.x..self.x_max()).map(move |x| (x, y)))
    }
}
