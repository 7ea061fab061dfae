//! Anchor transforms for simulations, modifiers and sample areas

use super::{Mat4, Point, Vec3};
use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};

/// Position, rotation and scale of an object anchored in world space.
///
/// Local points map to world points as `translate * rotate * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World position
    pub position: Vec3,
    /// World rotation
    pub rotation: UnitQuaternion<f32>,
    /// Local scale
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// Identity transform at the origin
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }

    /// Unrotated, unscaled transform at `position`
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    /// Same transform rotated by `yaw_degrees` around the world up axis
    #[must_use]
    pub fn with_yaw(mut self, yaw_degrees: f32) -> Self {
        self.rotation = UnitQuaternion::from_axis_angle(&Vec3::y_axis(), yaw_degrees.to_radians());
        self
    }

    /// Same transform with a different scale
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Local to world matrix
    #[must_use]
    pub fn local_to_world(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// World to local matrix
    ///
    /// Zero scale components collapse that axis instead of producing
    /// infinities.
    #[must_use]
    pub fn world_to_local(&self) -> Mat4 {
        let inverse_scale = self.scale.map(|s| if s != 0.0 { 1.0 / s } else { 0.0 });
        Mat4::new_nonuniform_scaling(&inverse_scale)
            * self.rotation.inverse().to_homogeneous()
            * Mat4::new_translation(&-self.position)
    }

    /// Transform a local point into world space
    #[must_use]
    pub fn transform_point(&self, local: &Point) -> Point {
        Point::from(self.position + self.transform_vector(&local.coords))
    }

    /// Transform a local direction (scaled, rotated, not translated)
    #[must_use]
    pub fn transform_vector(&self, local: &Vec3) -> Vec3 {
        self.rotation * local.component_mul(&self.scale)
    }

    /// Transform a world point into local space
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Point) -> Point {
        self.world_to_local().transform_point(world)
    }

    /// Local +Z axis in world space
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::z()
    }

    /// Local +X axis in world space
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::x()
    }

    /// Local +Y axis in world space
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::y()
    }

    /// Heading of the forward axis around world up, in radians
    ///
    /// Zero when facing world +Z, positive towards +X.
    #[must_use]
    pub fn yaw(&self) -> f32 {
        let forward = self.forward();
        forward.x.atan2(forward.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_round_trip() {
        let transform = Transform::identity();
        let p = Point::new(1.0, 2.0, 3.0);
        assert_eq!(transform.transform_point(&p), p);
        assert_eq!(transform.inverse_transform_point(&p), p);
    }

    #[test]
    fn test_matrix_matches_point_transform() {
        let transform = Transform::from_position(Vec3::new(5.0, 1.0, -2.0))
            .with_yaw(30.0)
            .with_scale(Vec3::new(2.0, 1.0, 0.5));
        let p = Point::new(0.5, -1.0, 4.0);

        let by_matrix = transform.local_to_world().transform_point(&p);
        let by_parts = transform.transform_point(&p);
        assert_relative_eq!(by_matrix, by_parts, epsilon = 1e-5);

        let back = transform.inverse_transform_point(&by_parts);
        assert_relative_eq!(back, p, epsilon = 1e-5);
    }

    #[test]
    fn test_yaw_of_quarter_turn() {
        let transform = Transform::identity().with_yaw(90.0);
        assert_relative_eq!(transform.yaw(), std::f32::consts::FRAC_PI_2, epsilon = 1e-5);
        assert_relative_eq!(transform.forward(), Vec3::x(), epsilon = 1e-5);
    }
}
