//! Vector and matrix aliases shared by every module.

use nalgebra::{Matrix4, Point3, Vector2, Vector3, Vector4};

/// 3D vector for world positions, velocities, and directions.
///
/// Alias of `nalgebra::Vector3<f32>`, used for transforms, particle state and
/// every world-space query.
pub type Vec3 = Vector3<f32>;

/// 2D vector, mostly horizontal (XZ) quantities such as column velocity.
pub type Vec2 = Vector2<f32>;

/// Four-component value stored per column or per particle slot.
///
/// Channel texels always travel as four floats regardless of the storage
/// format; unused components are zero.
pub type Texel = Vector4<f32>;

/// 3D point in world or local space.
pub type Point = Point3<f32>;

/// Affine 4x4 matrix (column-major, column vectors).
pub type Mat4 = Matrix4<f32>;
