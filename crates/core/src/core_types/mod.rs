//! Core types and utilities

pub mod bounds;
pub mod fluid;
pub mod mask;
pub mod transform;
pub mod vec3;

pub use bounds::{Bounds, PixelRect};
pub use fluid::FluidProperties;
pub use mask::{MaskChannel, ShapeMask};
pub use transform::Transform;
pub use vec3::{Mat4, Point, Texel, Vec2, Vec3};
