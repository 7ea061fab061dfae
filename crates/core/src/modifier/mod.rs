//! Modifiers: localized operators on a simulation's columns
//!
//! A [`Modifier`] is an oriented box anchored to a [`Transform`]. Applying it
//! runs its mode's pixel operation over every column the box covers. The
//! surrounding pieces live in submodules: the apply pipeline ([`engine`]),
//! speed-driven strength ([`speed`]), volume containers ([`container`]) and
//! splashes ([`splash`]).

pub mod container;
pub mod engine;
pub mod mode;
pub mod ops;
pub mod speed;
pub mod splash;

pub use container::{Container, ContainerLink};
pub use engine::{apply_to_grid, ApplyReport, GridTarget, PreparedModifier};
pub use mode::ModifierMode;
pub use ops::{ColumnTexels, ModifierInputs, PixelContext, PixelOp};
pub use speed::{RotationMode, SpeedControl, SpeedUpdate};
pub use splash::{ParticleEmitter, Splash, SplashSurface};

use crate::core_types::{Bounds, FluidProperties, MaskChannel, ShapeMask, Texel, Transform, Vec3};

/// When a modifier applies itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApplyType {
    /// Only through an explicit apply call
    Manually,
    /// On the first frame after it is enabled
    Once,
    /// Every time the simulation steps, scaled by the step time
    #[default]
    Continuously,
}

/// Localized operator on fluid columns
#[derive(Debug, Clone, PartialEq)]
pub struct Modifier {
    pub transform: Transform,
    /// Footprint size in local space; y is ignored
    pub size: Vec3,
    /// Falloff mask over the footprint
    pub shape: Option<ShapeMask>,
    pub shape_channel: MaskChannel,
    /// Center the footprint on the transform instead of starting at it
    pub center: bool,
    pub apply: ApplyType,
    pub mode: ModifierMode,
    /// Local height range used by the range modes
    pub height_min: f32,
    pub height_max: f32,
    /// Fluid mixed in by the add modes
    pub fluid: Option<FluidProperties>,
    /// Force direction relative to forward, in degrees (90 = right)
    pub angle: f32,
    /// Direction map for [`ModifierMode::AddForce`], RG encoded as `dir * 0.5 + 0.5`
    pub directions: Option<ShapeMask>,
    pub color: Texel,
    pub esmv: Texel,
    pub channels: [bool; 4],
    pub strength: f32,
    /// Report how much fluid each apply added or removed
    pub monitor_fluid_depth: bool,
    pub enabled: bool,
    pub(crate) primed: bool,
}

impl Default for Modifier {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            size: Vec3::new(1.0, 0.0, 1.0),
            shape: None,
            shape_channel: MaskChannel::Alpha,
            center: true,
            apply: ApplyType::Continuously,
            mode: ModifierMode::AddFluid,
            height_min: 0.0,
            height_max: 1.0,
            fluid: None,
            angle: 0.0,
            directions: None,
            color: Texel::new(1.0, 1.0, 1.0, 1.0),
            esmv: Texel::zeros(),
            channels: [true; 4],
            strength: 1.0,
            monitor_fluid_depth: false,
            enabled: true,
            primed: true,
        }
    }
}

impl Modifier {
    /// Modifier with the given mode and default settings
    #[must_use]
    pub fn new(mode: ModifierMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_size(mut self, size_x: f32, size_z: f32) -> Self {
        self.size = Vec3::new(size_x, 0.0, size_z);
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_apply(mut self, apply: ApplyType) -> Self {
        self.apply = apply;
        self
    }

    pub fn with_fluid(mut self, fluid: FluidProperties) -> Self {
        self.fluid = Some(fluid);
        self
    }

    pub fn with_shape(mut self, shape: ShapeMask, channel: MaskChannel) -> Self {
        self.shape = Some(shape);
        self.shape_channel = channel;
        self
    }

    pub fn with_height_range(mut self, min: f32, max: f32) -> Self {
        self.height_min = min;
        self.height_max = max;
        self
    }

    pub fn with_monitoring(mut self, monitor: bool) -> Self {
        self.monitor_fluid_depth = monitor;
        self
    }

    pub fn with_angle(mut self, degrees: f32) -> Self {
        self.angle = degrees;
        self
    }

    pub fn with_directions(mut self, directions: ShapeMask) -> Self {
        self.directions = Some(directions);
        self
    }

    pub fn with_color(mut self, color: Texel, channels: [bool; 4]) -> Self {
        self.color = color;
        self.channels = channels;
        self
    }

    pub fn with_esmv(mut self, esmv: Texel, channels: [bool; 4]) -> Self {
        self.esmv = esmv;
        self.channels = channels;
        self
    }

    /// Local footprint box; range modes also span the height range on y
    #[must_use]
    pub fn local_bounds(&self, use_range: bool) -> Bounds {
        let size = Vec3::new(self.size.x, 0.0, self.size.z);
        let mut center = Vec3::zeros();
        if !self.center {
            center.x = size.x * 0.5;
            center.z = size.z * 0.5;
        }
        let mut bounds = Bounds::from_center_size(center, size);
        if use_range && self.mode.has_range() {
            bounds.center.y = (self.height_min + self.height_max) * 0.5;
            bounds.extents.y = (self.height_max - self.height_min) * 0.5;
        }
        bounds
    }

    /// World box enclosing the footprint
    #[must_use]
    pub fn world_bounds(&self) -> Bounds {
        Bounds::world_from_local(&self.transform, &self.local_bounds(true))
    }

    /// Whether applies measure the fluid they move
    #[must_use]
    pub fn should_monitor(&self) -> bool {
        self.monitor_fluid_depth && (self.mode.adds_fluid() || self.mode.removes_fluid())
    }

    /// Re-arm a [`ApplyType::Once`] modifier
    pub fn prime(&mut self) {
        self.primed = true;
    }

    /// Whether a [`ApplyType::Once`] modifier still has to fire
    #[must_use]
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Consume the pending one-shot apply
    pub(crate) fn take_primed(&mut self) -> bool {
        std::mem::replace(&mut self.primed, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_centered_bounds() {
        let modifier = Modifier::new(ModifierMode::AddFluid).with_size(2.0, 4.0);
        let bounds = modifier.local_bounds(true);
        assert_relative_eq!(bounds.min().x, -1.0);
        assert_relative_eq!(bounds.max().z, 2.0);
        assert_relative_eq!(bounds.size().y, 0.0);
    }

    #[test]
    fn test_corner_bounds_and_range() {
        let mut modifier = Modifier::new(ModifierMode::RangeAddFoam)
            .with_size(2.0, 2.0)
            .with_height_range(-1.0, 3.0);
        modifier.center = false;
        let bounds = modifier.local_bounds(true);
        assert_relative_eq!(bounds.min().x, 0.0);
        assert_relative_eq!(bounds.center.y, 1.0);
        assert_relative_eq!(bounds.size().y, 4.0);
        assert_relative_eq!(modifier.local_bounds(false).size().y, 0.0);
    }

    #[test]
    fn test_monitoring_only_for_fluid_modes() {
        let add = Modifier::new(ModifierMode::AddFluidClip).with_monitoring(true);
        let foam = Modifier::new(ModifierMode::AddFoam).with_monitoring(true);
        assert!(add.should_monitor());
        assert!(!foam.should_monitor());
    }

    #[test]
    fn test_primed_fires_once() {
        let mut modifier = Modifier::new(ModifierMode::AddFluid).with_apply(ApplyType::Once);
        assert!(modifier.take_primed());
        assert!(!modifier.take_primed());
        modifier.prime();
        assert!(modifier.is_primed());
    }
}
