//! Strength driven by how fast a modifier moves

use crate::core_types::{Transform, Vec3};

/// How movement turns a uniform-force modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationMode {
    #[default]
    None,
    /// Angle follows the world-space movement; for modifiers that do not rotate
    WorldDelta,
    /// Angle follows movement relative to the modifier's heading
    LocalDelta,
}

/// Scales a modifier's strength by its speed each fixed tick
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedControl {
    /// Speed at which the modifier reaches full `strength`
    pub speed_max: f32,
    pub strength: f32,
    /// Cap the speed ratio at 1
    pub clamp: bool,
    pub rotation: RotationMode,
    last_position: Option<Vec3>,
    last_speed: f32,
}

impl Default for SpeedControl {
    fn default() -> Self {
        Self {
            speed_max: 10.0,
            strength: 1.0,
            clamp: true,
            rotation: RotationMode::None,
            last_position: None,
            last_speed: 0.0,
        }
    }
}

/// New modifier settings from one speed update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedUpdate {
    pub strength: f32,
    /// New force angle in degrees, when rotation is enabled
    pub angle: Option<f32>,
}

impl SpeedControl {
    /// Speed measured by the last update
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.last_speed
    }

    /// Forget the previous position, e.g. after a teleport
    pub fn reset(&mut self, transform: &Transform) {
        self.last_position = Some(transform.position);
        self.last_speed = 0.0;
    }

    /// Measure movement since the previous tick
    ///
    /// `rotates` is whether the modifier's mode takes its direction from the
    /// angle; other modes never get an angle back.
    pub fn update(&mut self, transform: &Transform, delta: f32, rotates: bool) -> SpeedUpdate {
        let position = transform.position;
        let moved = position - self.last_position.unwrap_or(position);
        let speed = if delta > 0.0 { moved.norm() / delta } else { 0.0 };

        let mut ratio = if self.speed_max != 0.0 { speed / self.speed_max } else { 0.0 };
        if self.clamp {
            ratio = ratio.clamp(0.0, 1.0);
        }

        let angle = (rotates && self.rotation != RotationMode::None).then(|| {
            let mut radians = moved.x.atan2(moved.z);
            if self.rotation == RotationMode::LocalDelta {
                radians -= transform.yaw();
            }
            radians.to_degrees()
        });

        self.last_position = Some(position);
        self.last_speed = speed;
        SpeedUpdate {
            strength: self.strength * ratio,
            angle,
        }
    }
}
