//! Simulation and world configuration
//!
//! Both configs are plain serde structs with documented defaults. A
//! [`SimulationConfig`] can be loaded from a JSON document where missing
//! fields fall back to their defaults.

use crate::core_types::Vec3;
use crate::solver::{ChannelFormats, CustomDataType, FloatPrecision, Precision01};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Force-stage behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhysicsModel {
    /// Fluid settles into a flat surface
    #[default]
    Standard,
    /// Weak damping keeps the surface oscillating
    Alive,
    /// Deep columns attract fluid, collecting it in peaks
    InversePeaks,
    /// No inertia: fluxes are recomputed from height differences each tick
    Simple,
}

/// How the world spreads the physics stages over fixed ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UpdateMode {
    /// Forces, transport and modifiers every tick
    #[default]
    EveryFrame,
    /// Forces and transport alternate, transport covering two ticks
    EveryOtherFrame,
}

/// Every setting of one simulation grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Local size of the simulated area (y unused)
    pub size: Vec3,
    /// Base distance between columns before resolution is applied
    pub separation: f32,
    /// Column density multiplier (columns per axis scale with its square root)
    pub resolution: f32,
    /// Center the area on the transform instead of starting at it
    pub center: bool,
    /// Stretch the columns to fill `size` exactly
    pub stretch: bool,
    /// Run the physics stages
    pub simulating: bool,
    /// Track wetness in channel A
    pub wetness: bool,
    /// Depth of the dry baseline below the ground
    pub table_depth: f32,
    /// Meters per second the wet depth falls when no fluid is present
    pub dry_rate: f32,
    /// Lowest ground height; ground casts start from `height_max`
    pub height_min: f32,
    pub height_max: f32,
    /// Radius of the ground cast (0 for a thin ray)
    pub height_radius: f32,
    /// Global multiplier on fluid motion
    pub speed: f32,
    /// Foam removed per second, in 0..1 units
    pub foam_clear_rate: f32,
    pub particles: bool,
    pub particle_limit: usize,
    pub particle_drag: f32,
    pub custom_data: CustomDataType,
    pub precision_a: FloatPrecision,
    pub precision_b: FloatPrecision,
    pub precision_c: FloatPrecision,
    pub precision_d: Precision01,
    pub precision_e: Precision01,
    pub precision_f: Precision01,
    pub physics_model: PhysicsModel,
    /// Extra flux retention, 0..0.3
    pub physics_instability: f32,
    /// Flux gained per meter of height difference, 0..100
    pub physics_spread: f32,
    /// Flux lost per tick, 0.01..0.25
    pub physics_damping: f32,
    /// Blend between old and new flux, 0.01..1
    pub physics_speed: f32,
    /// Let outflow exceed the depth a column holds
    pub physics_overflow: bool,
    /// Largest column count per axis
    pub max_texture_size: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            size: Vec3::new(100.0, 0.0, 100.0),
            separation: 1.0,
            resolution: 1.0,
            center: false,
            stretch: true,
            simulating: true,
            wetness: false,
            table_depth: 1.0,
            dry_rate: 1.0,
            height_min: -100.0,
            height_max: 100.0,
            height_radius: 0.0,
            speed: 10.0,
            foam_clear_rate: 0.5,
            particles: false,
            particle_limit: 1024,
            particle_drag: 0.9,
            custom_data: CustomDataType::None,
            precision_a: FloatPrecision::Full,
            precision_b: FloatPrecision::Full,
            precision_c: FloatPrecision::Full,
            precision_d: Precision01::Byte,
            precision_e: Precision01::Byte,
            precision_f: Precision01::Byte,
            physics_model: PhysicsModel::Standard,
            physics_instability: 0.0,
            physics_spread: 2.0,
            physics_damping: 0.15,
            physics_speed: 1.0,
            physics_overflow: false,
            max_texture_size: 16384,
        }
    }
}

impl SimulationConfig {
    /// Config with a given size and separation, other fields default
    #[must_use]
    pub fn with_size(size_x: f32, size_z: f32, separation: f32) -> Self {
        Self {
            size: Vec3::new(size_x, 0.0, size_z),
            separation,
            ..Self::default()
        }
    }

    /// Parse a JSON document; missing fields use their defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and the
    /// [`validate`](Self::validate) errors for unusable values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the simulation cannot run with
    ///
    /// # Errors
    ///
    /// Returns an error for a non-finite or non-positive separation or
    /// resolution, a zero particle limit, or an inverted height range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.separation.is_finite() || self.separation <= 0.0 {
            return Err(ConfigError::InvalidSeparation(self.separation));
        }
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(ConfigError::InvalidResolution(self.resolution));
        }
        if self.particle_limit == 0 {
            return Err(ConfigError::EmptyParticleLimit);
        }
        if self.height_min.is_nan() || self.height_max.is_nan() || self.height_min > self.height_max {
            return Err(ConfigError::InvalidHeightRange {
                min: self.height_min,
                max: self.height_max,
            });
        }
        Ok(())
    }

    /// Copy with the physics parameters clamped to their supported ranges
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let mut config = self.clone();
        config.physics_instability = clamp_logged("physics_instability", config.physics_instability, 0.0, 0.3);
        config.physics_spread = clamp_logged("physics_spread", config.physics_spread, 0.0, 100.0);
        config.physics_damping = clamp_logged("physics_damping", config.physics_damping, 0.01, 0.25);
        config.physics_speed = clamp_logged("physics_speed", config.physics_speed, 0.01, 1.0);
        config.particle_drag = clamp_logged("particle_drag", config.particle_drag, 0.0, 1.0);
        config.foam_clear_rate = clamp_logged("foam_clear_rate", config.foam_clear_rate, 0.0, f32::MAX);
        config.table_depth = clamp_logged("table_depth", config.table_depth, 0.0, f32::MAX);
        config.dry_rate = clamp_logged("dry_rate", config.dry_rate, 0.0, f32::MAX);
        config
    }

    /// Storage formats of the six column channels
    #[must_use]
    pub fn channel_formats(&self) -> ChannelFormats {
        ChannelFormats::from_precisions(
            self.precision_a,
            self.precision_b,
            self.precision_c,
            self.precision_d,
            self.precision_e,
            self.precision_f,
            self.custom_data,
        )
    }
}

fn clamp_logged(name: &str, value: f32, min: f32, max: f32) -> f32 {
    let clamped = if value.is_nan() { min } else { value.clamp(min, max) };
    if clamped != value {
        warn!("{} = {} outside {}..{}, clamped to {}", name, value, min, max, clamped);
    }
    clamped
}

/// Settings shared by every simulation in a world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub update_mode: UpdateMode,
    /// Acceleration applied to particles
    pub gravity: Vec3,
    /// Seed for splash emission jitter
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            update_mode: UpdateMode::EveryFrame,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            seed: 0,
        }
    }
}

/// Errors from configuration parsing and validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// JSON could not be parsed
    Parse(String),
    /// Separation must be finite and positive
    InvalidSeparation(f32),
    /// Resolution must be finite and positive
    InvalidResolution(f32),
    /// Particle pool needs at least one slot
    EmptyParticleLimit,
    /// `height_min` above `height_max`
    InvalidHeightRange { min: f32, max: f32 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "Failed to parse config: {msg}"),
            ConfigError::InvalidSeparation(v) => write!(f, "Invalid separation: {v}"),
            ConfigError::InvalidResolution(v) => write!(f, "Invalid resolution: {v}"),
            ConfigError::EmptyParticleLimit => write!(f, "Particle limit must be at least 1"),
            ConfigError::InvalidHeightRange { min, max } => {
                write!(f, "Invalid height range: {min}..{max}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.size, Vec3::new(100.0, 0.0, 100.0));
        assert_eq!(config.speed, 10.0);
        assert_eq!(config.particle_limit, 1024);
        assert_eq!(config.physics_model, PhysicsModel::Standard);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_missing_fields_use_defaults() {
        let config = SimulationConfig::from_json_str(r#"{ "separation": 0.5, "wetness": true }"#)
            .expect("valid config");
        assert_eq!(config.separation, 0.5);
        assert!(config.wetness);
        assert_eq!(config.dry_rate, 1.0);
    }

    #[test]
    fn test_json_rejects_bad_separation() {
        let err = SimulationConfig::from_json_str(r#"{ "separation": 0.0 }"#).unwrap_err();
        assert_eq!(err, ConfigError::InvalidSeparation(0.0));
        assert!(matches!(
            SimulationConfig::from_json_str("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_sanitized_clamps_physics() {
        let config = SimulationConfig {
            physics_damping: 0.9,
            physics_speed: 0.0,
            ..SimulationConfig::default()
        };
        let clean = config.sanitized();
        assert_eq!(clean.physics_damping, 0.25);
        assert_eq!(clean.physics_speed, 0.01);
    }

    #[test]
    fn test_world_defaults() {
        let world = WorldConfig::default();
        assert_eq!(world.update_mode, UpdateMode::EveryFrame);
        assert_eq!(world.gravity.y, -9.81);
    }
}
