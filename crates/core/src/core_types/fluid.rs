//! Fluid material description injected by modifiers and particles

use super::Texel;
use serde::{Deserialize, Serialize};

/// Appearance and custom data carried by a body of fluid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluidProperties {
    /// Linear RGBA color
    pub color: Texel,
    pub emission: f32,
    pub smoothness: f32,
    pub metallic: f32,
    pub viscosity: f32,
    pub custom1: f32,
    pub custom2: f32,
    pub custom3: f32,
}

impl Default for FluidProperties {
    fn default() -> Self {
        Self {
            color: Texel::new(1.0, 1.0, 1.0, 1.0),
            emission: 0.0,
            smoothness: 0.0,
            metallic: 0.0,
            viscosity: 0.0,
            custom1: 0.0,
            custom2: 0.0,
            custom3: 0.0,
        }
    }
}

impl FluidProperties {
    /// Fluid with the given color and default material values
    #[must_use]
    pub fn with_color(color: Texel) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    /// Emission, smoothness, metallic, viscosity packed as channel E
    #[must_use]
    pub fn esmv(&self) -> Texel {
        Texel::new(self.emission, self.smoothness, self.metallic, self.viscosity)
    }

    /// Foam plus the three custom values packed as channel F
    #[must_use]
    pub fn f123(&self, foam: f32) -> Texel {
        Texel::new(foam, self.custom1, self.custom2, self.custom3)
    }
}
