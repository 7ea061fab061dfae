//! Point samples: fluid state under a single world position

use super::kernels::POINT_TEXELS;
use crate::core_types::{Texel, Vec2, Vec3};
use crate::simulation::events::SimulationId;

/// Fluid readings at a world position, refreshed every fixed tick
#[derive(Debug, Clone, PartialEq)]
pub struct PointSample {
    pub position: Vec3,
    /// Radius of the sphere used for submersion
    pub radius: f32,
    /// Sample this simulation instead of the nearest one
    pub simulation: Option<SimulationId>,
    sampled: bool,
    velocity: Vec2,
    ground_height: f32,
    wet_height: f32,
    normal: Vec3,
    depth: f32,
    color: Texel,
    esmv: Texel,
    foam: Texel,
    overlap: f32,
    submersion: f32,
    pending_overlap: f32,
    pending_position: Vec3,
}

impl PointSample {
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            radius: 0.0,
            simulation: None,
            sampled: false,
            velocity: Vec2::zeros(),
            ground_height: 0.0,
            wet_height: 0.0,
            normal: Vec3::y(),
            depth: 0.0,
            color: Texel::zeros(),
            esmv: Texel::zeros(),
            foam: Texel::zeros(),
            overlap: 0.0,
            submersion: 0.0,
            pending_overlap: 0.0,
            pending_position: position,
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_simulation(mut self, simulation: SimulationId) -> Self {
        self.simulation = Some(simulation);
        self
    }

    #[must_use]
    pub fn sampled(&self) -> bool {
        self.sampled
    }

    /// Grid-space velocity along x and z
    #[must_use]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    #[must_use]
    pub fn ground_height(&self) -> f32 {
        self.ground_height
    }

    #[must_use]
    pub fn wet_height(&self) -> f32 {
        self.wet_height
    }

    #[must_use]
    pub fn surface_height(&self) -> f32 {
        self.ground_height + self.depth
    }

    #[must_use]
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    #[must_use]
    pub fn depth(&self) -> f32 {
        self.depth
    }

    #[must_use]
    pub fn color(&self) -> Texel {
        self.color
    }

    /// Emission, smoothness, metallic, viscosity
    #[must_use]
    pub fn esmv(&self) -> Texel {
        self.esmv
    }

    /// Foam followed by the custom values
    #[must_use]
    pub fn foam(&self) -> Texel {
        self.foam
    }

    /// 1 when the position was over the grid, else 0
    #[must_use]
    pub fn overlap(&self) -> f32 {
        self.overlap
    }

    /// How far the sample sphere is under the surface, 0..1
    #[must_use]
    pub fn submersion(&self) -> f32 {
        self.submersion
    }

    /// Remember what the request was made with, applied on completion
    pub(crate) fn set_pending(&mut self, overlap: f32) {
        self.pending_overlap = overlap;
        self.pending_position = self.position;
    }

    /// Forget all readings
    pub fn clear(&mut self) {
        *self = Self {
            radius: self.radius,
            simulation: self.simulation,
            ..Self::new(self.position)
        };
    }

    /// Take the five texels of a completed request
    pub fn handle_samples(&mut self, samples: &[Texel]) {
        if samples.len() < POINT_TEXELS {
            self.clear();
            return;
        }
        let [a, b, color, esmv, foam] = [samples[0], samples[1], samples[2], samples[3], samples[4]];
        self.velocity = Vec2::new(a.x, a.y);
        self.ground_height = a.z;
        self.wet_height = a.w;
        self.normal = b.xyz();
        self.depth = b.w;
        self.color = color;
        self.esmv = esmv;
        self.foam = foam;
        self.overlap = self.pending_overlap;
        self.submersion = self.compute_submersion();
        self.sampled = true;
    }

    fn compute_submersion(&self) -> f32 {
        if self.depth <= 0.0 || self.overlap <= 0.0 {
            return 0.0;
        }
        let surface = self.surface_height();
        let bottom = self.pending_position.y - self.radius;
        if self.radius > 0.0 {
            ((surface - bottom) / (self.radius * 2.0)).clamp(0.0, 1.0)
        } else if surface >= bottom {
            1.0
        } else {
            0.0
        }
    }
}
