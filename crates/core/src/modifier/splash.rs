//! Splashes: one-shot bursts of modifiers and particles
//!
//! A [`Splash`] is a set of template modifiers placed relative to a splash
//! origin, plus optional particle emitters. A [`SplashSurface`] watches how
//! fast a point sample's submersion changes and fires a splash when it jumps.

use super::Modifier;
use crate::core_types::{FluidProperties, Transform, Vec3};
use crate::solver::particles::ParticleState;
use rand::Rng;

/// Emits fluid particles when a splash fires
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleEmitter {
    pub count_min: u32,
    pub count_max: u32,
    pub fluid: FluidProperties,
    /// Depth each particle deposits when it lands
    pub depth: f32,
    /// Upward launch speed at strength 1
    pub speed: f32,
    /// Seconds before an airborne particle expires
    pub life: f32,
    /// Horizontal velocity jitter
    pub spread: f32,
}

impl Default for ParticleEmitter {
    fn default() -> Self {
        Self {
            count_min: 0,
            count_max: 10,
            fluid: FluidProperties::default(),
            depth: 0.01,
            speed: 5.0,
            life: 5.0,
            spread: 1.0,
        }
    }
}

impl ParticleEmitter {
    /// Particles emitted for a splash strength
    #[must_use]
    pub fn count(&self, strength: f32) -> usize {
        let t = strength.clamp(0.0, 1.0);
        let min = self.count_min as f32;
        let max = self.count_max as f32;
        (min + (max - min) * t).round().max(0.0) as usize
    }

    /// Particles launched from `position`
    pub fn emit<R: Rng + ?Sized>(&self, position: &Vec3, strength: f32, rng: &mut R) -> Vec<ParticleState> {
        let spread = self.spread.abs();
        let speed = self.speed * strength.max(0.0);
        (0..self.count(strength))
            .map(|_| {
                let velocity = Vec3::new(
                    rng.random_range(-spread..=spread),
                    speed * rng.random_range(0.5..=1.0),
                    rng.random_range(-spread..=spread),
                );
                ParticleState {
                    velocity,
                    age: 0.0,
                    position: *position,
                    life: self.life,
                    depth: self.depth,
                    color: self.fluid.color,
                    esmv: self.fluid.esmv(),
                    foam: self.fluid.f123(0.0),
                }
            })
            .collect()
    }
}

/// Template modifiers and emitters applied together at a point
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Splash {
    /// Modifiers placed relative to the splash origin
    pub modifiers: Vec<Modifier>,
    pub emitters: Vec<ParticleEmitter>,
}

impl Splash {
    #[must_use]
    pub fn new(modifiers: Vec<Modifier>) -> Self {
        Self {
            modifiers,
            emitters: Vec::new(),
        }
    }

    pub fn with_emitter(mut self, emitter: ParticleEmitter) -> Self {
        self.emitters.push(emitter);
        self
    }

    /// Templates moved to `position` with identity rotation and sizes scaled by `scale`
    #[must_use]
    pub fn placed_modifiers(&self, position: &Vec3, scale: f32) -> Vec<Modifier> {
        let origin = Transform::from_position(*position).with_scale(Vec3::repeat(scale));
        self.modifiers
            .iter()
            .map(|template| {
                let mut modifier = template.clone();
                modifier.transform = Transform {
                    position: origin.transform_point(&template.transform.position.into()).coords,
                    rotation: template.transform.rotation,
                    scale: template.transform.scale * scale,
                };
                modifier
            })
            .collect()
    }

    /// Particles from every emitter
    pub fn emit_particles<R: Rng + ?Sized>(&self, position: &Vec3, strength: f32, rng: &mut R) -> Vec<ParticleState> {
        self.emitters
            .iter()
            .flat_map(|emitter| emitter.emit(position, strength, rng))
            .collect()
    }
}

/// Fires a splash when a sampled submersion changes quickly
#[derive(Debug, Clone, PartialEq)]
pub struct SplashSurface {
    pub scale: f32,
    pub strength: f32,
    /// Submersion change needed for a splash
    pub threshold: f32,
    /// Seconds of dampening built up by each splash
    pub cooldown: f32,
    last_submersion: Option<f32>,
    dampen: f32,
}

impl Default for SplashSurface {
    fn default() -> Self {
        Self {
            scale: 1.0,
            strength: 1.0,
            threshold: 0.25,
            cooldown: 1.0,
            last_submersion: None,
            dampen: 0.0,
        }
    }
}

impl SplashSurface {
    #[must_use]
    pub fn dampen(&self) -> f32 {
        self.dampen
    }

    /// Feed the latest submersion (`None` while unsampled) and the frame time
    ///
    /// Returns the strength of the splash to fire, if any.
    pub fn update(&mut self, submersion: Option<f32>, delta: f32) -> Option<f32> {
        let mut fired = None;
        if let Some(submersion) = submersion {
            let last = *self.last_submersion.get_or_insert(submersion);
            if last != submersion {
                let mut change = (last - submersion).abs();
                if change > self.threshold {
                    if self.cooldown > 0.0 {
                        change *= 1.0 - self.dampen / self.cooldown;
                    }
                    fired = Some(change * self.strength);
                }
                self.dampen = self.cooldown.min(self.dampen + change);
            }
            self.last_submersion = Some(submersion);
        }
        self.dampen = (self.dampen - delta).max(0.0);
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::ModifierMode;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_emitter_count_lerps_strength() {
        let emitter = ParticleEmitter::default();
        assert_eq!(emitter.count(0.0), 0);
        assert_eq!(emitter.count(0.5), 5);
        assert_eq!(emitter.count(4.0), 10);
    }

    #[test]
    fn test_emitted_particles_carry_fluid() {
        let mut rng = StdRng::seed_from_u64(7);
        let emitter = ParticleEmitter {
            depth: 0.2,
            ..ParticleEmitter::default()
        };
        let particles = emitter.emit(&Vec3::new(1.0, 2.0, 3.0), 1.0, &mut rng);
        assert_eq!(particles.len(), 10);
        for particle in &particles {
            assert!(particle.is_live());
            assert_relative_eq!(particle.depth, 0.2);
            assert!(particle.velocity.y > 0.0);
            assert!(particle.velocity.x.abs() <= 1.0);
        }
    }

    #[test]
    fn test_placed_modifiers_follow_origin() {
        let template = Modifier::new(ModifierMode::AddFoam)
            .at(Vec3::new(1.0, 0.0, 0.0))
            .with_size(2.0, 2.0);
        let splash = Splash::new(vec![template]);
        let placed = splash.placed_modifiers(&Vec3::new(10.0, 0.0, 5.0), 2.0);
        assert_relative_eq!(placed[0].transform.position, Vec3::new(12.0, 0.0, 5.0));
        assert_relative_eq!(placed[0].transform.scale.x, 2.0);
    }

    #[test]
    fn test_surface_splash_and_cooldown() {
        let mut surface = SplashSurface::default();
        assert_eq!(surface.update(Some(0.0), 0.0), None);
        assert_eq!(surface.update(Some(0.1), 0.0), None);

        let strength = surface.update(Some(0.9), 0.0).unwrap();
        assert_relative_eq!(strength, 0.8 * (1.0 - 0.1), epsilon = 1.0e-5);
        assert!(surface.dampen() > 0.0);

        surface.update(None, 5.0);
        assert_relative_eq!(surface.dampen(), 0.0);
    }
}
