//! One fluid grid placed in the world
//!
//! A [`FlowSimulation`] owns the grid layout, its column channels and
//! optional particle pool, and runs the physics stages through a boxed
//! [`FluidStepper`]. Nothing is allocated until [`FlowSimulation::activate`].

use super::config::{ConfigError, SimulationConfig};
use crate::core_types::{Texel, Transform, Vec3};
use crate::grid::{build_chunk, chunk_count, chunks_in_radius, DirtyChunks, GridLayout, GroundCast, HeightSource};
use crate::modifier::{apply_to_grid, ApplyReport, GridTarget, Modifier, PreparedModifier};
use crate::solver::particles::{contribute, integrate_forces, integrate_motion};
use crate::solver::{
    create_stepper, Channel, ColumnStore, FluidStepper, FoamClearCounter, ForceParams, ParticlePool, ParticleState,
    TransportParams, WetnessParams,
};
use tracing::{debug, info};

/// A height-field fluid grid with its ground source and physics stepper
pub struct FlowSimulation {
    name: String,
    transform: Transform,
    config: SimulationConfig,
    ground: Option<Box<dyn HeightSource>>,
    layout: Option<GridLayout>,
    store: Option<ColumnStore>,
    particles: Option<ParticlePool>,
    /// Backend-agnostic stepper (CPU)
    stepper: Box<dyn FluidStepper>,
    dirty: DirtyChunks,
    foam_counter: FoamClearCounter,
    /// Forces ran since the last transport
    partially_updated: bool,
}

impl std::fmt::Debug for FlowSimulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowSimulation")
            .field("name", &self.name)
            .field("activated", &self.is_activated())
            .field("columns", &self.layout.as_ref().map(GridLayout::column_count))
            .field("stepper", &self.stepper.name())
            .finish_non_exhaustive()
    }
}

impl FlowSimulation {
    /// Create an inactive simulation
    ///
    /// # Arguments
    ///
    /// * `name` - Name used for snapshot files and logs
    /// * `config` - Grid and physics settings; physics ranges are clamped
    /// * `transform` - Placement of the grid in the world
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration cannot describe a grid.
    pub fn new(name: impl Into<String>, config: SimulationConfig, transform: Transform) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            transform,
            config: config.sanitized(),
            ground: None,
            layout: None,
            store: None,
            particles: None,
            stepper: create_stepper(),
            dirty: DirtyChunks::default(),
            foam_counter: FoamClearCounter::default(),
            partially_updated: false,
        })
    }

    /// Builder form of [`set_ground`](Self::set_ground)
    #[must_use]
    pub fn with_ground(mut self, ground: impl HeightSource + 'static) -> Self {
        self.ground = Some(Box::new(ground));
        self
    }

    /// Replace the ground source; takes effect on the next ground update
    pub fn set_ground(&mut self, ground: Option<Box<dyn HeightSource>>) {
        self.ground = ground;
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Move the grid; matrices follow on the next [`update_matrices`](Self::update_matrices)
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// Toggle the physics stages without touching the grid
    pub fn set_simulating(&mut self, simulating: bool) {
        self.config.simulating = simulating;
    }

    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.store.is_some()
    }

    #[must_use]
    pub fn layout(&self) -> Option<&GridLayout> {
        self.layout.as_ref()
    }

    #[must_use]
    pub fn store(&self) -> Option<&ColumnStore> {
        self.store.as_ref()
    }

    #[must_use]
    pub fn particles(&self) -> Option<&ParticlePool> {
        self.particles.as_ref()
    }

    /// Mutable access for snapshot restore
    pub(crate) fn parts_mut(&mut self) -> (Option<&mut ColumnStore>, Option<&mut ParticlePool>) {
        (self.store.as_mut(), self.particles.as_mut())
    }

    pub(crate) fn set_particles(&mut self, particles: Option<ParticlePool>) {
        self.particles = particles;
    }

    /// Allocate the grid, cast the ground and clear the fluid
    ///
    /// Returns `false` when already active or when the configuration yields
    /// no columns.
    pub fn activate(&mut self) -> bool {
        if self.is_activated() {
            return false;
        }
        let Some(layout) = GridLayout::new(&self.config, &self.transform) else {
            debug!("Simulation '{}' has no columns, activation skipped", self.name);
            return false;
        };
        let (width, height) = layout.column_count();
        info!("Activating simulation '{}' with {}x{} columns", self.name, width, height);

        self.store = Some(ColumnStore::allocate(width, height, &self.config.channel_formats()));
        self.layout = Some(layout);
        self.dirty.clear();
        self.update_ground();
        if let Some(store) = self.store.as_mut() {
            store.replace_fluids(0.0, Texel::zeros(), Texel::zeros(), 0.0);
            store.replace_outflow();
        }
        self.foam_counter = FoamClearCounter::default();
        self.partially_updated = false;
        if self.config.particles {
            self.activate_particles();
        }
        true
    }

    /// Release every channel
    pub fn deactivate(&mut self) {
        if self.is_activated() {
            info!("Deactivating simulation '{}'", self.name);
        }
        self.store = None;
        self.particles = None;
        self.layout = None;
        self.dirty.clear();
    }

    /// Allocate the particle pool if it is missing
    pub fn activate_particles(&mut self) -> bool {
        if self.particles.is_some() {
            return false;
        }
        let Some(store) = self.store.as_ref() else {
            return false;
        };
        self.particles = Some(ParticlePool::allocate(self.config.particle_limit, store));
        true
    }

    /// Recompute the grid matrices from the current transform
    pub fn update_matrices(&mut self) {
        if let Some(layout) = self.layout.as_mut() {
            layout.update_matrices(&self.transform);
        }
    }

    fn ground_cast(&self) -> GroundCast {
        GroundCast {
            height_min: self.config.height_min,
            height_max: self.config.height_max,
            height_radius: self.config.height_radius,
            table_depth: self.config.table_depth,
        }
    }

    fn rebuild_chunk(&mut self, chunk: (usize, usize)) {
        let cast = self.ground_cast();
        let (Some(layout), Some(store)) = (self.layout.as_ref(), self.store.as_mut()) else {
            return;
        };
        let (rect, texels) = build_chunk(layout, &self.transform, self.ground.as_deref(), &cast, chunk);
        if !rect.is_empty() {
            store.replace_rect_from(Channel::A, rect, &texels);
        }
    }

    /// Recast the ground under every column
    pub fn update_ground(&mut self) {
        let Some(layout) = self.layout.as_ref() else {
            return;
        };
        let (chunks_x, chunks_z) = chunk_count(layout);
        for z in 0..chunks_z {
            for x in 0..chunks_x {
                self.rebuild_chunk((x, z));
            }
        }
        self.dirty.clear();
    }

    /// Queue the chunks touched by a world-space circle for a rebuild
    pub fn dirty_ground(&mut self, world_center: &Vec3, world_radius: f32) {
        let Some(layout) = self.layout.as_ref() else {
            return;
        };
        for chunk in chunks_in_radius(layout, &self.transform, world_center, world_radius) {
            self.dirty.push(chunk);
        }
    }

    /// Queue every chunk for a rebuild
    pub fn dirty_all_ground(&mut self) {
        let Some(layout) = self.layout.as_ref() else {
            return;
        };
        let (chunks_x, chunks_z) = chunk_count(layout);
        for z in 0..chunks_z {
            for x in 0..chunks_x {
                self.dirty.push((x, z));
            }
        }
    }

    /// Rebuild the oldest dirty chunk; returns whether one was rebuilt
    pub fn update_dirty_ground(&mut self) -> bool {
        match self.dirty.pop() {
            Some(chunk) => {
                self.rebuild_chunk(chunk);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn dirty_chunks(&self) -> usize {
        self.dirty.len()
    }

    fn can_step(&self) -> bool {
        self.config.simulating && self.is_activated()
    }

    /// Compute new outflow fluxes
    pub fn step_forces(&mut self) {
        // Fluxes wait for a transport stage to consume them
        if !self.can_step() || self.partially_updated {
            return;
        }
        let params = ForceParams {
            model: self.config.physics_model,
            instability: self.config.physics_instability,
            spread: self.config.physics_spread,
            damping: self.config.physics_damping,
            speed: self.config.physics_speed,
            overflow: self.config.physics_overflow,
        };
        if let Some(store) = self.store.as_mut() {
            let fluxes = self.stepper.forces(store, &params);
            store.swap(Channel::B, fluxes);
            self.partially_updated = true;
        }
    }

    /// Move fluid along the fluxes computed by the last [`step_forces`](Self::step_forces)
    pub fn step_transport(&mut self, delta: f32) {
        if !self.can_step() || !self.partially_updated {
            return;
        }
        let params = TransportParams {
            delta,
            speed: self.config.speed,
            foam_decay: self.foam_counter.advance(self.config.foam_clear_rate, delta),
            overflow: self.config.physics_overflow,
        };
        if let Some(store) = self.store.as_mut() {
            let fluids = self.stepper.transport(store, &params);
            store.swap_fluids(fluids);
        }
        self.partially_updated = false;
    }

    /// Wet or dry the columns
    pub fn step_wetness(&mut self, delta: f32) {
        if !self.can_step() || !self.config.wetness {
            return;
        }
        let params = WetnessParams {
            delta,
            table_depth: self.config.table_depth,
            dry_rate: self.config.dry_rate,
        };
        if let Some(store) = self.store.as_mut() {
            let heights = self.stepper.wetness(store, &params);
            store.swap(Channel::A, heights);
        }
    }

    /// Land, accelerate and move the particles
    ///
    /// Returns the number of particles deposited into the grid.
    pub fn step_particles(&mut self, delta: f32, gravity: &Vec3) -> usize {
        if !self.can_step() {
            return 0;
        }
        let (Some(store), Some(pool), Some(layout)) = (self.store.as_mut(), self.particles.as_mut(), self.layout.as_ref())
        else {
            return 0;
        };

        let contribution = contribute(pool, store, layout);
        store.swap_fluids(contribution.fluids);
        pool.swap(Channel::B, contribution.positions);
        pool.swap(Channel::C, contribution.depths);

        let velocities = integrate_forces(pool, delta, gravity, self.config.particle_drag);
        pool.swap(Channel::A, velocities);
        let positions = integrate_motion(pool, delta);
        pool.swap(Channel::B, positions);
        contribution.landed
    }

    /// Write a particle into the next pool slot
    pub fn add_particle(&mut self, particle: &ParticleState) -> Option<usize> {
        self.particles.as_mut().map(|pool| pool.add(particle))
    }

    /// Overwrite ground and wet heights everywhere
    pub fn replace_heights(&mut self, ground: f32, wet: f32) {
        if let Some(store) = self.store.as_mut() {
            store.replace_heights(ground, wet);
        }
    }

    /// Overwrite the fluid everywhere
    pub fn replace_fluids(&mut self, depth: f32, color: Texel, esmv: Texel, foam: f32) {
        if let Some(store) = self.store.as_mut() {
            store.replace_fluids(depth, color, esmv, foam);
        }
    }

    pub fn replace_outflow(&mut self) {
        if let Some(store) = self.store.as_mut() {
            store.replace_outflow();
        }
    }

    /// Whether a world point lies over the grid in XZ
    #[must_use]
    pub fn overlap_xz(&self, world: &Vec3) -> bool {
        self.layout
            .as_ref()
            .is_some_and(|layout| layout.overlap_xz(&self.transform, world))
    }

    /// XZ distance from a world point to the grid (infinite while inactive)
    #[must_use]
    pub fn distance_xz(&self, world: &Vec3) -> f32 {
        self.layout
            .as_ref()
            .map_or(f32::INFINITY, |layout| layout.distance_xz(&self.transform, world))
    }

    #[must_use]
    pub fn volume_per_column(&self) -> f32 {
        self.layout.as_ref().map_or(0.0, GridLayout::volume_per_column)
    }

    /// Sum of depth over every column
    #[must_use]
    pub fn total_depth(&self) -> f32 {
        self.store.as_ref().map_or(0.0, ColumnStore::total_depth)
    }

    /// Fluid volume held by the grid
    #[must_use]
    pub fn total_volume(&self) -> f32 {
        self.total_depth() * self.volume_per_column()
    }

    /// Apply a modifier once; `None` when inactive or nothing changed
    pub fn apply_modifier(
        &mut self,
        modifier: &Modifier,
        prepared: &PreparedModifier,
        multiplier: f32,
    ) -> Option<ApplyReport> {
        let (Some(layout), Some(store)) = (self.layout.as_ref(), self.store.as_mut()) else {
            debug!("Modifier skipped on inactive simulation '{}'", self.name);
            return None;
        };
        apply_to_grid(
            modifier,
            prepared,
            multiplier,
            GridTarget {
                layout,
                transform: &self.transform,
                overflow: self.config.physics_overflow,
                store,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::FlatGround;
    use crate::modifier::ModifierMode;
    use approx::assert_relative_eq;

    fn small() -> FlowSimulation {
        FlowSimulation::new("test", SimulationConfig::with_size(8.0, 8.0, 1.0), Transform::identity())
            .unwrap()
            .with_ground(FlatGround::new(0.0))
    }

    #[test]
    fn test_activation_clears_fluid_and_casts_ground() {
        let mut sim = small();
        assert!(!sim.is_activated());
        assert!(sim.activate());
        assert!(!sim.activate());

        let store = sim.store().unwrap();
        assert_relative_eq!(store.total_depth(), 0.0);
        assert_relative_eq!(store.a().get(3, 3).x, 0.0);
        assert_relative_eq!(store.a().get(3, 3).y, -1.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimulationConfig {
            separation: 0.0,
            ..SimulationConfig::default()
        };
        assert!(FlowSimulation::new("bad", config, Transform::identity()).is_err());
    }

    #[test]
    fn test_inactive_queries_are_neutral() {
        let mut sim = small();
        assert!(!sim.overlap_xz(&Vec3::zeros()));
        assert!(sim.distance_xz(&Vec3::zeros()).is_infinite());
        assert_relative_eq!(sim.total_volume(), 0.0);

        let modifier = Modifier::new(ModifierMode::AddFluid).at(Vec3::new(4.0, 0.0, 4.0));
        assert!(sim.apply_modifier(&modifier, &PreparedModifier::new(&modifier), 1.0).is_none());
        assert!(!sim.is_activated());
    }

    #[test]
    fn test_transport_needs_forces_first() {
        let mut sim = small();
        sim.activate();
        let modifier = Modifier::new(ModifierMode::AddFluid).at(Vec3::new(4.0, 0.0, 4.0)).with_size(2.0, 2.0);
        let prepared = PreparedModifier::new(&modifier);
        sim.apply_modifier(&modifier, &prepared, 1.0).unwrap();
        let before = sim.store().unwrap().c().as_slice().to_vec();

        sim.step_transport(0.02);
        assert_eq!(sim.store().unwrap().c().as_slice(), before.as_slice());

        sim.step_forces();
        sim.step_transport(0.02);
        assert_ne!(sim.store().unwrap().c().as_slice(), before.as_slice());
        assert_relative_eq!(sim.total_depth(), before.iter().map(|t| t.x).sum::<f32>(), epsilon = 1.0e-3);
    }

    #[test]
    fn test_forces_hold_until_transport_runs() {
        let mut sim = small();
        sim.activate();
        let modifier = Modifier::new(ModifierMode::AddFluid).at(Vec3::new(4.0, 0.0, 4.0)).with_size(2.0, 2.0);
        let prepared = PreparedModifier::new(&modifier);
        sim.apply_modifier(&modifier, &prepared, 1.0).unwrap();

        sim.step_forces();
        let once = sim.store().unwrap().b().as_slice().to_vec();
        assert!(once.iter().any(|t| t.x != 0.0 || t.y != 0.0 || t.z != 0.0 || t.w != 0.0));
        sim.step_forces();
        assert_eq!(sim.store().unwrap().b().as_slice(), once.as_slice());

        // Transport consumes the fluxes and frees the next force stage
        sim.step_transport(0.02);
        sim.step_forces();
        assert_ne!(sim.store().unwrap().b().as_slice(), once.as_slice());
    }

    #[test]
    fn test_dirty_ground_rebuilds_one_chunk_per_call() {
        let mut sim = small();
        sim.activate();
        sim.replace_heights(5.0, 0.0);
        sim.dirty_ground(&Vec3::new(4.0, 0.0, 4.0), 1.0);
        assert_eq!(sim.dirty_chunks(), 1);
        assert!(sim.update_dirty_ground());
        assert!(!sim.update_dirty_ground());
        assert_relative_eq!(sim.store().unwrap().a().get(2, 2).x, 0.0);
    }

    #[test]
    fn test_particles_need_pool() {
        let mut sim = small();
        sim.activate();
        let particle = ParticleState {
            velocity: Vec3::zeros(),
            age: 0.0,
            position: Vec3::new(4.0, 1.0, 4.0),
            life: 5.0,
            depth: 0.1,
            color: Texel::repeat(1.0),
            esmv: Texel::zeros(),
            foam: Texel::zeros(),
        };
        assert_eq!(sim.add_particle(&particle), None);
        assert!(sim.activate_particles());
        assert_eq!(sim.add_particle(&particle), Some(0));
    }

    #[test]
    fn test_falling_particle_lands() {
        let mut sim = small();
        sim.activate();
        sim.activate_particles();
        sim.add_particle(&ParticleState {
            velocity: Vec3::zeros(),
            age: 0.0,
            position: Vec3::new(4.0, 0.5, 4.0),
            life: 5.0,
            depth: 0.25,
            color: Texel::repeat(1.0),
            esmv: Texel::zeros(),
            foam: Texel::zeros(),
        });
        let gravity = Vec3::new(0.0, -9.81, 0.0);
        let mut landed = 0;
        for _ in 0..20 {
            landed += sim.step_particles(0.05, &gravity);
        }
        assert_eq!(landed, 1);
        assert_relative_eq!(sim.total_depth(), 0.25, epsilon = 1.0e-5);
        assert_eq!(sim.particles().unwrap().live_count(), 0);
    }
}
