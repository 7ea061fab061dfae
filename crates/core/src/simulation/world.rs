//! The world: registries and the tick driver
//!
//! [`FlowWorld`] owns every simulation and every object that acts on them.
//! Registries keep insertion order, so iteration during a tick is stable.
//! The caller drives two clocks:
//!
//! - [`FlowWorld::frame_update`] once per rendered frame (activation, ground
//!   rebuilds, one-shot modifiers, container gating, area checks, triggers
//!   and splash surfaces)
//! - [`FlowWorld::fixed_update`] once per physics tick (forces, transport,
//!   continuous modifiers, particles, wetness, point samples and sampler
//!   collection)
//!
//! Everything observable is reported as a [`FlowEvent`] and drained with
//! [`FlowWorld::drain_events`].

use super::config::{UpdateMode, WorldConfig};
use super::events::{
    ContainerId, FlowEvent, HandlerId, LinkId, ModifierId, PointSampleId, SampleAreaId, SimulationId,
    SplashSurfaceId, TriggerId,
};
use super::flow_simulation::FlowSimulation;
use crate::core_types::Vec3;
use crate::modifier::container::{route, update_enabled};
use crate::modifier::{
    ApplyReport, ApplyType, Container, ContainerLink, Modifier, PreparedModifier, SpeedControl, Splash,
    SplashSurface,
};
use crate::sampler::{AsyncSampler, PointSample, SampleArea, SampleHandler, SampleOwner, TriggerArea};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::mem;
use tracing::{debug, info};

/// A splash surface, the point sample it watches and the splash it fires
#[derive(Debug, Clone)]
struct SurfaceEntry {
    sample: PointSampleId,
    surface: SplashSurface,
    splash: Splash,
}

/// Registry of simulations and their collaborators, plus the tick driver
pub struct FlowWorld {
    config: WorldConfig,
    simulations: IndexMap<SimulationId, FlowSimulation>,
    modifiers: IndexMap<ModifierId, Modifier>,
    speed_controls: IndexMap<ModifierId, SpeedControl>,
    point_samples: IndexMap<PointSampleId, PointSample>,
    areas: IndexMap<SampleAreaId, SampleArea>,
    triggers: IndexMap<TriggerId, TriggerArea>,
    containers: IndexMap<ContainerId, Container>,
    links: IndexMap<LinkId, ContainerLink<ModifierId, ContainerId>>,
    splash_surfaces: IndexMap<SplashSurfaceId, SurfaceEntry>,
    handlers: IndexMap<HandlerId, Box<dyn SampleHandler>>,
    sampler: AsyncSampler,
    events: Vec<FlowEvent>,
    rng: StdRng,
    next_id: u32,
    /// Forces ran on the last tick in every-other-frame mode
    partially_updated: bool,
}

impl Default for FlowWorld {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl std::fmt::Debug for FlowWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowWorld")
            .field("config", &self.config)
            .field("simulations", &self.simulations.len())
            .field("modifiers", &self.modifiers.len())
            .field("point_samples", &self.point_samples.len())
            .field("areas", &self.areas.len())
            .field("sampler", &self.sampler)
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl FlowWorld {
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        Self::with_sampler(config, AsyncSampler::default())
    }

    /// World using a specific sampler, e.g. one with a latency backend
    #[must_use]
    pub fn with_sampler(config: WorldConfig, sampler: AsyncSampler) -> Self {
        info!("Creating flow world ({:?}, readback: {})", config.update_mode, sampler.backend_name());
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            simulations: IndexMap::new(),
            modifiers: IndexMap::new(),
            speed_controls: IndexMap::new(),
            point_samples: IndexMap::new(),
            areas: IndexMap::new(),
            triggers: IndexMap::new(),
            containers: IndexMap::new(),
            links: IndexMap::new(),
            splash_surfaces: IndexMap::new(),
            handlers: IndexMap::new(),
            sampler,
            events: Vec::new(),
            next_id: 0,
            partially_updated: false,
        }
    }

    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    #[must_use]
    pub fn sampler(&self) -> &AsyncSampler {
        &self.sampler
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ------------------------------------------------------------------
    // Registries
    // ------------------------------------------------------------------

    /// Register a simulation; it activates on the next frame update
    pub fn add_simulation(&mut self, simulation: FlowSimulation) -> SimulationId {
        let id = SimulationId(self.next_id());
        self.simulations.insert(id, simulation);
        id
    }

    pub fn remove_simulation(&mut self, id: SimulationId) -> Option<FlowSimulation> {
        self.simulations.shift_remove(&id)
    }

    #[must_use]
    pub fn simulation(&self, id: SimulationId) -> Option<&FlowSimulation> {
        self.simulations.get(&id)
    }

    pub fn simulation_mut(&mut self, id: SimulationId) -> Option<&mut FlowSimulation> {
        self.simulations.get_mut(&id)
    }

    pub fn simulations(&self) -> impl Iterator<Item = (SimulationId, &FlowSimulation)> {
        self.simulations.iter().map(|(id, sim)| (*id, sim))
    }

    /// Activate one simulation now instead of on the next frame update
    pub fn activate_simulation(&mut self, id: SimulationId) -> bool {
        let activated = self.simulations.get_mut(&id).is_some_and(FlowSimulation::activate);
        if activated {
            self.events.push(FlowEvent::Activated(id));
        }
        activated
    }

    pub fn add_modifier(&mut self, modifier: Modifier) -> ModifierId {
        let id = ModifierId(self.next_id());
        self.modifiers.insert(id, modifier);
        id
    }

    /// Remove a modifier with its speed control and container links
    pub fn remove_modifier(&mut self, id: ModifierId) -> Option<Modifier> {
        self.speed_controls.shift_remove(&id);
        self.links.retain(|_, link| link.modifier != id);
        self.modifiers.shift_remove(&id)
    }

    #[must_use]
    pub fn modifier(&self, id: ModifierId) -> Option<&Modifier> {
        self.modifiers.get(&id)
    }

    pub fn modifier_mut(&mut self, id: ModifierId) -> Option<&mut Modifier> {
        self.modifiers.get_mut(&id)
    }

    /// Drive a modifier's strength from its movement
    pub fn set_speed_control(&mut self, id: ModifierId, mut control: SpeedControl) -> bool {
        let Some(modifier) = self.modifiers.get(&id) else {
            return false;
        };
        control.reset(&modifier.transform);
        self.speed_controls.insert(id, control);
        true
    }

    #[must_use]
    pub fn speed_control(&self, id: ModifierId) -> Option<&SpeedControl> {
        self.speed_controls.get(&id)
    }

    pub fn add_point_sample(&mut self, sample: PointSample) -> PointSampleId {
        let id = PointSampleId(self.next_id());
        self.point_samples.insert(id, sample);
        id
    }

    pub fn remove_point_sample(&mut self, id: PointSampleId) -> Option<PointSample> {
        self.point_samples.shift_remove(&id)
    }

    #[must_use]
    pub fn point_sample(&self, id: PointSampleId) -> Option<&PointSample> {
        self.point_samples.get(&id)
    }

    pub fn point_sample_mut(&mut self, id: PointSampleId) -> Option<&mut PointSample> {
        self.point_samples.get_mut(&id)
    }

    pub fn add_area(&mut self, area: SampleArea) -> SampleAreaId {
        let id = SampleAreaId(self.next_id());
        self.areas.insert(id, area);
        id
    }

    pub fn remove_area(&mut self, id: SampleAreaId) -> Option<SampleArea> {
        self.areas.shift_remove(&id)
    }

    #[must_use]
    pub fn area(&self, id: SampleAreaId) -> Option<&SampleArea> {
        self.areas.get(&id)
    }

    pub fn area_mut(&mut self, id: SampleAreaId) -> Option<&mut SampleArea> {
        self.areas.get_mut(&id)
    }

    pub fn add_trigger(&mut self, trigger: TriggerArea) -> TriggerId {
        let id = TriggerId(self.next_id());
        self.triggers.insert(id, trigger);
        id
    }

    pub fn remove_trigger(&mut self, id: TriggerId) -> Option<TriggerArea> {
        self.triggers.shift_remove(&id)
    }

    #[must_use]
    pub fn trigger(&self, id: TriggerId) -> Option<&TriggerArea> {
        self.triggers.get(&id)
    }

    pub fn add_container(&mut self, container: Container) -> ContainerId {
        let id = ContainerId(self.next_id());
        self.containers.insert(id, container);
        id
    }

    /// Remove a container and every link to it
    pub fn remove_container(&mut self, id: ContainerId) -> Option<Container> {
        self.links.retain(|_, link| link.container != id);
        self.containers.shift_remove(&id)
    }

    #[must_use]
    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(&id)
    }

    /// Set a container's volume, reporting the change
    pub fn set_container_volume(&mut self, id: ContainerId, volume: f32) -> bool {
        let Some(container) = self.containers.get_mut(&id) else {
            return false;
        };
        let changed = container.set_volume(volume);
        if changed {
            self.events.push(FlowEvent::ContainerVolume {
                container: id,
                volume: container.volume(),
                volume01: container.volume01(),
            });
        }
        changed
    }

    /// Feed a modifier from a container, or drain into one
    pub fn link_container(&mut self, modifier: ModifierId, container: ContainerId) -> LinkId {
        let id = LinkId(self.next_id());
        self.links.insert(id, ContainerLink::new(modifier, container));
        id
    }

    pub fn unlink_container(&mut self, id: LinkId) -> bool {
        self.links.shift_remove(&id).is_some()
    }

    /// Fire `splash` whenever the submersion of `sample` jumps
    pub fn add_splash_surface(
        &mut self,
        sample: PointSampleId,
        surface: SplashSurface,
        splash: Splash,
    ) -> SplashSurfaceId {
        let id = SplashSurfaceId(self.next_id());
        self.splash_surfaces.insert(id, SurfaceEntry { sample, surface, splash });
        id
    }

    pub fn remove_splash_surface(&mut self, id: SplashSurfaceId) -> bool {
        self.splash_surfaces.shift_remove(&id).is_some()
    }

    #[must_use]
    pub fn splash_surface(&self, id: SplashSurfaceId) -> Option<&SplashSurface> {
        self.splash_surfaces.get(&id).map(|entry| &entry.surface)
    }

    pub fn add_handler(&mut self, handler: Box<dyn SampleHandler>) -> HandlerId {
        let id = HandlerId(self.next_id());
        self.handlers.insert(id, handler);
        id
    }

    pub fn remove_handler(&mut self, id: HandlerId) -> Option<Box<dyn SampleHandler>> {
        self.handlers.shift_remove(&id)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn nearest_simulation(
        simulations: &IndexMap<SimulationId, FlowSimulation>,
        point: &Vec3,
        current: Option<SimulationId>,
    ) -> Option<SimulationId> {
        if let Some(current) = current {
            if simulations.get(&current).is_some_and(FlowSimulation::is_activated) {
                return Some(current);
            }
        }
        let mut best = None;
        let mut best_distance = f32::INFINITY;
        for (id, simulation) in simulations {
            if !simulation.is_activated() {
                continue;
            }
            let distance = simulation.distance_xz(point);
            if distance < best_distance {
                best_distance = distance;
                best = Some(*id);
            }
        }
        best
    }

    /// `current` when it is activated, otherwise the activated simulation closest in XZ
    #[must_use]
    pub fn find_simulation(&self, point: &Vec3, current: Option<SimulationId>) -> Option<SimulationId> {
        Self::nearest_simulation(&self.simulations, point, current)
    }

    /// Whether any activated simulation lies under `point` in XZ
    #[must_use]
    pub fn overlap_xz(&self, point: &Vec3) -> bool {
        self.simulations.values().any(|simulation| simulation.overlap_xz(point))
    }

    /// Queue ground rebuilds around a world point on every simulation
    pub fn dirty_ground_all(&mut self, world_center: &Vec3, world_radius: f32) {
        for simulation in self.simulations.values_mut() {
            simulation.dirty_ground(world_center, world_radius);
        }
    }

    // ------------------------------------------------------------------
    // Modifiers and splashes
    // ------------------------------------------------------------------

    fn apply_everywhere(
        simulations: &mut IndexMap<SimulationId, FlowSimulation>,
        modifier: &Modifier,
        multiplier: f32,
    ) -> Vec<(SimulationId, ApplyReport, f32)> {
        let prepared = PreparedModifier::new(modifier);
        simulations
            .iter_mut()
            .filter_map(|(id, simulation)| {
                let report = simulation.apply_modifier(modifier, &prepared, multiplier)?;
                Some((*id, report, simulation.volume_per_column()))
            })
            .collect()
    }

    /// Apply a registered modifier to every simulation it covers
    ///
    /// Reports `Applied` per simulation changed, the depth and volume deltas
    /// of monitored modifiers, and moves those volumes into linked
    /// containers. Returns the number of simulations changed.
    pub fn apply_modifier(&mut self, id: ModifierId, multiplier: f32) -> usize {
        let Some(modifier) = self.modifiers.get(&id) else {
            return 0;
        };
        if !modifier.enabled {
            return 0;
        }

        let reports = Self::apply_everywhere(&mut self.simulations, modifier, multiplier);
        for (simulation, report, volume_per_column) in &reports {
            self.events.push(FlowEvent::Applied {
                modifier: id,
                simulation: *simulation,
                multiplier,
            });
            let Some(delta) = report.depth_delta else {
                continue;
            };
            let volume = delta * volume_per_column;
            self.events.push(FlowEvent::FluidDepthDelta {
                modifier: id,
                simulation: *simulation,
                delta,
            });
            self.events.push(FlowEvent::FluidVolumeDelta {
                modifier: id,
                simulation: *simulation,
                delta: volume,
            });

            for link in self.links.values().filter(|link| link.modifier == id) {
                let Some(container) = self.containers.get_mut(&link.container) else {
                    continue;
                };
                if route(container, volume) {
                    self.events.push(FlowEvent::ContainerVolume {
                        container: link.container,
                        volume: container.volume(),
                        volume01: container.volume01(),
                    });
                }
            }
        }
        reports.len()
    }

    /// Apply `splash` at `position` and launch its particles into the nearest simulation
    ///
    /// Returns the number of particles added.
    pub fn apply_splash(&mut self, splash: &Splash, position: &Vec3, strength: f32, scale: f32) -> usize {
        self.fire_splash(None, splash, position, strength, scale)
    }

    fn fire_splash(
        &mut self,
        surface: Option<SplashSurfaceId>,
        splash: &Splash,
        position: &Vec3,
        strength: f32,
        scale: f32,
    ) -> usize {
        for modifier in splash.placed_modifiers(position, scale) {
            for (simulation, _, _) in Self::apply_everywhere(&mut self.simulations, &modifier, strength) {
                self.events.push(FlowEvent::SplashApplied {
                    surface,
                    simulation,
                    strength,
                });
            }
        }

        let mut added = 0;
        if !splash.emitters.is_empty() {
            if let Some(id) = Self::nearest_simulation(&self.simulations, position, None) {
                let particles = splash.emit_particles(position, strength, &mut self.rng);
                if let Some(simulation) = self.simulations.get_mut(&id) {
                    for particle in &particles {
                        if simulation.add_particle(particle).is_some() {
                            added += 1;
                        }
                    }
                }
            }
        }

        debug!("Splash {:?} applied at strength {}, {} particles added", surface, strength, added);
        self.events.push(FlowEvent::Splash {
            surface,
            position: *position,
            strength,
        });
        added
    }

    // ------------------------------------------------------------------
    // Sampling
    // ------------------------------------------------------------------

    /// Request a point sample for a caller-supplied handler
    ///
    /// Returns `false` when no simulation is available or the atlas is full.
    pub fn request_sample(&mut self, handler: HandlerId, simulation: Option<SimulationId>, position: &Vec3) -> bool {
        if !self.handlers.contains_key(&handler) {
            return false;
        }
        let Some(id) = Self::nearest_simulation(&self.simulations, position, simulation) else {
            return false;
        };
        let Some(simulation) = self.simulations.get(&id) else {
            return false;
        };
        let (Some(store), Some(layout)) = (simulation.store(), simulation.layout()) else {
            return false;
        };
        self.sampler
            .sample_point(SampleOwner::Handler(handler), id, store, layout, simulation.transform(), position)
    }

    fn dispatch_point_samples(&mut self) {
        if !self.sampler.is_ready() {
            return;
        }
        for (id, sample) in &mut self.point_samples {
            let position = sample.position;
            let target = Self::nearest_simulation(&self.simulations, &position, sample.simulation)
                .and_then(|sim_id| self.simulations.get(&sim_id).map(|simulation| (sim_id, simulation)));
            let Some((sim_id, simulation)) = target else {
                sample.clear();
                continue;
            };
            let (Some(store), Some(layout)) = (simulation.store(), simulation.layout()) else {
                sample.clear();
                continue;
            };
            sample.set_pending(if simulation.overlap_xz(&position) { 1.0 } else { 0.0 });
            self.sampler
                .sample_point(SampleOwner::Point(*id), sim_id, store, layout, simulation.transform(), &position);
        }
    }

    fn collect_samples(&mut self) {
        for completion in self.sampler.update() {
            match completion.owner {
                SampleOwner::Point(id) => {
                    if let Some(sample) = self.point_samples.get_mut(&id) {
                        sample.handle_samples(&completion.samples);
                        self.events.push(FlowEvent::PointSampled(id));
                    }
                }
                SampleOwner::Area(id) => {
                    let Some(area) = self.areas.get_mut(&id) else {
                        continue;
                    };
                    let layout = self.simulations.get(&completion.simulation).and_then(FlowSimulation::layout);
                    let Some(layout) = layout else {
                        area.cancel_check();
                        continue;
                    };
                    area.handle_samples(&completion.samples, layout);
                    self.events.push(FlowEvent::AreaSampled(id));
                    let area = &*area;
                    self.events
                        .extend(area.watchers.iter().filter_map(|watcher| watcher.event(id, area)));
                }
                SampleOwner::Handler(id) => {
                    if let Some(handler) = self.handlers.get_mut(&id) {
                        handler.handle_samples(completion.simulation, &completion.samples);
                    }
                }
            }
        }
    }

    fn check_areas(&mut self, delta: f32) {
        for (id, area) in &mut self.areas {
            if !area.tick(delta) {
                continue;
            }
            let Some(sim_id) = Self::nearest_simulation(&self.simulations, &area.transform.position, area.simulation)
            else {
                continue;
            };
            let Some(simulation) = self.simulations.get(&sim_id) else {
                continue;
            };
            let (Some(store), Some(layout)) = (simulation.store(), simulation.layout()) else {
                continue;
            };
            let Some(query) = area.begin_check(layout) else {
                continue;
            };
            let sent = self.sampler.sample_area(SampleOwner::Area(*id), sim_id, store, layout, &query);
            if !sent {
                area.cancel_check();
            }
        }
    }

    // ------------------------------------------------------------------
    // Ticks
    // ------------------------------------------------------------------

    /// Per-frame work that does not step the physics
    pub fn frame_update(&mut self, delta: f32) {
        for (id, simulation) in &mut self.simulations {
            if simulation.is_activated() {
                simulation.update_matrices();
                simulation.update_dirty_ground();
            } else if simulation.activate() {
                self.events.push(FlowEvent::Activated(*id));
            }
        }

        for link in self.links.values() {
            if let Some(modifier) = self.modifiers.get_mut(&link.modifier) {
                update_enabled(modifier, self.containers.get(&link.container));
            }
        }

        let once: Vec<ModifierId> = self
            .modifiers
            .iter_mut()
            .filter(|(_, modifier)| modifier.apply == ApplyType::Once && modifier.enabled)
            .filter_map(|(id, modifier)| modifier.take_primed().then_some(*id))
            .collect();
        for id in once {
            self.apply_modifier(id, 1.0);
        }

        self.check_areas(delta);

        for (id, trigger) in &mut self.triggers {
            match trigger.update(self.areas.get(&trigger.area)) {
                Some(true) => self.events.push(FlowEvent::TriggerMet(*id)),
                Some(false) => self.events.push(FlowEvent::TriggerUnmet(*id)),
                None => {}
            }
        }

        let mut fired = Vec::new();
        for (id, entry) in &mut self.splash_surfaces {
            let sample = self.point_samples.get(&entry.sample);
            let submersion = sample.filter(|sample| sample.sampled()).map(PointSample::submersion);
            if let (Some(strength), Some(sample)) = (entry.surface.update(submersion, delta), sample) {
                fired.push((*id, sample.position, strength, entry.surface.scale));
            }
        }
        for (id, position, strength, scale) in fired {
            let Some(splash) = self.splash_surfaces.get(&id).map(|entry| entry.splash.clone()) else {
                continue;
            };
            self.fire_splash(Some(id), &splash, &position, strength, scale);
        }
    }

    fn update_speed_controls(&mut self, delta: f32) {
        for (id, control) in &mut self.speed_controls {
            let Some(modifier) = self.modifiers.get_mut(id) else {
                continue;
            };
            let update = control.update(&modifier.transform, delta, modifier.mode.is_uniform_force());
            modifier.strength = update.strength;
            if let Some(angle) = update.angle {
                modifier.angle = angle;
            }
        }
    }

    fn update_modifiers(&mut self, delta: f32) {
        let continuous: Vec<ModifierId> = self
            .modifiers
            .iter()
            .filter(|(_, modifier)| modifier.apply == ApplyType::Continuously && modifier.enabled)
            .map(|(id, _)| *id)
            .collect();
        for id in continuous {
            self.apply_modifier(id, delta);
        }
    }

    fn step_forces(&mut self) {
        for simulation in self.simulations.values_mut() {
            simulation.step_forces();
        }
    }

    fn step_transport(&mut self, delta: f32) {
        for simulation in self.simulations.values_mut() {
            simulation.step_transport(delta);
        }
    }

    fn step_particles(&mut self, delta: f32) {
        let gravity = self.config.gravity;
        for simulation in self.simulations.values_mut() {
            simulation.step_particles(delta, &gravity);
        }
    }

    /// One physics tick
    pub fn fixed_update(&mut self, delta: f32) {
        self.update_speed_controls(delta);

        match self.config.update_mode {
            UpdateMode::EveryFrame => {
                self.step_forces();
                self.step_transport(delta);
                self.update_modifiers(delta);
                self.step_particles(delta);
            }
            UpdateMode::EveryOtherFrame => {
                if self.partially_updated {
                    self.step_transport(delta * 2.0);
                    self.update_modifiers(delta * 2.0);
                } else {
                    self.step_forces();
                }
                self.step_particles(delta);
                self.partially_updated = !self.partially_updated;
            }
        }

        for (id, simulation) in &mut self.simulations {
            if simulation.is_activated() {
                simulation.step_wetness(delta);
                self.events.push(FlowEvent::SimulationUpdated(*id));
            }
        }

        self.dispatch_point_samples();
        self.collect_samples();
    }

    /// Events since the last drain, oldest first
    #[must_use]
    pub fn events(&self) -> &[FlowEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<FlowEvent> {
        mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Transform;
    use crate::grid::FlatGround;
    use crate::modifier::ModifierMode;
    use crate::sampler::{AreaWatcher, CheckType, TriggerCriteria};
    use crate::simulation::SimulationConfig;
    use approx::assert_relative_eq;

    fn world_with_grid() -> (FlowWorld, SimulationId) {
        let mut world = FlowWorld::default();
        let sim = FlowSimulation::new("grid", SimulationConfig::with_size(8.0, 8.0, 1.0), Transform::identity())
            .unwrap()
            .with_ground(FlatGround::new(0.0));
        let id = world.add_simulation(sim);
        world.frame_update(0.0);
        (world, id)
    }

    fn pour(at: Vec3) -> Modifier {
        Modifier::new(ModifierMode::AddFluid)
            .at(at)
            .with_size(2.0, 2.0)
            .with_apply(ApplyType::Manually)
    }

    #[test]
    fn test_frame_update_activates() {
        let (mut world, id) = world_with_grid();
        assert!(world.simulation(id).unwrap().is_activated());
        assert_eq!(world.drain_events(), vec![FlowEvent::Activated(id)]);
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn test_find_simulation_prefers_override_then_nearest() {
        let (mut world, near) = world_with_grid();
        let far = world.add_simulation(
            FlowSimulation::new(
                "far",
                SimulationConfig::with_size(8.0, 8.0, 1.0),
                Transform::from_position(Vec3::new(100.0, 0.0, 0.0)),
            )
            .unwrap(),
        );
        world.frame_update(0.0);

        assert_eq!(world.find_simulation(&Vec3::new(4.0, 0.0, 4.0), None), Some(near));
        assert_eq!(world.find_simulation(&Vec3::new(90.0, 0.0, 4.0), None), Some(far));
        assert_eq!(world.find_simulation(&Vec3::new(4.0, 0.0, 4.0), Some(far)), Some(far));
        assert!(world.overlap_xz(&Vec3::new(104.0, 0.0, 4.0)));
        assert!(!world.overlap_xz(&Vec3::new(50.0, 0.0, 4.0)));
    }

    #[test]
    fn test_monitored_modifier_fills_container() {
        let (mut world, _) = world_with_grid();
        let drain = world.add_modifier(
            Modifier::new(ModifierMode::RemoveFluid)
                .at(Vec3::new(4.0, 0.0, 4.0))
                .with_size(2.0, 2.0)
                .with_apply(ApplyType::Manually)
                .with_monitoring(true),
        );
        let bucket = world.add_container(Container::new(0.0, 100.0, true));
        world.link_container(drain, bucket);

        let fill = world.add_modifier(pour(Vec3::new(4.0, 0.0, 4.0)));
        world.apply_modifier(fill, 1.0);
        world.drain_events();

        assert_eq!(world.apply_modifier(drain, 1.0), 1);
        let container = world.container(bucket).unwrap();
        assert!(container.volume() > 0.0);
        let events = world.drain_events();
        assert!(events
            .iter()
            .any(|event| matches!(event, FlowEvent::FluidDepthDelta { delta, .. } if *delta > 0.0)));
        assert!(events.iter().any(|event| matches!(event, FlowEvent::ContainerVolume { .. })));
    }

    #[test]
    fn test_empty_container_disables_pour() {
        let (mut world, _) = world_with_grid();
        let fill = world.add_modifier(pour(Vec3::new(4.0, 0.0, 4.0)));
        let tank = world.add_container(Container::new(0.0, 100.0, true));
        world.link_container(fill, tank);

        world.frame_update(0.0);
        assert!(!world.modifier(fill).unwrap().enabled);
        assert_eq!(world.apply_modifier(fill, 1.0), 0);

        world.set_container_volume(tank, 10.0);
        world.frame_update(0.0);
        assert!(world.modifier(fill).unwrap().enabled);
    }

    #[test]
    fn test_splash_reports_each_changed_simulation() {
        let (mut world, id) = world_with_grid();
        world.drain_events();
        let splash = Splash::new(vec![Modifier::new(ModifierMode::AddFluid).with_size(2.0, 2.0)]);

        world.apply_splash(&splash, &Vec3::new(4.0, 0.0, 4.0), 1.0, 1.0);
        let events = world.drain_events();
        assert!(events.contains(&FlowEvent::SplashApplied {
            surface: None,
            simulation: id,
            strength: 1.0,
        }));
        assert!(matches!(events.last(), Some(FlowEvent::Splash { surface: None, .. })));
        assert!(world.simulation(id).unwrap().total_depth() > 0.0);

        // Nothing changes far outside the grid
        world.apply_splash(&splash, &Vec3::new(500.0, 0.0, 500.0), 1.0, 1.0);
        let events = world.drain_events();
        assert!(!events.iter().any(|event| matches!(event, FlowEvent::SplashApplied { .. })));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_once_modifier_applies_one_time() {
        let (mut world, id) = world_with_grid();
        world.add_modifier(pour(Vec3::new(4.0, 0.0, 4.0)).with_apply(ApplyType::Once));
        world.frame_update(0.0);
        let after_first = world.simulation(id).unwrap().total_depth();
        world.frame_update(0.0);
        assert!(after_first > 0.0);
        assert_relative_eq!(world.simulation(id).unwrap().total_depth(), after_first);
    }

    #[test]
    fn test_point_sample_reads_after_fixed_update() {
        let (mut world, _) = world_with_grid();
        let fill = world.add_modifier(pour(Vec3::new(4.0, 0.0, 4.0)));
        world.apply_modifier(fill, 1.0);
        let sample = world.add_point_sample(PointSample::new(Vec3::new(4.0, 0.0, 4.0)));

        world.fixed_update(0.0);
        let sample = world.point_sample(sample).unwrap();
        assert!(sample.sampled());
        assert!(sample.depth() > 0.0);
        assert_relative_eq!(sample.overlap(), 1.0);
    }

    #[test]
    fn test_area_trigger_met_after_check() {
        let (mut world, _) = world_with_grid();
        let fill = world.add_modifier(pour(Vec3::new(4.0, 0.0, 4.0)));
        world.apply_modifier(fill, 1.0);

        let area = world.add_area(
            SampleArea::new(Transform::from_position(Vec3::new(4.0, 0.0, 4.0)), 6.0, 6.0)
                .with_check(CheckType::Manually, 1.0)
                .with_watcher(AreaWatcher::Volume),
        );
        let trigger = world.add_trigger(TriggerArea::new(area, TriggerCriteria::Above).with_range(0.5, 0.5));
        world.area_mut(area).unwrap().prime();
        world.drain_events();

        world.frame_update(0.0);
        world.fixed_update(0.0);
        assert!(world.area(area).unwrap().sampled());
        world.frame_update(0.0);

        assert!(world.trigger(trigger).unwrap().met());
        let events = world.drain_events();
        assert!(events.contains(&FlowEvent::TriggerMet(trigger)));
        assert!(events.iter().any(|event| matches!(event, FlowEvent::AreaVolume { .. })));
    }

    #[test]
    fn test_every_other_frame_alternates_stages() {
        let mut world = FlowWorld::new(WorldConfig {
            update_mode: UpdateMode::EveryOtherFrame,
            ..WorldConfig::default()
        });
        let id = world.add_simulation(
            FlowSimulation::new("grid", SimulationConfig::with_size(8.0, 8.0, 1.0), Transform::identity())
                .unwrap()
                .with_ground(FlatGround::new(0.0)),
        );
        world.frame_update(0.0);
        world.add_modifier(Modifier::new(ModifierMode::AddFluid).at(Vec3::new(4.0, 0.0, 4.0)).with_size(2.0, 2.0));

        world.fixed_update(0.02);
        assert_relative_eq!(world.simulation(id).unwrap().total_depth(), 0.0);
        world.fixed_update(0.02);
        assert!(world.simulation(id).unwrap().total_depth() > 0.0);
    }
}
