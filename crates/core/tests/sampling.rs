//! Simulation lookup, batched point sampling and caller handlers

mod common;

use approx::assert_relative_eq;
use common::flat_simulation;
use flow_sim_core::sampler::LatencyReadback;
use flow_sim_core::solver::ParticleState;
use flow_sim_core::{
    AsyncSampler, FlowEvent, FlowSimulation, FlowWorld, PointSample, SampleHandler, SimulationConfig, SimulationId, Texel, Transform,
    Vec3, WorldConfig,
};
use std::sync::{Arc, Mutex};

fn wet_world(world: &mut FlowWorld, depth: f32) -> SimulationId {
    let id = world.add_simulation(flat_simulation("pond", 5));
    world.frame_update(0.0);
    world
        .simulation_mut(id)
        .unwrap()
        .replace_fluids(depth, Texel::new(0.0, 0.0, 1.0, 1.0), Texel::zeros(), 0.0);
    world.drain_events();
    id
}

#[test]
fn test_find_simulation_prefers_containing_then_nearest() {
    let mut world = FlowWorld::default();
    let near = world.add_simulation(flat_simulation("near", 5));
    let far = world.add_simulation(flat_simulation("far", 5));
    world
        .simulation_mut(far)
        .unwrap()
        .set_transform(Transform::from_position(Vec3::new(20.0, 0.0, 0.0)));
    let idle = world.add_simulation(flat_simulation("idle", 5));
    world.frame_update(0.0);
    world.simulation_mut(idle).unwrap().deactivate();

    assert_eq!(world.find_simulation(&Vec3::new(2.0, 0.0, 2.0), None), Some(near));
    assert_eq!(world.find_simulation(&Vec3::new(22.0, 0.0, 2.0), None), Some(far));
    assert_eq!(world.find_simulation(&Vec3::new(15.0, 0.0, 2.0), None), Some(far));
    assert_eq!(world.find_simulation(&Vec3::new(2.0, 0.0, 2.0), Some(far)), Some(far));
    assert_eq!(world.find_simulation(&Vec3::new(2.0, 0.0, 2.0), Some(idle)), Some(near));
    assert!(world.overlap_xz(&Vec3::new(21.0, 0.0, 1.0)));
    assert!(!world.overlap_xz(&Vec3::new(10.0, 0.0, 1.0)));
}

#[test]
fn test_find_simulation_without_active_grids() {
    let mut world = FlowWorld::default();
    world.add_simulation(flat_simulation("pending", 5));
    assert_eq!(world.find_simulation(&Vec3::zeros(), None), None);
}

#[test]
fn test_same_tick_points_complete_together() {
    let sampler = AsyncSampler::new(Box::new(LatencyReadback::new(1)));
    let mut world = FlowWorld::with_sampler(WorldConfig::default(), sampler);
    wet_world(&mut world, 0.5);
    let first = world.add_point_sample(PointSample::new(Vec3::new(1.5, 2.0, 1.5)));
    let second = world.add_point_sample(PointSample::new(Vec3::new(3.0, 0.0, 1.0)).with_radius(0.25));

    world.fixed_update(0.02);
    assert!(!world.point_sample(first).unwrap().sampled());
    assert!(!world.point_sample(second).unwrap().sampled());

    world.fixed_update(0.02);
    let events = world.drain_events();
    assert!(events.contains(&FlowEvent::PointSampled(first)));
    assert!(events.contains(&FlowEvent::PointSampled(second)));

    let a = world.point_sample(first).unwrap();
    assert!(a.sampled());
    assert_relative_eq!(a.depth(), 0.5);
    assert_relative_eq!(a.overlap(), 1.0);
    assert_relative_eq!(a.color().z, 1.0);
    assert_relative_eq!(a.normal().y, 1.0);
    assert_relative_eq!(a.submersion(), 0.0);

    let b = world.point_sample(second).unwrap();
    assert_relative_eq!(b.submersion(), 1.0);
}

#[test]
fn test_point_off_grid_has_no_overlap() {
    let mut world = FlowWorld::default();
    wet_world(&mut world, 0.5);
    let off = world.add_point_sample(PointSample::new(Vec3::new(40.0, 0.0, 40.0)));
    world.fixed_update(0.02);
    let sample = world.point_sample(off).unwrap();
    assert!(sample.sampled());
    assert_relative_eq!(sample.overlap(), 0.0);
    assert_relative_eq!(sample.submersion(), 0.0);
}

struct Recorder(Arc<Mutex<Vec<(SimulationId, Vec<Texel>)>>>);

impl SampleHandler for Recorder {
    fn handle_samples(&mut self, simulation: SimulationId, samples: &[Texel]) {
        self.0.lock().unwrap().push((simulation, samples.to_vec()));
    }
}

#[test]
fn test_handler_receives_requested_samples() {
    let mut world = FlowWorld::default();
    let sim = wet_world(&mut world, 0.75);
    let received = Arc::new(Mutex::new(Vec::new()));
    let handler = world.add_handler(Box::new(Recorder(Arc::clone(&received))));

    assert!(world.request_sample(handler, None, &Vec3::new(2.0, 0.0, 2.0)));
    world.fixed_update(0.02);

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let (simulation, samples) = &received[0];
    assert_eq!(*simulation, sim);
    assert_eq!(samples.len(), 5);
    assert_relative_eq!(samples[1].w, 0.75);
}

#[test]
fn test_unknown_handler_is_refused() {
    let mut world = FlowWorld::default();
    wet_world(&mut world, 0.5);
    let handler = world.add_handler(Box::new(Recorder(Arc::default())));
    world.remove_handler(handler);
    assert!(!world.request_sample(handler, None, &Vec3::zeros()));
}

#[test]
fn test_particle_slots_wrap_at_limit() {
    let config = SimulationConfig {
        particles: true,
        particle_limit: 4,
        ..SimulationConfig::with_size(4.0, 4.0, 1.0)
    };
    let mut sim = FlowSimulation::new("spray", config, Transform::identity()).unwrap();
    sim.activate();

    let slots: Vec<usize> = (0..6)
        .map(|i| {
            sim.add_particle(&ParticleState {
                velocity: Vec3::zeros(),
                age: 0.0,
                position: Vec3::new(i as f32, 1.0, 0.0),
                life: 1.0,
                depth: 0.1,
                color: Texel::zeros(),
                esmv: Texel::zeros(),
                foam: Texel::zeros(),
            })
            .unwrap()
        })
        .collect();
    assert_eq!(slots, vec![0, 1, 2, 3, 0, 1]);

    let pool = sim.particles().unwrap();
    assert_eq!(pool.next_slot(), 2);
    assert_relative_eq!(pool.get(0).position.x, 4.0);
    assert_relative_eq!(pool.get(2).position.x, 2.0);
    assert_eq!(pool.live_count(), 4);
}
