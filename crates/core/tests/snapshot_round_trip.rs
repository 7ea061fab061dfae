//! Saving a simulation to disk and loading it into a fresh one

mod common;

use flow_sim_core::grid::FlatGround;
use flow_sim_core::modifier::PreparedModifier;
use flow_sim_core::simulation::{load_simulation, save_simulation, DEFAULT_FILE_TEMPLATE};
use flow_sim_core::solver::{Channel, FloatPrecision, ParticleState, TextureFormat};
use flow_sim_core::{FlowSimulation, Modifier, ModifierMode, SimulationConfig, Texel, Transform, Vec3};
use std::fs;

fn particle_simulation() -> FlowSimulation {
    let config = SimulationConfig {
        particles: true,
        particle_limit: 8,
        ..SimulationConfig::with_size(7.0, 7.0, 1.0)
    };
    FlowSimulation::new("round_trip", config, Transform::identity())
        .unwrap()
        .with_ground(FlatGround::new(0.0))
}

fn busy_simulation() -> FlowSimulation {
    let mut sim = particle_simulation();
    assert!(sim.activate());
    sim.replace_heights(0.5, 0.25);
    sim.replace_fluids(0.1, Texel::new(0.2, 0.4, 0.6, 1.0), Texel::new(0.0, 0.5, 0.0, 0.25), 0.3);

    let pour = Modifier::new(ModifierMode::AddFluid)
        .at(Vec3::new(3.5, 0.0, 3.5))
        .with_size(2.0, 2.0);
    sim.apply_modifier(&pour, &PreparedModifier::new(&pour), 1.0);
    sim.step_forces();

    sim.add_particle(&ParticleState {
        velocity: Vec3::new(1.0, 2.0, -1.0),
        age: 0.0,
        position: Vec3::new(2.0, 3.0, 2.0),
        life: 4.0,
        depth: 0.5,
        color: Texel::new(1.0, 0.0, 0.0, 1.0),
        esmv: Texel::new(0.2, 0.4, 0.6, 0.8),
        foam: Texel::new(1.0, 0.0, 0.0, 0.0),
    });
    sim
}

#[test]
fn test_all_channels_survive_save_and_load() {
    let dir = std::env::temp_dir().join(format!("flow_snapshot_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();

    let original = busy_simulation();
    let path = save_simulation(&original, &dir, DEFAULT_FILE_TEMPLATE).unwrap();
    assert!(path.ends_with("Flowround_trip.json"));

    let mut restored = particle_simulation();
    assert_eq!(load_simulation(&mut restored, &dir, DEFAULT_FILE_TEMPLATE).unwrap(), 12);

    let (a, b) = (original.store().unwrap(), restored.store().unwrap());
    for channel in Channel::ALL {
        assert_eq!(
            a.channel(channel).as_slice(),
            b.channel(channel).as_slice(),
            "grid channel {channel:?}"
        );
    }
    let (a, b) = (original.particles().unwrap(), restored.particles().unwrap());
    for channel in Channel::ALL {
        assert_eq!(
            a.channel(channel).as_slice(),
            b.channel(channel).as_slice(),
            "particle channel {channel:?}"
        );
    }
    assert_eq!(b.live_count(), 1);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_load_without_particles_allocates_pool() {
    let dir = std::env::temp_dir().join(format!("flow_snapshot_pool_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();

    let original = busy_simulation();
    save_simulation(&original, &dir, "{0}.snapshot").unwrap();

    let config = SimulationConfig::with_size(7.0, 7.0, 1.0);
    let mut restored = FlowSimulation::new("round_trip", config, Transform::identity()).unwrap();
    assert!(restored.particles().is_none());
    assert_eq!(load_simulation(&mut restored, &dir, "{0}.snapshot").unwrap(), 12);
    assert!(restored.is_activated());
    assert_eq!(restored.particles().unwrap().limit(), 8);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_half_channel_keeps_its_format_on_load() {
    let dir = std::env::temp_dir().join(format!("flow_snapshot_half_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();

    let config = SimulationConfig {
        precision_a: FloatPrecision::Half,
        ..SimulationConfig::with_size(7.0, 7.0, 1.0)
    };
    let mut original = FlowSimulation::new("half", config, Transform::identity()).unwrap();
    assert!(original.activate());
    original.replace_heights(0.3, 0.1);
    assert_eq!(original.store().unwrap().a().format(), TextureFormat::RGHalf);
    save_simulation(&original, &dir, DEFAULT_FILE_TEMPLATE).unwrap();

    let mut restored =
        FlowSimulation::new("half", SimulationConfig::with_size(7.0, 7.0, 1.0), Transform::identity()).unwrap();
    assert!(restored.activate());
    assert_eq!(restored.store().unwrap().a().format(), TextureFormat::RGFloat);
    assert_eq!(load_simulation(&mut restored, &dir, DEFAULT_FILE_TEMPLATE).unwrap(), 6);

    let a = restored.store().unwrap().a();
    assert_eq!(a.format(), TextureFormat::RGHalf);
    assert_eq!(a.as_slice(), original.store().unwrap().a().as_slice());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_snapshot_from_other_grid_size_is_rejected() {
    let dir = std::env::temp_dir().join(format!("flow_snapshot_size_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    save_simulation(&busy_simulation(), &dir, DEFAULT_FILE_TEMPLATE).unwrap();

    let config = SimulationConfig {
        particles: true,
        particle_limit: 4,
        ..SimulationConfig::with_size(9.0, 9.0, 1.0)
    };
    let mut target = FlowSimulation::new("round_trip", config, Transform::identity())
        .unwrap()
        .with_ground(FlatGround::new(0.0));
    assert!(target.activate());
    target.replace_fluids(0.2, Texel::repeat(1.0), Texel::zeros(), 0.0);
    target.add_particle(&ParticleState {
        velocity: Vec3::zeros(),
        age: 0.0,
        position: Vec3::new(1.0, 4.0, 1.0),
        life: 2.0,
        depth: 0.25,
        color: Texel::repeat(1.0),
        esmv: Texel::zeros(),
        foam: Texel::zeros(),
    });
    let depth = target.store().unwrap().c().as_slice().to_vec();
    let positions = target.particles().unwrap().channel(Channel::B).as_slice().to_vec();

    assert_eq!(load_simulation(&mut target, &dir, DEFAULT_FILE_TEMPLATE).unwrap(), 0);
    assert_eq!(target.store().unwrap().c().as_slice(), depth.as_slice());
    let pool = target.particles().unwrap();
    assert_eq!(pool.limit(), 4);
    assert_eq!(pool.channel(Channel::B).as_slice(), positions.as_slice());
    assert_eq!(pool.live_count(), 1);

    fs::remove_dir_all(&dir).unwrap();
}
