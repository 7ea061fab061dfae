//! Simulations and the world that drives them
//!
//! - [`FlowSimulation`]: one grid, its channels and physics stages
//! - [`FlowWorld`]: registries of simulations, modifiers, samples and
//!   containers, plus the frame and fixed tick drivers
//! - [`persistence`]: JSON snapshots of a simulation's channels

pub mod config;
pub mod events;
pub mod flow_simulation;
pub mod persistence;
pub mod world;

pub use config::{ConfigError, PhysicsModel, SimulationConfig, UpdateMode, WorldConfig};
pub use events::{
    ContainerId, FlowEvent, HandlerId, LinkId, ModifierId, PointSampleId, SampleAreaId, SimulationId,
    SplashSurfaceId, TriggerId,
};
pub use flow_simulation::FlowSimulation;
pub use persistence::{
    load_simulation, save_simulation, snapshot_path, Snapshot, SnapshotError, TextureData, DEFAULT_FILE_TEMPLATE,
};
pub use world::FlowWorld;
