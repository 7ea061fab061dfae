//! FLOW shallow-water fluid simulation
//!
//! A height-field fluid solver over a grid of columns. Each column stores
//! ground and wet heights, four outflow fluxes, depth, color, material and
//! foam. Fluid moves by the pipe model: a force stage turns height
//! differences into fluxes, and a transport stage moves depth along them.
//!
//! ## Layout
//!
//! - [`grid`]: world/pixel mapping and ground casting
//! - [`solver`]: channel storage, the physics stepper and particles
//! - [`modifier`]: localized operators that add, remove or paint fluid
//! - [`sampler`]: batched read-back of point and area samples
//! - [`simulation`]: simulations, snapshots and the world tick driver

// Core types and utilities
pub mod core_types;

pub mod grid;
pub mod modifier;
pub mod sampler;
pub mod simulation;
pub mod solver;

// Re-export core types
pub use core_types::{Bounds, FluidProperties, MaskChannel, PixelRect, ShapeMask, Texel, Transform, Vec2, Vec3};

pub use grid::{FlatGround, GridLayout, HeightField, HeightFn, HeightSource};
pub use modifier::{ApplyType, Container, Modifier, ModifierMode, Splash, SplashSurface};
pub use sampler::{AsyncSampler, PointSample, SampleArea, SampleHandler, TriggerArea};
pub use simulation::{
    FlowEvent, FlowSimulation, FlowWorld, SimulationConfig, SimulationId, Snapshot, UpdateMode, WorldConfig,
};
pub use solver::{ColumnStore, FluidStepper};
