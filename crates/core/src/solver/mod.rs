//! Column state and fluid physics
//!
//! The core abstraction is the [`FluidStepper`] trait, computing each physics
//! stage as new channel buffers from a read-only [`ColumnStore`]. The CPU
//! implementation runs every stage as Rayon row kernels.
//!
//! # Example
//!
//! ```rust,ignore
//! use flow_sim_core::solver::{create_stepper, ColumnStore};
//!
//! let stepper = create_stepper();
//! let fluxes = stepper.forces(&store, &params);
//! let previous = store.swap(Channel::B, fluxes);
//! ```

mod cpu;
mod fields;
mod foam;
mod format;
pub mod particles;
mod store;
#[allow(clippy::module_name_repetitions)]
mod r#trait;

// Re-exports
pub use cpu::CpuStepper;
pub use fields::{quantize, ChannelBuffer};
pub use foam::FoamClearCounter;
pub use format::{
    ChannelFormats, ComponentKind, CustomDataType, FloatPrecision, Precision01, TextureFormat,
};
pub use particles::{ParticlePool, ParticleState};
pub use r#trait::{FluidStepper, ForceParams, TransportParams, WetnessParams};
pub use store::{Channel, ColumnStore, FluidBuffers};

use tracing::info;

/// Create the fluid stepper
///
/// # Returns
///
/// A boxed `FluidStepper` trait object
pub fn create_stepper() -> Box<dyn FluidStepper> {
    let stepper = CpuStepper::new();
    info!("Using {} fluid stepper", stepper.name());
    Box::new(stepper)
}
