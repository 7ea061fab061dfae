//! Fluid stepper trait definition
//!
//! A stepper computes the next state of one physics stage from the current
//! channels. Each stage returns freshly computed buffers; the caller swaps them
//! into the [`ColumnStore`], so no stage ever observes its own writes.

use super::fields::ChannelBuffer;
use super::store::{ColumnStore, FluidBuffers};
use crate::simulation::PhysicsModel;

/// Inputs of the force stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceParams {
    pub model: PhysicsModel,
    pub instability: f32,
    pub spread: f32,
    pub damping: f32,
    pub speed: f32,
    pub overflow: bool,
}

/// Inputs of the transport stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportParams {
    /// Seconds covered by this transport
    pub delta: f32,
    /// Global fluid speed multiplier
    pub speed: f32,
    /// Foam removed this tick, a multiple of 1/255
    pub foam_decay: f32,
    pub overflow: bool,
}

/// Inputs of the wetness stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WetnessParams {
    pub delta: f32,
    pub table_depth: f32,
    pub dry_rate: f32,
}

/// Backend-agnostic interface for the per-column physics stages
pub trait FluidStepper: Send + Sync {
    /// New outflow fluxes (channel B) from heights, depth and current fluxes
    fn forces(&self, store: &ColumnStore, params: &ForceParams) -> ChannelBuffer;

    /// New depth, color, material and foam after moving fluid along the fluxes
    fn transport(&self, store: &ColumnStore, params: &TransportParams) -> FluidBuffers;

    /// New ground/wet heights (channel A) after drying or wetting
    fn wetness(&self, store: &ColumnStore, params: &WetnessParams) -> ChannelBuffer;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
