//! Shared setup for integration tests

use flow_sim_core::grid::FlatGround;
use flow_sim_core::{FlowSimulation, SimulationConfig, Transform};

/// Route `tracing` output through the test harness; filter with `RUST_LOG`
#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Flat-bottomed grid with `columns - 1` meters per side at separation 1
#[allow(dead_code)]
pub fn flat_simulation(name: &str, columns: usize) -> FlowSimulation {
    let side = (columns - 1) as f32;
    FlowSimulation::new(name, SimulationConfig::with_size(side, side, 1.0), Transform::identity())
        .expect("valid config")
        .with_ground(FlatGround::new(0.0))
}
