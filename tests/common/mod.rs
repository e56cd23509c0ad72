//! Shared test fixtures for integration tests.

use feeder_sag::config::{DirectionKind, FeederConfig};
use feeder_sag::sim::engine::RunOutcome;

/// Absolute tolerance for power balances accumulated over hundreds of poles (W).
pub const BALANCE_TOL_W: f64 = 1e-6;

/// Loads a preset and runs it in the given direction.
pub fn run_preset(name: &str, direction: DirectionKind) -> RunOutcome {
    let config = FeederConfig::from_preset(name).expect("preset should load");
    run_config(&config, direction)
}

/// Builds the engine from `config` and runs it in the given direction.
pub fn run_config(config: &FeederConfig, direction: DirectionKind) -> RunOutcome {
    let engine = config.build_engine().expect("engine should build");
    engine
        .run(config.direction(direction))
        .expect("run should succeed")
}

/// Active power at the starting end of a run (W).
pub fn starting_active_w(config: &FeederConfig, direction: DirectionKind) -> f64 {
    match direction {
        DirectionKind::Forward => {
            config.supply.demand_active_w / f64::from(config.scheme.sides)
        }
        DirectionKind::Backward => config.scheme.pole_active_w,
    }
}
