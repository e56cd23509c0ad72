//! Pole transformer model and the fixed-point solver for its voltage drop.
//!
//! The copper loss of a transformer depends on the voltage behind it, which
//! in turn depends on the drop caused by the power it carries, losses
//! included. The solver iterates until the candidate voltage stops moving
//! by more than a relative tolerance.

use tracing::debug;

use crate::error::{FeederError, Result};

use super::power_balance::SegmentPhysics;
use super::types::PhaseQuantity;

/// Equivalent-circuit parameters of a step-down transformer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformerModel {
    /// Series resistance (ohm, primary side).
    pub rt: f64,
    /// Series reactance (ohm, primary side).
    pub xt: f64,
    /// Fixed active (core) loss.
    pub px: f64,
    /// Fixed reactive (magnetizing) demand.
    pub qx: f64,
    /// Primary over secondary voltage.
    pub ratio: f64,
}

impl TransformerModel {
    /// Derives equivalent-circuit parameters from nameplate test data.
    ///
    /// * `rt = pk · V² / S²`
    /// * `xt = (uk / 100) · V² / S`
    /// * `qx = ix · S / 100`
    ///
    /// # Arguments
    ///
    /// * `uk` - Short-circuit voltage (%)
    /// * `pk` - Short-circuit loss
    /// * `ix` - No-load current (%)
    /// * `px` - No-load loss, passed through
    /// * `rated_power` - Rated apparent power `S`
    /// * `rated_voltage` - Rated primary voltage `V`
    /// * `secondary_voltage` - Rated secondary voltage, for the ratio
    ///
    /// # Errors
    ///
    /// Returns a domain error if any rated quantity is zero or not finite.
    pub fn derive(
        uk: f64,
        pk: f64,
        ix: f64,
        px: f64,
        rated_power: f64,
        rated_voltage: f64,
        secondary_voltage: f64,
    ) -> Result<Self> {
        for (name, v) in [
            ("rated power", rated_power),
            ("rated voltage", rated_voltage),
            ("secondary voltage", secondary_voltage),
        ] {
            if !v.is_finite() || v == 0.0 {
                return Err(FeederError::domain(format!(
                    "transformer {name} must be nonzero, got {v}"
                )));
            }
        }
        let v2 = rated_voltage * rated_voltage;
        Ok(Self {
            rt: pk * v2 / (rated_power * rated_power),
            xt: (uk / 100.0) * v2 / rated_power,
            px,
            qx: ix * rated_power / 100.0,
            ratio: rated_voltage / secondary_voltage,
        })
    }

    /// Fixed no-load losses `(px, qx)` drawn whenever the transformer is energised.
    pub fn no_load(&self) -> PhaseQuantity {
        PhaseQuantity::new(self.px, self.qx)
    }
}

/// Tolerance and iteration cap for [`solve_transformer_drop`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Relative error below which the iteration stops.
    pub epsilon: f64,
    /// Iterations allowed before giving up with [`FeederError::Convergence`].
    pub max_iterations: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            epsilon: 1e-8,
            max_iterations: 100,
        }
    }
}

/// Converged transformer loss and drop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformerDrop {
    /// Copper loss (active, reactive).
    pub delta_power: PhaseQuantity,
    /// Voltage drop across the series branch.
    pub delta_voltage: f64,
    /// Voltage behind the transformer at the fixed point.
    pub candidate_voltage: f64,
    /// Iterations performed.
    pub iterations: usize,
}

/// Resolves the transformer voltage drop for `load` behind a primary at
/// `reference_voltage`.
///
/// # Errors
///
/// Returns [`FeederError::Convergence`] if the tolerance is not reached
/// within the iteration cap, or a domain error from the physics.
pub fn solve_transformer_drop<P: SegmentPhysics>(
    physics: &P,
    options: &SolverOptions,
    reference_voltage: f64,
    transformer: &TransformerModel,
    load: PhaseQuantity,
) -> Result<TransformerDrop> {
    solve_transformer_drop_from(
        physics,
        options,
        reference_voltage,
        transformer,
        load,
        reference_voltage,
    )
}

/// Like [`solve_transformer_drop`], but starts iterating from `initial_candidate`
/// instead of the reference voltage.
pub fn solve_transformer_drop_from<P: SegmentPhysics>(
    physics: &P,
    options: &SolverOptions,
    reference_voltage: f64,
    transformer: &TransformerModel,
    load: PhaseQuantity,
    initial_candidate: f64,
) -> Result<TransformerDrop> {
    if !(options.epsilon.is_finite() && options.epsilon > 0.0) {
        return Err(FeederError::configuration(
            "simulation.epsilon",
            format!("must be > 0, got {}", options.epsilon),
        ));
    }

    let mut candidate = initial_candidate;
    let mut error = options.epsilon;
    let mut iterations = 0;
    let mut delta_power = PhaseQuantity::ZERO;
    let mut delta_voltage = 0.0;

    while error >= options.epsilon {
        if iterations == options.max_iterations {
            return Err(FeederError::Convergence { iterations, error });
        }
        iterations += 1;

        // loss from the load alone, drop from load plus that loss
        delta_power = physics.segment_loss(transformer.rt, transformer.xt, candidate, load)?;
        delta_voltage = physics.voltage_drop(
            transformer.rt,
            transformer.xt,
            reference_voltage,
            load + delta_power,
        )?;

        let next = reference_voltage - delta_voltage;
        if !(next.is_finite() && next > 0.0) {
            return Err(FeederError::domain(format!(
                "transformer drop {delta_voltage} V collapses the {reference_voltage} V primary"
            )));
        }
        error = (next - candidate).abs() / next.abs();
        candidate = next;
    }

    debug!(
        iterations,
        delta_voltage,
        loss_w = delta_power.active,
        "transformer solver converged"
    );

    Ok(TransformerDrop {
        delta_power,
        delta_voltage,
        candidate_voltage: candidate,
        iterations,
    })
}
