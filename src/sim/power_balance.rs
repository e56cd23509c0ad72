//! Segment loss and voltage drop models.
//!
//! A feeder segment (or a transformer's series branch) with resistance `r`
//! and reactance `x` carrying `flow` at `voltage` loses
//! `k * (r, x)` where `k = c * |S|² / U²`, and drops a voltage that depends
//! on the selected drop form. Both forms are selectable through
//! [`PhysicsVariant`], injected into the engine via [`SegmentPhysics`].

use serde::Deserialize;

use crate::error::{FeederError, Result, ensure_finite};

use super::types::PhaseQuantity;

/// Loss formula applied to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossForm {
    /// `k = (P² + Q²) / U²`
    SinglePhase,
    /// `k = 3 (P² + Q²) / U²`
    ThreePhase,
}

impl LossForm {
    fn factor(&self) -> f64 {
        match self {
            LossForm::SinglePhase => 1.0,
            LossForm::ThreePhase => 3.0,
        }
    }

    /// Active and reactive power lost across a segment.
    ///
    /// # Errors
    ///
    /// Returns a domain error if `voltage` is not strictly positive or the
    /// result is not finite.
    pub fn segment_loss(
        &self,
        r: f64,
        x: f64,
        voltage: f64,
        flow: PhaseQuantity,
    ) -> Result<PhaseQuantity> {
        check_voltage(voltage)?;
        let k = self.factor() * flow.magnitude_sq() / (voltage * voltage);
        Ok(PhaseQuantity::new(
            ensure_finite(k * r, "active segment loss")?,
            ensure_finite(k * x, "reactive segment loss")?,
        ))
    }
}

/// Voltage drop formula applied to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropForm {
    /// `(P r + Q x) / U`
    Simplified,
    /// `sqrt(P² + Q²) r sqrt(3) / U`; reactance is ignored.
    Magnitude,
}

impl DropForm {
    /// Magnitude change of the voltage across a segment.
    ///
    /// # Errors
    ///
    /// Returns a domain error if `voltage` is not strictly positive or the
    /// result is not finite.
    pub fn voltage_drop(&self, r: f64, x: f64, voltage: f64, flow: PhaseQuantity) -> Result<f64> {
        check_voltage(voltage)?;
        let du = match self {
            DropForm::Simplified => (flow.active * r + flow.reactive * x) / voltage,
            DropForm::Magnitude => flow.magnitude() * r * 3.0_f64.sqrt() / voltage,
        };
        ensure_finite(du, "voltage drop")
    }
}

fn check_voltage(voltage: f64) -> Result<()> {
    if voltage.is_finite() && voltage > 0.0 {
        Ok(())
    } else {
        Err(FeederError::domain(format!(
            "voltage must be strictly positive, got {voltage}"
        )))
    }
}

/// Strategy computing per-segment loss and voltage drop.
///
/// Implemented by [`PhysicsVariant`]; the engine and the transformer solver
/// are generic over it so alternative models can be swapped in.
pub trait SegmentPhysics {
    /// Active and reactive loss across a segment.
    fn segment_loss(&self, r: f64, x: f64, voltage: f64, flow: PhaseQuantity)
    -> Result<PhaseQuantity>;

    /// Voltage magnitude change across a segment.
    fn voltage_drop(&self, r: f64, x: f64, voltage: f64, flow: PhaseQuantity) -> Result<f64>;
}

/// A pairing of loss and drop forms.
///
/// # Examples
///
/// ```
/// use feeder_sag::sim::power_balance::{PhysicsVariant, SegmentPhysics};
/// use feeder_sag::sim::types::PhaseQuantity;
///
/// let physics = PhysicsVariant::SINGLE_PHASE;
/// let loss = physics
///     .segment_loss(0.0001, 0.00006, 400.0, PhaseQuantity::new(10_000.0, 2_000.0))
///     .unwrap();
/// assert!((loss.active - 0.065).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicsVariant {
    pub loss: LossForm,
    pub drop: DropForm,
}

impl PhysicsVariant {
    /// Single-phase-equivalent loss with the simplified drop.
    pub const SINGLE_PHASE: Self = Self {
        loss: LossForm::SinglePhase,
        drop: DropForm::Simplified,
    };

    /// Three-phase loss with the magnitude drop.
    pub const THREE_PHASE: Self = Self {
        loss: LossForm::ThreePhase,
        drop: DropForm::Magnitude,
    };
}

impl SegmentPhysics for PhysicsVariant {
    fn segment_loss(
        &self,
        r: f64,
        x: f64,
        voltage: f64,
        flow: PhaseQuantity,
    ) -> Result<PhaseQuantity> {
        self.loss.segment_loss(r, x, voltage, flow)
    }

    fn voltage_drop(&self, r: f64, x: f64, voltage: f64, flow: PhaseQuantity) -> Result<f64> {
        self.drop.voltage_drop(r, x, voltage, flow)
    }
}
