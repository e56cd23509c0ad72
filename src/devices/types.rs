//! Common types and helpers for load-side models.

use crate::error::{FeederError, Result, ensure_finite};
use crate::sim::types::PhaseQuantity;

/// A fixed load connected somewhere along the feeder.
///
/// Loads are immutable for the duration of a run; every call returns the
/// same demand.
pub trait Load {
    /// Returns the load's constant power demand.
    fn demand(&self) -> PhaseQuantity;
}

/// Derives reactive power from active power and a power factor.
///
/// `reactive = active * sqrt(1 / cos² φ - 1)`
///
/// # Errors
///
/// Returns [`FeederError::Domain`] if `power_factor` is zero, not finite, or
/// its magnitude exceeds 1.
///
/// # Examples
///
/// ```
/// use feeder_sag::devices::types::reactive_from_active;
///
/// let q = reactive_from_active(10_000.0, 0.985).unwrap();
/// assert!((q - 1751.82).abs() < 0.01);
/// assert_eq!(reactive_from_active(500.0, 1.0).unwrap(), 0.0);
/// ```
pub fn reactive_from_active(active: f64, power_factor: f64) -> Result<f64> {
    if !power_factor.is_finite() || power_factor == 0.0 || power_factor.abs() > 1.0 {
        return Err(FeederError::domain(format!(
            "power factor must be in (0, 1], got {power_factor}"
        )));
    }
    let ratio = 1.0 / (power_factor * power_factor) - 1.0;
    // |cos| == 1 can round to a tiny negative ratio
    ensure_finite(active * ratio.max(0.0).sqrt(), "reactive power")
}
