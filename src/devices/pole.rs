use crate::error::Result;
use crate::sim::types::PhaseQuantity;

use super::types::{Load, reactive_from_active};

/// Periodic unit load: one lighting fixture per pole.
///
/// # Examples
///
/// ```
/// use feeder_sag::devices::{Load, PoleLoad};
///
/// let pole = PoleLoad::from_nameplate(150.0, 0.95).unwrap();
/// assert_eq!(pole.demand().active, 150.0);
/// assert!(pole.demand().reactive > 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoleLoad {
    demand: PhaseQuantity,
}

impl PoleLoad {
    /// Builds a pole load from its nameplate active power (W) and power factor.
    ///
    /// # Errors
    ///
    /// Returns a domain error if the power factor is outside `(0, 1]`.
    pub fn from_nameplate(active_w: f64, power_factor: f64) -> Result<Self> {
        let reactive = reactive_from_active(active_w, power_factor)?;
        Ok(Self {
            demand: PhaseQuantity::new(active_w, reactive),
        })
    }
}

impl Load for PoleLoad {
    fn demand(&self) -> PhaseQuantity {
        self.demand
    }
}
