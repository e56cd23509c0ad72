use serde::Deserialize;

use crate::error::{FeederError, Result};
use crate::sim::types::PhaseQuantity;

use super::types::{Load, reactive_from_active};

/// When a station kind is connected, relative to its configured rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationTrigger {
    /// Every pole whose 1-based index is a multiple of the rate.
    Periodic,
    /// Only the pole whose 1-based index equals the rate.
    OneShot,
}

impl StationTrigger {
    /// Returns `true` if a station with this trigger and `rate` is connected at `pole`.
    ///
    /// A zero rate never fires.
    pub fn fires(&self, rate: usize, pole: usize) -> bool {
        if rate == 0 {
            return false;
        }
        match self {
            StationTrigger::Periodic => pole % rate == 0,
            StationTrigger::OneShot => pole == rate,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StationTrigger::Periodic => "periodic",
            StationTrigger::OneShot => "one_shot",
        }
    }
}

/// A large intermittent load (fuel or charging station) inserted every
/// `rate` poles.
#[derive(Debug, Clone, PartialEq)]
pub struct StationLoad {
    name: String,
    demand: PhaseQuantity,
    rate: usize,
    trigger: StationTrigger,
}

impl StationLoad {
    /// Creates a station kind.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `rate` is zero, or a domain error if
    /// the power factor is outside `(0, 1]`.
    pub fn new(
        name: impl Into<String>,
        active_w: f64,
        power_factor: f64,
        rate: usize,
        trigger: StationTrigger,
    ) -> Result<Self> {
        let name = name.into();
        if rate == 0 {
            return Err(FeederError::configuration(
                format!("stations.{name}.rate"),
                "must be > 0",
            ));
        }
        let reactive = reactive_from_active(active_w, power_factor)?;
        Ok(Self {
            name,
            demand: PhaseQuantity::new(active_w, reactive),
            rate,
            trigger,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate(&self) -> usize {
        self.rate
    }

    pub fn trigger(&self) -> StationTrigger {
        self.trigger
    }

    /// Returns `true` if this station is connected at the given 1-based pole.
    pub fn connects_at(&self, pole: usize) -> bool {
        self.trigger.fires(self.rate, pole)
    }
}

/// Returns pairs of station kinds that share the same rate and trigger.
///
/// Distinct kinds firing on an identical schedule usually means a rate was
/// copied from the wrong kind.
pub fn shared_triggers(stations: &[StationLoad]) -> Vec<(&StationLoad, &StationLoad)> {
    let mut pairs = Vec::new();
    for (i, a) in stations.iter().enumerate() {
        for b in &stations[i + 1..] {
            if a.rate == b.rate && a.trigger == b.trigger {
                pairs.push((a, b));
            }
        }
    }
    pairs
}

impl Load for StationLoad {
    fn demand(&self) -> PhaseQuantity {
        self.demand
    }
}
