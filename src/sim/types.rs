//! Core simulation types: phase quantities, traversal direction, run state, and pole records.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::Serialize;

/// A pair of active and reactive components.
///
/// Describes power (W, var) along the feeder, or contextually resistance and
/// reactance (ohm). Positive power flows from the source toward the loads.
///
/// # Examples
///
/// ```
/// use feeder_sag::sim::types::PhaseQuantity;
///
/// let flow = PhaseQuantity::new(1000.0, 200.0) + PhaseQuantity::new(50.0, 10.0);
/// assert_eq!(flow, PhaseQuantity::new(1050.0, 210.0));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseQuantity {
    /// Active component (W, or ohm for resistance).
    pub active: f64,
    /// Reactive component (var, or ohm for reactance).
    pub reactive: f64,
}

impl PhaseQuantity {
    /// Zero flow.
    pub const ZERO: Self = Self {
        active: 0.0,
        reactive: 0.0,
    };

    pub const fn new(active: f64, reactive: f64) -> Self {
        Self { active, reactive }
    }

    /// Returns `active² + reactive²`, the squared apparent magnitude.
    pub fn magnitude_sq(&self) -> f64 {
        self.active * self.active + self.reactive * self.reactive
    }

    /// Returns the apparent magnitude `sqrt(active² + reactive²)`.
    pub fn magnitude(&self) -> f64 {
        self.magnitude_sq().sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.active.is_finite() && self.reactive.is_finite()
    }
}

impl Add for PhaseQuantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.active + rhs.active, self.reactive + rhs.reactive)
    }
}

impl Sub for PhaseQuantity {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.active - rhs.active, self.reactive - rhs.reactive)
    }
}

impl AddAssign for PhaseQuantity {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for PhaseQuantity {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for PhaseQuantity {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.active, -self.reactive)
    }
}

impl Mul<f64> for PhaseQuantity {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.active * rhs, self.reactive * rhs)
    }
}

impl Div<f64> for PhaseQuantity {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Self::new(self.active / rhs, self.reactive / rhs)
    }
}

impl fmt::Display for PhaseQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} W / {:.2} var", self.active, self.reactive)
    }
}

/// Traversal mode of a marching run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    /// From the supply head outward. The route demand is split across the
    /// scheme's sides and consumed pole by pole.
    Forward {
        /// Line voltage at the supply head (V).
        head_voltage: f64,
        /// Total route demand at the head.
        demand: PhaseQuantity,
    },
    /// From the farthest pole back toward the supply, starting from one
    /// pole load at the given service voltage.
    Backward {
        /// Service voltage at the farthest pole (V).
        end_voltage: f64,
    },
}

impl Direction {
    /// Returns `+1.0` for backward runs and `-1.0` for forward runs: the sign
    /// applied to every increment of flow and voltage.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Forward { .. } => -1.0,
            Direction::Backward { .. } => 1.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Forward { .. } => "forward",
            Direction::Backward { .. } => "backward",
        }
    }
}

/// Mutable state of one marching run.
///
/// Owned exclusively by a single run and returned as part of the result at
/// termination.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    /// Line voltage at the current pole (V, primary side when a transformer is present).
    pub line_voltage: f64,
    /// Voltage seen by the load at the current pole (V, secondary side).
    pub service_voltage: f64,
    /// Power flow through the current segment boundary.
    pub flow: PhaseQuantity,
    /// Cumulative active power loss (W): line, transformer copper and no-load losses.
    pub loss_w: f64,
    /// Sum of all pole and station loads served so far, losses excluded.
    pub delivered: PhaseQuantity,
    /// Number of stations inserted, per configured station kind.
    pub station_counts: Vec<usize>,
    /// Segments traversed.
    pub iteration: usize,
    /// Cumulative distance from the starting end (m).
    pub distance_m: f64,
}

impl SimulationState {
    pub fn new(
        line_voltage: f64,
        service_voltage: f64,
        flow: PhaseQuantity,
        station_kinds: usize,
    ) -> Self {
        Self {
            line_voltage,
            service_voltage,
            flow,
            loss_w: 0.0,
            delivered: PhaseQuantity::ZERO,
            station_counts: vec![0; station_kinds],
            iteration: 0,
            distance_m: 0.0,
        }
    }
}

/// Record of one marching iteration, taken after the pole at the end of
/// the segment has been connected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoleRecord {
    /// Pole index, 1-based from the starting end.
    pub pole: usize,
    /// Distance from the starting end (m).
    pub distance_m: f64,
    /// Line voltage after this segment (V).
    pub line_voltage: f64,
    /// Service voltage at this pole (V).
    pub service_voltage: f64,
    /// Power flow after this pole.
    pub flow: PhaseQuantity,
    /// Active loss of this line segment (W).
    pub segment_loss_w: f64,
    /// Active loss of this pole's transformer, copper plus no-load (W).
    pub transformer_loss_w: f64,
    /// Cumulative active loss (W).
    pub cumulative_loss_w: f64,
    /// Stations connected at this pole.
    pub stations: usize,
}

impl fmt::Display for PoleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pole={:>5} ({:>8.1} m) | U={:>9.3} V  Us={:>8.3} V | P={:>11.2} W  Q={:>11.2} var | \
             dP(line)={:.4} W  dP(tr)={:.4} W  loss={:.2} W | stations={}",
            self.pole,
            self.distance_m,
            self.line_voltage,
            self.service_voltage,
            self.flow.active,
            self.flow.reactive,
            self.segment_loss_w,
            self.transformer_loss_w,
            self.cumulative_loss_w,
            self.stations,
        )
    }
}
