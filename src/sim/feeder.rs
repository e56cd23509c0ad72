use crate::devices::{PoleLoad, StationLoad};
use crate::error::{FeederError, Result};

/// Scales per-unit-length line parameters by a step length.
///
/// Returns `(r, x) = (r0 * step, x0 * step)`.
pub fn scale_line_params(step: f64, r0: f64, x0: f64) -> (f64, f64) {
    (r0 * step, x0 * step)
}

/// One span of line between adjacent poles.
///
/// Derived once from configuration and shared read-only by every iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    step_m: f64,
    r0: f64,
    x0: f64,
    r: f64,
    x: f64,
}

impl LineSegment {
    /// Creates a segment of `step_m` metres from per-metre resistance and reactance.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `step_m` is not strictly positive, or
    /// if `r0`/`x0` are negative or not finite.
    pub fn new(step_m: f64, r0: f64, x0: f64) -> Result<Self> {
        if !(step_m.is_finite() && step_m > 0.0) {
            return Err(FeederError::configuration(
                "scheme.step_m",
                format!("must be > 0, got {step_m}"),
            ));
        }
        if !(r0.is_finite() && r0 >= 0.0) {
            return Err(FeederError::configuration(
                "scheme.r0_ohm_per_m",
                format!("must be >= 0, got {r0}"),
            ));
        }
        if !(x0.is_finite() && x0 >= 0.0) {
            return Err(FeederError::configuration(
                "scheme.x0_ohm_per_m",
                format!("must be >= 0, got {x0}"),
            ));
        }
        let (r, x) = scale_line_params(step_m, r0, x0);
        Ok(Self {
            step_m,
            r0,
            x0,
            r,
            x,
        })
    }

    pub fn step_m(&self) -> f64 {
        self.step_m
    }

    /// Per-metre resistance and reactance the segment was scaled from.
    pub fn per_metre(&self) -> (f64, f64) {
        (self.r0, self.x0)
    }

    /// Segment resistance (ohm).
    pub fn r(&self) -> f64 {
        self.r
    }

    /// Segment reactance (ohm).
    pub fn x(&self) -> f64 {
        self.x
    }
}

/// A validated pole layout: segment, unit load, sides, and station kinds.
#[derive(Debug, Clone)]
pub struct Scheme {
    name: String,
    segment: LineSegment,
    pole: PoleLoad,
    sides: u32,
    stations: Vec<StationLoad>,
}

impl Scheme {
    /// Creates a scheme.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `sides` is zero or two station kinds
    /// share a name.
    pub fn new(
        name: impl Into<String>,
        segment: LineSegment,
        pole: PoleLoad,
        sides: u32,
        stations: Vec<StationLoad>,
    ) -> Result<Self> {
        if sides == 0 {
            return Err(FeederError::configuration("scheme.sides", "must be > 0"));
        }
        for (i, s) in stations.iter().enumerate() {
            if stations[..i].iter().any(|o| o.name() == s.name()) {
                return Err(FeederError::configuration(
                    format!("stations.{}", s.name()),
                    "station names must be unique",
                ));
            }
        }
        Ok(Self {
            name: name.into(),
            segment,
            pole,
            sides,
            stations,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segment(&self) -> &LineSegment {
        &self.segment
    }

    pub fn pole(&self) -> &PoleLoad {
        &self.pole
    }

    /// Number of road sides carrying poles; forward demand is split evenly.
    pub fn sides(&self) -> u32 {
        self.sides
    }

    pub fn stations(&self) -> &[StationLoad] {
        &self.stations
    }
}
