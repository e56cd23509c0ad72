//! Run summary computed from the final marching state and its pole trace.

use std::fmt;

use serde::Serialize;

use crate::error::{FeederError, Result, ensure_finite};

use super::engine::Termination;
use super::feeder::Scheme;
use super::types::{Direction, PhaseQuantity, PoleRecord, SimulationState};

/// Number of stations of one kind inserted during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationCount {
    pub name: String,
    pub count: usize,
}

/// Summary of a completed marching run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Scheme name.
    pub scheme: String,
    /// `"forward"` or `"backward"`.
    pub direction: &'static str,
    /// Why the run stopped.
    pub termination: Termination,
    /// Segments traversed.
    pub poles: usize,
    /// Distance covered (m), `poles * step`.
    pub distance_m: f64,
    /// Power flow at the end of the run.
    pub final_flow: PhaseQuantity,
    /// Line voltage at the end of the run (V).
    pub line_voltage: f64,
    /// Service voltage at the last pole (V).
    pub service_voltage: f64,
    /// Lowest service voltage at any connected pole, or the starting value
    /// when none was connected (V).
    pub lowest_service_voltage: f64,
    /// Cumulative active loss (W).
    pub total_loss_w: f64,
    /// Loads served, losses excluded.
    pub delivered: PhaseQuantity,
    /// Loads served plus losses (W).
    pub supplied_w: f64,
    /// Stations inserted per kind.
    pub stations: Vec<StationCount>,
    /// `100 * total_loss / final active flow`, backward runs only.
    pub loss_pct: Option<f64>,
}

impl RunReport {
    /// Builds the report from the final state and the pole trace.
    ///
    /// # Errors
    ///
    /// Returns a domain error if the loss percentage of a backward run would
    /// divide by a zero or non-finite flow.
    pub fn from_state(
        scheme: &Scheme,
        direction: &Direction,
        termination: Termination,
        state: &SimulationState,
        records: &[PoleRecord],
    ) -> Result<Self> {
        let lowest_service_voltage = records
            .iter()
            .map(|r| r.service_voltage)
            .fold(state.service_voltage, f64::min);

        let loss_pct = match direction {
            Direction::Backward { .. } => {
                if state.flow.active == 0.0 {
                    return Err(FeederError::domain(
                        "loss percentage undefined for zero delivered power",
                    ));
                }
                Some(ensure_finite(
                    100.0 * state.loss_w / state.flow.active,
                    "loss percentage",
                )?)
            }
            Direction::Forward { .. } => None,
        };

        let stations = scheme
            .stations()
            .iter()
            .zip(&state.station_counts)
            .map(|(s, &count)| StationCount {
                name: s.name().to_string(),
                count,
            })
            .collect();

        Ok(Self {
            scheme: scheme.name().to_string(),
            direction: direction.label(),
            termination,
            poles: state.iteration,
            distance_m: state.distance_m,
            final_flow: state.flow,
            line_voltage: state.line_voltage,
            service_voltage: state.service_voltage,
            lowest_service_voltage,
            total_loss_w: state.loss_w,
            delivered: state.delivered,
            supplied_w: state.delivered.active + state.loss_w,
            stations,
            loss_pct,
        })
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Feeder Report ({}, {}) ---", self.scheme, self.direction)?;
        writeln!(f, "Termination:           {:?}", self.termination)?;
        writeln!(f, "Poles:                 {}", self.poles)?;
        writeln!(f, "Distance:              {:.1} m", self.distance_m)?;
        writeln!(f, "Final flow:            {}", self.final_flow)?;
        writeln!(f, "Line voltage:          {:.3} V", self.line_voltage)?;
        writeln!(f, "Service voltage:       {:.3} V", self.service_voltage)?;
        writeln!(f, "Lowest service:        {:.3} V", self.lowest_service_voltage)?;
        writeln!(f, "Total loss:            {:.3} W", self.total_loss_w)?;
        writeln!(f, "Delivered:             {}", self.delivered)?;
        write!(f, "Supplied:              {:.3} W", self.supplied_w)?;
        for s in &self.stations {
            write!(f, "\nStations {:<13}{}", format!("({}):", s.name), s.count)?;
        }
        if let Some(pct) = self.loss_pct {
            write!(f, "\nLoss:                  {pct:.3}%")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{PoleLoad, StationLoad, StationTrigger};
    use crate::sim::feeder::LineSegment;

    fn scheme() -> Scheme {
        let fuel = StationLoad::new("fuel", 40_000.0, 0.9, 10, StationTrigger::Periodic).unwrap();
        Scheme::new(
            "s",
            LineSegment::new(40.0, 0.0001, 0.0001).unwrap(),
            PoleLoad::from_nameplate(100.0, 1.0).unwrap(),
            1,
            vec![fuel],
        )
        .unwrap()
    }

    fn state(flow_active: f64, loss_w: f64) -> SimulationState {
        let mut s = SimulationState::new(390.0, 390.0, PhaseQuantity::new(flow_active, 0.0), 1);
        s.loss_w = loss_w;
        s.delivered = PhaseQuantity::new(flow_active - loss_w, 0.0);
        s.station_counts[0] = 3;
        s.iteration = 30;
        s.distance_m = 1200.0;
        s
    }

    #[test]
    fn backward_reports_loss_percentage() {
        let report = RunReport::from_state(
            &scheme(),
            &Direction::Backward { end_voltage: 380.0 },
            Termination::LengthCap,
            &state(10_000.0, 250.0),
            &[],
        )
        .unwrap();
        assert!((report.loss_pct.unwrap() - 2.5).abs() < 1e-12);
        assert_eq!(
            report.stations,
            vec![StationCount {
                name: "fuel".into(),
                count: 3
            }]
        );
        assert!((report.supplied_w - 10_000.0).abs() < 1e-9);
        assert_eq!(report.direction, "backward");
    }

    #[test]
    fn forward_has_no_loss_percentage() {
        let report = RunReport::from_state(
            &scheme(),
            &Direction::Forward {
                head_voltage: 400.0,
                demand: PhaseQuantity::new(10_000.0, 0.0),
            },
            Termination::ServiceVoltage,
            &state(10_000.0, 250.0),
            &[],
        )
        .unwrap();
        assert!(report.loss_pct.is_none());
        assert_eq!(report.lowest_service_voltage, 390.0);
    }

    #[test]
    fn zero_backward_flow_is_domain_error() {
        let err = RunReport::from_state(
            &scheme(),
            &Direction::Backward { end_voltage: 380.0 },
            Termination::LengthCap,
            &state(0.0, 0.0),
            &[],
        );
        assert!(matches!(err, Err(FeederError::Domain(_))));
    }

    #[test]
    fn display_does_not_panic() {
        let report = RunReport::from_state(
            &scheme(),
            &Direction::Backward { end_voltage: 380.0 },
            Termination::LengthCap,
            &state(10_000.0, 250.0),
            &[],
        )
        .unwrap();
        let s = format!("{report}");
        assert!(s.contains("Loss:"));
        assert!(s.contains("Stations (fuel):"));
    }
}
