//! Marching engine that walks the feeder pole by pole in either direction.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::devices::Load;
use crate::error::{FeederError, Result};

use super::feeder::Scheme;
use super::kpi::RunReport;
use super::power_balance::SegmentPhysics;
use super::transformer::{SolverOptions, TransformerModel, solve_transformer_drop};
use super::types::{Direction, PoleRecord, SimulationState};

/// Exit predicate of a forward run, in addition to the length cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCondition {
    /// Stop once the service voltage falls to the minimum.
    Voltage,
    /// Also stop once the remaining active flow falls to one pole load.
    VoltageAndPower,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Service voltage reached the configured minimum.
    ServiceVoltage,
    /// Remaining active flow fell to one pole load.
    PowerExhausted,
    /// The next segment would exceed the maximum feeder length.
    LengthCap,
}

/// Stopping thresholds shared by both directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchLimits {
    /// Minimum service voltage at a pole (V, secondary side).
    pub min_service_voltage: f64,
    /// Maximum feeder length (m).
    pub max_length_m: f64,
    pub stop: StopCondition,
}

/// Per-pole trace and summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub records: Vec<PoleRecord>,
    pub report: RunReport,
}

/// Marching engine owning the scheme, physics strategy, and optional
/// transformer stage.
///
/// Generic over `P: SegmentPhysics` for static dispatch. The engine holds no
/// run state; every call to [`Engine::run`] owns its own
/// [`SimulationState`], so one engine can serve concurrent runs.
#[derive(Debug, Clone)]
pub struct Engine<P: SegmentPhysics> {
    scheme: Scheme,
    physics: P,
    transformer: Option<TransformerModel>,
    solver: SolverOptions,
    limits: MarchLimits,
}

impl<P: SegmentPhysics> Engine<P> {
    /// Creates a marching engine.
    ///
    /// # Arguments
    ///
    /// * `scheme` - Validated pole layout
    /// * `physics` - Segment loss and drop strategy
    /// * `transformer` - Per-pole step-down transformer, if any
    /// * `solver` - Tolerance and iteration cap for the transformer solver
    /// * `limits` - Stopping thresholds
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the limits or solver options are not
    /// strictly positive.
    pub fn new(
        scheme: Scheme,
        physics: P,
        transformer: Option<TransformerModel>,
        solver: SolverOptions,
        limits: MarchLimits,
    ) -> Result<Self> {
        if !(limits.min_service_voltage.is_finite() && limits.min_service_voltage > 0.0) {
            return Err(FeederError::configuration(
                "supply.min_service_voltage",
                format!("must be > 0, got {}", limits.min_service_voltage),
            ));
        }
        if !(limits.max_length_m.is_finite() && limits.max_length_m > 0.0) {
            return Err(FeederError::configuration(
                "supply.max_length_m",
                format!("must be > 0, got {}", limits.max_length_m),
            ));
        }
        if !(solver.epsilon.is_finite() && solver.epsilon > 0.0) {
            return Err(FeederError::configuration(
                "simulation.epsilon",
                format!("must be > 0, got {}", solver.epsilon),
            ));
        }
        if solver.max_iterations == 0 {
            return Err(FeederError::configuration(
                "simulation.max_solver_iterations",
                "must be > 0",
            ));
        }
        Ok(Self {
            scheme,
            physics,
            transformer,
            solver,
            limits,
        })
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn limits(&self) -> &MarchLimits {
        &self.limits
    }

    /// Primary over secondary voltage, `1.0` without a transformer.
    fn ratio(&self) -> f64 {
        self.transformer.map_or(1.0, |t| t.ratio)
    }

    /// Marches the feeder in `direction` until a stopping condition holds.
    ///
    /// # Errors
    ///
    /// Returns a domain error for invalid starting voltages or a voltage
    /// collapsing along the line, and a convergence error if a transformer
    /// solve hits its iteration cap.
    pub fn run(&self, direction: Direction) -> Result<RunOutcome> {
        let mut state = self.initial_state(&direction)?;
        let mut records = Vec::new();

        debug!(
            scheme = self.scheme.name(),
            direction = direction.label(),
            line_voltage = state.line_voltage,
            flow_w = state.flow.active,
            "starting feeder march"
        );

        let termination = loop {
            if let Some(t) = self.should_stop(&direction, &state) {
                break t;
            }
            let record = self.step(&direction, &mut state)?;
            trace!(%record, "pole connected");
            records.push(record);
        };

        if termination == Termination::LengthCap && matches!(direction, Direction::Forward { .. })
        {
            warn!(
                scheme = self.scheme.name(),
                distance_m = state.distance_m,
                "forward march stopped on the length cap before reaching the service voltage"
            );
        }
        debug!(
            poles = state.iteration,
            distance_m = state.distance_m,
            loss_w = state.loss_w,
            ?termination,
            "feeder march finished"
        );

        let report = RunReport::from_state(&self.scheme, &direction, termination, &state, &records)?;
        Ok(RunOutcome { records, report })
    }

    fn initial_state(&self, direction: &Direction) -> Result<SimulationState> {
        let ratio = self.ratio();
        let kinds = self.scheme.stations().len();
        match *direction {
            Direction::Forward {
                head_voltage,
                demand,
            } => {
                check_start_voltage(head_voltage, "head voltage")?;
                if !demand.is_finite() {
                    return Err(FeederError::domain("route demand is not finite"));
                }
                let flow = demand / f64::from(self.scheme.sides());
                Ok(SimulationState::new(
                    head_voltage,
                    head_voltage / ratio,
                    flow,
                    kinds,
                ))
            }
            Direction::Backward { end_voltage } => {
                check_start_voltage(end_voltage, "end voltage")?;
                let pole = self.scheme.pole().demand();
                let mut state =
                    SimulationState::new(end_voltage * ratio, end_voltage, pole, kinds);
                state.delivered = pole;
                Ok(state)
            }
        }
    }

    fn should_stop(&self, direction: &Direction, state: &SimulationState) -> Option<Termination> {
        if let Direction::Forward { .. } = direction {
            if state.service_voltage <= self.limits.min_service_voltage {
                return Some(Termination::ServiceVoltage);
            }
            if self.limits.stop == StopCondition::VoltageAndPower
                && state.flow.active <= self.scheme.pole().demand().active
            {
                return Some(Termination::PowerExhausted);
            }
        }
        let next_distance = self.scheme.segment().step_m() * (state.iteration + 1) as f64;
        if next_distance > self.limits.max_length_m {
            return Some(Termination::LengthCap);
        }
        None
    }

    /// Advances one segment and connects the pole at its far end.
    fn step(&self, direction: &Direction, state: &mut SimulationState) -> Result<PoleRecord> {
        let sign = direction.sign();
        let segment = self.scheme.segment();
        let pole_load = self.scheme.pole().demand();
        let mut transformer_loss_w = 0.0;

        // The terminal pole's transformer sees only its own load, known up front.
        if let (Direction::Backward { .. }, 0, Some(t)) =
            (direction, state.iteration, self.transformer.as_ref())
        {
            let copper = self.physics.segment_loss(t.rt, t.xt, state.line_voltage, pole_load)?;
            let du = self.physics.voltage_drop(t.rt, t.xt, state.line_voltage, pole_load)?;
            state.line_voltage += du;
            let drawn = copper + t.no_load();
            state.flow += drawn;
            transformer_loss_w += drawn.active;
        }

        let segment_loss =
            self.physics
                .segment_loss(segment.r(), segment.x(), state.line_voltage, state.flow)?;
        let du = self
            .physics
            .voltage_drop(segment.r(), segment.x(), state.line_voltage, state.flow)?;
        state.line_voltage += sign * du;
        if !(state.line_voltage.is_finite() && state.line_voltage > 0.0) {
            return Err(FeederError::domain(format!(
                "line voltage collapsed to {} V at pole {}",
                state.line_voltage,
                state.iteration + 1
            )));
        }
        state.flow += segment_loss * sign;

        let mut drawn = pole_load;
        match self.transformer.as_ref() {
            Some(t) => {
                let drop = solve_transformer_drop(
                    &self.physics,
                    &self.solver,
                    state.line_voltage,
                    t,
                    pole_load,
                )?;
                let extra = drop.delta_power + t.no_load();
                drawn += extra;
                transformer_loss_w += extra.active;
                state.service_voltage = (state.line_voltage - drop.delta_voltage) / t.ratio;
            }
            None => state.service_voltage = state.line_voltage,
        }
        state.flow += drawn * sign;
        state.delivered += pole_load;
        state.loss_w += segment_loss.active + transformer_loss_w;

        state.iteration += 1;
        let pole = state.iteration;
        let mut stations = 0;
        for (i, station) in self.scheme.stations().iter().enumerate() {
            if station.connects_at(pole) {
                let demand = station.demand();
                state.flow += demand * sign;
                state.delivered += demand;
                state.station_counts[i] += 1;
                stations += 1;
            }
        }
        state.distance_m = pole as f64 * segment.step_m();

        if !state.flow.is_finite() {
            return Err(FeederError::domain(format!(
                "power flow is not finite at pole {pole}"
            )));
        }

        Ok(PoleRecord {
            pole,
            distance_m: state.distance_m,
            line_voltage: state.line_voltage,
            service_voltage: state.service_voltage,
            flow: state.flow,
            segment_loss_w: segment_loss.active,
            transformer_loss_w,
            cumulative_loss_w: state.loss_w,
            stations,
        })
    }
}

fn check_start_voltage(voltage: f64, what: &str) -> Result<()> {
    if voltage.is_finite() && voltage > 0.0 {
        Ok(())
    } else {
        Err(FeederError::domain(format!(
            "{what} must be strictly positive, got {voltage}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{PoleLoad, StationLoad, StationTrigger};
    use crate::sim::feeder::LineSegment;
    use crate::sim::power_balance::PhysicsVariant;
    use crate::sim::types::PhaseQuantity;

    fn lv_scheme(step: f64, sides: u32, stations: Vec<StationLoad>) -> Scheme {
        Scheme::new(
            "test",
            LineSegment::new(step, 0.000125, 0.0000705).unwrap(),
            PoleLoad::from_nameplate(150.0, 0.95).unwrap(),
            sides,
            stations,
        )
        .unwrap()
    }

    fn limits(stop: StopCondition, max_length_m: f64) -> MarchLimits {
        MarchLimits {
            min_service_voltage: 380.0,
            max_length_m,
            stop,
        }
    }

    fn lv_engine(scheme: Scheme, stop: StopCondition, max_length_m: f64) -> Engine<PhysicsVariant> {
        Engine::new(
            scheme,
            PhysicsVariant::SINGLE_PHASE,
            None,
            SolverOptions::default(),
            limits(stop, max_length_m),
        )
        .unwrap()
    }

    fn forward(head_voltage: f64, active: f64, reactive: f64) -> Direction {
        Direction::Forward {
            head_voltage,
            demand: PhaseQuantity::new(active, reactive),
        }
    }

    #[test]
    fn backward_run_stops_on_length_cap() {
        let engine = lv_engine(lv_scheme(40.0, 1, Vec::new()), StopCondition::Voltage, 10_000.0);
        let out = engine.run(Direction::Backward { end_voltage: 380.0 }).unwrap();
        assert_eq!(out.records.len(), 250);
        assert_eq!(out.report.poles, 250);
        assert_eq!(out.report.distance_m, 10_000.0);
        assert_eq!(out.report.termination, Termination::LengthCap);
    }

    #[test]
    fn forward_run_at_threshold_does_nothing() {
        let engine = lv_engine(lv_scheme(34.0, 1, Vec::new()), StopCondition::Voltage, 10_000.0);
        let out = engine.run(forward(380.0, 210_000.0, 50_000.0)).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.report.final_flow, PhaseQuantity::new(210_000.0, 50_000.0));
        assert_eq!(out.report.distance_m, 0.0);
        assert_eq!(out.report.total_loss_w, 0.0);
        assert_eq!(out.report.termination, Termination::ServiceVoltage);
    }

    #[test]
    fn forward_splits_demand_across_sides() {
        let engine = lv_engine(lv_scheme(34.0, 2, Vec::new()), StopCondition::Voltage, 10_000.0);
        let out = engine.run(forward(380.0, 210_000.0, 50_000.0)).unwrap();
        assert_eq!(out.report.final_flow, PhaseQuantity::new(105_000.0, 25_000.0));
    }

    #[test]
    fn forward_run_is_monotonic() {
        let engine = lv_engine(lv_scheme(34.0, 2, Vec::new()), StopCondition::Voltage, 10_000.0);
        let out = engine.run(forward(400.0, 210_000.0, 50_000.0)).unwrap();
        assert!(!out.records.is_empty());
        assert_eq!(out.report.termination, Termination::ServiceVoltage);

        let mut voltage = 400.0;
        let mut active = 105_000.0;
        for r in &out.records {
            assert!(r.line_voltage < voltage, "voltage rose at pole {}", r.pole);
            assert!(r.flow.active < active, "flow rose at pole {}", r.pole);
            voltage = r.line_voltage;
            active = r.flow.active;
        }
        let last = out.records.last().unwrap();
        assert!(last.service_voltage <= 380.0);
        assert!(out.records[out.records.len() - 2].service_voltage > 380.0);
    }

    #[test]
    fn forward_voltage_and_power_stops_when_flow_exhausted() {
        let engine = lv_engine(
            lv_scheme(34.0, 1, Vec::new()),
            StopCondition::VoltageAndPower,
            100_000.0,
        );
        // 15 poles' worth of demand, far too little to sag 20 V
        let out = engine.run(forward(400.0, 2_250.0, 0.0)).unwrap();
        assert_eq!(out.report.termination, Termination::PowerExhausted);
        assert!(out.report.final_flow.active <= 150.0);
        assert!(out.report.service_voltage > 380.0);
    }

    #[test]
    fn forward_voltage_only_is_bounded_by_length_cap() {
        let engine = lv_engine(lv_scheme(34.0, 1, Vec::new()), StopCondition::Voltage, 3_400.0);
        let out = engine.run(forward(400.0, 2_250.0, 0.0)).unwrap();
        assert_eq!(out.report.termination, Termination::LengthCap);
        assert_eq!(out.records.len(), 100);
    }

    #[test]
    fn backward_run_is_monotonic() {
        let engine = lv_engine(lv_scheme(40.0, 1, Vec::new()), StopCondition::Voltage, 4_000.0);
        let out = engine.run(Direction::Backward { end_voltage: 380.0 }).unwrap();
        let mut voltage = 380.0;
        let mut active = 150.0;
        for r in &out.records {
            assert!(r.line_voltage > voltage);
            assert!(r.flow.active > active);
            voltage = r.line_voltage;
            active = r.flow.active;
        }
        let pct = out.report.loss_pct.unwrap();
        assert!(pct > 0.0 && pct < 100.0);
    }

    #[test]
    fn periodic_stations_are_inserted_on_schedule() {
        let fuel = StationLoad::new("fuel", 40_000.0, 0.9, 10, StationTrigger::Periodic).unwrap();
        let charging =
            StationLoad::new("charging", 10_000.0, 0.985, 20, StationTrigger::Periodic).unwrap();
        let engine = lv_engine(
            lv_scheme(40.0, 1, vec![fuel, charging]),
            StopCondition::Voltage,
            2_000.0,
        );
        let out = engine.run(Direction::Backward { end_voltage: 380.0 }).unwrap();
        assert_eq!(out.report.poles, 50);
        let counts: Vec<(&str, usize)> = out
            .report
            .stations
            .iter()
            .map(|s| (s.name.as_str(), s.count))
            .collect();
        assert_eq!(counts, vec![("fuel", 5), ("charging", 2)]);
        assert_eq!(out.records[19].stations, 2);
        assert_eq!(out.records[9].stations, 1);
        assert_eq!(out.records[0].stations, 0);
    }

    #[test]
    fn one_shot_station_fires_once() {
        let fuel = StationLoad::new("fuel", 40_000.0, 0.9, 10, StationTrigger::OneShot).unwrap();
        let engine = lv_engine(lv_scheme(40.0, 1, vec![fuel]), StopCondition::Voltage, 2_000.0);
        let out = engine.run(Direction::Backward { end_voltage: 380.0 }).unwrap();
        assert_eq!(out.report.stations[0].count, 1);
    }

    #[test]
    fn delivered_plus_loss_matches_backward_flow() {
        let engine = lv_engine(lv_scheme(40.0, 1, Vec::new()), StopCondition::Voltage, 4_000.0);
        let out = engine.run(Direction::Backward { end_voltage: 380.0 }).unwrap();
        let r = &out.report;
        assert!((r.supplied_w - r.final_flow.active).abs() < 1e-6);
        assert!((r.delivered.active - 150.0 * 101.0).abs() < 1e-9);
    }

    #[test]
    fn non_positive_start_voltage_is_domain_error() {
        let engine = lv_engine(lv_scheme(40.0, 1, Vec::new()), StopCondition::Voltage, 4_000.0);
        assert!(matches!(
            engine.run(Direction::Backward { end_voltage: 0.0 }),
            Err(FeederError::Domain(_))
        ));
        assert!(matches!(
            engine.run(forward(-400.0, 1_000.0, 0.0)),
            Err(FeederError::Domain(_))
        ));
    }

    #[test]
    fn collapsing_voltage_is_domain_error() {
        let scheme = Scheme::new(
            "lossy",
            LineSegment::new(40.0, 0.5, 0.1).unwrap(),
            PoleLoad::from_nameplate(150.0, 0.95).unwrap(),
            1,
            Vec::new(),
        )
        .unwrap();
        let engine = Engine::new(
            scheme,
            PhysicsVariant::SINGLE_PHASE,
            None,
            SolverOptions::default(),
            MarchLimits {
                min_service_voltage: 1.0,
                max_length_m: 10_000.0,
                stop: StopCondition::Voltage,
            },
        )
        .unwrap();
        assert!(matches!(
            engine.run(forward(400.0, 1_000_000.0, 0.0)),
            Err(FeederError::Domain(_))
        ));
    }

    #[test]
    fn invalid_limits_are_rejected() {
        let bad = Engine::new(
            lv_scheme(40.0, 1, Vec::new()),
            PhysicsVariant::SINGLE_PHASE,
            None,
            SolverOptions::default(),
            limits(StopCondition::Voltage, 0.0),
        );
        assert!(matches!(bad, Err(FeederError::Configuration { .. })));

        let bad = Engine::new(
            lv_scheme(40.0, 1, Vec::new()),
            PhysicsVariant::SINGLE_PHASE,
            None,
            SolverOptions {
                epsilon: 1e-8,
                max_iterations: 0,
            },
            limits(StopCondition::Voltage, 1_000.0),
        );
        assert!(matches!(bad, Err(FeederError::Configuration { .. })));
    }

    #[test]
    fn transformer_stage_lowers_service_voltage() {
        let transformer =
            TransformerModel::derive(4.5, 3_700.0, 2.3, 530.0, 250_000.0, 10_000.0, 400.0)
                .unwrap();
        let scheme = Scheme::new(
            "mv",
            LineSegment::new(40.0, 0.0068, 0.001423).unwrap(),
            PoleLoad::from_nameplate(20_000.0, 0.95).unwrap(),
            1,
            Vec::new(),
        )
        .unwrap();
        let engine = Engine::new(
            scheme,
            PhysicsVariant::THREE_PHASE,
            Some(transformer),
            SolverOptions::default(),
            MarchLimits {
                min_service_voltage: 380.0,
                max_length_m: 2_000.0,
                stop: StopCondition::VoltageAndPower,
            },
        )
        .unwrap();

        let out = engine.run(Direction::Backward { end_voltage: 380.0 }).unwrap();
        assert_eq!(out.records.len(), 50);
        for r in &out.records {
            assert!(r.service_voltage < r.line_voltage / transformer.ratio);
            assert!(r.transformer_loss_w > transformer.px);
        }
        // terminal transformer plus one per connected pole
        let no_load_total = transformer.px * 51.0;
        assert!(out.report.total_loss_w > no_load_total);

        let out = engine
            .run(forward(10_500.0, 1_000_000.0, 200_000.0))
            .unwrap();
        assert!(!out.records.is_empty());
        assert!(out.records.iter().all(|r| r.transformer_loss_w > 0.0));
    }

    #[test]
    fn run_reports_transformer_convergence_failure() {
        let transformer =
            TransformerModel::derive(4.5, 3_700.0, 2.3, 530.0, 250_000.0, 10_000.0, 400.0)
                .unwrap();
        let scheme = Scheme::new(
            "mv",
            LineSegment::new(40.0, 0.0068, 0.001423).unwrap(),
            PoleLoad::from_nameplate(20_000.0, 0.95).unwrap(),
            1,
            Vec::new(),
        )
        .unwrap();
        let engine = Engine::new(
            scheme,
            PhysicsVariant::THREE_PHASE,
            Some(transformer),
            SolverOptions {
                epsilon: 1e-300,
                max_iterations: 1,
            },
            limits(StopCondition::Voltage, 2_000.0),
        )
        .unwrap();

        let err = engine
            .run(forward(10_500.0, 1_000_000.0, 200_000.0))
            .unwrap_err();
        assert!(
            matches!(err, FeederError::Convergence { iterations: 1, .. }),
            "got {err:?}"
        );
    }
}
