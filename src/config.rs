//! TOML-based feeder configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::devices::{PoleLoad, StationLoad, StationTrigger, shared_triggers};
use crate::error::FeederError;
use crate::sim::engine::{Engine, MarchLimits, StopCondition};
use crate::sim::feeder::{LineSegment, Scheme};
use crate::sim::power_balance::{DropForm, LossForm, PhysicsVariant};
use crate::sim::transformer::{SolverOptions, TransformerModel};
use crate::sim::types::{Direction, PhaseQuantity};

/// Top-level feeder configuration parsed from TOML.
///
/// All sections have defaults matching the `highway_1a` preset. Load from
/// TOML with [`FeederConfig::from_toml_file`] or use
/// [`FeederConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeederConfig {
    /// Run mode, physics, and solver parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Supply voltages, route demand, and length cap.
    #[serde(default)]
    pub supply: SupplyConfig,
    /// Pole layout and line parameters.
    #[serde(default)]
    pub scheme: SchemeConfig,
    /// Station kinds inserted along the route.
    #[serde(default = "default_stations")]
    pub stations: Vec<StationConfig>,
    /// Per-pole step-down transformer; absent for a low-voltage feeder.
    #[serde(default)]
    pub transformer: Option<TransformerConfig>,
}

/// Which end the march starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionKind {
    Forward,
    Backward,
}

impl DirectionKind {
    /// Parses `"forward"` or `"backward"`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "forward" => Some(Self::Forward),
            "backward" => Some(Self::Backward),
            _ => None,
        }
    }
}

/// Run mode, physics, and solver parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// `"forward"` (from the supply head) or `"backward"` (from the far end).
    pub direction: DirectionKind,
    /// Segment loss form: `"single_phase"` or `"three_phase"`.
    pub loss: LossForm,
    /// Voltage drop form: `"simplified"` or `"magnitude"`.
    pub drop: DropForm,
    /// Forward exit predicate: `"voltage"` or `"voltage_and_power"`.
    pub stop: StopCondition,
    /// Default station trigger: `"periodic"` or `"one_shot"`.
    pub station_trigger: StationTrigger,
    /// Relative tolerance of the transformer solver.
    pub epsilon: f64,
    /// Iteration cap of the transformer solver.
    pub max_solver_iterations: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            direction: DirectionKind::Backward,
            loss: LossForm::SinglePhase,
            drop: DropForm::Simplified,
            stop: StopCondition::Voltage,
            station_trigger: StationTrigger::Periodic,
            epsilon: 1e-8,
            max_solver_iterations: 100,
        }
    }
}

/// Supply voltages, route demand, and length cap.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupplyConfig {
    /// Line voltage at the supply head for forward runs (V).
    pub head_voltage: f64,
    /// Service voltage at the farthest pole for backward runs (V).
    pub end_voltage: f64,
    /// Minimum service voltage at any pole (V).
    pub min_service_voltage: f64,
    /// Maximum feeder length (m).
    pub max_length_m: f64,
    /// Route active demand at the head (W).
    pub demand_active_w: f64,
    /// Route reactive demand at the head (var).
    pub demand_reactive_var: f64,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            head_voltage: 400.0,
            end_voltage: 380.0,
            min_service_voltage: 380.0,
            max_length_m: 10_000.0,
            demand_active_w: 210_000.0,
            demand_reactive_var: 50_000.0,
        }
    }
}

/// Pole layout and line parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemeConfig {
    /// Human-readable layout name.
    pub name: String,
    /// Traffic lanes of the road (informational).
    pub lanes: u32,
    /// Road sides carrying poles (must be > 0).
    pub sides: u32,
    /// Pole spacing (m, must be > 0).
    pub step_m: f64,
    /// Lamp active power per pole (W).
    pub pole_active_w: f64,
    /// Lamp power factor, in `(0, 1]`.
    pub pole_power_factor: f64,
    /// Line resistance per metre (ohm/m).
    pub r0_ohm_per_m: f64,
    /// Line reactance per metre (ohm/m).
    pub x0_ohm_per_m: f64,
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self {
            name: "highway, 4 lanes, class 1A, two-sided opposite".to_string(),
            lanes: 4,
            sides: 2,
            step_m: 34.0,
            pole_active_w: 250.0,
            pole_power_factor: 0.95,
            r0_ohm_per_m: 0.000125,
            x0_ohm_per_m: 0.0000705,
        }
    }
}

/// One station kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StationConfig {
    /// Unique station kind name (e.g. `"fuel"`).
    pub name: String,
    /// Active power (W).
    pub active_w: f64,
    /// Power factor, in `(0, 1]`.
    pub power_factor: f64,
    /// Insertion rate in poles (must be > 0).
    pub rate: usize,
    /// Overrides `simulation.station_trigger` for this kind.
    #[serde(default)]
    pub trigger: Option<StationTrigger>,
}

impl StationConfig {
    fn fuel(rate: usize) -> Self {
        Self {
            name: "fuel".to_string(),
            active_w: 40_000.0,
            power_factor: 0.9,
            rate,
            trigger: None,
        }
    }

    fn charging(rate: usize) -> Self {
        Self {
            name: "charging".to_string(),
            active_w: 10_000.0,
            power_factor: 0.985,
            rate,
            trigger: None,
        }
    }
}

fn default_stations() -> Vec<StationConfig> {
    vec![StationConfig::fuel(1470), StationConfig::charging(2940)]
}

/// Step-down transformer nameplate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformerConfig {
    /// Short-circuit voltage (%).
    pub uk_pct: f64,
    /// Short-circuit loss (W).
    pub pk: f64,
    /// No-load current (%).
    pub ix_pct: f64,
    /// No-load loss (W).
    pub px: f64,
    /// Rated apparent power (VA).
    pub rated_power: f64,
    /// Rated primary voltage (V).
    pub primary_voltage: f64,
    /// Rated secondary voltage (V).
    pub secondary_voltage: f64,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            uk_pct: 4.0,
            pk: 300.0,
            ix_pct: 3.0,
            px: 60.0,
            rated_power: 10_000.0,
            primary_voltage: 20_000.0,
            secondary_voltage: 400.0,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"scheme.step_m"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl FeederConfig {
    /// Returns the default low-voltage highway layout.
    pub fn baseline() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            supply: SupplyConfig::default(),
            scheme: SchemeConfig::default(),
            stations: default_stations(),
            transformer: None,
        }
    }

    /// Returns the four-lane class 2 road with staggered two-sided poles.
    pub fn urban_2() -> Self {
        Self {
            scheme: SchemeConfig {
                name: "ordinary road, 4 lanes, class 2, two-sided staggered".to_string(),
                step_m: 37.0,
                pole_active_w: 100.0,
                ..SchemeConfig::default()
            },
            stations: vec![StationConfig::fuel(1350), StationConfig::charging(2700)],
            ..Self::baseline()
        }
    }

    /// Returns the two-lane class 3 road with one-sided poles.
    pub fn urban_3() -> Self {
        Self {
            scheme: SchemeConfig {
                name: "ordinary road, 2 lanes, class 3, one-sided".to_string(),
                lanes: 2,
                sides: 1,
                step_m: 40.0,
                pole_active_w: 150.0,
                ..SchemeConfig::default()
            },
            stations: vec![StationConfig::fuel(1250), StationConfig::charging(2500)],
            ..Self::baseline()
        }
    }

    /// Returns the highway layout fed at 20 kV through a transformer per pole.
    pub fn highway_1a_mv() -> Self {
        Self {
            simulation: SimulationConfig {
                loss: LossForm::ThreePhase,
                drop: DropForm::Magnitude,
                stop: StopCondition::VoltageAndPower,
                ..SimulationConfig::default()
            },
            supply: SupplyConfig {
                head_voltage: 20_000.0,
                end_voltage: 380.0,
                min_service_voltage: 380.0,
                max_length_m: 20_000.0,
                demand_active_w: 210_000.0,
                demand_reactive_var: 0.0,
            },
            scheme: SchemeConfig {
                r0_ohm_per_m: 0.0068,
                x0_ohm_per_m: 0.001423,
                ..SchemeConfig::default()
            },
            stations: default_stations(),
            transformer: Some(TransformerConfig::default()),
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["highway_1a", "urban_2", "urban_3", "highway_1a_mv"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "highway_1a" => Ok(Self::baseline()),
            "urban_2" => Ok(Self::urban_2()),
            "urban_3" => Ok(Self::urban_3()),
            "highway_1a_mv" => Ok(Self::highway_1a_mv()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scheme", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut positive = |field: &str, value: f64| {
            if !(value.is_finite() && value > 0.0) {
                errors.push(ConfigError::new(field, format!("must be > 0, got {value}")));
            }
        };

        let sim = &self.simulation;
        positive("simulation.epsilon", sim.epsilon);

        let sup = &self.supply;
        positive("supply.head_voltage", sup.head_voltage);
        positive("supply.end_voltage", sup.end_voltage);
        positive("supply.min_service_voltage", sup.min_service_voltage);
        positive("supply.max_length_m", sup.max_length_m);

        let sch = &self.scheme;
        positive("scheme.step_m", sch.step_m);
        positive("scheme.pole_active_w", sch.pole_active_w);

        if let Some(t) = &self.transformer {
            positive("transformer.rated_power", t.rated_power);
            positive("transformer.primary_voltage", t.primary_voltage);
            positive("transformer.secondary_voltage", t.secondary_voltage);
        }

        if sim.max_solver_iterations == 0 {
            errors.push(ConfigError::new(
                "simulation.max_solver_iterations",
                "must be > 0",
            ));
        }
        if !(sup.demand_active_w.is_finite() && sup.demand_reactive_var.is_finite()) {
            errors.push(ConfigError::new("supply.demand_active_w", "must be finite"));
        }
        if sch.step_m > 0.0 && sup.max_length_m < sch.step_m {
            errors.push(ConfigError::new(
                "supply.max_length_m",
                "must be >= scheme.step_m",
            ));
        }
        if sch.sides == 0 {
            errors.push(ConfigError::new("scheme.sides", "must be > 0"));
        }
        if !valid_power_factor(sch.pole_power_factor) {
            errors.push(ConfigError::new(
                "scheme.pole_power_factor",
                format!("must be in (0, 1], got {}", sch.pole_power_factor),
            ));
        }
        for (field, v) in [
            ("scheme.r0_ohm_per_m", sch.r0_ohm_per_m),
            ("scheme.x0_ohm_per_m", sch.x0_ohm_per_m),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                errors.push(ConfigError::new(field, format!("must be >= 0, got {v}")));
            }
        }

        for (i, st) in self.stations.iter().enumerate() {
            let field = |name: &str| format!("stations.{}.{name}", st.name);
            if st.rate == 0 {
                errors.push(ConfigError::new(field("rate"), "must be > 0"));
            }
            if !valid_power_factor(st.power_factor) {
                errors.push(ConfigError::new(
                    field("power_factor"),
                    format!("must be in (0, 1], got {}", st.power_factor),
                ));
            }
            if self.stations[..i].iter().any(|o| o.name == st.name) {
                errors.push(ConfigError::new(
                    format!("stations.{}", st.name),
                    "station names must be unique",
                ));
            }
        }

        errors
    }

    /// Returns non-fatal findings, such as two station kinds firing on an
    /// identical schedule.
    pub fn warnings(&self) -> Vec<ConfigError> {
        let Ok(stations) = self.station_loads() else {
            return Vec::new();
        };
        let pairs = shared_triggers(&stations);
        pairs
            .into_iter()
            .map(|(a, b)| {
                ConfigError::new(
                    format!("stations.{}.rate", b.name()),
                    format!(
                        "shares rate {} and {} trigger with \"{}\"; check for a copied rate",
                        b.rate(),
                        b.trigger().label(),
                        a.name()
                    ),
                )
            })
            .collect()
    }

    fn station_loads(&self) -> Result<Vec<StationLoad>, FeederError> {
        self.stations
            .iter()
            .map(|s| {
                StationLoad::new(
                    s.name.clone(),
                    s.active_w,
                    s.power_factor,
                    s.rate,
                    s.trigger.unwrap_or(self.simulation.station_trigger),
                )
            })
            .collect()
    }

    /// Builds the validated scheme from the `[scheme]` and `[[stations]]` sections.
    ///
    /// # Errors
    ///
    /// Returns a configuration or domain error for invalid parameters.
    pub fn build_scheme(&self) -> Result<Scheme, FeederError> {
        let sch = &self.scheme;
        let segment = LineSegment::new(sch.step_m, sch.r0_ohm_per_m, sch.x0_ohm_per_m)?;
        let pole = PoleLoad::from_nameplate(sch.pole_active_w, sch.pole_power_factor)?;
        Scheme::new(
            sch.name.clone(),
            segment,
            pole,
            sch.sides,
            self.station_loads()?,
        )
    }

    /// Derives the transformer model, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns a domain error if a rated quantity is zero.
    pub fn build_transformer(&self) -> Result<Option<TransformerModel>, FeederError> {
        self.transformer
            .as_ref()
            .map(|t| {
                TransformerModel::derive(
                    t.uk_pct,
                    t.pk,
                    t.ix_pct,
                    t.px,
                    t.rated_power,
                    t.primary_voltage,
                    t.secondary_voltage,
                )
            })
            .transpose()
    }

    /// Physics strategy selected by `simulation.loss` and `simulation.drop`.
    pub fn physics(&self) -> PhysicsVariant {
        PhysicsVariant {
            loss: self.simulation.loss,
            drop: self.simulation.drop,
        }
    }

    /// Builds a marching engine from this configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error, or a domain error from deriving
    /// loads and the transformer.
    pub fn build_engine(&self) -> Result<Engine<PhysicsVariant>, FeederError> {
        if let Some(e) = self.validate().into_iter().next() {
            return Err(e.into());
        }
        Engine::new(
            self.build_scheme()?,
            self.physics(),
            self.build_transformer()?,
            SolverOptions {
                epsilon: self.simulation.epsilon,
                max_iterations: self.simulation.max_solver_iterations,
            },
            MarchLimits {
                min_service_voltage: self.supply.min_service_voltage,
                max_length_m: self.supply.max_length_m,
                stop: self.simulation.stop,
            },
        )
    }

    /// Run direction with its starting conditions from `[supply]`.
    pub fn direction(&self, kind: DirectionKind) -> Direction {
        match kind {
            DirectionKind::Forward => Direction::Forward {
                head_voltage: self.supply.head_voltage,
                demand: PhaseQuantity::new(
                    self.supply.demand_active_w,
                    self.supply.demand_reactive_var,
                ),
            },
            DirectionKind::Backward => Direction::Backward {
                end_voltage: self.supply.end_voltage,
            },
        }
    }
}

fn valid_power_factor(pf: f64) -> bool {
    pf.is_finite() && pf > 0.0 && pf <= 1.0
}
