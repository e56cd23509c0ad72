//! Error types shared by the physics, solver, and marching engine.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by a feeder simulation run.
///
/// All variants are raised at the point of detection and propagated to the
/// caller unchanged; a run has no partial results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeederError {
    /// Invalid physical input: non-positive voltage, power factor outside
    /// `(0, 1]`, zero rated quantities, or a non-finite intermediate value.
    #[error("domain error: {0}")]
    Domain(String),

    /// The transformer fixed-point solver hit its iteration cap.
    #[error("transformer solver did not converge after {iterations} iterations (relative error {error:e})")]
    Convergence {
        /// Iterations performed before giving up.
        iterations: usize,
        /// Relative error of the last iteration.
        error: f64,
    },

    /// Malformed scheme or run configuration.
    #[error("configuration error: {field}: {message}")]
    Configuration {
        /// Dotted field path (e.g. `"scheme.step_m"`).
        field: String,
        /// Human-readable constraint description.
        message: String,
    },
}

impl FeederError {
    pub(crate) fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }

    pub(crate) fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<ConfigError> for FeederError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration {
            field: e.field,
            message: e.message,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, FeederError>;

/// Returns `value` if it is finite, otherwise a domain error naming `what`.
pub(crate) fn ensure_finite(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FeederError::domain(format!("{what} is not finite ({value})")))
    }
}
