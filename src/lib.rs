//! Voltage sag and loss along a radial street-lighting feeder.

pub mod cli;
pub mod config;
pub mod devices;
pub mod error;
pub mod io;
/// Physics, transformer solver, and marching engine.
pub mod sim;

pub use error::{FeederError, Result};
