/// Marching engine walking the feeder pole by pole.
pub mod engine;
/// Line segments and validated pole layouts.
pub mod feeder;
pub mod kpi;
/// Segment loss and voltage drop models.
pub mod power_balance;
pub mod transformer;
pub mod types;
