//! Load-side models connected along the feeder.

/// Per-pole lighting load.
pub mod pole;
/// Intermittently inserted station loads.
pub mod station;
pub mod types;

pub use pole::PoleLoad;
pub use station::{StationLoad, StationTrigger, shared_triggers};
pub use types::Load;
