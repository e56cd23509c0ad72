/// CSV export of pole traces.
pub mod export;
