//! mqk-thesis
//!
//! Persisted thesis lifecycle (spec §4.9): DRAFT -> ACTIVE -> REALIZED or
//! DRAFT/ACTIVE -> INVALIDATED/EXPIRED, order<->thesis reverse index,
//! by-market index, atomic-replace file persistence, and calibration stats.

mod tracker;
mod types;

pub use tracker::{ThesisTracker, ROUND_TRIP_FEE_CENTS};
pub use types::{CalibrationBucket, CalibrationReport, Direction, Thesis, ThesisState};
