//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the cumulative daily record (`DailyObservation`) and the validated,
//!   gap-free series built from it (`DailySeries`)
//! - the cell model tabular collaborators produce (`Cell`)
//! - supplementary evidence carriers (`LatestEntry`, `AggregateEvidence`)
//! - run configuration (`RunConfig`)

pub mod types;

pub use types::*;
