//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - built up incrementally while loading and reconciling
//! - exported to JSON/CSV
//! - reloaded later for plotting without network access

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// One day's cumulative totals as of that day's report.
///
/// `cases` and `deaths` are running totals since the start of recording,
/// never per-day increments. Per-day increments are derived later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub cases: u64,
    pub deaths: u64,
}

/// A validated cumulative series: one observation per calendar day, no gaps,
/// totals never decreasing.
///
/// The invariants are enforced at the only growth point, [`DailySeries::push`].
/// Downstream consumers (signals, reports, charts) index freely because a
/// constructed series is known to be well-formed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailySeries {
    observations: Vec<DailyObservation>,
}

impl DailySeries {
    pub fn new() -> Self {
        Self {
            observations: Vec::new(),
        }
    }

    /// Rebuild a series from stored observations, re-checking every invariant.
    ///
    /// Used when reloading an exported series file; a hand-edited file must
    /// not smuggle an ill-formed series past the constructors.
    pub fn from_observations(
        observations: impl IntoIterator<Item = DailyObservation>,
    ) -> Result<Self, PipelineError> {
        let mut series = Self::new();
        for obs in observations {
            series.push(obs)?;
        }
        Ok(series)
    }

    /// Append the next day's observation.
    ///
    /// Fails with a `DataIntegrityFault` naming the offending date and field
    /// when the observation is not exactly one day after the current last, or
    /// when either cumulative total decreases.
    pub fn push(&mut self, obs: DailyObservation) -> Result<(), PipelineError> {
        if let Some(prev) = self.observations.last() {
            let expected = prev.date.succ_opt().ok_or_else(|| {
                PipelineError::DataIntegrityFault {
                    date: prev.date,
                    field: "date",
                    detail: "series ends at the calendar range limit".into(),
                }
            })?;
            if obs.date != expected {
                return Err(PipelineError::DataIntegrityFault {
                    date: obs.date,
                    field: "date",
                    detail: format!("expected {expected} directly after {}", prev.date),
                });
            }
            if obs.cases < prev.cases {
                return Err(PipelineError::DataIntegrityFault {
                    date: obs.date,
                    field: "cases",
                    detail: format!("cumulative count shrank from {} to {}", prev.cases, obs.cases),
                });
            }
            if obs.deaths < prev.deaths {
                return Err(PipelineError::DataIntegrityFault {
                    date: obs.date,
                    field: "deaths",
                    detail: format!(
                        "cumulative count shrank from {} to {}",
                        prev.deaths, obs.deaths
                    ),
                });
            }
        }
        self.observations.push(obs);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn last(&self) -> Option<&DailyObservation> {
        self.observations.last()
    }

    pub fn first(&self) -> Option<&DailyObservation> {
        self.observations.first()
    }

    pub fn observations(&self) -> &[DailyObservation] {
        &self.observations
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    /// Cumulative case counts as a signed sequence for signal arithmetic.
    pub fn cumulative_cases(&self) -> Vec<i64> {
        self.observations.iter().map(|o| o.cases as i64).collect()
    }
}

/// A single table cell as produced by the tabular collaborators
/// (workbook sheets today; any future grid source uses the same currency).
///
/// Keeping this enum small and source-agnostic lets the loader be tested
/// without touching spreadsheet files.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

/// The single most recent record published on the bulletin page.
///
/// The page carries only the latest totals with no day delta, so this is
/// evidence for extending a series by at most one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestEntry {
    pub date: NaiveDate,
    pub cases: u64,
    pub deaths: u64,
}

/// Cross-checked aggregate totals from the live feed, as of "now".
///
/// Unlike [`LatestEntry`] this carries no report date; the feed only knows
/// the current totals and how much of them arrived within the last day.
/// That pairing is what lets reconciliation rebuild up to two days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateEvidence {
    pub total_cases: i64,
    pub new_cases: i64,
    pub total_deaths: i64,
    pub new_deaths: i64,
    pub total_recovered: i64,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags plus environment defaults.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory holding the cached workbook download.
    pub cache_dir: PathBuf,
    /// User-Agent presented to every upstream server.
    pub user_agent: String,

    /// Consult the bulletin page for a possibly fresher latest entry.
    pub use_bulletin: bool,
    /// Consult the feature-service aggregates for possibly fresher totals.
    pub use_feed: bool,

    /// Days of the series tail to print in the summary.
    pub tail: usize,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    /// Optional SVG chart of the derived signals.
    pub chart: Option<PathBuf>,
    pub export_csv: Option<PathBuf>,
    pub export_series: Option<PathBuf>,
}
