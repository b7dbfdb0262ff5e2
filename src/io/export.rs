//! Export the reconciled series and its derived signals.
//!
//! Two formats:
//!
//! - CSV, one row per day, easy to consume in spreadsheets
//! - series JSON, the portable representation a later `plot` invocation can
//!   re-render without any network access
//!
//! The JSON schema is defined by [`SeriesFile`]; reloading always
//! re-validates the observations, so a hand-edited file cannot smuggle an
//! ill-formed series back in.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{DailyObservation, DailySeries};
use crate::error::PipelineError;
use crate::signal::DerivedSignals;

/// A saved series file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesFile {
    pub tool: String,
    /// Date of the last observation at export time.
    pub as_of: NaiveDate,
    pub observations: Vec<DailyObservation>,
    pub signals: DerivedSignals,
}

/// Write a series JSON file.
pub fn write_series_json(
    path: &Path,
    series: &DailySeries,
    signals: &DerivedSignals,
) -> Result<(), PipelineError> {
    let as_of = series
        .last()
        .map(|o| o.date)
        .ok_or_else(|| PipelineError::Config("cannot export an empty series".to_string()))?;
    let file = File::create(path).map_err(|e| {
        PipelineError::io(format!("create series JSON '{}'", path.display()), e)
    })?;
    let doc = SeriesFile {
        tool: "epi".to_string(),
        as_of,
        observations: series.observations().to_vec(),
        signals: signals.clone(),
    };
    serde_json::to_writer_pretty(file, &doc).map_err(|e| {
        PipelineError::io(
            format!("write series JSON '{}'", path.display()),
            std::io::Error::other(e),
        )
    })?;
    Ok(())
}

/// Read a series JSON file and rebuild the validated series from it.
pub fn read_series_json(path: &Path) -> Result<(DailySeries, DerivedSignals), PipelineError> {
    let file = File::open(path).map_err(|e| {
        PipelineError::io(format!("open series JSON '{}'", path.display()), e)
    })?;
    let doc: SeriesFile = serde_json::from_reader(file).map_err(|e| {
        PipelineError::malformed(format!("series JSON {}", path.display()), e)
    })?;
    let series = DailySeries::from_observations(doc.observations)?;
    if doc.signals.len() != series.len() {
        return Err(PipelineError::malformed(
            format!("series JSON {}", path.display()),
            format!(
                "signals cover {} days but the series has {}",
                doc.signals.len(),
                series.len()
            ),
        ));
    }
    Ok((series, doc.signals))
}

/// Write the day-by-day table to a CSV file.
pub fn write_series_csv(
    path: &Path,
    series: &DailySeries,
    signals: &DerivedSignals,
) -> Result<(), PipelineError> {
    if signals.len() != series.len() {
        return Err(PipelineError::Config(format!(
            "signals cover {} days but the series has {}",
            signals.len(),
            series.len()
        )));
    }
    let mut file = File::create(path).map_err(|e| {
        PipelineError::io(format!("create export CSV '{}'", path.display()), e)
    })?;

    writeln!(
        file,
        "date,cases,deaths,daily_new,daily_new_mean7,weekly_change,weekly_change_mean7"
    )
    .map_err(|e| PipelineError::io("write export CSV header", e))?;

    for (i, obs) in series.observations().iter().enumerate() {
        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            obs.date,
            obs.cases,
            obs.deaths,
            signals.daily_new[i],
            signals.daily_new_mean7[i],
            signals.weekly_change[i],
            signals.weekly_change_mean7[i],
        )
        .map_err(|e| PipelineError::io("write export CSV row", e))?;
    }

    Ok(())
}
