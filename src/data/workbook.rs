//! Workbook extraction for the cumulative report table.
//!
//! The published workbook carries several sheets; we care about two:
//!
//! - the cumulative table, on the single sheet whose name ends in `-gesamt`
//! - the daily-values sheet (name starts with `Tageswerte`), whose first
//!   header cell embeds the report's as-of timestamp
//!
//! Extraction stops at the raw cell grid. Interpreting columns and
//! validating the series is the loader's job, which keeps this module free
//! of any schema knowledge beyond sheet naming.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;

use crate::domain::Cell;
use crate::error::PipelineError;

/// All rows of the cumulative sheet, header row included.
pub fn daily_rows(path: &Path) -> Result<Vec<Vec<Cell>>, PipelineError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        PipelineError::malformed(
            format!("workbook {}", path.display()),
            format!("cannot open workbook: {e}"),
        )
    })?;
    let names = workbook.sheet_names().to_vec();
    let sheet = single_matching_sheet(&names, |n| n.ends_with("-gesamt"), "cumulative", path)?
        .to_string();
    let range = workbook.worksheet_range(&sheet).map_err(|e| {
        PipelineError::malformed(
            format!("workbook {}", path.display()),
            format!("cannot read sheet {sheet}: {e}"),
        )
    })?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect())
}

/// The as-of timestamp embedded in the daily-values sheet header, if any.
pub fn embedded_as_of(path: &Path) -> Result<Option<DateTime<Utc>>, PipelineError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        PipelineError::malformed(
            format!("workbook {}", path.display()),
            format!("cannot open workbook: {e}"),
        )
    })?;
    let names = workbook.sheet_names().to_vec();
    let sheet = single_matching_sheet(&names, |n| n.starts_with("Tageswerte"), "daily-values", path)?
        .to_string();
    let range = workbook.worksheet_range(&sheet).map_err(|e| {
        PipelineError::malformed(
            format!("workbook {}", path.display()),
            format!("cannot read sheet {sheet}: {e}"),
        )
    })?;
    let header = range.rows().next().and_then(|row| row.first());
    match header.map(cell_from_data) {
        Some(Cell::Text(text)) => Ok(parse_as_of(&text)),
        _ => Ok(None),
    }
}

fn single_matching_sheet<'a>(
    names: &'a [String],
    matches: impl Fn(&str) -> bool,
    what: &str,
    path: &Path,
) -> Result<&'a str, PipelineError> {
    let hits: Vec<&String> = names.iter().filter(|n| matches(n)).collect();
    if hits.len() != 1 {
        return Err(PipelineError::malformed(
            format!("workbook {}", path.display()),
            format!("expected exactly one {what} sheet, found {}", hits.len()),
        ));
    }
    Ok(hits[0])
}

/// Parse `DD.MM.YYYY` with an optional `HH:MM[:SS]` out of free text, e.g.
/// `"Stand: 24.04.2020, 00:00 Uhr"`. Midnight is assumed when no time is
/// present.
pub fn parse_as_of(text: &str) -> Option<DateTime<Utc>> {
    let date_re = Regex::new(r"(\d{1,2})\.(\d{1,2})\.(\d{4})").ok()?;
    let caps = date_re.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let time_re = Regex::new(r"(\d{1,2}):(\d{2})(?::(\d{2}))?").ok()?;
    let time = match time_re.captures(text) {
        Some(caps) => {
            let hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps[2].parse().ok()?;
            let second: u32 = caps.get(3).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
            NaiveTime::from_hms_opt(hour, minute, second)?
        }
        None => NaiveTime::MIN,
    };
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Convert a spreadsheet cell into the loader's currency.
///
/// Whitespace-only strings count as empty. Spreadsheet error values (`#N/A`
/// and friends) also map to `Empty`; the loader decides per column whether
/// an empty cell is acceptable.
fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Cell::Empty
            } else {
                Cell::Text(trimmed.to_string())
            }
        }
        Data::Float(v) => Cell::Number(*v),
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Bool(v) => Cell::Text(v.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => Cell::DateTime(naive),
            None => Cell::Empty,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}
