//! Cumulative table ingest and validation.
//!
//! This module turns the workbook's raw cell grid into a validated
//! [`DailySeries`]. The grid is the pipeline's ground truth, so nothing is
//! silently corrected here.
//!
//! Design goals:
//! - **Strict schema** for the fixed header (clear errors when upstream
//!   renames or reorders columns)
//! - **Row-level validation** with errors naming the offending date and column
//! - **Deterministic behavior** (a malformed row aborts the run; it is never
//!   skipped or patched)
//! - **Separation of concerns**: no signal math here

use chrono::{NaiveDate, NaiveTime};

use crate::domain::{Cell, DailyObservation, DailySeries};
use crate::error::PipelineError;

/// Fixed column layout of the cumulative sheet.
const COL_DATE: usize = 0;
const COL_CASES: usize = 1;
const COL_DIFF: usize = 3;
const COL_DEATHS: usize = 4;

const HEADER_DATE: &str = "Berichtsdatum";
const HEADER_CASES: &str = "Anzahl COVID-19-Fälle";
const HEADER_DIFF: &str = "Differenz Vortag Fälle";
const HEADER_DEATHS: &str = "Todesfälle";

const EMPTY_CELL: Cell = Cell::Empty;

/// Build the validated series from the sheet's rows (header row included).
///
/// On success the series holds exactly one observation per data row.
pub fn load_series(rows: &[Vec<Cell>]) -> Result<DailySeries, PipelineError> {
    let header = rows
        .first()
        .ok_or_else(|| PipelineError::malformed("cumulative table", "table is empty"))?;
    check_header(header)?;

    let mut series = DailySeries::new();
    for row in rows.iter().skip(1) {
        let date = normalize_date(cell(row, COL_DATE))?;
        let cases = count_cell(cell(row, COL_CASES), HEADER_CASES, false)?;
        let deaths = count_cell(cell(row, COL_DEATHS), HEADER_DEATHS, true)?;

        // check the reported day delta against the previous cumulative count
        if let Some(prev) = series.last() {
            if let Some(reported) = delta_cell(cell(row, COL_DIFF))? {
                let actual = cases as i64 - prev.cases as i64;
                if reported != actual {
                    return Err(PipelineError::DataIntegrityFault {
                        date,
                        field: HEADER_DIFF,
                        detail: format!(
                            "reported day delta {reported} but the cumulative count moved by {actual} \
                             ({} to {cases})",
                            prev.cases
                        ),
                    });
                }
            }
        }

        series.push(DailyObservation { date, cases, deaths })?;
    }
    Ok(series)
}

fn check_header(header: &[Cell]) -> Result<(), PipelineError> {
    let expected = [
        (COL_DATE, HEADER_DATE),
        (COL_CASES, HEADER_CASES),
        (COL_DIFF, HEADER_DIFF),
        (COL_DEATHS, HEADER_DEATHS),
    ];
    for (idx, name) in expected {
        match cell(header, idx) {
            Cell::Text(found) if found == name => {}
            other => {
                return Err(PipelineError::malformed(
                    "cumulative table",
                    format!("header column {idx} is {other:?}, expected `{name}`"),
                ));
            }
        }
    }
    Ok(())
}

fn cell(row: &[Cell], idx: usize) -> &Cell {
    row.get(idx).unwrap_or(&EMPTY_CELL)
}

/// Normalize the report date column.
///
/// Native date cells must sit at midnight (a stray time means a hand-edited
/// sheet). Text dates are `DD.MM.YYYY`, with the occasional typo of a comma
/// for the dot.
fn normalize_date(cell: &Cell) -> Result<NaiveDate, PipelineError> {
    match cell {
        Cell::DateTime(stamp) => {
            if stamp.time() != NaiveTime::MIN {
                return Err(PipelineError::DataIntegrityFault {
                    date: stamp.date(),
                    field: HEADER_DATE,
                    detail: format!("report date carries a time of day ({})", stamp.time()),
                });
            }
            Ok(stamp.date())
        }
        Cell::Text(text) => {
            let cleaned = text.replace(',', ".");
            NaiveDate::parse_from_str(cleaned.trim(), "%d.%m.%Y").map_err(|_| {
                PipelineError::TypeMismatch {
                    field: HEADER_DATE.to_string(),
                    expected: "a DD.MM.YYYY date",
                    value: text.clone(),
                }
            })
        }
        other => Err(PipelineError::TypeMismatch {
            field: HEADER_DATE.to_string(),
            expected: "a date",
            value: format!("{other:?}"),
        }),
    }
}

/// Read a cumulative count column.
///
/// `blank_as_zero` covers the deaths column, which upstream leaves empty
/// until the first death is recorded.
fn count_cell(cell: &Cell, field: &'static str, blank_as_zero: bool) -> Result<u64, PipelineError> {
    match cell {
        Cell::Empty if blank_as_zero => Ok(0),
        Cell::Number(v) => integral(*v)
            .and_then(|i| u64::try_from(i).ok())
            .ok_or_else(|| PipelineError::TypeMismatch {
                field: field.to_string(),
                expected: "a non-negative whole count",
                value: v.to_string(),
            }),
        other => Err(PipelineError::TypeMismatch {
            field: field.to_string(),
            expected: "a non-negative whole count",
            value: format!("{other:?}"),
        }),
    }
}

/// Read the optional day-delta column. Empty means "not supplied".
fn delta_cell(cell: &Cell) -> Result<Option<i64>, PipelineError> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Number(v) => integral(*v).map(Some).ok_or_else(|| PipelineError::TypeMismatch {
            field: HEADER_DIFF.to_string(),
            expected: "a whole number",
            value: v.to_string(),
        }),
        other => Err(PipelineError::TypeMismatch {
            field: HEADER_DIFF.to_string(),
            expected: "a whole number",
            value: format!("{other:?}"),
        }),
    }
}

fn integral(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
        Some(v as i64)
    } else {
        None
    }
}
