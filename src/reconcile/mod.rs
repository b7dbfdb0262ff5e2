//! Reconciliation of the authoritative series with fresher, narrower sources.
//!
//! The workbook is the ground truth but lags by up to two days. Two kinds of
//! supplementary evidence can close that gap:
//!
//! - the bulletin page's single latest record (a date plus totals)
//! - the live feed's aggregate totals (no date, but totals plus the share
//!   reported within the last day)
//!
//! Trust is asymmetric by construction. Evidence may only *extend* the
//! series; it never rewrites a day the workbook already covers. Stale or
//! out-of-order evidence is discarded with a debug log, while evidence that
//! contradicts itself (or the series) is a hard failure.

use chrono::NaiveDate;
use log::{debug, warn};

use crate::domain::{AggregateEvidence, DailyObservation, DailySeries, LatestEntry};
use crate::error::PipelineError;

/// Maximum divergence between redundant views of one quantity.
///
/// The feed layers are refreshed from one database on slightly different
/// schedules, so totals routinely differ by a count or two around the
/// reporting cutoff. Anything at or past this bound means a broken query,
/// not reporting lag.
pub const TOLERANCE: i64 = 3;

/// Check redundant views of `quantity` against each other.
///
/// The first candidate is the baseline and becomes the returned value.
/// Divergence at or beyond `tolerance` aborts; smaller nonzero divergence is
/// logged as a warning and otherwise accepted.
pub fn cross_validate(
    quantity: &str,
    candidates: &[(&str, i64)],
    tolerance: i64,
) -> Result<i64, PipelineError> {
    let Some(&(baseline_source, baseline)) = candidates.first() else {
        return Err(PipelineError::malformed(
            quantity,
            "no candidate values to cross-validate",
        ));
    };
    for &(source, value) in &candidates[1..] {
        let diff = (value - baseline).abs();
        if diff >= tolerance {
            return Err(PipelineError::CrossSourceInconsistency {
                quantity: quantity.to_string(),
                baseline_source: baseline_source.to_string(),
                baseline,
                candidate_source: source.to_string(),
                candidate: value,
                tolerance,
            });
        }
        if diff != 0 {
            warn!(
                "{quantity}: {source} reports {value} while {baseline_source} reports {baseline} \
                 (within tolerance {tolerance})"
            );
        }
    }
    Ok(baseline)
}

/// Try to extend the series by one day from the bulletin's latest record.
///
/// The record is appended only when it is dated exactly one day after the
/// series end and both totals are strictly ahead. Anything else is stale or
/// already-covered evidence and is dropped. Returns whether a day was added.
pub fn apply_latest_entry(
    series: &mut DailySeries,
    entry: &LatestEntry,
) -> Result<bool, PipelineError> {
    let Some(last) = series.last().copied() else {
        debug!("bulletin record ignored: series is empty");
        return Ok(false);
    };
    if last.date.succ_opt() != Some(entry.date) {
        debug!(
            "bulletin record for {} ignored: series already ends at {}",
            entry.date, last.date
        );
        return Ok(false);
    }
    if entry.cases <= last.cases || entry.deaths <= last.deaths {
        debug!(
            "bulletin record for {} ignored: totals ({} cases, {} deaths) are not ahead of the series",
            entry.date, entry.cases, entry.deaths
        );
        return Ok(false);
    }
    series.push(DailyObservation {
        date: entry.date,
        cases: entry.cases,
        deaths: entry.deaths,
    })?;
    Ok(true)
}

/// Try to extend the series from the feed's aggregate totals.
///
/// The feed carries no report date, so dating is positional: whatever it
/// knows beyond the series end belongs to the next calendar day(s). When the
/// feed total is ahead of the series, the day before the feed's current day
/// can be reconstructed as `total - new`; if even that reconstruction is
/// ahead of the series, two days are appended, otherwise one.
///
/// Returns the number of appended days (0, 1, or 2).
pub fn extend_from_aggregates(
    series: &mut DailySeries,
    evidence: &AggregateEvidence,
) -> Result<usize, PipelineError> {
    let Some(last) = series.last().copied() else {
        return Err(PipelineError::malformed(
            "aggregate reconciliation",
            "cannot extend an empty series",
        ));
    };
    if last.cases as i64 >= evidence.total_cases {
        debug!(
            "aggregate totals ignored: series total {} already covers the feed total {}",
            last.cases, evidence.total_cases
        );
        return Ok(0);
    }

    let prior_cases = evidence.total_cases - evidence.new_cases;
    let prior_deaths = evidence.total_deaths - evidence.new_deaths;
    if prior_cases < 0 || prior_deaths < 0 {
        let date = next_date(series)?;
        let field = if prior_cases < 0 { "cases" } else { "deaths" };
        return Err(PipelineError::DataIntegrityFault {
            date,
            field,
            detail: format!(
                "feed reports more new than total (cases {}/{}, deaths {}/{})",
                evidence.new_cases, evidence.total_cases, evidence.new_deaths, evidence.total_deaths
            ),
        });
    }

    let mut appended = 0;
    if (last.cases as i64) < prior_cases {
        let date = next_date(series)?;
        series.push(DailyObservation {
            date,
            cases: count_for(prior_cases, date, "cases")?,
            deaths: count_for(prior_deaths, date, "deaths")?,
        })?;
        appended += 1;
    }
    let date = next_date(series)?;
    series.push(DailyObservation {
        date,
        cases: count_for(evidence.total_cases, date, "cases")?,
        deaths: count_for(evidence.total_deaths, date, "deaths")?,
    })?;
    appended += 1;
    Ok(appended)
}

fn next_date(series: &DailySeries) -> Result<NaiveDate, PipelineError> {
    series
        .last()
        .and_then(|o| o.date.succ_opt())
        .ok_or_else(|| {
            PipelineError::malformed("aggregate reconciliation", "series has no extendable end date")
        })
}

fn count_for(value: i64, date: NaiveDate, field: &'static str) -> Result<u64, PipelineError> {
    u64::try_from(value).map_err(|_| PipelineError::DataIntegrityFault {
        date,
        field,
        detail: format!("aggregate evidence produced negative count {value}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(start: &str, days: &[(u64, u64)]) -> DailySeries {
        let start: NaiveDate = start.parse().unwrap();
        let mut out = DailySeries::new();
        for (i, &(cases, deaths)) in days.iter().enumerate() {
            out.push(DailyObservation {
                date: start + chrono::Duration::days(i as i64),
                cases,
                deaths,
            })
            .unwrap();
        }
        out
    }

    #[test]
    fn cross_validation_tolerates_small_divergence() {
        let candidates = [("county sum", 100), ("state sum", 101), ("record sum", 102)];
        assert_eq!(cross_validate("total cases", &candidates, TOLERANCE).unwrap(), 100);
    }

    #[test]
    fn cross_validation_aborts_at_the_tolerance_bound() {
        let at_bound = [("county sum", 100), ("state sum", 103)];
        let err = cross_validate("total cases", &at_bound, TOLERANCE).unwrap_err();
        match err {
            PipelineError::CrossSourceInconsistency {
                baseline, candidate, ..
            } => {
                assert_eq!(baseline, 100);
                assert_eq!(candidate, 103);
            }
            other => panic!("unexpected error: {other}"),
        }

        let far = [("county sum", 100), ("state sum", 110)];
        assert!(cross_validate("total cases", &far, TOLERANCE).is_err());
    }

    #[test]
    fn bulletin_extends_by_exactly_one_day() {
        let mut s = series("2020-04-20", &[(1000, 50), (1010, 52)]);
        let entry = LatestEntry {
            date: "2020-04-22".parse().unwrap(),
            cases: 1025,
            deaths: 53,
        };
        assert!(apply_latest_entry(&mut s, &entry).unwrap());
        assert_eq!(s.len(), 3);
        assert_eq!(s.last().unwrap().cases, 1025);
    }

    #[test]
    fn bulletin_for_a_covered_day_is_dropped() {
        let mut s = series("2020-04-20", &[(1000, 50), (1010, 52)]);
        let entry = LatestEntry {
            date: "2020-04-21".parse().unwrap(),
            cases: 1012,
            deaths: 53,
        };
        assert!(!apply_latest_entry(&mut s, &entry).unwrap());
        assert_eq!(s.len(), 2);
        assert_eq!(s.last().unwrap().cases, 1010);
    }

    #[test]
    fn bulletin_without_strict_progress_is_dropped() {
        let mut s = series("2020-04-20", &[(1000, 50), (1010, 52)]);
        // next-day date, but deaths did not move
        let entry = LatestEntry {
            date: "2020-04-22".parse().unwrap(),
            cases: 1020,
            deaths: 52,
        };
        assert!(!apply_latest_entry(&mut s, &entry).unwrap());
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn aggregates_rebuild_two_days_when_the_gap_spans_two() {
        let mut s = series("2020-04-20", &[(1000, 50)]);
        let evidence = AggregateEvidence {
            total_cases: 1050,
            new_cases: 40,
            total_deaths: 60,
            new_deaths: 4,
            total_recovered: 900,
        };
        assert_eq!(extend_from_aggregates(&mut s, &evidence).unwrap(), 2);
        let obs = s.observations();
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[1].date, "2020-04-21".parse().unwrap());
        assert_eq!(obs[1].cases, 1010);
        assert_eq!(obs[1].deaths, 56);
        assert_eq!(obs[2].date, "2020-04-22".parse().unwrap());
        assert_eq!(obs[2].cases, 1050);
        assert_eq!(obs[2].deaths, 60);
    }

    #[test]
    fn aggregates_append_one_day_when_only_the_total_is_ahead() {
        // prior-day reconstruction (1050 - 60 = 990) is already covered
        let mut s = series("2020-04-20", &[(1000, 50)]);
        let evidence = AggregateEvidence {
            total_cases: 1050,
            new_cases: 60,
            total_deaths: 55,
            new_deaths: 3,
            total_recovered: 900,
        };
        assert_eq!(extend_from_aggregates(&mut s, &evidence).unwrap(), 1);
        let obs = s.observations();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[1].date, "2020-04-21".parse().unwrap());
        assert_eq!(obs[1].cases, 1050);
        assert_eq!(obs[1].deaths, 55);
    }

    #[test]
    fn aggregates_behind_the_series_are_ignored() {
        let mut s = series("2020-04-20", &[(1000, 50)]);
        let evidence = AggregateEvidence {
            total_cases: 1000,
            new_cases: 10,
            total_deaths: 49,
            new_deaths: 1,
            total_recovered: 900,
        };
        assert_eq!(extend_from_aggregates(&mut s, &evidence).unwrap(), 0);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn negative_reconstructed_counts_are_a_hard_fault() {
        let mut s = series("2020-04-20", &[(10, 0)]);
        let evidence = AggregateEvidence {
            total_cases: 50,
            new_cases: 60,
            total_deaths: 2,
            new_deaths: 0,
            total_recovered: 0,
        };
        // prior-day cases would be 50 - 60 = -10
        let err = extend_from_aggregates(&mut s, &evidence).unwrap_err();
        match err {
            PipelineError::DataIntegrityFault { field, .. } => assert_eq!(field, "cases"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn shrinking_feed_deaths_are_a_hard_fault() {
        let mut s = series("2020-04-20", &[(1000, 70)]);
        let evidence = AggregateEvidence {
            total_cases: 1050,
            new_cases: 50,
            total_deaths: 60,
            new_deaths: 4,
            total_recovered: 900,
        };
        assert!(extend_from_aggregates(&mut s, &evidence).is_err());
    }
}
