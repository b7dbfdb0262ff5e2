//! Formatted terminal output for runs and feed totals.
//!
//! We keep formatting code in one place so:
//! - the fetch/reconcile code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use std::path::PathBuf;

use crate::domain::{AggregateEvidence, DailySeries};
use crate::signal::DerivedSignals;

/// Where each part of the final series came from.
///
/// `None` for the bulletin or feed fields means that source was skipped
/// for the run, not that it contributed nothing.
#[derive(Debug, Clone, Default)]
pub struct SourceSummary {
    pub workbook_path: PathBuf,
    pub workbook_refreshed: bool,
    pub bulletin_applied: Option<bool>,
    pub feed_days_appended: Option<usize>,
}

/// Format the full run summary (series provenance + latest counts).
pub fn format_run_summary(
    series: &DailySeries,
    signals: &DerivedSignals,
    sources: &SourceSummary,
) -> String {
    let mut out = String::new();

    out.push_str("=== epi - SARS-CoV-2 daily series (RKI) ===\n");
    out.push_str(&format!(
        "Workbook: {} ({})\n",
        sources.workbook_path.display(),
        if sources.workbook_refreshed {
            "refreshed"
        } else {
            "cached"
        },
    ));
    out.push_str(&format!(
        "Bulletin: {}\n",
        match sources.bulletin_applied {
            Some(true) => "appended 1 day",
            Some(false) => "no newer day",
            None => "skipped",
        },
    ));
    out.push_str(&format!(
        "Feed:     {}\n",
        match sources.feed_days_appended {
            Some(n) => format!("{n} day(s) appended"),
            None => "skipped".to_string(),
        },
    ));

    match (series.first(), series.last()) {
        (Some(first), Some(last)) => {
            out.push_str(&format!(
                "Series:   {} .. {} ({} days)\n",
                first.date,
                last.date,
                series.len(),
            ));
            let n = signals.len();
            if n == series.len() && n > 0 {
                out.push_str(&format!(
                    "Latest:   {} cases (+{}), {} deaths\n",
                    last.cases,
                    signals.daily_new[n - 1],
                    last.deaths,
                ));
            }
        }
        _ => out.push_str("Series:   empty\n"),
    }

    out
}

/// Format the last `n` days as a fixed-width table.
///
/// `signals` must have been computed from `series`.
pub fn format_tail(series: &DailySeries, signals: &DerivedSignals, n: usize) -> String {
    let mut out = String::new();
    let len = series.len();
    if len == 0 || n == 0 {
        return out;
    }
    let start = len.saturating_sub(n);

    out.push_str(
        format!(
            "{:<12} {:>10} {:>8} {:>8} {:>8}\n",
            "date", "cases", "new", "new-7d", "deaths"
        )
        .trim_end(),
    );
    out.push('\n');

    out.push_str(
        format!(
            "{:-<12} {:-<10} {:-<8} {:-<8} {:-<8}\n",
            "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for (i, obs) in series.observations().iter().enumerate().skip(start) {
        out.push_str(
            format!(
                "{:<12} {:>10} {:>8} {:>8} {:>8}\n",
                obs.date.to_string(),
                obs.cases,
                signals.daily_new[i],
                signals.daily_new_mean7[i],
                obs.deaths,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Format the feed's current aggregate totals (the `totals` command output).
pub fn format_totals(evidence: &AggregateEvidence) -> String {
    let mut out = String::new();

    out.push_str("=== epi - RKI feed totals ===\n");
    out.push_str(&format!(
        "{:<20} {:>10}\n",
        "Current cases:", evidence.total_cases
    ));
    out.push_str(&format!(
        "{:<20} {:>10}\n",
        "Current new cases:", evidence.new_cases
    ));
    out.push_str(&format!(
        "{:<20} {:>10}\n",
        "Current deaths:", evidence.total_deaths
    ));
    out.push_str(&format!(
        "{:<20} {:>10}\n",
        "Current new deaths:", evidence.new_deaths
    ));
    out.push_str(&format!(
        "{:<20} {:>10}\n",
        "Current recovered:", evidence.total_recovered
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DailyObservation;
    use chrono::NaiveDate;

    fn series_3() -> DailySeries {
        let mut series = DailySeries::new();
        for (day, cases, deaths) in [(1, 100, 2), (2, 130, 3), (3, 170, 5)] {
            series
                .push(DailyObservation {
                    date: NaiveDate::from_ymd_opt(2020, 3, day).unwrap(),
                    cases,
                    deaths,
                })
                .unwrap();
        }
        series
    }

    #[test]
    fn run_summary_names_every_source() {
        let series = series_3();
        let signals = DerivedSignals::compute(&series);
        let sources = SourceSummary {
            workbook_path: PathBuf::from("cache/Fallzahlen_Tab.xlsx"),
            workbook_refreshed: true,
            bulletin_applied: Some(true),
            feed_days_appended: Some(2),
        };

        let text = format_run_summary(&series, &signals, &sources);
        assert!(text.contains("cache/Fallzahlen_Tab.xlsx (refreshed)"));
        assert!(text.contains("Bulletin: appended 1 day"));
        assert!(text.contains("Feed:     2 day(s) appended"));
        assert!(text.contains("Series:   2020-03-01 .. 2020-03-03 (3 days)"));
        assert!(text.contains("Latest:   170 cases (+40), 5 deaths"));
    }

    #[test]
    fn run_summary_marks_skipped_sources() {
        let series = series_3();
        let signals = DerivedSignals::compute(&series);
        let sources = SourceSummary {
            workbook_path: PathBuf::from("x.xlsx"),
            workbook_refreshed: false,
            bulletin_applied: None,
            feed_days_appended: None,
        };

        let text = format_run_summary(&series, &signals, &sources);
        assert!(text.contains("(cached)"));
        assert!(text.contains("Bulletin: skipped"));
        assert!(text.contains("Feed:     skipped"));
    }

    #[test]
    fn tail_lists_only_the_last_rows() {
        let series = series_3();
        let signals = DerivedSignals::compute(&series);

        let text = format_tail(&series, &signals, 2);
        assert!(!text.contains("2020-03-01"));
        assert!(text.contains("2020-03-02"));
        assert!(text.contains("2020-03-03"));

        let last_row = text.lines().last().unwrap();
        assert!(last_row.starts_with("2020-03-03"));
        assert!(last_row.contains("170"));
        assert!(last_row.contains("40"));
    }

    #[test]
    fn totals_mirror_the_feed_fields() {
        let evidence = AggregateEvidence {
            total_cases: 156337,
            new_cases: 2055,
            total_deaths: 5913,
            new_deaths: 179,
            total_recovered: 117400,
        };

        let text = format_totals(&evidence);
        let expected = "=== epi - RKI feed totals ===\n\
                        Current cases:           156337\n\
                        Current new cases:         2055\n\
                        Current deaths:            5913\n\
                        Current new deaths:         179\n\
                        Current recovered:       117400\n";
        assert_eq!(text, expected);
    }
}
