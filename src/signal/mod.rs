//! Derived signals over finished cumulative sequences.
//!
//! Everything here is pure integer arithmetic on in-memory slices:
//!
//! - `delta` turns a cumulative sequence into stepwise differences
//! - `rolling_mean` smooths a sequence with a trailing window
//! - `DerivedSignals` bundles the four standard derived sequences
//!
//! Both transforms keep output length equal to input length and treat the
//! first `step + 1` positions as a boundary region, so downstream tables and
//! charts can zip sequences against the date axis without offset bookkeeping.

use serde::{Deserialize, Serialize};

use crate::domain::DailySeries;

/// Window used for smoothing and for week-over-week comparisons.
pub const WEEK: usize = 7;

/// Stepwise difference of `seq`, same length as `seq`.
///
/// Position `i` holds `seq[i] - seq[i - step]` for `i > step`; the boundary
/// positions `0..=step` hold zero. A zero reads as "no change", which is the
/// honest value for days whose predecessor is unknown.
pub fn delta(seq: &[i64], step: usize) -> Vec<i64> {
    let mut out = vec![0; seq.len()];
    for i in 0..seq.len() {
        if i > step {
            out[i] = seq[i] - seq[i - step];
        }
    }
    out
}

/// Trailing mean of `seq` with window length `step`, same length as `seq`.
///
/// Position `i` holds the mean of the `step` values ending at `i` (inclusive)
/// for `i > step`; the boundary positions `0..=step` carry the input values
/// unchanged. Means are rounded half away from zero to stay in integer space.
///
/// `step == 0` returns the input unchanged.
pub fn rolling_mean(seq: &[i64], step: usize) -> Vec<i64> {
    if step == 0 {
        return seq.to_vec();
    }
    let mut out = seq.to_vec();
    for i in 0..seq.len() {
        if i > step {
            let window = &seq[i + 1 - step..=i];
            let sum: i64 = window.iter().sum();
            out[i] = round_half_away(sum as f64 / step as f64);
        }
    }
    out
}

fn round_half_away(value: f64) -> i64 {
    value.round() as i64
}

/// The four standard derived sequences, index-aligned with the source series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedSignals {
    /// New cases per day (1-step difference of the cumulative counts).
    pub daily_new: Vec<i64>,
    /// Week-over-week change of the daily new cases.
    pub weekly_change: Vec<i64>,
    /// 7-day trailing mean of the daily new cases.
    pub daily_new_mean7: Vec<i64>,
    /// 7-day trailing mean of the week-over-week change.
    pub weekly_change_mean7: Vec<i64>,
}

impl DerivedSignals {
    pub fn compute(series: &DailySeries) -> Self {
        let cumulative = series.cumulative_cases();
        let daily_new = delta(&cumulative, 1);
        let weekly_change = delta(&daily_new, WEEK);
        let daily_new_mean7 = rolling_mean(&daily_new, WEEK);
        let weekly_change_mean7 = rolling_mean(&weekly_change, WEEK);
        Self {
            daily_new,
            weekly_change,
            daily_new_mean7,
            weekly_change_mean7,
        }
    }

    /// Length shared by all four sequences.
    pub fn len(&self) -> usize {
        self.daily_new.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daily_new.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DailyObservation;

    #[test]
    fn delta_zeroes_the_boundary() {
        assert_eq!(delta(&[10, 12, 15, 20], 1), vec![0, 0, 3, 5]);
    }

    #[test]
    fn delta_with_wider_step() {
        let seq = [1, 2, 4, 7, 11, 16];
        assert_eq!(delta(&seq, 2), vec![0, 0, 0, 5, 7, 12]);
    }

    #[test]
    fn delta_step_at_least_len_is_all_boundary() {
        assert_eq!(delta(&[5, 9, 14], 3), vec![0, 0, 0]);
        assert_eq!(delta(&[5, 9, 14], 10), vec![0, 0, 0]);
    }

    #[test]
    fn delta_empty_input() {
        assert!(delta(&[], 1).is_empty());
    }

    #[test]
    fn rolling_mean_keeps_boundary_values() {
        assert_eq!(rolling_mean(&[10, 12, 15, 20, 30], 2), vec![10, 12, 15, 18, 25]);
    }

    #[test]
    fn rolling_mean_rounds_half_away_from_zero() {
        // window [1, 2] has mean 1.5
        assert_eq!(rolling_mean(&[0, 0, 1, 2], 2), vec![0, 0, 1, 2]);
        assert_eq!(rolling_mean(&[9, 9, 1, 2], 2), vec![9, 9, 1, 2]);
        // i == 3 is the first computed position for step 2
        assert_eq!(rolling_mean(&[0, 0, 0, 1, 2], 2)[4], 2);
        assert_eq!(rolling_mean(&[0, 0, 0, -1, -2], 2)[4], -2);
    }

    #[test]
    fn rolling_mean_step_zero_is_identity() {
        assert_eq!(rolling_mean(&[3, 1, 4], 0), vec![3, 1, 4]);
    }

    #[test]
    fn signals_stay_aligned_with_the_series() {
        let mut series = DailySeries::new();
        let start: chrono::NaiveDate = "2020-03-01".parse().unwrap();
        let totals = [10u64, 12, 15, 20, 30, 45, 60, 80, 110, 150];
        for (i, &cases) in totals.iter().enumerate() {
            series
                .push(DailyObservation {
                    date: start + chrono::Duration::days(i as i64),
                    cases,
                    deaths: 0,
                })
                .unwrap();
        }
        let signals = DerivedSignals::compute(&series);
        assert_eq!(signals.len(), series.len());
        assert_eq!(signals.daily_new[0], 0);
        assert_eq!(signals.daily_new[2], 3);
        assert_eq!(signals.daily_new[9], 40);
        // week-over-week: daily_new[9] - daily_new[2] = 40 - 3
        assert_eq!(signals.weekly_change[9], 37);
        // boundary region of the weekly signals stays untouched
        assert_eq!(signals.weekly_change[7], 0);
        assert_eq!(signals.daily_new_mean7[7], signals.daily_new[7]);
    }
}
