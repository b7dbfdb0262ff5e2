//! SVG chart output for the derived signals.
//!
//! The terminal plot only has room for two series; the SVG chart renders
//! all four (daily new, weekly change, and their 7-day means) with a
//! legend, which is the view worth keeping around as a file.

use std::path::Path;

use chrono::NaiveDate;
use plotters::prelude::*;

use crate::error::PipelineError;
use crate::signal::DerivedSignals;

/// Output size in pixels.
const CHART_SIZE: (u32, u32) = (1200, 700);

/// Render all four derived series into an SVG file.
pub fn write_signal_chart(
    path: &Path,
    dates: &[NaiveDate],
    signals: &DerivedSignals,
) -> Result<(), PipelineError> {
    if dates.len() < 2 {
        return Err(PipelineError::Config(
            "chart output needs at least two days of data".to_string(),
        ));
    }
    if signals.len() != dates.len() {
        return Err(PipelineError::Config(format!(
            "chart input lengths differ: {} dates vs {} signal days",
            dates.len(),
            signals.len(),
        )));
    }

    let (y_min, y_max) = value_bounds(signals);
    let x_max = (dates.len() - 1) as i64;

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption("SARS-CoV-2 Infektionen Deutschland", ("sans-serif", 24).into_font())
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0i64..x_max, y_min..y_max)
        .map_err(chart_error)?;

    chart
        .configure_mesh()
        .x_labels(12)
        .y_labels(10)
        .x_label_formatter(&|idx| date_label(dates, *idx))
        .draw()
        .map_err(chart_error)?;

    let daily_color = RGBColor(200, 30, 30); // red
    let daily_mean_color = RGBColor(30, 30, 200); // blue
    let change_color = RGBColor(230, 150, 0); // orange
    let change_mean_color = RGBColor(0, 140, 70); // green

    chart
        .draw_series(LineSeries::new(indexed(&signals.daily_new), &daily_color))
        .map_err(chart_error)?
        .label("new infections / day")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], daily_color));

    chart
        .draw_series(LineSeries::new(
            indexed(&signals.daily_new_mean7),
            &daily_mean_color,
        ))
        .map_err(chart_error)?
        .label("7 day mean")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], daily_mean_color));

    chart
        .draw_series(LineSeries::new(
            indexed(&signals.weekly_change),
            &change_color,
        ))
        .map_err(chart_error)?
        .label("weekly change")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], change_color));

    chart
        .draw_series(LineSeries::new(
            indexed(&signals.weekly_change_mean7),
            &change_mean_color,
        ))
        .map_err(chart_error)?
        .label("7 day mean of change")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], change_mean_color));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(chart_error)?;

    root.present().map_err(chart_error)?;
    Ok(())
}

fn indexed(values: &[i64]) -> impl Iterator<Item = (i64, i64)> + '_ {
    values.iter().enumerate().map(|(i, &v)| (i as i64, v))
}

fn value_bounds(signals: &DerivedSignals) -> (i64, i64) {
    let mut min_v = i64::MAX;
    let mut max_v = i64::MIN;
    for series in [
        &signals.daily_new,
        &signals.daily_new_mean7,
        &signals.weekly_change,
        &signals.weekly_change_mean7,
    ] {
        for &v in series.iter() {
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }
    }
    if min_v > max_v {
        return (0, 1);
    }
    let pad = ((max_v - min_v) / 20).max(1);
    (min_v - pad, max_v + pad)
}

fn date_label(dates: &[NaiveDate], idx: i64) -> String {
    usize::try_from(idx)
        .ok()
        .and_then(|i| dates.get(i))
        .map(|d| d.format("%d.%m.").to_string())
        .unwrap_or_default()
}

fn chart_error(err: impl std::fmt::Display) -> PipelineError {
    PipelineError::io("render svg chart", std::io::Error::other(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DailyObservation, DailySeries};

    fn series_10() -> DailySeries {
        let mut series = DailySeries::new();
        let mut cases = 100;
        for day in 1..=10 {
            cases += day as u64 * 3;
            series
                .push(DailyObservation {
                    date: NaiveDate::from_ymd_opt(2020, 4, day).unwrap(),
                    cases,
                    deaths: day as u64,
                })
                .unwrap();
        }
        series
    }

    #[test]
    fn writes_an_svg_with_all_series_labelled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals.svg");

        let series = series_10();
        let signals = DerivedSignals::compute(&series);
        write_signal_chart(&path, &series.dates(), &signals).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("SARS-CoV-2 Infektionen Deutschland"));
        assert!(svg.contains("new infections / day"));
        assert!(svg.contains("7 day mean of change"));
    }

    #[test]
    fn refuses_a_single_day_of_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals.svg");

        let mut series = DailySeries::new();
        series
            .push(DailyObservation {
                date: NaiveDate::from_ymd_opt(2020, 4, 1).unwrap(),
                cases: 1,
                deaths: 0,
            })
            .unwrap();
        let signals = DerivedSignals::compute(&series);

        let err = write_signal_chart(&path, &series.dates(), &signals).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
