//! Shared run pipeline used by the CLI front-end.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! landing page -> workbook download -> series ingest -> bulletin patch ->
//! feed extension -> derived signals
//!
//! The CLI then focuses on presentation (printing vs files).

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::data::feature::FeatureClient;
use crate::data::{self, aggregates, bulletin, fetch, workbook};
use crate::domain::{AggregateEvidence, DailySeries, RunConfig};
use crate::error::PipelineError;
use crate::io::ingest;
use crate::reconcile::{apply_latest_entry, extend_from_aggregates};
use crate::report::SourceSummary;
use crate::signal::DerivedSignals;

/// All computed outputs of a single `epi run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub series: DailySeries,
    pub signals: DerivedSignals,
    /// The feed totals, when the feed was consulted.
    pub evidence: Option<AggregateEvidence>,
    pub sources: SourceSummary,
}

/// Execute the full pipeline and return the computed outputs.
pub fn run_pipeline(config: &RunConfig) -> Result<RunOutput, PipelineError> {
    let client = fetch::http_client(&config.user_agent)?;

    // 1) Resolve the volatile workbook link from the landing page.
    let landing = fetch::fetch_bytes(&client, data::WORKBOOK_LANDING_URI)?;
    let link = bulletin::find_download_link(
        &String::from_utf8_lossy(&landing),
        data::WORKBOOK_LANDING_URI,
    )?;

    // 2) Download the workbook unless the cache is already current.
    let cache_path = config.cache_dir.join(fetch::cache_file_name(link.as_str())?);
    let embedded = embedded_as_of_or_discard(&cache_path);
    let document = fetch::fetch_with_freshness(&client, link.as_str(), &cache_path, embedded)?;

    // 3) Ingest the cumulative series.
    let rows = workbook::daily_rows(&document.path)?;
    let mut series = ingest::load_series(&rows)?;
    info!(
        "workbook series: {} days up to {:?}",
        series.len(),
        series.last().map(|o| o.date)
    );

    // 4) The bulletin page may already publish the next day.
    let bulletin_applied = if config.use_bulletin {
        let html = fetch::fetch_bytes(&client, data::BULLETIN_URI)?;
        let entry = bulletin::parse_latest_entry(&String::from_utf8_lossy(&html))?;
        let applied = apply_latest_entry(&mut series, &entry)?;
        if applied {
            info!("bulletin page supplied {}", entry.date);
        }
        Some(applied)
    } else {
        None
    };

    // 5) The live feed may be ahead of both.
    let mut evidence = None;
    let feed_days_appended = if config.use_feed {
        let feature_client = FeatureClient::new(&config.user_agent)?;
        let totals = aggregates::fetch_evidence(&feature_client)?;
        let appended = extend_from_aggregates(&mut series, &totals)?;
        if appended > 0 {
            info!("feed aggregates supplied {appended} more day(s)");
        }
        evidence = Some(totals);
        Some(appended)
    } else {
        None
    };

    // 6) Derived signals over the final series.
    let signals = DerivedSignals::compute(&series);

    Ok(RunOutput {
        series,
        signals,
        evidence,
        sources: SourceSummary {
            workbook_path: document.path,
            workbook_refreshed: document.refreshed,
            bulletin_applied,
            feed_days_appended,
        },
    })
}

/// Read the as-of timestamp from the cached workbook, discarding the cache
/// when it cannot be parsed.
fn embedded_as_of_or_discard(cache_path: &Path) -> Option<DateTime<Utc>> {
    if !cache_path.exists() {
        return None;
    }
    match workbook::embedded_as_of(cache_path) {
        Ok(as_of) => as_of,
        Err(err) => {
            warn!(
                "cached workbook {} is unreadable ({err}), discarding it",
                cache_path.display()
            );
            if let Err(e) = fs::remove_file(cache_path) {
                warn!("could not remove {}: {e}", cache_path.display());
            }
            None
        }
    }
}
