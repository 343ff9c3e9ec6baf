//! End-to-end report run: token, fetch, aggregate, write.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::activity::{ActivityLogClient, ActivityRecord, FetchStats, TimeWindow};
use crate::aggregate::{aggregate, Aggregation};
use crate::auth::CredentialProvider;
use crate::config::ReportConfig;
use crate::error::{FetchError, ReportError, SinkError};
use crate::sink::{print_summary, write_csv};

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub window: TimeWindow,
    pub fetch: FetchStats,
    pub aggregation: Aggregation,
    pub output: PathBuf,
}

/// The trailing window configured in `config`, ending at `now`.
///
/// # Errors
///
/// Returns an error when the configured window size is zero.
pub fn trailing_window(config: &ReportConfig, now: DateTime<Utc>) -> Result<TimeWindow, ReportError> {
    let window = TimeWindow::trailing(config.window_days, now)?;
    if window.exceeds_retention(now) {
        warn!(
            window = %window,
            "Window starts beyond the activity log retention horizon; results will be incomplete"
        );
    }
    Ok(window)
}

/// Run one report over `window`.
///
/// The console summary goes to `out`; the full ranking is written to
/// `config.output`. Any stage failure aborts the run and nothing is written.
///
/// # Errors
///
/// Returns a [`ReportError`] tagged with the failing stage.
#[instrument(skip_all, fields(window = %window, activity = %config.activity))]
pub async fn run<P, W>(
    config: &ReportConfig,
    credentials: &P,
    window: TimeWindow,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<RunSummary, ReportError>
where
    P: CredentialProvider + ?Sized,
    W: Write,
{
    config.validate()?;

    let token = credentials.acquire_token().await?;
    info!("Acquired access token");

    let client = ActivityLogClient::from_config(config)?;
    let slices = if config.split_by_day {
        window.daily_slices()
    } else {
        vec![window]
    };

    let fetch = async {
        let mut records: Vec<ActivityRecord> = Vec::new();
        let mut stats = FetchStats::default();
        for slice in &slices {
            let slice_stats = client
                .for_each_page(&token, slice, cancel, |page| records.extend(page))
                .await?;
            stats.pages += slice_stats.pages;
            stats.events += slice_stats.events;
        }
        Ok::<_, FetchError>((records, stats))
    };

    let (records, stats) = tokio::time::timeout(config.deadline, fetch)
        .await
        .map_err(|_| FetchError::DeadlineExceeded)??;

    let aggregation = aggregate(&records, &config.activity);
    info!(
        events = stats.events,
        matched = aggregation.matched,
        rows = aggregation.rows.len(),
        skipped = aggregation.skipped.total,
        "Aggregation complete"
    );

    let title = format!(
        "Top {} reports by {} ({window})",
        config.top, config.activity
    );
    print_summary(out, &title, &aggregation.rows, config.top).map_err(|source| {
        SinkError::Io {
            path: "console".to_string(),
            source,
        }
    })?;

    write_csv(&config.output, &aggregation.rows)?;

    Ok(RunSummary {
        window,
        fetch: stats,
        aggregation,
        output: config.output.clone(),
    })
}
