//! report-usage - rank Power BI reports by activity over a trailing window.
//!
//! # Environment Variables
//!
//! - `AZURE_TENANT_ID` - directory (tenant) id (required)
//! - `AZURE_CLIENT_ID` - service principal application id (required)
//! - `AZURE_CLIENT_SECRET` - service principal secret (required)
//! - `USAGE_WINDOW_DAYS` - trailing window size in days (default 7)
//! - `USAGE_OUTPUT` - CSV destination (default `report_usage.csv`)
//! - `USAGE_ACTIVITY` - activity type to count (default `ViewReport`)
//! - `POWERBI_SCOPE` - token scope, for sovereign clouds (default public cloud)
//!
//! # Examples
//!
//! ```bash
//! # Last 7 days of report views
//! report-usage
//!
//! # Last 30 days of exports, one UTC day per request
//! report-usage --days 30 --activity ExportReport --split-by-day --output exports.csv
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use report_usage::config::{
    ClientCredentials, ReportConfig, DEFAULT_ACTIVITY, DEFAULT_API_BASE_URL,
    DEFAULT_AUTHORITY_URL, DEFAULT_DEADLINE_SECS, DEFAULT_MAX_PAGES, DEFAULT_OUTPUT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TOP, DEFAULT_WINDOW_DAYS,
};
use report_usage::auth::POWERBI_SCOPE;
use report_usage::{pipeline, ClientCredentialsProvider, RetryPolicy, RunSummary};

/// Rank Power BI reports by activity from the admin activity log.
#[derive(Parser)]
#[command(name = "report-usage")]
#[command(about = "Rank Power BI reports by activity over a trailing window")]
#[command(version)]
struct Cli {
    /// Directory (tenant) id
    #[arg(long, env = "AZURE_TENANT_ID")]
    tenant_id: String,

    /// Service principal application (client) id
    #[arg(long, env = "AZURE_CLIENT_ID")]
    client_id: String,

    /// Service principal secret
    #[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Trailing window size in days (the log keeps 30)
    #[arg(long, env = "USAGE_WINDOW_DAYS", default_value_t = DEFAULT_WINDOW_DAYS)]
    days: u32,

    /// CSV destination
    #[arg(long, env = "USAGE_OUTPUT", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Activity type to count (exact match)
    #[arg(long, env = "USAGE_ACTIVITY", default_value = DEFAULT_ACTIVITY)]
    activity: String,

    /// Rows shown on the console
    #[arg(long, default_value_t = DEFAULT_TOP)]
    top: usize,

    /// Give up after this many continuation pages
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    max_pages: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    /// Deadline for the whole fetch in seconds
    #[arg(long, default_value_t = DEFAULT_DEADLINE_SECS)]
    deadline_secs: u64,

    /// Retries for transient page failures (5xx, 429, network)
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Fetch one UTC day per request window
    #[arg(long)]
    split_by_day: bool,

    /// Identity platform base URL
    #[arg(long, default_value = DEFAULT_AUTHORITY_URL)]
    authority_url: String,

    /// Power BI REST API base URL
    #[arg(long, default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// OAuth2 scope for the Power BI API (differs in sovereign clouds)
    #[arg(long, env = "POWERBI_SCOPE", default_value = POWERBI_SCOPE)]
    scope: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn split(self) -> (ClientCredentials, ReportConfig) {
        let credentials = ClientCredentials::new(self.tenant_id, self.client_id, self.client_secret);
        let config = ReportConfig {
            activity: self.activity,
            window_days: self.days,
            output: self.output,
            top: self.top,
            max_pages: self.max_pages,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            deadline: Duration::from_secs(self.deadline_secs),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            },
            split_by_day: self.split_by_day,
            authority_url: self.authority_url,
            api_base_url: self.api_base_url,
            scope: self.scope,
        };
        (credentials, config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match execute(cli).await {
        Ok(summary) => {
            println!(
                "\n{} rows written to {} ({} events, {} pages)",
                summary.aggregation.rows.len(),
                summary.output.display(),
                summary.fetch.events,
                summary.fetch.pages
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("report-usage: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("report_usage=debug,info")
        } else {
            EnvFilter::new("report_usage=info,warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn execute(cli: Cli) -> Result<RunSummary> {
    let (credentials, config) = cli.split();
    credentials.validate()?;
    config.validate()?;

    let provider = ClientCredentialsProvider::new(
        credentials,
        &config.authority_url,
        config.request_timeout,
    )
    .map_err(report_usage::ReportError::from)?
    .with_scope(config.scope.clone());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling fetch (press Ctrl-C again to exit now)");
            on_interrupt.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        }
    });

    let window = pipeline::trailing_window(&config, chrono::Utc::now())?;
    tracing::info!(
        window = %window,
        activity = %config.activity,
        output = %config.output.display(),
        split_by_day = config.split_by_day,
        "Starting usage report"
    );

    let summary = pipeline::run(
        &config,
        &provider,
        window,
        &cancel,
        &mut std::io::stdout().lock(),
    )
    .await?;

    Ok(summary)
}
