#![allow(clippy::doc_markdown)] // Allow brand names like PowerBI without backticks

//! Report usage ranking from the Power BI admin activity log.
//!
//! A run authenticates as a service principal, pages through the
//! activity-events API for a trailing window, counts one activity type per
//! report and writes the ranking as CSV.
//!
//! ## Pipeline
//!
//! 1. [`auth`] - client-credentials token from the identity platform
//! 2. [`activity`] - follow `continuationUri` links until exhausted
//! 3. [`aggregate`] - filter, group by `(workspace, report name, report id)`,
//!    count and rank
//! 4. [`sink`] - top-N console table and atomic CSV write
//!
//! [`pipeline::run`] wires these together.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use report_usage::auth::ClientCredentialsProvider;
//! use report_usage::config::{ClientCredentials, ReportConfig};
//! use report_usage::pipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ReportConfig::default();
//! let provider = ClientCredentialsProvider::new(
//!     ClientCredentials::new(tenant_id, client_id, client_secret),
//!     &config.authority_url,
//!     config.request_timeout,
//! )?;
//!
//! let window = pipeline::trailing_window(&config, chrono::Utc::now())?;
//! let summary = pipeline::run(
//!     &config,
//!     &provider,
//!     window,
//!     &CancellationToken::new(),
//!     &mut std::io::stdout(),
//! )
//! .await?;
//!
//! println!("{} reports written to {}", summary.aggregation.rows.len(), summary.output.display());
//! ```

pub mod activity;
pub mod aggregate;
pub mod auth;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod sink;

pub use activity::{ActivityEvent, ActivityLogClient, ActivityRecord, FetchStats, TimeWindow};
pub use aggregate::{aggregate, aggregate_events, AggregatedUsageRow, Aggregation, SkippedEvents};
pub use auth::{AccessToken, ClientCredentialsProvider, CredentialProvider};
pub use config::{ClientCredentials, ReportConfig};
pub use error::{AuthError, FetchError, ReportError, SinkError, WindowError};
pub use pipeline::RunSummary;
pub use retry::RetryPolicy;
