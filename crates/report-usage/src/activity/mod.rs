//! Power BI admin activity log retrieval.
//!
//! The activity-events endpoint returns events for a time window one page
//! at a time. Each page may carry a `continuationUri`; the next request goes
//! to that URL verbatim, and retrieval ends on the first page without one.
//!
//! ## Example
//!
//! ```rust,ignore
//! use report_usage::activity::{ActivityLogClient, TimeWindow};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = ActivityLogClient::from_config(&config)?;
//! let window = TimeWindow::trailing(1, chrono::Utc::now())?;
//! let records = client.fetch(&token, &window, &CancellationToken::new()).await?;
//! ```

mod client;
mod models;
mod window;

pub use client::{ActivityLogClient, FetchStats};
pub use models::{ActivityEvent, ActivityEventsPage, ActivityRecord, ApiError, ApiErrorBody};
pub use window::{TimeWindow, RETENTION_DAYS};
