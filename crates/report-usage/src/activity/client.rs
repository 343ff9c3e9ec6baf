//! Power BI admin activity-events client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::models::{ActivityEventsPage, ActivityRecord, ApiError};
use super::window::TimeWindow;
use crate::auth::AccessToken;
use crate::config::{ReportConfig, DEFAULT_MAX_PAGES};
use crate::error::FetchError;
use crate::retry::RetryPolicy;

/// Counters for one paginated fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Requests that returned a page.
    pub pages: usize,
    /// Events across all pages.
    pub events: usize,
}

/// A page failure plus the server's `Retry-After` hint, if any.
struct PageFailure {
    error: FetchError,
    retry_after: Option<String>,
}

impl From<FetchError> for PageFailure {
    fn from(error: FetchError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

impl From<reqwest::Error> for PageFailure {
    fn from(error: reqwest::Error) -> Self {
        FetchError::Transport(error).into()
    }
}

/// Pages through the activity log for a time window.
#[derive(Debug, Clone)]
pub struct ActivityLogClient {
    client: Client,
    endpoint: String,
    max_pages: usize,
    retry: RetryPolicy,
}

impl ActivityLogClient {
    /// Create a client for the activity-events `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("report-usage/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            max_pages: DEFAULT_MAX_PAGES,
            retry: RetryPolicy::default(),
        })
    }

    /// Create a client from run settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ReportConfig) -> Result<Self, FetchError> {
        Ok(Self::new(config.activity_events_url(), config.request_timeout)?
            .with_max_pages(config.max_pages)
            .with_retry(config.retry))
    }

    /// Fail with [`FetchError::TooManyPages`] after `max_pages` pages.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch every event in `window`, in page order then server order.
    ///
    /// Any failure discards the pages fetched so far; use
    /// [`for_each_page`](Self::for_each_page) to keep them.
    ///
    /// # Errors
    ///
    /// See [`for_each_page`](Self::for_each_page).
    pub async fn fetch(
        &self,
        token: &AccessToken,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<ActivityRecord>, FetchError> {
        let mut records = Vec::new();
        self.for_each_page(token, window, cancel, |page| records.extend(page))
            .await?;
        Ok(records)
    }

    /// Follow continuation links until the server stops sending them,
    /// handing each page's events to `on_page` as it arrives.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Unauthorized`] on 401/403 or an already-expired token
    /// - [`FetchError::HttpStatus`] on other non-success statuses once
    ///   retries are exhausted
    /// - [`FetchError::MalformedResponse`] when a body has no event list
    /// - [`FetchError::Transport`] on network failures once retries are
    ///   exhausted
    /// - [`FetchError::TooManyPages`] past the page cap
    /// - [`FetchError::Cancelled`] when `cancel` fires; an in-flight request
    ///   is dropped
    #[instrument(skip(self, token, cancel, on_page), fields(window = %window))]
    pub async fn for_each_page<F>(
        &self,
        token: &AccessToken,
        window: &TimeWindow,
        cancel: &CancellationToken,
        mut on_page: F,
    ) -> Result<FetchStats, FetchError>
    where
        F: FnMut(Vec<ActivityRecord>),
    {
        if token.is_expired(chrono::Duration::zero()) {
            return Err(FetchError::Unauthorized {
                status: StatusCode::UNAUTHORIZED.as_u16(),
            });
        }

        let mut stats = FetchStats::default();
        let mut next = Some(self.first_page_url(window)?);

        while let Some(url) = next.take() {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            if stats.pages >= self.max_pages {
                return Err(FetchError::TooManyPages {
                    cap: self.max_pages,
                });
            }

            let page = self.get_page_with_retry(&url, token, cancel).await?;
            let continuation = page.next_link().map(str::to_owned);
            let records = page.activity_event_entities.unwrap_or_default();

            stats.pages += 1;
            stats.events += records.len();
            debug!(
                page = stats.pages,
                events = records.len(),
                more = continuation.is_some(),
                "Fetched activity page"
            );

            on_page(records);

            next = continuation
                .map(|uri| {
                    Url::parse(&uri).map_err(|e| {
                        FetchError::MalformedResponse(format!("invalid continuationUri: {e}"))
                    })
                })
                .transpose()?;
        }

        info!(
            pages = stats.pages,
            events = stats.events,
            "Activity log retrieval complete"
        );
        Ok(stats)
    }

    fn first_page_url(&self, window: &TimeWindow) -> Result<Url, FetchError> {
        Url::parse_with_params(&self.endpoint, window.query_params())
            .map_err(|e| FetchError::MalformedResponse(format!("invalid endpoint: {e}")))
    }

    async fn get_page_with_retry(
        &self,
        url: &Url,
        token: &AccessToken,
        cancel: &CancellationToken,
    ) -> Result<ActivityEventsPage, FetchError> {
        let mut attempt = 0u32;

        loop {
            let result = tokio::select! {
                () = cancel.cancelled() => return Err(FetchError::Cancelled),
                result = self.get_page(url, token) => result,
            };
            let failure = match result {
                Ok(page) => return Ok(page),
                Err(failure) => failure,
            };

            if !failure.error.is_retryable() || attempt >= self.retry.max_retries {
                return Err(failure.error);
            }

            attempt += 1;
            let delay = match &failure.error {
                FetchError::HttpStatus { status: 429, .. } => self
                    .retry
                    .throttle_delay(attempt, failure.retry_after.as_deref()),
                _ => self.retry.backoff(attempt),
            };
            warn!(
                error = %failure.error,
                attempt,
                max_retries = self.retry.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Retrying activity page request"
            );

            tokio::select! {
                () = cancel.cancelled() => return Err(FetchError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn get_page(
        &self,
        url: &Url,
        token: &AccessToken,
    ) -> Result<ActivityEventsPage, PageFailure> {
        debug!(url = %url, "Requesting activity page");

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(token.bearer())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized {
                status: status.as_u16(),
            }
            .into());
        }

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = response.text().await.unwrap_or_default();
            return Err(PageFailure {
                error: FetchError::HttpStatus {
                    status: status.as_u16(),
                    message: Self::error_message(&body),
                },
                retry_after,
            });
        }

        let body = response.text().await?;
        let page: ActivityEventsPage = serde_json::from_str(&body)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        if page.activity_event_entities.is_none() {
            return Err(FetchError::MalformedResponse(
                "missing activityEventEntities".to_string(),
            )
            .into());
        }

        Ok(page)
    }

    fn error_message(body: &str) -> String {
        match serde_json::from_str::<ApiError>(body) {
            Ok(err) => match err.error.message {
                Some(message) => format!("{}: {message}", err.error.code),
                None => err.error.code,
            },
            Err(_) => body.chars().take(200).collect(),
        }
    }
}
