//! Run configuration.
//!
//! Everything a run needs is carried in explicit structs built once at
//! process start (see `main.rs`) and passed by reference. Credentials are
//! kept apart from the rest so that [`ReportConfig`] can be logged freely.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::auth::POWERBI_SCOPE;
use crate::error::ReportError;
use crate::retry::RetryPolicy;

/// Microsoft identity platform login endpoint (public cloud).
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";

/// Power BI REST API base (public cloud).
pub const DEFAULT_API_BASE_URL: &str = "https://api.powerbi.com/v1.0/myorg";

/// Activity type counted by default.
pub const DEFAULT_ACTIVITY: &str = "ViewReport";

/// Default output file, relative to the working directory.
pub const DEFAULT_OUTPUT: &str = "report_usage.csv";

pub const DEFAULT_WINDOW_DAYS: u32 = 7;
pub const DEFAULT_TOP: usize = 10;
pub const DEFAULT_MAX_PAGES: usize = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DEADLINE_SECS: u64 = 900;

/// Service principal credentials for the client-credentials grant.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    /// Directory (tenant) identifier.
    pub tenant_id: String,
    /// Application (client) identifier.
    pub client_id: String,
    /// Client secret. Redacted in `Debug` output.
    pub client_secret: SecretString,
}

impl ClientCredentials {
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    /// Reject blank identifiers before any network call is made.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Config`] naming the first blank field.
    pub fn validate(&self) -> Result<(), ReportError> {
        use secrecy::ExposeSecret;

        if self.tenant_id.trim().is_empty() {
            return Err(ReportError::Config("tenant id is required".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(ReportError::Config("client id is required".to_string()));
        }
        if self.client_secret.expose_secret().is_empty() {
            return Err(ReportError::Config("client secret is required".to_string()));
        }
        Ok(())
    }
}

/// Settings for one report run.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Activity type to count (exact, case-sensitive).
    pub activity: String,
    /// Size of the trailing window in days.
    pub window_days: u32,
    /// Destination of the ranked CSV.
    pub output: PathBuf,
    /// Rows printed to the console.
    pub top: usize,
    /// Safety cap on continuation pages per window.
    pub max_pages: usize,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// Deadline for the whole fetch stage.
    pub deadline: Duration,
    /// Retry policy for transient page failures.
    pub retry: RetryPolicy,
    /// Fetch one UTC day at a time.
    pub split_by_day: bool,
    /// Identity platform base URL.
    pub authority_url: String,
    /// Power BI REST API base URL.
    pub api_base_url: String,
    /// OAuth2 scope requested for the API. Sovereign clouds use their own
    /// resource.
    pub scope: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            activity: DEFAULT_ACTIVITY.to_string(),
            window_days: DEFAULT_WINDOW_DAYS,
            output: PathBuf::from(DEFAULT_OUTPUT),
            top: DEFAULT_TOP,
            max_pages: DEFAULT_MAX_PAGES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            retry: RetryPolicy::default(),
            split_by_day: false,
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            scope: POWERBI_SCOPE.to_string(),
        }
    }
}

impl ReportConfig {
    /// Check the settings for values that cannot produce a useful run.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Config`] describing the offending setting.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.activity.is_empty() {
            return Err(ReportError::Config("activity must not be empty".to_string()));
        }
        if self.window_days == 0 {
            return Err(ReportError::Config(
                "window must be at least one day".to_string(),
            ));
        }
        if self.top == 0 {
            return Err(ReportError::Config("top must be at least 1".to_string()));
        }
        if self.max_pages == 0 {
            return Err(ReportError::Config(
                "max pages must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ReportError::Config(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.deadline.is_zero() {
            return Err(ReportError::Config(
                "deadline must be greater than zero".to_string(),
            ));
        }
        if self.scope.trim().is_empty() {
            return Err(ReportError::Config("scope must not be empty".to_string()));
        }
        url::Url::parse(&self.authority_url)
            .map_err(|e| ReportError::Config(format!("invalid authority url: {e}")))?;
        url::Url::parse(&self.api_base_url)
            .map_err(|e| ReportError::Config(format!("invalid api base url: {e}")))?;
        Ok(())
    }

    /// Endpoint of the admin activity-events API.
    #[must_use]
    pub fn activity_events_url(&self) -> String {
        format!(
            "{}/admin/activityevents",
            self.api_base_url.trim_end_matches('/')
        )
    }
}
