//! Shared fixtures for report-usage integration tests.

#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use report_usage::{AccessToken, TimeWindow};
use serde_json::{json, Value};

pub const API_PATH: &str = "/v1.0/myorg/admin/activityevents";

/// Activity event in the upstream field layout.
pub fn event(activity: &str, workspace: &str, report: &str, report_id: &str) -> Value {
    json!({
        "Id": format!("{activity}-{report_id}"),
        "CreationTime": "2024-01-03T10:15:00Z",
        "UserId": "someone@contoso.com",
        "Activity": activity,
        "WorkSpaceName": workspace,
        "ReportName": report,
        "ReportId": report_id,
    })
}

pub fn view(workspace: &str, report: &str, report_id: &str) -> Value {
    event("ViewReport", workspace, report, report_id)
}

/// Activity-events page body.
pub fn page(events: Vec<Value>, continuation_uri: Option<&str>) -> Value {
    json!({
        "activityEventEntities": events,
        "continuationUri": continuation_uri,
        "continuationToken": continuation_uri.map(|_| "token"),
        "lastResultSet": continuation_uri.is_none(),
    })
}

/// Continuation link for `token` on the mock server.
pub fn continuation(server_uri: &str, token: &str) -> String {
    format!("{server_uri}{API_PATH}?continuationToken={token}")
}

pub fn endpoint(server_uri: &str) -> String {
    format!("{server_uri}{API_PATH}")
}

pub fn token() -> AccessToken {
    AccessToken::new("test-token", Utc::now() + Duration::hours(1))
}

/// `[2024-01-01T00:00:00Z, 2024-01-08T00:00:00Z]`
pub fn week_window() -> TimeWindow {
    TimeWindow::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
    )
    .unwrap()
}
