//! Activity log wire models.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// One page of the admin activity-events API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEventsPage {
    /// Events on this page. Absent means the body is not an events page.
    pub activity_event_entities: Option<Vec<ActivityRecord>>,
    /// Absolute URL of the next page.
    #[serde(default)]
    pub continuation_uri: Option<String>,
    /// Opaque cursor embedded in `continuation_uri`.
    #[serde(default)]
    pub continuation_token: Option<String>,
    /// Informational only; `continuation_uri` decides termination.
    #[serde(default)]
    pub last_result_set: Option<bool>,
}

impl ActivityEventsPage {
    /// The next page URL, ignoring blank values.
    #[must_use]
    pub fn next_link(&self) -> Option<&str> {
        self.continuation_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }
}

/// An activity event exactly as received.
///
/// Records stay untyped until aggregation so that one malformed event can be
/// skipped and counted instead of failing a whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityRecord(serde_json::Value);

impl ActivityRecord {
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Activity tag, if present and a string.
    #[must_use]
    pub fn activity(&self) -> Option<&str> {
        ["Activity", "activityType"]
            .iter()
            .find_map(|key| self.0.get(*key))
            .and_then(serde_json::Value::as_str)
    }

    /// Decode into a typed event.
    ///
    /// # Errors
    ///
    /// Fails when the record is not an object or a known field has the
    /// wrong type.
    pub fn decode(&self) -> Result<ActivityEvent, serde_json::Error> {
        ActivityEvent::deserialize(&self.0)
    }
}

impl From<serde_json::Value> for ActivityRecord {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// A decoded activity event. Every field may be absent upstream.
///
/// Only the activity tag and the report key fields are strict. The
/// descriptive fields fall back to `None` when their value has an
/// unexpected shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    #[serde(rename = "Id", alias = "id", default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(
        rename = "CreationTime",
        alias = "creationTime",
        default,
        deserialize_with = "lenient"
    )]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(rename = "UserId", alias = "userId", default, deserialize_with = "lenient")]
    pub user_id: Option<String>,
    /// Activity tag such as `ViewReport` or `ExportReport`.
    #[serde(rename = "Activity", alias = "activityType", default)]
    pub activity: Option<String>,
    #[serde(rename = "ReportId", alias = "reportId", default)]
    pub report_id: Option<String>,
    #[serde(rename = "ReportName", alias = "reportName", default)]
    pub report_name: Option<String>,
    #[serde(
        rename = "WorkSpaceName",
        alias = "WorkspaceName",
        alias = "workspaceName",
        default
    )]
    pub workspace_name: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Error body returned by the Power BI REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_parsing() {
        let body = json!({
            "activityEventEntities": [{"Activity": "ViewReport"}],
            "continuationUri": "https://api.powerbi.com/v1.0/myorg/admin/activityevents?continuationToken='abc'",
            "continuationToken": "abc",
            "lastResultSet": false
        });
        let page: ActivityEventsPage = serde_json::from_value(body).unwrap();
        assert_eq!(page.activity_event_entities.as_ref().map(Vec::len), Some(1));
        assert!(page.next_link().unwrap().ends_with("continuationToken='abc'"));
        assert_eq!(page.last_result_set, Some(false));
    }

    #[test]
    fn test_page_without_entities_is_detectable() {
        let page: ActivityEventsPage =
            serde_json::from_value(json!({"value": []})).unwrap();
        assert!(page.activity_event_entities.is_none());
    }

    #[test]
    fn test_blank_continuation_is_none() {
        let page: ActivityEventsPage = serde_json::from_value(json!({
            "activityEventEntities": [],
            "continuationUri": "  ",
        }))
        .unwrap();
        assert!(page.next_link().is_none());

        let page: ActivityEventsPage = serde_json::from_value(json!({
            "activityEventEntities": [],
            "continuationUri": null,
            "lastResultSet": true
        }))
        .unwrap();
        assert!(page.next_link().is_none());
    }

    #[test]
    fn test_decode_upstream_field_names() {
        let record = ActivityRecord::new(json!({
            "Id": "8c7c1a0e",
            "CreationTime": "2024-01-03T10:15:00Z",
            "UserId": "someone@contoso.com",
            "Activity": "ViewReport",
            "ReportId": "r1",
            "ReportName": "Exec Overview",
            "WorkSpaceName": "Sales",
            "DistributionMethod": "Workspace"
        }));
        let event = record.decode().unwrap();
        assert_eq!(event.activity.as_deref(), Some("ViewReport"));
        assert_eq!(event.report_id.as_deref(), Some("r1"));
        assert_eq!(event.workspace_name.as_deref(), Some("Sales"));
        assert!(event.creation_time.is_some());
        assert_eq!(record.activity(), Some("ViewReport"));
    }

    #[test]
    fn test_decode_camel_case_aliases() {
        let record = ActivityRecord::new(json!({
            "activityType": "ViewReport",
            "reportId": "r2",
            "reportName": "P&L",
            "workspaceName": "Finance"
        }));
        let event = record.decode().unwrap();
        assert_eq!(event.report_name.as_deref(), Some("P&L"));
        assert_eq!(event.workspace_name.as_deref(), Some("Finance"));
        assert_eq!(record.activity(), Some("ViewReport"));
    }

    #[test]
    fn test_decode_missing_fields_are_none() {
        let event = ActivityRecord::new(json!({"Activity": "ViewReport"}))
            .decode()
            .unwrap();
        assert!(event.report_id.is_none());
        assert!(event.report_name.is_none());
    }

    #[test]
    fn test_decode_tolerates_odd_descriptive_fields() {
        let event = ActivityRecord::new(json!({
            "Id": 12345,
            "CreationTime": "2024-01-03T10:15:00",
            "UserId": {"upn": "someone@contoso.com"},
            "Activity": "ViewReport",
            "ReportId": "r3",
            "ReportName": "KPI",
            "WorkSpaceName": "Ops"
        }))
        .decode()
        .unwrap();

        assert!(event.id.is_none());
        assert!(event.creation_time.is_none());
        assert!(event.user_id.is_none());
        assert_eq!(event.report_id.as_deref(), Some("r3"));
    }

    #[test]
    fn test_decode_wrong_type_fails() {
        assert!(ActivityRecord::new(json!({"Activity": "ViewReport", "ReportName": 42}))
            .decode()
            .is_err());
        assert!(ActivityRecord::new(json!("ViewReport")).decode().is_err());
    }
}
