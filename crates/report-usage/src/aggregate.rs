//! Per-report usage counts.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::activity::{ActivityEvent, ActivityRecord};

/// One ranked row: how often a report was hit in the window.
///
/// Serialized field names are the CSV header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregatedUsageRow {
    #[serde(rename = "WorkspaceName")]
    pub workspace_name: String,
    #[serde(rename = "ReportName")]
    pub report_name: String,
    #[serde(rename = "ReportId")]
    pub report_id: String,
    #[serde(rename = "ViewCount")]
    pub view_count: u64,
}

/// Records left out of the aggregation because they could not be decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkippedEvents {
    pub total: usize,
    /// Count per decode failure message.
    pub by_reason: BTreeMap<String, usize>,
}

impl SkippedEvents {
    fn record(&mut self, reason: String) {
        self.total += 1;
        *self.by_reason.entry(reason).or_default() += 1;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Result of aggregating a batch of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// Rows ranked by `view_count` descending, then workspace, report name
    /// and report id ascending.
    pub rows: Vec<AggregatedUsageRow>,
    /// Events that matched the activity filter.
    pub matched: usize,
    pub skipped: SkippedEvents,
}

impl Aggregation {
    /// The first `n` rows of the ranking.
    #[must_use]
    pub fn top(&self, n: usize) -> &[AggregatedUsageRow] {
        &self.rows[..n.min(self.rows.len())]
    }
}

type GroupKey = (String, String, String);

/// Count `activity_filter` events per `(workspace, report name, report id)`.
///
/// The filter is an exact, case-sensitive match on the activity tag. Events
/// missing a key field are grouped under an empty string for it. Records
/// that are not objects, and matching records whose key fields have the
/// wrong type, are skipped and reported in [`Aggregation::skipped`].
/// Records of other activities are never decoded.
#[must_use]
pub fn aggregate(records: &[ActivityRecord], activity_filter: &str) -> Aggregation {
    let mut skipped = SkippedEvents::default();
    let events = records.iter().filter_map(|record| {
        if !record.as_value().is_object() {
            skipped.record("record is not a JSON object".to_string());
            return None;
        }
        if record.activity() != Some(activity_filter) {
            return None;
        }
        match record.decode() {
            Ok(event) => Some(event),
            Err(e) => {
                skipped.record(e.to_string());
                None
            }
        }
    });

    let mut aggregation = aggregate_events(events, activity_filter);

    if !skipped.is_empty() {
        warn!(
            skipped = skipped.total,
            reasons = ?skipped.by_reason,
            "Skipped malformed activity events"
        );
    }
    aggregation.skipped = skipped;
    aggregation
}

/// [`aggregate`] over already-decoded events.
#[must_use]
pub fn aggregate_events<I>(events: I, activity_filter: &str) -> Aggregation
where
    I: IntoIterator<Item = ActivityEvent>,
{
    let mut counts: HashMap<GroupKey, u64> = HashMap::new();
    let mut matched = 0;

    for event in events {
        if event.activity.as_deref() != Some(activity_filter) {
            continue;
        }
        matched += 1;

        let key = (
            event.workspace_name.unwrap_or_default(),
            event.report_name.unwrap_or_default(),
            event.report_id.unwrap_or_default(),
        );
        *counts.entry(key).or_default() += 1;
    }

    let mut rows: Vec<AggregatedUsageRow> = counts
        .into_iter()
        .map(
            |((workspace_name, report_name, report_id), view_count)| AggregatedUsageRow {
                workspace_name,
                report_name,
                report_id,
                view_count,
            },
        )
        .collect();

    rows.sort_by(|a, b| {
        b.view_count
            .cmp(&a.view_count)
            .then_with(|| a.workspace_name.cmp(&b.workspace_name))
            .then_with(|| a.report_name.cmp(&b.report_name))
            .then_with(|| a.report_id.cmp(&b.report_id))
    });

    debug!(
        matched,
        rows = rows.len(),
        activity = activity_filter,
        "Aggregated activity events"
    );

    Aggregation {
        rows,
        matched,
        skipped: SkippedEvents::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view(workspace: &str, name: &str, id: &str) -> ActivityRecord {
        ActivityRecord::new(json!({
            "Activity": "ViewReport",
            "WorkSpaceName": workspace,
            "ReportName": name,
            "ReportId": id,
        }))
    }

    fn row(workspace: &str, name: &str, id: &str, count: u64) -> AggregatedUsageRow {
        AggregatedUsageRow {
            workspace_name: workspace.to_string(),
            report_name: name.to_string(),
            report_id: id.to_string(),
            view_count: count,
        }
    }

    #[test]
    fn test_filter_keeps_only_matching_activity() {
        let records = vec![
            view("Sales", "Exec Overview", "r1"),
            ActivityRecord::new(json!({
                "Activity": "CreateReport",
                "WorkSpaceName": "Sales",
                "ReportName": "Exec Overview",
                "ReportId": "r1",
            })),
            view("Sales", "Exec Overview", "r1"),
        ];

        let result = aggregate(&records, "ViewReport");
        assert_eq!(result.matched, 2);
        assert_eq!(result.rows, vec![row("Sales", "Exec Overview", "r1", 2)]);
    }

    #[test]
    fn test_filter_is_case_sensitive() {
        let records = vec![ActivityRecord::new(json!({"Activity": "viewreport"}))];
        let result = aggregate(&records, "ViewReport");
        assert_eq!(result.matched, 0);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_grouping_and_ranking() {
        let records = vec![
            view("Finance", "P&L", "r2"),
            view("Sales", "Exec Overview", "r1"),
            view("Sales", "Exec Overview", "r1"),
        ];

        let result = aggregate(&records, "ViewReport");
        assert_eq!(
            result.rows,
            vec![
                row("Sales", "Exec Overview", "r1", 2),
                row("Finance", "P&L", "r2", 1),
            ]
        );
    }

    #[test]
    fn test_renamed_report_is_a_separate_row() {
        let records = vec![
            view("Sales", "Exec Overview", "r1"),
            view("Sales", "Executive Overview", "r1"),
        ];
        let result = aggregate(&records, "ViewReport");
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_ties_break_by_workspace_then_name_then_id() {
        let records = vec![
            view("Sales", "Zeta", "r9"),
            view("Ops", "KPI", "r4"),
            view("Sales", "Alpha", "r8"),
            view("Sales", "Alpha", "r7"),
        ];
        let result = aggregate(&records, "ViewReport");
        let ids: Vec<&str> = result.rows.iter().map(|r| r.report_id.as_str()).collect();
        assert_eq!(ids, vec!["r4", "r7", "r8", "r9"]);
    }

    #[test]
    fn test_order_independent() {
        let mut records = vec![
            view("Finance", "P&L", "r2"),
            view("Sales", "Exec Overview", "r1"),
            view("Ops", "KPI Dashboard", "r3"),
            view("Sales", "Exec Overview", "r1"),
            view("Ops", "KPI Dashboard", "r3"),
        ];
        let forward = aggregate(&records, "ViewReport");
        records.reverse();
        let backward = aggregate(&records, "ViewReport");
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_empty_input() {
        let result = aggregate(&[], "ViewReport");
        assert!(result.rows.is_empty());
        assert_eq!(result.matched, 0);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_missing_report_fields_group_under_empty_string() {
        let records = vec![
            ActivityRecord::new(json!({"Activity": "ViewReport", "WorkSpaceName": "Sales"})),
            ActivityRecord::new(json!({
                "Activity": "ViewReport",
                "WorkSpaceName": "Sales",
                "ReportName": null,
                "ReportId": null,
            })),
        ];
        let result = aggregate(&records, "ViewReport");
        assert_eq!(result.rows, vec![row("Sales", "", "", 2)]);
    }

    #[test]
    fn test_malformed_records_are_skipped_and_counted() {
        let records = vec![
            view("Sales", "Exec Overview", "r1"),
            ActivityRecord::new(json!({"Activity": "ViewReport", "ReportName": 7})),
            ActivityRecord::new(json!({"Activity": "ViewReport", "ReportName": 8})),
            ActivityRecord::new(json!(["not", "an", "object"])),
        ];
        let result = aggregate(&records, "ViewReport");

        assert_eq!(result.rows, vec![row("Sales", "Exec Overview", "r1", 1)]);
        assert_eq!(result.skipped.total, 3);
        assert_eq!(result.skipped.by_reason.values().sum::<usize>(), 3);
        assert!(result.skipped.by_reason.len() >= 2);
    }

    #[test]
    fn test_odd_descriptive_fields_still_count() {
        let records = vec![
            ActivityRecord::new(json!({
                "Activity": "ViewReport",
                "CreationTime": "2024-01-03T10:15:00",
                "WorkSpaceName": "Ops",
                "ReportName": "KPI",
                "ReportId": "r3",
            })),
            ActivityRecord::new(json!({
                "Id": 12345,
                "Activity": "ViewReport",
                "WorkSpaceName": "Ops",
                "ReportName": "KPI",
                "ReportId": "r3",
            })),
            view("Ops", "KPI", "r3"),
        ];

        let result = aggregate(&records, "ViewReport");

        assert_eq!(result.rows, vec![row("Ops", "KPI", "r3", 3)]);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_other_activities_are_not_decoded() {
        let records = vec![
            view("Sales", "Exec Overview", "r1"),
            ActivityRecord::new(json!({"Activity": "ExportReport", "ReportName": 7})),
        ];
        let result = aggregate(&records, "ViewReport");

        assert_eq!(result.matched, 1);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_top_is_bounded() {
        let records = vec![view("Sales", "A", "r1"), view("Sales", "B", "r2")];
        let result = aggregate(&records, "ViewReport");
        assert_eq!(result.top(1).len(), 1);
        assert_eq!(result.top(10).len(), 2);
    }
}
