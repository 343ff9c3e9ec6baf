//! Console summary and CSV output.

use std::io::Write;
use std::path::Path;

use colored::Colorize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::aggregate::AggregatedUsageRow;
use crate::error::SinkError;

/// Column order of the CSV file.
pub const CSV_HEADER: [&str; 4] = ["WorkspaceName", "ReportName", "ReportId", "ViewCount"];

/// Print the first `top` rows as a table.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn print_summary<W: Write>(
    out: &mut W,
    title: &str,
    rows: &[AggregatedUsageRow],
    top: usize,
) -> std::io::Result<()> {
    let shown = &rows[..top.min(rows.len())];

    writeln!(out, "\n{}", title.bold())?;
    if shown.is_empty() {
        writeln!(out, "   No matching activity in this window.")?;
        return Ok(());
    }

    let workspace_width = column_width(shown.iter().map(|r| r.workspace_name.as_str()), "Workspace");
    let report_width = column_width(shown.iter().map(|r| r.report_name.as_str()), "Report");

    let header = format!(
        "{:>4}  {:>7}  {:<workspace_width$}  {:<report_width$}  {}",
        "#", "Views", "Workspace", "Report", "Report ID"
    );
    writeln!(out, "{}", header.as_str().bold())?;

    for (rank, row) in shown.iter().enumerate() {
        writeln!(
            out,
            "{:>4}  {:>7}  {:<workspace_width$}  {:<report_width$}  {}",
            rank + 1,
            row.view_count,
            row.workspace_name,
            row.report_name,
            row.report_id
        )?;
    }

    if rows.len() > shown.len() {
        writeln!(out, "   ... {} more in the CSV", rows.len() - shown.len())?;
    }
    Ok(())
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>, header: &str) -> usize {
    values
        .map(|v| v.chars().count())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0)
        .min(48)
}

/// Write every row to `path` as CSV, replacing any existing file atomically.
///
/// The table is written to a temporary file in the same directory and
/// renamed over `path` once complete, so a failed run never leaves a
/// truncated file behind.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created, written or
/// moved into place.
pub fn write_csv(path: &Path, rows: &[AggregatedUsageRow]) -> Result<(), SinkError> {
    let io_err = |source: std::io::Error| SinkError::Io {
        path: path.display().to_string(),
        source,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp = NamedTempFile::new_in(dir).map_err(io_err)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(tmp);
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }

    let tmp = writer
        .into_inner()
        .map_err(|e| io_err(e.into_error()))?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    info!(path = %path.display(), rows = rows.len(), "Wrote usage CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(workspace: &str, name: &str, id: &str, count: u64) -> AggregatedUsageRow {
        AggregatedUsageRow {
            workspace_name: workspace.to_string(),
            report_name: name.to_string(),
            report_id: id.to_string(),
            view_count: count,
        }
    }

    #[test]
    fn test_write_csv_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.csv");
        let rows = vec![
            row("Sales", "Exec Overview", "r1", 2),
            row("Finance", "P&L, monthly", "r2", 1),
        ];

        write_csv(&path, &rows).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "WorkspaceName,ReportName,ReportId,ViewCount\n\
             Sales,Exec Overview,r1,2\n\
             Finance,\"P&L, monthly\",r2,1\n"
        );
    }

    #[test]
    fn test_write_csv_empty_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.csv");
        write_csv(&path, &[]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "WorkspaceName,ReportName,ReportId,ViewCount\n"
        );
    }

    #[test]
    fn test_write_csv_replaces_existing_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.csv");
        std::fs::write(&path, "stale contents that are much longer than the new table\n").unwrap();

        write_csv(&path, &[row("Ops", "KPI Dashboard", "r3", 3)]).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "WorkspaceName,ReportName,ReportId,ViewCount\nOps,KPI Dashboard,r3,3\n"
        );
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_write_csv_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("usage.csv");
        let err = write_csv(&path, &[]).unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_print_summary_limits_rows() {
        let rows: Vec<_> = (0..12)
            .map(|i| row("Sales", &format!("Report {i}"), &format!("r{i}"), 20 - i))
            .collect();
        let mut out = Vec::new();
        print_summary(&mut out, "Top reports", &rows, 10).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Report 0"));
        assert!(text.contains("Report 9"));
        assert!(!text.contains("Report 10"));
        assert!(text.contains("2 more in the CSV"));
    }

    #[test]
    fn test_print_summary_empty() {
        let mut out = Vec::new();
        print_summary(&mut out, "Top reports", &[], 10).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("No matching activity"));
    }
}
