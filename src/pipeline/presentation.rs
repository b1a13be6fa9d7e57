use serde_json::{json, Value};

use crate::db::models::ReportRow;
use crate::db::reports::Report;

pub struct ReportFormatter;

impl ReportFormatter {
    /// Aligned text table with a share column, e.g.
    ///
    /// ```text
    /// severity (4 monitors)
    ///   SEV-1         1    25.0%
    ///   Unspecified   3    75.0%
    /// ```
    pub fn table(report: Report, rows: &[ReportRow]) -> String {
        let total: i64 = rows.iter().map(|r| r.count).sum();
        let unit = match report {
            Report::Tag | Report::Notification => "entries",
            _ => "monitors",
        };
        let mut out = format!("{} ({} {})\n", report, total, unit);

        if rows.is_empty() {
            out.push_str("  (no data)\n");
            return out;
        }

        let label_width = rows.iter().map(|r| r.label.chars().count()).max().unwrap_or(0);
        let count_width = rows.iter().map(|r| r.count.to_string().len()).max().unwrap_or(1);

        for row in rows {
            out.push_str(&format!(
                "  {:<lw$}   {:>cw$}   {:>5.1}%\n",
                row.label,
                row.count,
                Self::share(row.count, total),
                lw = label_width,
                cw = count_width,
            ));
        }
        out
    }

    pub fn json(report: Report, rows: &[ReportRow]) -> Value {
        json!({
            "report": report.name(),
            "rows": rows,
        })
    }

    fn share(count: i64, total: i64) -> f64 {
        if total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<ReportRow> {
        vec![
            ReportRow { label: "SEV-1".into(), count: 1 },
            ReportRow { label: "Unspecified".into(), count: 3 },
        ]
    }

    #[test]
    fn test_table_alignment_and_share() {
        let table = ReportFormatter::table(Report::Severity, &rows());
        assert_eq!(
            table,
            "severity (4 monitors)\n  SEV-1         1    25.0%\n  Unspecified   3    75.0%\n"
        );
    }

    #[test]
    fn test_empty_table() {
        let table = ReportFormatter::table(Report::Tag, &[]);
        assert_eq!(table, "tag (0 entries)\n  (no data)\n");
    }

    #[test]
    fn test_json_shape() {
        let value = ReportFormatter::json(Report::Severity, &rows());
        assert_eq!(value["report"], "severity");
        assert_eq!(value["rows"][1]["label"], "Unspecified");
        assert_eq!(value["rows"][1]["count"], 3);
    }
}
