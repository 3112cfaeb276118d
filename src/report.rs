//! Zone request report: retrieval, scrubbing, format conversion, atomic write

use crate::client::CzdsClient;
use crate::config::ReportOptions;
use crate::error::{Error, Result};
use crate::types::{ReportFormat, ReportStatus};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// Placeholder written over the requester's identity when scrubbing
pub const SCRUB_PLACEHOLDER: &str = "nobody@no.name";

/// Parsed tabular report: one header row plus data rows, order preserved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// Column names from the first CSV row
    pub header: Vec<String>,
    /// Data rows, in the order the API returned them
    pub rows: Vec<Vec<String>>,
}

impl Report {
    /// Parse the API's CSV form.
    ///
    /// Quote-aware for fields containing commas or doubled quotes; an empty
    /// body parses to an empty report.
    pub fn parse_csv(content: &str) -> Self {
        let mut lines = content
            .lines()
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.is_empty());

        let header = match lines.next() {
            Some(line) => parse_row(line),
            None => return Self::default(),
        };
        let rows = lines.map(parse_row).collect();

        Self { header, rows }
    }

    /// Emit the CSV form: header row then data rows, fields re-quoted only
    /// where needed.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(&emit_row(&self.header));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&emit_row(row));
            out.push('\n');
        }
        out
    }

    /// Convert to a JSON array of objects keyed by the header row.
    ///
    /// Row order and field values carry over exactly; key order follows the
    /// header so a round trip back to CSV reproduces the column layout.
    pub fn to_json(&self) -> Result<String> {
        let objects: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let mut object = serde_json::Map::new();
                for (i, key) in self.header.iter().enumerate() {
                    let value = row.get(i).cloned().unwrap_or_default();
                    object.insert(key.clone(), serde_json::Value::String(value));
                }
                serde_json::Value::Object(object)
            })
            .collect();

        Ok(serde_json::to_string_pretty(&serde_json::Value::Array(
            objects,
        ))?)
    }

    /// Rebuild a report from its JSON form.
    ///
    /// The header is recovered from the first object's key order; missing
    /// keys in later objects become empty fields.
    pub fn from_json(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let objects = value.as_array().ok_or_else(|| Error::Config {
            message: "report JSON must be an array of objects".to_string(),
        })?;

        let Some(first) = objects.first() else {
            return Ok(Self::default());
        };
        let first = first.as_object().ok_or_else(|| Error::Config {
            message: "report JSON rows must be objects".to_string(),
        })?;
        let header: Vec<String> = first.keys().cloned().collect();

        let mut rows = Vec::with_capacity(objects.len());
        for object in objects {
            let object = object.as_object().ok_or_else(|| Error::Config {
                message: "report JSON rows must be objects".to_string(),
            })?;
            let row = header
                .iter()
                .map(|key| {
                    object
                        .get(key)
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string()
                })
                .collect();
            rows.push(row);
        }

        Ok(Self { header, rows })
    }

    /// Warn once per distinct status value outside the known enumeration.
    ///
    /// Rows are kept verbatim either way; a new server-side status must not
    /// fail the whole report.
    pub fn log_unknown_statuses(&self) {
        let Some(status_col) = self
            .header
            .iter()
            .position(|name| name.eq_ignore_ascii_case("status"))
        else {
            return;
        };

        let mut seen: HashSet<&str> = HashSet::new();
        for row in &self.rows {
            let Some(value) = row.get(status_col) else {
                continue;
            };
            if ReportStatus::from_str(value).is_err() && seen.insert(value) {
                tracing::warn!(status = %value, "Unknown status value in report");
            }
        }
    }
}

/// Replace every occurrence of the requester's identity with the placeholder.
///
/// Operates on the raw text so every other byte of the report is untouched.
pub fn scrub(content: &str, identity: &str) -> String {
    if identity.is_empty() {
        return content.to_string();
    }
    content.replace(identity, SCRUB_PLACEHOLDER)
}

/// Write report content so the destination is never observed half-written.
///
/// The content goes to a hidden temporary sibling first, then a rename
/// replaces `destination`. On failure the temporary file is removed and
/// nothing is left at `destination`.
pub async fn write_atomic(destination: &Path, content: &str) -> Result<()> {
    let file_name = destination
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Config {
            message: format!(
                "report destination has no filename: {}",
                destination.display()
            ),
        })?;
    let tmp = destination.with_file_name(format!(".{file_name}.tmp"));

    if let Err(e) = tokio::fs::write(&tmp, content).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&tmp, destination).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(e.into());
    }

    Ok(())
}

/// Fetch the zone request report and write it to `destination`.
///
/// Scrubbing and format conversion are independent options; either, both,
/// or neither may be enabled.
pub async fn fetch_report(
    client: &CzdsClient,
    destination: &Path,
    options: &ReportOptions,
) -> Result<()> {
    tracing::info!("Downloading zone request report");
    let raw = client.report_csv().await?;

    let content = if options.scrub {
        scrub(&raw, client.username())
    } else {
        raw
    };

    let report = Report::parse_csv(&content);
    report.log_unknown_statuses();

    let output = match options.format {
        ReportFormat::Csv => content,
        ReportFormat::Json => report.to_json()?,
    };

    write_atomic(destination, &output).await?;
    tracing::info!(
        path = %destination.display(),
        rows = report.rows.len(),
        format = %options.format,
        "Saved zone report"
    );

    Ok(())
}

fn parse_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' if field.is_empty() => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }
    }
    fields.push(field);
    fields
}

fn emit_row(row: &[String]) -> String {
    row.iter()
        .map(|field| emit_field(field))
        .collect::<Vec<_>>()
        .join(",")
}

fn emit_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = "email,tld,status,last updated,reason,expires\n\
        user@example.org,xyz,approved,2025-01-01,,2026-01-01\n\
        user@example.org,abc,pending,2025-02-01,awaiting review,\n";

    // -----------------------------------------------------------------------
    // CSV parsing and emission
    // -----------------------------------------------------------------------

    #[test]
    fn parse_csv_splits_header_and_rows() {
        let report = Report::parse_csv(SAMPLE);
        assert_eq!(report.header.len(), 6);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0][1], "xyz");
        assert_eq!(report.rows[1][4], "awaiting review");
    }

    #[test]
    fn parse_csv_handles_quoted_fields() {
        let report = Report::parse_csv("a,b\n\"x, y\",\"he said \"\"hi\"\"\"\n");
        assert_eq!(report.rows[0][0], "x, y");
        assert_eq!(report.rows[0][1], "he said \"hi\"");
    }

    #[test]
    fn parse_csv_tolerates_crlf_and_blank_lines() {
        let report = Report::parse_csv("a,b\r\n1,2\r\n\r\n");
        assert_eq!(report.rows, vec![vec!["1".to_string(), "2".to_string()]]);
    }

    #[test]
    fn empty_body_parses_to_empty_report() {
        let report = Report::parse_csv("");
        assert!(report.header.is_empty());
        assert!(report.rows.is_empty());
    }

    #[test]
    fn csv_round_trip_preserves_content() {
        let report = Report::parse_csv(SAMPLE);
        assert_eq!(report.to_csv(), SAMPLE);
    }

    #[test]
    fn emit_requotes_special_fields() {
        let report = Report {
            header: vec!["a".to_string()],
            rows: vec![vec!["x, y".to_string()]],
        };
        assert_eq!(report.to_csv(), "a\n\"x, y\"\n");
    }

    // -----------------------------------------------------------------------
    // JSON conversion
    // -----------------------------------------------------------------------

    #[test]
    fn json_round_trip_preserves_rows_and_fields() {
        let report = Report::parse_csv(SAMPLE);
        let json = report.to_json().unwrap();
        let back = Report::from_json(&json).unwrap();
        assert_eq!(back, report, "CSV -> JSON -> CSV must be lossless");
    }

    #[test]
    fn to_json_keys_follow_header_order() {
        let report = Report::parse_csv(SAMPLE);
        let json = report.to_json().unwrap();
        let email_pos = json.find("\"email\"").unwrap();
        let tld_pos = json.find("\"tld\"").unwrap();
        let status_pos = json.find("\"status\"").unwrap();
        assert!(email_pos < tld_pos && tld_pos < status_pos);
    }

    #[test]
    fn from_json_rejects_non_array() {
        assert!(Report::from_json("{\"a\": 1}").is_err());
    }

    #[test]
    fn empty_json_array_is_empty_report() {
        let report = Report::from_json("[]").unwrap();
        assert!(report.rows.is_empty());
    }

    // -----------------------------------------------------------------------
    // Scrubbing
    // -----------------------------------------------------------------------

    #[test]
    fn scrub_replaces_every_occurrence() {
        let scrubbed = scrub(SAMPLE, "user@example.org");
        assert!(!scrubbed.contains("user@example.org"));
        assert_eq!(scrubbed.matches(SCRUB_PLACEHOLDER).count(), 2);
    }

    #[test]
    fn scrub_leaves_other_fields_byte_identical() {
        let scrubbed = scrub(SAMPLE, "user@example.org");
        let original = Report::parse_csv(SAMPLE);
        let after = Report::parse_csv(&scrubbed);
        for (before_row, after_row) in original.rows.iter().zip(&after.rows) {
            for (i, (before, after)) in before_row.iter().zip(after_row).enumerate() {
                if before != "user@example.org" {
                    assert_eq!(before, after, "field {i} must be untouched");
                }
            }
        }
    }

    #[test]
    fn scrub_with_empty_identity_is_a_no_op() {
        assert_eq!(scrub(SAMPLE, ""), SAMPLE);
    }

    // -----------------------------------------------------------------------
    // Atomic write
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("report.csv");

        write_atomic(&dest, SAMPLE).await.unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), SAMPLE);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp file must not survive");
    }

    #[tokio::test]
    async fn write_atomic_fails_cleanly_on_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("report.csv");

        assert!(write_atomic(&dest, SAMPLE).await.is_err());
        assert!(!dest.exists());
    }

    // -----------------------------------------------------------------------
    // Unknown status policy
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_statuses_do_not_alter_the_report() {
        let content = "email,tld,status\nuser@example.org,xyz,escalated\n";
        let report = Report::parse_csv(content);
        report.log_unknown_statuses();
        assert_eq!(report.to_csv(), content, "rows pass through verbatim");
    }
}
