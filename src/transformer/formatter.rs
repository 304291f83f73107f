//! Report output
//!
//! Renders report records for the console or a downstream pipe.
//!
//! # Text format
//!
//! One line per record, in emission order:
//!
//! ```text
//! <endpoint> <metric>{<tags>} <value> <timestamp> <counterType>
//! ```
//!
//! JSON and YAML render the open-falcon payload array.

use crate::cli::OutputFormat;
use crate::error::{AppError, AppResult};
use crate::report::ReportRecord;

/// Report formatter
///
/// # Example
///
/// ```ignore
/// use jmx_reporter::cli::OutputFormat;
/// use jmx_reporter::transformer::ReportFormatter;
///
/// let output = ReportFormatter::new().format(&records, OutputFormat::Json)?;
/// println!("{output}");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    /// Pretty-print JSON output
    pretty: bool,
}

impl ReportFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether JSON output is pretty-printed
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Format records in the requested output format
    pub fn format(&self, records: &[ReportRecord], format: OutputFormat) -> AppResult<String> {
        match format {
            OutputFormat::Text => Ok(self.format_text(records)),
            OutputFormat::Json => {
                let rendered = if self.pretty {
                    serde_json::to_string_pretty(records)
                } else {
                    serde_json::to_string(records)
                };
                rendered.map_err(|e| AppError::Render(e.to_string()))
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(records).map_err(|e| AppError::Render(e.to_string()))
            }
        }
    }

    /// Plain text lines; empty input yields an empty string
    pub fn format_text(&self, records: &[ReportRecord]) -> String {
        let mut output = String::with_capacity(records.len() * 100);
        for record in records {
            output.push_str(&Self::format_line(record));
            output.push('\n');
        }
        output
    }

    fn format_line(record: &ReportRecord) -> String {
        let mut line = format!("{} {}", record.endpoint, record.metric);
        if !record.tags.is_empty() {
            line.push('{');
            line.push_str(&record.tags.to_string());
            line.push('}');
        }
        line.push_str(&format!(
            " {} {} {}",
            record.value, record.timestamp, record.counter_type
        ));
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::context;
    use crate::report::CounterType;

    fn records() -> Vec<ReportRecord> {
        let ctx = context();
        vec![
            ctx.record("HeapMemoryUsed", "40", CounterType::Gauge, "java.lang:type=Memory"),
            ctx.record("GC-PSScavenge-CollectionCount", "7", CounterType::Gauge, ""),
        ]
    }

    #[test]
    fn test_format_text_lines() {
        let output = ReportFormatter::new().format_text(&records());
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "host-01 HeapMemoryUsed{service=tomcat} 40 1700000000 GAUGE"
        );
        assert!(lines[1].starts_with("host-01 GC-PSScavenge-CollectionCount{"));
    }

    #[test]
    fn test_format_text_without_tags() {
        let mut record = records().remove(0);
        record.tags = Default::default();
        let output = ReportFormatter::new().format_text(&[record]);
        assert!(!output.contains('{'));
        assert_eq!(output, "host-01 HeapMemoryUsed 40 1700000000 GAUGE\n");
    }

    #[test]
    fn test_format_empty() {
        let output = ReportFormatter::new().format(&[], OutputFormat::Text).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_format_json() {
        let output = ReportFormatter::new()
            .format(&records(), OutputFormat::Json)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["metric"], "HeapMemoryUsed");
        assert_eq!(parsed[0]["counterType"], "GAUGE");
        assert_eq!(parsed[0]["timestamp"], 1_700_000_000);
    }

    #[test]
    fn test_format_yaml() {
        let output = ReportFormatter::new()
            .format(&records(), OutputFormat::Yaml)
            .unwrap();
        assert!(output.contains("metric: HeapMemoryUsed"));
        assert!(output.contains("counterType: GAUGE"));
    }

    #[test]
    fn test_format_preserves_record_order() {
        let output = ReportFormatter::new().format_text(&records());
        let heap = output.find("HeapMemoryUsed").unwrap();
        let gc = output.find("GC-PSScavenge").unwrap();
        assert!(heap < gc);
    }
}
