//! JSON and JSON Lines writers for batch reports.

use serde::Serialize;
use std::io::{self, Write};

use crate::types::{BatchOutcome, BatchProcessingResult};

/// Report serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// The whole batch result as one JSON document
    Json,
    /// One per-file result per line, then a summary line
    JsonLines,
}

impl ReportFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Closing line of a JSON Lines report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_time_ms: f64,
    pub outcome: BatchOutcome,
}

impl From<&BatchProcessingResult> for ReportSummary {
    fn from(result: &BatchProcessingResult) -> Self {
        Self {
            total_files: result.total_files,
            successful: result.successful,
            failed: result.failed,
            total_time_ms: result.total_time_ms,
            outcome: result.outcome,
        }
    }
}

/// Serializes reports to any writer.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: ReportFormat,
    pretty: bool,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects [`ReportFormat::Json`]; JSON Lines is always compact.
    pub fn new(writer: W, format: ReportFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            items_written: 0,
        }
    }

    /// Write one record followed by a newline.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        if self.pretty && self.format == ReportFormat::Json {
            serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        }
        writeln!(self.writer)?;
        self.items_written += 1;
        Ok(())
    }

    /// Write a finished batch.
    ///
    /// JSON emits the full result object. JSON Lines emits each per-file
    /// result on its own line and ends with a [`ReportSummary`].
    pub fn write_report(&mut self, result: &BatchProcessingResult) -> io::Result<()> {
        match self.format {
            ReportFormat::Json => self.write(result),
            ReportFormat::JsonLines => {
                for record in &result.results {
                    self.write(record)?;
                }
                self.write(&ReportSummary::from(result))
            }
        }
    }

    pub fn items_written(&self) -> usize {
        self.items_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProcessingResult;

    fn report() -> BatchProcessingResult {
        let mut result = BatchProcessingResult::new(2);
        result.push(ProcessingResult {
            input_file: "a.jpg".to_string(),
            output_file: Some("a_watermarked.jpg".to_string()),
            success: true,
            error: None,
            processing_time_ms: 12.5,
            original_size: Some((800, 600)),
            output_size: Some((800, 600)),
        });
        result.push(ProcessingResult::failed("b.jpg", "Decode error", 3.0));
        result.total_time_ms = 20.0;
        result
    }

    #[test]
    fn test_json_report_is_single_document() {
        let mut writer = OutputWriter::new(Vec::new(), ReportFormat::Json, true);
        writer.write_report(&report()).unwrap();
        assert_eq!(writer.items_written(), 1);

        let output = String::from_utf8(writer.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["successful"], 1);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["results"].as_array().unwrap().len(), 2);
        assert_eq!(value["outcome"], "completed");
    }

    #[test]
    fn test_jsonl_report_lines() {
        let mut writer = OutputWriter::new(Vec::new(), ReportFormat::JsonLines, true);
        writer.write_report(&report()).unwrap();

        let output = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = output.trim().split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"input_file\":\"a.jpg\""));
        assert!(lines[1].contains("\"success\":false"));

        let summary: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(summary["total_files"], 2);
        assert!(summary.get("results").is_none());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ReportFormat::parse("json"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::parse("JSONL"), Some(ReportFormat::JsonLines));
        assert_eq!(ReportFormat::parse("ndjson"), Some(ReportFormat::JsonLines));
        assert_eq!(ReportFormat::parse("csv"), None);
    }
}
