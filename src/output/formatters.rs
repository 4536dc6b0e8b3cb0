use anyhow::Result;

use crate::transcribe::CorrectionReport;

/// Corrected transcript as plain text
pub fn format_as_text(report: &CorrectionReport) -> String {
    report.corrected_text.clone()
}

/// Full report, including per-chunk originals, as pretty JSON
pub fn format_as_json(report: &CorrectionReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
