use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::transcribe::CorrectionReport;

pub mod formatters;

pub use formatters::*;

#[derive(thiserror::Error, Debug)]
#[error("Clipboard write failed: {0}")]
pub struct ClipboardError(#[from] arboard::Error);

fn render(report: &CorrectionReport, format: &OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => format_as_text(report),
        OutputFormat::Json => format_as_json(report)?,
    })
}

/// Save correction report to file
pub async fn save_to_file(report: &CorrectionReport, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(report, format)?;

    fs_err::write(path, content)?;
    Ok(())
}

/// Print correction report to console
pub fn print_to_console(report: &CorrectionReport, format: &OutputFormat) -> Result<()> {
    let content = render(report, format)?;

    println!("{}", content);
    Ok(())
}

/// Shown after a successful clipboard write.
///
/// X11 and Wayland clipboards are served by the owning process, so on Linux the
/// text only outlives this program when a clipboard manager picks it up.
#[cfg(target_os = "linux")]
pub const CLIPBOARD_NOTICE: &str =
    "Corrected transcript copied to clipboard (on Linux it stays available after exit only if a clipboard manager is running).";
#[cfg(not(target_os = "linux"))]
pub const CLIPBOARD_NOTICE: &str = "Corrected transcript copied to clipboard.";

/// Put text on the system clipboard
pub fn copy_to_clipboard(text: &str) -> Result<(), ClipboardError> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(text)?;
    Ok(())
}
