use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};

const FRAME: &str = "============================================================";

pub fn write_report(path: &Path, report: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, report).with_context(|| format!("Failed to write to {}", path.display()))
}

/// Writes the report, printing it framed on stdout when the write fails.
///
/// Returns whether the file was written.
pub fn save_or_print(path: &Path, report: &str) -> bool {
    match write_report(path, report) {
        Ok(()) => {
            info!(path = %path.display(), "Report saved");
            true
        }
        Err(e) => {
            let detail = format!("{:#}", e);
            error!(error = %detail, "Failed to save report");
            println!("\n{}", FRAME);
            println!("{}", report);
            println!("{}", FRAME);
            false
        }
    }
}
