//! End-of-batch report.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// What a finished batch did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Wall-clock time of the run.
    pub elapsed: Duration,
    /// Inputs moved into place, with their final path.
    pub converted: Vec<(String, PathBuf)>,
    pub error_count: usize,
    /// One message per failed input or failed rename.
    pub errors: Vec<String>,
    /// Seconds of audio converted successfully.
    pub duration_processed: f64,
    /// e.g. `Conversion done in 1 m 5 s, 2 error(s)`
    pub status: String,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.error_count == 0
    }
}

/// Status line for a batch.
pub fn status_line(elapsed: Duration, error_count: usize) -> String {
    let mut status = format!("Conversion done in {}", format_time(elapsed.as_secs_f64()));
    if error_count > 0 {
        status.push_str(&format!(", {} error(s)", error_count));
    }
    status
}

/// Formats seconds as days, hours, minutes and seconds, skipping zero
/// units: `1 h 2 s`, `0 s`.
pub fn format_time(seconds: f64) -> String {
    const UNITS: [(u64, &str); 4] = [(86400, "d"), (3600, "h"), (60, "m"), (1, "s")];

    let mut remaining = seconds.max(0.0).round() as u64;
    let mut parts = Vec::new();
    for (factor, unit) in UNITS {
        let count = remaining / factor;
        remaining -= count * factor;
        if count > 0 || (factor == 1 && parts.is_empty()) {
            parts.push(format!("{} {}", count, unit));
        }
    }
    parts.join(" ")
}
