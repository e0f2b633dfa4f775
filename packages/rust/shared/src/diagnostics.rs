//! Per-file diagnostic ledger shared by every validation stage.
//!
//! Validators record findings here instead of returning errors, so one run
//! surfaces every problem. The publish manifest reconciler later asks the
//! log whether a given source file has recorded errors.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{DocgraphError, Result};

/// How serious a recorded diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single finding, keyed by the source file it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable machine-readable code, e.g. `unresolved-child`.
    pub code: String,
    pub message: String,
    /// Source path relative to the docset root.
    pub file: String,
}

/// Thread-safe accumulator of [`Diagnostic`]s for one validation run.
///
/// Recording order is not part of the contract.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and emit it as a `tracing` event.
    pub fn record(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => error!(
                file = %diagnostic.file,
                code = %diagnostic.code,
                "{}",
                diagnostic.message
            ),
            Severity::Warning => warn!(
                file = %diagnostic.file,
                code = %diagnostic.code,
                severity = "warning",
                "{}",
                diagnostic.message
            ),
            Severity::Info => info!(
                file = %diagnostic.file,
                code = %diagnostic.code,
                "{}",
                diagnostic.message
            ),
        }
        self.lock().push(diagnostic);
    }

    /// Record an error-severity diagnostic.
    pub fn error(&self, file: impl Into<String>, code: &str, message: impl Into<String>) {
        self.record(Diagnostic {
            severity: Severity::Error,
            code: code.into(),
            message: message.into(),
            file: file.into(),
        });
    }

    /// Record a warning-severity diagnostic.
    pub fn warning(&self, file: impl Into<String>, code: &str, message: impl Into<String>) {
        self.record(Diagnostic {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
            file: file.into(),
        });
    }

    /// Whether any error-severity diagnostic was recorded for `file`.
    pub fn has_errors(&self, file: &str) -> bool {
        self.lock()
            .iter()
            .any(|d| d.severity == Severity::Error && d.file == file)
    }

    /// Every file with at least one recorded error.
    pub fn files_with_errors(&self) -> BTreeSet<String> {
        self.lock()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.file.clone())
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Snapshot of everything recorded so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Write the ledger as pretty JSON, grouped by file.
    pub fn write_report(&self, path: &Path) -> Result<()> {
        let entries = self.lock();
        let report = DiagnosticReport::from_entries(&entries);
        let json = serde_json::to_string_pretty(&report).map_err(|e| {
            DocgraphError::validation(format!("JSON serialization failed: {e}"))
        })?;
        drop(entries);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DocgraphError::io(parent, e))?;
        }
        std::fs::write(path, json).map_err(|e| DocgraphError::io(path, e))?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        // A panic while holding the lock cannot leave a half-pushed entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct DiagnosticReport<'a> {
    generated_at: DateTime<Utc>,
    error_count: usize,
    warning_count: usize,
    files: BTreeMap<&'a str, Vec<ReportLine<'a>>>,
}

#[derive(Debug, Serialize)]
struct ReportLine<'a> {
    severity: Severity,
    code: &'a str,
    message: &'a str,
}

impl<'a> DiagnosticReport<'a> {
    fn from_entries(entries: &'a [Diagnostic]) -> Self {
        let mut files: BTreeMap<&str, Vec<ReportLine<'_>>> = BTreeMap::new();
        for d in entries {
            files.entry(d.file.as_str()).or_default().push(ReportLine {
                severity: d.severity,
                code: &d.code,
                message: &d.message,
            });
        }

        Self {
            generated_at: Utc::now(),
            error_count: entries.iter().filter(|d| d.severity == Severity::Error).count(),
            warning_count: entries
                .iter()
                .filter(|d| d.severity == Severity::Warning)
                .count(),
            files,
        }
    }
}
