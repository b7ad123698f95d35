//! JSON report generator.

use crate::config::Config;
use crate::detector::DetectorFailure;
use crate::error::Result;
use crate::reporter::ReportGenerator;
use crate::types::{Issue, Severity};
use crate::LintResult;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// JSON report generator.
pub struct JsonReporter {
    /// Whether to pretty-print the output
    pretty: bool,
}

impl JsonReporter {
    /// Create a new JSON reporter.
    #[must_use]
    pub const fn new(config: &Config) -> Self {
        Self {
            pretty: config.output.pretty,
        }
    }
}

impl ReportGenerator for JsonReporter {
    fn generate(&self, result: &LintResult) -> Result<String> {
        let report = JsonReport::from(result);

        let json = if self.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        };

        json.map_err(|e| {
            crate::err!(ReportGeneration {
                message: format!("Failed to serialize JSON report: {e}"),
            })
        })
    }
}

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    /// Report metadata
    pub metadata: ReportMetadata<'a>,
    /// Summary statistics
    pub summary: ReportSummary,
    /// Issues in reporting order
    pub issues: &'a [Issue],
    /// Detectors that could not complete
    pub failures: &'a [DetectorFailure],
}

impl<'a> From<&'a LintResult> for JsonReport<'a> {
    fn from(result: &'a LintResult) -> Self {
        let mut issues_by_severity = BTreeMap::new();
        for issue in &result.report.issues {
            *issues_by_severity.entry(issue.severity.to_string()).or_insert(0) += 1;
        }

        Self {
            metadata: ReportMetadata {
                version: env!("CARGO_PKG_VERSION"),
                timestamp: chrono::Utc::now().to_rfc3339(),
                root: &result.root,
                workspace: &result.workspace,
                deep_check: result.deep_check,
                detectors: &result.detectors,
            },
            summary: ReportSummary {
                total_modules: result.modules,
                total_issues: result.report.issues.len(),
                total_failures: result.report.failures.len(),
                issues_by_severity,
                has_errors: result.report.issues.iter().any(|i| i.severity == Severity::Error),
            },
            issues: &result.report.issues,
            failures: &result.report.failures,
        }
    }
}

/// Report metadata.
#[derive(Debug, Serialize)]
pub struct ReportMetadata<'a> {
    /// tfprobe version
    pub version: &'static str,
    /// Report generation timestamp
    pub timestamp: String,
    /// Root module directory
    pub root: &'a PathBuf,
    /// Workspace name
    pub workspace: &'a str,
    /// Whether deep checks ran
    pub deep_check: bool,
    /// Enabled detectors
    pub detectors: &'a [String],
}

/// Report summary.
#[derive(Debug, Serialize)]
pub struct ReportSummary {
    /// Module instances linted
    pub total_modules: usize,
    /// Total issues
    pub total_issues: usize,
    /// Total detector failures
    pub total_failures: usize,
    /// Issues grouped by severity
    pub issues_by_severity: BTreeMap<String, usize>,
    /// Whether there are error-level issues
    pub has_errors: bool,
}
