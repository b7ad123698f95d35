//! Core data types shared across tfprobe.
//!
//! This module defines:
//! - Source locations attached to declarations and issues
//! - Lint issues and their severity
//! - Report and graph output formats

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Location in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    /// File path
    pub file: PathBuf,
    /// Line number (1-based)
    pub line: usize,
}

impl Location {
    /// Create a new location.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// Severity level for issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational notice
    Notice,
    /// Warning - potential problem
    Warning,
    /// Error - the configuration will not apply as written
    Error,
}

impl Severity {
    /// Parse a severity name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "notice" | "info" => Some(Self::Notice),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Notice => write!(f, "NOTICE"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// A single lint issue reported by a detector.
///
/// Issues are immutable once created; detectors emit them in source
/// declaration order and the registry concatenates them in detector
/// registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Name of the detector that produced the issue
    pub detector: String,
    /// Severity level
    #[serde(rename = "type")]
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// File path of the offending attribute
    pub file: PathBuf,
    /// Line number (1-based) of the offending attribute
    pub line: usize,
}

impl Issue {
    /// Create an issue at the given location.
    #[must_use]
    pub fn new(detector: &str, severity: Severity, message: String, location: &Location) -> Self {
        Self {
            detector: detector.to_string(),
            severity,
            message,
            file: location.file.clone(),
            line: location.line,
        }
    }

    /// The issue's location.
    #[must_use]
    pub fn location(&self) -> Location {
        Location::new(self.file.clone(), self.line)
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum ReportFormat {
    /// Plain text format
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Module tree output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum GraphFormat {
    /// DOT format (Graphviz)
    #[default]
    Dot,
    /// JSON format
    Json,
    /// Mermaid diagram format
    Mermaid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("ERROR"), Some(Severity::Error));
        assert_eq!(Severity::parse("warn"), Some(Severity::Warning));
        assert_eq!(Severity::parse("info"), Some(Severity::Notice));
        assert_eq!(Severity::parse("fatal"), None);
    }

    #[test]
    fn test_issue_serializes_type_field() {
        let issue = Issue::new(
            "aws_instance_invalid_type",
            Severity::Error,
            "\"t1.2xlarge\" is invalid instance type.".to_string(),
            &Location::new("main.tf", 3),
        );
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "ERROR");
        assert_eq!(json["line"], 3);
        assert_eq!(issue.location().to_string(), "main.tf:3");
    }
}
