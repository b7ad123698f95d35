//! Report generation module.
//!
//! This module provides report generation in multiple formats:
//! - JSON: Machine-readable structured output
//! - Text: Human-readable CLI output
//!
//! # Example
//!
//! ```rust,no_run
//! use tfprobe::reporter::Reporter;
//! use tfprobe::{Config, Linter, ReportFormat};
//! use std::path::Path;
//!
//! # async fn example() -> tfprobe::Result<()> {
//! let config = Config::default();
//! let result = Linter::new(config.clone())?.lint(Path::new("."), &[]).await?;
//! let text = Reporter::new(&config).generate(&result, ReportFormat::Text)?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

mod json;
mod text;

use crate::config::Config;
use crate::error::Result;
use crate::types::ReportFormat;
use crate::LintResult;

pub use json::JsonReporter;
pub use text::TextReporter;

/// Report generator that supports multiple output formats.
pub struct Reporter {
    config: Config,
}

impl Reporter {
    /// Create a new reporter with the given configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Generate a report in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if report generation fails.
    pub fn generate(&self, result: &LintResult, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => JsonReporter::new(&self.config).generate(result),
            ReportFormat::Text => TextReporter::new(&self.config).generate(result),
        }
    }
}

/// Trait for report generators.
pub trait ReportGenerator {
    /// Generate a report from a lint result.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails.
    fn generate(&self, result: &LintResult) -> Result<String>;
}
