//! Plain text report generator.

use crate::config::Config;
use crate::error::Result;
use crate::reporter::ReportGenerator;
use crate::types::{Issue, Severity};
use crate::LintResult;
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};

/// Text report generator for CLI output.
pub struct TextReporter {
    /// Whether to use colors
    use_colors: bool,
    /// Whether to show verbose output
    verbose: bool,
}

impl TextReporter {
    /// Create a new text reporter.
    #[must_use]
    pub const fn new(config: &Config) -> Self {
        Self {
            use_colors: config.output.colored,
            verbose: config.output.verbose,
        }
    }
}

impl ReportGenerator for TextReporter {
    fn generate(&self, result: &LintResult) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.format_header());
        output.push('\n');

        output.push_str(&self.format_summary(result));
        output.push('\n');

        if !result.report.issues.is_empty() {
            output.push_str(&self.format_issues(&result.report.issues));
            output.push('\n');
        }

        if !result.report.failures.is_empty() {
            output.push_str(&self.format_failures(result));
            output.push('\n');
        }

        if self.verbose {
            output.push_str(&self.format_detectors(result));
            output.push('\n');
        }

        output.push_str(&self.format_footer(result));

        Ok(output)
    }
}

impl TextReporter {
    fn section_title(&self, title: &str) -> String {
        let title = if self.use_colors {
            title.bright_cyan().bold().to_string()
        } else {
            title.to_string()
        };
        format!("\n{title}\n{}\n", "-".repeat(80))
    }

    /// Format the report header.
    fn format_header(&self) -> String {
        let title = "tfprobe Lint Report";
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

        if self.use_colors {
            format!(
                "\n{} {} {}\n{}\n",
                title.bright_white().bold(),
                version.dimmed(),
                format!("({timestamp})").dimmed(),
                "=".repeat(80).bright_blue(),
            )
        } else {
            format!("\n{title} {version} ({timestamp})\n{}\n", "=".repeat(80))
        }
    }

    /// Format the summary section.
    fn format_summary(&self, result: &LintResult) -> String {
        let mut output = self.section_title("Summary");

        let count = |severity: Severity| {
            result
                .report
                .issues
                .iter()
                .filter(|i| i.severity == severity)
                .count()
        };
        let (errors, warnings, notices) = (count(Severity::Error), count(Severity::Warning), count(Severity::Notice));
        let failures = result.report.failures.len();

        if self.use_colors {
            output.push_str(&format!(
                "  {} {} | {} {} | {} {} | {} {}\n",
                errors.to_string().red().bold(),
                plural(errors, "Error"),
                warnings.to_string().yellow().bold(),
                plural(warnings, "Warning"),
                notices.to_string().blue(),
                plural(notices, "Notice"),
                failures.to_string().magenta(),
                plural(failures, "Failure"),
            ));
        } else {
            output.push_str(&format!(
                "  {errors} {} | {warnings} {} | {notices} {} | {failures} {}\n",
                plural(errors, "Error"),
                plural(warnings, "Warning"),
                plural(notices, "Notice"),
                plural(failures, "Failure"),
            ));
        }

        output.push_str(&format!(
            "  {} modules | workspace {} | deep check {}\n",
            result.modules,
            result.workspace,
            if result.deep_check { "on" } else { "off" },
        ));

        output
    }

    /// Format the issues table, in reporting order.
    fn format_issues(&self, issues: &[Issue]) -> String {
        let mut output = self.section_title("Issues");

        let mut table = Table::new();
        table
            .load_preset(comfy_table::presets::UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Severity", "Message", "Location", "Detector"]);

        for issue in issues {
            let severity = Cell::new(issue.severity.to_string());
            let severity = if self.use_colors {
                severity.fg(match issue.severity {
                    Severity::Error => Color::Red,
                    Severity::Warning => Color::Yellow,
                    Severity::Notice => Color::Blue,
                })
            } else {
                severity
            };
            let location = format!("{}:{}", get_contextual_path(&issue.file, 3), issue.line);
            table.add_row(vec![
                severity,
                Cell::new(&issue.message),
                Cell::new(location),
                Cell::new(&issue.detector),
            ]);
        }

        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    /// Format detectors that could not complete.
    fn format_failures(&self, result: &LintResult) -> String {
        let mut output = self.section_title("Failed Checks");

        for failure in &result.report.failures {
            let origin = if failure.external { "live lookup" } else { "detector" };
            let line = format!("  [{}] {} ({origin})", failure.detector, failure.message);
            if self.use_colors {
                output.push_str(&line.magenta().to_string());
            } else {
                output.push_str(&line);
            }
            output.push('\n');
        }

        output
    }

    /// Format the list of enabled detectors.
    fn format_detectors(&self, result: &LintResult) -> String {
        let mut output = self.section_title("Detectors");
        for name in &result.detectors {
            output.push_str(&format!("  {name}\n"));
        }
        output
    }

    /// Format the report footer.
    fn format_footer(&self, result: &LintResult) -> String {
        let status = if result.has_failures() {
            if self.use_colors {
                "INCOMPLETE - Some checks could not run".magenta().bold().to_string()
            } else {
                "INCOMPLETE - Some checks could not run".to_string()
            }
        } else if result.has_issues() {
            if self.use_colors {
                "FAILED - Issues found".red().bold().to_string()
            } else {
                "FAILED - Issues found".to_string()
            }
        } else if self.use_colors {
            "PASSED - No issues found".green().to_string()
        } else {
            "PASSED - No issues found".to_string()
        };

        format!("\n{status}\n\n")
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

/// Get last N components of a path for better context.
/// Example: /home/me/infra/modules/db/main.tf -> modules/db/main.tf
fn get_contextual_path(path: &std::path::Path, depth: usize) -> String {
    let components: Vec<_> = path.components().collect();
    let start_idx = components.len().saturating_sub(depth);

    components[start_idx..]
        .iter()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
