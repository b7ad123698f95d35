//! Detector framework.
//!
//! A detector inspects the resolved configuration and reports [`Issue`]s.
//! Detectors that need live data ("deep checks") query a [`CloudApi`]
//! and only run when the deep-check flag is on.
//!
//! # Built-in Detectors
//!
//! | Name | Deep | Checks |
//! |------|------|--------|
//! | `aws_db_instance_invalid_parameter_group` | yes | `parameter_group_name` exists |
//! | `aws_db_instance_invalid_db_subnet_group` | yes | `db_subnet_group_name` exists |
//! | `aws_instance_invalid_key_name` | yes | `key_name` exists |
//! | `aws_instance_invalid_type` | no | `instance_type` is a known type |
//!
//! # Example
//!
//! ```rust,no_run
//! use tfprobe::detector::{DetectorConfig, DetectorInput, DetectorRegistry};
//! # async fn example(config: &tfprobe::resolve::ResolvedConfig) {
//! let registry = DetectorRegistry::with_builtin();
//! let run = DetectorConfig::default();
//! let input = DetectorInput { config, state: None, run: &run, cloud: None };
//! let report = registry.run(&input).await;
//! for issue in &report.issues {
//!     println!("{}:{} {}", issue.file.display(), issue.line, issue.message);
//! }
//! # }
//! ```

mod instance_type;
mod live_reference;
mod registry;

pub use instance_type::InstanceTypeDetector;
pub use live_reference::LiveReferenceDetector;
pub use registry::{DetectorFailure, DetectorRegistry, RunReport};

use crate::cloud::CloudApi;
use crate::error::{Result, TfProbeError};
use crate::eval::{is_evaluable, Evaluator, Resolved};
use crate::resolve::ResolvedConfig;
use crate::state::StateSnapshot;
use crate::types::{Issue, Location, Severity};
use async_trait::async_trait;
use std::collections::HashMap;

/// Per-run detector settings. Built once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct DetectorConfig {
    /// Run detectors that query live resources
    pub deep_check: bool,
    /// Severity overrides by detector name
    pub severity_overrides: HashMap<String, Severity>,
}

impl DetectorConfig {
    /// Severity `detector` reports with.
    #[must_use]
    pub fn severity_for(&self, detector: &dyn Detector) -> Severity {
        self.severity_overrides
            .get(detector.name())
            .copied()
            .unwrap_or_else(|| detector.default_severity())
    }
}

/// Everything a detector may read.
#[derive(Clone, Copy)]
pub struct DetectorInput<'a> {
    /// The resolved configuration
    pub config: &'a ResolvedConfig,
    /// State snapshot, if one was found
    pub state: Option<&'a StateSnapshot>,
    /// Run settings
    pub run: &'a DetectorConfig,
    /// Live lookup capability, required by deep checks
    pub cloud: Option<&'a dyn CloudApi>,
}

/// A lint rule.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Unique rule name, used in issues and configuration.
    fn name(&self) -> &'static str;

    /// One-line description.
    fn description(&self) -> &'static str;

    /// Severity of reported issues unless overridden.
    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    /// Whether the detector needs live data.
    fn is_deep(&self) -> bool {
        false
    }

    /// Inspect the configuration.
    ///
    /// Issues must come out in source declaration order. The configuration
    /// must not be modified.
    ///
    /// # Errors
    ///
    /// Returns an error when the check could not be performed, e.g. a live
    /// lookup failed.
    async fn run(&self, input: &DetectorInput<'_>) -> Result<Vec<Issue>>;
}

/// A string attribute value found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredValue {
    /// The evaluated value
    pub value: String,
    /// Where the attribute is declared
    pub location: Location,
}

/// Known string values of `attribute` on every `resource_type` resource,
/// across all module instances, in declaration order.
///
/// Attributes that depend on apply-time values, evaluate to unknown, or
/// are not strings are skipped.
///
/// # Errors
///
/// Returns an error for malformed references or failing evaluation.
pub fn declared_values(config: &ResolvedConfig, resource_type: &str, attribute: &str) -> Result<Vec<DeclaredValue>> {
    let mut found = Vec::new();
    for instance in &config.instances {
        let evaluator = Evaluator::new(&instance.context);
        for resource in instance.module.resources_of_type(resource_type) {
            let Some(attr) = resource.attribute(attribute) else {
                continue;
            };
            let evaluable = is_evaluable(&attr.expr).map_err(|e| {
                crate::err!(ReferenceParse {
                    location: attr.location.to_string(),
                    message: e.to_string(),
                })
            })?;
            if !evaluable {
                tracing::trace!(resource = %resource.address(), attribute, "Skipping apply-time value");
                continue;
            }
            let evaluated = evaluator
                .evaluate_to::<String>(&attr.expr)
                .map_err(|e| TfProbeError::evaluation(&attr.location, e, file!(), line!()))?;
            match evaluated.value {
                Resolved::Known(value) => found.push(DeclaredValue {
                    value,
                    location: attr.location.clone(),
                }),
                Resolved::Unknown => {
                    tracing::debug!(module = %instance.path(), resource = %resource.address(), attribute, "Value is unknown");
                }
                Resolved::Unavailable(diag) => {
                    tracing::debug!(module = %instance.path(), resource = %resource.address(), attribute, "{diag}");
                }
            }
        }
    }
    Ok(found)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_declared_values_skip_unknowns() {
        let src = r#"
variable "group" {}
variable "name" {
  default = "from-default"
}

resource "aws_db_instance" "a" {
  parameter_group_name = "literal"
}

resource "aws_db_instance" "b" {
  parameter_group_name = var.name
}

resource "aws_db_instance" "c" {
  parameter_group_name = var.group
}

resource "aws_db_instance" "d" {
  parameter_group_name = aws_db_parameter_group.main.name
}

resource "aws_db_instance" "e" {
  parameter_group_name = ["not", "a", "string"]
}
"#;
        let (_dir, config) = resolve_source(src).unwrap();
        let values = declared_values(&config, "aws_db_instance", "parameter_group_name").unwrap();
        let names: Vec<&str> = values.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(names, vec!["literal", "from-default"]);
        assert_eq!(values[0].location.line, 8);
        assert_eq!(values[1].location.line, 12);
    }

    #[test]
    fn test_declared_values_use_overrides() {
        let src = "variable \"group\" {}\nresource \"aws_db_instance\" \"a\" {\n  parameter_group_name = \"${var.group}-pg\"\n}\n";
        let overrides = [("group".to_string(), Value::from("prod"))].into_iter().collect();
        let (_dir, config) = resolve_with(src, overrides).unwrap();
        let values = declared_values(&config, "aws_db_instance", "parameter_group_name").unwrap();
        assert_eq!(values[0].value, "prod-pg");
    }
}
