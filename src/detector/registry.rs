//! Detector registration and execution.

use super::{Detector, DetectorInput, InstanceTypeDetector, LiveReferenceDetector};
use crate::types::Issue;
use futures::future::join_all;
use serde::Serialize;

/// A detector that could not complete.
///
/// This is not a finding about the configuration: it means the check
/// could not be performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectorFailure {
    /// Detector name
    pub detector: String,
    /// What went wrong
    pub message: String,
    /// Whether the failure came from a live lookup
    pub external: bool,
}

/// Outcome of running every registered detector once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Issues, grouped by detector in registration order
    pub issues: Vec<Issue>,
    /// Detectors that failed
    pub failures: Vec<DetectorFailure>,
}

impl RunReport {
    /// No issues and no failures.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.failures.is_empty()
    }
}

/// Ordered set of detectors.
#[derive(Default)]
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in detector.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(LiveReferenceDetector::db_parameter_group()));
        registry.register(Box::new(LiveReferenceDetector::db_subnet_group()));
        registry.register(Box::new(LiveReferenceDetector::key_pair()));
        registry.register(Box::new(InstanceTypeDetector));
        registry
    }

    /// Append a detector. Detectors run and report in registration order.
    pub fn register(&mut self, detector: Box<dyn Detector>) {
        if self.get(detector.name()).is_some() {
            tracing::warn!(detector = detector.name(), "Replacing detector registered twice");
            self.detectors.retain(|d| d.name() != detector.name());
        }
        self.detectors.push(detector);
    }

    /// Remove detectors by name. Unknown names are logged.
    pub fn disable(&mut self, names: &[String]) {
        for name in names {
            if self.get(name).is_none() {
                tracing::warn!(detector = %name, "Cannot disable unknown detector");
            }
        }
        self.detectors.retain(|d| !names.iter().any(|n| n == d.name()));
    }

    /// Look up a detector by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Detector> {
        self.detectors.iter().find(|d| d.name() == name).map(|d| &**d)
    }

    /// Registered detectors in order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Detector> {
        self.detectors.iter().map(|d| &**d)
    }

    /// Number of registered detectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Run every detector concurrently.
    ///
    /// Deep detectors are skipped when deep checks are off. A failing
    /// detector is recorded in [`RunReport::failures`] and does not stop
    /// the others.
    pub async fn run(&self, input: &DetectorInput<'_>) -> RunReport {
        let active: Vec<&dyn Detector> = self
            .iter()
            .filter(|d| {
                let skip = d.is_deep() && !input.run.deep_check;
                if skip {
                    tracing::debug!(detector = d.name(), "Skipping deep check");
                }
                !skip
            })
            .collect();

        let results = join_all(active.iter().map(|d| async move {
            tracing::debug!(detector = d.name(), "Running detector");
            (d.name(), d.run(input).await)
        }))
        .await;

        let mut report = RunReport::default();
        for (name, result) in results {
            match result {
                Ok(issues) => {
                    tracing::debug!(detector = name, issues = issues.len(), "Detector finished");
                    report.issues.extend(issues);
                }
                Err(e) => {
                    tracing::error!(detector = name, error = %e, "Detector failed");
                    report.failures.push(DetectorFailure {
                        detector: name.to_string(),
                        message: e.to_string(),
                        external: e.is_external(),
                    });
                }
            }
        }

        tracing::info!(
            detectors = active.len(),
            issues = report.issues.len(),
            failures = report.failures.len(),
            "Detectors completed"
        );
        report
    }
}
