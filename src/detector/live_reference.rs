//! Deep checks for attributes that name existing live resources.

use super::{declared_values, Detector, DetectorInput};
use crate::cloud::LiveResourceKind;
use crate::error::Result;
use crate::types::Issue;
use async_trait::async_trait;
use std::collections::HashSet;

/// Flags names that match no live resource of the referenced kind.
///
/// Names recorded in state for `managed_type` also count as existing, so a
/// resource created by the same configuration is not reported.
#[derive(Debug, Clone)]
pub struct LiveReferenceDetector {
    name: &'static str,
    description: &'static str,
    resource_type: &'static str,
    attribute: &'static str,
    kind: LiveResourceKind,
    managed_type: &'static str,
    managed_attribute: &'static str,
    noun: &'static str,
}

impl LiveReferenceDetector {
    /// `aws_db_instance.parameter_group_name`
    #[must_use]
    pub const fn db_parameter_group() -> Self {
        Self {
            name: "aws_db_instance_invalid_parameter_group",
            description: "DB parameter group must exist",
            resource_type: "aws_db_instance",
            attribute: "parameter_group_name",
            kind: LiveResourceKind::DbParameterGroups,
            managed_type: "aws_db_parameter_group",
            managed_attribute: "name",
            noun: "parameter group name",
        }
    }

    /// `aws_db_instance.db_subnet_group_name`
    #[must_use]
    pub const fn db_subnet_group() -> Self {
        Self {
            name: "aws_db_instance_invalid_db_subnet_group",
            description: "DB subnet group must exist",
            resource_type: "aws_db_instance",
            attribute: "db_subnet_group_name",
            kind: LiveResourceKind::DbSubnetGroups,
            managed_type: "aws_db_subnet_group",
            managed_attribute: "name",
            noun: "DB subnet group name",
        }
    }

    /// `aws_instance.key_name`
    #[must_use]
    pub const fn key_pair() -> Self {
        Self {
            name: "aws_instance_invalid_key_name",
            description: "Key pair must exist",
            resource_type: "aws_instance",
            attribute: "key_name",
            kind: LiveResourceKind::KeyPairs,
            managed_type: "aws_key_pair",
            managed_attribute: "key_name",
            noun: "key name",
        }
    }
}

#[async_trait]
impl Detector for LiveReferenceDetector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn is_deep(&self) -> bool {
        true
    }

    async fn run(&self, input: &DetectorInput<'_>) -> Result<Vec<Issue>> {
        if !input.run.deep_check {
            return Ok(Vec::new());
        }

        let declared = declared_values(input.config, self.resource_type, self.attribute)?;
        if declared.is_empty() {
            return Ok(Vec::new());
        }

        let cloud = input.cloud.ok_or_else(|| {
            crate::err!(ConfigMissing {
                key: "deep_check.inventory_file or deep_check.inventory_url".to_string(),
            })
        })?;

        let mut existing: HashSet<String> = cloud.list_names(self.kind).await?.into_iter().collect();
        if let Some(state) = input.state {
            existing.extend(state.attribute_values(self.managed_type, self.managed_attribute));
        }
        tracing::debug!(detector = self.name, declared = declared.len(), existing = existing.len(), "Comparing names");

        let severity = input.run.severity_for(self);
        Ok(declared
            .into_iter()
            .filter(|d| !existing.contains(&d.value))
            .map(|d| {
                Issue::new(
                    self.name,
                    severity,
                    format!("\"{}\" is invalid {}.", d.value, self.noun),
                    &d.location,
                )
            })
            .collect())
    }
}
