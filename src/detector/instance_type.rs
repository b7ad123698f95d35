//! Static check of EC2 instance types.

use super::{declared_values, Detector, DetectorInput};
use crate::error::Result;
use crate::types::Issue;
use async_trait::async_trait;

const BURSTABLE: &[&str] = &["nano", "micro", "small", "medium", "large", "xlarge", "2xlarge"];
const GENERAL_5: &[&str] = &["large", "xlarge", "2xlarge", "4xlarge", "8xlarge", "12xlarge", "16xlarge", "24xlarge", "metal"];
const GENERAL_6: &[&str] = &["medium", "large", "xlarge", "2xlarge", "4xlarge", "8xlarge", "12xlarge", "16xlarge", "metal"];

/// Instance families and the sizes each offers.
const INSTANCE_FAMILIES: &[(&str, &[&str])] = &[
    ("t1", &["micro"]),
    ("t2", BURSTABLE),
    ("t3", BURSTABLE),
    ("t3a", BURSTABLE),
    ("t4g", BURSTABLE),
    ("m1", &["small", "medium", "large", "xlarge"]),
    ("m3", &["medium", "large", "xlarge", "2xlarge"]),
    ("m4", &["large", "xlarge", "2xlarge", "4xlarge", "10xlarge", "16xlarge"]),
    ("m5", GENERAL_5),
    ("m5a", GENERAL_5),
    ("m6g", GENERAL_6),
    ("m6i", &["large", "xlarge", "2xlarge", "4xlarge", "8xlarge", "12xlarge", "16xlarge", "24xlarge", "32xlarge", "metal"]),
    ("c3", &["large", "xlarge", "2xlarge", "4xlarge", "8xlarge"]),
    ("c4", &["large", "xlarge", "2xlarge", "4xlarge", "8xlarge"]),
    ("c5", &["large", "xlarge", "2xlarge", "4xlarge", "9xlarge", "12xlarge", "18xlarge", "24xlarge", "metal"]),
    ("c6g", GENERAL_6),
    ("r3", &["large", "xlarge", "2xlarge", "4xlarge", "8xlarge"]),
    ("r4", &["large", "xlarge", "2xlarge", "4xlarge", "8xlarge", "16xlarge"]),
    ("r5", GENERAL_5),
    ("r6g", GENERAL_6),
    ("i3", &["large", "xlarge", "2xlarge", "4xlarge", "8xlarge", "16xlarge", "metal"]),
    ("d2", &["xlarge", "2xlarge", "4xlarge", "8xlarge"]),
    ("g4dn", &["xlarge", "2xlarge", "4xlarge", "8xlarge", "12xlarge", "16xlarge", "metal"]),
    ("p3", &["2xlarge", "8xlarge", "16xlarge"]),
    ("x1", &["16xlarge", "32xlarge"]),
];

/// Returns true if `instance_type` is a known `family.size` pair.
#[must_use]
pub fn is_known_instance_type(instance_type: &str) -> bool {
    let Some((family, size)) = instance_type.split_once('.') else {
        return false;
    };
    INSTANCE_FAMILIES
        .iter()
        .any(|(f, sizes)| *f == family && sizes.contains(&size))
}

/// Flags `aws_instance.instance_type` values that are not known types.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceTypeDetector;

#[async_trait]
impl Detector for InstanceTypeDetector {
    fn name(&self) -> &'static str {
        "aws_instance_invalid_type"
    }

    fn description(&self) -> &'static str {
        "Instance type must be a known EC2 type"
    }

    async fn run(&self, input: &DetectorInput<'_>) -> Result<Vec<Issue>> {
        let severity = input.run.severity_for(self);
        Ok(declared_values(input.config, "aws_instance", "instance_type")?
            .into_iter()
            .filter(|d| !is_known_instance_type(&d.value))
            .map(|d| {
                Issue::new(
                    self.name(),
                    severity,
                    format!("\"{}\" is invalid instance type.", d.value),
                    &d.location,
                )
            })
            .collect())
    }
}
