//! Optional state snapshot (`terraform.tfstate`).
//!
//! Resources that are declared in the configuration but not created yet do
//! not exist in the cloud. When a state file is present, names it records
//! for a managed resource type count as existing during deep checks.
//!
//! Both the current (version 4) and the legacy (version 3) JSON layouts are
//! understood.

use crate::error::{Result, TfProbeError};
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Default state file name, relative to the root module.
pub const DEFAULT_STATE_FILE: &str = "terraform.tfstate";

/// A resource instance recorded in state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateResource {
    /// Resource type
    pub resource_type: String,
    /// Resource name
    pub name: String,
    /// Module address (`None` for the root module)
    pub module: Option<String>,
    /// Flat attribute map of the instance
    pub attributes: Map<String, Json>,
}

/// Parsed state snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    /// State format version
    pub version: u64,
    /// Managed resource instances
    pub resources: Vec<StateResource>,
}

#[derive(Deserialize)]
struct VersionProbe {
    #[serde(default)]
    version: u64,
}

#[derive(Deserialize)]
struct StateV4 {
    #[serde(default)]
    resources: Vec<ResourceV4>,
}

#[derive(Deserialize)]
struct ResourceV4 {
    #[serde(default)]
    mode: String,
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    instances: Vec<InstanceV4>,
}

#[derive(Deserialize)]
struct InstanceV4 {
    #[serde(default)]
    attributes: Map<String, Json>,
}

#[derive(Deserialize)]
struct StateV3 {
    #[serde(default)]
    modules: Vec<ModuleV3>,
}

#[derive(Deserialize)]
struct ModuleV3 {
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    resources: BTreeMap<String, ResourceV3>,
}

#[derive(Deserialize)]
struct ResourceV3 {
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(default)]
    primary: Option<PrimaryV3>,
}

#[derive(Deserialize)]
struct PrimaryV3 {
    #[serde(default)]
    id: String,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl StateSnapshot {
    /// Load a state file, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No state file");
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| TfProbeError::io(path, e, file!(), line!()))?;
        let snapshot = Self::parse(&content).map_err(|message| {
            crate::err!(StateParse {
                file: path.to_path_buf(),
                message,
            })
        })?;
        tracing::info!(
            path = %path.display(),
            version = snapshot.version,
            resources = snapshot.resources.len(),
            "Loaded state snapshot"
        );
        Ok(Some(snapshot))
    }

    /// Parse state JSON.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the document is not valid state.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let probe: VersionProbe = serde_json::from_str(content).map_err(|e| e.to_string())?;
        match probe.version {
            4 => {
                let state: StateV4 = serde_json::from_str(content).map_err(|e| e.to_string())?;
                let resources = state
                    .resources
                    .into_iter()
                    .filter(|r| r.mode.is_empty() || r.mode == "managed")
                    .flat_map(|r| {
                        let ResourceV4 {
                            resource_type,
                            name,
                            module,
                            instances,
                            ..
                        } = r;
                        instances.into_iter().map(move |i| StateResource {
                            resource_type: resource_type.clone(),
                            name: name.clone(),
                            module: module.clone(),
                            attributes: i.attributes,
                        })
                    })
                    .collect();
                Ok(Self { version: 4, resources })
            }
            3 => {
                let state: StateV3 = serde_json::from_str(content).map_err(|e| e.to_string())?;
                let mut resources = Vec::new();
                for module in state.modules {
                    let module_addr = module_address_v3(&module.path);
                    for (key, resource) in module.resources {
                        // data sources are keyed "data.<type>.<name>"
                        if key.starts_with("data.") {
                            continue;
                        }
                        let name = key.rsplit('.').next().unwrap_or_default().to_string();
                        let mut attributes = Map::new();
                        if let Some(primary) = resource.primary {
                            attributes.insert("id".to_string(), Json::String(primary.id));
                            for (k, v) in primary.attributes {
                                attributes.insert(k, Json::String(v));
                            }
                        }
                        resources.push(StateResource {
                            resource_type: resource.resource_type,
                            name,
                            module: module_addr.clone(),
                            attributes,
                        });
                    }
                }
                Ok(Self { version: 3, resources })
            }
            other => Err(format!("unsupported state version {other}")),
        }
    }

    /// Values of `attribute` recorded for every instance of `resource_type`.
    #[must_use]
    pub fn attribute_values(&self, resource_type: &str, attribute: &str) -> BTreeSet<String> {
        self.resources
            .iter()
            .filter(|r| r.resource_type == resource_type)
            .filter_map(|r| r.attributes.get(attribute))
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

fn module_address_v3(path: &[String]) -> Option<String> {
    let rest = path.get(1..).filter(|rest| !rest.is_empty())?;
    Some(
        rest.iter()
            .map(|name| format!("module.{name}"))
            .collect::<Vec<_>>()
            .join("."),
    )
}
