//! Per module-instance evaluation contexts.

use crate::value::Value;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Address of a module instance: the chain of call names from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    /// The root module.
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// The path of a module called `name` from this module.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    /// The calling module's path, `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    /// Returns true for the root module.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Call names from the root down.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Nesting depth (0 for the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "module.{name}")?;
        }
        Ok(())
    }
}

impl Serialize for ModulePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Resolved input variable values of one module instance.
///
/// The map is built completely and then frozen behind an [`Arc`]; clones
/// share the same snapshot and there is no way to mutate it afterwards, so
/// detectors may read it from any number of tasks without locking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableValues(Arc<IndexMap<String, Value>>);

impl VariableValues {
    /// Publish a fully built map.
    #[must_use]
    pub fn new(values: IndexMap<String, Value>) -> Self {
        Self(Arc::new(values))
    }

    /// Look up a variable's value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns true if the variable is present, even if unknown.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for VariableValues {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Everything an expression may read while being evaluated.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    /// Module instance the expression belongs to
    pub module_path: ModulePath,
    /// Input variable values, `None` where variables may not be referenced
    pub variables: Option<VariableValues>,
    /// Active workspace name
    pub workspace: String,
}

impl EvaluationContext {
    /// A context for expressions inside a module instance.
    #[must_use]
    pub fn new(module_path: ModulePath, variables: VariableValues, workspace: impl Into<String>) -> Self {
        Self {
            module_path,
            variables: Some(variables),
            workspace: workspace.into(),
        }
    }

    /// A context exposing only module meta-attributes, used for variable
    /// defaults and variables files.
    #[must_use]
    pub fn meta_only(module_path: ModulePath, workspace: impl Into<String>) -> Self {
        Self {
            module_path,
            variables: None,
            workspace: workspace.into(),
        }
    }
}
