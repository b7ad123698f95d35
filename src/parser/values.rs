//! Root module variable overrides.
//!
//! Overrides come from three places, lowest precedence first:
//!
//! 1. `TF_VAR_<name>` environment variables (always strings)
//! 2. variables files: `terraform.tfvars` in the root directory when it
//!    exists, then every `--var-file` in the order given
//! 3. `--var name=value` arguments (always strings)
//!
//! Later sources replace earlier ones by exact name. Variables files may
//! only contain literal values.

use crate::error::{Result, TfProbeError};
use crate::eval::{references_in_expr, EvaluationContext, Evaluator, ModulePath};
use crate::parser::{Attribute, ConfigLoader, DEFAULT_VALUES_FILE};
use crate::value::Value;
use crate::workspace::DEFAULT_WORKSPACE;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Prefix of environment variables that set root variables.
pub const ENV_VAR_PREFIX: &str = "TF_VAR_";

/// Override values by variable name.
pub type Overrides = IndexMap<String, Value>;

/// Where root overrides are read from.
#[derive(Debug, Clone, Default)]
pub struct ValueSources {
    /// Load `terraform.tfvars` from the root directory if present
    pub auto_load: bool,
    /// Additional variables files, in precedence order
    pub var_files: Vec<PathBuf>,
    /// Raw `name=value` assignments
    pub cli_vars: Vec<String>,
    /// Environment variables to scan for `TF_VAR_` entries
    pub env: Vec<(String, String)>,
}

impl ValueSources {
    /// Sources with `terraform.tfvars` auto-loading and the process environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self {
            auto_load: true,
            env: std::env::vars().collect(),
            ..Self::default()
        }
    }

    /// Collect all overrides for the root module rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variables file is missing or not literal, or a
    /// `--var` assignment is malformed.
    pub fn collect(&self, loader: &dyn ConfigLoader, root: &Path) -> Result<Overrides> {
        let mut overrides = env_overrides(&self.env);

        let mut files = Vec::new();
        let default_file = root.join(DEFAULT_VALUES_FILE);
        if self.auto_load && default_file.is_file() {
            files.push(default_file);
        }
        files.extend(self.var_files.iter().cloned());

        for file in &files {
            let raw = loader.load_values_file(file)?;
            let values = literal_values(file, &raw)?;
            tracing::debug!(file = %file.display(), count = values.len(), "Loaded variables file");
            overrides.extend(values);
        }

        for assignment in &self.cli_vars {
            let (name, value) = parse_assignment(assignment)?;
            overrides.insert(name, value);
        }

        Ok(overrides)
    }
}

/// `TF_VAR_<name>` entries as string overrides.
#[must_use]
pub fn env_overrides(env: &[(String, String)]) -> Overrides {
    env.iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(ENV_VAR_PREFIX)?;
            (!name.is_empty()).then(|| (name.to_string(), Value::String(value.clone())))
        })
        .collect()
}

/// Parse a `name=value` assignment.
///
/// # Errors
///
/// Returns a `ConfigValue` error if there is no `=` or the name is empty.
pub fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
    match assignment.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), Value::String(value.to_string())))
        }
        _ => Err(crate::err!(ConfigValue {
            key: "var".to_string(),
            message: format!("expected name=value, got \"{assignment}\""),
        })),
    }
}

/// Evaluate the attributes of a variables file.
///
/// # Errors
///
/// Returns a `ValuesFile` error if any value references another symbol or
/// fails to evaluate.
pub fn literal_values(file: &Path, raw: &IndexMap<String, Attribute>) -> Result<Overrides> {
    let ctx = EvaluationContext::meta_only(ModulePath::root(), DEFAULT_WORKSPACE);
    let evaluator = Evaluator::new(&ctx);
    let mut values = Overrides::new();

    for (name, attr) in raw {
        let invalid = |message: String| -> TfProbeError {
            crate::err!(ValuesFile {
                file: file.to_path_buf(),
                message: format!("{name} (line {}): {message}", attr.location.line),
            })
        };
        let references = references_in_expr(&attr.expr).map_err(|e| invalid(e.to_string()))?;
        if let Some(reference) = references.first() {
            return Err(invalid(format!("variables may not be used here ({reference})")));
        }
        let evaluated = evaluator.evaluate(&attr.expr).map_err(|e| invalid(e.to_string()))?;
        for diag in &evaluated.diagnostics {
            tracing::warn!(file = %file.display(), variable = %name, "{diag}");
        }
        values.insert(name.clone(), evaluated.value);
    }

    Ok(values)
}
