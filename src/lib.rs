//! # tfprobe
//!
//! A Terraform configuration linter with live resource checks.
//!
//! tfprobe loads a root module and every module it calls, resolves input
//! variable values down the module tree, and runs detectors over the
//! resolved configuration. Some detectors ("deep checks") compare
//! attribute values with the names of resources that actually exist.
//!
//! ## Features
//!
//! - **HCL loading**: Variables, managed resources and module calls with
//!   source locations
//! - **Module tree**: Child modules located through the `terraform init`
//!   module cache
//! - **Variable resolution**: Defaults, variables files, `--var` and
//!   `TF_VAR_` overrides, propagated through module call arguments
//! - **Deep checks**: Referenced names checked against an inventory file
//!   or inventory service
//! - **Multiple output formats**: Plain text and JSON reports, DOT, JSON
//!   and Mermaid module trees
//!
//! ## Example
//!
//! ```rust,no_run
//! use tfprobe::{Config, Linter};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let linter = Linter::new(Config::default())?;
//!     let result = linter.lint(Path::new("./infra"), &[]).await?;
//!
//!     for issue in &result.report.issues {
//!         println!("{}:{} {}", issue.file.display(), issue.line, issue.message);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod cli;
pub mod cloud;
pub mod config;
pub mod detector;
pub mod error;
pub mod eval;
pub mod parser;
pub mod reporter;
pub mod resolve;
pub mod state;
pub mod tree;
pub mod types;
pub mod value;
pub mod workspace;

// Re-export commonly used types at crate root
pub use config::Config;
pub use detector::{DetectorFailure, DetectorRegistry, RunReport};
pub use error::{Result, TfProbeError};
pub use resolve::ResolvedConfig;
pub use types::{GraphFormat, Issue, Location, ReportFormat, Severity};
pub use value::Value;

use cloud::{CloudApi, HttpInventory, InventoryFile};
use detector::{DetectorConfig, DetectorInput};
use parser::values::ValueSources;
use parser::HclLoader;
use resolve::Resolver;
use serde::Serialize;
use state::StateSnapshot;
use std::path::{Path, PathBuf};
use tree::{ConfigTree, ModuleTreeBuilder};

/// Outcome of one lint run.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    /// Root module directory
    pub root: PathBuf,
    /// Workspace the configuration was evaluated in
    pub workspace: String,
    /// Number of module instances in the tree
    pub modules: usize,
    /// Whether deep checks ran
    pub deep_check: bool,
    /// Detectors that were enabled
    pub detectors: Vec<String>,
    /// Issues and detector failures
    pub report: RunReport,
}

impl LintResult {
    /// Returns true if any detector could not complete.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.report.failures.is_empty()
    }

    /// Returns true if any issue was reported.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        !self.report.issues.is_empty()
    }
}

/// Main lint orchestrator.
///
/// The `Linter` is the primary entry point for using tfprobe as a library.
/// It handles:
/// - Loading the module tree from the module cache
/// - Collecting root variable overrides
/// - Resolving every module instance
/// - Building the live lookup capability and running detectors
pub struct Linter {
    config: Config,
    registry: DetectorRegistry,
}

impl Linter {
    /// Create a linter with every built-in detector the configuration
    /// leaves enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration holds an invalid value.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let mut registry = DetectorRegistry::with_builtin();
        registry.disable(&config.disabled_rules());
        Ok(Self { config, registry })
    }

    /// Create a linter with a custom registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration holds an invalid value.
    pub fn with_registry(config: Config, registry: DetectorRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, registry })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The detectors that will run.
    #[must_use]
    pub const fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    /// Build the module tree rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a directory or a module fails to
    /// load.
    pub fn tree(&self, root: &Path) -> Result<ConfigTree> {
        if !root.is_dir() {
            return Err(crate::err!(DirectoryNotFound {
                path: root.to_path_buf(),
            }));
        }
        let loader = HclLoader::new();
        ModuleTreeBuilder::new(&loader)
            .with_modules_dir(&self.config.lint.modules_dir)
            .with_ignored_sources(&self.config.lint.ignore_modules)?
            .build(root)
    }

    /// Load and resolve the configuration rooted at `root`.
    ///
    /// `cli_vars` are `name=value` assignments with the highest precedence.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, override collection or resolution fails.
    pub fn load(&self, root: &Path, cli_vars: &[String]) -> Result<ResolvedConfig> {
        let workspace = workspace::detect(root);
        tracing::info!(root = %root.display(), workspace = %workspace, "Loading configuration");

        let tree = self.tree(root)?;
        let sources = ValueSources {
            auto_load: self.config.lint.auto_load_tfvars,
            var_files: self.config.lint.var_files.clone(),
            cli_vars: cli_vars.to_vec(),
            ..ValueSources::from_process_env()
        };
        let overrides = sources.collect(&HclLoader::new(), root)?;
        tracing::debug!(overrides = overrides.len(), modules = tree.len(), "Resolving module tree");

        Resolver::new(workspace).resolve(tree, &overrides)
    }

    /// Build the live lookup capability deep checks need.
    ///
    /// Returns `None` when deep checks are off.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigMissing` error when deep checks are on and no
    /// inventory is configured, or an error from opening the inventory.
    pub fn cloud_api(&self) -> Result<Option<Box<dyn CloudApi>>> {
        if !self.config.lint.deep_check {
            return Ok(None);
        }
        let options = &self.config.deep_check;
        if let Some(path) = &options.inventory_file {
            tracing::info!(path = %path.display(), "Using inventory file for deep checks");
            return Ok(Some(Box::new(InventoryFile::load(path)?)));
        }
        if let Some(url) = &options.inventory_url {
            tracing::info!(url = %url, "Using inventory service for deep checks");
            let client = HttpInventory::new(url, options.timeout())?.with_token(options.token.clone());
            return Ok(Some(Box::new(client)));
        }
        Err(crate::err!(ConfigMissing {
            key: "deep_check.inventory_file or deep_check.inventory_url".to_string(),
        }))
    }

    /// Lint the configuration rooted at `root`.
    ///
    /// Detector failures are reported in the result, not returned as
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded, the state
    /// file is invalid, or deep checks are on without an inventory.
    pub async fn lint(&self, root: &Path, cli_vars: &[String]) -> Result<LintResult> {
        let cloud = self.cloud_api()?;
        let resolved = self.load(root, cli_vars)?;
        let state = StateSnapshot::load(&root.join(&self.config.lint.state_file))?;

        let run = DetectorConfig {
            deep_check: self.config.lint.deep_check,
            severity_overrides: self.config.severity_overrides()?,
        };
        let input = DetectorInput {
            config: &resolved,
            state: state.as_ref(),
            run: &run,
            cloud: cloud.as_deref(),
        };
        let report = self.registry.run(&input).await;

        Ok(LintResult {
            root: root.to_path_buf(),
            workspace: resolved.workspace.clone(),
            modules: resolved.instances.len(),
            deep_check: run.deep_check,
            detectors: self.registry.iter().map(|d| d.name().to_string()).collect(),
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_linter_creation() {
        let mut config = Config::default();
        config.lint.ignore_rules.push("aws_instance_invalid_type".to_string());
        let linter = Linter::new(config).unwrap();
        assert_eq!(linter.registry().len(), 3);
        assert!(linter.registry().get("aws_instance_invalid_type").is_none());
    }

    #[test]
    fn test_deep_check_requires_inventory() {
        let mut config = Config::default();
        config.lint.deep_check = true;
        let linter = Linter::new(config).unwrap();
        assert!(matches!(linter.cloud_api(), Err(TfProbeError::ConfigMissing { .. })));
    }

    #[test]
    fn test_missing_root() {
        let linter = Linter::new(Config::default()).unwrap();
        let err = linter.tree(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, TfProbeError::DirectoryNotFound { .. }));
    }

    #[tokio::test]
    async fn test_lint_applies_cli_vars() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("main.tf"),
            r#"
variable "instance_type" {
  default = "t2.micro"
}

resource "aws_instance" "web" {
  instance_type = var.instance_type
}
"#,
        )
        .unwrap();
        let linter = Linter::new(Config::default()).unwrap();

        let clean = linter.lint(dir.path(), &[]).await.unwrap();
        assert!(clean.report.is_clean());
        assert_eq!(clean.modules, 1);

        let result = linter
            .lint(dir.path(), &["instance_type=t9.huge".to_string()])
            .await
            .unwrap();
        assert_eq!(result.report.issues.len(), 1);
        assert_eq!(result.report.issues[0].message, "\"t9.huge\" is invalid instance type.");
        assert!(result.has_issues());
        assert!(!result.has_failures());
    }
}
