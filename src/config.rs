//! Configuration module for tfprobe.
//!
//! This module handles loading and validating configuration from:
//! - YAML configuration files (`tfprobe.yaml`)
//! - Environment variables
//! - CLI arguments
//!
//! # Configuration File Format
//!
//! ```yaml
//! # tfprobe.yaml
//!
//! lint:
//!   deep_check: false
//!   var_files:
//!     - prod.tfvars
//!   ignore_rules:
//!     - aws_instance_invalid_type
//!   ignore_modules:
//!     - "git::*"
//!
//! deep_check:
//!   inventory_file: inventory.yaml
//!   # inventory_url: https://inventory.internal/api
//!   token: ${INVENTORY_TOKEN}  # Environment variable expansion
//!   timeout_secs: 30
//!
//! rules:
//!   aws_instance_invalid_key_name:
//!     enabled: false
//!   aws_instance_invalid_type:
//!     severity: warning
//!
//! output:
//!   colored: true
//!   pretty: true
//! ```

use crate::cloud::DEFAULT_TIMEOUT_SECS;
use crate::error::{Result, TfProbeError};
use crate::state::DEFAULT_STATE_FILE;
use crate::tree::DEFAULT_MODULES_DIR;
use crate::types::Severity;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

/// Default configuration file names, searched in order.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["tfprobe.yaml", "tfprobe.yml", ".tfprobe.yaml"];

static BRACED_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid regex"));

static BARE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid regex"));

/// Lint options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintOptions {
    /// Run detectors that query live resources.
    pub deep_check: bool,

    /// Variables files, applied after `terraform.tfvars`.
    pub var_files: Vec<PathBuf>,

    /// Load `terraform.tfvars` from the root module if present.
    pub auto_load_tfvars: bool,

    /// Detectors to skip.
    pub ignore_rules: Vec<String>,

    /// Module sources to skip (glob patterns).
    pub ignore_modules: Vec<String>,

    /// Module cache directory, relative to the root module.
    pub modules_dir: PathBuf,

    /// State file, relative to the root module.
    pub state_file: PathBuf,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            deep_check: false,
            var_files: Vec::new(),
            auto_load_tfvars: true,
            ignore_rules: Vec::new(),
            ignore_modules: Vec::new(),
            modules_dir: PathBuf::from(DEFAULT_MODULES_DIR),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }
}

/// Where deep checks read live resource names from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepCheckOptions {
    /// Inventory file (YAML or JSON).
    pub inventory_file: Option<PathBuf>,

    /// Inventory service base URL.
    pub inventory_url: Option<String>,

    /// Bearer token for the inventory service.
    pub token: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DeepCheckOptions {
    fn default() -> Self {
        Self {
            inventory_file: None,
            inventory_url: None,
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl DeepCheckOptions {
    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load the token from `TFPROBE_INVENTORY_TOKEN` if not configured.
    pub fn load_from_env(&mut self) {
        if self.token.is_none() {
            if let Ok(token) = std::env::var("TFPROBE_INVENTORY_TOKEN") {
                if !token.is_empty() {
                    tracing::debug!("Loaded inventory token from TFPROBE_INVENTORY_TOKEN environment variable");
                    self.token = Some(token);
                }
            }
        }
    }
}

/// Per-rule settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOptions {
    /// Whether the rule runs.
    pub enabled: bool,

    /// Severity override (`error`, `warning`, `notice`).
    pub severity: Option<String>,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: None,
        }
    }
}

/// Output options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Use colored output.
    pub colored: bool,

    /// Verbose output mode.
    pub verbose: bool,

    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            colored: true,
            verbose: false,
            pretty: true,
        }
    }
}

/// Main configuration structure with nested sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lint options
    pub lint: LintOptions,

    /// Deep check options
    pub deep_check: DeepCheckOptions,

    /// Per-rule settings by detector name
    pub rules: BTreeMap<String, RuleOptions>,

    /// Output options
    pub output: OutputOptions,
}

impl Config {
    /// Load configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or a value is out of range.
    pub fn from_yaml(content: &str) -> Result<Self> {
        tracing::debug!("Parsing configuration from YAML");
        let expanded = expand_env_vars(content);

        let config: Self = serde_yaml::from_str(&expanded).map_err(|e| {
            TfProbeError::config_parse(e.to_string(), Some(Box::new(e)), file!(), line!())
        })?;
        config.validate()?;

        tracing::debug!(
            deep_check = config.lint.deep_check,
            rules = config.rules.len(),
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    /// Check values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigValue` error for an unknown severity, an invalid
    /// module pattern, or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        self.severity_overrides()?;
        for pattern in &self.lint.ignore_modules {
            glob::Pattern::new(pattern).map_err(|e| {
                crate::err!(ConfigValue {
                    key: "lint.ignore_modules".to_string(),
                    message: format!("invalid pattern \"{pattern}\": {e}"),
                })
            })?;
        }
        if self.deep_check.timeout_secs == 0 {
            return Err(crate::err!(ConfigValue {
                key: "deep_check.timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            }));
        }
        Ok(())
    }

    /// Detectors disabled by `lint.ignore_rules` or `rules.<name>.enabled`.
    #[must_use]
    pub fn disabled_rules(&self) -> Vec<String> {
        let mut disabled = self.lint.ignore_rules.clone();
        for (name, rule) in &self.rules {
            if !rule.enabled && !disabled.contains(name) {
                disabled.push(name.clone());
            }
        }
        disabled
    }

    /// Severity overrides from `rules.<name>.severity`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigValue` error for an unknown severity name.
    pub fn severity_overrides(&self) -> Result<HashMap<String, Severity>> {
        let mut overrides = HashMap::new();
        for (name, rule) in &self.rules {
            if let Some(raw) = &rule.severity {
                let severity = Severity::parse(raw).ok_or_else(|| {
                    crate::err!(ConfigValue {
                        key: format!("rules.{name}.severity"),
                        message: format!("unknown severity \"{raw}\" (expected error, warning or notice)"),
                    })
                })?;
                overrides.insert(name.clone(), severity);
            }
        }
        Ok(overrides)
    }

    /// Generate an example YAML configuration.
    #[must_use]
    pub fn example_yaml() -> String {
        r#"# tfprobe configuration file

# Lint options
lint:
  # Query live resources to check that referenced names exist
  deep_check: false

  # Variables files applied after terraform.tfvars, later files win
  var_files: []
  #  - prod.tfvars

  # Load terraform.tfvars from the root module automatically
  auto_load_tfvars: true

  # Detectors to skip
  ignore_rules: []

  # Module calls whose source matches one of these patterns are not loaded
  ignore_modules: []
  #  - "git::*"

  # Where `terraform init` installs modules, relative to the root module
  modules_dir: .terraform/modules

  # State snapshot, relative to the root module (optional)
  state_file: terraform.tfstate

# Live resource inventory used by deep checks
deep_check:
  # YAML or JSON map of kind -> names
  # inventory_file: inventory.yaml

  # Service answering GET {url}/{kind} with a JSON array of names
  # inventory_url: https://inventory.example.com/api
  # token: ${TFPROBE_INVENTORY_TOKEN}

  timeout_secs: 30

# Per-rule settings
rules: {}
#  aws_instance_invalid_type:
#    severity: warning
#  aws_instance_invalid_key_name:
#    enabled: false

# Output options
output:
  # Use colored output in terminal
  colored: true

  # Show every module instance in text reports
  verbose: false

  # Pretty-print JSON output
  pretty: true
"#
        .to_string()
    }

    /// Merge CLI arguments into the configuration.
    pub fn merge_cli_args(&mut self, args: &crate::cli::LintArgs) {
        if args.deep {
            self.lint.deep_check = true;
        }
        self.lint.var_files.extend(args.var_files.iter().cloned());
        if args.no_auto_tfvars {
            self.lint.auto_load_tfvars = false;
        }
        for rule in &args.ignore_rules {
            if !self.lint.ignore_rules.contains(rule) {
                self.lint.ignore_rules.push(rule.clone());
            }
        }
        self.lint.ignore_modules.extend(args.ignore_modules.iter().cloned());
        if let Some(dir) = &args.modules_dir {
            self.lint.modules_dir.clone_from(dir);
        }
        if let Some(state) = &args.state {
            self.lint.state_file.clone_from(state);
        }
        if let Some(file) = &args.inventory_file {
            self.deep_check.inventory_file = Some(file.clone());
        }
        if let Some(url) = &args.inventory_url {
            self.deep_check.inventory_url = Some(url.clone());
        }
        if args.no_color {
            self.output.colored = false;
        }
    }

    /// Load secrets from environment variables.
    pub fn load_from_env(&mut self) {
        self.deep_check.load_from_env();
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. Unset variables are left as written.
fn expand_env_vars(content: &str) -> String {
    let expand = |caps: &regex::Captures<'_>| std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string());
    let braced = BRACED_VAR.replace_all(content, expand);
    BARE_VAR.replace_all(&braced, expand).into_owned()
}
