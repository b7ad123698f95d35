//! Command-line interface module.
//!
//! This module defines the CLI structure using Clap, including
//! all commands, arguments, and options.
//!
//! # Commands
//!
//! - `lint`: Lint a root module and every module it calls
//! - `tree`: Print the module call tree
//! - `rules`: List the available detectors
//! - `init`: Create an example configuration file
//! - `validate`: Validate a configuration file
//!
//! # Example Usage
//!
//! ```bash
//! # Lint the current directory
//! tfprobe lint
//!
//! # Lint with deep checks against an inventory file
//! tfprobe lint ./infra --deep --inventory-file inventory.yaml
//!
//! # Override root variables
//! tfprobe lint --var-file prod.tfvars --var db_name=orders
//!
//! # Generate JSON report
//! tfprobe lint ./infra --format json --output report.json
//!
//! # Print the module tree as Mermaid
//! tfprobe tree ./infra --format mermaid
//! ```

use crate::types::{GraphFormat, ReportFormat};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// tfprobe - Terraform configuration linter with live resource checks.
#[derive(Parser, Debug)]
#[command(
    name = "tfprobe",
    author,
    version,
    about = "Terraform configuration linter with live resource checks",
    long_about = "tfprobe loads a Terraform root module and the modules it calls, resolves \
                  variable values down the module tree, and reports attribute values that \
                  are invalid. With --deep it also checks that referenced names exist."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "TFPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Lint a root module and the modules it calls
    #[command(visible_alias = "l")]
    Lint(LintArgs),

    /// Print the module call tree
    #[command(visible_alias = "t")]
    Tree(TreeArgs),

    /// List available detectors
    Rules,

    /// Create an example configuration file
    Init,

    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Arguments for the lint command.
#[derive(Args, Debug)]
pub struct LintArgs {
    /// Root module directory
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Run detectors that query live resources
    #[arg(long)]
    pub deep: bool,

    /// Variables file (repeatable, later files win)
    #[arg(long = "var-file", value_name = "FILE")]
    pub var_files: Vec<PathBuf>,

    /// Root variable assignment (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Do not load terraform.tfvars automatically
    #[arg(long)]
    pub no_auto_tfvars: bool,

    /// Detector to skip (repeatable)
    #[arg(long = "ignore-rule", value_name = "NAME")]
    pub ignore_rules: Vec<String>,

    /// Module source pattern to skip (repeatable, glob)
    #[arg(long = "ignore-module", value_name = "PATTERN")]
    pub ignore_modules: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "text", value_enum)]
    pub format: ReportFormat,

    /// Output file path (stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Inventory file listing live resource names
    #[arg(long, value_name = "FILE", conflicts_with = "inventory_url")]
    pub inventory_file: Option<PathBuf>,

    /// Inventory service base URL
    #[arg(long, value_name = "URL")]
    pub inventory_url: Option<String>,

    /// State file (relative to PATH)
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Module cache directory (relative to PATH)
    #[arg(long, value_name = "DIR")]
    pub modules_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for the tree command.
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Root module directory
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Output format for the tree
    #[arg(short, long, default_value = "dot", value_enum)]
    pub format: GraphFormat,

    /// Output file path (stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Module cache directory (relative to PATH)
    #[arg(long, value_name = "DIR")]
    pub modules_dir: Option<PathBuf>,
}

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(value_name = "FILE", default_value = "tfprobe.yaml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parsing() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_lint_defaults() {
        let cli = Cli::parse_from(["tfprobe", "lint"]);
        match cli.command {
            Commands::Lint(args) => {
                assert_eq!(args.path, PathBuf::from("."));
                assert!(!args.deep);
                assert_eq!(args.format, ReportFormat::Text);
                assert!(args.vars.is_empty());
            }
            _ => panic!("Expected Lint command"),
        }
    }

    #[test]
    fn test_lint_with_options() {
        let cli = Cli::parse_from([
            "tfprobe",
            "lint",
            "./infra",
            "--deep",
            "--var-file",
            "a.tfvars",
            "--var-file",
            "b.tfvars",
            "--var",
            "db_name=orders",
            "--ignore-rule",
            "aws_instance_invalid_type",
            "--inventory-file",
            "inventory.yaml",
            "--format",
            "json",
        ]);
        match cli.command {
            Commands::Lint(args) => {
                assert!(args.deep);
                assert_eq!(args.var_files, vec![PathBuf::from("a.tfvars"), PathBuf::from("b.tfvars")]);
                assert_eq!(args.vars, vec!["db_name=orders".to_string()]);
                assert_eq!(args.ignore_rules.len(), 1);
                assert_eq!(args.inventory_file, Some(PathBuf::from("inventory.yaml")));
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("Expected Lint command"),
        }
    }

    #[test]
    fn test_inventory_sources_conflict() {
        let result = Cli::try_parse_from([
            "tfprobe",
            "lint",
            "--inventory-file",
            "inventory.yaml",
            "--inventory-url",
            "http://localhost",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_tree_command() {
        let cli = Cli::parse_from(["tfprobe", "tree", "./infra", "--format", "mermaid"]);
        match cli.command {
            Commands::Tree(args) => {
                assert_eq!(args.path, PathBuf::from("./infra"));
                assert_eq!(args.format, GraphFormat::Mermaid);
            }
            _ => panic!("Expected Tree command"),
        }
    }

    #[test]
    fn test_simple_commands() {
        assert!(matches!(Cli::parse_from(["tfprobe", "rules"]).command, Commands::Rules));
        assert!(matches!(Cli::parse_from(["tfprobe", "init"]).command, Commands::Init));
        match Cli::parse_from(["tfprobe", "validate"]).command {
            Commands::Validate(args) => assert_eq!(args.config, PathBuf::from("tfprobe.yaml")),
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::parse_from(["tfprobe", "-vv", "--config", "custom.yaml", "lint"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
    }

    #[test]
    fn test_alias() {
        let cli = Cli::parse_from(["tfprobe", "l", "./infra"]);
        assert!(matches!(cli.command, Commands::Lint(_)));
    }
}
