//! Integration tests for tfprobe.
//!
//! These tests build real module trees on disk, laid out the way
//! `terraform init` leaves them, and run the loader, resolver, detectors,
//! reporters and CLI over them.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tfprobe::tree::cache_key;

/// Write `main.tf` into `dir`, creating it.
fn write_module(dir: &Path, content: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("main.tf"), content).unwrap();
}

/// Directory `terraform init` installs the call `name` with `source` into.
fn installed_dir(root: &Path, name: &str, source: &str) -> PathBuf {
    root.join(".terraform/modules").join(cache_key(name, source))
}

const ROOT_MODULE: &str = r#"
variable "pg_name" {
  default = "app-server"
}

module "db" {
  source      = "./modules/db"
  group_name  = var.pg_name
  subnet_name = aws_db_subnet_group.private.name
}

resource "aws_instance" "web" {
  instance_type = "t2.micro"
  key_name      = "deployer"
}
"#;

const DB_MODULE: &str = r#"
variable "group_name" {}

variable "subnet_name" {
  default = "fallback"
}

resource "aws_db_instance" "mysql" {
  parameter_group_name = var.group_name
  db_subnet_group_name = var.subnet_name
}
"#;

/// A root module calling one installed child module.
fn fixture() -> TempDir {
    let root = TempDir::new().unwrap();
    write_module(root.path(), ROOT_MODULE);
    write_module(&installed_dir(root.path(), "db", "./modules/db"), DB_MODULE);
    root
}

mod workspace_tests {
    use super::*;
    use tfprobe::workspace;

    #[test]
    fn test_workspace_defaults_without_signals() {
        let root = TempDir::new().unwrap();
        assert_eq!(workspace::resolve(None, root.path()), "default");
    }

    #[test]
    fn test_workspace_from_environment_file() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join(".terraform")).unwrap();
        std::fs::write(root.path().join(".terraform/environment"), "staging\n").unwrap();
        assert_eq!(workspace::resolve(None, root.path()), "staging");
        assert_eq!(workspace::resolve(Some("prod"), root.path()), "prod");
    }
}

mod evaluation_tests {
    use super::*;
    use tfprobe::eval::{is_evaluable, EvalError, EvaluationContext, Evaluator, ModulePath};
    use tfprobe::parser::{ConfigLoader, HclLoader};

    #[test]
    fn test_resource_reference_is_not_evaluable() {
        let root = TempDir::new().unwrap();
        write_module(
            root.path(),
            r#"
resource "aws_db_instance" "mysql" {
  parameter_group_name = aws_db_parameter_group.default.name
}
"#,
        );
        let module = HclLoader::new().load_module(root.path()).unwrap();
        let resource = module.resources_of_type("aws_db_instance").next().unwrap();
        let attribute = resource.attribute("parameter_group_name").unwrap();

        assert!(!is_evaluable(&attribute.expr).unwrap());

        let ctx = EvaluationContext::meta_only(ModulePath::root(), "default");
        let err = Evaluator::new(&ctx).evaluate(&attribute.expr).unwrap_err();
        assert!(matches!(err, EvalError::Rejected { .. }));
    }
}

mod tree_tests {
    use super::*;
    use tfprobe::eval::ModulePath;
    use tfprobe::parser::HclLoader;
    use tfprobe::tree::ModuleTreeBuilder;
    use tfprobe::TfProbeError;

    #[test]
    fn test_tree_build_is_deterministic() {
        let root = fixture();
        let loader = HclLoader::new();
        let builder = ModuleTreeBuilder::new(&loader);

        let first = builder.build(root.path()).unwrap();
        let second = builder.build(root.path()).unwrap();

        let dirs = |tree: &tfprobe::tree::ConfigTree| -> Vec<(String, PathBuf)> {
            tree.walk()
                .into_iter()
                .map(|idx| {
                    let node = tree.node(idx);
                    (node.path.to_string(), node.dir().clone())
                })
                .collect()
        };
        assert_eq!(dirs(&first), dirs(&second));
        assert_eq!(
            dirs(&first),
            vec![
                ("root".to_string(), root.path().to_path_buf()),
                (
                    "module.db".to_string(),
                    installed_dir(root.path(), "db", "./modules/db")
                ),
            ]
        );
        assert!(first.find(&ModulePath::root().child("db")).is_some());
    }

    #[test]
    fn test_uninstalled_module_fails() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "module \"db\" {\n  source = \"./modules/db\"\n}\n");
        let loader = HclLoader::new();
        let err = ModuleTreeBuilder::new(&loader).build(root.path()).unwrap_err();
        assert!(matches!(err, TfProbeError::ModuleLoad { .. }));
        assert_eq!(err.exit_code(), 17);
    }
}

mod resolve_tests {
    use super::*;
    use tfprobe::eval::ModulePath;
    use tfprobe::parser::values::Overrides;
    use tfprobe::parser::HclLoader;
    use tfprobe::resolve::Resolver;
    use tfprobe::tree::ModuleTreeBuilder;
    use tfprobe::Value;

    #[test]
    fn test_every_call_argument_reaches_the_child() {
        let root = fixture();
        let loader = HclLoader::new();
        let tree = ModuleTreeBuilder::new(&loader).build(root.path()).unwrap();
        let resolved = Resolver::new("default").resolve(tree, &Overrides::new()).unwrap();

        let db = resolved.instance(&ModulePath::root().child("db")).unwrap();
        let variables = db.variables();
        assert_eq!(variables.len(), 2);
        assert_eq!(variables.get("group_name"), Some(&Value::from("app-server")));
        assert_eq!(variables.get("subnet_name"), Some(&Value::Unknown));
    }

    #[test]
    fn test_root_overrides_stay_in_the_root() {
        let root = fixture();
        let loader = HclLoader::new();
        let tree = ModuleTreeBuilder::new(&loader).build(root.path()).unwrap();
        let mut overrides = Overrides::new();
        overrides.insert("pg_name".to_string(), Value::from("custom"));
        overrides.insert("group_name".to_string(), Value::from("ignored"));

        let resolved = Resolver::new("default").resolve(tree, &overrides).unwrap();
        let root_vars = resolved.root().unwrap().variables();
        assert_eq!(root_vars.get("pg_name"), Some(&Value::from("custom")));
        assert!(!root_vars.contains("group_name"));

        let db = resolved.instance(&ModulePath::root().child("db")).unwrap();
        assert_eq!(db.variables().get("group_name"), Some(&Value::from("custom")));
    }
}

mod lint_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tfprobe::reporter::Reporter;
    use tfprobe::{Config, Linter, ReportFormat, Severity, TfProbeError};

    fn deep_config(inventory: &Path) -> Config {
        let mut config = Config::default();
        config.lint.deep_check = true;
        config.deep_check.inventory_file = Some(inventory.to_path_buf());
        config
    }

    #[tokio::test]
    async fn test_deep_lint_across_module_boundary() {
        let root = fixture();
        let inventory = root.path().join("inventory.yaml");
        std::fs::write(
            &inventory,
            "db_parameter_groups: [app-server1, app-server2]\ndb_subnet_groups: [private]\nkey_pairs: [deployer]\n",
        )
        .unwrap();

        let linter = Linter::new(deep_config(&inventory)).unwrap();
        let result = linter.lint(root.path(), &[]).await.unwrap();

        let child_file = installed_dir(root.path(), "db", "./modules/db").join("main.tf");
        let issues: Vec<(&str, Severity, PathBuf, usize)> = result
            .report
            .issues
            .iter()
            .map(|i| (i.message.as_str(), i.severity, i.file.clone(), i.line))
            .collect();
        assert_eq!(
            issues,
            vec![(
                "\"app-server\" is invalid parameter group name.",
                Severity::Error,
                child_file,
                9
            )]
        );
        assert!(result.report.failures.is_empty());
        assert_eq!(result.modules, 2);
        assert!(result.deep_check);
    }

    #[tokio::test]
    async fn test_bad_resource_attributes_abort_before_detectors() {
        let root = fixture();
        let broken = root.path().join("broken.tf");
        let linter = Linter::new(Config::default()).unwrap();

        std::fs::write(&broken, "resource \"aws_instance\" \"a\" {\n  instance_type = terraform.bogus\n}\n").unwrap();
        let err = linter.lint(root.path(), &[]).await.unwrap_err();
        assert!(matches!(err, TfProbeError::ReferenceParse { .. }));
        assert_eq!(err.exit_code(), 16);

        std::fs::write(&broken, "resource \"aws_instance\" \"a\" {\n  instance_type = var.undeclared\n}\n").unwrap();
        let err = linter.lint(root.path(), &[]).await.unwrap_err();
        assert!(matches!(err, TfProbeError::Evaluation { .. }));
        assert_eq!(err.exit_code(), 21);
    }

    #[tokio::test]
    async fn test_incomplete_inventory_is_a_run_failure() {
        let root = fixture();
        let inventory = root.path().join("inventory.json");
        std::fs::write(&inventory, r#"{"db_parameter_groups": ["app-server"]}"#).unwrap();

        let linter = Linter::new(deep_config(&inventory)).unwrap();
        let result = linter.lint(root.path(), &[]).await.unwrap();

        assert!(result.report.issues.is_empty());
        let failed: Vec<&str> = result.report.failures.iter().map(|f| f.detector.as_str()).collect();
        assert_eq!(failed, vec!["aws_instance_invalid_key_name"]);
    }

    #[tokio::test]
    async fn test_var_file_and_json_report() {
        let root = fixture();
        std::fs::write(root.path().join("terraform.tfvars"), "pg_name = \"app-server1\"\n").unwrap();
        let inventory = root.path().join("inventory.yaml");
        std::fs::write(
            &inventory,
            "db_parameter_groups: [app-server1]\ndb_subnet_groups: []\nkey_pairs: [deployer]\n",
        )
        .unwrap();
        let mut config = deep_config(&inventory);
        config.output.pretty = false;

        let result = Linter::new(config.clone()).unwrap().lint(root.path(), &[]).await.unwrap();
        assert!(result.report.is_clean());

        let json = Reporter::new(&config).generate(&result, ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["total_modules"], 2);
        assert_eq!(value["summary"]["total_issues"], 0);
    }
}

mod cli_tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;

    fn tfprobe(dir: &Path) -> Command {
        let mut cmd = Command::cargo_bin("tfprobe").unwrap();
        cmd.current_dir(dir)
            .env_remove("TF_WORKSPACE")
            .env_remove("TFPROBE_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }

    #[test]
    fn test_rules_lists_detectors() {
        let dir = TempDir::new().unwrap();
        tfprobe(dir.path())
            .arg("rules")
            .assert()
            .success()
            .stdout(predicate::str::contains("aws_db_instance_invalid_parameter_group"))
            .stdout(predicate::str::contains("aws_instance_invalid_type"));
    }

    #[test]
    fn test_lint_exit_codes() {
        let root = fixture();
        tfprobe(root.path())
            .args(["lint", "--no-color"])
            .assert()
            .code(0)
            .stdout(predicate::str::contains("PASSED"));

        write_module(
            root.path(),
            "resource \"aws_instance\" \"web\" {\n  instance_type = \"t1.2xlarge\"\n}\n",
        );
        tfprobe(root.path())
            .args(["lint", "--no-color"])
            .assert()
            .code(2)
            .stdout(predicate::str::contains("\"t1.2xlarge\" is invalid instance type."));
    }

    #[test]
    fn test_environment_variables_reach_the_root_module() {
        let root = TempDir::new().unwrap();
        write_module(
            root.path(),
            "variable \"itype\" {\n  default = \"t2.micro\"\n}\n\nresource \"aws_instance\" \"web\" {\n  instance_type = var.itype\n}\n",
        );
        tfprobe(root.path()).args(["lint", "--no-color"]).assert().code(0);
        tfprobe(root.path())
            .args(["lint", "--no-color"])
            .env("TF_VAR_itype", "t1.2xlarge")
            .assert()
            .code(2)
            .stdout(predicate::str::contains("\"t1.2xlarge\" is invalid instance type."));
    }

    #[test]
    fn test_malformed_resource_reference_aborts_lint() {
        let root = fixture();
        std::fs::write(
            root.path().join("broken.tf"),
            "resource \"aws_instance\" \"broken\" {\n  instance_type = terraform.bogus\n}\n",
        )
        .unwrap();
        tfprobe(root.path())
            .args(["lint", "--no-color"])
            .assert()
            .code(16)
            .stdout(predicate::str::contains("PASSED").not())
            .stderr(predicate::str::contains("Invalid reference"));
    }

    #[test]
    fn test_deep_lint_without_inventory_is_fatal() {
        let root = fixture();
        tfprobe(root.path())
            .args(["lint", "--deep"])
            .assert()
            .code(20)
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn test_tree_as_mermaid() {
        let root = fixture();
        tfprobe(root.path())
            .args(["tree", "--format", "mermaid"])
            .assert()
            .success()
            .stdout(predicate::str::contains("graph TD"))
            .stdout(predicate::str::contains("db"));
    }

    #[test]
    fn test_init_then_validate() {
        let dir = TempDir::new().unwrap();
        tfprobe(dir.path()).arg("init").assert().success();
        assert!(dir.path().join("tfprobe.yaml").exists());
        tfprobe(dir.path())
            .arg("validate")
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
        tfprobe(dir.path()).arg("init").assert().failure();
    }
}
