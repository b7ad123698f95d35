//! Resolution pass over the module tree.
//!
//! Walks the tree from the root down. The root instance's variables come
//! from defaults plus the run's overrides; every child instance's variables
//! come from its defaults plus the attributes its caller passes, evaluated
//! in the caller's context. Each instance's values are built completely and
//! then published as an immutable [`VariableValues`] snapshot, so nothing
//! downstream can observe a partially populated map.

mod variables;

pub use variables::{propagate_attributes, resolve_variables};

use crate::error::{Result, TfProbeError};
use crate::eval::{is_evaluable, EvaluationContext, Evaluator, ModulePath, VariableValues};
use crate::parser::values::Overrides;
use crate::parser::Module;
use crate::tree::ConfigTree;
use petgraph::graph::NodeIndex;
use std::collections::HashMap;
use std::sync::Arc;

/// One resolved module instance.
#[derive(Debug, Clone)]
pub struct ModuleInstance {
    /// Tree node of the instance
    pub node: NodeIndex,
    /// Parsed module
    pub module: Arc<Module>,
    /// Context expressions in this instance evaluate against
    pub context: EvaluationContext,
}

impl ModuleInstance {
    /// Address of the instance.
    #[must_use]
    pub fn path(&self) -> &ModulePath {
        &self.context.module_path
    }

    /// Resolved input variables.
    #[must_use]
    pub fn variables(&self) -> VariableValues {
        self.context.variables.clone().unwrap_or_default()
    }
}

/// A fully resolved configuration, read-only for detectors.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Active workspace
    pub workspace: String,
    /// The module tree
    pub tree: ConfigTree,
    /// Instances, parents before children, siblings in declaration order
    pub instances: Vec<ModuleInstance>,
}

impl ResolvedConfig {
    /// Look up an instance by path.
    #[must_use]
    pub fn instance(&self, path: &ModulePath) -> Option<&ModuleInstance> {
        self.instances.iter().find(|i| i.path() == path)
    }

    /// The root instance.
    #[must_use]
    pub fn root(&self) -> Option<&ModuleInstance> {
        self.instances.first()
    }
}

/// Computes evaluation contexts for every instance of a tree.
#[derive(Debug, Clone)]
pub struct Resolver {
    workspace: String,
}

impl Resolver {
    /// Create a resolver for the given workspace.
    #[must_use]
    pub fn new(workspace: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    /// Resolve `tree`, applying `root_overrides` to the root instance only.
    ///
    /// # Errors
    ///
    /// Fails on malformed references, rejected or failing defaults, and
    /// failing evaluable call attributes.
    pub fn resolve(&self, tree: ConfigTree, root_overrides: &Overrides) -> Result<ResolvedConfig> {
        let mut contexts: HashMap<NodeIndex, EvaluationContext> = HashMap::new();
        let mut instances = Vec::with_capacity(tree.len());

        for idx in tree.walk() {
            let node = tree.node(idx);
            let overrides = match tree.parent(idx) {
                None => root_overrides.clone(),
                Some(parent) => {
                    let caller = contexts.get(&parent).ok_or_else(|| {
                        TfProbeError::internal(
                            format!("{} resolved before its caller", node.path),
                            file!(),
                            line!(),
                        )
                    })?;
                    let call_name = node.path.segments().last().map(String::as_str).unwrap_or_default();
                    let call = tree.node(parent).module.module_calls.get(call_name).ok_or_else(|| {
                        TfProbeError::internal(
                            format!("{} has no matching call in its parent module", node.path),
                            file!(),
                            line!(),
                        )
                    })?;
                    propagate_attributes(call, &node.module, caller)?
                }
            };

            let meta = EvaluationContext::meta_only(node.path.clone(), self.workspace.clone());
            let values = resolve_variables(&node.module.variables, &overrides, &meta)?;
            let context = EvaluationContext::new(node.path.clone(), values, self.workspace.clone());
            check_resource_attributes(&node.module, &context)?;
            tracing::debug!(
                module = %node.path,
                variables = context.variables.as_ref().map_or(0, VariableValues::len),
                "Resolved module instance"
            );

            contexts.insert(idx, context.clone());
            instances.push(ModuleInstance {
                node: idx,
                module: Arc::clone(&node.module),
                context,
            });
        }

        tracing::info!(workspace = %self.workspace, instances = instances.len(), "Configuration resolved");
        Ok(ResolvedConfig {
            workspace: self.workspace.clone(),
            tree,
            instances,
        })
    }
}

/// Check every managed resource attribute of one instance: references must
/// be well formed, and attributes that are evaluable must evaluate.
fn check_resource_attributes(module: &Module, context: &EvaluationContext) -> Result<()> {
    let evaluator = Evaluator::new(context);
    for resource in module.managed_resources.values() {
        for attr in resource.attributes.values() {
            let evaluable = is_evaluable(&attr.expr).map_err(|e| {
                crate::err!(ReferenceParse {
                    location: attr.location.to_string(),
                    message: e.to_string(),
                })
            })?;
            if evaluable {
                evaluator
                    .evaluate(&attr.expr)
                    .map_err(|e| TfProbeError::evaluation(&attr.location, e, file!(), line!()))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HclLoader;
    use crate::tree::ModuleTreeBuilder;
    use crate::eval::EvalError;
    use crate::value::Value;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(dir: &Path, content: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("main.tf"), content).unwrap();
    }

    #[test]
    fn test_resolve_two_levels() {
        let root = TempDir::new().unwrap();
        let loader = HclLoader::new();
        let builder = ModuleTreeBuilder::new(&loader);

        write(
            root.path(),
            r#"
variable "env" {
  default = "dev"
}

module "db" {
  source = "./db"
  name   = "${var.env}-${terraform.workspace}"
  subnet = aws_subnet.main.id
}
"#,
        );
        write(
            &builder.module_dir(root.path(), "db", "./db"),
            r#"
variable "name" {}
variable "subnet" {}
variable "engine" {
  default = "mysql"
}
variable "env" {}
"#,
        );

        let tree = builder.build(root.path()).unwrap();
        let overrides: Overrides = [("env".to_string(), Value::from("prod"))].into_iter().collect();
        let resolved = Resolver::new("blue").resolve(tree, &overrides).unwrap();

        assert_eq!(resolved.instances.len(), 2);
        let root_vars = resolved.root().unwrap().variables();
        assert_eq!(root_vars.get("env"), Some(&Value::from("prod")));

        let db = resolved.instance(&ModulePath::root().child("db")).unwrap();
        let vars = db.variables();
        assert_eq!(vars.get("name"), Some(&Value::from("prod-blue")));
        assert_eq!(vars.get("subnet"), Some(&Value::Unknown));
        assert_eq!(vars.get("engine"), Some(&Value::from("mysql")));
        // root overrides do not leak into children
        assert_eq!(vars.get("env"), Some(&Value::Unknown));
        assert_eq!(db.context.workspace, "blue");
    }

    fn resolve_root(content: &str) -> Result<ResolvedConfig> {
        let root = TempDir::new().unwrap();
        write(root.path(), content);
        let loader = HclLoader::new();
        let tree = ModuleTreeBuilder::new(&loader).build(root.path())?;
        Resolver::new("default").resolve(tree, &Overrides::new())
    }

    #[test]
    fn test_malformed_resource_reference_is_fatal() {
        let err = resolve_root(
            r#"
resource "aws_instance" "a" {
  instance_type = "t2.micro"
}

resource "aws_instance" "b" {
  instance_type = terraform.bogus
}
"#,
        )
        .unwrap_err();
        assert!(matches!(err, TfProbeError::ReferenceParse { ref location, .. } if location.contains("main.tf")));
        assert_eq!(err.exit_code(), 16);
    }

    #[test]
    fn test_failing_resource_attribute_is_fatal() {
        let err = resolve_root(
            r#"
resource "aws_instance" "web" {
  instance_type = var.undeclared
}
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TfProbeError::Evaluation { source: EvalError::UndeclaredVariable(ref name), .. } if name == "undeclared"
        ));
        assert_eq!(err.exit_code(), 21);
    }

    #[test]
    fn test_apply_time_and_unknown_attributes_are_accepted() {
        let resolved = resolve_root(
            r#"
variable "pending" {}

resource "aws_db_instance" "main" {
  parameter_group_name = aws_db_parameter_group.default.name
  db_subnet_group_name = "${var.pending}-subnets"
  allocated_storage    = 20 * 2
}
"#,
        )
        .unwrap();
        assert_eq!(resolved.instances.len(), 1);
    }

    #[test]
    fn test_instance_without_parent_call_is_internal_error() {
        let mut tree = ConfigTree::new(Arc::new(Module::default()));
        let root = tree.root_index();
        tree.add_child(root, "db", "./db", "key".to_string(), Arc::new(Module::default()));

        let err = Resolver::new("default").resolve(tree, &Overrides::new()).unwrap_err();
        assert!(matches!(err, TfProbeError::Internal { ref message, .. } if message.contains("module.db")));
    }
}
