//! Loading Terraform configuration directories.
//!
//! A [`ConfigLoader`] turns one directory of `.tf` files into a [`Module`]:
//! the variables it declares, the managed resources it defines and the
//! modules it calls. Every attribute keeps its source location so detectors
//! can report issues at the declaring line.
//!
//! The loader is injected into the module tree builder, so tests can swap
//! in an in-memory implementation.
//!
//! # Example
//!
//! ```rust,no_run
//! use tfprobe::parser::{ConfigLoader, HclLoader};
//! use std::path::Path;
//!
//! let loader = HclLoader::new();
//! let module = loader.load_module(Path::new("./terraform")).unwrap();
//! println!("{} resources", module.managed_resources.len());
//! ```

mod hcl;
pub mod values;

pub use self::hcl::HclLoader;

use crate::error::Result;
use crate::types::Location;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// File extensions loaded as configuration files.
pub const TERRAFORM_EXTENSIONS: &[&str] = &[".tf"];

/// Variables file loaded automatically from the root module directory.
pub const DEFAULT_VALUES_FILE: &str = "terraform.tfvars";

/// Module block arguments that are not input variables.
pub const MODULE_META_ARGUMENTS: &[&str] =
    &["source", "version", "count", "for_each", "providers", "depends_on"];

/// A single `name = expression` attribute with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// The unevaluated expression
    pub expr: ::hcl::Expression,
    /// Where the attribute is declared
    pub location: Location,
}

/// A `variable` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Variable name
    pub name: String,
    /// The `default` attribute, if any
    pub default: Option<Attribute>,
    /// The `description` attribute, if it is a literal string
    pub description: Option<String>,
    /// Where the block is declared
    pub location: Location,
}

/// A managed `resource` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Resource type (e.g. `aws_db_instance`)
    pub resource_type: String,
    /// Resource name (e.g. `mysql`)
    pub name: String,
    /// Top-level attributes in declaration order
    pub attributes: IndexMap<String, Attribute>,
    /// Where the block is declared
    pub location: Location,
}

impl Resource {
    /// The `type.name` address of the resource.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }

    /// Look up a top-level attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

/// A `module` block calling another module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleCall {
    /// Call name (the block label)
    pub name: String,
    /// Source address as written
    pub source: String,
    /// Version constraint as written
    pub version: Option<String>,
    /// Input attributes (meta-arguments excluded) in declaration order
    pub attributes: IndexMap<String, Attribute>,
    /// Where the block is declared
    pub location: Location,
}

/// One parsed configuration directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    /// Directory the module was loaded from
    pub dir: PathBuf,
    /// Files that were parsed, in load order
    pub files: Vec<PathBuf>,
    /// Declared variables by name
    pub variables: IndexMap<String, Variable>,
    /// Managed resources by `type.name`
    pub managed_resources: IndexMap<String, Resource>,
    /// Module calls by call name
    pub module_calls: IndexMap<String, ModuleCall>,
}

impl Module {
    /// Resources of one type, in declaration order.
    pub fn resources_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.managed_resources
            .values()
            .filter(move |r| r.resource_type == resource_type)
    }
}

/// Loads configuration directories and variables files.
///
/// This trait allows for different loading implementations
/// (e.g., for testing with in-memory fixtures).
pub trait ConfigLoader: Send + Sync {
    /// Load every configuration file in `dir` into one module.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing, a file cannot be read,
    /// or the HCL is invalid.
    fn load_module(&self, dir: &Path) -> Result<Module>;

    /// Load a variables file as raw `name = expression` attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    fn load_values_file(&self, path: &Path) -> Result<IndexMap<String, Attribute>>;
}
