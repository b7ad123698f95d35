//! Module call tree.
//!
//! The configuration of a run is a tree: the root module, plus one node for
//! every module call reachable from it. The tree is stored in a `petgraph`
//! directed graph whose edges point from caller to callee and carry the
//! call name.
//!
//! ```text
//! root ──"network"──▶ module.network
//!   │
//!   └────"db"───────▶ module.db ──"params"──▶ module.db.module.params
//! ```
//!
//! A node's parent is reached through its single incoming edge, so parents
//! are non-owning back-references by construction. Children are always
//! listed in the order the calls are declared in the parent.
//!
//! # Example
//!
//! ```rust,no_run
//! use tfprobe::parser::HclLoader;
//! use tfprobe::tree::ModuleTreeBuilder;
//! use std::path::Path;
//!
//! let loader = HclLoader::new();
//! let tree = ModuleTreeBuilder::new(&loader).build(Path::new(".")).unwrap();
//! for idx in tree.walk() {
//!     println!("{}", tree.node(idx).path);
//! }
//! ```

mod builder;
mod export;

pub use builder::{cache_key, ModuleTreeBuilder, CACHE_KEY_VERSION, DEFAULT_MODULES_DIR};
pub use export::export_tree;

use crate::eval::ModulePath;
use crate::parser::Module;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// One module instance in the tree.
#[derive(Debug, Clone)]
pub struct ConfigNode {
    /// Address of the instance
    pub path: ModulePath,
    /// Source address of the call (`None` for the root)
    pub source: Option<String>,
    /// Cache key of the call (`None` for the root)
    pub cache_key: Option<String>,
    /// Parsed module; shared between calls resolving to the same directory
    pub module: Arc<Module>,
}

impl ConfigNode {
    /// Directory the module was loaded from.
    #[must_use]
    pub fn dir(&self) -> &PathBuf {
        &self.module.dir
    }
}

/// The module call tree of one run.
#[derive(Debug, Clone)]
pub struct ConfigTree {
    inner: DiGraph<ConfigNode, String>,
    root: NodeIndex,
    by_path: HashMap<ModulePath, NodeIndex>,
}

impl ConfigTree {
    /// Create a tree holding only the root module.
    pub(crate) fn new(root_module: Arc<Module>) -> Self {
        let mut inner = DiGraph::new();
        let root = inner.add_node(ConfigNode {
            path: ModulePath::root(),
            source: None,
            cache_key: None,
            module: root_module,
        });
        let mut by_path = HashMap::new();
        by_path.insert(ModulePath::root(), root);
        Self { inner, root, by_path }
    }

    /// Attach a child module under `parent`.
    pub(crate) fn add_child(
        &mut self,
        parent: NodeIndex,
        call_name: &str,
        source: &str,
        cache_key: String,
        module: Arc<Module>,
    ) -> NodeIndex {
        let path = self.inner[parent].path.child(call_name);
        let idx = self.inner.add_node(ConfigNode {
            path: path.clone(),
            source: Some(source.to_string()),
            cache_key: Some(cache_key),
            module,
        });
        self.inner.add_edge(parent, idx, call_name.to_string());
        self.by_path.insert(path, idx);
        idx
    }

    /// Index of the root node.
    #[must_use]
    pub const fn root_index(&self) -> NodeIndex {
        self.root
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> &ConfigNode {
        &self.inner[self.root]
    }

    /// A node by index.
    ///
    /// # Panics
    ///
    /// Panics if `idx` does not belong to this tree.
    #[must_use]
    pub fn node(&self, idx: NodeIndex) -> &ConfigNode {
        &self.inner[idx]
    }

    /// Look up a node by module path.
    #[must_use]
    pub fn find(&self, path: &ModulePath) -> Option<NodeIndex> {
        self.by_path.get(path).copied()
    }

    /// The caller of a node, `None` for the root.
    #[must_use]
    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.inner.neighbors_directed(idx, Direction::Incoming).next()
    }

    /// Children of a node with their call names, in call declaration order.
    #[must_use]
    pub fn children(&self, idx: NodeIndex) -> Vec<(&str, NodeIndex)> {
        let by_name: HashMap<&str, NodeIndex> = self
            .inner
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.weight().as_str(), e.target()))
            .collect();
        self.inner[idx]
            .module
            .module_calls
            .keys()
            .filter_map(|name| by_name.get_key_value(name.as_str()).map(|(n, i)| (*n, *i)))
            .collect()
    }

    /// The child reached through call `name`.
    #[must_use]
    pub fn child(&self, idx: NodeIndex, name: &str) -> Option<NodeIndex> {
        self.children(idx)
            .into_iter()
            .find(|(call, _)| *call == name)
            .map(|(_, child)| child)
    }

    /// All nodes, parents before children, siblings in declaration order.
    #[must_use]
    pub fn walk(&self) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(self.inner.node_count());
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            order.push(idx);
            let children = self.children(idx);
            stack.extend(children.into_iter().rev().map(|(_, child)| child));
        }
        order
    }

    /// Caller/callee pairs with their call names.
    pub fn edges(&self) -> impl Iterator<Item = (&ConfigNode, &ConfigNode, &str)> {
        self.inner.edge_references().map(|e| {
            (
                &self.inner[e.source()],
                &self.inner[e.target()],
                e.weight().as_str(),
            )
        })
    }

    /// Number of module instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.node_count()
    }

    /// Always false; a tree has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }
}
