//! Module tree builder.
//!
//! Module calls are resolved to directories in the local module cache
//! rather than fetched: `terraform init` has already installed every
//! called module under `<root>/.terraform/modules/<key>`, where the key is
//! derived from the call name and source address only. Building is
//! therefore reproducible without network access.

use super::ConfigTree;
use crate::error::{Result, TfProbeError};
use crate::parser::{ConfigLoader, Module};
use md5::{Digest, Md5};
use petgraph::graph::NodeIndex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Version prefix of the cache key scheme.
pub const CACHE_KEY_VERSION: &str = "1";

/// Module cache directory, relative to the root module.
pub const DEFAULT_MODULES_DIR: &str = ".terraform/modules";

/// Cache key of a module call.
///
/// `hex(md5("<version>.<name>;<source>"))`. The same name and source always
/// map to the same key.
#[must_use]
pub fn cache_key(name: &str, source: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(format!("{CACHE_KEY_VERSION}.{name};{source}").as_bytes());
    hex::encode(hasher.finalize())
}

/// Builds a [`ConfigTree`] from a root directory.
pub struct ModuleTreeBuilder<'a> {
    loader: &'a dyn ConfigLoader,
    modules_dir: PathBuf,
    ignored_sources: Vec<glob::Pattern>,
}

/// Per-build state.
struct BuildState {
    tree: ConfigTree,
    /// Parsed modules by directory
    loaded: HashMap<PathBuf, Arc<Module>>,
}

impl<'a> ModuleTreeBuilder<'a> {
    /// Create a builder using the default module cache location.
    #[must_use]
    pub fn new(loader: &'a dyn ConfigLoader) -> Self {
        Self {
            loader,
            modules_dir: PathBuf::from(DEFAULT_MODULES_DIR),
            ignored_sources: Vec::new(),
        }
    }

    /// Use a different module cache directory (relative to the root).
    #[must_use]
    pub fn with_modules_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.modules_dir = dir.into();
        self
    }

    /// Skip module calls whose source matches any of the glob patterns.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigValue` error for an invalid pattern.
    pub fn with_ignored_sources(mut self, patterns: &[String]) -> Result<Self> {
        for pattern in patterns {
            let compiled = glob::Pattern::new(pattern).map_err(|e| {
                crate::err!(ConfigValue {
                    key: "lint.ignore_modules".to_string(),
                    message: format!("invalid pattern \"{pattern}\": {e}"),
                })
            })?;
            self.ignored_sources.push(compiled);
        }
        Ok(self)
    }

    /// Directory a module call resolves to.
    #[must_use]
    pub fn module_dir(&self, root: &Path, name: &str, source: &str) -> PathBuf {
        root.join(&self.modules_dir).join(cache_key(name, source))
    }

    fn is_ignored(&self, source: &str) -> bool {
        self.ignored_sources.iter().any(|p| p.matches(source))
    }

    /// Load the root module and, recursively, every module it calls.
    ///
    /// # Errors
    ///
    /// Fails if any module in the tree cannot be loaded, or a call chain
    /// re-enters one of its own ancestors.
    pub fn build(&self, root: &Path) -> Result<ConfigTree> {
        let root_module = Arc::new(self.loader.load_module(root)?);
        let mut state = BuildState {
            tree: ConfigTree::new(Arc::clone(&root_module)),
            loaded: HashMap::new(),
        };
        state.loaded.insert(root.to_path_buf(), root_module);

        let root_idx = state.tree.root_index();
        let mut ancestors = vec![root.to_path_buf()];
        self.load_children(root, root_idx, &mut ancestors, &mut state)?;

        tracing::info!(
            root = %root.display(),
            modules = state.tree.len(),
            distinct_dirs = state.loaded.len(),
            "Module tree built"
        );
        Ok(state.tree)
    }

    fn load_children(
        &self,
        root: &Path,
        parent: NodeIndex,
        ancestors: &mut Vec<PathBuf>,
        state: &mut BuildState,
    ) -> Result<()> {
        let module = Arc::clone(&state.tree.node(parent).module);
        for call in module.module_calls.values() {
            let parent_path = state.tree.node(parent).path.clone();
            let call_path = parent_path.child(&call.name);

            if self.is_ignored(&call.source) {
                tracing::info!(module = %call_path, source = %call.source, "Skipping ignored module");
                continue;
            }

            let key = cache_key(&call.name, &call.source);
            let dir = root.join(&self.modules_dir).join(&key);

            if ancestors.contains(&dir) {
                let mut chain: Vec<String> = Vec::new();
                let mut cursor = Some(parent);
                while let Some(idx) = cursor {
                    chain.push(state.tree.node(idx).path.to_string());
                    cursor = state.tree.parent(idx);
                }
                chain.reverse();
                chain.push(call_path.to_string());
                return Err(crate::err!(CircularModule {
                    cycle: chain.join(" -> "),
                }));
            }

            let child_module = match state.loaded.get(&dir) {
                Some(loaded) => {
                    tracing::debug!(module = %call_path, dir = %dir.display(), "Reusing loaded module");
                    Arc::clone(loaded)
                }
                None => {
                    tracing::debug!(module = %call_path, source = %call.source, dir = %dir.display(), "Loading module");
                    let loaded = self.loader.load_module(&dir).map_err(|e| module_load_error(&call_path.to_string(), &dir, &e))?;
                    let loaded = Arc::new(loaded);
                    state.loaded.insert(dir.clone(), Arc::clone(&loaded));
                    loaded
                }
            };

            let child = state
                .tree
                .add_child(parent, &call.name, &call.source, key, child_module);
            ancestors.push(dir);
            let result = self.load_children(root, child, ancestors, state);
            ancestors.pop();
            result?;
        }
        Ok(())
    }
}

fn module_load_error(module: &str, dir: &Path, cause: &TfProbeError) -> TfProbeError {
    let message = match cause {
        TfProbeError::DirectoryNotFound { .. } => {
            "module is not installed in the module cache; run \"terraform init\"".to_string()
        }
        other => other.to_string(),
    };
    crate::err!(ModuleLoad {
        module: module.to_string(),
        dir: dir.to_path_buf(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HclLoader;
    use tempfile::TempDir;

    #[test]
    fn test_cache_key_is_md5_of_versioned_name_and_source() {
        // md5("1.web;./modules/web")
        let key = cache_key("web", "./modules/web");
        assert_eq!(key.len(), 32);
        assert_eq!(key, cache_key("web", "./modules/web"));
        assert_ne!(key, cache_key("api", "./modules/web"));
        assert_ne!(key, cache_key("web", "./modules/api"));

        let mut hasher = Md5::new();
        hasher.update(b"1.web;./modules/web");
        assert_eq!(key, hex::encode(hasher.finalize()));
    }

    fn write_module(dir: &Path, content: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("main.tf"), content).unwrap();
    }

    #[test]
    fn test_build_nested_tree() {
        let root = TempDir::new().unwrap();
        let builder_loader = HclLoader::new();
        let builder = ModuleTreeBuilder::new(&builder_loader);

        write_module(
            root.path(),
            "module \"app\" {\n  source = \"./app\"\n}\nmodule \"app2\" {\n  source = \"./app\"\n}\n",
        );
        let app_dir = builder.module_dir(root.path(), "app", "./app");
        write_module(&app_dir, "module \"db\" {\n  source = \"./db\"\n}\n");
        let app2_dir = builder.module_dir(root.path(), "app2", "./app");
        write_module(&app2_dir, "module \"db\" {\n  source = \"./db\"\n}\n");
        let db_dir = builder.module_dir(root.path(), "db", "./db");
        write_module(&db_dir, "variable \"name\" {}\n");

        let tree = builder.build(root.path()).unwrap();
        let paths: Vec<String> = tree.walk().into_iter().map(|i| tree.node(i).path.to_string()).collect();
        assert_eq!(
            paths,
            vec!["root", "module.app", "module.app.module.db", "module.app2", "module.app2.module.db"]
        );

        // both db instances share one parsed module
        let db1 = tree.find(&crate::eval::ModulePath::root().child("app").child("db")).unwrap();
        let db2 = tree.find(&crate::eval::ModulePath::root().child("app2").child("db")).unwrap();
        assert!(Arc::ptr_eq(&tree.node(db1).module, &tree.node(db2).module));
        assert_eq!(tree.node(db1).dir(), &db_dir);
    }

    #[test]
    fn test_missing_module_is_fatal() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "module \"gone\" {\n  source = \"./gone\"\n}\n");
        let loader = HclLoader::new();
        let err = ModuleTreeBuilder::new(&loader).build(root.path()).unwrap_err();
        match err {
            TfProbeError::ModuleLoad { module, message, .. } => {
                assert_eq!(module, "module.gone");
                assert!(message.contains("terraform init"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_broken_child_is_fatal() {
        let root = TempDir::new().unwrap();
        let loader = HclLoader::new();
        let builder = ModuleTreeBuilder::new(&loader);
        write_module(root.path(), "module \"bad\" {\n  source = \"./bad\"\n}\n");
        write_module(&builder.module_dir(root.path(), "bad", "./bad"), "resource {\n");
        let err = builder.build(root.path()).unwrap_err();
        assert!(matches!(err, TfProbeError::ModuleLoad { .. }));
    }

    #[test]
    fn test_cycle_is_detected() {
        let root = TempDir::new().unwrap();
        let loader = HclLoader::new();
        let builder = ModuleTreeBuilder::new(&loader);
        write_module(root.path(), "module \"loop\" {\n  source = \"./loop\"\n}\n");
        // the cached module calls itself with the same name and source
        write_module(
            &builder.module_dir(root.path(), "loop", "./loop"),
            "module \"loop\" {\n  source = \"./loop\"\n}\n",
        );
        let err = builder.build(root.path()).unwrap_err();
        match err {
            TfProbeError::CircularModule { cycle, .. } => {
                assert_eq!(cycle, "root -> module.loop -> module.loop.module.loop");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ignored_sources_are_not_loaded() {
        let root = TempDir::new().unwrap();
        write_module(
            root.path(),
            "module \"vendor\" {\n  source = \"git::https://example.com/vendor.git\"\n}\n",
        );
        let loader = HclLoader::new();
        let tree = ModuleTreeBuilder::new(&loader)
            .with_ignored_sources(&["git::*".to_string()])
            .unwrap()
            .build(root.path())
            .unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_invalid_ignore_pattern() {
        let loader = HclLoader::new();
        let result = ModuleTreeBuilder::new(&loader).with_ignored_sources(&["[".to_string()]);
        assert!(matches!(result, Err(TfProbeError::ConfigValue { .. })));
    }
}
