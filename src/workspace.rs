//! Active workspace detection.
//!
//! The workspace is computed once per run and threaded through every
//! [`EvaluationContext`](crate::eval::EvaluationContext); nothing below the
//! linter reads the environment on its own.

use std::path::Path;

/// Environment variable selecting the workspace.
pub const WORKSPACE_ENV: &str = "TF_WORKSPACE";

/// Marker file holding the selected workspace, relative to the root module.
pub const ENVIRONMENT_FILE: &str = ".terraform/environment";

/// Workspace used when nothing selects one.
pub const DEFAULT_WORKSPACE: &str = "default";

/// Detect the active workspace for the configuration rooted at `root`.
#[must_use]
pub fn detect(root: &Path) -> String {
    resolve(std::env::var(WORKSPACE_ENV).ok().as_deref(), root)
}

/// Resolve the workspace from an explicit environment value.
///
/// A non-empty `env_value` wins; otherwise the trimmed contents of
/// `<root>/.terraform/environment`; otherwise `"default"`.
#[must_use]
pub fn resolve(env_value: Option<&str>, root: &Path) -> String {
    if let Some(name) = env_value.filter(|v| !v.is_empty()) {
        tracing::debug!(workspace = name, source = WORKSPACE_ENV, "Workspace selected");
        return name.to_string();
    }

    let marker = root.join(ENVIRONMENT_FILE);
    match std::fs::read_to_string(&marker) {
        Ok(contents) if !contents.trim().is_empty() => {
            let name = contents.trim().to_string();
            tracing::debug!(workspace = %name, source = %marker.display(), "Workspace selected");
            name
        }
        _ => DEFAULT_WORKSPACE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_without_env_or_marker() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve(None, dir.path()), "default");
        assert_eq!(resolve(Some(""), dir.path()), "default");
    }

    #[test]
    fn test_marker_file_is_trimmed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".terraform")).unwrap();
        std::fs::write(dir.path().join(ENVIRONMENT_FILE), "staging\n").unwrap();
        assert_eq!(resolve(None, dir.path()), "staging");
    }

    #[test]
    fn test_env_value_wins_over_marker() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".terraform")).unwrap();
        std::fs::write(dir.path().join(ENVIRONMENT_FILE), "staging").unwrap();
        assert_eq!(resolve(Some("prod"), dir.path()), "prod");
    }

    #[test]
    fn test_blank_marker_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".terraform")).unwrap();
        std::fs::write(dir.path().join(ENVIRONMENT_FILE), "  \n").unwrap();
        assert_eq!(resolve(None, dir.path()), "default");
    }
}
