//! Error types for tfprobe.
//!
//! This module defines the error hierarchy using `thiserror`. Every
//! variant records where in tfprobe it was raised, so a failed run points
//! at both the offending configuration and the code path that rejected it.
//!
//! # Error Categories
//!
//! - **Structural errors**: unreadable files, HCL syntax errors, malformed
//!   references, unloadable or circular modules. These abort the run.
//! - **Evaluation errors**: an expression could not be evaluated (rejected
//!   reference, undeclared variable, operator type mismatch).
//! - **Cloud API errors**: a deep check could not query live state. These are
//!   reported per detector and never turn into "no issues found".
//! - **Config errors**: invalid `tfprobe.yaml`.
//!
//! Unknown values and type-coercion failures are *not* errors; they are
//! encoded in [`crate::value::Value::Unknown`] and
//! [`crate::eval::Resolved::Unavailable`].
//!
//! # Example
//!
//! ```rust
//! use tfprobe::error::{TfProbeError, Result};
//!
//! fn read_config(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .map_err(|e| TfProbeError::io(path, e, file!(), line!()))
//! }
//! ```

use crate::eval::EvalError;
use std::path::PathBuf;
use thiserror::Error;

/// Macro to create errors with automatic source location tracking.
///
/// Usage:
/// ```ignore
/// return Err(err!(ConfigMissing { key: "inventory_file".to_string() }));
/// ```
///
/// Fields accept the struct shorthand (`err!(StateParse { file, message })`).
#[macro_export]
macro_rules! err {
    ($variant:ident { $($field:ident $(: $value:expr)?),* $(,)? }) => {
        $crate::error::TfProbeError::$variant {
            $($field $(: $value)?,)*
            src_path: file!(),
            src_line: line!(),
        }
    };
}

/// A specialized Result type for tfprobe operations.
pub type Result<T> = std::result::Result<T, TfProbeError>;

/// The main error type for tfprobe.
#[derive(Error, Debug)]
pub enum TfProbeError {
    // =========================================================================
    // I/O and File System Errors
    // =========================================================================
    /// I/O error with path context.
    #[error("I/O error at '{path}' ({src_path}:{src_line}): {source}")]
    Io {
        /// The path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// File not found.
    #[error("File not found: {path} ({src_path}:{src_line})")]
    FileNotFound {
        /// The missing file path
        path: PathBuf,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Directory not found.
    #[error("Directory not found: {path} ({src_path}:{src_line})")]
    DirectoryNotFound {
        /// The missing directory path
        path: PathBuf,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // HCL Parsing Errors
    // =========================================================================
    /// HCL parsing error.
    #[error("Failed to parse HCL in '{file}' \n\t({src_path}:{src_line}): {message}")]
    HclParse {
        /// The file being parsed
        file: PathBuf,
        /// Error message
        message: String,
        /// Line number (if available)
        line: Option<usize>,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Invalid HCL structure (duplicate declarations, missing labels, ...).
    #[error("Invalid HCL structure in '{file}' ({src_path}:{src_line}): {message}")]
    HclStructure {
        /// The file with the invalid structure
        file: PathBuf,
        /// Description of the structural issue
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// A reference inside an expression is malformed (e.g. bare `var`).
    #[error("Invalid reference at {location} ({src_path}:{src_line}): {message}")]
    ReferenceParse {
        /// Where the expression was declared
        location: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// A variables file could not be used.
    #[error("Invalid variables file '{file}' ({src_path}:{src_line}): {message}")]
    ValuesFile {
        /// The variables file
        file: PathBuf,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// A state snapshot could not be parsed.
    #[error("Invalid state file '{file}' ({src_path}:{src_line}): {message}")]
    StateParse {
        /// The state file
        file: PathBuf,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Module Tree Errors
    // =========================================================================
    /// A called module could not be loaded from its cache directory.
    #[error("Failed to load module '{module}' from '{dir}' ({src_path}:{src_line}): {message}")]
    ModuleLoad {
        /// Module path of the failing call (e.g. `module.vpc`)
        module: String,
        /// Directory the call resolved to
        dir: PathBuf,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// A module call chain re-enters one of its ancestors.
    #[error("Circular module call detected ({src_path}:{src_line}): {cycle}")]
    CircularModule {
        /// Description of the cycle
        cycle: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Evaluation Errors
    // =========================================================================
    /// Expression evaluation failed where a value was required.
    #[error("Failed to evaluate expression at {location} ({src_path}:{src_line}): {source}")]
    Evaluation {
        /// Where the expression was declared
        location: String,
        /// The underlying evaluation error
        #[source]
        source: EvalError,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration parsing error.
    #[error("Failed to parse configuration ({src_path}:{src_line}): {message}")]
    ConfigParse {
        /// Error message
        message: String,
        /// The underlying error (if any)
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}' ({src_path}:{src_line}): {message}")]
    ConfigValue {
        /// The configuration key
        key: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Missing required configuration.
    #[error("Missing required configuration: {key} ({src_path}:{src_line})")]
    ConfigMissing {
        /// The missing configuration key
        key: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Cloud API Errors
    // =========================================================================
    /// A live query through the cloud capability failed.
    #[error("Cloud API error ({kind}) ({src_path}:{src_line}): {message}")]
    CloudApi {
        /// The resource kind being listed
        kind: String,
        /// Error message
        message: String,
        /// HTTP status code (if available)
        status_code: Option<u16>,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Report Errors
    // =========================================================================
    /// Report generation error.
    #[error("Failed to generate report ({src_path}:{src_line}): {message}")]
    ReportGeneration {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Internal error (should not happen in normal operation).
    #[error("Internal error ({src_path}:{src_line}): {message}")]
    Internal {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },
}

impl TfProbeError {
    /// Creates an `Io` error.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error, src_path: &'static str, src_line: u32) -> Self {
        Self::Io { path: path.into(), source, src_path, src_line }
    }

    /// Creates an `HclParse` error.
    #[must_use]
    pub fn hcl_parse(file: PathBuf, message: String, line: Option<usize>, src_path: &'static str, src_line: u32) -> Self {
        Self::HclParse { file, message, line, src_path, src_line }
    }

    /// Creates an `Evaluation` error.
    #[must_use]
    pub fn evaluation(location: impl ToString, source: EvalError, src_path: &'static str, src_line: u32) -> Self {
        Self::Evaluation { location: location.to_string(), source, src_path, src_line }
    }

    /// Creates a `CloudApi` error.
    #[must_use]
    pub fn cloud_api(kind: impl ToString, message: String, status_code: Option<u16>, src_path: &'static str, src_line: u32) -> Self {
        Self::CloudApi { kind: kind.to_string(), message, status_code, src_path, src_line }
    }

    /// Creates a `ConfigParse` error.
    #[must_use]
    pub fn config_parse(message: String, source: Option<Box<dyn std::error::Error + Send + Sync>>, src_path: &'static str, src_line: u32) -> Self {
        Self::ConfigParse { message, source, src_path, src_line }
    }

    /// Creates an `Internal` error.
    #[must_use]
    pub fn internal(message: String, src_path: &'static str, src_line: u32) -> Self {
        Self::Internal { message, src_path, src_line }
    }

    /// Returns true when the error means a live check could not be
    /// performed, as opposed to the configuration being unusable.
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::CloudApi { .. })
    }

    /// Returns the appropriate exit code for the error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied => 13,
            Self::FileNotFound { .. } => 14,
            Self::DirectoryNotFound { .. } => 15,
            Self::HclParse { .. } | Self::HclStructure { .. } | Self::ReferenceParse { .. } => 16,
            Self::ModuleLoad { .. } | Self::CircularModule { .. } => 17,
            Self::ConfigParse { .. } => 18,
            Self::ConfigValue { .. } => 19,
            Self::ConfigMissing { .. } => 20,
            Self::Evaluation { .. } => 21,
            Self::CloudApi { .. } => 22,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for TfProbeError {
    fn from(source: std::io::Error) -> Self {
        // Prefer TfProbeError::io(path, ...) wherever the path is known
        Self::Io {
            path: PathBuf::new(),
            source,
            src_path: file!(),
            src_line: line!(),
        }
    }
}

impl From<serde_json::Error> for TfProbeError {
    fn from(source: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON serialization/deserialization error: {}", source),
            src_path: file!(),
            src_line: line!(),
        }
    }
}
