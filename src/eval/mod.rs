//! Restricted expression evaluation.
//!
//! The engine only evaluates expressions that can be determined before
//! provisioning: literals, input variables and the workspace name combined
//! with operators and a small set of builtin functions. Before evaluating,
//! [`is_evaluable`] classifies every reference in the expression; anything
//! that refers to infrastructure (resources, data sources, module outputs)
//! is rejected instead of approximated.
//!
//! Value-level problems are never errors. A variable without a value is
//! [`Value::Unknown`](crate::value::Value::Unknown), which flows through
//! operators, and a value of the wrong type for the caller becomes
//! [`Resolved::Unavailable`].
//!
//! # Example
//!
//! ```rust
//! use tfprobe::eval::{EvaluationContext, Evaluator, ModulePath, Resolved, VariableValues};
//! use tfprobe::value::Value;
//!
//! let body: hcl::Body = hcl::from_str(r#"name = "${var.prefix}-db""#).unwrap();
//! let expr = &body.attributes().next().unwrap().expr;
//!
//! let vars: VariableValues = vec![("prefix".to_string(), Value::from("app"))].into_iter().collect();
//! let ctx = EvaluationContext::new(ModulePath::root(), vars, "default");
//! let result = Evaluator::new(&ctx).evaluate_to::<String>(expr).unwrap();
//! assert_eq!(result.value, Resolved::Known("app-db".to_string()));
//! ```

mod context;
mod evaluator;
pub mod functions;
mod references;

pub use context::{EvaluationContext, ModulePath, VariableValues};
pub use evaluator::Evaluator;
pub use references::{
    classify, is_evaluable, references_in_expr, Reference, ReferenceError, SubjectKind,
};

use crate::types::Severity;
use std::fmt;
use thiserror::Error;

/// Structured evaluation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The expression depends on something that cannot be known before apply.
    #[error("expression depends on {reference}, which cannot be determined before apply")]
    Rejected {
        /// The offending symbol
        reference: String,
    },

    /// A reference is malformed.
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// `var.<name>` refers to a variable the module does not declare.
    #[error("reference to undeclared input variable \"{0}\"")]
    UndeclaredVariable(String),

    /// Variables were referenced where only meta-attributes are available.
    #[error("variables may not be used here (var.{0})")]
    VariablesNotAllowed(String),

    /// An operator was applied to operands it does not accept.
    #[error("invalid operand for {operator}: {message}")]
    Operation {
        /// The operator or construct
        operator: String,
        /// Error message
        message: String,
    },

    /// Attribute or index access into a value failed.
    #[error("invalid traversal: {0}")]
    Traversal(String),

    /// A builtin function was called with bad arguments.
    #[error("invalid arguments for {name}(): {message}")]
    Function {
        /// Function name
        name: String,
        /// Error message
        message: String,
    },

    /// An expression form the engine does not support.
    #[error("unsupported expression: {0}")]
    Unsupported(String),
}

impl EvalError {
    pub(crate) fn operation(operator: &str, message: impl Into<String>) -> Self {
        Self::Operation {
            operator: operator.to_string(),
            message: message.into(),
        }
    }
}

/// A non-fatal message produced while evaluating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Short summary
    pub summary: String,
    /// Longer explanation
    pub detail: String,
}

impl Diagnostic {
    /// A warning diagnostic.
    #[must_use]
    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// An error diagnostic.
    #[must_use]
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.summary, self.detail)
    }
}

/// An evaluation result with the diagnostics collected along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated<T> {
    /// The result
    pub value: T,
    /// Warnings and recoverable errors
    pub diagnostics: Vec<Diagnostic>,
}

/// The outcome of asking for a value of a concrete native type.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    /// The value is known and converted.
    Known(T),
    /// The value cannot be determined before apply.
    Unknown,
    /// The value is known but cannot be used as the requested type.
    Unavailable(Diagnostic),
}

impl<T> Resolved<T> {
    /// The converted value, if known.
    pub fn known(self) -> Option<T> {
        match self {
            Self::Known(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the converted value, if known.
    pub const fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            _ => None,
        }
    }
}
