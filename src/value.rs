//! Dynamically typed values produced by expression evaluation.
//!
//! A [`Value`] is what an HCL expression resolves to once variable
//! references have been substituted. [`Value::Unknown`] is a regular value:
//! it stands for anything that cannot be determined before provisioning and
//! flows through operators instead of aborting evaluation.
//!
//! Conversion into native Rust types goes through [`FromValue`], which
//! follows the usual Terraform conversion rules (numbers and bools convert
//! to strings, numeric strings convert to numbers, and so on).

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A resolved configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit `null`
    Null,
    /// A value that cannot be determined statically
    Unknown,
    /// String value
    String(String),
    /// Number value
    Number(f64),
    /// Boolean value
    Bool(bool),
    /// Ordered collection (HCL tuple or list)
    List(Vec<Value>),
    /// Keyed collection (HCL object or map)
    Map(BTreeMap<String, Value>),
}

/// Failure to convert a [`Value`] into the native type a caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    /// The value is not known yet.
    #[error("value is not known until apply")]
    Unknown,
    /// The value is null.
    #[error("value is null")]
    Null,
    /// The value has an incompatible type.
    #[error("{expected} required, but got {found}")]
    Mismatch {
        /// Requested type
        expected: &'static str,
        /// Actual type
        found: &'static str,
    },
    /// A string could not be read as a number.
    #[error("cannot convert \"{0}\" to number")]
    InvalidNumber(String),
    /// A string could not be read as a bool.
    #[error("cannot convert \"{0}\" to bool")]
    InvalidBool(String),
    /// A number has a fractional part where a whole number is required.
    #[error("{0} is not a whole number")]
    NotWhole(String),
}

impl Value {
    /// Name of the value's type as used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Unknown => "unknown",
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Returns true unless the value itself is [`Value::Unknown`].
    ///
    /// A list holding an unknown element is known; use
    /// [`Value::is_wholly_known`] to look inside collections.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns true if neither the value nor anything nested in it is unknown.
    #[must_use]
    pub fn is_wholly_known(&self) -> bool {
        match self {
            Self::Unknown => false,
            Self::List(items) => items.iter().all(Self::is_wholly_known),
            Self::Map(items) => items.values().all(Self::is_wholly_known),
            _ => true,
        }
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert into a native type.
    ///
    /// # Errors
    ///
    /// Returns a [`CoercionError`] when the value is unknown, null, or has
    /// an incompatible type.
    pub fn to_native<T: FromValue>(&self) -> Result<T, CoercionError> {
        T::from_value(self)
    }

    /// Render a primitive value the way string interpolation does.
    ///
    /// # Errors
    ///
    /// Collections, null and unknown values cannot be interpolated.
    pub fn to_template_string(&self) -> Result<String, CoercionError> {
        String::from_value(self)
    }
}

/// Format a number without a trailing `.0` for whole values.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = n as i64;
        whole.to_string()
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Unknown => write!(f, "(known after apply)"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(items) => {
                write!(f, "{{")?;
                for (i, (k, v)) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(items: BTreeMap<String, Value>) -> Self {
        Self::Map(items)
    }
}

/// Conversion from a [`Value`] into a native Rust type.
pub trait FromValue: Sized {
    /// Perform the conversion.
    ///
    /// # Errors
    ///
    /// Returns a [`CoercionError`] when the conversion is not possible.
    fn from_value(value: &Value) -> Result<Self, CoercionError>;
}

fn reject_special(value: &Value) -> Result<(), CoercionError> {
    match value {
        Value::Unknown => Err(CoercionError::Unknown),
        Value::Null => Err(CoercionError::Null),
        _ => Ok(()),
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        reject_special(value)?;
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(format_number(*n)),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(CoercionError::Mismatch {
                expected: "string",
                found: other.type_name(),
            }),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        reject_special(value)?;
        match value {
            Value::Number(n) => Ok(*n),
            Value::String(s) => s
                .parse::<f64>()
                .map_err(|_| CoercionError::InvalidNumber(s.clone())),
            other => Err(CoercionError::Mismatch {
                expected: "number",
                found: other.type_name(),
            }),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        let n = f64::from_value(value)?;
        if n.fract() != 0.0 {
            return Err(CoercionError::NotWhole(format_number(n)));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(n as i64)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        reject_special(value)?;
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => match s.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(CoercionError::InvalidBool(s.clone())),
            },
            other => Err(CoercionError::Mismatch {
                expected: "bool",
                found: other.type_name(),
            }),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        reject_special(value)?;
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            other => Err(CoercionError::Mismatch {
                expected: "list",
                found: other.type_name(),
            }),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        Ok(value.clone())
    }
}
