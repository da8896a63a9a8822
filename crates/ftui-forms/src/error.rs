#![forbid(unsafe_code)]

//! Configuration errors raised by misuse of the form model.
//!
//! Validation failures are not errors in this sense: they are data, exposed
//! through [`Control::errors`](crate::Control::errors). A [`FormError`] is
//! returned when a caller asks for something the tree's current shape cannot
//! satisfy. The operation that raised it has not mutated any control.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FormError>;

/// Which composite flavor raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    Group,
    Array,
}

impl CompositeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Array => "array",
        }
    }
}

impl std::fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("There are no form controls registered with this {kind} yet.")]
    NoControlsRegistered { kind: CompositeKind },

    #[error("Must supply a value for form control with name: '{name}'.")]
    MissingName { name: String },

    #[error("Must supply a value for form control at index: {index}.")]
    MissingIndex { index: usize },

    #[error("Cannot find form control with name: {name}.")]
    UnknownName { name: String },

    #[error("Cannot find form control at index {index}")]
    UnknownIndex { index: usize },

    #[error("expected {expected} value for this {kind}, found {found}")]
    ShapeMismatch {
        kind: CompositeKind,
        expected: &'static str,
        found: &'static str,
    },

    #[error("a form control named '{name}' is already registered")]
    DuplicateName { name: String },

    #[error("index {index} is out of bounds for an array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("control {id} is already attached to a parent")]
    AlreadyAttached { id: u64 },

    #[error("attaching control {id} would make it its own ancestor")]
    WouldCreateCycle { id: u64 },
}

impl FormError {
    /// Whether this error was raised by a bulk `set_value` key-set check.
    #[must_use]
    pub fn is_value_shape_error(&self) -> bool {
        matches!(
            self,
            Self::NoControlsRegistered { .. }
                | Self::MissingName { .. }
                | Self::MissingIndex { .. }
                | Self::UnknownName { .. }
                | Self::UnknownIndex { .. }
                | Self::ShapeMismatch { .. }
        )
    }
}

/// Short JSON type name used in [`FormError::ShapeMismatch`].
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
