#![forbid(unsafe_code)]

//! Error types for the property and widget model.
//!
//! Validation failures never modify the model: a property that rejects a
//! value keeps the one it had, and a container that rejects a child keeps
//! its child list.

use std::fmt;

use crate::value::PropertyKind;

/// Error returned when a property rejects a write.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyError {
    /// The value violates the property's validity constraint.
    InvalidValue {
        property: String,
        reason: String,
    },
    /// The property is read-only.
    ReadOnly { property: String },
    /// An untyped write carried a value of the wrong kind.
    TypeMismatch {
        property: String,
        expected: PropertyKind,
    },
    /// An array would shrink below its configured minimum element count.
    BelowMinimum {
        property: String,
        minimum: usize,
        requested: usize,
    },
}

impl PropertyError {
    /// Name of the property that rejected the write.
    #[must_use]
    pub fn property(&self) -> &str {
        match self {
            Self::InvalidValue { property, .. }
            | Self::ReadOnly { property }
            | Self::TypeMismatch { property, .. }
            | Self::BelowMinimum { property, .. } => property,
        }
    }
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { property, reason } => {
                write!(f, "invalid value for '{property}': {reason}")
            }
            Self::ReadOnly { property } => write!(f, "property '{property}' is read-only"),
            Self::TypeMismatch { property, expected } => {
                write!(f, "property '{property}' expects a {expected} value")
            }
            Self::BelowMinimum {
                property,
                minimum,
                requested,
            } => write!(
                f,
                "property '{property}' needs at least {minimum} elements, {requested} requested"
            ),
        }
    }
}

impl std::error::Error for PropertyError {}

/// Error returned by widget construction and containment operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The factory has no descriptor for this type tag.
    UnknownWidgetType(String),
    /// The widget has no property with this name.
    UnknownProperty { widget: String, property: String },
    /// Children were requested from a widget that is not a container.
    NotAContainer(String),
    /// The child already belongs to a container.
    AlreadyParented { child: String },
    /// The widget is not a child of this container.
    NotAChild { child: String, container: String },
    /// Insert index beyond the end of the child list.
    IndexOutOfRange { index: usize, len: usize },
    /// Two property definitions share a name.
    DuplicateProperty { widget: String, property: String },
    /// The child is the container itself or one of its ancestors.
    WouldCycle { child: String },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownWidgetType(tag) => write!(f, "unknown widget type '{tag}'"),
            Self::UnknownProperty { widget, property } => {
                write!(f, "widget '{widget}' has no property '{property}'")
            }
            Self::NotAContainer(widget) => write!(f, "widget '{widget}' cannot hold children"),
            Self::AlreadyParented { child } => {
                write!(f, "widget '{child}' already belongs to a container")
            }
            Self::NotAChild { child, container } => {
                write!(f, "widget '{child}' is not a child of '{container}'")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "child index {index} out of range for {len} children")
            }
            Self::DuplicateProperty { widget, property } => {
                write!(f, "widget '{widget}' defines property '{property}' twice")
            }
            Self::WouldCycle { child } => {
                write!(f, "widget '{child}' cannot contain itself")
            }
        }
    }
}

impl std::error::Error for ModelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_error_names_property() {
        let err = PropertyError::BelowMinimum {
            property: "traces".into(),
            minimum: 1,
            requested: 0,
        };
        assert_eq!(err.property(), "traces");
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn model_error_display() {
        let err = ModelError::IndexOutOfRange { index: 4, len: 2 };
        assert_eq!(err.to_string(), "child index 4 out of range for 2 children");
    }
}
