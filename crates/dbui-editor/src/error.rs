#![forbid(unsafe_code)]

//! Editor error types.

use std::fmt;

use dbui_core::{ModelError, PropertyError};
use dbui_runtime::GuardError;

/// Failure running or undoing a reversible action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionError {
    Property(PropertyError),
    Model(ModelError),
    /// The action's target no longer exists, e.g. an array property on a
    /// widget type without arrays.
    MissingTarget(String),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property(e) => write!(f, "{e}"),
            Self::Model(e) => write!(f, "{e}"),
            Self::MissingTarget(what) => write!(f, "action target missing: {what}"),
        }
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Property(e) => Some(e),
            Self::Model(e) => Some(e),
            Self::MissingTarget(_) => None,
        }
    }
}

impl From<PropertyError> for ActionError {
    fn from(e: PropertyError) -> Self {
        Self::Property(e)
    }
}

impl From<ModelError> for ActionError {
    fn from(e: ModelError) -> Self {
        Self::Model(e)
    }
}

/// Failure handling an edit gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorError {
    Guard(GuardError),
    Action(ActionError),
    /// The control's entry cannot be turned into a property value, or the
    /// value breaks a constraint checked before any action runs.
    Property(PropertyError),
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guard(e) => write!(f, "edit guard: {e}"),
            Self::Action(e) => write!(f, "edit rejected: {e}"),
            Self::Property(e) => write!(f, "edit rejected: {e}"),
        }
    }
}

impl std::error::Error for EditorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Guard(e) => Some(e),
            Self::Action(e) => Some(e),
            Self::Property(e) => Some(e),
        }
    }
}

impl From<GuardError> for EditorError {
    fn from(e: GuardError) -> Self {
        Self::Guard(e)
    }
}

impl From<ActionError> for EditorError {
    fn from(e: ActionError) -> Self {
        Self::Action(e)
    }
}

impl From<PropertyError> for EditorError {
    fn from(e: PropertyError) -> Self {
        Self::Property(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_the_cause() {
        let e = EditorError::from(ActionError::from(PropertyError::ReadOnly {
            property: "type".into(),
        }));
        assert_eq!(e.to_string(), "edit rejected: property 'type' is read-only");
    }

    #[test]
    fn source_chain_reaches_the_property_error() {
        use std::error::Error;
        let e = ActionError::Property(PropertyError::InvalidValue {
            property: "width".into(),
            reason: "negative".into(),
        });
        assert!(e.source().is_some());
        assert!(ActionError::MissingTarget("x".into()).source().is_none());
    }
}
