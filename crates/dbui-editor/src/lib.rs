#![forbid(unsafe_code)]

//! Display Builder Editor
//!
//! Edits widget models with undo.
//!
//! # Key Components
//!
//! - [`UndoableAction`] - Invertible model mutation; [`ActionGroup`] makes
//!   several one undo step
//! - [`UndoManager`] - Bounded undo and redo stacks
//! - [`PropertyBinding`] - Two-way binding of a property to an edit control,
//!   mirroring commits to sibling widgets
//! - [`ArraySizeBinding`] - Element-count spinner for array properties
//! - [`EditorRegistry`] - Property kind to editor factory table
//!
//! All edit gestures run on the UI thread. Background writers may change the
//! same properties at any time; bindings post those changes to the UI thread
//! and hold them back while the user is typing.

pub mod action;
pub mod array_binding;
pub mod binding;
pub mod error;
pub mod history;
pub mod registry;

pub use action::{
    ActionGroup, AddArrayElementAction, AddWidgetAction, RemoveArrayElementAction,
    RemoveWidgetAction, SetPropertyAction, SetValueAction, UndoableAction,
};
pub use array_binding::ArraySizeBinding;
pub use binding::{EditControl, PropertyBinding};
pub use error::{ActionError, EditorError};
pub use history::{HistoryConfig, HistoryState, SharedUndo, UndoManager};
pub use registry::{EditorFactory, EditorRegistry, EditorRequest, PropertyEditor};
