#![forbid(unsafe_code)]

//! Display builder runtime public facade crate.
//!
//! Re-exports the model, the runtime and (with the `editor` feature) the
//! editor under one name, plus a prelude for toolkit adapters.

use std::fmt;

// --- Model re-exports ------------------------------------------------------

pub use dbui_core::{
    AnyArrayProperty, AnyProperty, ArrayProperty, ChildrenChange, Choice, Color, ListenerHandle,
    ModelError, Property, PropertyCategory, PropertyChange, PropertyDescriptor, PropertyError,
    PropertyKind, PropertyType, PropertyValue, Widget, WidgetBuilder, WidgetDescriptor,
    WidgetFactory, WidgetId, props,
};

// --- Runtime re-exports ----------------------------------------------------

pub use dbui_runtime::{
    AlarmSeverity, DirtyFlags, EditGuard, EditState, Geometry, HasAlarmBorder, HasGeometry,
    HasValueBinding, HostError, ListenerRegistrar, ReconcileContext, Representation,
    RepresentationError, RepresentationHost, RuntimeConfig, Session, Toolkit, ToolkitError,
    UiExecutor, UpdateRequester,
};

// --- Editor re-exports -----------------------------------------------------

#[cfg(feature = "editor")]
pub use dbui_editor::{
    ActionGroup, ArraySizeBinding, EditControl, EditorError, EditorRegistry, EditorRequest,
    HistoryConfig, PropertyBinding, PropertyEditor, SharedUndo, UndoManager, UndoableAction,
};

// --- Errors ---------------------------------------------------------------

/// Any error the display builder APIs return.
#[derive(Debug)]
pub enum Error {
    Model(ModelError),
    Property(PropertyError),
    Host(HostError),
    Representation(RepresentationError),
    #[cfg(feature = "editor")]
    Editor(EditorError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(err) => write!(f, "{err}"),
            Self::Property(err) => write!(f, "{err}"),
            Self::Host(err) => write!(f, "{err}"),
            Self::Representation(err) => write!(f, "{err}"),
            #[cfg(feature = "editor")]
            Self::Editor(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ModelError> for Error {
    fn from(err: ModelError) -> Self {
        Self::Model(err)
    }
}

impl From<PropertyError> for Error {
    fn from(err: PropertyError) -> Self {
        Self::Property(err)
    }
}

impl From<HostError> for Error {
    fn from(err: HostError) -> Self {
        Self::Host(err)
    }
}

impl From<RepresentationError> for Error {
    fn from(err: RepresentationError) -> Self {
        Self::Representation(err)
    }
}

#[cfg(feature = "editor")]
impl From<EditorError> for Error {
    fn from(err: EditorError) -> Self {
        Self::Editor(err)
    }
}

/// Standard result type for display builder APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Install the environment-configured log subscriber. See
/// [`dbui_core::logging`].
#[cfg(feature = "logging")]
pub fn init_logging() -> bool {
    dbui_core::logging::try_init()
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        DirtyFlags, Error, ListenerRegistrar, Property, ReconcileContext, Representation,
        RepresentationError, Result, RuntimeConfig, Session, Toolkit, UiExecutor, Widget,
        WidgetFactory,
    };

    #[cfg(feature = "editor")]
    pub use crate::{PropertyBinding, UndoManager};

    pub use crate::{core, runtime};

    #[cfg(feature = "editor")]
    pub use crate::editor;
}

pub use dbui_core as core;
#[cfg(feature = "editor")]
pub use dbui_editor as editor;
pub use dbui_runtime as runtime;
