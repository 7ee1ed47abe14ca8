#![forbid(unsafe_code)]

//! Property and widget model for the display builder runtime.
//!
//! - [`property`]: observable typed value cells with typed and untyped
//!   listeners.
//! - [`array`]: array properties with a minimum element count.
//! - [`widget`]: ordered property bags with weak parent links and child
//!   lists.
//! - [`factory`]: widget construction keyed on type tag.
//!
//! Everything here is safe to use from any thread. Nothing here touches a
//! UI toolkit; see `dbui-runtime` for that.

pub mod array;
pub mod error;
pub mod factory;
pub mod logging;
pub mod property;
pub mod sync;
pub mod value;
pub mod widget;

pub use array::{AnyArrayProperty, ArrayProperty};
pub use error::{ModelError, PropertyError};
pub use factory::{PropertyInfo, WidgetDescriptor, WidgetFactory};
pub use property::{
    AnyProperty, ListenerHandle, ListenerId, ListenerSet, Property, PropertyCategory,
    PropertyChange, PropertyDescriptor, WeakProperty,
};
pub use value::{Choice, Color, PropertyKind, PropertyType, PropertyValue};
pub use widget::{ChildrenChange, Widget, WidgetBuilder, WidgetId, props};
