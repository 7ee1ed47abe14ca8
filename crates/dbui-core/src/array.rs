#![forbid(unsafe_code)]

//! Array-valued properties with a minimum element count.
//!
//! An [`ArrayProperty<E>`] is a `Property<Vec<E>>` plus the two facts the
//! editor needs to resize it: the element default used when growing and the
//! minimum length below which it may not shrink. Every resize is a normal
//! property write, so listeners see one `(old, new)` pair per element added
//! or removed.
//!
//! Element operations read, modify and write back. They are meant for the UI
//! thread; two threads resizing the same array concurrently may lose one of
//! the resizes.

use std::any::Any;
use std::fmt;

use crate::error::PropertyError;
use crate::property::{
    AnyProperty, ListenerHandle, ListenerId, Property, PropertyCategory, PropertyDescriptor,
    UntypedListener,
};
use crate::value::{PropertyKind, PropertyType, PropertyValue};

/// Object-safe array operations, used to resize arrays on widgets whose
/// element type the caller does not know.
pub trait AnyArrayProperty: Send + Sync {
    fn name(&self) -> &'static str;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn min_len(&self) -> usize;
    fn element_kind(&self) -> PropertyKind;

    /// Append one default element.
    fn push_default(&self) -> Result<(), PropertyError>;

    /// Append an element given as a [`PropertyValue`].
    fn push_value(&self, value: PropertyValue) -> Result<(), PropertyError>;

    /// Remove and return the last element; fails at the minimum length.
    fn pop_value(&self) -> Result<PropertyValue, PropertyError>;

    /// The concrete [`ArrayProperty<E>`].
    fn as_any(&self) -> &dyn Any;
}

/// A property holding `Vec<E>` with at least `min_len` elements.
pub struct ArrayProperty<E: PropertyType> {
    property: Property<Vec<E>>,
    min_len: usize,
    element_default: E,
}

impl<E: PropertyType> Clone for ArrayProperty<E> {
    fn clone(&self) -> Self {
        Self {
            property: self.property.clone(),
            min_len: self.min_len,
            element_default: self.element_default.clone(),
        }
    }
}

impl<E: PropertyType> fmt::Debug for ArrayProperty<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayProperty")
            .field("name", &self.property.name())
            .field("len", &self.len())
            .field("min_len", &self.min_len)
            .finish()
    }
}

impl<E: PropertyType> ArrayProperty<E> {
    /// Create an array property.
    ///
    /// `initial` becomes the default value. It is padded with
    /// `element_default` up to `min_len` if shorter.
    #[must_use]
    pub fn new(
        name: &'static str,
        category: PropertyCategory,
        min_len: usize,
        element_default: E,
        mut initial: Vec<E>,
    ) -> Self {
        while initial.len() < min_len {
            initial.push(element_default.clone());
        }
        let descriptor = PropertyDescriptor::new(name, category, initial).with_validator(
            move |items: &Vec<E>| {
                if items.len() < min_len {
                    Err(format!("needs at least {min_len} elements, got {}", items.len()))
                } else {
                    Ok(())
                }
            },
        );
        Self {
            property: Property::new(descriptor),
            min_len,
            element_default,
        }
    }

    /// The underlying `Vec<E>` property.
    pub fn property(&self) -> &Property<Vec<E>> {
        &self.property
    }

    pub fn len(&self) -> usize {
        self.property.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn element(&self, index: usize) -> Option<E> {
        self.property.with(|items| items.get(index).cloned())
    }

    pub fn push(&self, element: E) -> Result<(), PropertyError> {
        let mut items = self.property.get();
        items.push(element);
        self.property.set_unchecked(items).map(|_| ())
    }

    pub fn push_default(&self) -> Result<(), PropertyError> {
        self.push(self.element_default.clone())
    }

    /// Remove the last element.
    ///
    /// Fails with `BelowMinimum` when the array is at its minimum length.
    pub fn pop(&self) -> Result<E, PropertyError> {
        let mut items = self.property.get();
        if items.len() <= self.min_len {
            return Err(PropertyError::BelowMinimum {
                property: self.property.name().to_string(),
                minimum: self.min_len,
                requested: items.len().saturating_sub(1),
            });
        }
        let removed = items.pop();
        self.property.set_unchecked(items)?;
        removed.ok_or_else(|| PropertyError::BelowMinimum {
            property: self.property.name().to_string(),
            minimum: self.min_len,
            requested: 0,
        })
    }
}

impl<E: PropertyType> AnyArrayProperty for ArrayProperty<E> {
    fn name(&self) -> &'static str {
        self.property.name()
    }

    fn len(&self) -> usize {
        ArrayProperty::len(self)
    }

    fn min_len(&self) -> usize {
        self.min_len
    }

    fn element_kind(&self) -> PropertyKind {
        E::KIND
    }

    fn push_default(&self) -> Result<(), PropertyError> {
        ArrayProperty::push_default(self)
    }

    fn push_value(&self, value: PropertyValue) -> Result<(), PropertyError> {
        let element = E::from_value(&value).ok_or_else(|| PropertyError::TypeMismatch {
            property: self.property.name().to_string(),
            expected: E::KIND,
        })?;
        self.push(element)
    }

    fn pop_value(&self) -> Result<PropertyValue, PropertyError> {
        self.pop().map(PropertyType::into_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<E: PropertyType> AnyProperty for ArrayProperty<E> {
    fn name(&self) -> &'static str {
        self.property.name()
    }

    fn description(&self) -> &'static str {
        AnyProperty::description(&self.property)
    }

    fn category(&self) -> PropertyCategory {
        self.property.category()
    }

    fn kind(&self) -> PropertyKind {
        PropertyKind::Array
    }

    fn is_read_only(&self) -> bool {
        self.property.is_read_only()
    }

    fn is_default(&self) -> bool {
        self.property.is_default()
    }

    fn value(&self) -> PropertyValue {
        AnyProperty::value(&self.property)
    }

    fn default_value(&self) -> PropertyValue {
        AnyProperty::default_value(&self.property)
    }

    fn set_value(&self, value: PropertyValue) -> Result<bool, PropertyError> {
        AnyProperty::set_value(&self.property, value)
    }

    fn add_untyped_listener(&self, listener: UntypedListener) -> ListenerId {
        AnyProperty::add_untyped_listener(&self.property, listener)
    }

    fn listen_untyped(&self, listener: UntypedListener) -> ListenerHandle {
        AnyProperty::listen_untyped(&self.property, listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.property.remove_listener(id)
    }

    fn clear_listeners(&self) {
        self.property.clear_listeners();
    }

    fn listener_count(&self) -> usize {
        self.property.listener_count()
    }

    fn touch(&self) {
        self.property.touch();
    }

    // Typed access goes through the inner `Property<Vec<E>>`.
    fn as_any(&self) -> &dyn Any {
        &self.property
    }

    fn as_array(&self) -> Option<&dyn AnyArrayProperty> {
        Some(self)
    }
}
