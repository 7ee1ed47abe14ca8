#![forbid(unsafe_code)]

//! Observable properties.
//!
//! A [`Property<T>`] is a named, typed value cell shared between the model,
//! representations and editor bindings. Writes may come from any thread;
//! listeners run synchronously on the writing thread.
//!
//! # Invariants
//!
//! 1. **No-op suppression**: `set(v)` with `v == get()` invokes no listener.
//!    [`Property::touch`] is the only way to notify without a change.
//! 2. **Old/new pairs**: every notification carries the value before and
//!    after the write, in that order.
//! 3. **Failed writes change nothing**: a write rejected by the read-only flag
//!    or the validator leaves the value and listeners untouched.
//! 4. **Idempotent removal**: removing an absent listener returns `false`
//!    and has no other effect.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `ReadOnly` | `set` on a read-only property | Value unchanged |
//! | `InvalidValue` | Validator rejects the value | Value unchanged |
//! | `TypeMismatch` | Untyped write of the wrong kind | Value unchanged |
//! | Listener panic | Bug in listener | Propagates to the writer; value already stored |
//!
//! Listeners are called from a snapshot of the listener list taken after the
//! value is stored, so a listener may add or remove listeners (itself
//! included) without deadlocking. A listener removed during a notification
//! may still receive that one notification.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use crate::array::AnyArrayProperty;
use crate::error::PropertyError;
use crate::sync::{lock, read, write};
use crate::value::{PropertyKind, PropertyType, PropertyValue};

/// Property category. Widgets order their properties by category first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyCategory {
    /// Identity: type and name.
    Widget,
    Position,
    Display,
    Behavior,
    /// Values written while a display executes, e.g. alarm state.
    Runtime,
}

impl fmt::Display for PropertyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Widget => "widget",
            Self::Position => "position",
            Self::Display => "display",
            Self::Behavior => "behavior",
            Self::Runtime => "runtime",
        };
        f.write_str(name)
    }
}

/// Validity check run before a value is stored. `Err` carries the reason.
pub type Validator<T> = Arc<dyn Fn(&T) -> Result<(), String> + Send + Sync>;

/// Listener receiving the old and new value in the property's own type.
pub type TypedListener<T> = Arc<dyn Fn(&T, &T) + Send + Sync>;

/// Listener receiving old and new values as [`PropertyValue`]s.
pub type UntypedListener = Arc<dyn Fn(&PropertyChange) + Send + Sync>;

/// A change delivered to untyped listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    pub property: &'static str,
    pub old: PropertyValue,
    pub new: PropertyValue,
}

/// Static description of a property: everything except its current value.
#[derive(Clone)]
pub struct PropertyDescriptor<T: PropertyType> {
    name: &'static str,
    description: &'static str,
    category: PropertyCategory,
    read_only: bool,
    default: T,
    validator: Option<Validator<T>>,
}

impl<T: PropertyType> PropertyDescriptor<T> {
    #[must_use]
    pub fn new(name: &'static str, category: PropertyCategory, default: T) -> Self {
        Self {
            name,
            description: name,
            category,
            read_only: false,
            default,
            validator: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Reject values for which `check` returns an error message.
    #[must_use]
    pub fn with_validator(
        mut self,
        check: impl Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(check));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn category(&self) -> PropertyCategory {
        self.category
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    fn validate(&self, value: &T) -> Result<(), PropertyError> {
        match &self.validator {
            Some(check) => check(value).map_err(|reason| PropertyError::InvalidValue {
                property: self.name.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

impl<T: PropertyType> fmt::Debug for PropertyDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("read_only", &self.read_only)
            .field("default", &self.default)
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

/// Identifies a registered listener within one property or child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

enum Listener<T> {
    Typed(TypedListener<T>),
    Untyped(UntypedListener),
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Typed(f) => Self::Typed(Arc::clone(f)),
            Self::Untyped(f) => Self::Untyped(Arc::clone(f)),
        }
    }
}

struct Inner<T: PropertyType> {
    descriptor: PropertyDescriptor<T>,
    value: RwLock<T>,
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
    next_listener: AtomicU64,
}

/// Removal side of a listener list, used by [`ListenerHandle`] without
/// knowing what it observes.
pub(crate) trait DetachListener: Send + Sync {
    fn detach(&self, id: ListenerId) -> bool;
}

impl<T: PropertyType> DetachListener for Inner<T> {
    fn detach(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }
}

/// A typed observable value cell. Cloning shares the cell.
pub struct Property<T: PropertyType> {
    inner: Arc<Inner<T>>,
}

impl<T: PropertyType> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: PropertyType> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.inner.descriptor.name)
            .field("value", &*read(&self.inner.value))
            .finish()
    }
}

impl<T: PropertyType> Property<T> {
    /// Create a property holding the descriptor's default.
    #[must_use]
    pub fn new(descriptor: PropertyDescriptor<T>) -> Self {
        let value = descriptor.default.clone();
        Self {
            inner: Arc::new(Inner {
                descriptor,
                value: RwLock::new(value),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    pub fn descriptor(&self) -> &PropertyDescriptor<T> {
        &self.inner.descriptor
    }

    pub fn name(&self) -> &'static str {
        self.inner.descriptor.name
    }

    pub fn category(&self) -> PropertyCategory {
        self.inner.descriptor.category
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.descriptor.read_only
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> T {
        read(&self.inner.value).clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&read(&self.inner.value))
    }

    /// Store `value` and notify listeners if it differs from the current one.
    ///
    /// Returns `Ok(true)` when the value changed.
    pub fn set(&self, value: T) -> Result<bool, PropertyError> {
        if self.inner.descriptor.read_only {
            return Err(PropertyError::ReadOnly {
                property: self.name().to_string(),
            });
        }
        self.store(value)
    }

    /// Like [`set`](Self::set) but ignores the read-only flag.
    ///
    /// Runtime code uses this for values the user may not edit but the
    /// runtime must update. Validation still applies.
    pub fn set_unchecked(&self, value: T) -> Result<bool, PropertyError> {
        self.store(value)
    }

    fn store(&self, value: T) -> Result<bool, PropertyError> {
        self.inner.descriptor.validate(&value)?;
        let old = {
            let mut current = write(&self.inner.value);
            if *current == value {
                return Ok(false);
            }
            std::mem::replace(&mut *current, value.clone())
        };
        self.notify(&old, &value);
        Ok(true)
    }

    /// Notify every listener with `(current, current)`.
    pub fn touch(&self) {
        let current = self.get();
        self.notify(&current, &current);
    }

    pub fn is_default(&self) -> bool {
        *read(&self.inner.value) == self.inner.descriptor.default
    }

    /// Restore the default value through the normal write path.
    pub fn reset(&self) -> Result<bool, PropertyError> {
        self.set_unchecked(self.inner.descriptor.default.clone())
    }

    fn notify(&self, old: &T, new: &T) {
        let snapshot: Vec<Listener<T>> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        if snapshot.is_empty() {
            return;
        }
        let mut change: Option<PropertyChange> = None;
        for listener in snapshot {
            match listener {
                Listener::Typed(f) => f(old, new),
                Listener::Untyped(f) => {
                    let change = change.get_or_insert_with(|| PropertyChange {
                        property: self.name(),
                        old: old.clone().into_value(),
                        new: new.clone().into_value(),
                    });
                    f(change);
                }
            }
        }
    }

    fn register(&self, listener: Listener<T>) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push((id, listener));
        id
    }

    /// Register a typed listener receiving `(old, new)`.
    pub fn add_listener(&self, listener: impl Fn(&T, &T) + Send + Sync + 'static) -> ListenerId {
        self.register(Listener::Typed(Arc::new(listener)))
    }

    /// Register a listener receiving type-erased values.
    pub fn add_untyped_listener(
        &self,
        listener: impl Fn(&PropertyChange) + Send + Sync + 'static,
    ) -> ListenerId {
        self.register(Listener::Untyped(Arc::new(listener)))
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.detach(id)
    }

    /// Register a typed listener that is removed when the handle drops.
    #[must_use = "dropping the handle removes the listener"]
    pub fn listen(&self, listener: impl Fn(&T, &T) + Send + Sync + 'static) -> ListenerHandle {
        let id = self.add_listener(listener);
        self.handle(id)
    }

    /// Register an untyped listener that is removed when the handle drops.
    #[must_use = "dropping the handle removes the listener"]
    pub fn listen_untyped(
        &self,
        listener: impl Fn(&PropertyChange) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let id = self.add_untyped_listener(listener);
        self.handle(id)
    }

    fn handle(&self, id: ListenerId) -> ListenerHandle {
        let target: Weak<dyn DetachListener> =
            Arc::downgrade(&self.inner) as Weak<dyn DetachListener>;
        ListenerHandle::new(target, id)
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Remove every listener.
    pub fn clear_listeners(&self) {
        lock(&self.inner.listeners).clear();
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakProperty<T> {
        WeakProperty {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Non-owning reference to a property, for listeners that must not keep
/// their own target alive.
pub struct WeakProperty<T: PropertyType> {
    inner: Weak<Inner<T>>,
}

impl<T: PropertyType> Clone for WeakProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: PropertyType> WeakProperty<T> {
    pub fn upgrade(&self) -> Option<Property<T>> {
        self.inner.upgrade().map(|inner| Property { inner })
    }
}

/// Owns one listener registration; removes it on drop.
///
/// [`detach`](Self::detach) may be called any number of times and also works
/// after the property itself is gone.
#[derive(Debug)]
pub struct ListenerHandle {
    target: Weak<dyn DetachListener>,
    id: ListenerId,
    attached: bool,
}

impl ListenerHandle {
    pub(crate) fn new(target: Weak<dyn DetachListener>, id: ListenerId) -> Self {
        Self {
            target,
            id,
            attached: true,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn is_attached(&self) -> bool {
        self.attached && self.target.strong_count() > 0
    }

    /// Remove the listener now.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        if let Some(target) = self.target.upgrade() {
            target.detach(self.id);
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A group of listener registrations detached together.
#[derive(Debug, Default)]
pub struct ListenerSet {
    handles: Vec<ListenerHandle>,
}

impl ListenerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: ListenerHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Detach every listener. Safe to call repeatedly.
    pub fn detach_all(&mut self) {
        for handle in &mut self.handles {
            handle.detach();
        }
        self.handles.clear();
    }
}

impl Extend<ListenerHandle> for ListenerSet {
    fn extend<I: IntoIterator<Item = ListenerHandle>>(&mut self, iter: I) {
        self.handles.extend(iter);
    }
}

/// Object-safe view of a property of any type.
pub trait AnyProperty: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn category(&self) -> PropertyCategory;
    fn kind(&self) -> PropertyKind;
    fn is_read_only(&self) -> bool;
    fn is_default(&self) -> bool;
    fn value(&self) -> PropertyValue;
    fn default_value(&self) -> PropertyValue;

    /// Untyped write. Fails with `TypeMismatch` for a value of another kind.
    fn set_value(&self, value: PropertyValue) -> Result<bool, PropertyError>;

    fn add_untyped_listener(&self, listener: UntypedListener) -> ListenerId;

    #[must_use = "dropping the handle removes the listener"]
    fn listen_untyped(&self, listener: UntypedListener) -> ListenerHandle;

    fn remove_listener(&self, id: ListenerId) -> bool;
    fn clear_listeners(&self);
    fn listener_count(&self) -> usize;
    fn touch(&self);

    /// The concrete [`Property<T>`], for typed downcasts.
    fn as_any(&self) -> &dyn Any;

    /// Array operations, if this is an array property.
    fn as_array(&self) -> Option<&dyn AnyArrayProperty> {
        None
    }
}

impl<T: PropertyType> AnyProperty for Property<T> {
    fn name(&self) -> &'static str {
        self.inner.descriptor.name
    }

    fn description(&self) -> &'static str {
        self.inner.descriptor.description
    }

    fn category(&self) -> PropertyCategory {
        self.inner.descriptor.category
    }

    fn kind(&self) -> PropertyKind {
        T::KIND
    }

    fn is_read_only(&self) -> bool {
        self.inner.descriptor.read_only
    }

    fn is_default(&self) -> bool {
        Property::is_default(self)
    }

    fn value(&self) -> PropertyValue {
        self.get().into_value()
    }

    fn default_value(&self) -> PropertyValue {
        self.inner.descriptor.default.clone().into_value()
    }

    fn set_value(&self, value: PropertyValue) -> Result<bool, PropertyError> {
        let typed = T::from_value(&value).ok_or_else(|| PropertyError::TypeMismatch {
            property: self.name().to_string(),
            expected: T::KIND,
        })?;
        self.set(typed)
    }

    fn add_untyped_listener(&self, listener: UntypedListener) -> ListenerId {
        self.register(Listener::Untyped(listener))
    }

    fn listen_untyped(&self, listener: UntypedListener) -> ListenerHandle {
        let id = self.register(Listener::Untyped(listener));
        self.handle(id)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        Property::remove_listener(self, id)
    }

    fn clear_listeners(&self) {
        Property::clear_listeners(self);
    }

    fn listener_count(&self) -> usize {
        Property::listener_count(self)
    }

    fn touch(&self) {
        Property::touch(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
