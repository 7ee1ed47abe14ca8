#![forbid(unsafe_code)]

//! Widgets: ordered property bags with an optional child list.
//!
//! # Ownership
//!
//! A container's child list is the only owning edge in the model. The
//! child's link back to its container is a [`Weak`] reference, so dropping
//! the root of a display drops the whole tree even though every child can
//! find its parent.
//!
//! # Invariants
//!
//! 1. Property names are unique within a widget.
//! 2. Properties are ordered by category, then by definition order, and the
//!    order never changes after construction.
//! 3. A widget has at most one parent, and `parent()` of every child in
//!    `children()` is the container.
//! 4. Removing a child clears its parent link and detaches every listener
//!    in the removed subtree.
//!
//! Children notifications run on the thread that changed the child list,
//! after the change is visible through `children()`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use crate::array::ArrayProperty;
use crate::error::ModelError;
use crate::property::{
    AnyProperty, DetachListener, ListenerHandle, ListenerId, ListenerSet, Property,
    PropertyCategory, PropertyChange, PropertyDescriptor,
};
use crate::sync::{lock, read, write};
use crate::value::PropertyType;

/// Names of the properties every widget carries.
pub mod props {
    pub const TYPE: &str = "type";
    pub const NAME: &str = "name";
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const VISIBLE: &str = "visible";
}

static NEXT_WIDGET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique widget identity. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(u64);

impl WidgetId {
    fn next() -> Self {
        Self(NEXT_WIDGET_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// A change to a container's child list.
#[derive(Debug, Clone)]
pub enum ChildrenChange {
    Added { child: Widget, index: usize },
    Removed { child: Widget, index: usize },
}

impl ChildrenChange {
    pub fn child(&self) -> &Widget {
        match self {
            Self::Added { child, .. } | Self::Removed { child, .. } => child,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Added { index, .. } | Self::Removed { index, .. } => *index,
        }
    }
}

pub type ChildrenListener = Arc<dyn Fn(&ChildrenChange) + Send + Sync>;

struct ChildrenList {
    items: RwLock<Vec<Widget>>,
    listeners: Mutex<Vec<(ListenerId, ChildrenListener)>>,
    next_listener: AtomicU64,
}

impl ChildrenList {
    fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    fn notify(&self, change: &ChildrenChange) {
        let snapshot: Vec<ChildrenListener> =
            lock(&self.listeners).iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in snapshot {
            listener(change);
        }
    }
}

impl DetachListener for ChildrenList {
    fn detach(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }
}

struct WidgetInner {
    id: WidgetId,
    type_tag: String,
    properties: Vec<Arc<dyn AnyProperty>>,
    index: HashMap<&'static str, usize>,
    parent: RwLock<Weak<WidgetInner>>,
    children: Option<Arc<ChildrenList>>,
}

/// A shared handle to a widget. Cloning shares the widget.
#[derive(Clone)]
pub struct Widget {
    inner: Arc<WidgetInner>,
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("id", &self.inner.id)
            .field("type", &self.inner.type_tag)
            .field("name", &self.name())
            .finish()
    }
}

impl PartialEq for Widget {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Widget {}

/// Builds a [`Widget`] from the mandatory properties plus type-specific ones.
pub struct WidgetBuilder {
    type_tag: String,
    name: String,
    container: bool,
    bounds: (i64, i64, i64, i64),
    extra: Vec<Arc<dyn AnyProperty>>,
}

impl WidgetBuilder {
    #[must_use]
    pub fn new(type_tag: impl Into<String>) -> Self {
        let type_tag = type_tag.into();
        Self {
            name: type_tag.clone(),
            type_tag,
            container: false,
            bounds: (0, 0, 100, 20),
            extra: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Give the widget a child list.
    #[must_use]
    pub fn container(mut self) -> Self {
        self.container = true;
        self
    }

    /// Default position and size.
    #[must_use]
    pub fn bounds(mut self, x: i64, y: i64, width: i64, height: i64) -> Self {
        self.bounds = (x, y, width, height);
        self
    }

    #[must_use]
    pub fn property<T: PropertyType>(mut self, descriptor: PropertyDescriptor<T>) -> Self {
        self.extra.push(Arc::new(Property::new(descriptor)));
        self
    }

    #[must_use]
    pub fn array<E: PropertyType>(mut self, array: ArrayProperty<E>) -> Self {
        self.extra.push(Arc::new(array));
        self
    }

    pub fn build(self) -> Result<Widget, ModelError> {
        let (x, y, width, height) = self.bounds;
        let size_check = |v: &i64| {
            if *v >= 0 {
                Ok(())
            } else {
                Err(format!("size must not be negative, got {v}"))
            }
        };
        let mut properties: Vec<Arc<dyn AnyProperty>> = vec![
            Arc::new(Property::new(
                PropertyDescriptor::new(
                    props::TYPE,
                    PropertyCategory::Widget,
                    self.type_tag.clone(),
                )
                    .with_description("Widget type")
                    .read_only(),
            )),
            Arc::new(Property::new(
                PropertyDescriptor::new(props::NAME, PropertyCategory::Widget, self.name)
                    .with_description("Widget name"),
            )),
            Arc::new(Property::new(PropertyDescriptor::new(
                props::X,
                PropertyCategory::Position,
                x,
            ))),
            Arc::new(Property::new(PropertyDescriptor::new(
                props::Y,
                PropertyCategory::Position,
                y,
            ))),
            Arc::new(Property::new(
                PropertyDescriptor::new(props::WIDTH, PropertyCategory::Position, width)
                    .with_validator(size_check),
            )),
            Arc::new(Property::new(
                PropertyDescriptor::new(props::HEIGHT, PropertyCategory::Position, height)
                    .with_validator(size_check),
            )),
            Arc::new(Property::new(
                PropertyDescriptor::new(props::VISIBLE, PropertyCategory::Position, true)
                    .with_description("Visible"),
            )),
        ];
        properties.extend(self.extra);
        // Stable: definition order survives within a category.
        properties.sort_by_key(|p| p.category());

        let mut index = HashMap::with_capacity(properties.len());
        for (i, p) in properties.iter().enumerate() {
            if index.insert(p.name(), i).is_some() {
                return Err(ModelError::DuplicateProperty {
                    widget: self.type_tag,
                    property: p.name().to_string(),
                });
            }
        }

        Ok(Widget {
            inner: Arc::new(WidgetInner {
                id: WidgetId::next(),
                type_tag: self.type_tag,
                properties,
                index,
                parent: RwLock::new(Weak::new()),
                children: self.container.then(|| Arc::new(ChildrenList::new())),
            }),
        })
    }
}

impl Widget {
    pub fn id(&self) -> WidgetId {
        self.inner.id
    }

    pub fn type_tag(&self) -> &str {
        &self.inner.type_tag
    }

    /// Current value of the `name` property.
    pub fn name(&self) -> String {
        self.property::<String>(props::NAME)
            .map(|p| p.get())
            .unwrap_or_default()
    }

    /// All properties in category, then definition order.
    pub fn properties(&self) -> impl Iterator<Item = &Arc<dyn AnyProperty>> {
        self.inner.properties.iter()
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.inner.index.contains_key(name)
    }

    pub fn property_dyn(&self, name: &str) -> Option<Arc<dyn AnyProperty>> {
        self.inner
            .index
            .get(name)
            .map(|&i| Arc::clone(&self.inner.properties[i]))
    }

    /// Typed lookup. `None` if absent or of another type.
    pub fn property<T: PropertyType>(&self, name: &str) -> Option<Property<T>> {
        let &i = self.inner.index.get(name)?;
        self.inner.properties[i]
            .as_any()
            .downcast_ref::<Property<T>>()
            .cloned()
    }

    /// Typed array lookup. `None` if absent or not an array of `E`.
    pub fn array<E: PropertyType>(&self, name: &str) -> Option<ArrayProperty<E>> {
        let &i = self.inner.index.get(name)?;
        self.inner.properties[i]
            .as_array()?
            .as_any()
            .downcast_ref::<ArrayProperty<E>>()
            .cloned()
    }

    /// Like [`property_dyn`](Self::property_dyn) but an unknown name is an error.
    pub fn require(&self, name: &str) -> Result<Arc<dyn AnyProperty>, ModelError> {
        self.property_dyn(name)
            .ok_or_else(|| ModelError::UnknownProperty {
                widget: self.name(),
                property: name.to_string(),
            })
    }

    /// Listen to one property by name.
    #[must_use = "dropping the handle removes the listener"]
    pub fn listen(
        &self,
        name: &str,
        listener: impl Fn(&PropertyChange) + Send + Sync + 'static,
    ) -> Result<ListenerHandle, ModelError> {
        Ok(self.require(name)?.listen_untyped(Arc::new(listener)))
    }

    /// Listen to every property of this widget.
    pub fn listen_all(
        &self,
        listener: impl Fn(&PropertyChange) + Send + Sync + 'static,
    ) -> ListenerSet {
        let listener: Arc<dyn Fn(&PropertyChange) + Send + Sync> = Arc::new(listener);
        let mut set = ListenerSet::new();
        for p in &self.inner.properties {
            set.push(p.listen_untyped(Arc::clone(&listener)));
        }
        set
    }

    /// Remove every property and children listener in this subtree.
    pub fn detach_listeners(&self) {
        for p in &self.inner.properties {
            p.clear_listeners();
        }
        if let Some(children) = &self.inner.children {
            lock(&children.listeners).clear();
            for child in read(&children.items).iter() {
                child.detach_listeners();
            }
        }
    }

    // ── containment ──────────────────────────────────────────────────

    pub fn parent(&self) -> Option<Widget> {
        read(&self.inner.parent).upgrade().map(|inner| Widget { inner })
    }

    pub fn is_container(&self) -> bool {
        self.inner.children.is_some()
    }

    /// Snapshot of the child list; empty for non-containers.
    pub fn children(&self) -> Vec<Widget> {
        self.inner
            .children
            .as_ref()
            .map(|c| read(&c.items).clone())
            .unwrap_or_default()
    }

    pub fn child_count(&self) -> usize {
        self.inner
            .children
            .as_ref()
            .map_or(0, |c| read(&c.items).len())
    }

    pub fn child_index(&self, child: &Widget) -> Option<usize> {
        let children = self.inner.children.as_ref()?;
        read(&children.items).iter().position(|c| c == child)
    }

    /// Depth-first search of the subtree for a widget with this name.
    pub fn child_by_name(&self, name: &str) -> Option<Widget> {
        for child in self.children() {
            if child.name() == name {
                return Some(child);
            }
            if let Some(found) = child.child_by_name(name) {
                return Some(found);
            }
        }
        None
    }

    fn child_list(&self) -> Result<&Arc<ChildrenList>, ModelError> {
        self.inner
            .children
            .as_ref()
            .ok_or_else(|| ModelError::NotAContainer(self.name()))
    }

    pub fn add_child(&self, child: Widget) -> Result<(), ModelError> {
        let len = self.child_count();
        self.insert_child(len, child)
    }

    /// Insert `child` at `index`, which may equal the current length.
    pub fn insert_child(&self, index: usize, child: Widget) -> Result<(), ModelError> {
        let list = self.child_list()?;
        let mut ancestor = Some(self.clone());
        while let Some(a) = ancestor {
            if a == child {
                return Err(ModelError::WouldCycle { child: child.name() });
            }
            ancestor = a.parent();
        }
        {
            let mut items = write(&list.items);
            let mut parent = write(&child.inner.parent);
            if parent.upgrade().is_some() || items.contains(&child) {
                return Err(ModelError::AlreadyParented { child: child.name() });
            }
            if index > items.len() {
                return Err(ModelError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            *parent = Arc::downgrade(&self.inner);
            items.insert(index, child.clone());
        }
        tracing::trace!(container = %self.id(), child = %child.id(), index, "child added");
        list.notify(&ChildrenChange::Added { child, index });
        Ok(())
    }

    /// Remove `child`, returning the index it had.
    pub fn remove_child(&self, child: &Widget) -> Result<usize, ModelError> {
        let list = self.child_list()?;
        let index = {
            let mut items = write(&list.items);
            let index = items.iter().position(|c| c == child).ok_or_else(|| {
                ModelError::NotAChild {
                    child: child.name(),
                    container: self.name(),
                }
            })?;
            items.remove(index);
            *write(&child.inner.parent) = Weak::new();
            index
        };
        tracing::trace!(container = %self.id(), child = %child.id(), index, "child removed");
        list.notify(&ChildrenChange::Removed {
            child: child.clone(),
            index,
        });
        child.detach_listeners();
        Ok(index)
    }

    /// Observe additions and removals in this container's child list.
    #[must_use = "dropping the handle removes the listener"]
    pub fn listen_children(
        &self,
        listener: impl Fn(&ChildrenChange) + Send + Sync + 'static,
    ) -> Result<ListenerHandle, ModelError> {
        let list = self.child_list()?;
        let id = ListenerId(list.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&list.listeners).push((id, Arc::new(listener)));
        let target: Weak<dyn DetachListener> = Arc::downgrade(list) as Weak<dyn DetachListener>;
        Ok(ListenerHandle::new(target, id))
    }

    pub fn children_listener_count(&self) -> usize {
        self.inner
            .children
            .as_ref()
            .map_or(0, |c| lock(&c.listeners).len())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
