#![forbid(unsafe_code)]

//! Representations: the per-widget adapters that own native nodes.
//!
//! An adapter implements [`Representation`]. The runtime wraps it in a
//! [`RepresentationCell`], which drives the lifecycle:
//!
//! ```text
//! Uncreated ──create()──▶ Live ──dispose()──▶ Disposed
//!                          │  ▲
//!                          └──┘ update_changes() per scheduled pass
//! ```
//!
//! `create` calls [`Representation::create_node`] once, inserts the node
//! into its parent, then calls [`Representation::register_listeners`] once.
//! Listeners registered through the [`ListenerRegistrar`] only mark dirty
//! flags and request a pass; all node mutation happens in
//! [`Representation::reconcile`], on the UI thread.
//!
//! # Failure Modes
//!
//! | Stage | Failure | Effect |
//! |-------|---------|--------|
//! | `create_node` | error or panic | Cell disposed, error returned to caller |
//! | `register_listeners` | error or panic | Node removed, cell disposed, error returned |
//! | `reconcile(flag)` | error or panic | Logged; remaining flags still serviced |
//! | pass after dispose | none | Silently skipped |
//!
//! # Invariants
//!
//! 1. The node is only touched while the cell's state lock is held, and
//!    disposal sets the `DISPOSED` bit under that same lock. A pass that
//!    acquires the lock after disposal sees the bit and returns.
//! 2. Flags are serviced in [`DirtyFlags::ORDER`].
//! 3. Every listener registered through the registrar is detached by
//!    `dispose`.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, Weak};

use dbui_core::sync::lock;
use dbui_core::{
    ListenerSet, ModelError, Property, PropertyChange, PropertyError, PropertyType, Widget,
};

use crate::config::RuntimeConfig;
use crate::debug_trace::{self, TraceEvent};
use crate::dirty::{DirtyFlags, DirtySet};
use crate::scheduler::{PassOutcome, PendingPass, UpdateScheduler};
use crate::toolkit::{Toolkit, ToolkitError};

/// Failure inside adapter code.
#[derive(Debug, Clone, PartialEq)]
pub enum RepresentationError {
    Toolkit(ToolkitError),
    Property(PropertyError),
    Model(ModelError),
    /// No representation is registered for the widget type.
    Unsupported(String),
    /// Adapter-specific failure.
    Failed(String),
    /// Adapter code panicked; carries the panic message.
    Panicked(String),
}

impl fmt::Display for RepresentationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toolkit(e) => write!(f, "toolkit: {e}"),
            Self::Property(e) => write!(f, "property: {e}"),
            Self::Model(e) => write!(f, "model: {e}"),
            Self::Unsupported(t) => write!(f, "no representation for widget type '{t}'"),
            Self::Failed(msg) => write!(f, "{msg}"),
            Self::Panicked(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

impl std::error::Error for RepresentationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Toolkit(e) => Some(e),
            Self::Property(e) => Some(e),
            Self::Model(e) => Some(e),
            Self::Unsupported(_) | Self::Failed(_) | Self::Panicked(_) => None,
        }
    }
}

impl From<ToolkitError> for RepresentationError {
    fn from(e: ToolkitError) -> Self {
        Self::Toolkit(e)
    }
}

impl From<PropertyError> for RepresentationError {
    fn from(e: PropertyError) -> Self {
        Self::Property(e)
    }
}

impl From<ModelError> for RepresentationError {
    fn from(e: ModelError) -> Self {
        Self::Model(e)
    }
}

/// What a reconcile step may read and mutate.
pub struct ReconcileContext<'a, T: Toolkit> {
    pub toolkit: &'a T,
    pub node: &'a T::Node,
    pub widget: &'a Widget,
}

/// Per-widget adapter between the model and a native node.
pub trait Representation<T: Toolkit>: Send + 'static {
    /// Build the native node from the widget's current values.
    fn create_node(&mut self, toolkit: &T, widget: &Widget) -> Result<T::Node, RepresentationError>;

    /// Attach one listener per property of interest.
    fn register_listeners(
        &mut self,
        widget: &Widget,
        registrar: &mut ListenerRegistrar,
    ) -> Result<(), RepresentationError>;

    /// Apply one dirty category to the node.
    fn reconcile(
        &mut self,
        flag: DirtyFlags,
        cx: &ReconcileContext<'_, T>,
    ) -> Result<(), RepresentationError>;

    /// Keep `flag` pending instead of servicing it in this pass.
    ///
    /// An adapter that defers must call [`UpdateRequester::request`] when it
    /// stops deferring.
    fn defers(&self, _flag: DirtyFlags) -> bool {
        false
    }

    /// Node under which child widgets are inserted. `None` for leaves.
    fn child_parent(&self) -> Option<T::Node> {
        None
    }

    /// Release adapter-held resources. The node is removed by the runtime.
    fn dispose(&mut self, _toolkit: &T) {}

    /// Access to the concrete adapter, mainly for tests and capability
    /// queries.
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}

type Notify = Arc<dyn Fn(DirtyFlags) + Send + Sync>;

/// Requests a pass for one representation from any thread.
#[derive(Clone)]
pub struct UpdateRequester {
    notify: Notify,
}

impl fmt::Debug for UpdateRequester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UpdateRequester")
    }
}

impl UpdateRequester {
    /// Mark `flags` and schedule a pass.
    pub fn request(&self, flags: DirtyFlags) {
        (self.notify)(flags);
    }
}

/// Collects the listeners a representation attaches.
pub struct ListenerRegistrar {
    widget: Widget,
    notify: Notify,
    handles: ListenerSet,
    watched: DirtyFlags,
}

impl ListenerRegistrar {
    pub fn widget(&self) -> &Widget {
        &self.widget
    }

    /// On any change of `name`, mark `flags` and request a pass.
    pub fn watch(&mut self, name: &str, flags: DirtyFlags) -> Result<(), ModelError> {
        self.watch_with(name, flags, |_| {})
    }

    /// Like [`watch`](Self::watch), running `hook` first. Use the hook to
    /// refresh cached values the reconcile step reads.
    pub fn watch_with(
        &mut self,
        name: &str,
        flags: DirtyFlags,
        hook: impl Fn(&PropertyChange) + Send + Sync + 'static,
    ) -> Result<(), ModelError> {
        let notify = Arc::clone(&self.notify);
        let handle = self.widget.listen(name, move |change| {
            hook(change);
            notify(flags);
        })?;
        self.handles.push(handle);
        self.watched |= flags;
        Ok(())
    }

    /// Watch `name` if the widget has it. Returns whether it was found.
    pub fn watch_optional(&mut self, name: &str, flags: DirtyFlags) -> bool {
        self.watch(name, flags).is_ok()
    }

    /// Watch a property handle directly, e.g. one not owned by the widget.
    pub fn watch_property<P: PropertyType>(&mut self, property: &Property<P>, flags: DirtyFlags) {
        let notify = Arc::clone(&self.notify);
        self.handles.push(property.listen(move |_, _| notify(flags)));
        self.watched |= flags;
    }

    /// Union of every flag a watch registered so far.
    pub fn watched(&self) -> DirtyFlags {
        self.watched
    }

    pub fn requester(&self) -> UpdateRequester {
        UpdateRequester {
            notify: Arc::clone(&self.notify),
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Lifecycle state of a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uncreated,
    Live,
    Disposed,
}

struct CellState<T: Toolkit> {
    representation: Box<dyn Representation<T>>,
    node: Option<T::Node>,
    parent: Option<T::Node>,
    listeners: ListenerSet,
    lifecycle: Lifecycle,
}

/// A representation plus the runtime state around it.
pub struct RepresentationCell<T: Toolkit> {
    widget: Widget,
    toolkit: Arc<T>,
    scheduler: UpdateScheduler,
    dirty: DirtySet,
    state: Mutex<CellState<T>>,
    catch_panics: bool,
    trace_passes: bool,
    this: Weak<RepresentationCell<T>>,
}

impl<T: Toolkit> fmt::Debug for RepresentationCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepresentationCell")
            .field("widget", &self.widget)
            .field("pending", &self.dirty.pending())
            .field("disposed", &self.dirty.is_disposed())
            .finish()
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<T: Toolkit> RepresentationCell<T> {
    pub fn new(
        widget: Widget,
        representation: Box<dyn Representation<T>>,
        toolkit: Arc<T>,
        scheduler: UpdateScheduler,
        config: &RuntimeConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            widget,
            toolkit,
            scheduler,
            dirty: DirtySet::new(),
            state: Mutex::new(CellState {
                representation,
                node: None,
                parent: None,
                listeners: ListenerSet::new(),
                lifecycle: Lifecycle::Uncreated,
            }),
            catch_panics: config.catch_panics,
            trace_passes: config.trace_passes,
            this: Weak::clone(this),
        })
    }

    pub fn widget(&self) -> &Widget {
        &self.widget
    }

    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    pub fn lifecycle(&self) -> Lifecycle {
        lock(&self.state).lifecycle
    }

    pub fn node(&self) -> Option<T::Node> {
        lock(&self.state).node.clone()
    }

    /// Node under which this widget's children go.
    pub fn child_parent(&self) -> Option<T::Node> {
        let state = lock(&self.state);
        match state.lifecycle {
            Lifecycle::Live => state.representation.child_parent(),
            _ => None,
        }
    }

    /// Number of listeners currently attached on behalf of this cell.
    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    /// Run `f` against the concrete adapter.
    pub fn with_representation<R>(&self, f: impl FnOnce(&dyn Representation<T>) -> R) -> R {
        f(lock(&self.state).representation.as_ref())
    }

    fn guarded<R>(
        &self,
        f: impl FnOnce() -> Result<R, RepresentationError>,
    ) -> Result<R, RepresentationError> {
        if !self.catch_panics {
            return f();
        }
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result,
            Err(payload) => Err(RepresentationError::Panicked(panic_message(payload))),
        }
    }

    fn requester(&self) -> UpdateRequester {
        let weak = Weak::clone(&self.this);
        UpdateRequester {
            notify: Arc::new(move |flags| {
                if let Some(cell) = weak.upgrade() {
                    cell.request(flags);
                }
            }),
        }
    }

    /// Mark `flags` and schedule a pass. Safe from any thread.
    pub fn request(self: &Arc<Self>, flags: DirtyFlags) {
        self.dirty.mark(flags);
        let target: Arc<dyn PendingPass> = Arc::clone(self) as Arc<dyn PendingPass>;
        self.scheduler.schedule_update(&target);
    }

    /// Create the node, insert it into `parent` at `index` and register
    /// listeners. UI thread only.
    pub fn create(&self, parent: &T::Node, index: usize) -> Result<(), RepresentationError> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        if state.lifecycle != Lifecycle::Uncreated {
            return Err(RepresentationError::Failed(format!(
                "{} already created",
                self.widget.id()
            )));
        }

        let created =
            self.guarded(|| state.representation.create_node(&self.toolkit, &self.widget));
        let node = match created {
            Ok(node) => node,
            Err(e) => {
                self.dirty.dispose();
                state.lifecycle = Lifecycle::Disposed;
                return Err(e);
            }
        };
        if let Err(e) = self.toolkit.insert_child(parent, index, &node) {
            self.dirty.dispose();
            state.lifecycle = Lifecycle::Disposed;
            return Err(e.into());
        }

        let mut registrar = ListenerRegistrar {
            widget: self.widget.clone(),
            notify: self.requester().notify,
            handles: ListenerSet::new(),
            watched: DirtyFlags::empty(),
        };
        let registered = self.guarded(|| {
            state
                .representation
                .register_listeners(&self.widget, &mut registrar)
        });
        if let Err(e) = registered {
            registrar.handles.detach_all();
            self.dirty.dispose();
            if let Err(remove) = self.toolkit.remove_child(parent, &node) {
                tracing::warn!(widget = %self.widget.id(), error = %remove, "node removal failed");
            }
            state.lifecycle = Lifecycle::Disposed;
            return Err(e);
        }

        let watched = registrar.watched;
        let notify = Arc::clone(&registrar.notify);
        state.listeners = registrar.handles;
        state.node = Some(node);
        state.parent = Some(parent.clone());
        state.lifecycle = Lifecycle::Live;
        tracing::debug!(
            widget = %self.widget.id(),
            widget_type = self.widget.type_tag(),
            index,
            listeners = state.listeners.len(),
            "representation created"
        );
        drop(guard);
        debug_trace::emit(TraceEvent::Created {
            widget: self.widget.id(),
            watched,
        });
        // Writes that landed between create_node and the listeners
        // attaching raised no event; one pass over every watched flag
        // picks them up.
        if !watched.is_empty() {
            notify(watched);
        }
        Ok(())
    }

    /// Reconcile every pending flag. UI thread only.
    pub fn update_changes(&self) -> PassOutcome {
        let mut guard = lock(&self.state);
        if !self.dirty.begin_pass() {
            return PassOutcome::Stale;
        }
        let state = &mut *guard;
        let (Lifecycle::Live, Some(node)) = (state.lifecycle, state.node.clone()) else {
            return PassOutcome::Stale;
        };

        let cx = ReconcileContext {
            toolkit: &*self.toolkit,
            node: &node,
            widget: &self.widget,
        };
        let mut serviced = 0;
        let mut failed = 0;
        let mut flags = DirtyFlags::empty();
        for flag in DirtyFlags::ORDER {
            if state.representation.defers(flag) || !self.dirty.check_and_clear(flag) {
                continue;
            }
            serviced += 1;
            flags |= flag;
            let representation = &mut state.representation;
            if let Err(e) = self.guarded(|| representation.reconcile(flag, &cx)) {
                failed += 1;
                tracing::warn!(
                    widget = %self.widget.id(),
                    flag = ?flag,
                    error = %e,
                    "reconcile failed"
                );
            }
        }
        if self.trace_passes {
            tracing::trace!(widget = %self.widget.id(), serviced, failed, "pass");
        }
        debug_trace::emit(TraceEvent::Pass {
            widget: self.widget.id(),
            flags,
            failed,
        });
        PassOutcome::Ran { serviced, failed }
    }

    /// Detach listeners, remove the node and make every later pass a no-op.
    ///
    /// Off the UI thread, the node removal is posted to the UI thread; the
    /// cell is already inert when this returns. Returns `false` if it was
    /// already disposed.
    pub fn dispose(&self) -> bool {
        let mut guard = lock(&self.state);
        if !self.dirty.dispose() {
            return false;
        }
        guard.listeners.detach_all();
        if self.toolkit.is_ui_thread() {
            self.teardown(&mut guard);
        } else {
            drop(guard);
            let weak = Weak::clone(&self.this);
            self.toolkit.execute(Box::new(move || {
                if let Some(cell) = weak.upgrade() {
                    let mut guard = lock(&cell.state);
                    cell.teardown(&mut guard);
                }
            }));
        }
        true
    }

    fn teardown(&self, state: &mut CellState<T>) {
        if state.lifecycle == Lifecycle::Disposed {
            return;
        }
        let toolkit = &*self.toolkit;
        let representation = &mut state.representation;
        if let Err(e) = self.guarded(|| {
            representation.dispose(toolkit);
            Ok(())
        }) {
            tracing::warn!(widget = %self.widget.id(), error = %e, "adapter dispose failed");
        }
        if let (Some(parent), Some(node)) = (state.parent.take(), state.node.take()) {
            if let Err(e) = toolkit.remove_child(&parent, &node) {
                tracing::warn!(widget = %self.widget.id(), error = %e, "node removal failed");
            }
        }
        state.lifecycle = Lifecycle::Disposed;
        tracing::debug!(widget = %self.widget.id(), "representation disposed");
        debug_trace::emit(TraceEvent::Disposed {
            widget: self.widget.id(),
        });
    }
}

impl<T: Toolkit> PendingPass for RepresentationCell<T> {
    fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    fn run_pass(&self) -> PassOutcome {
        self.update_changes()
    }
}
