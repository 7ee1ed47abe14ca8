#![forbid(unsafe_code)]

//! Representation host: represents whole widget trees.
//!
//! The host maps widget type tags to representation factories. Given a
//! model root and a native parent node it represents every child widget,
//! recursing into containers, and keeps the native tree in step with later
//! changes to any represented container's child list.
//!
//! # Invariants
//!
//! 1. A widget has at most one live representation per host.
//! 2. Native child order mirrors model child order: a widget is inserted at
//!    the number of represented siblings that precede it in the model.
//! 3. Children are disposed before their container.
//! 4. One widget failing to represent never stops its siblings. Its own
//!    subtree is skipped.
//!
//! # Failure Modes
//!
//! | Failure | Logged at | Effect |
//! |---------|-----------|--------|
//! | No factory for type | `warn` | Widget and subtree skipped |
//! | `create_node` / `register_listeners` fails | `error` | Widget and subtree skipped |
//! | `represent_model` off the UI thread | none | `HostError::WrongThread` |

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use dbui_core::sync::{lock, read, write};
use dbui_core::{ChildrenChange, ListenerHandle, Widget, WidgetId};

use crate::config::RuntimeConfig;
use crate::representation::{Representation, RepresentationCell, RepresentationError};
use crate::scheduler::UpdateScheduler;
use crate::toolkit::Toolkit;

/// Builds the representation for one widget.
pub type RepresentationFactory<T> =
    Arc<dyn Fn(&Widget) -> Box<dyn Representation<T>> + Send + Sync>;

/// Host-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    /// Native nodes may only be created on the UI thread.
    WrongThread,
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongThread => f.write_str("representations must be created on the UI thread"),
        }
    }
}

impl std::error::Error for HostError {}

/// A widget that could not be represented.
#[derive(Debug, Clone, PartialEq)]
pub struct RepresentFailure {
    pub widget: WidgetId,
    pub widget_type: String,
    pub error: RepresentationError,
}

/// Outcome of representing a tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepresentReport {
    pub represented: usize,
    pub failures: Vec<RepresentFailure>,
}

impl RepresentReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct HostInner<T: Toolkit> {
    toolkit: Arc<T>,
    scheduler: UpdateScheduler,
    config: RuntimeConfig,
    factories: RwLock<HashMap<String, RepresentationFactory<T>>>,
    cells: Mutex<HashMap<WidgetId, Arc<RepresentationCell<T>>>>,
    tracked: Mutex<HashMap<WidgetId, ListenerHandle>>,
    roots: Mutex<Vec<Widget>>,
    this: Weak<HostInner<T>>,
}

/// Handle to a representation host. Cloning shares it.
pub struct RepresentationHost<T: Toolkit> {
    inner: Arc<HostInner<T>>,
}

impl<T: Toolkit> Clone for RepresentationHost<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Toolkit> fmt::Debug for RepresentationHost<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepresentationHost")
            .field("represented", &self.representation_count())
            .field("types", &read(&self.inner.factories).len())
            .finish()
    }
}

impl<T: Toolkit> RepresentationHost<T> {
    pub fn new(toolkit: Arc<T>, scheduler: UpdateScheduler, config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new_cyclic(|this| HostInner {
                toolkit,
                scheduler,
                config,
                factories: RwLock::new(HashMap::new()),
                cells: Mutex::new(HashMap::new()),
                tracked: Mutex::new(HashMap::new()),
                roots: Mutex::new(Vec::new()),
                this: Weak::clone(this),
            }),
        }
    }

    /// Register the representation for `type_tag`, replacing any previous one.
    pub fn register(
        &self,
        type_tag: impl Into<String>,
        factory: impl Fn(&Widget) -> Box<dyn Representation<T>> + Send + Sync + 'static,
    ) {
        write(&self.inner.factories).insert(type_tag.into(), Arc::new(factory));
    }

    pub fn supports(&self, type_tag: &str) -> bool {
        read(&self.inner.factories).contains_key(type_tag)
    }

    /// Represent every child of `model` under `parent`. UI thread only.
    ///
    /// The model widget itself is not represented. Later changes to its
    /// child list, and to the child list of every represented container,
    /// are applied automatically.
    pub fn represent_model(
        &self,
        parent: &T::Node,
        model: &Widget,
    ) -> Result<RepresentReport, HostError> {
        if !self.inner.toolkit.is_ui_thread() {
            return Err(HostError::WrongThread);
        }
        let mut report = RepresentReport::default();
        self.inner.track(model, parent.clone());
        for child in model.children() {
            self.inner.represent_widget(parent, &child, &mut report);
        }
        lock(&self.inner.roots).push(model.clone());
        tracing::debug!(
            model = %model.id(),
            represented = report.represented,
            failed = report.failures.len(),
            "model represented"
        );
        Ok(report)
    }

    /// Dispose every representation below `model` and stop tracking it.
    pub fn dispose_model(&self, model: &Widget) {
        for child in model.children() {
            self.inner.dispose_widget(&child);
        }
        lock(&self.inner.tracked).remove(&model.id());
        lock(&self.inner.roots).retain(|root| root != model);
        tracing::debug!(model = %model.id(), "model disposed");
    }

    /// Dispose every represented model.
    pub fn dispose_all(&self) {
        let roots: Vec<Widget> = std::mem::take(&mut *lock(&self.inner.roots));
        for root in &roots {
            self.dispose_model(root);
        }
    }

    pub fn representation(&self, widget: WidgetId) -> Option<Arc<RepresentationCell<T>>> {
        lock(&self.inner.cells).get(&widget).cloned()
    }

    pub fn is_represented(&self, widget: &Widget) -> bool {
        lock(&self.inner.cells).contains_key(&widget.id())
    }

    pub fn representation_count(&self) -> usize {
        lock(&self.inner.cells).len()
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.inner.scheduler
    }
}

impl<T: Toolkit> HostInner<T> {
    fn represent_widget(&self, parent: &T::Node, widget: &Widget, report: &mut RepresentReport) {
        if lock(&self.cells).contains_key(&widget.id()) {
            return;
        }
        let factory = read(&self.factories).get(widget.type_tag()).cloned();
        let Some(factory) = factory else {
            tracing::warn!(
                widget = %widget.id(),
                widget_type = widget.type_tag(),
                "no representation for widget type"
            );
            report.failures.push(RepresentFailure {
                widget: widget.id(),
                widget_type: widget.type_tag().to_string(),
                error: RepresentationError::Unsupported(widget.type_tag().to_string()),
            });
            return;
        };

        let index = self.native_index(widget);
        let cell = RepresentationCell::new(
            widget.clone(),
            factory(widget),
            Arc::clone(&self.toolkit),
            self.scheduler.clone(),
            &self.config,
        );
        if let Err(error) = cell.create(parent, index) {
            tracing::error!(
                widget = %widget.id(),
                widget_type = widget.type_tag(),
                error = %error,
                "cannot represent widget"
            );
            report.failures.push(RepresentFailure {
                widget: widget.id(),
                widget_type: widget.type_tag().to_string(),
                error,
            });
            return;
        }
        lock(&self.cells).insert(widget.id(), Arc::clone(&cell));
        report.represented += 1;

        if widget.is_container() {
            match cell.child_parent() {
                Some(child_parent) => {
                    self.track(widget, child_parent.clone());
                    for child in widget.children() {
                        self.represent_widget(&child_parent, &child, report);
                    }
                }
                None => tracing::warn!(
                    widget = %widget.id(),
                    "container representation has no child parent, children not shown"
                ),
            }
        }
    }

    /// Native index for `widget`: represented siblings before it.
    fn native_index(&self, widget: &Widget) -> usize {
        let Some(parent) = widget.parent() else {
            return 0;
        };
        let cells = lock(&self.cells);
        parent
            .children()
            .iter()
            .take_while(|sibling| *sibling != widget)
            .filter(|sibling| cells.contains_key(&sibling.id()))
            .count()
    }

    fn track(&self, container: &Widget, parent: T::Node) {
        let weak = Weak::clone(&self.this);
        let owner = container.id();
        let listened = container.listen_children(move |change| {
            let Some(host) = weak.upgrade() else {
                return;
            };
            let change = change.clone();
            let parent = parent.clone();
            let toolkit = Arc::clone(&host.toolkit);
            toolkit.run_or_post(Box::new(move || host.apply_change(owner, &parent, change)));
        });
        match listened {
            Ok(handle) => {
                lock(&self.tracked).insert(container.id(), handle);
            }
            Err(e) => tracing::warn!(widget = %container.id(), error = %e, "cannot track children"),
        }
    }

    fn apply_change(&self, owner: WidgetId, parent: &T::Node, change: ChildrenChange) {
        match change {
            ChildrenChange::Added { child, .. } => {
                // The child may have been removed or moved elsewhere before
                // this ran.
                if child.parent().is_none_or(|p| p.id() != owner) {
                    return;
                }
                let mut report = RepresentReport::default();
                self.represent_widget(parent, &child, &mut report);
            }
            ChildrenChange::Removed { child, .. } => self.dispose_widget(&child),
        }
    }

    fn dispose_widget(&self, widget: &Widget) {
        for child in widget.children() {
            self.dispose_widget(&child);
        }
        lock(&self.tracked).remove(&widget.id());
        let cell = lock(&self.cells).remove(&widget.id());
        if let Some(cell) = cell {
            cell.dispose();
        }
    }
}
