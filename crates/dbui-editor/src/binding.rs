#![forbid(unsafe_code)]

//! Two-way binding between a property and an edit control.
//!
//! The model side is a property listener that shows the property's value in
//! the control. The control side is three gestures driven by the toolkit
//! adapter: the first keystroke calls [`PropertyBinding::begin_edit`], an
//! explicit confirmation calls [`PropertyBinding::commit`], Escape calls
//! [`PropertyBinding::cancel`].
//!
//! # Invariants
//!
//! 1. While the guard is `Editing`, model changes never reach the control.
//! 2. A commit goes through the undo manager as one group covering the
//!    primary widget and every sibling that has the same property.
//! 3. After `commit` or `cancel` the guard is `Idle` and the control shows
//!    the property's current value, whether or not the gesture succeeded.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Entry not parseable | `EditControl::entered` returns `Err` | `EditorError::Property(InvalidValue)`, control restored |
//! | Validation | value rejected by a target | group rolled back, error returned, control restored |
//! | Sibling lacks property | heterogeneous selection | sibling skipped |
//! | Model change off the UI thread | background writer | posted to the UI thread |

use std::fmt;
use std::sync::{Arc, Mutex};

use dbui_core::sync::lock;
use dbui_core::{
    AnyProperty, ListenerHandle, Property, PropertyError, PropertyType, PropertyValue, Widget,
};
use dbui_runtime::{EditGuard, EditState, GuardError, UiExecutor};

use crate::action::{ActionGroup, SetPropertyAction, SetValueAction};
use crate::error::EditorError;
use crate::history::SharedUndo;
use crate::registry::{EditorRequest, PropertyEditor};

/// The native side of a binding.
///
/// Implemented by toolkit adapters. Both methods are called on the UI
/// thread only.
pub trait EditControl<T>: Send + Sync + 'static {
    /// Replace the displayed value.
    fn show(&self, value: &T);

    /// The value the user entered, or the reason it cannot be used.
    fn entered(&self) -> Result<T, String>;
}

/// Guard, undo target and model listener shared by every binding kind.
pub(crate) struct Gestures {
    guard: Mutex<EditGuard>,
    undo: SharedUndo,
    executor: Arc<dyn UiExecutor>,
    siblings: Mutex<Vec<Widget>>,
    listener: Mutex<Option<ListenerHandle>>,
}

impl Gestures {
    pub(crate) fn new(undo: SharedUndo, executor: Arc<dyn UiExecutor>) -> Self {
        Self {
            guard: Mutex::new(EditGuard::new()),
            undo,
            executor,
            siblings: Mutex::new(Vec::new()),
            listener: Mutex::new(None),
        }
    }

    pub(crate) fn executor(&self) -> &Arc<dyn UiExecutor> {
        &self.executor
    }

    pub(crate) fn undo(&self) -> &SharedUndo {
        &self.undo
    }

    pub(crate) fn state(&self) -> EditState {
        lock(&self.guard).state()
    }

    pub(crate) fn is_bound(&self) -> bool {
        lock(&self.listener).is_some()
    }

    /// Install the model listener unless one is installed already.
    pub(crate) fn attach(&self, install: impl FnOnce() -> ListenerHandle) -> bool {
        let mut slot = lock(&self.listener);
        if slot.is_some() {
            return false;
        }
        *slot = Some(install());
        true
    }

    pub(crate) fn detach(&self) {
        let handle = lock(&self.listener).take();
        drop(handle);
        *lock(&self.guard) = EditGuard::new();
    }

    /// Whether a model change may be shown now.
    pub(crate) fn accepts_model_updates(&self) -> bool {
        self.is_bound() && !lock(&self.guard).suppresses_model_updates()
    }

    pub(crate) fn begin_edit(&self) -> Result<EditState, GuardError> {
        lock(&self.guard).begin_edit()
    }

    /// Move to `Committed`. `Ok(false)` when there is no edit to commit.
    pub(crate) fn start_commit(&self) -> Result<bool, GuardError> {
        let mut guard = lock(&self.guard);
        if guard.state() == EditState::Idle {
            return Ok(false);
        }
        guard.commit()?;
        Ok(true)
    }

    /// Move to `Reverted`. `Ok(false)` when there is no edit to revert.
    pub(crate) fn start_revert(&self) -> Result<bool, GuardError> {
        let mut guard = lock(&self.guard);
        if guard.state() == EditState::Idle {
            return Ok(false);
        }
        guard.revert()?;
        Ok(true)
    }

    pub(crate) fn settle(&self) {
        let mut guard = lock(&self.guard);
        if let Err(e) = guard.settle() {
            tracing::debug!(error = %e, "edit guard already settled");
        }
    }

    pub(crate) fn set_siblings(&self, siblings: Vec<Widget>) {
        *lock(&self.siblings) = siblings;
    }

    pub(crate) fn siblings(&self) -> Vec<Widget> {
        lock(&self.siblings).clone()
    }
}

/// Binds a [`Property<T>`] to an [`EditControl<T>`].
pub struct PropertyBinding<T: PropertyType, C: EditControl<T>> {
    inner: Arc<BindingInner<T, C>>,
}

struct BindingInner<T: PropertyType, C: EditControl<T>> {
    widget: Widget,
    property: Property<T>,
    control: C,
    gestures: Gestures,
}

impl<T: PropertyType, C: EditControl<T>> Clone for PropertyBinding<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: PropertyType, C: EditControl<T>> fmt::Debug for PropertyBinding<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBinding")
            .field("widget", &self.inner.widget.name())
            .field("property", &self.inner.property.name())
            .field("state", &self.inner.gestures.state())
            .field("bound", &self.inner.gestures.is_bound())
            .finish()
    }
}

impl<T: PropertyType, C: EditControl<T>> PropertyBinding<T, C> {
    /// Create an unbound binding. Call [`bind`](Self::bind) to start.
    pub fn new(
        widget: &Widget,
        property: Property<T>,
        control: C,
        undo: SharedUndo,
        executor: Arc<dyn UiExecutor>,
    ) -> Self {
        Self {
            inner: Arc::new(BindingInner {
                widget: widget.clone(),
                property,
                control,
                gestures: Gestures::new(undo, executor),
            }),
        }
    }

    /// Build from a registry request. Fails if the requested property is
    /// not a `Property<T>`.
    pub fn from_request(request: &EditorRequest, control: C) -> Result<Self, EditorError> {
        let property = request
            .property
            .as_any()
            .downcast_ref::<Property<T>>()
            .cloned()
            .ok_or_else(|| PropertyError::TypeMismatch {
                property: request.property.name().to_string(),
                expected: T::KIND,
            })?;
        let binding = Self::new(
            &request.widget,
            property,
            control,
            Arc::clone(&request.undo),
            Arc::clone(&request.executor),
        );
        binding.set_siblings(request.siblings.clone());
        Ok(binding)
    }

    /// Widgets that receive the same value on commit.
    #[must_use]
    pub fn with_siblings(self, siblings: Vec<Widget>) -> Self {
        self.set_siblings(siblings);
        self
    }

    pub fn set_siblings(&self, siblings: Vec<Widget>) {
        self.inner.gestures.set_siblings(siblings);
    }

    pub fn property(&self) -> &Property<T> {
        &self.inner.property
    }

    pub fn control(&self) -> &C {
        &self.inner.control
    }

    pub fn state(&self) -> EditState {
        self.inner.gestures.state()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.gestures.is_bound()
    }

    /// Show the current value and start following the model.
    pub fn bind(&self) {
        let inner = &self.inner;
        inner.gestures.attach(|| {
            inner.control.show(&inner.property.get());
            let weak = Arc::downgrade(inner);
            let executor = Arc::clone(inner.gestures.executor());
            inner.property.listen(move |_, _| {
                let weak = weak.clone();
                executor.run_or_post(Box::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.refresh();
                    }
                }));
            })
        });
    }

    /// Stop following the model and drop any edit in progress.
    ///
    /// Safe to call on a binding that was never bound.
    pub fn unbind(&self) {
        self.inner.gestures.detach();
    }

    /// The user started or continued typing.
    pub fn begin_edit(&self) -> Result<EditState, EditorError> {
        Ok(self.inner.gestures.begin_edit()?)
    }

    /// Submit the entered value. `Ok(true)` if an undo step was recorded,
    /// `Ok(false)` if nothing was being edited or nothing changed.
    pub fn commit(&self) -> Result<bool, EditorError> {
        let inner = &self.inner;
        if !inner.gestures.start_commit()? {
            return Ok(false);
        }
        let outcome = inner.apply_entered();
        inner.gestures.settle();
        inner.control.show(&inner.property.get());
        if let Err(e) = &outcome {
            tracing::debug!(
                widget = %inner.widget.name(),
                property = inner.property.name(),
                error = %e,
                "commit rejected"
            );
        }
        outcome
    }

    /// Discard the edit and show the model value again.
    pub fn cancel(&self) -> Result<bool, EditorError> {
        let inner = &self.inner;
        if !inner.gestures.start_revert()? {
            return Ok(false);
        }
        inner.control.show(&inner.property.get());
        inner.gestures.settle();
        Ok(true)
    }

    /// Leaving the control without confirming reverts the edit.
    pub fn focus_lost(&self) -> Result<bool, EditorError> {
        self.cancel()
    }
}

impl<T: PropertyType, C: EditControl<T>> BindingInner<T, C> {
    fn refresh(&self) {
        if !self.gestures.accepts_model_updates() {
            tracing::trace!(property = self.property.name(), "model update held back during edit");
            return;
        }
        self.control.show(&self.property.get());
    }

    fn apply_entered(&self) -> Result<bool, EditorError> {
        let name = self.property.name();
        let value = self.control.entered().map_err(|reason| PropertyError::InvalidValue {
            property: name.to_string(),
            reason,
        })?;

        let mut group = ActionGroup::new(format!("Set {name}"));
        if self.property.with(|current| *current != value) {
            group.push(SetPropertyAction::new(&self.widget, self.property.clone(), value.clone()));
        }
        let mirrored = value.into_value();
        for sibling in self.gestures.siblings() {
            if sibling.id() == self.widget.id() {
                continue;
            }
            if let Some(target) = mirror_target(&sibling, name, &mirrored) {
                group.push(SetValueAction::new(&sibling, target, mirrored.clone()));
            }
        }
        Ok(lock(self.gestures.undo()).execute_group(group)?)
    }
}

/// The sibling's property that should receive `value`, if it has one that
/// accepts it and does not hold it already.
fn mirror_target(
    sibling: &Widget,
    name: &str,
    value: &PropertyValue,
) -> Option<Arc<dyn AnyProperty>> {
    let Some(target) = sibling.property_dyn(name) else {
        tracing::trace!(
            widget = %sibling.name(),
            property = name,
            "sibling lacks property, skipped"
        );
        return None;
    };
    if target.kind() != value.kind() || target.is_read_only() {
        tracing::trace!(
            widget = %sibling.name(),
            property = name,
            "sibling property not writable, skipped"
        );
        return None;
    }
    if target.value() == *value {
        return None;
    }
    Some(target)
}

impl<T: PropertyType, C: EditControl<T>> PropertyEditor for PropertyBinding<T, C> {
    fn property_name(&self) -> &'static str {
        self.inner.property.name()
    }

    fn bind(&self) {
        PropertyBinding::bind(self);
    }

    fn unbind(&self) {
        PropertyBinding::unbind(self);
    }

    fn begin_edit(&self) -> Result<EditState, EditorError> {
        PropertyBinding::begin_edit(self)
    }

    fn commit(&self) -> Result<bool, EditorError> {
        PropertyBinding::commit(self)
    }

    fn cancel(&self) -> Result<bool, EditorError> {
        PropertyBinding::cancel(self)
    }

    fn state(&self) -> EditState {
        PropertyBinding::state(self)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{SameThread, TextBox};
    use super::*;
    use crate::history::{HistoryConfig, UndoManager};
    use dbui_core::{PropertyCategory, PropertyDescriptor, WidgetBuilder, props};

    fn entry(name: &str, text: &str) -> Widget {
        WidgetBuilder::new("textentry")
            .name(name)
            .property(
                PropertyDescriptor::new("text", PropertyCategory::Display, text.to_string())
                    .with_validator(|t: &String| {
                        if t.contains('!') { Err("no shouting".into()) } else { Ok(()) }
                    }),
            )
            .build()
            .unwrap()
    }

    fn bound(widget: &Widget) -> (PropertyBinding<String, TextBox>, SharedUndo) {
        let undo = UndoManager::shared(HistoryConfig::default());
        let binding = PropertyBinding::new(
            widget,
            widget.property::<String>("text").unwrap(),
            TextBox::default(),
            Arc::clone(&undo),
            Arc::new(SameThread::default()),
        );
        binding.bind();
        (binding, undo)
    }

    #[test]
    fn bind_shows_value_and_follows_model() {
        let w = entry("a", "abc");
        let (binding, _undo) = bound(&w);
        assert_eq!(binding.control().text(), "abc");
        binding.property().set("xyz".into()).unwrap();
        assert_eq!(binding.control().text(), "xyz");
    }

    #[test]
    fn escape_restores_the_control() {
        let w = entry("a", "abc");
        let (binding, undo) = bound(&w);
        binding.begin_edit().unwrap();
        binding.control().type_text("abcd");
        assert_eq!(binding.property().get(), "abc");

        assert!(binding.cancel().unwrap());
        assert_eq!(binding.control().text(), "abc");
        assert_eq!(binding.property().get(), "abc");
        assert_eq!(binding.state(), EditState::Idle);
        assert!(!lock(&undo).can_undo());
    }

    #[test]
    fn model_updates_are_held_back_while_editing() {
        let w = entry("a", "abc");
        let (binding, _undo) = bound(&w);
        binding.begin_edit().unwrap();
        binding.control().type_text("ab");
        binding.property().set("remote".into()).unwrap();
        assert_eq!(binding.control().text(), "ab");

        binding.cancel().unwrap();
        assert_eq!(binding.control().text(), "remote");
    }

    #[test]
    fn commit_records_one_undo_step() {
        let w = entry("a", "abc");
        let (binding, undo) = bound(&w);
        binding.begin_edit().unwrap();
        binding.control().type_text("abcd");
        assert!(binding.commit().unwrap());
        assert_eq!(binding.property().get(), "abcd");
        assert_eq!(binding.state(), EditState::Idle);

        assert_eq!(lock(&undo).undo(), Ok(true));
        assert_eq!(binding.property().get(), "abc");
        assert_eq!(binding.control().text(), "abc");
    }

    #[test]
    fn commit_without_edit_is_a_no_op() {
        let w = entry("a", "abc");
        let (binding, undo) = bound(&w);
        assert!(!binding.commit().unwrap());
        assert!(!binding.cancel().unwrap());
        assert!(!lock(&undo).can_undo());
    }

    #[test]
    fn unchanged_commit_records_nothing() {
        let w = entry("a", "abc");
        let (binding, undo) = bound(&w);
        binding.begin_edit().unwrap();
        assert!(!binding.commit().unwrap());
        assert!(!lock(&undo).can_undo());
    }

    #[test]
    fn rejected_commit_restores_the_control() {
        let w = entry("a", "abc");
        let (binding, undo) = bound(&w);
        binding.begin_edit().unwrap();
        binding.control().type_text("abc!");
        let err = binding.commit().unwrap_err();
        assert!(matches!(err, EditorError::Action(_)), "{err:?}");
        assert_eq!(binding.property().get(), "abc");
        assert_eq!(binding.control().text(), "abc");
        assert_eq!(binding.state(), EditState::Idle);
        assert!(!lock(&undo).can_undo());
    }

    #[test]
    fn unparseable_entry_is_reported() {
        let w = WidgetBuilder::new("spinner").name("s").build().unwrap();
        let undo = UndoManager::shared(HistoryConfig::default());
        let binding = PropertyBinding::new(
            &w,
            w.property::<i64>(props::X).unwrap(),
            TextBox::default(),
            undo,
            Arc::new(SameThread::default()),
        );
        binding.bind();
        binding.begin_edit().unwrap();
        binding.control().type_text("twelve");
        assert!(matches!(
            binding.commit(),
            Err(EditorError::Property(PropertyError::InvalidValue { .. }))
        ));
        assert_eq!(binding.control().text(), "0");
    }

    #[test]
    fn commit_mirrors_to_siblings_as_one_step() {
        let a = entry("a", "abc");
        let b = entry("b", "other");
        let plain = WidgetBuilder::new("label").name("plain").build().unwrap();
        let (binding, undo) = bound(&a);
        binding.set_siblings(vec![b.clone(), plain]);

        binding.begin_edit().unwrap();
        binding.control().type_text("same");
        assert!(binding.commit().unwrap());
        assert_eq!(b.property::<String>("text").unwrap().get(), "same");

        let mut undo = lock(&undo);
        assert_eq!(undo.undo_depth(), 1);
        undo.undo().unwrap();
        assert_eq!(a.property::<String>("text").unwrap().get(), "abc");
        assert_eq!(b.property::<String>("text").unwrap().get(), "other");
    }

    #[test]
    fn unbind_is_safe_and_stops_updates() {
        let w = entry("a", "abc");
        let undo = UndoManager::shared(HistoryConfig::default());
        let executor = Arc::new(SameThread::default());
        let binding = PropertyBinding::new(
            &w,
            w.property::<String>("text").unwrap(),
            TextBox::default(),
            undo,
            Arc::clone(&executor) as Arc<dyn UiExecutor>,
        );
        binding.unbind();
        binding.bind();
        binding.bind();
        assert_eq!(binding.property().listener_count(), 1);
        binding.unbind();
        assert_eq!(binding.property().listener_count(), 0);
        binding.property().set("later".into()).unwrap();
        assert_eq!(binding.control().text(), "abc");
        assert_eq!(executor.posted(), 0);
    }
}
