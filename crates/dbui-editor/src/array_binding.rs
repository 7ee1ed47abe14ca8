#![forbid(unsafe_code)]

//! Element-count binding for array properties.
//!
//! A spinner shows the length of an array property. Committing a new count
//! resizes the array on the primary widget and on every sibling that has
//! an array of the same name and element kind, as one undo step made of
//! single-element add or remove actions.
//!
//! A count below the minimum of any target rejects the whole commit with
//! [`PropertyError::BelowMinimum`]. Nothing is clamped.

use std::fmt;
use std::sync::Arc;

use dbui_core::sync::lock;
use dbui_core::{AnyProperty, PropertyChange, PropertyError, PropertyKind, Widget};
use dbui_runtime::{EditState, UiExecutor};

use crate::action::{ActionGroup, AddArrayElementAction, RemoveArrayElementAction};
use crate::binding::{EditControl, Gestures};
use crate::error::EditorError;
use crate::history::SharedUndo;
use crate::registry::{EditorRequest, PropertyEditor};

/// Binds the length of an array property to a count control.
pub struct ArraySizeBinding<C: EditControl<i64>> {
    inner: Arc<ArrayInner<C>>,
}

struct ArrayInner<C: EditControl<i64>> {
    widget: Widget,
    property: Arc<dyn AnyProperty>,
    element_kind: PropertyKind,
    control: C,
    gestures: Gestures,
}

impl<C: EditControl<i64>> Clone for ArraySizeBinding<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: EditControl<i64>> fmt::Debug for ArraySizeBinding<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArraySizeBinding")
            .field("widget", &self.inner.widget.name())
            .field("property", &self.inner.property.name())
            .field("len", &self.inner.len())
            .field("state", &self.inner.gestures.state())
            .finish()
    }
}

impl<C: EditControl<i64>> ArraySizeBinding<C> {
    /// Fails with `TypeMismatch` if `property` is not an array.
    pub fn new(
        widget: &Widget,
        property: Arc<dyn AnyProperty>,
        control: C,
        undo: SharedUndo,
        executor: Arc<dyn UiExecutor>,
    ) -> Result<Self, EditorError> {
        let element_kind = property
            .as_array()
            .map(|array| array.element_kind())
            .ok_or_else(|| PropertyError::TypeMismatch {
                property: property.name().to_string(),
                expected: PropertyKind::Array,
            })?;
        Ok(Self {
            inner: Arc::new(ArrayInner {
                widget: widget.clone(),
                property,
                element_kind,
                control,
                gestures: Gestures::new(undo, executor),
            }),
        })
    }

    pub fn from_request(request: &EditorRequest, control: C) -> Result<Self, EditorError> {
        let binding = Self::new(
            &request.widget,
            Arc::clone(&request.property),
            control,
            Arc::clone(&request.undo),
            Arc::clone(&request.executor),
        )?;
        binding.set_siblings(request.siblings.clone());
        Ok(binding)
    }

    #[must_use]
    pub fn with_siblings(self, siblings: Vec<Widget>) -> Self {
        self.set_siblings(siblings);
        self
    }

    pub fn set_siblings(&self, siblings: Vec<Widget>) {
        self.inner.gestures.set_siblings(siblings);
    }

    pub fn control(&self) -> &C {
        &self.inner.control
    }

    /// Current element count of the primary array.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> EditState {
        self.inner.gestures.state()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.gestures.is_bound()
    }

    pub fn bind(&self) {
        let inner = &self.inner;
        inner.gestures.attach(|| {
            inner.show_len();
            let weak = Arc::downgrade(inner);
            let executor = Arc::clone(inner.gestures.executor());
            inner.property.listen_untyped(Arc::new(move |_: &PropertyChange| {
                let weak = weak.clone();
                executor.run_or_post(Box::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.refresh();
                    }
                }));
            }))
        });
    }

    pub fn unbind(&self) {
        self.inner.gestures.detach();
    }

    pub fn begin_edit(&self) -> Result<EditState, EditorError> {
        Ok(self.inner.gestures.begin_edit()?)
    }

    /// Resize every target to the entered count.
    pub fn commit(&self) -> Result<bool, EditorError> {
        let inner = &self.inner;
        if !inner.gestures.start_commit()? {
            return Ok(false);
        }
        let outcome = inner.resize_to_entered();
        inner.gestures.settle();
        inner.show_len();
        if let Err(e) = &outcome {
            tracing::debug!(
                widget = %inner.widget.name(),
                property = inner.property.name(),
                error = %e,
                "resize rejected"
            );
        }
        outcome
    }

    pub fn cancel(&self) -> Result<bool, EditorError> {
        let inner = &self.inner;
        if !inner.gestures.start_revert()? {
            return Ok(false);
        }
        inner.show_len();
        inner.gestures.settle();
        Ok(true)
    }

    pub fn focus_lost(&self) -> Result<bool, EditorError> {
        self.cancel()
    }
}

impl<C: EditControl<i64>> ArrayInner<C> {
    fn len(&self) -> usize {
        self.property.as_array().map_or(0, |array| array.len())
    }

    fn show_len(&self) {
        self.control.show(&i64::try_from(self.len()).unwrap_or(i64::MAX));
    }

    fn refresh(&self) {
        if self.gestures.accepts_model_updates() {
            self.show_len();
        }
    }

    /// Primary array plus every sibling array it should be mirrored to.
    fn targets(&self) -> Vec<(Widget, Arc<dyn AnyProperty>)> {
        let name = self.property.name();
        let mut targets = vec![(self.widget.clone(), Arc::clone(&self.property))];
        for sibling in self.gestures.siblings() {
            if sibling.id() == self.widget.id() {
                continue;
            }
            let matching = sibling
                .property_dyn(name)
                .filter(|p| p.as_array().is_some_and(|a| a.element_kind() == self.element_kind));
            match matching {
                Some(property) => targets.push((sibling, property)),
                None => {
                    tracing::trace!(
                        widget = %sibling.name(),
                        property = name,
                        "sibling lacks array, skipped"
                    );
                }
            }
        }
        targets
    }

    fn resize_to_entered(&self) -> Result<bool, EditorError> {
        let name = self.property.name();
        let requested = self.control.entered().map_err(|reason| PropertyError::InvalidValue {
            property: name.to_string(),
            reason,
        })?;
        let desired = usize::try_from(requested).map_err(|_| PropertyError::InvalidValue {
            property: name.to_string(),
            reason: format!("{requested} is not an element count"),
        })?;

        let targets = self.targets();
        for (_, property) in &targets {
            let minimum = property.as_array().map_or(0, |a| a.min_len());
            if desired < minimum {
                return Err(PropertyError::BelowMinimum {
                    property: name.to_string(),
                    minimum,
                    requested: desired,
                }
                .into());
            }
        }

        let mut group = ActionGroup::new(format!("Resize {name}"));
        for (widget, property) in &targets {
            let len = property.as_array().map_or(0, |a| a.len());
            for _ in len..desired {
                group.push(AddArrayElementAction::new(widget, Arc::clone(property)));
            }
            for _ in desired..len {
                group.push(RemoveArrayElementAction::new(widget, Arc::clone(property)));
            }
        }
        tracing::debug!(
            property = name,
            targets = targets.len(),
            actions = group.len(),
            "resizing arrays"
        );
        Ok(lock(self.gestures.undo()).execute_group(group)?)
    }
}

impl<C: EditControl<i64>> PropertyEditor for ArraySizeBinding<C> {
    fn property_name(&self) -> &'static str {
        self.inner.property.name()
    }

    fn bind(&self) {
        ArraySizeBinding::bind(self);
    }

    fn unbind(&self) {
        ArraySizeBinding::unbind(self);
    }

    fn begin_edit(&self) -> Result<EditState, EditorError> {
        ArraySizeBinding::begin_edit(self)
    }

    fn commit(&self) -> Result<bool, EditorError> {
        ArraySizeBinding::commit(self)
    }

    fn cancel(&self) -> Result<bool, EditorError> {
        ArraySizeBinding::cancel(self)
    }

    fn state(&self) -> EditState {
        ArraySizeBinding::state(self)
    }
}
