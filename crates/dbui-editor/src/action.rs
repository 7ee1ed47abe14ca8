#![forbid(unsafe_code)]

//! Reversible actions.
//!
//! Every model mutation made from the editor is an [`UndoableAction`]: it
//! captures the previous state when constructed, applies the new state in
//! [`run`](UndoableAction::run) and restores the previous state in
//! [`undo`](UndoableAction::undo). An [`ActionGroup`] bundles the actions of
//! one gesture so they are undone and redone as one step.
//!
//! # Invariants
//!
//! 1. `undo` after a successful `run` restores exactly the captured value.
//! 2. A group runs members in order and undoes them in reverse order.
//! 3. A group is all-or-nothing: if a member fails, the members already
//!    applied are reverted before the error is returned.

use std::fmt;
use std::sync::Arc;

use dbui_core::{AnyProperty, Property, PropertyType, PropertyValue, Widget};

use crate::error::ActionError;

/// An invertible model mutation.
pub trait UndoableAction: Send + fmt::Debug {
    /// Short text for menus, e.g. "Set width".
    fn description(&self) -> String;

    /// Apply the forward mutation.
    fn run(&mut self) -> Result<(), ActionError>;

    /// Restore the state from before `run`.
    fn undo(&mut self) -> Result<(), ActionError>;
}

/// Set a typed property.
pub struct SetPropertyAction<T: PropertyType> {
    property: Property<T>,
    widget: String,
    old: T,
    new: T,
}

impl<T: PropertyType> fmt::Debug for SetPropertyAction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetPropertyAction")
            .field("widget", &self.widget)
            .field("property", &self.property.name())
            .field("old", &self.old)
            .field("new", &self.new)
            .finish()
    }
}

impl<T: PropertyType> SetPropertyAction<T> {
    /// Capture the current value of `property` as the undo value.
    pub fn new(widget: &Widget, property: Property<T>, new: T) -> Self {
        Self {
            old: property.get(),
            widget: widget.name(),
            property,
            new,
        }
    }

    pub fn old_value(&self) -> &T {
        &self.old
    }

    pub fn new_value(&self) -> &T {
        &self.new
    }
}

impl<T: PropertyType> UndoableAction for SetPropertyAction<T> {
    fn description(&self) -> String {
        format!("Set {}", self.property.name())
    }

    fn run(&mut self) -> Result<(), ActionError> {
        self.property.set(self.new.clone())?;
        Ok(())
    }

    fn undo(&mut self) -> Result<(), ActionError> {
        self.property.set(self.old.clone())?;
        Ok(())
    }
}

/// Set a property through its type-erased view.
///
/// Used for sibling widgets, whose property is found by name.
pub struct SetValueAction {
    property: Arc<dyn AnyProperty>,
    widget: String,
    old: PropertyValue,
    new: PropertyValue,
}

impl fmt::Debug for SetValueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetValueAction")
            .field("widget", &self.widget)
            .field("property", &self.property.name())
            .field("old", &self.old)
            .field("new", &self.new)
            .finish()
    }
}

impl SetValueAction {
    pub fn new(widget: &Widget, property: Arc<dyn AnyProperty>, new: PropertyValue) -> Self {
        Self {
            old: property.value(),
            widget: widget.name(),
            property,
            new,
        }
    }
}

impl UndoableAction for SetValueAction {
    fn description(&self) -> String {
        format!("Set {}", self.property.name())
    }

    fn run(&mut self) -> Result<(), ActionError> {
        self.property.set_value(self.new.clone())?;
        Ok(())
    }

    fn undo(&mut self) -> Result<(), ActionError> {
        self.property.set_value(self.old.clone())?;
        Ok(())
    }
}

/// Actions executed, undone and redone as one step.
pub struct ActionGroup {
    description: String,
    actions: Vec<Box<dyn UndoableAction>>,
}

impl fmt::Debug for ActionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionGroup")
            .field("description", &self.description)
            .field("actions", &self.actions)
            .finish()
    }
}

impl ActionGroup {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            actions: Vec::new(),
        }
    }

    pub fn push(&mut self, action: impl UndoableAction + 'static) {
        self.actions.push(Box::new(action));
    }

    pub fn push_boxed(&mut self, action: Box<dyn UndoableAction>) {
        self.actions.push(action);
    }

    #[must_use]
    pub fn with(mut self, action: impl UndoableAction + 'static) -> Self {
        self.push(action);
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl UndoableAction for ActionGroup {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn run(&mut self) -> Result<(), ActionError> {
        for i in 0..self.actions.len() {
            if let Err(e) = self.actions[i].run() {
                for applied in self.actions[..i].iter_mut().rev() {
                    if let Err(rollback) = applied.undo() {
                        tracing::warn!(
                            action = ?applied,
                            error = %rollback,
                            "group rollback failed"
                        );
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn undo(&mut self) -> Result<(), ActionError> {
        let n = self.actions.len();
        for i in (0..n).rev() {
            if let Err(e) = self.actions[i].undo() {
                for reverted in &mut self.actions[i + 1..] {
                    if let Err(rollback) = reverted.run() {
                        tracing::warn!(
                            action = ?reverted,
                            error = %rollback,
                            "group restore failed"
                        );
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Append one default element to an array property.
pub struct AddArrayElementAction {
    property: Arc<dyn AnyProperty>,
    widget: String,
}

impl fmt::Debug for AddArrayElementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddArrayElementAction")
            .field("widget", &self.widget)
            .field("property", &self.property.name())
            .finish()
    }
}

impl AddArrayElementAction {
    pub fn new(widget: &Widget, property: Arc<dyn AnyProperty>) -> Self {
        Self {
            property,
            widget: widget.name(),
        }
    }
}

fn array_of<'a>(
    property: &'a Arc<dyn AnyProperty>,
    widget: &str,
) -> Result<&'a dyn dbui_core::AnyArrayProperty, ActionError> {
    property
        .as_array()
        .ok_or_else(|| {
            ActionError::MissingTarget(format!("{widget}.{} is not an array", property.name()))
        })
}

impl UndoableAction for AddArrayElementAction {
    fn description(&self) -> String {
        format!("Add {} element", self.property.name())
    }

    fn run(&mut self) -> Result<(), ActionError> {
        array_of(&self.property, &self.widget)?.push_default()?;
        Ok(())
    }

    fn undo(&mut self) -> Result<(), ActionError> {
        array_of(&self.property, &self.widget)?.pop_value()?;
        Ok(())
    }
}

/// Remove the last element of an array property.
pub struct RemoveArrayElementAction {
    property: Arc<dyn AnyProperty>,
    widget: String,
    removed: Option<PropertyValue>,
}

impl fmt::Debug for RemoveArrayElementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoveArrayElementAction")
            .field("widget", &self.widget)
            .field("property", &self.property.name())
            .field("removed", &self.removed)
            .finish()
    }
}

impl RemoveArrayElementAction {
    pub fn new(widget: &Widget, property: Arc<dyn AnyProperty>) -> Self {
        Self {
            property,
            widget: widget.name(),
            removed: None,
        }
    }
}

impl UndoableAction for RemoveArrayElementAction {
    fn description(&self) -> String {
        format!("Remove {} element", self.property.name())
    }

    fn run(&mut self) -> Result<(), ActionError> {
        let removed = array_of(&self.property, &self.widget)?.pop_value()?;
        self.removed = Some(removed);
        Ok(())
    }

    fn undo(&mut self) -> Result<(), ActionError> {
        let array = array_of(&self.property, &self.widget)?;
        match self.removed.take() {
            Some(element) => array.push_value(element)?,
            None => array.push_default()?,
        }
        Ok(())
    }
}

/// Insert a widget into a container.
#[derive(Debug)]
pub struct AddWidgetAction {
    container: Widget,
    widget: Widget,
    index: Option<usize>,
}

impl AddWidgetAction {
    /// Add at the end of the child list.
    pub fn new(container: &Widget, widget: Widget) -> Self {
        Self {
            container: container.clone(),
            widget,
            index: None,
        }
    }

    pub fn at(container: &Widget, index: usize, widget: Widget) -> Self {
        Self {
            container: container.clone(),
            widget,
            index: Some(index),
        }
    }
}

impl UndoableAction for AddWidgetAction {
    fn description(&self) -> String {
        format!("Add {}", self.widget.type_tag())
    }

    fn run(&mut self) -> Result<(), ActionError> {
        let index = self.index.unwrap_or_else(|| self.container.child_count());
        self.container.insert_child(index, self.widget.clone())?;
        self.index = Some(index);
        Ok(())
    }

    fn undo(&mut self) -> Result<(), ActionError> {
        self.container.remove_child(&self.widget)?;
        Ok(())
    }
}

/// Remove a widget from its container, restoring it at the same index on
/// undo.
#[derive(Debug)]
pub struct RemoveWidgetAction {
    container: Widget,
    widget: Widget,
    index: Option<usize>,
}

impl RemoveWidgetAction {
    pub fn new(container: &Widget, widget: Widget) -> Self {
        Self {
            container: container.clone(),
            widget,
            index: None,
        }
    }
}

impl UndoableAction for RemoveWidgetAction {
    fn description(&self) -> String {
        format!("Remove {}", self.widget.type_tag())
    }

    fn run(&mut self) -> Result<(), ActionError> {
        self.index = Some(self.container.remove_child(&self.widget)?);
        Ok(())
    }

    fn undo(&mut self) -> Result<(), ActionError> {
        let index = self
            .index
            .take()
            .unwrap_or_else(|| self.container.child_count());
        self.container.insert_child(index, self.widget.clone())?;
        Ok(())
    }
}
