#![forbid(unsafe_code)]

//! Property kind to editor table.
//!
//! The property panel does not know which control edits which kind of
//! value. Toolkit adapters register one [`EditorFactory`] per
//! [`PropertyKind`] at startup; the panel asks for an editor per property
//! and falls back to a read-only display when [`EditorRegistry::create_editor`]
//! returns `None`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dbui_core::{AnyProperty, ModelError, PropertyKind, Widget};
use dbui_runtime::{EditState, UiExecutor};

use crate::error::EditorError;
use crate::history::SharedUndo;

/// A bound editor for one property, as the property panel sees it.
pub trait PropertyEditor: Send + Sync {
    fn property_name(&self) -> &'static str;
    fn bind(&self);
    fn unbind(&self);
    fn begin_edit(&self) -> Result<EditState, EditorError>;
    fn commit(&self) -> Result<bool, EditorError>;
    fn cancel(&self) -> Result<bool, EditorError>;
    fn state(&self) -> EditState;
}

/// Everything a factory needs to build an editor.
#[derive(Clone)]
pub struct EditorRequest {
    pub widget: Widget,
    pub property: Arc<dyn AnyProperty>,
    /// Other selected widgets that receive the same edit.
    pub siblings: Vec<Widget>,
    pub undo: SharedUndo,
    pub executor: Arc<dyn UiExecutor>,
}

impl fmt::Debug for EditorRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorRequest")
            .field("widget", &self.widget.name())
            .field("property", &self.property.name())
            .field("kind", &self.property.kind())
            .field("siblings", &self.siblings.len())
            .finish()
    }
}

impl EditorRequest {
    /// Request an editor for `widget`'s property `name`.
    pub fn new(
        widget: &Widget,
        name: &str,
        undo: SharedUndo,
        executor: Arc<dyn UiExecutor>,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            property: widget.require(name)?,
            widget: widget.clone(),
            siblings: Vec::new(),
            undo,
            executor,
        })
    }

    #[must_use]
    pub fn with_siblings(mut self, siblings: Vec<Widget>) -> Self {
        self.siblings = siblings;
        self
    }

    pub fn kind(&self) -> PropertyKind {
        self.property.kind()
    }
}

/// Builds an editor for a request of the kind it is registered under.
pub type EditorFactory =
    Arc<dyn Fn(&EditorRequest) -> Result<Box<dyn PropertyEditor>, EditorError> + Send + Sync>;

/// Editor factories keyed by property kind.
#[derive(Clone, Default)]
pub struct EditorRegistry {
    factories: HashMap<PropertyKind, EditorFactory>,
}

impl fmt::Debug for EditorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl EditorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for `kind`, replacing any earlier one.
    pub fn register<F>(&mut self, kind: PropertyKind, factory: F)
    where
        F: Fn(&EditorRequest) -> Result<Box<dyn PropertyEditor>, EditorError>
            + Send
            + Sync
            + 'static,
    {
        if self.factories.insert(kind, Arc::new(factory)).is_some() {
            tracing::debug!(%kind, "editor factory replaced");
        }
    }

    #[must_use]
    pub fn with<F>(mut self, kind: PropertyKind, factory: F) -> Self
    where
        F: Fn(&EditorRequest) -> Result<Box<dyn PropertyEditor>, EditorError>
            + Send
            + Sync
            + 'static,
    {
        self.register(kind, factory);
        self
    }

    pub fn supports(&self, kind: PropertyKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Registered kinds in a stable order.
    pub fn kinds(&self) -> Vec<PropertyKind> {
        let mut kinds: Vec<PropertyKind> = self.factories.keys().copied().collect();
        kinds.sort_by_key(|k| k.to_string());
        kinds
    }

    /// Build and bind an editor, or `None` when no factory handles the
    /// property's kind. Read-only properties get no editor.
    pub fn create_editor(
        &self,
        request: &EditorRequest,
    ) -> Option<Result<Box<dyn PropertyEditor>, EditorError>> {
        if request.property.is_read_only() {
            return None;
        }
        let factory = self.factories.get(&request.kind())?;
        Some(factory(request).map(|editor| {
            editor.bind();
            editor
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array_binding::ArraySizeBinding;
    use crate::binding::PropertyBinding;
    use crate::binding::test_support::{SameThread, TextBox};
    use crate::history::{HistoryConfig, UndoManager};
    use dbui_core::{ArrayProperty, PropertyCategory, WidgetBuilder, props};

    fn registry() -> EditorRegistry {
        EditorRegistry::new()
            .with(PropertyKind::Integer, |request| {
                let editor: Box<dyn PropertyEditor> =
                    Box::new(PropertyBinding::<i64, _>::from_request(request, TextBox::default())?);
                Ok(editor)
            })
            .with(PropertyKind::Array, |request| {
                let editor: Box<dyn PropertyEditor> =
                    Box::new(ArraySizeBinding::from_request(request, TextBox::default())?);
                Ok(editor)
            })
    }

    fn request(widget: &Widget, name: &str) -> EditorRequest {
        EditorRequest::new(
            widget,
            name,
            UndoManager::shared(HistoryConfig::default()),
            Arc::new(SameThread::default()),
        )
        .unwrap()
    }

    fn plot() -> Widget {
        WidgetBuilder::new("xyplot")
            .name("plot")
            .array(ArrayProperty::new(
                "traces",
                PropertyCategory::Behavior,
                1,
                String::new(),
                vec![String::new()],
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn editors_are_created_per_kind_and_bound() {
        let w = plot();
        let registry = registry();
        let editor = registry.create_editor(&request(&w, props::WIDTH)).unwrap().unwrap();
        assert_eq!(editor.property_name(), props::WIDTH);
        assert_eq!(w.property::<i64>(props::WIDTH).unwrap().listener_count(), 1);

        let spinner = registry.create_editor(&request(&w, "traces")).unwrap().unwrap();
        assert_eq!(spinner.state(), EditState::Idle);
    }

    #[test]
    fn unknown_kind_and_read_only_get_no_editor() {
        let w = plot();
        let registry = registry();
        assert!(registry.create_editor(&request(&w, props::VISIBLE)).is_none());
        assert!(registry.create_editor(&request(&w, props::TYPE)).is_none());
        assert!(!registry.supports(PropertyKind::Bool));
        assert_eq!(registry.kinds(), vec![PropertyKind::Array, PropertyKind::Integer]);
    }

    #[test]
    fn unknown_property_is_a_model_error() {
        let w = plot();
        let result = EditorRequest::new(
            &w,
            "nope",
            UndoManager::shared(HistoryConfig::default()),
            Arc::new(SameThread::default()),
        );
        assert!(matches!(result, Err(ModelError::UnknownProperty { .. })));
    }

    #[test]
    fn editor_commits_through_the_trait() {
        let w = plot();
        let req = request(&w, props::X);
        let editor = registry().create_editor(&req).unwrap().unwrap();
        editor.begin_edit().unwrap();
        editor.cancel().unwrap();
        assert_eq!(editor.state(), EditState::Idle);
        assert!(!editor.commit().unwrap());
        assert!(!dbui_core::sync::lock(&req.undo).can_undo());
    }
}
