#![forbid(unsafe_code)]

//! Widget factory keyed on type tag.
//!
//! A [`WidgetDescriptor`] says how to build one widget type. The
//! [`WidgetFactory`] holds descriptors and answers the two questions the
//! rest of the system asks of a widget catalog: build me a widget of this
//! type, and what does property `name` of this type look like.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ModelError;
use crate::property::PropertyCategory;
use crate::value::PropertyKind;
use crate::widget::{Widget, WidgetBuilder};

type Define = Arc<dyn Fn(WidgetBuilder) -> WidgetBuilder + Send + Sync>;

/// How to construct one widget type.
#[derive(Clone)]
pub struct WidgetDescriptor {
    type_tag: String,
    description: String,
    container: bool,
    define: Define,
}

impl fmt::Debug for WidgetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetDescriptor")
            .field("type_tag", &self.type_tag)
            .field("container", &self.container)
            .finish()
    }
}

impl WidgetDescriptor {
    /// `define` adds the type-specific properties to a builder that already
    /// carries the type tag and container flag.
    pub fn new(
        type_tag: impl Into<String>,
        description: impl Into<String>,
        define: impl Fn(WidgetBuilder) -> WidgetBuilder + Send + Sync + 'static,
    ) -> Self {
        Self {
            type_tag: type_tag.into(),
            description: description.into(),
            container: false,
            define: Arc::new(define),
        }
    }

    #[must_use]
    pub fn container(mut self) -> Self {
        self.container = true;
        self
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_container(&self) -> bool {
        self.container
    }

    fn build(&self, name: Option<&str>) -> Result<Widget, ModelError> {
        let mut builder = WidgetBuilder::new(self.type_tag.clone());
        if self.container {
            builder = builder.container();
        }
        if let Some(name) = name {
            builder = builder.name(name);
        }
        (self.define)(builder).build()
    }
}

/// Static facts about one property of a widget type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub category: PropertyCategory,
    pub kind: PropertyKind,
    pub read_only: bool,
}

/// Registry of widget descriptors.
#[derive(Debug, Clone, Default)]
pub struct WidgetFactory {
    descriptors: BTreeMap<String, WidgetDescriptor>,
}

impl WidgetFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor, replacing any previous one for the same type.
    pub fn register(&mut self, descriptor: WidgetDescriptor) {
        tracing::debug!(widget_type = %descriptor.type_tag, "widget type registered");
        self.descriptors
            .insert(descriptor.type_tag.clone(), descriptor);
    }

    #[must_use]
    pub fn with(mut self, descriptor: WidgetDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn descriptor(&self, type_tag: &str) -> Option<&WidgetDescriptor> {
        self.descriptors.get(type_tag)
    }

    /// Registered type tags in sorted order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    pub fn create(&self, type_tag: &str) -> Result<Widget, ModelError> {
        self.lookup(type_tag)?.build(None)
    }

    pub fn create_named(&self, type_tag: &str, name: &str) -> Result<Widget, ModelError> {
        self.lookup(type_tag)?.build(Some(name))
    }

    /// Describe property `name` of `type_tag` without keeping a widget.
    pub fn property_info(&self, type_tag: &str, name: &str) -> Result<PropertyInfo, ModelError> {
        let widget = self.create(type_tag)?;
        let property = widget.require(name)?;
        Ok(PropertyInfo {
            name: property.name(),
            description: property.description(),
            category: property.category(),
            kind: property.kind(),
            read_only: property.is_read_only(),
        })
    }

    fn lookup(&self, type_tag: &str) -> Result<&WidgetDescriptor, ModelError> {
        self.descriptors
            .get(type_tag)
            .ok_or_else(|| ModelError::UnknownWidgetType(type_tag.to_string()))
    }
}
