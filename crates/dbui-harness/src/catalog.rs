#![forbid(unsafe_code)]

//! Fixture widget catalog.
//!
//! | Type | Container | Own properties |
//! |------|-----------|----------------|
//! | `display` | yes | |
//! | `group` | yes | |
//! | `label` | | `text`, alarm border |
//! | `text_entry` | | `text`, alarm border |
//! | `xyplot` | | `title`, `traces` (at least 1) |
//! | `failing` | | none; its representation cannot be built |

use dbui_core::{
    ArrayProperty, ModelError, PropertyCategory, PropertyDescriptor, Widget, WidgetDescriptor,
    WidgetFactory,
};
use dbui_runtime::with_alarm_properties;

pub mod names {
    pub const TEXT: &str = "text";
    pub const TITLE: &str = "title";
    pub const TRACES: &str = "traces";
}

/// Minimum number of traces on an `xyplot`.
pub const MIN_TRACES: usize = 1;

fn text_property(description: &'static str) -> PropertyDescriptor<String> {
    PropertyDescriptor::new(names::TEXT, PropertyCategory::Display, String::new())
        .with_description(description)
}

/// Every fixture widget type.
pub fn fixture_catalog() -> WidgetFactory {
    WidgetFactory::new()
        .with(WidgetDescriptor::new("display", "Display", |b| b).container())
        .with(WidgetDescriptor::new("group", "Group", |b| b.bounds(0, 0, 300, 200)).container())
        .with(WidgetDescriptor::new("label", "Label", |b| {
            with_alarm_properties(b.property(text_property("Text")))
        }))
        .with(WidgetDescriptor::new("text_entry", "Text Entry", |b| {
            with_alarm_properties(b.property(text_property("Value")))
        }))
        .with(WidgetDescriptor::new("xyplot", "X/Y Plot", |b| {
            b.bounds(0, 0, 400, 300)
                .property(
                    PropertyDescriptor::new(names::TITLE, PropertyCategory::Display, String::new())
                        .with_description("Title"),
                )
                .array(ArrayProperty::new(
                    names::TRACES,
                    PropertyCategory::Behavior,
                    MIN_TRACES,
                    String::from("trace"),
                    Vec::new(),
                ))
        }))
        .with(WidgetDescriptor::new("failing", "Broken fixture", |b| b))
}

/// Create a fixture widget named `name`.
pub fn widget(type_tag: &str, name: &str) -> Result<Widget, ModelError> {
    fixture_catalog().create_named(type_tag, name)
}
