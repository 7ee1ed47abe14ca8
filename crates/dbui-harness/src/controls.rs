#![forbid(unsafe_code)]

//! Edit controls backed by headless nodes.
//!
//! Property-panel controls are ordinary nodes of the headless toolkit: what
//! they show and what the user typed both live in the node's text
//! attribute, exactly as with a native text field.

use std::sync::Arc;

use dbui_editor::EditControl;

use crate::toolkit::{HeadlessToolkit, NodeId};

/// A single-line text field.
#[derive(Debug, Clone)]
pub struct HeadlessTextField {
    toolkit: Arc<HeadlessToolkit>,
    node: NodeId,
}

impl HeadlessTextField {
    pub fn new(toolkit: &Arc<HeadlessToolkit>) -> Self {
        Self {
            toolkit: Arc::clone(toolkit),
            node: toolkit.create("text_field"),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn text(&self) -> String {
        self.toolkit.text(self.node)
    }

    /// Replace the field's text the way a user would.
    pub fn type_text(&self, text: &str) {
        if let Err(e) = self.toolkit.type_text(self.node, text) {
            tracing::warn!(node = %self.node, error = %e, "typing into text field failed");
        }
    }
}

impl EditControl<String> for HeadlessTextField {
    fn show(&self, value: &String) {
        if let Err(e) = self.toolkit.set_text(self.node, value.as_str()) {
            tracing::warn!(node = %self.node, error = %e, "text field update failed");
        }
    }

    fn entered(&self) -> Result<String, String> {
        Ok(self.text())
    }
}

/// An integer spinner.
#[derive(Debug, Clone)]
pub struct HeadlessSpinner {
    field: HeadlessTextField,
}

impl HeadlessSpinner {
    pub fn new(toolkit: &Arc<HeadlessToolkit>) -> Self {
        let field = HeadlessTextField {
            toolkit: Arc::clone(toolkit),
            node: toolkit.create("spinner"),
        };
        Self { field }
    }

    pub fn node(&self) -> NodeId {
        self.field.node
    }

    pub fn text(&self) -> String {
        self.field.text()
    }

    pub fn set_count(&self, count: i64) {
        self.field.type_text(&count.to_string());
    }
}

impl EditControl<i64> for HeadlessSpinner {
    fn show(&self, value: &i64) {
        self.field.show(&value.to_string());
    }

    fn entered(&self) -> Result<i64, String> {
        let text = self.field.text();
        text.trim()
            .parse()
            .map_err(|_| format!("'{text}' is not a whole number"))
    }
}
