#![forbid(unsafe_code)]

//! Representations of the fixture catalog on the headless toolkit.
//!
//! | Type | Node kind | Flags |
//! |------|-----------|-------|
//! | `label` | `label` | geometry, style (alarm border), content (text) |
//! | `text_entry` | `text_entry` | geometry, style, value (deferred while editing) |
//! | `group` | `group` | geometry; hosts children |
//! | `xyplot` | `plot` | geometry, content (title, trace count) |
//! | `failing` | | construction fails |

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dbui_core::sync::lock;
use dbui_core::{Property, PropertyValue, Widget};
use dbui_runtime::{
    AlarmSeverity, DirtyFlags, EditGuard, Geometry, HasAlarmBorder, HasGeometry, HasValueBinding,
    ListenerRegistrar, ReconcileContext, Representation, RepresentationError, RepresentationHost,
    UpdateRequester,
};

use crate::catalog::names;
use crate::toolkit::{HeadlessToolkit, Input, NodeId};

/// Attribute holding a plot's trace count.
pub const TRACES_ATTR: &str = "traces";
/// Attribute holding a plot's title.
pub const TITLE_ATTR: &str = "title";

fn text_of(widget: &Widget) -> String {
    widget
        .property::<String>(names::TEXT)
        .map(|p| p.get())
        .unwrap_or_default()
}

/// Register every fixture representation.
pub fn register_fixtures(host: &RepresentationHost<HeadlessToolkit>) {
    host.register("label", |_| Box::new(LabelRep));
    host.register("text_entry", |w| Box::new(TextEntryRep::new(w)));
    host.register("group", |_| Box::new(GroupRep::default()));
    host.register("xyplot", |_| Box::new(PlotRep::default()));
    host.register("failing", |_| Box::new(FailingRep));
}

macro_rules! headless_geometry_and_border {
    ($rep:ty) => {
        impl HasGeometry<HeadlessToolkit> for $rep {
            fn apply_geometry(
                &mut self,
                toolkit: &HeadlessToolkit,
                node: &NodeId,
                geometry: &Geometry,
            ) -> Result<(), RepresentationError> {
                Ok(toolkit.set_geometry(*node, *geometry)?)
            }
        }

        impl HasAlarmBorder<HeadlessToolkit> for $rep {
            fn apply_alarm_border(
                &mut self,
                toolkit: &HeadlessToolkit,
                node: &NodeId,
                severity: AlarmSeverity,
            ) -> Result<(), RepresentationError> {
                Ok(toolkit.set_border(*node, severity.border_color())?)
            }
        }
    };
}

/// Static text.
pub struct LabelRep;

headless_geometry_and_border!(LabelRep);

impl Representation<HeadlessToolkit> for LabelRep {
    fn create_node(
        &mut self,
        toolkit: &HeadlessToolkit,
        widget: &Widget,
    ) -> Result<NodeId, RepresentationError> {
        let node = toolkit.create("label");
        toolkit.set_text(node, text_of(widget))?;
        toolkit.set_geometry(node, Geometry::read(widget))?;
        toolkit.set_border(node, AlarmSeverity::for_widget(widget).border_color())?;
        Ok(node)
    }

    fn register_listeners(
        &mut self,
        _widget: &Widget,
        registrar: &mut ListenerRegistrar,
    ) -> Result<(), RepresentationError> {
        self.watch_geometry(registrar)?;
        self.watch_alarm(registrar);
        registrar.watch(names::TEXT, DirtyFlags::CONTENT)?;
        Ok(())
    }

    fn reconcile(
        &mut self,
        flag: DirtyFlags,
        cx: &ReconcileContext<'_, HeadlessToolkit>,
    ) -> Result<(), RepresentationError> {
        if flag == DirtyFlags::GEOMETRY {
            self.reconcile_geometry(cx)
        } else if flag == DirtyFlags::STYLE {
            self.reconcile_alarm_border(cx)
        } else if flag == DirtyFlags::CONTENT {
            Ok(cx.toolkit.set_text(*cx.node, text_of(cx.widget))?)
        } else {
            Ok(())
        }
    }
}

/// State shared between a text entry's representation and its node's
/// input handler.
struct EntryState {
    guard: Mutex<EditGuard>,
    typed: Mutex<String>,
    requester: Mutex<Option<UpdateRequester>>,
    value: Option<Property<String>>,
}

impl EntryState {
    fn on_input(&self, input: &Input) {
        match input {
            Input::Edited(text) => {
                if let Err(e) = lock(&self.guard).begin_edit() {
                    tracing::debug!(error = %e, "edit ignored");
                    return;
                }
                *lock(&self.typed) = text.clone();
            }
            Input::Confirm => {
                if lock(&self.guard).commit().is_err() {
                    return;
                }
                let typed = lock(&self.typed).clone();
                if let Some(value) = &self.value {
                    if let Err(e) = value.set(typed) {
                        tracing::warn!(error = %e, "entered value rejected");
                    }
                }
                self.finish();
            }
            Input::Cancel => {
                if lock(&self.guard).revert().is_err() {
                    return;
                }
                self.finish();
            }
        }
    }

    /// Settle the guard and have the next pass show the model value.
    fn finish(&self) {
        if let Err(e) = lock(&self.guard).settle() {
            tracing::debug!(error = %e, "entry guard not settled");
        }
        if let Some(requester) = lock(&self.requester).as_ref() {
            requester.request(DirtyFlags::VALUE);
        }
    }
}

/// A runtime text entry. Model updates are held back while the user types.
pub struct TextEntryRep {
    state: Arc<EntryState>,
}

headless_geometry_and_border!(TextEntryRep);

impl TextEntryRep {
    pub fn new(widget: &Widget) -> Self {
        Self {
            state: Arc::new(EntryState {
                guard: Mutex::new(EditGuard::new()),
                typed: Mutex::new(String::new()),
                requester: Mutex::new(None),
                value: widget.property::<String>(names::TEXT),
            }),
        }
    }
}

impl HasValueBinding for TextEntryRep {
    fn value_guard(&self) -> EditGuard {
        *lock(&self.state.guard)
    }
}

impl Representation<HeadlessToolkit> for TextEntryRep {
    fn create_node(
        &mut self,
        toolkit: &HeadlessToolkit,
        widget: &Widget,
    ) -> Result<NodeId, RepresentationError> {
        let node = toolkit.create("text_entry");
        toolkit.set_text(node, text_of(widget))?;
        toolkit.set_geometry(node, Geometry::read(widget))?;
        let state = Arc::clone(&self.state);
        toolkit.on_input(node, Arc::new(move |input: &Input| state.on_input(input)))?;
        Ok(node)
    }

    fn register_listeners(
        &mut self,
        _widget: &Widget,
        registrar: &mut ListenerRegistrar,
    ) -> Result<(), RepresentationError> {
        self.watch_geometry(registrar)?;
        self.watch_alarm(registrar);
        registrar.watch(names::TEXT, DirtyFlags::VALUE)?;
        *lock(&self.state.requester) = Some(registrar.requester());
        Ok(())
    }

    fn reconcile(
        &mut self,
        flag: DirtyFlags,
        cx: &ReconcileContext<'_, HeadlessToolkit>,
    ) -> Result<(), RepresentationError> {
        if flag == DirtyFlags::GEOMETRY {
            self.reconcile_geometry(cx)
        } else if flag == DirtyFlags::STYLE {
            self.reconcile_alarm_border(cx)
        } else if flag == DirtyFlags::VALUE {
            Ok(cx.toolkit.set_text(*cx.node, text_of(cx.widget))?)
        } else {
            Ok(())
        }
    }

    fn defers(&self, flag: DirtyFlags) -> bool {
        self.defers_value(flag)
    }

    fn dispose(&mut self, _toolkit: &HeadlessToolkit) {
        lock(&self.state.requester).take();
    }
}

/// Container; children are inserted under its own node.
#[derive(Default)]
pub struct GroupRep {
    node: Option<NodeId>,
}

impl HasGeometry<HeadlessToolkit> for GroupRep {
    fn apply_geometry(
        &mut self,
        toolkit: &HeadlessToolkit,
        node: &NodeId,
        geometry: &Geometry,
    ) -> Result<(), RepresentationError> {
        Ok(toolkit.set_geometry(*node, *geometry)?)
    }
}

impl Representation<HeadlessToolkit> for GroupRep {
    fn create_node(
        &mut self,
        toolkit: &HeadlessToolkit,
        widget: &Widget,
    ) -> Result<NodeId, RepresentationError> {
        let node = toolkit.create("group");
        toolkit.set_geometry(node, Geometry::read(widget))?;
        self.node = Some(node);
        Ok(node)
    }

    fn register_listeners(
        &mut self,
        _widget: &Widget,
        registrar: &mut ListenerRegistrar,
    ) -> Result<(), RepresentationError> {
        Ok(self.watch_geometry(registrar)?)
    }

    fn reconcile(
        &mut self,
        flag: DirtyFlags,
        cx: &ReconcileContext<'_, HeadlessToolkit>,
    ) -> Result<(), RepresentationError> {
        if flag == DirtyFlags::GEOMETRY {
            self.reconcile_geometry(cx)
        } else {
            Ok(())
        }
    }

    fn child_parent(&self) -> Option<NodeId> {
        self.node
    }
}

/// Plot showing its title and how many traces it has.
///
/// The trace count is cached by the listener so the pass does not clone
/// the array.
#[derive(Default)]
pub struct PlotRep {
    traces: Arc<AtomicUsize>,
}

impl HasGeometry<HeadlessToolkit> for PlotRep {
    fn apply_geometry(
        &mut self,
        toolkit: &HeadlessToolkit,
        node: &NodeId,
        geometry: &Geometry,
    ) -> Result<(), RepresentationError> {
        Ok(toolkit.set_geometry(*node, *geometry)?)
    }
}

impl Representation<HeadlessToolkit> for PlotRep {
    fn create_node(
        &mut self,
        toolkit: &HeadlessToolkit,
        widget: &Widget,
    ) -> Result<NodeId, RepresentationError> {
        let node = toolkit.create("plot");
        let traces = widget
            .property_dyn(names::TRACES)
            .and_then(|p| p.as_array().map(|a| a.len()))
            .unwrap_or(0);
        self.traces.store(traces, Ordering::Release);
        toolkit.set_geometry(node, Geometry::read(widget))?;
        toolkit.set_attr(node, TRACES_ATTR, traces.to_string())?;
        let title = widget.property::<String>(names::TITLE).map(|p| p.get()).unwrap_or_default();
        toolkit.set_attr(node, TITLE_ATTR, title)?;
        Ok(node)
    }

    fn register_listeners(
        &mut self,
        _widget: &Widget,
        registrar: &mut ListenerRegistrar,
    ) -> Result<(), RepresentationError> {
        self.watch_geometry(registrar)?;
        registrar.watch(names::TITLE, DirtyFlags::CONTENT)?;
        let traces = Arc::clone(&self.traces);
        registrar.watch_with(names::TRACES, DirtyFlags::CONTENT, move |change| {
            if let PropertyValue::Array(items) = &change.new {
                traces.store(items.len(), Ordering::Release);
            }
        })?;
        Ok(())
    }

    fn reconcile(
        &mut self,
        flag: DirtyFlags,
        cx: &ReconcileContext<'_, HeadlessToolkit>,
    ) -> Result<(), RepresentationError> {
        if flag == DirtyFlags::GEOMETRY {
            return self.reconcile_geometry(cx);
        }
        if flag != DirtyFlags::CONTENT {
            return Ok(());
        }
        let count = self.traces.load(Ordering::Acquire);
        cx.toolkit.set_attr(*cx.node, TRACES_ATTR, count.to_string())?;
        let title = cx
            .widget
            .property::<String>(names::TITLE)
            .map(|p| p.get())
            .unwrap_or_default();
        Ok(cx.toolkit.set_attr(*cx.node, TITLE_ATTR, title)?)
    }
}

/// Always fails to build.
pub struct FailingRep;

impl Representation<HeadlessToolkit> for FailingRep {
    fn create_node(
        &mut self,
        _toolkit: &HeadlessToolkit,
        widget: &Widget,
    ) -> Result<NodeId, RepresentationError> {
        Err(RepresentationError::Failed(format!(
            "no native peer for '{}'",
            widget.name()
        )))
    }

    fn register_listeners(
        &mut self,
        _widget: &Widget,
        _registrar: &mut ListenerRegistrar,
    ) -> Result<(), RepresentationError> {
        Ok(())
    }

    fn reconcile(
        &mut self,
        _flag: DirtyFlags,
        _cx: &ReconcileContext<'_, HeadlessToolkit>,
    ) -> Result<(), RepresentationError> {
        Ok(())
    }
}
