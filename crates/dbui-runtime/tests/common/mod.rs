#![allow(dead_code)]

//! Minimal in-memory toolkit and representations for runtime tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use dbui_core::{PropertyCategory, PropertyDescriptor, Widget, WidgetBuilder};
use dbui_runtime::{
    DirtyFlags, Geometry, HasGeometry, ListenerRegistrar, ReconcileContext, Representation,
    RepresentationError, Toolkit, ToolkitError, UiExecutor, UiTask,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

#[derive(Debug, Default)]
struct NodeRecord {
    kind: String,
    text: String,
    geometry: Option<Geometry>,
    children: Vec<NodeId>,
    removed: bool,
}

/// Toolkit whose UI thread is the thread that created it. Posted tasks run
/// only when that thread calls [`TestToolkit::pump`].
pub struct TestToolkit {
    ui_thread: ThreadId,
    queue: Mutex<VecDeque<UiTask>>,
    nodes: Mutex<HashMap<NodeId, NodeRecord>>,
    next: AtomicU64,
    late_mutations: AtomicUsize,
    text_writes: AtomicUsize,
}

impl TestToolkit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ui_thread: thread::current().id(),
            queue: Mutex::new(VecDeque::new()),
            nodes: Mutex::new(HashMap::new()),
            next: AtomicU64::new(1),
            late_mutations: AtomicUsize::new(0),
            text_writes: AtomicUsize::new(0),
        })
    }

    pub fn create(&self, kind: &str) -> NodeId {
        let id = NodeId(self.next.fetch_add(1, Ordering::Relaxed));
        self.nodes.lock().unwrap().insert(
            id,
            NodeRecord {
                kind: kind.to_string(),
                ..NodeRecord::default()
            },
        );
        id
    }

    fn check_live(&self, node: NodeId) -> Result<(), ToolkitError> {
        if !self.is_ui_thread() {
            return Err(ToolkitError::WrongThread);
        }
        match self.nodes.lock().unwrap().get(&node) {
            Some(record) if !record.removed => Ok(()),
            _ => {
                self.late_mutations.fetch_add(1, Ordering::SeqCst);
                Err(ToolkitError::InvalidNode(format!("{node:?}")))
            }
        }
    }

    pub fn set_text(&self, node: NodeId, text: &str) -> Result<(), ToolkitError> {
        self.check_live(node)?;
        self.text_writes.fetch_add(1, Ordering::SeqCst);
        if let Some(record) = self.nodes.lock().unwrap().get_mut(&node) {
            record.text = text.to_string();
        }
        Ok(())
    }

    pub fn set_geometry(&self, node: NodeId, geometry: Geometry) -> Result<(), ToolkitError> {
        self.check_live(node)?;
        if let Some(record) = self.nodes.lock().unwrap().get_mut(&node) {
            record.geometry = Some(geometry);
        }
        Ok(())
    }

    pub fn text(&self, node: NodeId) -> String {
        self.nodes
            .lock()
            .unwrap()
            .get(&node)
            .map(|r| r.text.clone())
            .unwrap_or_default()
    }

    pub fn geometry(&self, node: NodeId) -> Option<Geometry> {
        self.nodes.lock().unwrap().get(&node).and_then(|r| r.geometry)
    }

    pub fn kind(&self, node: NodeId) -> String {
        self.nodes
            .lock()
            .unwrap()
            .get(&node)
            .map(|r| r.kind.clone())
            .unwrap_or_default()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .lock()
            .unwrap()
            .get(&node)
            .map(|r| r.children.clone())
            .unwrap_or_default()
    }

    /// Texts of `node`'s children, in native order.
    pub fn child_texts(&self, node: NodeId) -> Vec<String> {
        self.children(node).into_iter().map(|c| self.text(c)).collect()
    }

    pub fn is_removed(&self, node: NodeId) -> bool {
        self.nodes.lock().unwrap().get(&node).is_none_or(|r| r.removed)
    }

    /// Writes attempted on removed nodes.
    pub fn late_mutations(&self) -> usize {
        self.late_mutations.load(Ordering::SeqCst)
    }

    pub fn text_writes(&self) -> usize {
        self.text_writes.load(Ordering::SeqCst)
    }

    pub fn pending_tasks(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Run posted tasks until none remain. Returns how many ran.
    pub fn pump(&self) -> usize {
        assert!(self.is_ui_thread(), "pump must run on the UI thread");
        let mut ran = 0;
        loop {
            let task = self.queue.lock().unwrap().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl UiExecutor for TestToolkit {
    fn execute(&self, task: UiTask) {
        self.queue.lock().unwrap().push_back(task);
    }

    fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.ui_thread
    }
}

impl Toolkit for TestToolkit {
    type Node = NodeId;

    fn insert_child(
        &self,
        parent: &NodeId,
        index: usize,
        child: &NodeId,
    ) -> Result<(), ToolkitError> {
        if !self.is_ui_thread() {
            return Err(ToolkitError::WrongThread);
        }
        let mut nodes = self.nodes.lock().unwrap();
        let record = nodes
            .get_mut(parent)
            .ok_or_else(|| ToolkitError::InvalidNode(format!("{parent:?}")))?;
        if index > record.children.len() {
            return Err(ToolkitError::Rejected(format!("index {index} out of range")));
        }
        record.children.insert(index, *child);
        Ok(())
    }

    fn remove_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), ToolkitError> {
        if !self.is_ui_thread() {
            return Err(ToolkitError::WrongThread);
        }
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(record) = nodes.get_mut(parent) {
            record.children.retain(|c| c != child);
        }
        let record = nodes
            .get_mut(child)
            .ok_or_else(|| ToolkitError::InvalidNode(format!("{child:?}")))?;
        record.removed = true;
        Ok(())
    }
}

pub const TEXT: &str = "text";

pub fn label(name: &str, text: &str) -> Widget {
    WidgetBuilder::new("label")
        .name(name)
        .property(PropertyDescriptor::new(TEXT, PropertyCategory::Display, text.to_string()))
        .build()
        .unwrap()
}

pub fn group(name: &str) -> Widget {
    WidgetBuilder::new("group").name(name).container().build().unwrap()
}

pub fn display() -> Widget {
    WidgetBuilder::new("display").name("display").container().build().unwrap()
}

/// Shows the `text` property; counts reconciles per flag.
#[derive(Default)]
pub struct LabelRep {
    pub content_passes: Arc<AtomicUsize>,
}

impl HasGeometry<TestToolkit> for LabelRep {
    fn apply_geometry(
        &mut self,
        toolkit: &TestToolkit,
        node: &NodeId,
        geometry: &Geometry,
    ) -> Result<(), RepresentationError> {
        Ok(toolkit.set_geometry(*node, *geometry)?)
    }
}

impl Representation<TestToolkit> for LabelRep {
    fn create_node(
        &mut self,
        toolkit: &TestToolkit,
        widget: &Widget,
    ) -> Result<NodeId, RepresentationError> {
        let node = toolkit.create("label");
        let text = widget.property::<String>(TEXT).map(|p| p.get()).unwrap_or_default();
        toolkit.set_text(node, &text)?;
        Ok(node)
    }

    fn register_listeners(
        &mut self,
        _widget: &Widget,
        registrar: &mut ListenerRegistrar,
    ) -> Result<(), RepresentationError> {
        self.watch_geometry(registrar)?;
        registrar.watch(TEXT, DirtyFlags::CONTENT)?;
        Ok(())
    }

    fn reconcile(
        &mut self,
        flag: DirtyFlags,
        cx: &ReconcileContext<'_, TestToolkit>,
    ) -> Result<(), RepresentationError> {
        if flag == DirtyFlags::GEOMETRY {
            self.reconcile_geometry(cx)
        } else if flag == DirtyFlags::CONTENT {
            self.content_passes.fetch_add(1, Ordering::SeqCst);
            let text = cx.widget.property::<String>(TEXT).map(|p| p.get()).unwrap_or_default();
            Ok(cx.toolkit.set_text(*cx.node, &text)?)
        } else {
            Ok(())
        }
    }
}

/// Container whose children go directly under its own node.
#[derive(Default)]
pub struct GroupRep {
    node: Option<NodeId>,
}

impl Representation<TestToolkit> for GroupRep {
    fn create_node(
        &mut self,
        toolkit: &TestToolkit,
        _widget: &Widget,
    ) -> Result<NodeId, RepresentationError> {
        let node = toolkit.create("group");
        self.node = Some(node);
        Ok(node)
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
        _cx: &ReconcileContext<'_, TestToolkit>,
    ) -> Result<(), RepresentationError> {
        Ok(())
    }

    fn child_parent(&self) -> Option<NodeId> {
        self.node
    }
}

/// Fails in `create_node`.
pub struct BrokenRep;

impl Representation<TestToolkit> for BrokenRep {
    fn create_node(
        &mut self,
        _toolkit: &TestToolkit,
        widget: &Widget,
    ) -> Result<NodeId, RepresentationError> {
        Err(RepresentationError::Failed(format!("cannot build {}", widget.name())))
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
        _cx: &ReconcileContext<'_, TestToolkit>,
    ) -> Result<(), RepresentationError> {
        Ok(())
    }
}

/// Panics while reconciling geometry, works for content.
#[derive(Default)]
pub struct FlakyRep {
    inner: LabelRep,
}

impl Representation<TestToolkit> for FlakyRep {
    fn create_node(
        &mut self,
        toolkit: &TestToolkit,
        widget: &Widget,
    ) -> Result<NodeId, RepresentationError> {
        self.inner.create_node(toolkit, widget)
    }

    fn register_listeners(
        &mut self,
        widget: &Widget,
        registrar: &mut ListenerRegistrar,
    ) -> Result<(), RepresentationError> {
        self.inner.register_listeners(widget, registrar)
    }

    fn reconcile(
        &mut self,
        flag: DirtyFlags,
        cx: &ReconcileContext<'_, TestToolkit>,
    ) -> Result<(), RepresentationError> {
        if flag == DirtyFlags::GEOMETRY {
            panic!("geometry bug");
        }
        self.inner.reconcile(flag, cx)
    }
}

/// Register the fixture representations on a host.
pub fn register_all(host: &dbui_runtime::RepresentationHost<TestToolkit>) {
    host.register("label", |_| Box::new(LabelRep::default()));
    host.register("group", |_| Box::new(GroupRep::default()));
    host.register("broken", |_| Box::new(BrokenRep));
    host.register("flaky", |_| Box::new(FlakyRep::default()));
}

pub fn broken(name: &str) -> Widget {
    WidgetBuilder::new("broken").name(name).build().unwrap()
}

pub fn flaky(name: &str, text: &str) -> Widget {
    WidgetBuilder::new("flaky")
        .name(name)
        .property(PropertyDescriptor::new(TEXT, PropertyCategory::Display, text.to_string()))
        .build()
        .unwrap()
}
