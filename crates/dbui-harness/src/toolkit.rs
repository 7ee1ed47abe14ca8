#![forbid(unsafe_code)]

//! In-memory toolkit with a manually pumped UI thread.
//!
//! The UI thread is the thread that created the toolkit. Tasks posted from
//! other threads queue up until that thread calls [`HeadlessToolkit::pump`]
//! or [`HeadlessToolkit::run_frames`]. Nodes are plain records: a kind, a
//! string attribute map, geometry, an optional border color and children.
//!
//! Every node write checks that it runs on the UI thread and that the node
//! was not removed. A write to a removed node is counted in
//! [`HeadlessToolkit::late_mutations`] and rejected, so tests can assert the
//! runtime never touches a disposed node.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use dbui_core::Color;
use dbui_core::sync::lock;
use dbui_runtime::{Geometry, Toolkit, ToolkitError, UiExecutor, UiTask};

/// Attribute holding a node's displayed text.
pub const TEXT_ATTR: &str = "text";

/// Opaque node handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// User input delivered to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// The user typed; the node's text is already replaced.
    Edited(String),
    /// Enter.
    Confirm,
    /// Escape.
    Cancel,
}

/// Called on the UI thread for input on one node.
pub type InputHandler = Arc<dyn Fn(&Input) + Send + Sync>;

#[derive(Default)]
struct NodeRecord {
    kind: String,
    attrs: BTreeMap<String, String>,
    geometry: Option<Geometry>,
    border: Option<Color>,
    children: Vec<NodeId>,
    removed: bool,
    handler: Option<InputHandler>,
}

/// Counters for assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolkitStats {
    /// Node writes that succeeded.
    pub mutations: u64,
    /// Node writes rejected because the node was removed.
    pub late_mutations: u64,
    /// Tasks run by `pump`.
    pub tasks_run: u64,
}

/// Outcome of [`HeadlessToolkit::run_frames`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub frames: usize,
    pub tasks: usize,
    pub elapsed: Duration,
    /// Whether the stop condition was met before `max_frames`.
    pub settled: bool,
}

/// Headless [`Toolkit`].
pub struct HeadlessToolkit {
    ui_thread: ThreadId,
    queue: Mutex<VecDeque<UiTask>>,
    nodes: Mutex<HashMap<NodeId, NodeRecord>>,
    next: AtomicU64,
    mutations: AtomicU64,
    late_mutations: AtomicU64,
    tasks_run: AtomicU64,
}

impl fmt::Debug for HeadlessToolkit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessToolkit")
            .field("nodes", &lock(&self.nodes).len())
            .field("queued", &lock(&self.queue).len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl HeadlessToolkit {
    /// A toolkit whose UI thread is the calling thread.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ui_thread: thread::current().id(),
            queue: Mutex::new(VecDeque::new()),
            nodes: Mutex::new(HashMap::new()),
            next: AtomicU64::new(1),
            mutations: AtomicU64::new(0),
            late_mutations: AtomicU64::new(0),
            tasks_run: AtomicU64::new(0),
        })
    }

    /// Create a detached node.
    pub fn create(&self, kind: &str) -> NodeId {
        let id = NodeId(self.next.fetch_add(1, Ordering::Relaxed));
        lock(&self.nodes).insert(
            id,
            NodeRecord {
                kind: kind.to_string(),
                ..NodeRecord::default()
            },
        );
        id
    }

    fn write<R>(
        &self,
        node: NodeId,
        f: impl FnOnce(&mut NodeRecord) -> R,
    ) -> Result<R, ToolkitError> {
        if !self.is_ui_thread() {
            return Err(ToolkitError::WrongThread);
        }
        let mut nodes = lock(&self.nodes);
        match nodes.get_mut(&node) {
            Some(record) if !record.removed => {
                self.mutations.fetch_add(1, Ordering::Relaxed);
                Ok(f(record))
            }
            Some(_) => {
                self.late_mutations.fetch_add(1, Ordering::SeqCst);
                tracing::error!(%node, "write to removed node");
                Err(ToolkitError::InvalidNode(node.to_string()))
            }
            None => Err(ToolkitError::InvalidNode(node.to_string())),
        }
    }

    fn read<R: Default>(&self, node: NodeId, f: impl FnOnce(&NodeRecord) -> R) -> R {
        lock(&self.nodes).get(&node).map(f).unwrap_or_default()
    }

    pub fn set_attr(
        &self,
        node: NodeId,
        key: &str,
        value: impl Into<String>,
    ) -> Result<(), ToolkitError> {
        let value = value.into();
        self.write(node, |r| {
            r.attrs.insert(key.to_string(), value);
        })
    }

    pub fn set_text(&self, node: NodeId, text: impl Into<String>) -> Result<(), ToolkitError> {
        self.set_attr(node, TEXT_ATTR, text)
    }

    pub fn set_geometry(&self, node: NodeId, geometry: Geometry) -> Result<(), ToolkitError> {
        self.write(node, |r| r.geometry = Some(geometry))
    }

    pub fn set_border(&self, node: NodeId, border: Option<Color>) -> Result<(), ToolkitError> {
        self.write(node, |r| r.border = border)
    }

    /// Route user input on `node` to `handler`.
    pub fn on_input(&self, node: NodeId, handler: InputHandler) -> Result<(), ToolkitError> {
        self.write(node, |r| r.handler = Some(handler))
    }

    pub fn attr(&self, node: NodeId, key: &str) -> Option<String> {
        self.read(node, |r| r.attrs.get(key).cloned())
    }

    pub fn text(&self, node: NodeId) -> String {
        self.attr(node, TEXT_ATTR).unwrap_or_default()
    }

    pub fn geometry(&self, node: NodeId) -> Option<Geometry> {
        self.read(node, |r| r.geometry)
    }

    pub fn border(&self, node: NodeId) -> Option<Color> {
        self.read(node, |r| r.border)
    }

    pub fn kind(&self, node: NodeId) -> String {
        self.read(node, |r| r.kind.clone())
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.read(node, |r| r.children.clone())
    }

    pub fn is_removed(&self, node: NodeId) -> bool {
        lock(&self.nodes).get(&node).is_none_or(|r| r.removed)
    }

    /// Children of `node` whose kind is `kind`, in native order.
    pub fn children_of_kind(&self, node: NodeId, kind: &str) -> Vec<NodeId> {
        self.children(node)
            .into_iter()
            .filter(|&c| self.kind(c) == kind)
            .collect()
    }

    /// Simulate the user typing `text` into `node`.
    pub fn type_text(&self, node: NodeId, text: &str) -> Result<(), ToolkitError> {
        self.set_text(node, text)?;
        self.deliver(node, &Input::Edited(text.to_string()))
    }

    /// Deliver `input` to the node's handler, if it has one.
    pub fn deliver(&self, node: NodeId, input: &Input) -> Result<(), ToolkitError> {
        let handler = self.write(node, |r| r.handler.clone())?;
        if let Some(handler) = handler {
            handler(input);
        }
        Ok(())
    }

    pub fn stats(&self) -> ToolkitStats {
        ToolkitStats {
            mutations: self.mutations.load(Ordering::Relaxed),
            late_mutations: self.late_mutations.load(Ordering::SeqCst),
            tasks_run: self.tasks_run.load(Ordering::Relaxed),
        }
    }

    pub fn late_mutations(&self) -> u64 {
        self.late_mutations.load(Ordering::SeqCst)
    }

    pub fn pending_tasks(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Run posted tasks until none remain, including tasks they post.
    /// Returns how many ran. UI thread only.
    pub fn pump(&self) -> usize {
        if !self.is_ui_thread() {
            tracing::warn!("pump called off the UI thread");
            return 0;
        }
        let mut ran = 0;
        loop {
            let task = lock(&self.queue).pop_front();
            let Some(task) = task else {
                break;
            };
            task();
            ran += 1;
        }
        self.tasks_run.fetch_add(ran as u64, Ordering::Relaxed);
        ran
    }

    /// Pump once per `frame` until `done` returns true or `max_frames`
    /// frames have passed.
    pub fn run_frames(
        &self,
        frame: Duration,
        max_frames: usize,
        mut done: impl FnMut() -> bool,
    ) -> FrameReport {
        let start = Instant::now();
        let mut report = FrameReport {
            frames: 0,
            tasks: 0,
            elapsed: Duration::ZERO,
            settled: false,
        };
        while report.frames < max_frames {
            thread::sleep(frame);
            report.tasks += self.pump();
            report.frames += 1;
            if done() {
                report.settled = true;
                break;
            }
        }
        report.elapsed = start.elapsed();
        report
    }

    /// Indented text dump of the live tree under `root`.
    ///
    /// One line per node: kind, text, geometry and border when set.
    pub fn snapshot(&self, root: NodeId) -> String {
        let nodes = lock(&self.nodes);
        let mut out = String::new();
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(record) = nodes.get(&id) else {
                continue;
            };
            if record.removed {
                continue;
            }
            let _ = write!(out, "{:indent$}{}", "", record.kind, indent = depth * 2);
            if let Some(text) = record.attrs.get(TEXT_ATTR) {
                let _ = write!(out, " {text:?}");
            }
            if let Some(g) = record.geometry {
                let _ = write!(out, " @{},{} {}x{}", g.x, g.y, g.width, g.height);
                if !g.visible {
                    out.push_str(" hidden");
                }
            }
            if let Some(border) = record.border {
                let _ = write!(out, " border={border}");
            }
            out.push('\n');
            for &child in record.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }
}

impl UiExecutor for HeadlessToolkit {
    fn execute(&self, task: UiTask) {
        lock(&self.queue).push_back(task);
    }

    fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.ui_thread
    }
}

impl Toolkit for HeadlessToolkit {
    type Node = NodeId;

    fn insert_child(
        &self,
        parent: &NodeId,
        index: usize,
        child: &NodeId,
    ) -> Result<(), ToolkitError> {
        let child = *child;
        self.write(*parent, |r| {
            if index > r.children.len() {
                return Err(ToolkitError::Rejected(format!(
                    "index {index} beyond {} children",
                    r.children.len()
                )));
            }
            r.children.insert(index, child);
            Ok(())
        })?
    }

    fn remove_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), ToolkitError> {
        if !self.is_ui_thread() {
            return Err(ToolkitError::WrongThread);
        }
        let mut nodes = lock(&self.nodes);
        if let Some(record) = nodes.get_mut(parent) {
            record.children.retain(|c| c != child);
        }
        let record = nodes
            .get_mut(child)
            .ok_or_else(|| ToolkitError::InvalidNode(child.to_string()))?;
        record.removed = true;
        record.handler = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posted_tasks_wait_for_pump() {
        let tk = HeadlessToolkit::new();
        let ran = Arc::new(AtomicU64::new(0));
        let r = Arc::clone(&ran);
        let remote = Arc::clone(&tk);
        thread::spawn(move || {
            remote.run_or_post(Box::new(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }));
        })
        .join()
        .unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(tk.pump(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_nodes_reject_writes() {
        let tk = HeadlessToolkit::new();
        let root = tk.create("root");
        let child = tk.create("label");
        tk.insert_child(&root, 0, &child).unwrap();
        tk.remove_child(&root, &child).unwrap();
        assert!(tk.set_text(child, "late").is_err());
        assert_eq!(tk.late_mutations(), 1);
        assert!(tk.children(root).is_empty());
    }

    #[test]
    fn writes_off_the_ui_thread_are_refused() {
        let tk = HeadlessToolkit::new();
        let node = tk.create("label");
        let remote = Arc::clone(&tk);
        let result = thread::spawn(move || remote.set_text(node, "x")).join().unwrap();
        assert_eq!(result, Err(ToolkitError::WrongThread));
    }

    #[test]
    fn snapshot_lists_the_tree_in_order() {
        let tk = HeadlessToolkit::new();
        let root = tk.create("root");
        let a = tk.create("label");
        let b = tk.create("label");
        tk.insert_child(&root, 0, &b).unwrap();
        tk.insert_child(&root, 0, &a).unwrap();
        tk.set_text(a, "A").unwrap();
        tk.set_text(b, "B").unwrap();
        tk.set_geometry(
            b,
            Geometry {
                x: 1,
                y: 2,
                width: 3,
                height: 4,
                visible: false,
            },
        )
        .unwrap();
        assert_eq!(tk.snapshot(root), "root\n  label \"A\"\n  label \"B\" @1,2 3x4 hidden\n");
    }

    #[test]
    fn input_reaches_the_handler() {
        let tk = HeadlessToolkit::new();
        let node = tk.create("entry");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        tk.on_input(node, Arc::new(move |input: &Input| lock(&s).push(input.clone())))
            .unwrap();
        tk.type_text(node, "ab").unwrap();
        tk.deliver(node, &Input::Confirm).unwrap();
        assert_eq!(tk.text(node), "ab");
        assert_eq!(*lock(&seen), vec![Input::Edited("ab".into()), Input::Confirm]);
    }
}
