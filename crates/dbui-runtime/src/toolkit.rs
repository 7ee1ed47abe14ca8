#![forbid(unsafe_code)]

//! Boundary to the native UI toolkit.
//!
//! The runtime never names a concrete toolkit. It needs three things from
//! one: a way to run a closure on the UI-owning thread, and the two
//! structural mutations that keep native child order in step with the model
//! (insert at index, remove). Everything else a representation does to its
//! node is adapter-specific and goes through the concrete toolkit type.

use std::fmt;

/// A unit of work for the UI thread.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs closures on the single UI-owning thread.
pub trait UiExecutor: Send + Sync + 'static {
    /// Queue `task` to run on the UI thread. Never runs it inline.
    fn execute(&self, task: UiTask);

    /// Whether the calling thread is the UI thread.
    fn is_ui_thread(&self) -> bool;

    /// Run `task` now if on the UI thread, otherwise queue it.
    fn run_or_post(&self, task: UiTask) {
        if self.is_ui_thread() {
            task();
        } else {
            self.execute(task);
        }
    }
}

/// A native UI toolkit as seen by the runtime.
///
/// `Node` is an opaque handle. It must be cheap to clone and safe to move
/// between threads, but the toolkit only mutates nodes on the UI thread.
pub trait Toolkit: UiExecutor {
    type Node: Clone + Send + Sync + fmt::Debug + 'static;

    /// Insert `child` into `parent`'s child list at `index`.
    fn insert_child(
        &self,
        parent: &Self::Node,
        index: usize,
        child: &Self::Node,
    ) -> Result<(), ToolkitError>;

    /// Remove `child` from `parent`'s child list.
    fn remove_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), ToolkitError>;
}

/// Failure reported by a toolkit operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolkitError {
    /// The node handle does not refer to a live node.
    InvalidNode(String),
    /// A structural operation was rejected.
    Rejected(String),
    /// Called off the UI thread.
    WrongThread,
}

impl fmt::Display for ToolkitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNode(node) => write!(f, "invalid node {node}"),
            Self::Rejected(reason) => write!(f, "toolkit rejected operation: {reason}"),
            Self::WrongThread => write!(f, "native node touched off the UI thread"),
        }
    }
}

impl std::error::Error for ToolkitError {}
