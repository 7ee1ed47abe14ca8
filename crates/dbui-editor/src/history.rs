#![forbid(unsafe_code)]

//! Undo history.
//!
//! [`UndoManager`] runs actions and keeps two stacks. Executing an action
//! clears the redo stack. The undo stack is bounded by
//! [`HistoryConfig::max_depth`]; the oldest entries are dropped first.
//!
//! | Operation | Empty stack | Action fails |
//! |-----------|-------------|--------------|
//! | `execute` | n/a | Error returned, nothing recorded |
//! | `undo` | `Ok(false)` | Error returned, action stays on the undo stack |
//! | `redo` | `Ok(false)` | Error returned, action stays on the redo stack |
//!
//! History is a UI-thread concern. [`SharedUndo`] exists so several
//! bindings can hold the same manager; it is not meant for concurrent use.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::action::{ActionGroup, UndoableAction};
use crate::error::ActionError;

pub const ENV_UNDO_DEPTH: &str = "DBUI_UNDO_DEPTH";

/// Undo history limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Undo steps kept. At least 1.
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_depth: 100 }
    }
}

impl HistoryConfig {
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// Read `DBUI_UNDO_DEPTH`, keeping the default for a missing or invalid
    /// value.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(mut get: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = get(ENV_UNDO_DEPTH) {
            match value.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => config.max_depth = depth,
                _ => {
                    tracing::warn!(variable = ENV_UNDO_DEPTH, %value, "ignoring invalid undo depth")
                }
            }
        }
        config
    }
}

/// Snapshot passed to history listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryState {
    pub can_undo: bool,
    pub can_redo: bool,
    pub undo_description: Option<String>,
    pub redo_description: Option<String>,
}

type HistoryListener = Box<dyn Fn(&HistoryState) + Send>;

/// Undo and redo stacks.
pub struct UndoManager {
    undo: VecDeque<Box<dyn UndoableAction>>,
    redo: Vec<Box<dyn UndoableAction>>,
    config: HistoryConfig,
    listeners: Vec<(u64, HistoryListener)>,
    next_listener: u64,
}

/// An undo manager shared by the bindings of one editor.
pub type SharedUndo = Arc<Mutex<UndoManager>>;

impl fmt::Debug for UndoManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoManager")
            .field("undo", &self.undo.len())
            .field("redo", &self.redo.len())
            .field("max_depth", &self.config.max_depth)
            .finish()
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl UndoManager {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            config,
            listeners: Vec::new(),
            next_listener: 1,
        }
    }

    /// A manager ready to be handed to several bindings.
    pub fn shared(config: HistoryConfig) -> SharedUndo {
        Arc::new(Mutex::new(Self::new(config)))
    }

    /// Run `action` and record it.
    pub fn execute(&mut self, action: impl UndoableAction + 'static) -> Result<(), ActionError> {
        self.execute_boxed(Box::new(action))
    }

    pub fn execute_boxed(
        &mut self,
        mut action: Box<dyn UndoableAction>,
    ) -> Result<(), ActionError> {
        action.run()?;
        tracing::debug!(action = %action.description(), "executed");
        self.undo.push_back(action);
        while self.undo.len() > self.config.max_depth {
            self.undo.pop_front();
        }
        self.redo.clear();
        self.notify();
        Ok(())
    }

    /// Run `group` as one undo step. An empty group records nothing.
    pub fn execute_group(&mut self, group: ActionGroup) -> Result<bool, ActionError> {
        if group.is_empty() {
            return Ok(false);
        }
        self.execute(group)?;
        Ok(true)
    }

    /// Undo the latest step. `Ok(false)` if there is none.
    pub fn undo(&mut self) -> Result<bool, ActionError> {
        let Some(mut action) = self.undo.pop_back() else {
            return Ok(false);
        };
        if let Err(e) = action.undo() {
            self.undo.push_back(action);
            return Err(e);
        }
        tracing::debug!(action = %action.description(), "undone");
        self.redo.push(action);
        self.notify();
        Ok(true)
    }

    /// Redo the latest undone step. `Ok(false)` if there is none.
    pub fn redo(&mut self) -> Result<bool, ActionError> {
        let Some(mut action) = self.redo.pop() else {
            return Ok(false);
        };
        if let Err(e) = action.run() {
            self.redo.push(action);
            return Err(e);
        }
        tracing::debug!(action = %action.description(), "redone");
        self.undo.push_back(action);
        self.notify();
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo.back().map(|a| a.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo.last().map(|a| a.description())
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Forget all history.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.notify();
    }

    pub fn state(&self) -> HistoryState {
        HistoryState {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            undo_description: self.undo_description(),
            redo_description: self.redo_description(),
        }
    }

    /// Be told after every change of either stack. The listener runs with
    /// the manager borrowed and must not call back into it.
    pub fn add_listener(&mut self, listener: impl Fn(&HistoryState) + Send + 'static) -> u64 {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: u64) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn notify(&self) {
        if self.listeners.is_empty() {
            return;
        }
        let state = self.state();
        for (_, listener) in &self.listeners {
            listener(&state);
        }
    }
}
