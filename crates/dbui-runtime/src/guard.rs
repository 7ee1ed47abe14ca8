#![forbid(unsafe_code)]

//! Edit guard state machine.
//!
//! Interactive controls bound to a property must not be overwritten by model
//! updates while the user is typing into them. The guard makes that rule a
//! checked state machine:
//!
//! ```text
//!            begin_edit            commit
//!   Idle ───────────────▶ Editing ───────▶ Committed ──settle──▶ Idle
//!     ▲                     │  ▲ begin_edit
//!     │                     │  └──────┘
//!     │              revert │
//!     │                     ▼
//!     └────settle──── Reverted
//! ```
//!
//! Only `Editing` suppresses model-to-control updates. `commit` and
//! `revert` are legal only from `Editing`; `settle` only from `Committed`
//! or `Reverted`. No transition happens on a timer.

use std::fmt;

/// Guard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Idle,
    Editing,
    Committed,
    Reverted,
}

impl fmt::Display for EditState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Editing => "editing",
            Self::Committed => "committed",
            Self::Reverted => "reverted",
        };
        f.write_str(name)
    }
}

/// Events driving the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditEvent {
    BeginEdit,
    Commit,
    Revert,
    Settle,
}

impl fmt::Display for EditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BeginEdit => "begin-edit",
            Self::Commit => "commit",
            Self::Revert => "revert",
            Self::Settle => "settle",
        };
        f.write_str(name)
    }
}

/// A transition not allowed from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardError {
    InvalidTransition { from: EditState, event: EditEvent },
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition { from, event } => {
                write!(f, "cannot {event} while {from}")
            }
        }
    }
}

impl std::error::Error for GuardError {}

/// The guard itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditGuard {
    state: EditState,
}

impl EditGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    /// True while model updates must not reach the control.
    pub fn suppresses_model_updates(&self) -> bool {
        self.state == EditState::Editing
    }

    pub fn is_editing(&self) -> bool {
        self.state == EditState::Editing
    }

    /// Apply `event`, returning the new state.
    pub fn apply(&mut self, event: EditEvent) -> Result<EditState, GuardError> {
        use EditEvent as E;
        use EditState as S;
        let next = match (self.state, event) {
            (S::Idle | S::Editing, E::BeginEdit) => S::Editing,
            (S::Editing, E::Commit) => S::Committed,
            (S::Editing, E::Revert) => S::Reverted,
            (S::Committed | S::Reverted, E::Settle) => S::Idle,
            (from, event) => return Err(GuardError::InvalidTransition { from, event }),
        };
        tracing::trace!(from = %self.state, to = %next, %event, "edit guard transition");
        self.state = next;
        Ok(next)
    }

    /// First edit gesture, or a further one while editing.
    pub fn begin_edit(&mut self) -> Result<EditState, GuardError> {
        self.apply(EditEvent::BeginEdit)
    }

    pub fn commit(&mut self) -> Result<EditState, GuardError> {
        self.apply(EditEvent::Commit)
    }

    pub fn revert(&mut self) -> Result<EditState, GuardError> {
        self.apply(EditEvent::Revert)
    }

    pub fn settle(&mut self) -> Result<EditState, GuardError> {
        self.apply(EditEvent::Settle)
    }
}
