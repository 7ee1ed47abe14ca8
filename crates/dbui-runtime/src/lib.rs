#![forbid(unsafe_code)]

//! Display Builder Runtime
//!
//! Keeps native UI nodes in step with the widget model.
//!
//! # Key Components
//!
//! - [`DirtySet`] - Per-representation dirty flags, schedule claim and
//!   disposal in one atomic word
//! - [`UpdateScheduler`] - Coalesces pass requests from any thread into UI
//!   thread callbacks
//! - [`Representation`] - Per-widget adapter trait; [`RepresentationCell`]
//!   drives its lifecycle
//! - [`RepresentationHost`] - Represents widget trees and follows child list
//!   changes
//! - [`EditGuard`] - Idle/Editing/Committed/Reverted state machine for
//!   editable controls
//! - [`Session`] - Per-display context owning all of the above
//!
//! # How it fits in the system
//!
//! `dbui-core` holds the model. This crate sits between it and a concrete
//! toolkit, reached only through the [`Toolkit`] trait. `dbui-editor` builds
//! bindings and undo on top of both.

pub mod capabilities;
pub mod config;
pub mod debug_trace;
pub mod dirty;
pub mod guard;
pub mod host;
pub mod load;
pub mod representation;
pub mod scheduler;
pub mod session;
pub mod toolkit;

pub use capabilities::{
    AlarmSeverity, Geometry, HasAlarmBorder, HasGeometry, HasValueBinding, alarm_props,
    with_alarm_properties,
};
pub use config::{ConfigError, RuntimeConfig};
pub use dirty::{DirtyFlags, DirtySet};
pub use guard::{EditEvent, EditGuard, EditState, GuardError};
pub use host::{
    HostError, RepresentFailure, RepresentReport, RepresentationFactory, RepresentationHost,
};
pub use load::BackgroundLoad;
pub use representation::{
    Lifecycle, ListenerRegistrar, ReconcileContext, Representation, RepresentationCell,
    RepresentationError, UpdateRequester,
};
pub use scheduler::{PassOutcome, PendingPass, SchedulerStats, UpdateScheduler};
pub use session::{Session, SessionCache};
pub use toolkit::{Toolkit, ToolkitError, UiExecutor, UiTask};
