#![forbid(unsafe_code)]

//! Headless test harness for the display builder runtime.
//!
//! Runs the real runtime and editor against an in-memory toolkit so
//! end-to-end behavior can be asserted without a display:
//!
//! - [`HeadlessToolkit`] - node tree plus a UI task queue pumped by the test
//! - [`register_fixtures`] - representations for the [`fixture_catalog`]
//!   widget types
//! - [`HeadlessTextField`] / [`HeadlessSpinner`] - property-panel controls
//!
//! Tree state is compared as text via [`HeadlessToolkit::snapshot`].

pub mod catalog;
pub mod controls;
pub mod reps;
pub mod toolkit;

pub use catalog::{MIN_TRACES, fixture_catalog, names, widget};
pub use controls::{HeadlessSpinner, HeadlessTextField};
pub use reps::{TITLE_ATTR, TRACES_ATTR, register_fixtures};
pub use toolkit::{
    FrameReport, HeadlessToolkit, Input, InputHandler, NodeId, TEXT_ATTR, ToolkitStats,
};
