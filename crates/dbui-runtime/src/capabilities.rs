#![forbid(unsafe_code)]

//! Capability traits shared by representations.
//!
//! A representation implements only the capabilities its widget needs and
//! calls the provided `watch_*` and `reconcile_*` helpers from its own
//! [`Representation`](crate::Representation) methods.
//!
//! - [`HasGeometry`]: position, size and visibility under
//!   [`DirtyFlags::GEOMETRY`].
//! - [`HasAlarmBorder`]: alarm-colored border under [`DirtyFlags::STYLE`].
//! - [`HasValueBinding`]: a user-editable value whose updates are held back
//!   while the user edits.

use dbui_core::{
    Choice, Color, ModelError, PropertyCategory, PropertyDescriptor, Widget, WidgetBuilder, props,
};

use crate::dirty::DirtyFlags;
use crate::guard::EditGuard;
use crate::representation::{ListenerRegistrar, ReconcileContext, RepresentationError};
use crate::toolkit::Toolkit;

/// Property names used by the alarm border.
pub mod alarm_props {
    pub const ALARM_SEVERITY: &str = "alarm_severity";
    pub const BORDER_ALARM_SENSITIVE: &str = "border_alarm_sensitive";
}

const GEOMETRY_PROPS: [&str; 5] = [props::X, props::Y, props::WIDTH, props::HEIGHT, props::VISIBLE];

/// Position, size and visibility of a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub visible: bool,
}

impl Geometry {
    /// Read the current geometry from the mandatory widget properties.
    pub fn read(widget: &Widget) -> Self {
        let int = |name: &str| {
            widget
                .property::<i64>(name)
                .map(|p| p.get())
                .unwrap_or_default()
        };
        Self {
            x: int(props::X),
            y: int(props::Y),
            width: int(props::WIDTH),
            height: int(props::HEIGHT),
            visible: widget
                .property::<bool>(props::VISIBLE)
                .is_none_or(|p| p.get()),
        }
    }
}

/// Applies [`Geometry`] to a node.
pub trait HasGeometry<T: Toolkit> {
    fn apply_geometry(
        &mut self,
        toolkit: &T,
        node: &T::Node,
        geometry: &Geometry,
    ) -> Result<(), RepresentationError>;

    fn watch_geometry(&self, registrar: &mut ListenerRegistrar) -> Result<(), ModelError> {
        for name in GEOMETRY_PROPS {
            registrar.watch(name, DirtyFlags::GEOMETRY)?;
        }
        Ok(())
    }

    fn reconcile_geometry(
        &mut self,
        cx: &ReconcileContext<'_, T>,
    ) -> Result<(), RepresentationError> {
        let geometry = Geometry::read(cx.widget);
        self.apply_geometry(cx.toolkit, cx.node, &geometry)
    }
}

/// Alarm severity of the value a widget shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum AlarmSeverity {
    #[default]
    Ok,
    Minor,
    Major,
    Invalid,
    Disconnected,
}

impl AlarmSeverity {
    pub fn from_choice(choice: Choice) -> Self {
        match choice.0 {
            1 => Self::Minor,
            2 => Self::Major,
            3 => Self::Invalid,
            4 => Self::Disconnected,
            _ => Self::Ok,
        }
    }

    pub fn to_choice(self) -> Choice {
        Choice(self as usize)
    }

    /// Border color, `None` for no border.
    pub fn border_color(self) -> Option<Color> {
        match self {
            Self::Ok => None,
            Self::Minor => Some(Color::rgb(255, 128, 0)),
            Self::Major => Some(Color::rgb(255, 0, 0)),
            Self::Invalid => Some(Color::rgb(255, 0, 255)),
            Self::Disconnected => Some(Color::rgb(200, 0, 200)),
        }
    }

    /// Severity the border should show for `widget`.
    ///
    /// Widgets without the alarm properties, or with the border disabled,
    /// show [`AlarmSeverity::Ok`].
    pub fn for_widget(widget: &Widget) -> Self {
        let sensitive = widget
            .property::<bool>(alarm_props::BORDER_ALARM_SENSITIVE)
            .is_none_or(|p| p.get());
        if !sensitive {
            return Self::Ok;
        }
        widget
            .property::<Choice>(alarm_props::ALARM_SEVERITY)
            .map_or(Self::Ok, |p| Self::from_choice(p.get()))
    }
}

/// Add the alarm properties to a widget definition.
#[must_use]
pub fn with_alarm_properties(builder: WidgetBuilder) -> WidgetBuilder {
    builder
        .property(
            PropertyDescriptor::new(
                alarm_props::BORDER_ALARM_SENSITIVE,
                PropertyCategory::Behavior,
                true,
            )
                .with_description("Alarm border"),
        )
        .property(
            PropertyDescriptor::new(
                alarm_props::ALARM_SEVERITY,
                PropertyCategory::Runtime,
                AlarmSeverity::Ok.to_choice(),
            )
            .with_description("Alarm severity")
            .read_only(),
        )
}

/// Draws an alarm-colored border.
pub trait HasAlarmBorder<T: Toolkit> {
    fn apply_alarm_border(
        &mut self,
        toolkit: &T,
        node: &T::Node,
        severity: AlarmSeverity,
    ) -> Result<(), RepresentationError>;

    /// Watch whichever alarm properties the widget has.
    fn watch_alarm(&self, registrar: &mut ListenerRegistrar) {
        registrar.watch_optional(alarm_props::ALARM_SEVERITY, DirtyFlags::STYLE);
        registrar.watch_optional(alarm_props::BORDER_ALARM_SENSITIVE, DirtyFlags::STYLE);
    }

    fn reconcile_alarm_border(
        &mut self,
        cx: &ReconcileContext<'_, T>,
    ) -> Result<(), RepresentationError> {
        let severity = AlarmSeverity::for_widget(cx.widget);
        self.apply_alarm_border(cx.toolkit, cx.node, severity)
    }
}

/// A control showing a value the user can also edit at runtime.
///
/// While the guard is editing, [`DirtyFlags::VALUE`] stays pending so the
/// user's input is not overwritten. When the edit ends the representation
/// requests a new `VALUE` pass.
pub trait HasValueBinding {
    /// Snapshot of the entry's guard.
    fn value_guard(&self) -> EditGuard;

    fn defers_value(&self, flag: DirtyFlags) -> bool {
        flag == DirtyFlags::VALUE && self.value_guard().is_editing()
    }
}
