#![forbid(unsafe_code)]

//! Property values.
//!
//! Typed listeners see a property's native Rust type. Untyped listeners,
//! sibling mirroring and the editor registry work with [`PropertyValue`],
//! the opaque form every property value converts to and from.
//!
//! # Invariants
//!
//! 1. `T::from_value(&t.clone().into_value()) == Some(t)` for every
//!    [`PropertyType`] `T` whose equality is reflexive.
//! 2. [`PropertyValue::kind`] always agrees with `T::KIND` for values produced
//!    by `T::into_value`.

use std::fmt;

/// Tag naming the shape of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Bool,
    Integer,
    Float,
    Text,
    Color,
    Choice,
    Array,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Color => "color",
            Self::Choice => "choice",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Opaque color.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// Index into a fixed list of options (enumerated properties).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Choice(pub usize);

/// Type-erased property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Color(Color),
    Choice(usize),
    Array(Vec<PropertyValue>),
}

impl PropertyValue {
    #[must_use]
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Bool(_) => PropertyKind::Bool,
            Self::Int(_) => PropertyKind::Integer,
            Self::Float(_) => PropertyKind::Float,
            Self::Text(_) => PropertyKind::Text,
            Self::Color(_) => PropertyKind::Color,
            Self::Choice(_) => PropertyKind::Choice,
            Self::Array(_) => PropertyKind::Array,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Color(c) => write!(f, "{c}"),
            Self::Choice(i) => write!(f, "#{i}"),
            Self::Array(items) => write!(f, "[{} items]", items.len()),
        }
    }
}

/// A Rust type that can live in an observable property.
///
/// Equality decides whether a write is a change: `set(v)` notifies only when
/// `v != current`. For `f64` this means `NaN` is never equal to itself, so
/// writing `NaN` always notifies.
pub trait PropertyType: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    const KIND: PropertyKind;

    fn into_value(self) -> PropertyValue;

    fn from_value(value: &PropertyValue) -> Option<Self>;
}

impl PropertyType for bool {
    const KIND: PropertyKind = PropertyKind::Bool;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Bool(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl PropertyType for i64 {
    const KIND: PropertyKind = PropertyKind::Integer;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Int(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl PropertyType for f64 {
    const KIND: PropertyKind = PropertyKind::Float;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Float(self)
    }

    // Integers widen to floats; the reverse is a mismatch.
    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl PropertyType for String {
    const KIND: PropertyKind = PropertyKind::Text;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Text(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl PropertyType for Color {
    const KIND: PropertyKind = PropertyKind::Color;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Color(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Color(c) => Some(*c),
            _ => None,
        }
    }
}

impl PropertyType for Choice {
    const KIND: PropertyKind = PropertyKind::Choice;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Choice(self.0)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Choice(i) => Some(Choice(*i)),
            _ => None,
        }
    }
}

impl<E: PropertyType> PropertyType for Vec<E> {
    const KIND: PropertyKind = PropertyKind::Array;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Array(self.into_iter().map(PropertyType::into_value).collect())
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Array(items) => items.iter().map(E::from_value).collect(),
            _ => None,
        }
    }
}
