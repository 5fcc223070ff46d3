#![forbid(unsafe_code)]

//! Property values and collection change kinds.
//!
//! Properties hold a [`Value`], a small tagged variant. Typed access goes
//! through [`FromValue`], so rules and getters can work with plain Rust types
//! without probing types at runtime.

use std::fmt;

use bitflags::bitflags;

/// A property value.
///
/// Equality is the default `PartialEq`; a write whose value compares equal
/// to the stored one is a no-op.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// The tag of a [`Value`], used for type checks on writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view. Integers widen to `f64`, which rounds beyond 2^53.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether `self` may replace a value of kind `declared`.
    ///
    /// Null is compatible with every kind, and a property declared with a
    /// null default accepts any kind.
    #[must_use]
    pub(crate) fn fits(&self, declared: ValueKind) -> bool {
        declared == ValueKind::Null || self.is_null() || self.kind() == declared
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Typed extraction from a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int().and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().map(str::to_owned)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

// ---------------------------------------------------------------------------
// Collection change kinds
// ---------------------------------------------------------------------------

/// A single structural change on a collection-valued property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Remove,
    Replace,
    Reset,
    Move,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 5] = [
        ChangeKind::Add,
        ChangeKind::Remove,
        ChangeKind::Replace,
        ChangeKind::Reset,
        ChangeKind::Move,
    ];

    #[must_use]
    pub const fn as_flag(self) -> ChangeKinds {
        match self {
            Self::Add => ChangeKinds::ADD,
            Self::Remove => ChangeKinds::REMOVE,
            Self::Replace => ChangeKinds::REPLACE,
            Self::Reset => ChangeKinds::RESET,
            Self::Move => ChangeKinds::MOVE,
        }
    }
}

bitflags! {
    /// A set of [`ChangeKind`]s a computed property listens for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangeKinds: u8 {
        const ADD = 1 << 0;
        const REMOVE = 1 << 1;
        const REPLACE = 1 << 2;
        const RESET = 1 << 3;
        const MOVE = 1 << 4;
        /// Every change that alters membership; excludes reordering.
        const STRUCTURAL = Self::ADD.bits() | Self::REMOVE.bits() | Self::REPLACE.bits() | Self::RESET.bits();
    }
}

impl ChangeKinds {
    /// Iterate the single kinds contained in this set.
    pub fn kinds(self) -> impl Iterator<Item = ChangeKind> {
        ChangeKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(kind.as_flag()))
    }
}

impl From<ChangeKind> for ChangeKinds {
    fn from(kind: ChangeKind) -> Self {
        kind.as_flag()
    }
}
