use std::fmt::{self, Display};

use serde::Serialize;

/// A value the bridge may or may not have reported yet.
///
/// `Unknown` is distinct from any reported value, so "never fetched" and
/// "reported off" do not collapse into the same state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Field<T> {
    Unknown,
    Known(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unknown
    }
}

impl<T> Field<T> {
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Self::Known(value) => value,
            Self::Unknown => default,
        }
    }
}

impl<T: Copy> Field<T> {
    #[must_use]
    pub const fn value(&self) -> Option<T> {
        match self {
            Self::Known(value) => Some(*value),
            Self::Unknown => None,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

impl<T: Display> Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(value) => value.fmt(f),
            Self::Unknown => f.write_str("?"),
        }
    }
}
