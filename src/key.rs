//! Registry keys
//!
//! A provider is stored either under the name of its element type or under an
//! explicit name chosen at registration. The two key spaces never collide.

use std::fmt;

/// Registry key: the key string plus whether it is an explicit name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    name: String,
    named: bool,
}

impl Key {
    /// Type-derived key for `T`.
    ///
    /// Built from [`std::any::type_name`], which is stable within a build but not a
    /// public contract; use named keys where a durable identifier matters.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>().to_owned(),
            named: false,
        }
    }

    /// Explicitly named key.
    #[inline]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            named: true,
        }
    }

    /// Named key when `name` is given and non-empty, type key for `T` otherwise.
    pub fn derive<T: ?Sized + 'static>(name: Option<&str>) -> Self {
        match name {
            Some(name) if !name.is_empty() => Self::named(name),
            _ => Self::of::<T>(),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_named(&self) -> bool {
        self.named
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.named {
            write!(f, "\"{}\"", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}
