//! Provider traits for dependency injection
//!
//! A provider knows how to produce (or already holds) an instance of one type.
//! Registries store providers type-erased as [`ErasedProvider`]; resolution
//! downcasts back to the typed [`Provider`] capability.

use crate::key::Key;
use crate::{Context, Result};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Marker trait for types that can be injected via the DI container.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
///
/// # Examples
///
/// ```rust
/// // Any type that is Send + Sync + 'static works automatically
/// #[derive(Clone)]
/// struct MyService {
///     name: String,
/// }
///
/// // No impl needed - it just works!
/// ```
pub trait Injectable: Send + Sync + 'static {
    /// Returns the type name for debugging
    #[inline]
    fn type_name_of() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// How a provider produces its instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Pre-built instance, returned as-is
    Value,

    /// Built once on first access, then shared
    Lazy,

    /// Built fresh on every resolve
    Factory,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Lazy => "lazy",
            Self::Factory => "factory",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed capability: produce an instance of `T` for a resolution context.
pub trait Provider<T: Injectable>: Send + Sync {
    /// Return the instance, constructing it if this provider's kind requires it.
    fn get(&self, ctx: &Context) -> Result<Arc<T>>;
}

/// Type-erased view of a registered provider.
///
/// This is what scope registries hold. [`as_any`](Self::as_any) recovers the
/// concrete provider; a failed downcast surfaces as
/// [`DiError::TypeMismatch`](crate::DiError::TypeMismatch).
pub trait ErasedProvider: Send + Sync + 'static {
    /// Registry key this provider was attached under
    fn key(&self) -> &Key;

    /// Whether the key is an explicit name rather than a type name
    #[inline]
    fn is_named(&self) -> bool {
        self.key().is_named()
    }

    fn kind(&self) -> ProviderKind;

    /// Name of the element type the provider produces
    fn element_type(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn ErasedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("key", self.key())
            .field("kind", &self.kind())
            .field("element_type", &self.element_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(ProviderKind::Value.to_string(), "value");
        assert_eq!(ProviderKind::Lazy.to_string(), "lazy");
        assert_eq!(ProviderKind::Factory.to_string(), "factory");
    }

    #[test]
    fn test_injectable_type_name() {
        struct Probe;
        assert!(Probe::type_name_of().ends_with("Probe"));
    }
}
