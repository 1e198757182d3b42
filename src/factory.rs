//! Provider variants
//!
//! - [`ValueProvider`]: wraps a pre-built instance
//! - [`LazyProvider`]: runs its constructor once, then hands out the cached
//!   instance (or the cached failure)
//! - [`FactoryProvider`]: runs its constructor on every resolve
//!
//! Registries store them behind the [`AnyProvider`] enum so resolution can
//! downcast a single concrete type per element type.

use crate::error::BoxError;
use crate::key::Key;
use crate::logging::di_event;
use crate::{Context, DiError, ErasedProvider, Injectable, Provider, ProviderKind, Result};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::sync::Arc;

/// User constructor: builds a `T` from a resolution context.
pub type Constructor<T> =
    Box<dyn Fn(&Context) -> std::result::Result<T, BoxError> + Send + Sync>;

// =============================================================================
// Value Provider
// =============================================================================

/// Provider holding a pre-built instance.
pub struct ValueProvider<T> {
    key: Key,
    instance: Arc<T>,
}

impl<T: Injectable> ValueProvider<T> {
    #[inline]
    pub fn new(key: Key, instance: T) -> Self {
        Self::from_arc(key, Arc::new(instance))
    }

    #[inline]
    pub fn from_arc(key: Key, instance: Arc<T>) -> Self {
        Self { key, instance }
    }
}

impl<T: Injectable> Provider<T> for ValueProvider<T> {
    #[inline]
    fn get(&self, _ctx: &Context) -> Result<Arc<T>> {
        Ok(Arc::clone(&self.instance))
    }
}

// =============================================================================
// Lazy Provider
// =============================================================================

/// Build-once singleton provider.
///
/// The one-shot gate blocks concurrent first callers until the first build
/// finishes; every caller then observes the same instance or the same error.
pub struct LazyProvider<T> {
    key: Key,
    ctor: Constructor<T>,
    cell: OnceCell<Result<Arc<T>>>,
}

impl<T: Injectable> LazyProvider<T> {
    #[inline]
    pub fn new(key: Key, ctor: Constructor<T>) -> Self {
        Self {
            key,
            ctor,
            cell: OnceCell::new(),
        }
    }

    /// Whether the constructor has already run.
    #[inline]
    pub fn is_built(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: Injectable> Provider<T> for LazyProvider<T> {
    fn get(&self, ctx: &Context) -> Result<Arc<T>> {
        if let Some(cached) = self.cell.get() {
            di_event!(
                ctx.sink(),
                TRACE,
                key = %self.key,
                "Lazy provider already built, returning cached result"
            );
            return cached.clone();
        }

        self.cell
            .get_or_init(|| {
                di_event!(ctx.sink(), DEBUG, key = %self.key, "Lazy provider building on first access");
                (self.ctor)(ctx)
                    .map(Arc::new)
                    .map_err(|e| DiError::construction_failed(self.key.as_str(), e))
            })
            .clone()
    }
}

// =============================================================================
// Factory Provider
// =============================================================================

/// Transient provider: a fresh instance on every resolve.
pub struct FactoryProvider<T> {
    key: Key,
    ctor: Constructor<T>,
}

impl<T: Injectable> FactoryProvider<T> {
    #[inline]
    pub fn new(key: Key, ctor: Constructor<T>) -> Self {
        Self { key, ctor }
    }
}

impl<T: Injectable> Provider<T> for FactoryProvider<T> {
    fn get(&self, ctx: &Context) -> Result<Arc<T>> {
        di_event!(ctx.sink(), TRACE, key = %self.key, "Creating new factory instance");

        (self.ctor)(ctx)
            .map(Arc::new)
            .map_err(|e| DiError::construction_failed(self.key.as_str(), e))
    }
}

// =============================================================================
// AnyProvider - the concrete type registries hold
// =============================================================================

/// Tagged union over the three provider variants for one element type.
pub enum AnyProvider<T> {
    Value(ValueProvider<T>),
    Lazy(LazyProvider<T>),
    Factory(FactoryProvider<T>),
}

impl<T: Injectable> AnyProvider<T> {
    #[inline]
    pub fn value(key: Key, instance: Arc<T>) -> Self {
        Self::Value(ValueProvider::from_arc(key, instance))
    }

    #[inline]
    pub fn lazy(key: Key, ctor: Constructor<T>) -> Self {
        Self::Lazy(LazyProvider::new(key, ctor))
    }

    #[inline]
    pub fn factory(key: Key, ctor: Constructor<T>) -> Self {
        Self::Factory(FactoryProvider::new(key, ctor))
    }
}

impl<T: Injectable> Provider<T> for AnyProvider<T> {
    #[inline]
    fn get(&self, ctx: &Context) -> Result<Arc<T>> {
        match self {
            Self::Value(p) => p.get(ctx),
            Self::Lazy(p) => p.get(ctx),
            Self::Factory(p) => p.get(ctx),
        }
    }
}

impl<T: Injectable> ErasedProvider for AnyProvider<T> {
    #[inline]
    fn key(&self) -> &Key {
        match self {
            Self::Value(p) => &p.key,
            Self::Lazy(p) => &p.key,
            Self::Factory(p) => &p.key,
        }
    }

    #[inline]
    fn kind(&self) -> ProviderKind {
        match self {
            Self::Value(_) => ProviderKind::Value,
            Self::Lazy(_) => ProviderKind::Lazy,
            Self::Factory(_) => ProviderKind::Factory,
        }
    }

    fn element_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
