//! Registration builder
//!
//! `provide_value`, `provide` and `provide_factory` start a [`ProviderBuilder`];
//! `with_name`, `when` and `when_func` refine it; `attach` registers it.

use crate::error::BoxError;
use crate::factory::Constructor;
use crate::key::Key;
use crate::logging::di_event;
use crate::{AnyProvider, Container, Context, Injectable, ProviderKind};
use std::sync::Arc;

enum Source<T> {
    Value(Arc<T>),
    Lazy(Constructor<T>),
    Factory(Constructor<T>),
}

impl<T> Source<T> {
    fn kind(&self) -> ProviderKind {
        match self {
            Self::Value(_) => ProviderKind::Value,
            Self::Lazy(_) => ProviderKind::Lazy,
            Self::Factory(_) => ProviderKind::Factory,
        }
    }
}

/// Pending registration of a provider for `T`.
///
/// Nothing touches a scope until [`attach`](Self::attach) is called.
///
/// # Examples
///
/// ```rust
/// use lifecycle_injector::{App, provide, provide_value};
///
/// struct Cache { size: usize }
///
/// let app = App::new();
///
/// provide_value(Cache { size: 64 }).attach(&app);
/// provide(|_| Ok(Cache { size: 1024 }))
///     .with_name("large")
///     .when_func(|| std::env::var("NO_LARGE_CACHE").is_err())
///     .attach(&app);
///
/// assert_eq!(app.inject::<Cache>().unwrap().size, 64);
/// ```
#[must_use = "a provider builder does nothing until attached"]
pub struct ProviderBuilder<T> {
    source: Source<T>,
    name: Option<String>,
    condition: bool,
    condition_fn: Option<Box<dyn FnOnce() -> bool>>,
}

impl<T: Injectable> ProviderBuilder<T> {
    fn new(source: Source<T>) -> Self {
        Self {
            source,
            name: None,
            condition: true,
            condition_fn: None,
        }
    }

    /// Key the provider by `name` instead of by its type.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Only register when `condition` holds. The last call wins.
    pub fn when(mut self, condition: bool) -> Self {
        self.condition = condition;
        self
    }

    /// Only register when `condition` returns true at attach time.
    pub fn when_func<F>(mut self, condition: F) -> Self
    where
        F: FnOnce() -> bool + 'static,
    {
        self.condition_fn = Some(Box::new(condition));
        self
    }

    /// Register the provider in `scope`.
    ///
    /// Returns `false` when a condition skipped the registration.
    pub fn attach(self, scope: &Container) -> bool {
        let Self {
            source,
            name,
            condition,
            condition_fn,
        } = self;

        let enabled = condition && condition_fn.is_none_or(|f| f());
        let key = Key::derive::<T>(name.as_deref());
        if !enabled {
            di_event!(
                scope.sink(),
                DEBUG,
                scope = scope.name(),
                %key,
                kind = %source.kind(),
                "Registration condition is false, skipping provider"
            );
            return false;
        }

        let provider = match source {
            Source::Value(instance) => AnyProvider::value(key, instance),
            Source::Lazy(ctor) => AnyProvider::lazy(key, ctor),
            Source::Factory(ctor) => AnyProvider::factory(key, ctor),
        };
        scope.add_provider(Arc::new(provider));
        true
    }
}

impl<T> std::fmt::Debug for ProviderBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBuilder")
            .field("type", &std::any::type_name::<T>())
            .field("kind", &self.source.kind())
            .field("name", &self.name)
            .field("condition", &self.condition)
            .field("condition_fn", &self.condition_fn.is_some())
            .finish()
    }
}

/// Register a pre-built instance.
#[inline]
pub fn provide_value<T: Injectable>(instance: T) -> ProviderBuilder<T> {
    provide_shared(Arc::new(instance))
}

/// Register an instance that is already shared.
#[inline]
pub fn provide_shared<T: Injectable>(instance: Arc<T>) -> ProviderBuilder<T> {
    ProviderBuilder::new(Source::Value(instance))
}

/// Register a build-once singleton constructor.
#[inline]
pub fn provide<T, F>(ctor: F) -> ProviderBuilder<T>
where
    T: Injectable,
    F: Fn(&Context) -> Result<T, BoxError> + Send + Sync + 'static,
{
    ProviderBuilder::new(Source::Lazy(Box::new(ctor)))
}

/// Register a transient constructor that runs on every resolve.
#[inline]
pub fn provide_factory<T, F>(ctor: F) -> ProviderBuilder<T>
where
    T: Injectable,
    F: Fn(&Context) -> Result<T, BoxError> + Send + Sync + 'static,
{
    ProviderBuilder::new(Source::Factory(Box::new(ctor)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::App;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Service {
        id: u32,
    }

    #[test]
    fn test_value_registers_under_type_key() {
        let app = App::new();
        assert!(provide_value(Service { id: 1 }).attach(&app));

        assert!(app.contains::<Service>());
        let provider = app.get_provider(&Key::of::<Service>()).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Value);
        assert!(!provider.is_named());
    }

    #[test]
    fn test_with_name_registers_under_name_key() {
        let app = App::new();
        provide(|_| Ok(Service { id: 2 })).with_name("svc").attach(&app);

        assert!(!app.contains::<Service>());
        assert!(app.contains_named("svc"));
        let provider = app.get_provider(&Key::named("svc")).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Lazy);
        assert_eq!(app.inject_named::<Service>("svc").unwrap().id, 2);
    }

    #[test]
    fn test_empty_name_falls_back_to_type_key() {
        let app = App::new();
        provide_factory(|_| Ok(Service { id: 3 })).with_name("").attach(&app);

        assert!(app.contains::<Service>());
        assert_eq!(
            app.get_provider(&Key::of::<Service>()).unwrap().kind(),
            ProviderKind::Factory
        );
    }

    #[test]
    fn test_when_false_skips_registration() {
        let app = App::new();
        let attached = provide_value(Service { id: 4 }).when(false).attach(&app);

        assert!(!attached);
        assert!(app.is_empty());
    }

    #[test]
    fn test_when_last_call_wins() {
        let app = App::new();
        assert!(provide_value(Service { id: 5 }).when(false).when(true).attach(&app));
        assert!(app.contains::<Service>());
    }

    #[test]
    fn test_when_func_evaluated_at_attach() {
        let app = App::new();
        let calls = Rc::new(Cell::new(0));

        let seen = Rc::clone(&calls);
        let builder = provide_value(Service { id: 6 }).when_func(move || {
            seen.set(seen.get() + 1);
            false
        });
        assert_eq!(calls.get(), 0);

        assert!(!builder.attach(&app));
        assert_eq!(calls.get(), 1);
        assert!(!app.contains::<Service>());
    }

    #[test]
    fn test_either_condition_false_skips() {
        let app = App::new();
        assert!(!provide_value(Service { id: 7 }).when(true).when_func(|| false).attach(&app));
        assert!(!provide_value(Service { id: 7 }).when(false).when_func(|| true).attach(&app));
        assert!(provide_value(Service { id: 7 }).when(true).when_func(|| true).attach(&app));
        assert_eq!(app.len(), 1);
    }

    #[test]
    fn test_constructor_not_run_at_attach() {
        let app = App::new();
        provide::<Service, _>(|_| panic!("constructor must stay lazy")).attach(&app);
        assert!(app.contains::<Service>());
    }

    #[test]
    fn test_provide_shared_keeps_identity() {
        let app = App::new();
        let shared = Arc::new(Service { id: 8 });
        provide_shared(Arc::clone(&shared)).attach(&app);

        assert!(Arc::ptr_eq(&shared, &app.inject::<Service>().unwrap()));
    }

    #[test]
    fn test_builder_debug() {
        let builder = provide_value(Service { id: 9 }).with_name("dbg");
        let text = format!("{builder:?}");
        assert!(text.contains("Value"));
        assert!(text.contains("dbg"));
    }
}
