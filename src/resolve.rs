//! Resolution protocol
//!
//! Glues key derivation, parent-delegated lookup, provider invocation and hook
//! propagation together:
//!
//! 1. derive the key for the requested type or name
//! 2. find the provider in the context's scope or an ancestor
//! 3. downcast it to the requested element type
//! 4. run it against an independent context drawn from the pool
//! 5. move any hook the constructor declared onto the resolving scope
//!    (queued, or run immediately when that scope is already `READY`)

use crate::context::{Context, Hook};
use crate::error::BoxError;
use crate::key::Key;
use crate::lifecycle::HookPhase;
use crate::logging::di_event;
use crate::{AnyProvider, Container, DiError, Injectable, Provider, Result, provide_shared};
use std::sync::Arc;

/// Resolve a type-keyed dependency.
///
/// # Examples
///
/// ```rust
/// use lifecycle_injector::{App, inject, invoke_func, provide_value};
///
/// struct Config { url: String }
///
/// let app = App::new();
/// provide_value(Config { url: "http://example.com".into() }).attach(&app);
///
/// invoke_func(&app, |ctx| {
///     let config = inject::<Config>(ctx)?;
///     assert_eq!(config.url, "http://example.com");
///     Ok(())
/// })
/// .unwrap();
/// ```
#[inline]
pub fn inject<T: Injectable>(ctx: &Context) -> Result<Arc<T>> {
    resolve::<T>(ctx, Key::of::<T>())
}

/// Resolve a name-keyed dependency.
#[inline]
pub fn inject_named<T: Injectable>(ctx: &Context, name: &str) -> Result<Arc<T>> {
    resolve::<T>(ctx, Key::named(name))
}

/// Resolve a type-keyed dependency whose absence is a programming error.
///
/// # Panics
///
/// Panics if the dependency cannot be resolved for any reason.
pub fn must_inject<T: Injectable>(ctx: &Context) -> Arc<T> {
    match inject::<T>(ctx) {
        Ok(instance) => instance,
        Err(err) => panic!("must_inject::<{}>() failed: {err}", std::any::type_name::<T>()),
    }
}

/// Resolve a name-keyed dependency whose absence is a programming error.
///
/// # Panics
///
/// Panics if the dependency cannot be resolved for any reason.
pub fn must_inject_named<T: Injectable>(ctx: &Context, name: &str) -> Arc<T> {
    match inject_named::<T>(ctx, name) {
        Ok(instance) => instance,
        Err(err) => panic!(
            "must_inject_named::<{}>(\"{name}\") failed: {err}",
            std::any::type_name::<T>()
        ),
    }
}

fn resolve<T: Injectable>(ctx: &Context, key: Key) -> Result<Arc<T>> {
    let scope = ctx.container()?;
    let erased = scope.lookup(&key)?;

    let Some(provider) = erased.as_any().downcast_ref::<AnyProvider<T>>() else {
        di_event!(
            scope.sink(),
            DEBUG,
            scope = scope.name(),
            %key,
            expected = std::any::type_name::<T>(),
            found = erased.element_type(),
            "Provider type does not match requested type"
        );
        return Err(DiError::type_mismatch::<T>(key.as_str()));
    };

    let resolution = scope.context();
    let result = provider.get(&resolution);
    let hooks = settle_hooks(scope, &resolution, result.is_ok());
    drop(resolution);

    let instance = result?;
    hooks?;
    Ok(instance)
}

/// Run a constructor once against `scope` without registering its result.
///
/// Hooks the constructor declares are attached to `scope`.
pub fn invoke<T, F>(scope: &Container, ctor: F) -> Result<T>
where
    F: FnOnce(&Context) -> std::result::Result<T, BoxError>,
{
    let ctx = scope.context();
    let result = ctor(&ctx)
        .map_err(|e| DiError::construction_failed(std::any::type_name::<T>(), e));
    let hooks = settle_hooks(scope, &ctx, result.is_ok());
    drop(ctx);

    let value = result?;
    hooks?;
    Ok(value)
}

/// [`invoke`], then register the result in `scope` as a type-keyed value
/// provider.
///
/// Nothing is registered when the constructor fails.
pub fn invoke_provide<T, F>(scope: &Container, ctor: F) -> Result<Arc<T>>
where
    T: Injectable,
    F: FnOnce(&Context) -> std::result::Result<T, BoxError>,
{
    let instance = Arc::new(invoke(scope, ctor)?);
    provide_shared(Arc::clone(&instance)).attach(scope);
    Ok(instance)
}

/// Run a function with a resolution context bound to `scope`.
pub fn invoke_func<F>(scope: &Container, f: F) -> Result<()>
where
    F: FnOnce(&Context) -> std::result::Result<(), BoxError>,
{
    let ctx = scope.context();
    let result = f(&ctx).map_err(|e| DiError::construction_failed("invoke_func", e));
    let hooks = settle_hooks(scope, &ctx, result.is_ok());
    drop(ctx);

    result?;
    hooks
}

/// Move the hooks pending on `ctx` onto `scope`.
///
/// A failed construction drops its hooks.
fn settle_hooks(scope: &Container, ctx: &Context, succeeded: bool) -> Result<()> {
    let (start, stop) = ctx.take_hooks();
    if !succeeded {
        if start.is_some() || stop.is_some() {
            di_event!(
                scope.sink(),
                DEBUG,
                scope = scope.name(),
                "Construction failed, discarding its lifecycle hooks"
            );
        }
        return Ok(());
    }

    if let Some(stop) = stop {
        try_add_or_run_hook(scope, HookPhase::Stop, stop)?;
    }
    if let Some(start) = start {
        try_add_or_run_hook(scope, HookPhase::Start, start)?;
    }
    Ok(())
}

/// Queue `hook` on `scope`, or run it right away when the start sweep has
/// already passed.
pub(crate) fn try_add_or_run_hook(scope: &Container, phase: HookPhase, hook: Hook) -> Result<()> {
    match scope.queue_hook(phase, hook) {
        None => Ok(()),
        Some(hook) => {
            di_event!(
                scope.sink(),
                DEBUG,
                scope = scope.name(),
                %phase,
                "Scope already started, running hook immediately"
            );
            scope.run_hook(phase, &hook)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{App, LifeState, provide, provide_factory, provide_value};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Config {
        url: String,
    }

    #[derive(Debug)]
    struct Repo {
        config: Arc<Config>,
    }

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    fn app_with_config() -> App {
        let app = App::new();
        provide_value(Config {
            url: "http://example.com".into(),
        })
        .attach(&app);
        app
    }

    #[test]
    fn test_inject_resolves_nested_dependencies() {
        let app = app_with_config();
        provide(|ctx| {
            Ok(Repo {
                config: ctx.inject::<Config>()?,
            })
        })
        .attach(&app);

        let repo = app.inject::<Repo>().unwrap();
        assert_eq!(repo.config.url, "http://example.com");
    }

    #[test]
    fn test_inject_missing_dependency_is_not_found() {
        let app = App::new();
        let err = app.inject::<Config>().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_wrong_type_under_name_is_type_mismatch() {
        let app = app_with_config();
        provide_value(42_u32).with_name("port").attach(&app);

        let err = app.inject_named::<String>("port").unwrap_err();
        assert!(err.is_type_mismatch());
        assert_eq!(*app.inject_named::<u32>("port").unwrap(), 42);
    }

    #[test]
    fn test_trait_object_provider_by_name() {
        let app = App::new();
        provide(|_| Ok(Box::new(English) as Box<dyn Greeter>))
            .with_name("greeter")
            .attach(&app);

        // Not registered under its type
        assert!(matches!(app.inject::<Box<dyn Greeter>>(), Err(e) if e.is_not_found()));

        let a = app.inject_named::<Box<dyn Greeter>>("greeter").unwrap();
        let b = app.inject_named::<Box<dyn Greeter>>("greeter").unwrap();
        assert_eq!(a.greet(), "hello");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_construction_failure_is_wrapped_with_key() {
        let app = App::new();
        provide_factory::<Config, _>(|_| Err("no url configured".into())).attach(&app);

        let err = app.inject::<Config>().unwrap_err();
        match err {
            DiError::ConstructionFailed { key, source } => {
                assert!(key.ends_with("Config"));
                assert_eq!(source.to_string(), "no url configured");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[should_panic(expected = "must_inject")]
    fn test_must_inject_panics_when_missing() {
        let app = App::new();
        let ctx = app.context();
        let _ = must_inject::<Config>(&ctx);
    }

    #[test]
    #[should_panic(expected = "must_inject_named")]
    fn test_must_inject_named_panics_when_missing() {
        let app = App::new();
        let ctx = app.context();
        let _ = must_inject_named::<Config>(&ctx, "missing");
    }

    #[test]
    fn test_must_inject_returns_instance() {
        let app = app_with_config();
        let ctx = app.context();
        assert_eq!(must_inject::<Config>(&ctx).url, "http://example.com");
    }

    #[test]
    fn test_hooks_queue_before_startup() {
        let app = app_with_config();
        provide(|ctx| {
            ctx.on_start(|_| Ok(()));
            ctx.on_stop(|_| Ok(()));
            Ok(Repo {
                config: ctx.inject::<Config>()?,
            })
        })
        .attach(&app);

        app.inject::<Repo>().unwrap();
        assert_eq!(app.start_hook_count(), 1);
        assert_eq!(app.stop_hook_count(), 1);

        // Lazy provider does not run its constructor again
        app.inject::<Repo>().unwrap();
        assert_eq!(app.start_hook_count(), 1);
    }

    #[test]
    fn test_start_hook_runs_immediately_after_startup() {
        let app = app_with_config();
        let started = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&started);
        provide(move |ctx| {
            let seen = Arc::clone(&seen);
            ctx.on_start(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(Repo {
                config: ctx.inject::<Config>()?,
            })
        })
        .attach(&app);

        app.startup().unwrap();
        assert_eq!(app.cur_state(), LifeState::Ready);

        app.inject::<Repo>().unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(app.start_hook_count(), 0);
    }

    #[test]
    fn test_immediate_start_hook_failure_surfaces() {
        let app = App::new();
        app.startup().unwrap();

        let err = invoke_func(&app, |ctx| {
            ctx.on_start(|_| Err("port in use".into()));
            Ok(())
        })
        .unwrap_err();

        assert!(err.is_hook_failed());
    }

    #[test]
    fn test_failed_construction_discards_hooks() {
        let app = App::new();
        let result: Result<Config> = invoke(&app, |ctx| {
            ctx.on_stop(|_| Ok(()));
            Err("boom".into())
        });

        assert!(result.unwrap_err().is_construction_failed());
        assert_eq!(app.stop_hook_count(), 0);
    }

    #[test]
    fn test_invoke_does_not_register() {
        let app = App::new();
        let config = invoke(&app, |_| {
            Ok(Config {
                url: "http://invoke".into(),
            })
        })
        .unwrap();

        assert_eq!(config.url, "http://invoke");
        assert!(!app.contains::<Config>());
    }

    #[test]
    fn test_invoke_provide_registers_value() {
        let app = App::new();
        let config = invoke_provide(&app, |_| {
            Ok(Config {
                url: "http://provided".into(),
            })
        })
        .unwrap();

        let resolved = app.inject::<Config>().unwrap();
        assert!(Arc::ptr_eq(&config, &resolved));
    }

    #[test]
    fn test_invoke_provide_failure_registers_nothing() {
        let app = App::new();
        let result = invoke_provide::<Config, _>(&app, |_| Err("failed".into()));

        assert!(result.is_err());
        assert!(!app.contains::<Config>());
    }

    #[test]
    fn test_hooks_attach_to_resolving_scope() {
        let app = app_with_config();
        provide_factory(|ctx| {
            ctx.on_stop(|_| Ok(()));
            Ok(Repo {
                config: ctx.inject::<Config>()?,
            })
        })
        .attach(&app);

        let jobs = app.get_scope("jobs");
        jobs.inject::<Repo>().unwrap();

        assert_eq!(jobs.stop_hook_count(), 1);
        assert_eq!(app.stop_hook_count(), 0);
    }

    #[test]
    fn test_nested_hooks_do_not_leak_between_resolutions() {
        let app = App::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let inner_order = Arc::clone(&order);
        provide(move |ctx| {
            let inner_order = Arc::clone(&inner_order);
            ctx.on_stop(move |_| {
                inner_order.lock().push("config");
                Ok(())
            });
            Ok(Config { url: "x".into() })
        })
        .attach(&app);

        let outer_order = Arc::clone(&order);
        provide(move |ctx| {
            let config = ctx.inject::<Config>()?;
            let outer_order = Arc::clone(&outer_order);
            ctx.on_stop(move |_| {
                outer_order.lock().push("repo");
                Ok(())
            });
            Ok(Repo { config })
        })
        .attach(&app);

        app.inject::<Repo>().unwrap();
        assert_eq!(app.stop_hook_count(), 2);

        app.startup().unwrap();
        app.teardown().unwrap();

        // Dependency registered its hook first, so it stops last
        assert_eq!(*order.lock(), vec!["repo", "config"]);
    }

    #[test]
    fn test_concurrent_inject_builds_lazy_once() {
        let app = App::new();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        provide(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(10));
            Ok(Config { url: "shared".into() })
        })
        .attach(&app);

        let results: Vec<Arc<Config>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16).map(|_| s.spawn(|| app.inject::<Config>().unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|c| Arc::ptr_eq(c, &results[0])));
    }
}
