//! Resolution contexts
//!
//! A [`Context`] is the handle every constructor receives. It is bound to the
//! scope the resolution runs against, resolves further dependencies, and holds
//! at most one pending start hook and one pending stop hook declared by the
//! constructor currently executing.
//!
//! Contexts are pooled: [`ContextPool::acquire`] hands out a [`PooledContext`]
//! that clears the context and returns it to the pool when dropped.

use crate::error::BoxError;
use crate::lifecycle::HookPhase;
use crate::logging::{DETACHED, LogSink, di_event};
use crate::{Container, DiError, Injectable, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Lifecycle hook as stored on a scope.
pub(crate) type Hook = Arc<dyn Fn(&HookContext<'_>) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Per-resolution handle passed to constructors.
///
/// # Examples
///
/// ```rust
/// use lifecycle_injector::{App, Context, BoxError, provide, provide_value};
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Client { config: Arc<Config> }
///
/// fn new_client(ctx: &Context) -> Result<Client, BoxError> {
///     let config = ctx.inject::<Config>()?;
///     ctx.on_stop(|_| {
///         // close connections
///         Ok(())
///     });
///     Ok(Client { config })
/// }
///
/// let app = App::new();
/// provide_value(Config { url: "http://example.com".into() }).attach(&app);
/// provide(new_client).attach(&app);
///
/// let client = app.inject::<Client>().unwrap();
/// assert_eq!(client.config.url, "http://example.com");
/// ```
pub struct Context {
    container: Option<Container>,
    start_hook: Mutex<Option<Hook>>,
    stop_hook: Mutex<Option<Hook>>,
}

impl Context {
    fn empty() -> Self {
        Self {
            container: None,
            start_hook: Mutex::new(None),
            stop_hook: Mutex::new(None),
        }
    }

    /// Scope this context resolves against.
    pub fn container(&self) -> Result<&Container> {
        self.container
            .as_ref()
            .ok_or_else(|| DiError::Internal("context is not bound to a scope".into()))
    }

    pub(crate) fn sink(&self) -> &LogSink {
        self.container.as_ref().map_or(&DETACHED, Container::sink)
    }

    /// Declare a hook to run when the app starts.
    ///
    /// If the owning scope is already `READY` the hook runs as soon as the
    /// current resolution completes.
    pub fn on_start<F>(&self, hook: F)
    where
        F: Fn(&HookContext<'_>) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.declare(HookPhase::Start, Arc::new(hook));
    }

    /// Declare a hook to run when the app tears down.
    pub fn on_stop<F>(&self, hook: F)
    where
        F: Fn(&HookContext<'_>) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.declare(HookPhase::Stop, Arc::new(hook));
    }

    fn declare(&self, phase: HookPhase, hook: Hook) {
        let slot = match phase {
            HookPhase::Start => &self.start_hook,
            HookPhase::Stop => &self.stop_hook,
        };
        if slot.lock().replace(hook).is_some() {
            di_event!(
                self.sink(),
                WARN,
                %phase,
                "Constructor declared more than one {} hook, keeping the last one",
                phase
            );
        }
    }

    /// Take the pending hooks, leaving both slots empty.
    pub(crate) fn take_hooks(&self) -> (Option<Hook>, Option<Hook>) {
        (self.start_hook.lock().take(), self.stop_hook.lock().take())
    }

    /// Resolve a type-keyed dependency.
    #[inline]
    pub fn inject<T: Injectable>(&self) -> Result<Arc<T>> {
        crate::inject::<T>(self)
    }

    /// Resolve a name-keyed dependency.
    #[inline]
    pub fn inject_named<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        crate::inject_named::<T>(self, name)
    }

    fn bind(&mut self, container: Container) {
        self.container = Some(container);
    }

    fn reset(&mut self) {
        self.container = None;
        *self.start_hook.get_mut() = None;
        *self.stop_hook.get_mut() = None;
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("scope", &self.container.as_ref().map(Container::name))
            .field("pending_start", &self.start_hook.lock().is_some())
            .field("pending_stop", &self.stop_hook.lock().is_some())
            .finish()
    }
}

/// Argument handed to start and stop hooks.
pub struct HookContext<'a> {
    scope: &'a Container,
    phase: HookPhase,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(scope: &'a Container, phase: HookPhase) -> Self {
        Self { scope, phase }
    }

    /// Scope the hook was registered on.
    #[inline]
    pub fn scope(&self) -> &Container {
        self.scope
    }

    #[inline]
    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    /// Resolve a type-keyed dependency from the hook's scope.
    pub fn inject<T: Injectable>(&self) -> Result<Arc<T>> {
        self.scope.inject::<T>()
    }

    /// Resolve a name-keyed dependency from the hook's scope.
    pub fn inject_named<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        self.scope.inject_named::<T>(name)
    }
}

// =============================================================================
// Context Pooling
// =============================================================================

/// Pool of reusable resolution contexts.
///
/// Resolution is frequent and nested (every `inject` call clones its context),
/// so contexts are recycled instead of allocated per call. Released contexts
/// are fully reset, so a hook declared in one resolution can never leak into
/// another.
///
/// # Example
///
/// ```rust
/// use lifecycle_injector::App;
///
/// let app = App::with_pool_capacity(4);
/// assert_eq!(app.pool().available_count(), 4);
///
/// {
///     let ctx = app.context();
///     assert_eq!(app.pool().available_count(), 3);
///     assert_eq!(ctx.container().unwrap().name(), "app");
/// }
///
/// // Released back on drop
/// assert_eq!(app.pool().available_count(), 4);
/// ```
#[derive(Debug, Default)]
pub struct ContextPool {
    available: Mutex<Vec<Context>>,
}

impl ContextPool {
    /// Upper bound on idle contexts kept for reuse.
    pub const MAX_RETAINED: usize = 256;

    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool with `capacity` pre-allocated contexts.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(Self::MAX_RETAINED);
        let available = (0..capacity).map(|_| Context::empty()).collect();
        Self {
            available: Mutex::new(available),
        }
    }

    /// Acquire a context bound to `container`.
    #[inline]
    pub fn acquire(&self, container: &Container) -> PooledContext<'_> {
        let mut ctx = self.take();
        ctx.bind(container.clone());
        PooledContext { ctx, pool: self }
    }

    fn take(&self) -> Context {
        self.available.lock().pop().unwrap_or_else(Context::empty)
    }

    fn release(&self, mut ctx: Context) {
        ctx.reset();
        let mut available = self.available.lock();
        if available.len() < Self::MAX_RETAINED {
            available.push(ctx);
        }
    }

    /// Number of idle contexts ready for reuse.
    #[inline]
    pub fn available_count(&self) -> usize {
        self.available.lock().len()
    }
}

/// A context acquired from a pool that automatically returns when dropped.
pub struct PooledContext<'a> {
    ctx: Context,
    pool: &'a ContextPool,
}

impl<'a> std::ops::Deref for PooledContext<'a> {
    type Target = Context;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl<'a> Drop for PooledContext<'a> {
    fn drop(&mut self) {
        let ctx = std::mem::replace(&mut self.ctx, Context::empty());
        self.pool.release(ctx);
    }
}
