//! Application root
//!
//! An [`App`] owns the root scope, the named child scopes created from it and
//! the context pool they share. It drives startup (fail-fast) and teardown
//! (best-effort) across the whole tree.

use crate::container::Container;
use crate::lifecycle::LifeState;
use crate::logging::di_event;
use crate::{ContextPool, DiError, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::Dispatch;
use tracing::level_filters::LevelFilter;

const ROOT_SCOPE: &str = "app";

/// Root of a scope tree with a managed lifecycle.
///
/// Derefs to its root [`Container`], so `&app` works wherever a scope is
/// expected.
///
/// # Examples
///
/// ```rust
/// use lifecycle_injector::{App, LifeState, provide};
///
/// struct Server { port: u16 }
///
/// let app = App::new();
/// provide(|ctx| {
///     ctx.on_start(|_| {
///         // bind the listener
///         Ok(())
///     });
///     ctx.on_stop(|_| Ok(()));
///     Ok(Server { port: 8080 })
/// })
/// .attach(&app);
///
/// // Resolve before startup so the hooks are queued
/// assert_eq!(app.inject::<Server>().unwrap().port, 8080);
///
/// app.startup().unwrap();
/// assert_eq!(app.cur_state(), LifeState::Ready);
///
/// app.teardown().unwrap();
/// assert_eq!(app.cur_state(), LifeState::Terminated);
/// ```
pub struct App {
    root: Container,
    /// Child scopes in creation order
    scopes: RwLock<Vec<Container>>,
    /// Serializes startup and teardown
    lifecycle: Mutex<()>,
}

impl App {
    pub fn new() -> Self {
        Self::from_pool(ContextPool::new())
    }

    /// Create an app whose context pool starts with `capacity` idle contexts.
    pub fn with_pool_capacity(capacity: usize) -> Self {
        Self::from_pool(ContextPool::with_capacity(capacity))
    }

    fn from_pool(pool: ContextPool) -> Self {
        Self {
            root: Container::root(ROOT_SCOPE, Arc::new(pool)),
            scopes: RwLock::new(Vec::new()),
            lifecycle: Mutex::new(()),
        }
    }

    /// Root scope of this app.
    #[inline]
    pub fn root(&self) -> &Container {
        &self.root
    }

    /// Lifecycle state of the app (its root scope).
    #[inline]
    pub fn cur_state(&self) -> LifeState {
        self.root.state()
    }

    /// Create a named child scope of the root.
    ///
    /// The child inherits the root's current logger, level and lifecycle
    /// state. Asking for an existing name replaces that scope (keeping its
    /// position in start order) and logs a warning.
    pub fn get_scope(&self, name: &str) -> Container {
        // Created under the write lock so startup never publishes READY
        // between the state snapshot and the scope becoming visible
        let mut scopes = self.scopes.write();
        let scope = self.root.child(name);

        match scopes.iter_mut().find(|existing| existing.name() == name) {
            Some(existing) => {
                di_event!(
                    self.root.sink(),
                    WARN,
                    scope = name,
                    "Scope already exists, replacing it"
                );
                *existing = scope.clone();
            }
            None => scopes.push(scope.clone()),
        }
        scope
    }

    /// Names of the child scopes in creation order.
    pub fn scope_names(&self) -> Vec<String> {
        self.scopes.read().iter().map(|s| s.name().to_owned()).collect()
    }

    /// Route the app's events to `dispatch`.
    ///
    /// Scopes created afterwards inherit it.
    pub fn set_logger(&self, dispatch: Dispatch) -> &Self {
        self.root.sink().set_dispatch(dispatch);
        self
    }

    /// Drop events below `level`.
    ///
    /// Scopes created afterwards inherit it.
    pub fn set_log_level(&self, level: LevelFilter) -> &Self {
        self.root.sink().set_level(level);
        self
    }

    /// Run every queued start hook: the root's first, then each child scope in
    /// creation order.
    ///
    /// Fails with `LifecycleViolation` unless the app is `UNINITIALIZED`. The
    /// first failing hook aborts startup and is returned; the app then stays
    /// `INITIALIZING`.
    pub fn startup(&self) -> Result<()> {
        let _guard = self.lifecycle.lock();

        let state = self.root.state();
        if !state.can_start() {
            di_event!(self.root.sink(), WARN, %state, "Startup rejected");
            return Err(DiError::lifecycle("start up", state));
        }

        di_event!(self.root.sink(), INFO, hooks = self.root.start_hook_count(), "Starting app");
        self.root.set_state(LifeState::Initializing);

        // Root hooks and child scopes can keep adding to each other: a child
        // hook may queue on the root, a root hook may create a child.
        let mut ran = 0;
        let scopes = loop {
            ran = self.root.run_start_hooks(ran)?;
            self.start_pending_scopes()?;

            let scopes = self.scopes.read();
            if scopes.iter().all(|s| s.state() == LifeState::Ready) && self.root.mark_ready(ran) {
                break scopes.len();
            }
        };

        di_event!(self.root.sink(), INFO, hooks = ran, scopes, "App ready");
        Ok(())
    }

    /// Start child scopes that are not `READY` yet, in creation order,
    /// including scopes created while this runs.
    fn start_pending_scopes(&self) -> Result<()> {
        loop {
            let next = self
                .scopes
                .read()
                .iter()
                .find(|scope| scope.state() != LifeState::Ready)
                .cloned();
            let Some(scope) = next else {
                return Ok(());
            };

            if let Err(err) = scope.start() {
                di_event!(
                    self.root.sink(),
                    ERROR,
                    scope = scope.name(),
                    error = %err,
                    "Scope failed to start, aborting startup"
                );
                return Err(err);
            }
        }
    }

    /// Run every stop hook: the root's, then each child scope's, each in
    /// reverse registration order.
    ///
    /// Fails with `LifecycleViolation` unless the app is `READY` or
    /// `INITIALIZING`. Failures do not stop the sweep; all of them are
    /// returned together as `TeardownFailed` once every scope is
    /// `TERMINATED`.
    pub fn teardown(&self) -> Result<()> {
        let _guard = self.lifecycle.lock();

        let state = self.root.state();
        if !state.can_stop() {
            di_event!(self.root.sink(), WARN, %state, "Teardown rejected");
            return Err(DiError::lifecycle("tear down", state));
        }

        di_event!(self.root.sink(), INFO, hooks = self.root.stop_hook_count(), "Tearing down app");

        let mut failures = self.root.stop();

        let scopes = self.scopes.read().clone();
        for scope in &scopes {
            if matches!(scope.state(), LifeState::ShuttingDown | LifeState::Terminated) {
                continue;
            }
            failures.extend(scope.stop());
        }

        if failures.is_empty() {
            di_event!(self.root.sink(), INFO, "App terminated");
            return Ok(());
        }

        di_event!(
            self.root.sink(),
            WARN,
            failures = failures.len(),
            "App terminated with failures"
        );
        Err(DiError::TeardownFailed { failures })
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for App {
    type Target = Container;

    #[inline]
    fn deref(&self) -> &Container {
        &self.root
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("root", &self.root)
            .field("scopes", &self.scope_names())
            .finish()
    }
}
