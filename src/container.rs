//! Scopes: provider registries, parent-delegated lookup and lifecycle hooks
//!
//! A [`Container`] is one node of the scope tree. It owns a type-keyed and a
//! name-keyed registry, its own lifecycle state and ordered start/stop hook
//! lists. Lookups that miss locally fall through to the parent, never the
//! other way round, so the nearest enclosing registration wins.

use crate::context::{Hook, HookContext, PooledContext};
use crate::key::Key;
use crate::lifecycle::{AtomicLifeState, HookDecision, HookPhase, LifeState, hook_decision};
use crate::logging::{LogConfig, LogSink, di_event};
use crate::storage::ProviderStorage;
use crate::{ContextPool, DiError, ErasedProvider, Injectable, Result};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tracing::level_filters::LevelFilter;

pub(crate) struct ScopeInner {
    name: String,
    /// Never owns the parent; a dropped parent surfaces as `ParentDropped`
    parent: Option<Weak<ScopeInner>>,
    depth: u32,
    state: AtomicLifeState,
    storage: ProviderStorage,
    start_hooks: RwLock<Vec<Hook>>,
    stop_hooks: RwLock<Vec<Hook>>,
    sink: LogSink,
    pool: Arc<ContextPool>,
}

impl ScopeInner {
    fn parent(&self) -> Result<Option<Arc<ScopeInner>>> {
        match &self.parent {
            None => Ok(None),
            Some(weak) => weak.upgrade().map(Some).ok_or_else(|| DiError::ParentDropped {
                scope: self.name.clone(),
            }),
        }
    }
}

/// A scope in the container tree.
///
/// Cheap to clone: clones are handles to the same scope.
///
/// # Examples
///
/// ```rust
/// use lifecycle_injector::{App, provide_value};
///
/// #[derive(Debug, PartialEq)]
/// struct Database { url: String }
///
/// let app = App::new();
/// provide_value(Database { url: "production".into() }).attach(&app);
///
/// let tests = app.get_scope("tests");
/// provide_value(Database { url: "test".into() }).attach(&tests);
///
/// // Child registration shadows the parent's
/// assert_eq!(tests.inject::<Database>().unwrap().url, "test");
/// assert_eq!(app.inject::<Database>().unwrap().url, "production");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ScopeInner>,
}

impl Container {
    /// Create a root scope drawing contexts from `pool`.
    pub(crate) fn root(name: impl Into<String>, pool: Arc<ContextPool>) -> Self {
        let name = name.into();
        let sink = LogSink::new(LogConfig::default());
        di_event!(sink, DEBUG, scope = %name, depth = 0, "Creating root scope");

        Self {
            inner: Arc::new(ScopeInner {
                name,
                parent: None,
                depth: 0,
                state: AtomicLifeState::new(LifeState::Uninitialized),
                storage: ProviderStorage::new(),
                start_hooks: RwLock::new(Vec::new()),
                stop_hooks: RwLock::new(Vec::new()),
                sink,
                pool,
            }),
        }
    }

    /// Create a child scope.
    ///
    /// The child snapshots this scope's logger, level and lifecycle state.
    pub(crate) fn child(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        let depth = self.inner.depth + 1;
        let state = self.state();

        di_event!(
            self.inner.sink,
            DEBUG,
            scope = %name,
            parent = %self.inner.name,
            depth,
            %state,
            "Creating child scope"
        );

        Self {
            inner: Arc::new(ScopeInner {
                name,
                parent: Some(Arc::downgrade(&self.inner)),
                depth,
                state: AtomicLifeState::new(state),
                storage: ProviderStorage::new(),
                start_hooks: RwLock::new(Vec::new()),
                stop_hooks: RwLock::new(Vec::new()),
                sink: LogSink::new(self.inner.sink.snapshot()),
                pool: Arc::clone(&self.inner.pool),
            }),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current lifecycle state of this scope.
    #[inline]
    pub fn state(&self) -> LifeState {
        self.inner.state.load()
    }

    /// Scope depth (0 = root).
    #[inline]
    pub fn depth(&self) -> u32 {
        self.inner.depth
    }

    /// Enclosing scope, if it is still alive.
    pub fn parent(&self) -> Option<Container> {
        self.inner.parent().ok().flatten().map(|inner| Container { inner })
    }

    /// Pool this scope draws resolution contexts from.
    #[inline]
    pub fn pool(&self) -> &ContextPool {
        &self.inner.pool
    }

    #[inline]
    pub(crate) fn sink(&self) -> &LogSink {
        &self.inner.sink
    }

    /// Minimum level this scope logs at.
    pub fn log_level(&self) -> LevelFilter {
        self.inner.sink.level()
    }

    pub(crate) fn set_state(&self, state: LifeState) {
        di_event!(self.inner.sink, DEBUG, scope = %self.inner.name, %state, "Scope state changed");
        self.inner.state.store(state);
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Store a provider under its own key.
    ///
    /// Re-registering a key overwrites the previous provider and logs a
    /// warning; it is never an error.
    pub fn add_provider(&self, provider: Arc<dyn ErasedProvider>) {
        let key = provider.key().clone();
        let kind = provider.kind();

        di_event!(
            self.inner.sink,
            DEBUG,
            scope = %self.inner.name,
            %key,
            %kind,
            service = provider.element_type(),
            service_count = self.inner.storage.len() + 1,
            "Registering provider"
        );

        if let Some(previous) = self.inner.storage.insert(provider) {
            di_event!(
                self.inner.sink,
                WARN,
                scope = %self.inner.name,
                %key,
                previous = %previous.kind(),
                replacement = %kind,
                "Provider overwritten, last registration wins"
            );
        }
    }

    /// Find the provider for `key` here or in the nearest enclosing scope.
    pub fn get_provider(&self, key: &Key) -> Option<Arc<dyn ErasedProvider>> {
        self.lookup(key).ok()
    }

    /// Parent-delegated lookup.
    ///
    /// Fails with `NotFound` when no scope in the chain has the key and with
    /// `ParentDropped` when the chain is broken.
    pub(crate) fn lookup(&self, key: &Key) -> Result<Arc<dyn ErasedProvider>> {
        if let Some(provider) = self.inner.storage.get(key) {
            di_event!(
                self.inner.sink,
                TRACE,
                scope = %self.inner.name,
                %key,
                location = "local",
                "Provider found in current scope"
            );
            return Ok(provider);
        }

        let mut current = self.inner.parent()?;
        while let Some(scope) = current {
            if let Some(provider) = scope.storage.get(key) {
                di_event!(
                    self.inner.sink,
                    TRACE,
                    scope = %self.inner.name,
                    %key,
                    ancestor = %scope.name,
                    location = "ancestor",
                    "Provider found in ancestor scope"
                );
                return Ok(provider);
            }
            current = scope.parent()?;
        }

        di_event!(
            self.inner.sink,
            DEBUG,
            scope = %self.inner.name,
            %key,
            "Provider not found in scope or parent chain"
        );
        Err(DiError::not_found(key.as_str(), key.is_named()))
    }

    /// Check if a type-keyed provider is visible from this scope.
    #[inline]
    pub fn contains<T: Injectable>(&self) -> bool {
        self.contains_key(&Key::of::<T>())
    }

    /// Check if a name-keyed provider is visible from this scope.
    #[inline]
    pub fn contains_named(&self, name: &str) -> bool {
        self.contains_key(&Key::named(name))
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.lookup(key).is_ok()
    }

    /// Number of providers registered in this scope (not including parents).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.storage.is_empty()
    }

    /// Keys registered directly in this scope, type keys first.
    pub fn keys(&self) -> Vec<Key> {
        let mut keys = self.inner.storage.keys(false);
        keys.extend(self.inner.storage.keys(true));
        keys
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Acquire a pooled resolution context bound to this scope.
    #[inline]
    pub fn context(&self) -> PooledContext<'_> {
        di_event!(self.inner.sink, TRACE, scope = %self.inner.name, "Acquiring resolution context");
        self.inner.pool.acquire(self)
    }

    /// Resolve a type-keyed dependency through a fresh context.
    pub fn inject<T: Injectable>(&self) -> Result<Arc<T>> {
        crate::inject::<T>(&self.context())
    }

    /// Resolve a name-keyed dependency through a fresh context.
    pub fn inject_named<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        crate::inject_named::<T>(&self.context(), name)
    }

    // =========================================================================
    // Hooks & Lifecycle
    // =========================================================================

    #[inline]
    fn hooks(&self, phase: HookPhase) -> &RwLock<Vec<Hook>> {
        match phase {
            HookPhase::Start => &self.inner.start_hooks,
            HookPhase::Stop => &self.inner.stop_hooks,
        }
    }

    pub fn start_hook_count(&self) -> usize {
        self.inner.start_hooks.read().len()
    }

    pub fn stop_hook_count(&self) -> usize {
        self.inner.stop_hooks.read().len()
    }

    /// Queue `hook`, or hand it back when it has to run right away.
    ///
    /// The state is read under the hook list's write lock, so a start sweep
    /// finishing concurrently either sees the queued hook or has already
    /// published `READY`.
    pub(crate) fn queue_hook(&self, phase: HookPhase, hook: Hook) -> Option<Hook> {
        let mut hooks = self.hooks(phase).write();
        match hook_decision(phase, self.state()) {
            HookDecision::Queue => {
                hooks.push(hook);
                di_event!(
                    self.inner.sink,
                    DEBUG,
                    scope = %self.inner.name,
                    %phase,
                    hooks = hooks.len(),
                    "Hook queued"
                );
                None
            }
            HookDecision::RunNow => Some(hook),
        }
    }

    /// Run one hook against this scope.
    pub(crate) fn run_hook(&self, phase: HookPhase, hook: &Hook) -> Result<()> {
        let ctx = HookContext::new(self, phase);
        (**hook)(&ctx).map_err(|source| {
            let err = DiError::hook_failed(self.name(), phase, source);
            di_event!(
                self.inner.sink,
                ERROR,
                scope = %self.inner.name,
                %phase,
                error = %err,
                "Lifecycle hook failed"
            );
            err
        })
    }

    /// Run start hooks in registration order beginning at `from`, stopping at
    /// the first failure.
    ///
    /// Hooks appended while the sweep runs are picked up. Returns how many
    /// hooks have run in total.
    pub(crate) fn run_start_hooks(&self, from: usize) -> Result<usize> {
        let mut index = from;
        loop {
            let next = self.inner.start_hooks.read().get(index).cloned();
            let Some(hook) = next else {
                return Ok(index);
            };
            self.run_hook(HookPhase::Start, &hook)?;
            index += 1;
        }
    }

    /// Publish `READY` if no start hook beyond the first `ran` is queued.
    ///
    /// Checked under the hook list's write lock, so a concurrent
    /// [`queue_hook`](Self::queue_hook) either lands before the check (and the
    /// caller sweeps again) or sees `READY` and runs its hook itself.
    pub(crate) fn mark_ready(&self, ran: usize) -> bool {
        let hooks = self.inner.start_hooks.write();
        if hooks.len() > ran {
            return false;
        }
        self.set_state(LifeState::Ready);
        true
    }

    /// Full start of this scope: `INITIALIZING`, hooks, then `READY`.
    ///
    /// Fail-fast: the first failing hook aborts the sweep and the scope stays
    /// `INITIALIZING`.
    pub(crate) fn start(&self) -> Result<()> {
        di_event!(self.inner.sink, INFO, scope = %self.inner.name, "Starting scope");
        self.set_state(LifeState::Initializing);

        let mut ran = 0;
        loop {
            ran = self.run_start_hooks(ran)?;
            if self.mark_ready(ran) {
                break;
            }
        }

        di_event!(self.inner.sink, INFO, scope = %self.inner.name, hooks = ran, "Scope ready");
        Ok(())
    }

    /// Run every stop hook in reverse registration order, collecting failures.
    pub(crate) fn run_stop_hooks(&self) -> Vec<DiError> {
        let hooks: Vec<Hook> = self.inner.stop_hooks.read().clone();
        hooks
            .iter()
            .rev()
            .filter_map(|hook| self.run_hook(HookPhase::Stop, hook).err())
            .collect()
    }

    /// Full stop of this scope: `SHUTTING_DOWN`, hooks, then `TERMINATED`
    /// regardless of failures, which are returned.
    pub(crate) fn stop(&self) -> Vec<DiError> {
        di_event!(self.inner.sink, INFO, scope = %self.inner.name, "Stopping scope");
        self.set_state(LifeState::ShuttingDown);
        let failures = self.run_stop_hooks();
        self.set_state(LifeState::Terminated);
        di_event!(
            self.inner.sink,
            INFO,
            scope = %self.inner.name,
            failures = failures.len(),
            "Scope terminated"
        );
        failures
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("depth", &self.inner.depth)
            .field("providers", &self.inner.storage)
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::logging::test_support::Captured;
    use crate::{App, provide_value};
    use parking_lot::Mutex;

    #[derive(Debug)]
    struct TestService {
        value: String,
    }

    #[derive(Debug)]
    struct AnotherService;

    fn hook<F>(f: F) -> Hook
    where
        F: Fn(&HookContext<'_>) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    fn recording_hook(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Hook {
        let log = Arc::clone(log);
        hook(move |_| {
            log.lock().push(name);
            Ok(())
        })
    }

    fn failing_hook(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Hook {
        let log = Arc::clone(log);
        hook(move |_| {
            log.lock().push(name);
            Err(format!("{name} failed").into())
        })
    }

    #[test]
    fn test_child_scope_falls_back_to_parent() {
        let app = App::new();
        provide_value(TestService { value: "root".into() }).attach(&app);

        let child = app.get_scope("child");
        provide_value(AnotherService).attach(&child);

        // Child sees both
        assert!(child.contains::<TestService>());
        assert!(child.contains::<AnotherService>());

        // Root only sees its own
        assert!(app.contains::<TestService>());
        assert!(!app.contains::<AnotherService>());
        assert_eq!(child.inject::<TestService>().unwrap().value, "root");
    }

    #[test]
    fn test_child_scope_shadows_parent() {
        let app = App::new();
        provide_value(TestService { value: "root".into() }).attach(&app);

        let child = app.get_scope("child");
        provide_value(TestService { value: "child".into() }).attach(&child);

        assert_eq!(app.inject::<TestService>().unwrap().value, "root");
        assert_eq!(child.inject::<TestService>().unwrap().value, "child");
    }

    #[test]
    fn test_not_found_in_whole_chain() {
        let app = App::new();
        let child = app.get_scope("child");

        let err = child.inject::<TestService>().unwrap_err();
        assert!(err.is_not_found());
        assert!(child.get_provider(&Key::of::<TestService>()).is_none());
    }

    #[test]
    fn test_deep_parent_chain() {
        let app = App::new();
        provide_value(TestService { value: "root".into() }).attach(&app);

        let middle = app.get_scope("middle");
        let leaf = middle.child("leaf");
        provide_value(AnotherService).attach(&leaf);

        assert_eq!(leaf.depth(), 2);
        assert_eq!(leaf.parent().unwrap().name(), "middle");
        assert_eq!(leaf.inject::<TestService>().unwrap().value, "root");
        assert!(!middle.contains::<AnotherService>());
    }

    #[test]
    fn test_dropped_parent_is_reported() {
        let app = App::new();
        let child = app.get_scope("orphan");
        provide_value(AnotherService).attach(&child);
        drop(app);

        assert!(child.parent().is_none());
        // Local registrations still resolve
        assert!(child.inject::<AnotherService>().is_ok());
        let err = child.inject::<TestService>().unwrap_err();
        assert!(matches!(err, DiError::ParentDropped { ref scope } if scope == "orphan"));
    }

    #[test]
    fn test_overwrite_warns_and_last_wins() {
        let captured = Captured::default();
        let app = App::new();
        app.set_logger(captured.dispatch());

        provide_value(TestService { value: "first".into() }).attach(&app);
        provide_value(TestService { value: "second".into() }).attach(&app);

        assert_eq!(app.len(), 1);
        assert_eq!(app.inject::<TestService>().unwrap().value, "second");
        let text = captured.text();
        assert!(text.contains("WARN"));
        assert!(text.contains("Provider overwritten"));
    }

    #[test]
    fn test_start_runs_hooks_in_order() {
        let app = App::new();
        let scope = app.get_scope("workers");
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["a", "b", "c"] {
            assert!(scope.queue_hook(HookPhase::Start, recording_hook(&log, name)).is_none());
        }

        scope.start().unwrap();
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert_eq!(scope.state(), LifeState::Ready);
    }

    #[test]
    fn test_start_is_fail_fast() {
        let app = App::new();
        let scope = app.get_scope("workers");
        let log = Arc::new(Mutex::new(Vec::new()));

        scope.queue_hook(HookPhase::Start, recording_hook(&log, "a"));
        scope.queue_hook(HookPhase::Start, failing_hook(&log, "b"));
        scope.queue_hook(HookPhase::Start, recording_hook(&log, "c"));

        let err = scope.start().unwrap_err();
        assert!(err.is_hook_failed());
        assert_eq!(*log.lock(), vec!["a", "b"]);
        assert_eq!(scope.state(), LifeState::Initializing);
    }

    #[test]
    fn test_start_picks_up_hooks_added_during_sweep() {
        let app = App::new();
        let scope = app.get_scope("workers");
        let log = Arc::new(Mutex::new(Vec::new()));

        let late = recording_hook(&log, "late");
        let first_log = Arc::clone(&log);
        scope.queue_hook(
            HookPhase::Start,
            hook(move |ctx| {
                first_log.lock().push("first");
                assert!(ctx.scope().queue_hook(HookPhase::Start, Arc::clone(&late)).is_none());
                Ok(())
            }),
        );

        scope.start().unwrap();
        assert_eq!(*log.lock(), vec!["first", "late"]);
    }

    #[test]
    fn test_mark_ready_refuses_with_unswept_hooks() {
        let app = App::new();
        let scope = app.get_scope("workers");
        let log = Arc::new(Mutex::new(Vec::new()));
        scope.set_state(LifeState::Initializing);

        scope.queue_hook(HookPhase::Start, recording_hook(&log, "a"));
        let ran = scope.run_start_hooks(0).unwrap();

        // Queued after the sweep ended but before READY was published
        scope.queue_hook(HookPhase::Start, recording_hook(&log, "b"));
        assert!(!scope.mark_ready(ran));
        assert_eq!(scope.state(), LifeState::Initializing);

        let ran = scope.run_start_hooks(ran).unwrap();
        assert!(scope.mark_ready(ran));
        assert_eq!(scope.state(), LifeState::Ready);
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_stop_runs_in_reverse_and_collects_failures() {
        let app = App::new();
        let scope = app.get_scope("workers");
        let log = Arc::new(Mutex::new(Vec::new()));

        scope.queue_hook(HookPhase::Stop, recording_hook(&log, "a"));
        scope.queue_hook(HookPhase::Stop, failing_hook(&log, "b"));
        scope.queue_hook(HookPhase::Stop, recording_hook(&log, "c"));

        scope.start().unwrap();
        let failures = scope.stop();

        assert_eq!(*log.lock(), vec!["c", "b", "a"]);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].is_hook_failed());
        assert_eq!(scope.state(), LifeState::Terminated);
    }

    #[test]
    fn test_ready_scope_hands_start_hooks_back() {
        let app = App::new();
        let scope = app.get_scope("workers");
        scope.start().unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let hook = scope.queue_hook(HookPhase::Start, recording_hook(&log, "now"));
        assert!(hook.is_some());
        assert_eq!(scope.start_hook_count(), 0);

        // Stop hooks are still queued
        assert!(scope.queue_hook(HookPhase::Stop, recording_hook(&log, "later")).is_none());
        assert_eq!(scope.stop_hook_count(), 1);
    }

    #[test]
    fn test_child_inherits_log_level_snapshot() {
        let app = App::new();
        app.set_log_level(LevelFilter::WARN);
        let child = app.get_scope("child");

        app.set_log_level(LevelFilter::ERROR);

        assert_eq!(child.log_level(), LevelFilter::WARN);
        assert_eq!(app.log_level(), LevelFilter::ERROR);
    }

    #[test]
    fn test_keys_lists_local_registrations() {
        let app = App::new();
        provide_value(AnotherService).attach(&app);
        provide_value(AnotherService).with_name("extra").attach(&app);

        let keys = app.keys();
        assert_eq!(keys.len(), 2);
        assert!(!keys[0].is_named());
        assert!(keys[1].is_named());
    }
}
