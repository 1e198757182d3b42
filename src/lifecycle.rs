//! Lifecycle states and the hook timing policy
//!
//! Every scope (the app's root included) moves strictly forward through
//! `UNINITIALIZED -> INITIALIZING -> READY -> SHUTTING_DOWN -> TERMINATED`.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of an app or scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum LifeState {
    /// Created, startup not requested yet
    #[default]
    Uninitialized = 0,
    /// Start hooks are running
    Initializing = 1,
    /// Startup finished successfully
    Ready = 2,
    /// Stop hooks are running
    ShuttingDown = 3,
    /// Teardown finished (with or without failures)
    Terminated = 4,
}

impl LifeState {
    #[inline]
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            2 => Self::Ready,
            3 => Self::ShuttingDown,
            _ => Self::Terminated,
        }
    }

    /// Whether `Startup` may begin from this state.
    #[inline]
    pub fn can_start(self) -> bool {
        self == Self::Uninitialized
    }

    /// Whether `Teardown` may begin from this state.
    #[inline]
    pub fn can_stop(self) -> bool {
        matches!(self, Self::Initializing | Self::Ready)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::Initializing => "INITIALIZING",
            Self::Ready => "READY",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for LifeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic cell holding a [`LifeState`].
#[derive(Debug, Default)]
pub(crate) struct AtomicLifeState(AtomicU8);

impl AtomicLifeState {
    pub(crate) fn new(state: LifeState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub(crate) fn load(&self) -> LifeState {
        LifeState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn store(&self, state: LifeState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Which half of the lifecycle a hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Start,
    Stop,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Stop => f.write_str("stop"),
        }
    }
}

/// What to do with a hook declared by a constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    /// Append to the scope's hook list for the coming sweep
    Queue,
    /// The startup sweep already passed; run the hook right away
    RunNow,
}

/// Decide how a freshly declared hook is handled, given the owning scope's state.
///
/// Start hooks declared once the scope is `READY` would never be reached by a
/// sweep, so they run immediately. Stop hooks are always queued.
///
/// ```rust
/// use lifecycle_injector::{hook_decision, HookDecision, HookPhase, LifeState};
///
/// assert_eq!(hook_decision(HookPhase::Start, LifeState::Ready), HookDecision::RunNow);
/// assert_eq!(hook_decision(HookPhase::Start, LifeState::Uninitialized), HookDecision::Queue);
/// assert_eq!(hook_decision(HookPhase::Stop, LifeState::Ready), HookDecision::Queue);
/// ```
#[inline]
pub fn hook_decision(phase: HookPhase, state: LifeState) -> HookDecision {
    match (phase, state) {
        (HookPhase::Start, LifeState::Ready) => HookDecision::RunNow,
        _ => HookDecision::Queue,
    }
}
