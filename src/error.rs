//! Error types for dependency injection

use crate::lifecycle::{HookPhase, LifeState};
use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by user constructors and hooks.
///
/// Both [`DiError`] and arbitrary user errors convert into it with `?`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared form of a user error, so a cached failure can be handed out more than once.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during dependency injection operations
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// No provider registered under the key in any scope of the chain
    #[error("Provider not found: {key} (named: {named})")]
    NotFound { key: String, named: bool },

    /// A provider exists under the key but produces a different type
    #[error("Provider for {key} does not produce {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// The user constructor returned an error
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: String,
        #[source]
        source: SharedError,
    },

    /// A start or stop hook returned an error
    #[error("{phase} hook failed in scope {scope}: {source}")]
    HookFailed {
        scope: String,
        phase: HookPhase,
        #[source]
        source: SharedError,
    },

    /// Startup or teardown requested from a state that does not allow it
    #[error("Cannot {operation} while {state}")]
    LifecycleViolation {
        operation: &'static str,
        state: LifeState,
    },

    /// One or more hooks or scopes failed during teardown
    #[error("Teardown finished with {} failure(s): {}", .failures.len(), join_failures(.failures))]
    TeardownFailed { failures: Vec<DiError> },

    /// Parent scope was dropped while a child handle was still in use
    #[error("Parent of scope {scope} has been dropped")]
    ParentDropped { scope: String },

    /// Internal error
    #[error("Internal DI error: {0}")]
    Internal(String),
}

fn join_failures(failures: &[DiError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DiError {
    /// Create a NotFound error for a registry key
    #[inline]
    pub fn not_found(key: impl Into<String>, named: bool) -> Self {
        Self::NotFound {
            key: key.into(),
            named,
        }
    }

    /// Create a TypeMismatch error for the requested type
    #[inline]
    pub fn type_mismatch<T: ?Sized + 'static>(key: impl Into<String>) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected: std::any::type_name::<T>(),
        }
    }

    /// Create a ConstructionFailed error wrapping the constructor's error
    #[inline]
    pub fn construction_failed(key: impl Into<String>, source: BoxError) -> Self {
        Self::ConstructionFailed {
            key: key.into(),
            source: Arc::from(source),
        }
    }

    /// Create a HookFailed error
    #[inline]
    pub fn hook_failed(scope: impl Into<String>, phase: HookPhase, source: BoxError) -> Self {
        Self::HookFailed {
            scope: scope.into(),
            phase,
            source: Arc::from(source),
        }
    }

    /// Create a LifecycleViolation error
    #[inline]
    pub fn lifecycle(operation: &'static str, state: LifeState) -> Self {
        Self::LifecycleViolation { operation, state }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    pub fn is_construction_failed(&self) -> bool {
        matches!(self, Self::ConstructionFailed { .. })
    }

    pub fn is_hook_failed(&self) -> bool {
        matches!(self, Self::HookFailed { .. })
    }

    pub fn is_lifecycle_violation(&self) -> bool {
        matches!(self, Self::LifecycleViolation { .. })
    }

    /// Failures carried by an aggregate teardown error (empty for other kinds)
    pub fn failures(&self) -> &[DiError] {
        match self {
            Self::TeardownFailed { failures } => failures,
            _ => &[],
        }
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_construction_failed_keeps_source() {
        let err = DiError::construction_failed("app::Repo", "disk full".into());
        assert!(err.is_construction_failed());
        assert_eq!(err.to_string(), "Failed to construct app::Repo: disk full");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("disk full"));

        // Clones share the same source
        let copy = err.clone();
        assert_eq!(copy.to_string(), err.to_string());
    }

    #[test]
    fn test_teardown_failed_lists_every_failure() {
        let err = DiError::TeardownFailed {
            failures: vec![
                DiError::hook_failed("root", HookPhase::Stop, "a".into()),
                DiError::hook_failed("jobs", HookPhase::Stop, "b".into()),
            ],
        };
        assert_eq!(err.failures().len(), 2);
        let text = err.to_string();
        assert!(text.starts_with("Teardown finished with 2 failure(s)"));
        assert!(text.contains("scope root: a"));
        assert!(text.contains("scope jobs: b"));
    }

    #[test]
    fn test_lifecycle_violation_message() {
        let err = DiError::lifecycle("start up", LifeState::Ready);
        assert!(err.is_lifecycle_violation());
        assert_eq!(err.to_string(), "Cannot start up while READY");
    }
}
