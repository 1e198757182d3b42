//! Provider registries for a single scope
//!
//! Uses DashMap for lock-free concurrent access: registration and lookup of
//! different keys never block each other.

use crate::ErasedProvider;
use crate::key::Key;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;

type Registry = DashMap<String, Arc<dyn ErasedProvider>, RandomState>;

/// The two key spaces of a scope: type-keyed and name-keyed providers.
pub(crate) struct ProviderStorage {
    typed: Registry,
    named: Registry,
}

impl ProviderStorage {
    /// Create new empty storage with optimized shard count.
    ///
    /// Default DashMap uses num_cpus * 4 shards which is overkill for
    /// typical scopes with <50 providers.
    #[inline]
    pub fn new() -> Self {
        Self {
            typed: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
            named: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
        }
    }

    #[inline]
    fn registry(&self, named: bool) -> &Registry {
        if named { &self.named } else { &self.typed }
    }

    /// Store a provider under its own key, returning the one it replaced.
    #[inline]
    pub fn insert(&self, provider: Arc<dyn ErasedProvider>) -> Option<Arc<dyn ErasedProvider>> {
        let (name, named) = {
            let key = provider.key();
            (key.as_str().to_owned(), key.is_named())
        };
        self.registry(named).insert(name, provider)
    }

    /// Local lookup only. The entry is cloned out so no shard lock is held
    /// while the provider runs.
    #[inline]
    pub fn get(&self, key: &Key) -> Option<Arc<dyn ErasedProvider>> {
        self.registry(key.is_named())
            .get(key.as_str())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Number of providers in both registries
    #[inline]
    pub fn len(&self) -> usize {
        self.typed.len() + self.named.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.typed.is_empty() && self.named.is_empty()
    }

    /// Registered keys of one registry (unordered)
    pub fn keys(&self, named: bool) -> Vec<Key> {
        self.registry(named)
            .iter()
            .map(|entry| entry.value().key().clone())
            .collect()
    }
}

impl std::fmt::Debug for ProviderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderStorage")
            .field("typed", &self.typed.len())
            .field("named", &self.named.len())
            .finish()
    }
}
