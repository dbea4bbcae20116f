// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Contract-checked hash map.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use access_cop::{AccessKind, Identity, MonitorTarget, Policy, Registry};
use rustc_hash::FxHashMap;

/// A hash map whose operations are checked against a registry policy.
///
/// Same bracketing rules as [`GuardedVec`](crate::GuardedVec).
pub struct GuardedMap<'r, K, V> {
    registry: &'r Registry,
    storage: Arc<RwLock<FxHashMap<K, V>>>,
}

impl<'r, K, V> GuardedMap<'r, K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Empty map registered under `policy`, owned by the calling thread.
    pub fn new(registry: &'r Registry, policy: Policy) -> Self {
        let storage = Arc::new(RwLock::new(FxHashMap::default()));
        registry.monitor(&storage, policy);
        Self { registry, storage }
    }

    /// Inserts `value` under `key`, returning the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let _access = self.registry.guard(&self.storage, AccessKind::Modify);
        self.storage
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value)
    }

    /// Removes `key`, returning its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let _access = self.registry.guard(&self.storage, AccessKind::Modify);
        self.storage
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Whether `key` is present.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let _access = self.registry.guard(&self.storage, AccessKind::Read);
        self.storage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        let _access = self.registry.guard(&self.storage, AccessKind::Read);
        self.storage.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `body` over the storage inside a single modify access.
    pub fn with_mut<R>(&self, body: impl FnOnce(&mut FxHashMap<K, V>) -> R) -> R {
        let _access = self.registry.guard(&self.storage, AccessKind::Modify);
        body(&mut self.storage.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Clone of the value under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Clone,
    {
        let _access = self.registry.guard(&self.storage, AccessKind::Read);
        self.storage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl<K, V> MonitorTarget for GuardedMap<'_, K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn monitor_identity(&self) -> Identity {
        self.storage.monitor_identity()
    }
}

impl<K, V> std::fmt::Debug for GuardedMap<'_, K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedMap")
            .field("storage", &Arc::as_ptr(&self.storage))
            .finish_non_exhaustive()
    }
}
