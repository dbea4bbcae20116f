// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Contract-checked vector, its read-only views and iterator.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use access_cop::{AccessKind, Identity, MonitorTarget, Policy, Registry};

type Storage<T> = Arc<RwLock<Vec<T>>>;

fn read<T>(storage: &RwLock<Vec<T>>) -> RwLockReadGuard<'_, Vec<T>> {
    storage.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(storage: &RwLock<Vec<T>>) -> RwLockWriteGuard<'_, Vec<T>> {
    storage.write().unwrap_or_else(PoisonError::into_inner)
}

/// A vector whose operations are checked against a registry policy.
///
/// Mutating calls open a [`AccessKind::Modify`] access and reading calls a
/// [`AccessKind::Read`] access for their duration. Every method raises the
/// registry's [`Violation`](access_cop::Violation) panic when the contract is
/// broken.
pub struct GuardedVec<'r, T> {
    registry: &'r Registry,
    storage: Storage<T>,
}

impl<'r, T> GuardedVec<'r, T>
where
    T: Send + Sync + 'static,
{
    /// Empty vector registered under `policy`, owned by the calling thread.
    pub fn new(registry: &'r Registry, policy: Policy) -> Self {
        Self::from_vec(registry, policy, Vec::new())
    }

    /// Wraps `items`, registered under `policy`.
    pub fn from_vec(registry: &'r Registry, policy: Policy, items: Vec<T>) -> Self {
        let storage = Arc::new(RwLock::new(items));
        registry.monitor(&storage, policy);
        Self { registry, storage }
    }

    /// Registry checking this vector.
    pub const fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Appends `value`.
    pub fn push(&self, value: T) {
        let _access = self.registry.guard(&self.storage, AccessKind::Modify);
        write(&self.storage).push(value);
    }

    /// Removes and returns the last element.
    pub fn pop(&self) -> Option<T> {
        let _access = self.registry.guard(&self.storage, AccessKind::Modify);
        write(&self.storage).pop()
    }

    /// Replaces the element at `index`, returning the old one. `None` when
    /// out of bounds.
    pub fn set(&self, index: usize, value: T) -> Option<T> {
        let _access = self.registry.guard(&self.storage, AccessKind::Modify);
        write(&self.storage)
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, value))
    }

    /// Removes every element.
    pub fn clear(&self) {
        let _access = self.registry.guard(&self.storage, AccessKind::Modify);
        write(&self.storage).clear();
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        let _access = self.registry.guard(&self.storage, AccessKind::Read);
        read(&self.storage).len()
    }

    /// Whether the vector holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `body` over the storage inside a single modify access, so a
    /// multi-step update is one bracket.
    pub fn with_mut<R>(&self, body: impl FnOnce(&mut Vec<T>) -> R) -> R {
        let _access = self.registry.guard(&self.storage, AccessKind::Modify);
        body(&mut write(&self.storage))
    }

    /// Read-only view sharing this vector's access record.
    pub fn view(&self) -> VecView<'r, T> {
        VecView {
            registry: self.registry,
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<'r, T> GuardedVec<'r, T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Clone of the element at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        let _access = self.registry.guard(&self.storage, AccessKind::Read);
        read(&self.storage).get(index).cloned()
    }

    /// Iterator that re-checks the contract before every element.
    pub fn iter(&self) -> GuardedIter<'r, T> {
        self.view().into_iter()
    }
}

impl<T> MonitorTarget for GuardedVec<'_, T>
where
    T: Send + Sync + 'static,
{
    fn monitor_identity(&self) -> Identity {
        self.storage.monitor_identity()
    }
}

impl<T> std::fmt::Debug for GuardedVec<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedVec")
            .field("storage", &Arc::as_ptr(&self.storage))
            .finish_non_exhaustive()
    }
}

/// Read-only handle onto a [`GuardedVec`]'s storage.
///
/// Views forward their identity to the backing storage, so a policy set
/// through the vector governs every view and a bracket held through a view
/// excludes the vector.
pub struct VecView<'r, T> {
    registry: &'r Registry,
    storage: Storage<T>,
}

impl<T> Clone for VecView<'_, T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry,
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<T> MonitorTarget for VecView<'_, T>
where
    T: Send + Sync + 'static,
{
    fn monitor_identity(&self) -> Identity {
        self.storage.monitor_identity()
    }
}

impl<'r, T> VecView<'r, T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Number of elements.
    pub fn len(&self) -> usize {
        let _access = self.registry.guard(&self.storage, AccessKind::Read);
        read(&self.storage).len()
    }

    /// Whether the vector holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone of the element at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        let _access = self.registry.guard(&self.storage, AccessKind::Read);
        read(&self.storage).get(index).cloned()
    }
}

impl<'r, T> IntoIterator for VecView<'r, T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;
    type IntoIter = GuardedIter<'r, T>;

    fn into_iter(self) -> Self::IntoIter {
        GuardedIter {
            view: self,
            next: 0,
        }
    }
}

/// Iterator over a [`GuardedVec`] that holds no snapshot.
///
/// Each `next` performs a one-shot read check and then reads the element at
/// the cursor, so a modification racing the iteration is reported at the
/// first element fetched while it is outstanding.
pub struct GuardedIter<'r, T> {
    view: VecView<'r, T>,
    next: usize,
}

impl<T> Iterator for GuardedIter<'_, T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.view.registry.read(&self.view.storage);
        let item = read(&self.view.storage).get(self.next).cloned()?;
        self.next += 1;
        Some(item)
    }
}
