// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! The handle table connecting running programs to their host apis.
//!
//! A program only ever holds an [`ApiId`]. The host registers the call's [`EvmApi`] before the
//! program starts and every host call resolves the id back to it. Ids are handed out by an atomic
//! counter and never reused, so a stale id can only miss, never alias another call.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use lazy_static::lazy_static;
use parking_lot::{Mutex, RwLock};
use stylus_core::{BridgeError, EvmApi};

/// Handle to a registered host api.
pub type ApiId = u64;

/// A registered host api and the bridge's bookkeeping for its call.
pub struct HostApiEntry {
    pub(crate) api: Box<dyn EvmApi>,
    pub(crate) read_only: bool,
    pub(crate) return_data_len: u32,
}

impl HostApiEntry {
    /// Whether the call runs in a static context.
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Length of the data returned by the call's most recent subcall.
    pub fn return_data_len(&self) -> u32 {
        self.return_data_len
    }
}

lazy_static! {
    /// The process-wide handle table. Shared so that runtimes can hold it past a borrow.
    pub static ref HOST_APIS: Arc<HostApiRegistry> = Arc::new(HostApiRegistry::new());
}

/// Concurrent map from [`ApiId`] to [`HostApiEntry`].
///
/// Lookups take the read lock only long enough to clone the entry's [`Arc`], so calls on
/// different handles never wait on each other.
pub struct HostApiRegistry {
    apis: RwLock<HashMap<ApiId, Arc<Mutex<HostApiEntry>>>>,
    next_id: AtomicU64,
}

impl Default for HostApiRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HostApiRegistry {
    pub fn new() -> Self {
        Self {
            apis: RwLock::default(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers `api` under a fresh handle. The handle lives until the guard drops.
    pub fn register(&self, api: Box<dyn EvmApi>, read_only: bool) -> ApiGuard<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = HostApiEntry {
            api,
            read_only,
            return_data_len: 0,
        };
        self.apis.write().insert(id, Arc::new(Mutex::new(entry)));
        log::debug!("registered host api {id} (read only: {read_only})");
        ApiGuard { registry: self, id }
    }

    /// Resolves a handle.
    pub fn lookup(&self, id: ApiId) -> Result<Arc<Mutex<HostApiEntry>>, BridgeError> {
        let entry = self.apis.read().get(&id).cloned();
        entry.ok_or_else(|| {
            log::error!("no host api registered for handle {id}");
            BridgeError::UnknownHandle(id)
        })
    }

    /// Removes a handle, returning whether it was registered.
    pub fn unregister(&self, id: ApiId) -> bool {
        let removed = self.apis.write().remove(&id).is_some();
        if removed {
            log::debug!("unregistered host api {id}");
        }
        removed
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.apis.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` on the entry for `id`, holding only that entry's lock.
    pub(crate) fn with_entry<T>(
        &self,
        id: ApiId,
        f: impl FnOnce(&mut HostApiEntry) -> T,
    ) -> Result<T, BridgeError> {
        let entry = self.lookup(id)?;
        let mut entry = entry.lock();
        Ok(f(&mut entry))
    }
}

/// Keeps a handle registered. Dropping it unregisters the handle, including during unwinding.
#[must_use = "the handle is unregistered as soon as the guard drops"]
pub struct ApiGuard<'a> {
    registry: &'a HostApiRegistry,
    id: ApiId,
}

impl ApiGuard<'_> {
    pub fn id(&self) -> ApiId {
        self.id
    }
}

impl Drop for ApiGuard<'_> {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashSet, panic, thread};
    use stylus_test::TestVM;

    #[test]
    fn test_register_and_drop() {
        let registry = HostApiRegistry::new();
        let guard = registry.register(Box::new(TestVM::new()), false);
        let id = guard.id();
        assert_eq!(id, 1);
        assert_eq!(registry.len(), 1);
        assert!(!registry.lookup(id).unwrap().lock().read_only());

        drop(guard);
        assert!(registry.is_empty());
        assert_eq!(
            registry.lookup(id).err(),
            Some(BridgeError::UnknownHandle(id))
        );
        assert!(!registry.unregister(id));
    }

    #[test]
    fn test_ids_are_not_reused() {
        let registry = HostApiRegistry::new();
        let first = registry.register(Box::new(TestVM::new()), false).id();
        let second = registry.register(Box::new(TestVM::new()), true).id();
        assert_ne!(first, second);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_nested_guards() {
        let registry = HostApiRegistry::new();
        let outer = registry.register(Box::new(TestVM::new()), false);
        let inner = registry.register(Box::new(TestVM::new()), true);
        let (outer_id, inner_id) = (outer.id(), inner.id());
        assert_eq!(registry.len(), 2);

        drop(outer);
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(outer_id).is_err());
        assert!(registry.lookup(inner_id).unwrap().lock().read_only());

        drop(inner);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = HostApiRegistry::new();
        let ids: Vec<ApiId> = thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        (0..64)
                            .map(|_| {
                                let guard = registry.register(Box::new(TestVM::new()), false);
                                assert!(registry.lookup(guard.id()).is_ok());
                                guard.id()
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect()
        });

        let unique: HashSet<_> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 8 * 64);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregisters_on_panic() {
        let registry = HostApiRegistry::new();
        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            let _guard = registry.register(Box::new(TestVM::new()), false);
            assert_eq!(registry.len(), 1);
            panic!("program host panicked");
        }));
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_global_table() {
        let guard = HOST_APIS.register(Box::new(TestVM::new()), false);
        let id = guard.id();
        assert!(HOST_APIS.lookup(id).is_ok());
        drop(guard);
        assert!(HOST_APIS.lookup(id).is_err());
    }
}
