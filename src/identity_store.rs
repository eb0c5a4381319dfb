// IP -> identity cache: wholesale snapshot replacement, concurrent point lookup

use crate::models::{Identity, IdentitySnapshot};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared identity cache. Writers install a complete snapshot with a single
/// pointer swap; readers hold the lock only long enough to clone the `Arc`,
/// so a lookup or a full-cache read always sees exactly one generation.
pub struct IdentityStore {
    current: RwLock<Arc<IdentitySnapshot>>,
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore {
    /// Empty store; lookups return the zero identity until the first replace.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(IdentitySnapshot::new())),
        }
    }

    /// Install `snapshot` as the new source of truth for all subsequent
    /// lookups. Safe to call concurrently with any number of readers.
    pub fn replace(&self, snapshot: IdentitySnapshot) {
        *self.write_guard() = Arc::new(snapshot);
    }

    /// Resolve one IP. Absence is not an error: unknown addresses yield the
    /// zero identity (all fields empty).
    pub fn lookup(&self, ip: &str) -> Identity {
        self.snapshot().get(ip).cloned().unwrap_or_default()
    }

    /// Current snapshot generation for wholesale reads (cache endpoint,
    /// render path).
    pub fn snapshot(&self) -> Arc<IdentitySnapshot> {
        Arc::clone(&self.read_guard())
    }

    // The guarded value is a plain Arc; a panicking writer cannot leave it
    // half-swapped, so a poisoned lock is still safe to recover.
    fn read_guard(&self) -> RwLockReadGuard<'_, Arc<IdentitySnapshot>> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Arc<IdentitySnapshot>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}
