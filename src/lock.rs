//! Lock acquisition for the in-process cache structures.
//!
//! A panic while a guard is held poisons the lock for every later caller.
//! Everything guarded here is recomputable cache state, so the helpers
//! recover the guard and log the site instead of propagating the poison.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!(
            source,
            op,
            access = "read",
            "Cache lock poisoned by an earlier panic; recovering the guard"
        );
        poisoned.into_inner()
    })
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!(
            source,
            op,
            access = "write",
            "Cache lock poisoned by an earlier panic; recovering the guard"
        );
        poisoned.into_inner()
    })
}
