//! Synchronisation primitives shared by the registry and the heap.
//! Swapped for loom's versions when built with `--cfg loom`.

#[cfg(not(loom))]
pub use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(loom)]
pub use loom::sync::{Arc, Mutex, MutexGuard};

/// Locks the mutex, recovering the guard if a previous holder panicked.
/// Every operation guarded this way completes its state update before
/// releasing the lock, so a poisoned value is still consistent.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
