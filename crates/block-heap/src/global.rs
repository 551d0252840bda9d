// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Process-wide allocator facade.
//!
//! One heap per process, lazily initialised on first use: the first
//! [`alloc`] or [`free`] that observes an empty slot takes the write lock,
//! re-checks, and builds the heap with concurrency enabled. Every later
//! call goes through the read-lock fast path. [`cleanup`] tears the heap
//! down; the next `alloc`/`free` re-initialises lazily.
//!
//! Introspection ([`stats`], [`verify`]) never initialises — it reports
//! [`HeapError::NotInitialised`] when no heap is live, matching the rule
//! that only the allocation entry points trigger lazy setup.
//!
//! Tests that want an isolated heap should construct [`Heap`] directly
//! instead of going through the globals.

use crate::{Heap, HeapConfig, HeapError, HeapStats};
use std::ptr::NonNull;
use std::sync::{Arc, RwLock};

static GLOBAL: RwLock<Option<Arc<Heap>>> = RwLock::new(None);

/// Clones the live heap handle, building it first if necessary.
fn heap_or_init() -> Result<Arc<Heap>, HeapError> {
    // Fast path: already initialised.
    if let Some(h) = GLOBAL
        .read()
        .unwrap_or_else(|p| p.into_inner())
        .as_ref()
    {
        return Ok(Arc::clone(h));
    }

    // Slow path: take the write lock and re-check.
    let mut slot = GLOBAL.write().unwrap_or_else(|p| p.into_inner());
    if let Some(h) = slot.as_ref() {
        return Ok(Arc::clone(h));
    }

    tracing::info!("lazily initialising process-wide allocator");
    let heap = Arc::new(Heap::new(&HeapConfig::default())?);
    *slot = Some(Arc::clone(&heap));
    Ok(heap)
}

/// Clones the live heap handle without initialising.
fn heap_if_live() -> Result<Arc<Heap>, HeapError> {
    GLOBAL
        .read()
        .unwrap_or_else(|p| p.into_inner())
        .as_ref()
        .map(Arc::clone)
        .ok_or(HeapError::NotInitialised)
}

/// Explicitly initialises the process-wide allocator.
///
/// A no-op if the allocator is already live. `enable_concurrency` is
/// recorded in the heap configuration.
pub fn init(enable_concurrency: bool) -> Result<(), HeapError> {
    init_with(HeapConfig {
        concurrent: enable_concurrency,
        ..Default::default()
    })
}

/// Initialises the process-wide allocator with an explicit configuration.
///
/// A no-op if the allocator is already live (the existing heap keeps its
/// configuration).
pub fn init_with(config: HeapConfig) -> Result<(), HeapError> {
    let mut slot = GLOBAL.write().unwrap_or_else(|p| p.into_inner());
    if slot.is_some() {
        tracing::debug!("allocator already initialised");
        return Ok(());
    }
    *slot = Some(Arc::new(Heap::new(&config)?));
    tracing::info!("allocator initialised");
    Ok(())
}

/// Tears down the process-wide allocator, returning every reservation to
/// the OS. A no-op if nothing is live. Subsequent `alloc`/`free` calls
/// re-initialise lazily.
pub fn cleanup() -> Result<(), HeapError> {
    let taken = GLOBAL
        .write()
        .unwrap_or_else(|p| p.into_inner())
        .take();
    if taken.is_some() {
        tracing::info!("allocator cleaned up");
    }
    Ok(())
}

/// Allocates `size` bytes from the process-wide heap.
///
/// Returns a null pointer when `size == 0` or when the heap cannot
/// satisfy the request; otherwise the pointer is 8-byte aligned.
#[track_caller]
pub fn alloc(size: usize) -> *mut u8 {
    if size == 0 {
        return std::ptr::null_mut();
    }
    let heap = match heap_or_init() {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(%e, "allocator initialisation failed");
            return std::ptr::null_mut();
        }
    };
    match heap.allocate(size) {
        Ok(p) => p.as_ptr(),
        Err(e) => {
            tracing::debug!(size, %e, "allocation failed");
            std::ptr::null_mut()
        }
    }
}

/// Frees a pointer previously returned by [`alloc`].
///
/// `free(null)` is a successful no-op. Unknown addresses and double frees
/// are reported and leave the heap unchanged.
#[track_caller]
pub fn free(ptr: *mut u8) -> Result<(), HeapError> {
    let Some(ptr) = NonNull::new(ptr) else {
        return Ok(());
    };
    heap_or_init()?.free(ptr)
}

/// Snapshot of the process-wide heap accounting.
pub fn stats() -> Result<HeapStats, HeapError> {
    Ok(heap_if_live()?.stats())
}

/// Runs the full invariant check on the process-wide heap.
pub fn verify() -> Result<(), HeapError> {
    heap_if_live()?.verify()
}

/// Writes the allocator state (heap layout, reservations, stats, verify
/// outcome) to standard error.
pub fn dump() {
    match heap_if_live() {
        Ok(heap) => {
            eprintln!("=== Allocator State ===");
            eprint!("{}", heap.render_dump());
            eprintln!("{}", heap.stats().summary());
            match heap.verify() {
                Ok(()) => eprintln!("Verify: ok"),
                Err(e) => eprintln!("Verify: FAILED ({e})"),
            }
        }
        Err(_) => eprintln!("=== Allocator State ===\n(not initialised)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The facade is process-wide state; tests in this module serialise on
    // one lock so they cannot observe each other's heap.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    fn serial() -> std::sync::MutexGuard<'static, ()> {
        TEST_LOCK.lock().unwrap_or_else(|p| p.into_inner())
    }

    #[test]
    fn test_alloc_zero_returns_null() {
        let _guard = serial();
        assert!(alloc(0).is_null());
    }

    #[test]
    fn test_free_null_is_ok() {
        let _guard = serial();
        assert!(free(std::ptr::null_mut()).is_ok());
    }

    #[test]
    fn test_lazy_init_and_roundtrip() {
        let _guard = serial();
        cleanup().unwrap();

        // stats() must not initialise on its own.
        assert!(matches!(stats(), Err(HeapError::NotInitialised)));

        let p = alloc(1024);
        assert!(!p.is_null());
        assert_eq!(p as usize % 8, 0);
        assert_eq!(stats().unwrap().allocated_bytes, 1024);

        free(p).unwrap();
        assert_eq!(stats().unwrap().allocated_bytes, 0);
        verify().unwrap();

        cleanup().unwrap();
    }

    #[test]
    fn test_reinitialise_after_cleanup() {
        let _guard = serial();
        cleanup().unwrap();

        let p = alloc(64);
        assert!(!p.is_null());
        free(p).unwrap();
        cleanup().unwrap();

        // Next call re-initialises lazily.
        let q = alloc(64);
        assert!(!q.is_null());
        free(q).unwrap();
        cleanup().unwrap();
    }

    #[test]
    fn test_explicit_init_is_idempotent() {
        let _guard = serial();
        cleanup().unwrap();

        init(true).unwrap();
        init(false).unwrap(); // no-op, keeps the live heap
        let p = alloc(32);
        assert!(!p.is_null());
        free(p).unwrap();

        cleanup().unwrap();
    }
}
