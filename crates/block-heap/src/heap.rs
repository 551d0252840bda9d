// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The heap: owner of the block list, the VM manager, and the allocation
//! policy.
//!
//! All shared state sits in a single [`HeapState`] behind one mutex; every
//! public operation takes the lock once and holds it for the duration of
//! one list traversal at most. The heap upholds:
//!
//! - addresses strictly increase along the block list;
//! - no two adjacent blocks are both FREE (such pairs are merged eagerly
//!   on free);
//! - the recorded counters always match the state-summed block sizes;
//! - live allocations never overlap and are always 8-byte aligned.
//!
//! [`verify`](Heap::verify) re-derives all of the above from the raw list
//! and reports any disagreement as [`HeapError::Corruption`].

use crate::block::{align_up, BlockId, BlockList, BlockState, ALIGN_SIZE};
use crate::policy::find_free_block;
use crate::trace::{TraceKind, TraceRing};
use crate::{HeapConfig, HeapError, HeapStats, Policy};
use std::fmt::Write as _;
use std::panic::Location;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard};
use vm_reserve::{page_size, VmManager};

/// A copy of one block's externally visible fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BlockInfo {
    pub start: usize,
    pub size: usize,
    pub state: BlockState,
}

struct HeapState {
    vm: VmManager,
    blocks: BlockList,
    total_allocated: usize,
    total_free: usize,
    peak_allocated: usize,
    total_allocs: u64,
    total_frees: u64,
    failed_allocs: u64,
    policy: Policy,
    trace: Option<TraceRing>,
}

/// A user-space heap over page-granular VM reservations.
///
/// The heap owns its [`VmManager`]; extension is the only way new address
/// space enters the block list, and dropping the heap returns every
/// reservation to the OS.
///
/// # Example
/// ```
/// use block_heap::{Heap, HeapConfig};
///
/// let heap = Heap::new(&HeapConfig::default()).unwrap();
///
/// let p = heap.allocate(1024).unwrap();
/// assert_eq!(p.as_ptr() as usize % 8, 0);
/// assert_eq!(heap.stats().allocated_bytes, 1024);
///
/// heap.free(p).unwrap();
/// assert_eq!(heap.stats().allocated_bytes, 0);
/// ```
pub struct Heap {
    inner: Mutex<HeapState>,
    concurrent: bool,
}

impl Heap {
    /// Creates a heap with `config.initial_pages` pages reserved up front
    /// as a single FREE block.
    pub fn new(config: &HeapConfig) -> Result<Self, HeapError> {
        config.validate()?;

        let mut vm = VmManager::new();
        let initial = config.initial_pages * page_size();
        let start = vm
            .reserve(initial)
            .map_err(|source| HeapError::OutOfMemory {
                requested: initial,
                source,
            })?;

        // If block creation fails the VmManager drop unmaps the range.
        let mut blocks = BlockList::new();
        let id = blocks.create(start, initial, BlockState::Free)?;
        blocks.insert_sorted(id);

        tracing::info!(
            initial_bytes = initial,
            policy = %config.policy,
            concurrent = config.concurrent,
            "heap created"
        );

        Ok(Self {
            concurrent: config.concurrent,
            inner: Mutex::new(HeapState {
                vm,
                blocks,
                total_allocated: 0,
                total_free: initial,
                peak_allocated: 0,
                total_allocs: 0,
                total_frees: 0,
                failed_allocs: 0,
                policy: config.policy,
                trace: (config.trace_capacity > 0).then(|| TraceRing::new(config.trace_capacity)),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, HeapState> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Allocates `size` bytes, rounded up to an 8-byte multiple.
    ///
    /// Searches the block list under the configured policy, extending the
    /// heap with a fresh reservation when nothing fits. The selected block
    /// is split so exactly the rounded size is handed out. On extension
    /// failure no counter changes and the error is returned.
    #[track_caller]
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, HeapError> {
        let caller = Location::caller();
        if size == 0 {
            return Err(HeapError::InvalidArgument(
                "allocation size must be nonzero".into(),
            ));
        }
        let aligned = align_up(size, ALIGN_SIZE);

        let mut s = self.state();

        let id = match find_free_block(&s.blocks, aligned, s.policy) {
            Some(id) => id,
            None => {
                tracing::debug!(aligned, "no free block found, extending heap");
                if let Err(e) = extend(&mut s, aligned) {
                    s.failed_allocs += 1;
                    return Err(e);
                }
                find_free_block(&s.blocks, aligned, s.policy).ok_or_else(|| {
                    HeapError::Corruption("no free block immediately after extension".into())
                })?
            }
        };

        if s.blocks.get(id).size > aligned {
            s.blocks.split(id, aligned)?;
        }

        let block = s.blocks.get_mut(id);
        block.state = BlockState::Allocated;
        let start = block.start;
        let granted = block.size;

        s.total_allocated += granted;
        s.total_free -= granted;
        if s.total_allocated > s.peak_allocated {
            s.peak_allocated = s.total_allocated;
        }
        s.total_allocs += 1;
        if let Some(ring) = s.trace.as_mut() {
            ring.record(TraceKind::Alloc, start, granted, caller);
        }

        tracing::debug!(
            size,
            granted,
            addr = start,
            "allocated block"
        );

        NonNull::new(start as *mut u8)
            .ok_or_else(|| HeapError::Corruption("block recorded at null address".into()))
    }

    /// Frees a previously allocated pointer.
    ///
    /// Fails with [`HeapError::NotFound`] if the address lies inside no
    /// block and [`HeapError::DoubleFree`] if the containing block is
    /// already FREE; the heap is unchanged in both cases. On success the
    /// block is merged with FREE neighbours, right side first.
    #[track_caller]
    pub fn free(&self, ptr: NonNull<u8>) -> Result<(), HeapError> {
        let caller = Location::caller();
        let addr = ptr.as_ptr() as usize;

        let mut s = self.state();

        let id = s
            .blocks
            .iter()
            .find(|(_, b)| b.contains(addr))
            .map(|(id, _)| id)
            .ok_or(HeapError::NotFound { addr })?;

        if s.blocks.get(id).state != BlockState::Allocated {
            return Err(HeapError::DoubleFree { addr });
        }

        let block = s.blocks.get_mut(id);
        block.state = BlockState::Free;
        let start = block.start;
        let released = block.size;

        s.total_allocated -= released;
        s.total_free += released;
        s.total_frees += 1;
        if let Some(ring) = s.trace.as_mut() {
            ring.record(TraceKind::Free, start, released, caller);
        }

        // Coalesce with the right neighbour, then the left.
        if let Some(next) = s.blocks.get(id).next {
            if s.blocks.get(next).state == BlockState::Free
                && s.blocks.get(id).is_adjacent_to(s.blocks.get(next))
            {
                s.blocks.merge(id, next)?;
            }
        }
        if let Some(prev) = s.blocks.get(id).prev {
            if s.blocks.get(prev).state == BlockState::Free
                && s.blocks.get(prev).is_adjacent_to(s.blocks.get(id))
            {
                s.blocks.merge(prev, id)?;
            }
        }

        tracing::debug!(
            addr,
            released,
            "freed block"
        );
        Ok(())
    }

    /// Returns the block containing `addr`, if any.
    pub fn find_block(&self, addr: usize) -> Option<BlockInfo> {
        let s = self.state();
        s.blocks
            .iter()
            .find(|(_, b)| b.contains(addr))
            .map(|(_, b)| BlockInfo {
                start: b.start,
                size: b.size,
                state: b.state,
            })
    }

    /// Policy-directed search for a FREE block of at least `size` bytes
    /// (rounded up to the allocation granularity). No state changes.
    pub fn find_free_block(&self, size: usize) -> Option<BlockInfo> {
        let aligned = align_up(size.max(1), ALIGN_SIZE);
        let s = self.state();
        find_free_block(&s.blocks, aligned, s.policy).map(|id| {
            let b = s.blocks.get(id);
            BlockInfo {
                start: b.start,
                size: b.size,
                state: b.state,
            }
        })
    }

    /// Single coalescing pass over the whole list; returns the number of
    /// merges performed.
    pub fn merge_free_blocks(&self) -> usize {
        let mut s = self.state();
        let mut merges = 0;

        let mut cur = s.blocks.head();
        while let Some(id) = cur {
            let next = s.blocks.get(id).next;
            if let Some(n) = next {
                let (a, b) = (*s.blocks.get(id), *s.blocks.get(n));
                if a.state == BlockState::Free
                    && b.state == BlockState::Free
                    && a.is_adjacent_to(&b)
                    && s.blocks.merge(id, n).is_ok()
                {
                    merges += 1;
                    // Stay on this block and re-check its new neighbour.
                    continue;
                }
            }
            cur = next;
        }
        merges
    }

    /// Snapshot of the heap accounting.
    pub fn stats(&self) -> HeapStats {
        let s = self.state();
        HeapStats {
            allocated_bytes: s.total_allocated,
            free_bytes: s.total_free,
            peak_allocated_bytes: s.peak_allocated,
            block_count: s.blocks.len(),
            reservation_count: s.vm.region_count(),
            reserved_bytes: s.vm.total_reserved(),
            total_allocs: s.total_allocs,
            total_frees: s.total_frees,
            failed_allocs: s.failed_allocs,
        }
    }

    /// Re-derives every heap invariant from the raw block list and
    /// reports the first disagreement.
    pub fn verify(&self) -> Result<(), HeapError> {
        let s = self.state();

        let mut counted_allocated = 0usize;
        let mut counted_free = 0usize;
        let mut count = 0usize;
        let mut prev: Option<(BlockId, usize, usize, BlockState)> = None;

        for (id, b) in s.blocks.iter() {
            b.verify()?;

            if b.prev != prev.map(|(pid, ..)| pid) {
                return Err(HeapError::Corruption(format!(
                    "broken back-link at block {:#x}",
                    b.start
                )));
            }
            if let Some((_, pstart, pend, pstate)) = prev {
                if pstart >= b.start {
                    return Err(HeapError::Corruption(format!(
                        "blocks out of address order at {:#x}",
                        b.start
                    )));
                }
                if pstate == BlockState::Free && b.state == BlockState::Free && pend == b.start {
                    return Err(HeapError::Corruption(format!(
                        "adjacent free blocks at {pstart:#x} and {:#x}",
                        b.start
                    )));
                }
            }

            match b.state {
                BlockState::Free => counted_free += b.size,
                BlockState::Allocated => counted_allocated += b.size,
            }
            count += 1;
            prev = Some((id, b.start, b.end(), b.state));
        }

        if count != s.blocks.len() {
            return Err(HeapError::Corruption(format!(
                "block count mismatch: list has {count}, recorded {}",
                s.blocks.len()
            )));
        }
        if counted_allocated != s.total_allocated || counted_free != s.total_free {
            return Err(HeapError::Corruption(format!(
                "statistics mismatch: counted {counted_allocated}/{counted_free}, \
                 recorded {}/{}",
                s.total_allocated, s.total_free
            )));
        }

        tracing::debug!("heap verify ok");
        Ok(())
    }

    /// Renders the full heap layout (blocks, reservations, trace) as
    /// diagnostic text.
    pub fn render_dump(&self) -> String {
        let s = self.state();
        let mut out = String::new();
        let _ = writeln!(out, "=== Heap Dump ===");
        let _ = writeln!(out, "Policy: {}", s.policy);
        let _ = writeln!(
            out,
            "Concurrent callers: {}",
            if self.concurrent { "enabled" } else { "disabled" }
        );
        let _ = writeln!(out, "Blocks: {}", s.blocks.len());
        let _ = writeln!(out, "Allocated: {} bytes", s.total_allocated);
        let _ = writeln!(out, "Free: {} bytes", s.total_free);
        let _ = writeln!(out, "Peak: {} bytes", s.peak_allocated);
        for (i, (_, b)) in s.blocks.iter().enumerate() {
            let _ = writeln!(
                out,
                "[Block {i}] addr={:#x} size={} state={}",
                b.start,
                b.size,
                b.state.as_str(),
            );
        }
        out.push('\n');
        out.push_str(&s.vm.render_dump());
        if let Some(ring) = &s.trace {
            out.push('\n');
            out.push_str(&ring.render());
        }
        out
    }

    /// Writes [`render_dump`](Self::render_dump) to standard error.
    pub fn dump(&self) {
        eprintln!("{}", self.render_dump());
    }

    /// Current free-block selection policy.
    pub fn policy(&self) -> Policy {
        self.state().policy
    }

    /// Switches the free-block selection policy for subsequent
    /// allocations.
    pub fn set_policy(&self, policy: Policy) {
        self.state().policy = policy;
        tracing::info!(%policy, "allocation policy changed");
    }

    /// Number of blocks in the list.
    pub fn block_count(&self) -> usize {
        self.state().blocks.len()
    }

    /// Whether the heap was configured for concurrent callers.
    pub fn concurrent(&self) -> bool {
        self.concurrent
    }

    /// Resizes the alloc/free trace ring; 0 disables tracing.
    pub fn set_trace_capacity(&self, capacity: usize) {
        let mut s = self.state();
        s.trace = (capacity > 0).then(|| TraceRing::new(capacity));
    }

    /// Copies out the recorded trace events, oldest first.
    pub fn trace_events(&self) -> Vec<crate::TraceEvent> {
        let s = self.state();
        s.trace
            .as_ref()
            .map(|ring| ring.events().cloned().collect())
            .unwrap_or_default()
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        let s = match self.inner.get_mut() {
            Ok(s) => s,
            Err(p) => p.into_inner(),
        };
        if s.total_allocated > 0 {
            tracing::warn!(
                leaked_bytes = s.total_allocated,
                peak_bytes = s.peak_allocated,
                "heap dropped with live allocations"
            );
        }
        s.blocks = BlockList::new();
        s.vm.release_all();
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.state();
        f.debug_struct("Heap")
            .field("policy", &s.policy)
            .field("blocks", &s.blocks.len())
            .field("allocated_bytes", &s.total_allocated)
            .field("free_bytes", &s.total_free)
            .finish()
    }
}

/// Reserves a fresh range of at least one page (and at least `need`
/// bytes, rounded up to pages) and links it into the list as one FREE
/// block. Nothing changes on failure.
fn extend(s: &mut HeapState, need: usize) -> Result<(), HeapError> {
    let page = page_size();
    let len = need.div_ceil(page) * page;

    let start = s.vm.reserve(len).map_err(|source| HeapError::OutOfMemory {
        requested: need,
        source,
    })?;

    let id = match s.blocks.create(start, len, BlockState::Free) {
        Ok(id) => id,
        Err(e) => {
            let _ = s.vm.release(start, len);
            return Err(e);
        }
    };
    s.blocks.insert_sorted(id);
    s.total_free += len;

    tracing::debug!(
        len,
        addr = start,
        "heap extended"
    );
    Ok(())
}
