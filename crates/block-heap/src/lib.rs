// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # block-heap
//!
//! A user-space `malloc`/`free`-style allocator built on page-granular
//! VM reservations from the `vm-reserve` crate.
//!
//! # Key Components
//!
//! - [`Heap`] — owns the address-ordered block list, the statistics, the
//!   allocation policy, and a single mutex; allocate, free, verify, dump.
//! - [`BlockList`] / [`Block`] — arena-backed block metadata with stable
//!   indices instead of raw pointers; split and merge keep the list
//!   address-sorted by construction.
//! - [`Policy`] — FIRST_FIT / BEST_FIT / WORST_FIT free-block selection.
//! - The [`global`] facade — one lazily initialised heap per process,
//!   exposed as [`alloc`]/[`free`]/[`stats`]/[`verify`]/[`dump`].
//! - [`TraceRing`] — optional bounded ring recording each alloc/free with
//!   the caller's file and line.
//!
//! # Guarantees
//!
//! Returned addresses are 8-byte aligned, live allocations never overlap,
//! stats return to their pre-allocation values after every matching free,
//! and exhaustion of the address space surfaces as an error rather than a
//! panic.
//!
//! # Example
//! ```
//! use block_heap::{Heap, HeapConfig};
//!
//! let heap = Heap::new(&HeapConfig::default()).unwrap();
//!
//! let p = heap.allocate(100).unwrap();
//! heap.verify().unwrap();
//! heap.free(p).unwrap();
//! assert_eq!(heap.stats().allocated_bytes, 0);
//! ```

mod block;
mod config;
mod error;
pub mod global;
mod heap;
mod policy;
mod stats;
mod trace;

pub use block::{Block, BlockId, BlockList, BlockState, ALIGN_SIZE};
pub use config::HeapConfig;
pub use error::HeapError;
pub use global::{alloc, cleanup, dump, free, init, init_with, stats, verify};
pub use heap::{BlockInfo, Heap};
pub use policy::Policy;
pub use stats::HeapStats;
pub use trace::{TraceEvent, TraceKind, TraceRing};
