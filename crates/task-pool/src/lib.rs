// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # task-pool
//!
//! A bounded-queue worker thread pool with cleanup-aware task lifecycle
//! and a quiescence (`wait_all`) primitive.
//!
//! # Key Components
//!
//! - [`ThreadPool`] — worker lifecycle, the Created → Running → Stopping
//!   → Stopped state machine, submit, wait-for-quiescence, destroy, and
//!   dynamic resizing.
//! - [`TaskQueue`] — a single FIFO shared by many producers and many
//!   consumers: bounded capacity with producer backpressure, consumer
//!   blocking on empty, and an `all_done` signal fired only when both
//!   the queue and the active-task set are empty.
//! - [`PoolConfig`] — worker count, queue bound, stack size, daemon flag;
//!   TOML-loadable.
//! - [`PoolSnapshot`] / [`QueueStats`] — diagnostics taken under the
//!   relevant mutex.
//!
//! # Task lifecycle
//!
//! A task is a single-shot closure owning its state. The state's drop is
//! the cleanup and runs exactly once: after the closure returns (or
//! unwinds), or when an unexecuted task is discarded at destroy time.
//! The pool is fire-and-forget; it provides no result futures.
//!
//! # Example
//! ```
//! use task_pool::{PoolConfig, ThreadPool};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let pool = ThreadPool::new(PoolConfig::with_threads(2)).unwrap();
//! let hits = Arc::new(AtomicUsize::new(0));
//!
//! for _ in 0..8 {
//!     let hits = Arc::clone(&hits);
//!     pool.submit(move || {
//!         hits.fetch_add(1, Ordering::SeqCst);
//!     })
//!     .unwrap();
//! }
//!
//! pool.wait_all();
//! assert_eq!(hits.load(Ordering::SeqCst), 8);
//! pool.shutdown();
//! ```

mod config;
mod error;
mod pool;
mod queue;
mod snapshot;
mod task;
mod worker;

pub use config::PoolConfig;
pub use error::PoolError;
pub use pool::{PoolState, ThreadPool};
pub use queue::{PopOutcome, QueueStats, TaskQueue};
pub use snapshot::{PoolSnapshot, WorkerSnapshot};
pub use worker::WorkerInfo;
