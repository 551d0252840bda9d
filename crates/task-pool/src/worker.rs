// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Worker threads: spawn, main loop, exit.

use crate::queue::{PopOutcome, TaskQueue};
use crate::PoolError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Per-worker bookkeeping, shared between the pool and the worker thread.
#[derive(Debug)]
pub struct WorkerInfo {
    index: usize,
    tasks_completed: AtomicU64,
    is_active: AtomicBool,
    should_exit: AtomicBool,
}

impl WorkerInfo {
    fn new(index: usize) -> Self {
        Self {
            index,
            tasks_completed: AtomicU64::new(0),
            is_active: AtomicBool::new(false),
            should_exit: AtomicBool::new(false),
        }
    }

    /// Index assigned at spawn time.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Tasks this worker has completed.
    pub fn tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::Relaxed)
    }

    /// Whether the worker is currently inside a task.
    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Acquire)
    }

    /// Asks this worker to exit after its current task; used by shrink
    /// and by grow's rollback path.
    pub(crate) fn request_exit(&self) {
        self.should_exit.store(true, Ordering::Release);
    }

    fn should_exit(&self) -> bool {
        self.should_exit.load(Ordering::Acquire)
    }
}

/// One spawned worker: its shared info plus the join handle (absent for
/// daemon workers, which are detached).
pub(crate) struct Worker {
    pub(crate) info: Arc<WorkerInfo>,
    pub(crate) handle: Option<JoinHandle<()>>,
}

/// Spawns worker `index` consuming from `queue`.
pub(crate) fn spawn(
    index: usize,
    queue: Arc<TaskQueue>,
    shutdown: Arc<AtomicBool>,
    stack_size: Option<usize>,
    daemon: bool,
) -> Result<Worker, PoolError> {
    let info = Arc::new(WorkerInfo::new(index));

    let mut builder = std::thread::Builder::new().name(format!("task-pool-worker-{index}"));
    if let Some(size) = stack_size {
        builder = builder.stack_size(size);
    }

    let handle = {
        let info = Arc::clone(&info);
        builder.spawn(move || worker_main(queue, shutdown, info))?
    };

    Ok(Worker {
        info,
        handle: (!daemon).then_some(handle),
    })
}

/// The worker main loop.
///
/// The stop predicate handed to the queue reads both the pool-wide
/// shutdown flag and this worker's own exit flag through shared memory,
/// so a flag raised while the worker sleeps inside the `not_empty` wait
/// is observed on the very next wakeup.
fn worker_main(queue: Arc<TaskQueue>, shutdown: Arc<AtomicBool>, info: Arc<WorkerInfo>) {
    tracing::info!(worker = info.index, "worker started");

    loop {
        if info.should_exit() {
            tracing::debug!(worker = info.index, "worker exiting as requested");
            break;
        }

        info.is_active.store(true, Ordering::Release);
        let start = Instant::now();

        let outcome = queue.pop_and_execute(|| {
            shutdown.load(Ordering::Acquire) || info.should_exit()
        });

        match outcome {
            PopOutcome::Shutdown => {
                info.is_active.store(false, Ordering::Release);
                tracing::debug!(worker = info.index, "worker observed shutdown");
                break;
            }
            PopOutcome::Executed => {
                info.tasks_completed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    worker = info.index,
                    elapsed = ?start.elapsed(),
                    "task completed"
                );
            }
        }

        info.is_active.store(false, Ordering::Release);
    }

    tracing::info!(
        worker = info.index,
        completed = info.tasks_completed(),
        "worker exited"
    );
}
