// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The thread pool: worker lifecycle and the pool state machine.
//!
//! ```text
//! Created ──new()──▶ Running ──destroy()──▶ Stopping ──joined──▶ Stopped
//!                       │
//!                       └──shutdown()──▶ (wait_all, then destroy)
//! ```
//!
//! One mutex guards the state and the worker table; the queue has its
//! own. The two are never held together: flows that touch both (destroy,
//! resize) update flags under the state mutex, release it, broadcast on
//! the queue, and re-acquire the state mutex only to publish the result.

use crate::queue::TaskQueue;
use crate::snapshot::{PoolSnapshot, WorkerSnapshot};
use crate::worker::{self, Worker};
use crate::{PoolConfig, PoolError, QueueStats};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Lifecycle state of a [`ThreadPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolState {
    Created,
    Running,
    Stopping,
    Stopped,
}

impl PoolState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolState::Created => "created",
            PoolState::Running => "running",
            PoolState::Stopping => "stopping",
            PoolState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct PoolCore {
    state: PoolState,
    workers: Vec<Worker>,
}

/// A fixed-then-resizable set of worker threads consuming from one
/// bounded queue.
///
/// # Example
/// ```
/// use task_pool::{PoolConfig, ThreadPool};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let pool = ThreadPool::new(PoolConfig::with_threads(4)).unwrap();
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// for _ in 0..50 {
///     let counter = Arc::clone(&counter);
///     pool.submit(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     })
///     .unwrap();
/// }
///
/// pool.wait_all();
/// assert_eq!(counter.load(Ordering::SeqCst), 50);
/// ```
pub struct ThreadPool {
    config: PoolConfig,
    queue: Arc<TaskQueue>,
    shutdown: Arc<AtomicBool>,
    core: Mutex<PoolCore>,
    state_changed: Condvar,
}

impl ThreadPool {
    /// Creates the pool and spawns every worker.
    ///
    /// If a spawn fails mid-way, everything built so far is torn down:
    /// the already-running workers are signalled and joined, and the
    /// error is returned.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let num_threads = config.resolve_threads();

        tracing::info!(
            num_threads,
            queue_size = config.queue_size,
            daemon = config.daemon_threads,
            "creating thread pool"
        );

        let pool = Self {
            queue: Arc::new(TaskQueue::new(config.queue_size)),
            shutdown: Arc::new(AtomicBool::new(false)),
            core: Mutex::new(PoolCore {
                state: PoolState::Created,
                workers: Vec::with_capacity(num_threads),
            }),
            state_changed: Condvar::new(),
            config,
        };

        let mut workers = Vec::with_capacity(num_threads);
        for index in 0..num_threads {
            match worker::spawn(
                index,
                Arc::clone(&pool.queue),
                Arc::clone(&pool.shutdown),
                pool.config.stack_size,
                pool.config.daemon_threads,
            ) {
                Ok(w) => workers.push(w),
                Err(e) => {
                    tracing::error!(worker = index, %e, "worker spawn failed, tearing down");
                    pool.shutdown.store(true, Ordering::Release);
                    pool.queue.wake_all();
                    for mut w in workers {
                        if let Some(handle) = w.handle.take() {
                            let _ = handle.join();
                        }
                    }
                    return Err(e);
                }
            }
        }

        {
            let mut core = pool.lock_core();
            core.workers = workers;
            core.state = PoolState::Running;
            pool.state_changed.notify_all();
        }

        tracing::info!("thread pool running");
        Ok(pool)
    }

    fn lock_core(&self) -> MutexGuard<'_, PoolCore> {
        self.core.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Submits a job; refused unless the pool is running.
    ///
    /// Blocks when the queue is bounded and full (backpressure).
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let core = self.lock_core();
            if core.state != PoolState::Running {
                return Err(PoolError::WrongState {
                    state: core.state,
                    expected: PoolState::Running,
                });
            }
        }
        // State mutex released before touching the queue mutex.
        self.queue.submit(job)
    }

    /// Blocks until every submitted task has finished: nothing queued and
    /// nothing executing.
    pub fn wait_all(&self) {
        self.queue.wait_empty();
    }

    /// Stops the pool: raises the shutdown flag, wakes every waiting
    /// worker, joins them (workers drain the queue before exiting),
    /// discards whatever is left, and publishes `Stopped`.
    ///
    /// Idempotent; a concurrent second caller blocks until the teardown
    /// in progress finishes.
    pub fn destroy(&self) {
        {
            let mut core = self.lock_core();
            match core.state {
                PoolState::Stopped => return,
                PoolState::Stopping => {
                    while core.state != PoolState::Stopped {
                        core = self
                            .state_changed
                            .wait(core)
                            .unwrap_or_else(|p| p.into_inner());
                    }
                    return;
                }
                PoolState::Created | PoolState::Running => {
                    core.state = PoolState::Stopping;
                    self.state_changed.notify_all();
                }
            }
        }

        tracing::info!("destroying thread pool");
        self.shutdown.store(true, Ordering::Release);
        self.queue.wake_all();

        let mut workers = {
            let mut core = self.lock_core();
            std::mem::take(&mut core.workers)
        };
        for w in &mut workers {
            if let Some(handle) = w.handle.take() {
                if handle.join().is_err() {
                    tracing::error!(worker = w.info.index(), "worker thread panicked");
                }
            }
        }
        self.queue.drain();

        let mut core = self.lock_core();
        core.workers = workers;
        core.state = PoolState::Stopped;
        self.state_changed.notify_all();
        drop(core);

        tracing::info!("thread pool stopped");
    }

    /// Graceful stop: waits for quiescence, then destroys the pool.
    /// In-flight and queued work always completes.
    pub fn shutdown(&self) {
        tracing::info!("shutting down thread pool gracefully");
        self.wait_all();
        self.destroy();
    }

    /// Grows or shrinks the worker set to `new_size`.
    pub fn resize(&self, new_size: usize) -> Result<(), PoolError> {
        if new_size == 0 {
            return Err(PoolError::InvalidConfig(
                "pool size must be at least 1".into(),
            ));
        }

        let current = {
            let core = self.lock_core();
            if core.state != PoolState::Running {
                return Err(PoolError::WrongState {
                    state: core.state,
                    expected: PoolState::Running,
                });
            }
            core.workers.len()
        };

        match new_size.cmp(&current) {
            std::cmp::Ordering::Equal => Ok(()),
            std::cmp::Ordering::Greater => self.grow(new_size),
            std::cmp::Ordering::Less => self.shrink(new_size),
        }
    }

    /// Spawns additional workers up to `new_size`. On a mid-way spawn
    /// failure the partially spawned tail is signalled, woken, joined,
    /// and the worker count rolls back to its pre-grow value.
    fn grow(&self, new_size: usize) -> Result<(), PoolError> {
        let mut core = self.lock_core();
        if core.state != PoolState::Running {
            return Err(PoolError::WrongState {
                state: core.state,
                expected: PoolState::Running,
            });
        }
        let current = core.workers.len();
        tracing::info!(from = current, to = new_size, "growing thread pool");

        for index in current..new_size {
            match worker::spawn(
                index,
                Arc::clone(&self.queue),
                Arc::clone(&self.shutdown),
                self.config.stack_size,
                self.config.daemon_threads,
            ) {
                Ok(w) => core.workers.push(w),
                Err(e) => {
                    tracing::error!(worker = index, %e, "spawn failed, rolling back grow");
                    let mut tail: Vec<Worker> = core.workers.drain(current..).collect();
                    for w in &tail {
                        w.info.request_exit();
                    }
                    drop(core);
                    self.queue.wake_all();
                    for w in &mut tail {
                        if let Some(handle) = w.handle.take() {
                            let _ = handle.join();
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Asks the trailing workers to exit, wakes them, joins them, and
    /// publishes the reduced count. A worker running a task completes it
    /// before observing the flag.
    fn shrink(&self, new_size: usize) -> Result<(), PoolError> {
        let mut tail = {
            let mut core = self.lock_core();
            if core.state != PoolState::Running {
                return Err(PoolError::WrongState {
                    state: core.state,
                    expected: PoolState::Running,
                });
            }
            if new_size >= core.workers.len() {
                return Ok(());
            }
            tracing::info!(
                from = core.workers.len(),
                to = new_size,
                "shrinking thread pool"
            );
            let tail: Vec<Worker> = core.workers.drain(new_size..).collect();
            for w in &tail {
                w.info.request_exit();
            }
            tail
        };

        // State mutex released; broadcast on the queue so sleepers
        // re-check their exit flags.
        self.queue.wake_all();
        for w in &mut tail {
            if let Some(handle) = w.handle.take() {
                if handle.join().is_err() {
                    tracing::error!(worker = w.info.index(), "worker thread panicked");
                }
            }
        }
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        self.lock_core().state
    }

    /// Current worker count.
    pub fn num_threads(&self) -> usize {
        self.lock_core().workers.len()
    }

    /// Snapshot of the queue accounting.
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Point-in-time view of the pool: state, workers, pending tasks.
    pub fn snapshot(&self) -> PoolSnapshot {
        let (state, workers) = {
            let core = self.lock_core();
            let workers: Vec<WorkerSnapshot> = core
                .workers
                .iter()
                .map(|w| WorkerSnapshot {
                    index: w.info.index(),
                    tasks_completed: w.info.tasks_completed(),
                    active: w.info.is_active(),
                })
                .collect();
            (core.state, workers)
        };
        // Queue mutex taken only after the state mutex is released.
        let pending_tasks = self.queue.len();

        PoolSnapshot {
            state,
            num_threads: workers.len(),
            pending_tasks,
            workers,
        }
    }

    /// Writes the pool snapshot to standard error.
    pub fn print_info(&self) {
        eprintln!("{}", self.snapshot().render());
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.lock_core();
        f.debug_struct("ThreadPool")
            .field("state", &core.state)
            .field("num_threads", &core.workers.len())
            .field("queue_size", &self.config.queue_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_create_and_destroy() {
        let pool = ThreadPool::new(PoolConfig::with_threads(2)).unwrap();
        assert_eq!(pool.state(), PoolState::Running);
        assert_eq!(pool.num_threads(), 2);

        pool.destroy();
        assert_eq!(pool.state(), PoolState::Stopped);
    }

    #[test]
    fn test_submit_runs_tasks() {
        let pool = ThreadPool::new(PoolConfig::with_threads(4)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.wait_all();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_submit_after_destroy_is_refused() {
        let pool = ThreadPool::new(PoolConfig::with_threads(1)).unwrap();
        pool.destroy();

        let err = pool.submit(|| {}).unwrap_err();
        assert!(matches!(
            err,
            PoolError::WrongState {
                state: PoolState::Stopped,
                ..
            }
        ));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let pool = ThreadPool::new(PoolConfig::with_threads(2)).unwrap();
        pool.destroy();
        pool.destroy();
        assert_eq!(pool.state(), PoolState::Stopped);
    }

    #[test]
    fn test_shutdown_finishes_in_flight_work() {
        let pool = ThreadPool::new(PoolConfig::with_threads(2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                std::thread::sleep(Duration::from_millis(10));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(pool.state(), PoolState::Stopped);
    }

    #[test]
    fn test_snapshot_reports_workers() {
        let pool = ThreadPool::new(PoolConfig::with_threads(3)).unwrap();
        let snap = pool.snapshot();

        assert_eq!(snap.state, PoolState::Running);
        assert_eq!(snap.num_threads, 3);
        assert_eq!(snap.workers.len(), 3);
        assert!(snap.render().contains("running"));
    }

    #[test]
    fn test_invalid_resize_to_zero() {
        let pool = ThreadPool::new(PoolConfig::with_threads(2)).unwrap();
        assert!(matches!(
            pool.resize(0),
            Err(PoolError::InvalidConfig(_))
        ));
    }
}
