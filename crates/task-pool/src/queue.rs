// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bounded FIFO task queue with backpressure and a quiescence signal.
//!
//! One mutex guards the queue state; three condition variables carry the
//! protocol:
//!
//! - `not_empty` — guarded predicate "a task is available or the consumer
//!   should stop"; signalled on every enqueue, broadcast on close.
//! - `not_full` — guarded predicate "there is room below the capacity";
//!   signalled on every dequeue of a bounded queue.
//! - `all_done` — guarded predicate "no task is queued and no task is
//!   executing"; broadcast when a worker retires the last task.
//!
//! Every wait sits in a predicate loop (spurious wakeups are harmless)
//! and every signal is issued while the mutex is held, so wakeups cannot
//! be lost.
//!
//! # Counter definitions
//!
//! - `total_enqueued` counts successful submissions.
//! - `total_dequeued` counts tasks fully *retired*: executed to
//!   completion (cleanup included) or discarded at drain. With this
//!   definition `total_enqueued == pending + active_tasks +
//!   total_dequeued` holds at every instant under the mutex.
//! - `total_processed` counts tasks whose function ran;
//!   [`pop_and_execute`](TaskQueue::pop_and_execute) is the only
//!   counting site.

use crate::task::Task;
use crate::PoolError;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, MutexGuard};

/// What a worker step observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopOutcome {
    /// A task was dequeued, executed, and retired.
    Executed,
    /// The stop predicate held with an empty queue; the worker should
    /// exit.
    Shutdown,
}

/// A point-in-time snapshot of queue accounting, taken under the queue
/// mutex.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    /// Tasks waiting in the queue.
    pub pending: usize,
    /// Capacity bound; 0 means unbounded.
    pub capacity: usize,
    /// Tasks dequeued but not yet finished (cleanup included).
    pub active_tasks: usize,
    /// Successful submissions.
    pub total_enqueued: u64,
    /// Tasks fully retired (executed or discarded at drain).
    pub total_dequeued: u64,
    /// Tasks whose function ran.
    pub total_processed: u64,
}

impl QueueStats {
    /// Returns a human-readable one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "Queue: {} pending (capacity {}), {} active, \
             {} enqueued / {} retired / {} processed",
            self.pending,
            self.capacity,
            self.active_tasks,
            self.total_enqueued,
            self.total_dequeued,
            self.total_processed,
        )
    }
}

struct QueueState {
    tasks: VecDeque<Task>,
    capacity: usize,
    active_tasks: usize,
    total_enqueued: u64,
    total_dequeued: u64,
    total_processed: u64,
    closed: bool,
}

/// Multi-producer multi-consumer FIFO with bounded capacity and a
/// reliable all-done signal.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    all_done: Condvar,
}

impl TaskQueue {
    /// Creates a queue with the given capacity; 0 means unbounded.
    pub fn new(capacity: usize) -> Self {
        tracing::debug!(capacity, "task queue created");
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                capacity,
                active_tasks: 0,
                total_enqueued: 0,
                total_dequeued: 0,
                total_processed: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            all_done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Submits a job to the back of the queue.
    ///
    /// When the queue is bounded and full, the caller blocks on
    /// `not_full` until a consumer makes room — this is the backpressure
    /// contract. A closed queue refuses the job (its captured state drops
    /// immediately).
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(Task::new(job))
    }

    pub(crate) fn push(&self, task: Task) -> Result<(), PoolError> {
        let mut s = self.lock();
        while s.capacity > 0 && s.tasks.len() >= s.capacity && !s.closed {
            tracing::debug!(
                pending = s.tasks.len(),
                capacity = s.capacity,
                "queue full, producer waiting"
            );
            s = self.not_full.wait(s).unwrap_or_else(|p| p.into_inner());
        }
        if s.closed {
            return Err(PoolError::QueueClosed);
        }

        s.tasks.push_back(task);
        s.total_enqueued += 1;
        // One task, one consumer: a single wake is enough.
        self.not_empty.notify_one();
        Ok(())
    }

    /// The canonical worker step: wait for a task, run it outside the
    /// lock, retire it.
    ///
    /// `should_stop` is re-evaluated on every wakeup, so a stop flag
    /// raised while the worker sleeps inside the wait is observed the
    /// next time the condition variable fires. Returns
    /// [`PopOutcome::Shutdown`] only when the queue is empty and the
    /// predicate holds — pending tasks are always drained first.
    pub fn pop_and_execute<F>(&self, should_stop: F) -> PopOutcome
    where
        F: Fn() -> bool,
    {
        let mut s = self.lock();
        while s.tasks.is_empty() && !should_stop() && !s.closed {
            s = self.not_empty.wait(s).unwrap_or_else(|p| p.into_inner());
        }

        let Some(task) = s.tasks.pop_front() else {
            return PopOutcome::Shutdown;
        };
        s.active_tasks += 1;
        if s.capacity > 0 {
            self.not_full.notify_one();
        }
        drop(s);

        // Run outside the lock; a panicking job must not poison the
        // queue or skip the accounting below. The unwind drops the job's
        // captured state, so cleanup still happens exactly once.
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| task.run())) {
            let msg = payload
                .downcast_ref::<&str>()
                .copied()
                .map(str::to_owned)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".into());
            tracing::error!(panic = %msg, "task panicked");
        }

        let mut s = self.lock();
        s.active_tasks -= 1;
        s.total_dequeued += 1;
        s.total_processed += 1;
        if s.tasks.is_empty() && s.active_tasks == 0 {
            self.all_done.notify_all();
        }
        PopOutcome::Executed
    }

    /// Blocks until the queue is quiescent: nothing pending and nothing
    /// executing.
    pub fn wait_empty(&self) {
        let mut s = self.lock();
        while !s.tasks.is_empty() || s.active_tasks > 0 {
            tracing::debug!(
                pending = s.tasks.len(),
                active = s.active_tasks,
                "waiting for quiescence"
            );
            s = self.all_done.wait(s).unwrap_or_else(|p| p.into_inner());
        }
    }

    /// Number of tasks currently waiting.
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    /// Capacity bound; 0 means unbounded.
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Snapshot of the queue accounting.
    pub fn stats(&self) -> QueueStats {
        let s = self.lock();
        QueueStats {
            pending: s.tasks.len(),
            capacity: s.capacity,
            active_tasks: s.active_tasks,
            total_enqueued: s.total_enqueued,
            total_dequeued: s.total_dequeued,
            total_processed: s.total_processed,
        }
    }

    /// Wakes every consumer blocked on `not_empty` so it can re-check its
    /// stop predicate. The lock is taken first so the wake cannot race
    /// ahead of a flag written just before the call.
    pub(crate) fn wake_all(&self) {
        let _s = self.lock();
        self.not_empty.notify_all();
    }

    /// Closes the queue and discards every pending task, dropping each
    /// one (which runs its cleanup). Returns the number discarded.
    /// Sleepers on all three condition variables are woken.
    pub(crate) fn drain(&self) -> usize {
        let mut s = self.lock();
        s.closed = true;
        let discarded: Vec<Task> = s.tasks.drain(..).collect();
        s.total_dequeued += discarded.len() as u64;

        self.not_empty.notify_all();
        self.not_full.notify_all();
        if s.active_tasks == 0 {
            self.all_done.notify_all();
        }
        drop(s);

        // Drop outside the lock: cleanups are caller code.
        let count = discarded.len();
        drop(discarded);
        if count > 0 {
            tracing::warn!(count, "discarded pending tasks at drain");
        }
        count
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.lock();
        f.debug_struct("TaskQueue")
            .field("pending", &s.tasks.len())
            .field("capacity", &s.capacity)
            .field("active_tasks", &s.active_tasks)
            .field("closed", &s.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = TaskQueue::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            queue.submit(move || order.lock().unwrap().push(i)).unwrap();
        }
        assert_eq!(queue.len(), 5);

        let never = AtomicBool::new(false);
        for _ in 0..5 {
            let outcome = queue.pop_and_execute(|| never.load(Ordering::Acquire));
            assert_eq!(outcome, PopOutcome::Executed);
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_accounting_identity() {
        let queue = TaskQueue::new(0);
        for _ in 0..10 {
            queue.submit(|| {}).unwrap();
        }
        for _ in 0..4 {
            queue.pop_and_execute(|| false);
        }

        let s = queue.stats();
        assert_eq!(s.total_enqueued, 10);
        assert_eq!(s.total_dequeued, 4);
        assert_eq!(s.total_processed, 4);
        assert_eq!(s.pending, 6);
        assert_eq!(s.active_tasks, 0);
        assert_eq!(
            s.total_enqueued,
            s.pending as u64 + s.active_tasks as u64 + s.total_dequeued,
        );
    }

    #[test]
    fn test_stop_predicate_returns_shutdown_on_empty() {
        let queue = TaskQueue::new(0);
        let outcome = queue.pop_and_execute(|| true);
        assert_eq!(outcome, PopOutcome::Shutdown);
    }

    #[test]
    fn test_pending_tasks_drain_before_shutdown() {
        let queue = TaskQueue::new(0);
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            queue
                .submit(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        // Stop is raised, but queued work still runs first.
        assert_eq!(queue.pop_and_execute(|| true), PopOutcome::Executed);
        assert_eq!(queue.pop_and_execute(|| true), PopOutcome::Executed);
        assert_eq!(queue.pop_and_execute(|| true), PopOutcome::Executed);
        assert_eq!(queue.pop_and_execute(|| true), PopOutcome::Shutdown);
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backpressure_blocks_producer() {
        let queue = Arc::new(TaskQueue::new(2));
        queue.submit(|| {}).unwrap();
        queue.submit(|| {}).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                // Blocks until the consumer below makes room.
                queue.submit(|| {}).unwrap();
            })
        };

        // Give the producer time to reach the wait.
        std::thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());
        assert_eq!(queue.len(), 2);

        queue.pop_and_execute(|| false);
        producer.join().unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_wait_empty_blocks_until_active_task_finishes() {
        let queue = Arc::new(TaskQueue::new(0));
        let done = Arc::new(AtomicBool::new(false));

        {
            let done = Arc::clone(&done);
            queue
                .submit(move || {
                    std::thread::sleep(Duration::from_millis(100));
                    done.store(true, Ordering::SeqCst);
                })
                .unwrap();
        }

        let worker = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.pop_and_execute(|| false))
        };

        // Let the worker dequeue so the queue is empty but a task is
        // active; wait_empty must still block until it finishes.
        std::thread::sleep(Duration::from_millis(20));
        queue.wait_empty();
        assert!(done.load(Ordering::SeqCst));

        assert_eq!(worker.join().unwrap(), PopOutcome::Executed);
    }

    #[test]
    fn test_drain_discards_and_runs_cleanup() {
        struct DropProbe(Arc<AtomicUsize>);
        impl Drop for DropProbe {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let queue = TaskQueue::new(0);
        let drops = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let probe = DropProbe(Arc::clone(&drops));
            queue
                .submit(move || {
                    let _probe = &probe;
                    unreachable!("drained task must not run");
                })
                .unwrap();
        }

        assert_eq!(queue.drain(), 4);
        assert_eq!(drops.load(Ordering::SeqCst), 4);

        let s = queue.stats();
        assert_eq!(s.total_dequeued, 4);
        assert_eq!(s.total_processed, 0);
        assert_eq!(s.pending, 0);

        // Closed queue refuses new work.
        assert!(matches!(
            queue.submit(|| {}),
            Err(PoolError::QueueClosed)
        ));
    }

    #[test]
    fn test_panicking_task_keeps_accounting() {
        let queue = TaskQueue::new(0);
        queue.submit(|| panic!("boom")).unwrap();
        queue.submit(|| {}).unwrap();

        assert_eq!(queue.pop_and_execute(|| false), PopOutcome::Executed);
        assert_eq!(queue.pop_and_execute(|| false), PopOutcome::Executed);

        let s = queue.stats();
        assert_eq!(s.total_processed, 2);
        assert_eq!(s.active_tasks, 0);

        // Quiescence is still reachable.
        queue.wait_empty();
    }

    #[test]
    fn test_stats_serialise() {
        let queue = TaskQueue::new(8);
        queue.submit(|| {}).unwrap();

        let json = serde_json::to_string(&queue.stats()).unwrap();
        assert!(json.contains("\"pending\":1"));
        assert!(json.contains("\"capacity\":8"));
    }
}
