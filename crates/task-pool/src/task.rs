// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Single-shot task records.
//!
//! A task is a boxed `FnOnce` that owns its state. The classic
//! function-pointer-plus-argument-plus-cleanup trio collapses into the
//! closure: captured state is the argument, and its drop is the cleanup.
//! That drop runs exactly once — after the job returns (or unwinds), or
//! when an unexecuted task is discarded at queue drain — so a submitted
//! task can never leak its state.

/// One unit of work owned by the queue until a worker runs it.
pub(crate) struct Task {
    job: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    pub(crate) fn new<F>(job: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { job: Box::new(job) }
    }

    /// Consumes the task and runs its job. Captured state drops when the
    /// job finishes.
    pub(crate) fn run(self) {
        (self.job)();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Increments a counter when dropped; stands in for a cleanup hook.
    struct DropProbe(Arc<AtomicUsize>);

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_run_consumes_and_drops_state() {
        let ran = Arc::new(AtomicUsize::new(0));
        let drops = Arc::new(AtomicUsize::new(0));

        let probe = DropProbe(Arc::clone(&drops));
        let ran2 = Arc::clone(&ran);
        let task = Task::new(move || {
            let _probe = &probe;
            ran2.fetch_add(1, Ordering::SeqCst);
        });

        task.run();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_discard_still_drops_state() {
        let drops = Arc::new(AtomicUsize::new(0));
        let probe = DropProbe(Arc::clone(&drops));

        let task = Task::new(move || {
            let _probe = &probe;
            unreachable!("discarded task must not run");
        });
        drop(task);

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
