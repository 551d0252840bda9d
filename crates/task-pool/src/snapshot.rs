// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Point-in-time views of the pool for diagnostics.

use crate::PoolState;
use std::fmt::Write as _;

/// One worker's externally visible counters.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct WorkerSnapshot {
    pub index: usize,
    pub tasks_completed: u64,
    pub active: bool,
}

/// A snapshot of the whole pool, taken under the state mutex (workers)
/// and the queue mutex (pending count), never both at once.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolSnapshot {
    pub state: PoolState,
    pub num_threads: usize,
    pub pending_tasks: usize,
    pub workers: Vec<WorkerSnapshot>,
}

impl PoolSnapshot {
    /// Returns a human-readable one-line summary.
    pub fn summary(&self) -> String {
        let active = self.workers.iter().filter(|w| w.active).count();
        format!(
            "Pool: {} with {} workers ({} active), {} pending tasks",
            self.state, self.num_threads, active, self.pending_tasks,
        )
    }

    /// Renders the snapshot as a multi-line diagnostic listing.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Thread Pool ===");
        let _ = writeln!(out, "State: {}", self.state);
        let _ = writeln!(out, "Workers: {}", self.num_threads);
        let _ = writeln!(out, "Pending tasks: {}", self.pending_tasks);
        for w in &self.workers {
            let _ = writeln!(
                out,
                "[{:>2}] tasks={:<8} {}",
                w.index,
                w.tasks_completed,
                if w.active { "ACTIVE" } else { "IDLE" },
            );
        }
        out
    }
}
