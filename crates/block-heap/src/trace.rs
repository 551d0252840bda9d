// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bounded in-memory trace of alloc/free calls.
//!
//! When enabled, the heap records every allocation and free together with
//! the caller's file and line (captured via `#[track_caller]` on the heap
//! entry points). The ring is bounded: once full, the oldest events are
//! evicted. The ring lives inside the heap state, so reads go through the
//! heap mutex like every other diagnostic.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::panic::Location;

/// Which operation an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TraceKind {
    Alloc,
    Free,
}

impl TraceKind {
    fn as_str(&self) -> &'static str {
        match self {
            TraceKind::Alloc => "ALLOC",
            TraceKind::Free => "FREE",
        }
    }
}

/// One recorded alloc or free.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TraceEvent {
    pub kind: TraceKind,
    pub addr: usize,
    pub size: usize,
    pub file: &'static str,
    pub line: u32,
}

/// Fixed-capacity ring of [`TraceEvent`]s.
#[derive(Debug)]
pub struct TraceRing {
    cap: usize,
    events: VecDeque<TraceEvent>,
}

impl TraceRing {
    /// Creates a ring holding at most `cap` events (`cap > 0`).
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            events: VecDeque::with_capacity(cap),
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub(crate) fn record(
        &mut self,
        kind: TraceKind,
        addr: usize,
        size: usize,
        caller: &'static Location<'static>,
    ) {
        if self.events.len() == self.cap {
            self.events.pop_front();
        }
        self.events.push_back(TraceEvent {
            kind,
            addr,
            size,
            file: caller.file(),
            line: caller.line(),
        });
    }

    /// Events in recording order, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter()
    }

    /// Renders the ring as diagnostic text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Allocation Trace ===");
        let _ = writeln!(out, "Events: {} (capacity {})", self.events.len(), self.cap);
        for (i, e) in self.events.iter().enumerate() {
            let _ = writeln!(
                out,
                "[{i}] {} {} bytes at {:#x} ({}:{})",
                e.kind.as_str(),
                e.size,
                e.addr,
                e.file,
                e.line,
            );
        }
        out
    }
}
