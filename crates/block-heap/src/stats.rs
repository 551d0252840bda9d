// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Heap statistics snapshots.

/// A point-in-time snapshot of heap accounting, taken under the heap
/// mutex.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct HeapStats {
    /// Bytes currently handed out to callers.
    pub allocated_bytes: usize,
    /// Bytes sitting in FREE blocks.
    pub free_bytes: usize,
    /// High-water mark of `allocated_bytes`.
    pub peak_allocated_bytes: usize,
    /// Blocks in the address-ordered list.
    pub block_count: usize,
    /// Outstanding VM reservations backing the heap.
    pub reservation_count: usize,
    /// Total bytes reserved from the OS.
    pub reserved_bytes: usize,
    /// Successful allocations since the heap was created.
    pub total_allocs: u64,
    /// Successful frees since the heap was created.
    pub total_frees: u64,
    /// Allocation requests that failed (address space exhausted).
    pub failed_allocs: u64,
}

impl HeapStats {
    /// Returns a human-readable one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "Heap: {} bytes live in {} blocks ({} free, peak {}), \
             {} reservations / {} bytes mapped, {} allocs / {} frees / {} failures",
            self.allocated_bytes,
            self.block_count,
            self.free_bytes,
            self.peak_allocated_bytes,
            self.reservation_count,
            self.reserved_bytes,
            self.total_allocs,
            self.total_frees,
            self.failed_allocs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zeroed() {
        let s = HeapStats::default();
        assert_eq!(s.allocated_bytes, 0);
        assert_eq!(s.total_allocs, 0);
    }

    #[test]
    fn test_summary_contents() {
        let s = HeapStats {
            allocated_bytes: 1024,
            free_bytes: 3072,
            peak_allocated_bytes: 2048,
            block_count: 3,
            reservation_count: 1,
            reserved_bytes: 4096,
            total_allocs: 5,
            total_frees: 4,
            failed_allocs: 1,
        };
        let summary = s.summary();
        assert!(summary.contains("1024 bytes live"));
        assert!(summary.contains("3 blocks"));
        assert!(summary.contains("peak 2048"));
        assert!(summary.contains("1 failures"));
    }

    #[test]
    fn test_serialises() {
        let s = HeapStats::default();
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"allocated_bytes\":0"));
    }
}
