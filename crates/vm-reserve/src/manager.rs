// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reservation tracking over anonymous private mappings.
//!
//! Every reservation is an `mmap(NULL, len, PROT_READ|PROT_WRITE,
//! MAP_PRIVATE|MAP_ANONYMOUS)` call, recorded in a linear list. Release
//! requires an exact match on the recorded start address and length; the
//! heap layer only ever returns whole reservations, so the list stays
//! small and a linear scan is fine.

use crate::MapError;
use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, _SC_PAGESIZE};
use std::fmt::Write as _;
use std::sync::OnceLock;

/// Returns the system page size, queried once via `sysconf`.
///
/// Falls back to 4096 if the query fails (it does not on any supported
/// platform).
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        let sz = unsafe { libc::sysconf(_SC_PAGESIZE) };
        if sz > 0 {
            sz as usize
        } else {
            4096
        }
    })
}

/// One recorded reservation: a page-aligned anonymous private mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Start address returned by the OS.
    pub start: usize,
    /// Length in bytes (a page-size multiple).
    pub len: usize,
    /// Protection flags the mapping was created with.
    pub prot: i32,
    /// Mapping flags the mapping was created with.
    pub flags: i32,
}

impl Region {
    /// Number of whole pages covered by this reservation.
    pub fn pages(&self) -> usize {
        self.len / page_size()
    }
}

/// Owner of every outstanding reservation.
///
/// `VmManager` is not internally synchronised; the heap holds it behind
/// its own mutex. Dropping the manager unmaps everything still recorded.
#[derive(Debug, Default)]
pub struct VmManager {
    regions: Vec<Region>,
    total_reserved: usize,
}

impl VmManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `len` bytes of writable address space.
    ///
    /// `len` must be a nonzero multiple of the page size. On success the
    /// reservation is recorded and its start address returned; on failure
    /// the OS error is surfaced and nothing is recorded.
    pub fn reserve(&mut self, len: usize) -> Result<usize, MapError> {
        if len == 0 || len % page_size() != 0 {
            return Err(MapError::UnalignedLength {
                len,
                page_size: page_size(),
            });
        }

        let prot = PROT_READ | PROT_WRITE;
        let flags = MAP_PRIVATE | MAP_ANONYMOUS;

        let ptr = unsafe { libc::mmap(std::ptr::null_mut(), len, prot, flags, -1, 0) };
        if ptr == MAP_FAILED {
            let source = std::io::Error::last_os_error();
            tracing::error!(len, %source, "mmap failed");
            return Err(MapError::ReserveFailed { len, source });
        }

        let start = ptr as usize;
        self.regions.push(Region {
            start,
            len,
            prot,
            flags,
        });
        self.total_reserved += len;

        tracing::debug!(
            start,
            len,
            regions = self.regions.len(),
            "reserved range"
        );
        Ok(start)
    }

    /// Releases the reservation starting exactly at `addr`.
    ///
    /// Fails if no reservation starts at `addr` or if `len` disagrees with
    /// the recorded length; in both cases the list is untouched.
    pub fn release(&mut self, addr: usize, len: usize) -> Result<(), MapError> {
        let idx = self
            .regions
            .iter()
            .position(|r| r.start == addr)
            .ok_or(MapError::RegionNotFound { addr })?;

        let recorded = self.regions[idx].len;
        if recorded != len {
            return Err(MapError::LengthMismatch {
                addr,
                recorded,
                given: len,
            });
        }

        let rc = unsafe { libc::munmap(addr as *mut libc::c_void, len) };
        if rc != 0 {
            let source = std::io::Error::last_os_error();
            tracing::error!(addr, len, %source, "munmap failed");
            return Err(MapError::ReleaseFailed { addr, len, source });
        }

        self.regions.swap_remove(idx);
        self.total_reserved -= len;

        tracing::debug!(
            addr,
            len,
            regions = self.regions.len(),
            "released range"
        );
        Ok(())
    }

    /// Total bytes currently reserved.
    pub fn total_reserved(&self) -> usize {
        self.total_reserved
    }

    /// Number of outstanding reservations.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Returns the recorded region containing `addr`, if any.
    pub fn region_containing(&self, addr: usize) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| addr >= r.start && addr < r.start + r.len)
    }

    /// Unmaps every recorded reservation and returns how many were
    /// released. An unmap refusal is logged and the region dropped from
    /// the list anyway; there is nothing further the caller could do with
    /// it.
    pub fn release_all(&mut self) -> usize {
        let count = self.regions.len();
        if count > 0 {
            tracing::info!(count, "releasing all reservations");
        }

        for region in self.regions.drain(..) {
            let rc = unsafe { libc::munmap(region.start as *mut libc::c_void, region.len) };
            if rc != 0 {
                tracing::warn!(
                    addr = region.start,
                    len = region.len,
                    "munmap failed during bulk release"
                );
            }
        }
        self.total_reserved = 0;
        count
    }

    /// Renders the reservation list as diagnostic text.
    pub fn render_dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== VM Reservations ===");
        let _ = writeln!(out, "Regions: {}", self.regions.len());
        let _ = writeln!(out, "Reserved: {} bytes", self.total_reserved);
        for (i, r) in self.regions.iter().enumerate() {
            let _ = writeln!(
                out,
                "[Region {i}] addr={:#x} len={} ({} pages)",
                r.start,
                r.len,
                r.pages(),
            );
        }
        out
    }

    /// Writes [`render_dump`](Self::render_dump) to standard error.
    pub fn dump(&self) {
        eprintln!("{}", self.render_dump());
    }
}

impl Drop for VmManager {
    fn drop(&mut self) {
        self.release_all();
    }
}
