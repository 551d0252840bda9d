// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for virtual-memory reservation.

/// Errors that can occur while reserving or releasing address space.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The requested length is zero or not a multiple of the page size.
    #[error("invalid reservation length {len}: must be a nonzero multiple of the page size ({page_size})")]
    UnalignedLength { len: usize, page_size: usize },

    /// The operating system refused the mapping.
    #[error("mmap of {len} bytes failed: {source}")]
    ReserveFailed {
        len: usize,
        #[source]
        source: std::io::Error,
    },

    /// No recorded reservation starts at the given address.
    #[error("no reservation recorded at {addr:#x}")]
    RegionNotFound { addr: usize },

    /// The length passed to release disagrees with the recorded one.
    #[error("length mismatch at {addr:#x}: recorded {recorded}, got {given}")]
    LengthMismatch {
        addr: usize,
        recorded: usize,
        given: usize,
    },

    /// The operating system refused to unmap a recorded reservation.
    #[error("munmap of {len} bytes at {addr:#x} failed: {source}")]
    ReleaseFailed {
        addr: usize,
        len: usize,
        #[source]
        source: std::io::Error,
    },
}
