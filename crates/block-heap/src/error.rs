// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the heap allocator.

use vm_reserve::MapError;

/// Errors that can occur during heap operations.
#[derive(Debug, thiserror::Error)]
pub enum HeapError {
    /// A size, address, or configuration value failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The VM layer could not provide more address space.
    #[error("out of memory: requested {requested} bytes: {source}")]
    OutOfMemory {
        requested: usize,
        #[source]
        source: MapError,
    },

    /// Free was called on an address inside no block.
    #[error("no allocation contains address {addr:#x}")]
    NotFound { addr: usize },

    /// Free was called on a block that is already free.
    #[error("double free at {addr:#x}")]
    DoubleFree { addr: usize },

    /// A facade operation ran with no live heap.
    #[error("allocator not initialised")]
    NotInitialised,

    /// Verify detected an invariant violation. The heap should be treated
    /// as unusable.
    #[error("heap corruption: {0}")]
    Corruption(String),

    /// A reservation-layer failure outside the allocation path.
    #[error(transparent)]
    Map(#[from] MapError),
}
