// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the worker pool.

use crate::PoolState;

/// Errors that can occur while operating the pool or its queue.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The operation requires a different pool state.
    #[error("pool is {state}, expected {expected}")]
    WrongState {
        state: PoolState,
        expected: PoolState,
    },

    /// The queue has been closed; no further submissions are accepted.
    #[error("task queue is closed")]
    QueueClosed,

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
