// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pool configuration loaded from TOML files or constructed
//! programmatically.
//!
//! # TOML Format
//! ```toml
//! num_threads = 4
//! queue_size = 100
//! stack_size = 262144
//! daemon_threads = false
//! ```

use crate::PoolError;
use std::path::Path;

/// Configuration for a [`ThreadPool`](crate::ThreadPool).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads (defaults to the number of online CPU
    /// cores).
    #[serde(default)]
    pub num_threads: Option<usize>,
    /// Queue capacity; producers block when it is reached. 0 means
    /// unbounded.
    #[serde(default)]
    pub queue_size: usize,
    /// Worker stack size in bytes; `None` uses the platform default.
    #[serde(default)]
    pub stack_size: Option<usize>,
    /// Spawn workers detached. Daemon workers are never joined: destroy
    /// signals them and returns without waiting.
    #[serde(default)]
    pub daemon_threads: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            queue_size: 0,
            stack_size: None,
            daemon_threads: false,
        }
    }
}

impl PoolConfig {
    /// Convenience constructor for the common case.
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
            ..Default::default()
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PoolError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PoolError::InvalidConfig(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, PoolError> {
        toml::from_str(toml_str)
            .map_err(|e| PoolError::InvalidConfig(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, PoolError> {
        toml::to_string_pretty(self)
            .map_err(|e| PoolError::InvalidConfig(format!("TOML serialise error: {e}")))
    }

    /// Resolves the worker count, defaulting to the online core count.
    pub fn resolve_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// Checks the configuration for values the pool cannot work with.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.num_threads == Some(0) {
            return Err(PoolError::InvalidConfig(
                "num_threads must be at least 1".into(),
            ));
        }
        if let Some(stack) = self.stack_size {
            // PTHREAD_STACK_MIN on every supported platform.
            if stack < 16 * 1024 {
                return Err(PoolError::InvalidConfig(format!(
                    "stack_size {stack} is below the 16 KiB minimum"
                )));
            }
        }
        Ok(())
    }
}
