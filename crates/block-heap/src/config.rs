// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Heap configuration loaded from TOML files or constructed
//! programmatically.
//!
//! # TOML Format
//! ```toml
//! initial_pages = 10
//! policy = "first-fit"
//! concurrent = true
//! trace_capacity = 0
//! ```

use crate::{HeapError, Policy};
use std::path::Path;

/// Configuration for a [`Heap`](crate::Heap).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HeapConfig {
    /// Pages reserved up front when the heap is created.
    #[serde(default = "default_initial_pages")]
    pub initial_pages: usize,
    /// Free-block selection policy.
    #[serde(default)]
    pub policy: Policy,
    /// Whether the heap was configured for concurrent callers. Recorded
    /// and surfaced in dumps; the heap mutex is held for every operation
    /// either way.
    #[serde(default = "default_true")]
    pub concurrent: bool,
    /// Capacity of the alloc/free trace ring; 0 disables tracing.
    #[serde(default)]
    pub trace_capacity: usize,
}

fn default_initial_pages() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            initial_pages: default_initial_pages(),
            policy: Policy::FirstFit,
            concurrent: true,
            trace_capacity: 0,
        }
    }
}

impl HeapConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, HeapError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HeapError::InvalidArgument(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, HeapError> {
        toml::from_str(toml_str)
            .map_err(|e| HeapError::InvalidArgument(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, HeapError> {
        toml::to_string_pretty(self)
            .map_err(|e| HeapError::InvalidArgument(format!("TOML serialise error: {e}")))
    }

    /// Checks the configuration for values the heap cannot work with.
    pub fn validate(&self) -> Result<(), HeapError> {
        if self.initial_pages == 0 {
            return Err(HeapError::InvalidArgument(
                "initial_pages must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = HeapConfig::default();
        assert_eq!(c.initial_pages, 10);
        assert_eq!(c.policy, Policy::FirstFit);
        assert!(c.concurrent);
        assert_eq!(c.trace_capacity, 0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
initial_pages = 4
policy = "best-fit"
concurrent = false
trace_capacity = 256
"#;
        let c = HeapConfig::from_toml(toml).unwrap();
        assert_eq!(c.initial_pages, 4);
        assert_eq!(c.policy, Policy::BestFit);
        assert!(!c.concurrent);
        assert_eq!(c.trace_capacity, 256);
    }

    #[test]
    fn test_from_toml_defaults_apply() {
        let c = HeapConfig::from_toml("policy = \"worst-fit\"").unwrap();
        assert_eq!(c.initial_pages, 10);
        assert_eq!(c.policy, Policy::WorstFit);
        assert!(c.concurrent);
    }

    #[test]
    fn test_toml_roundtrip() {
        let c = HeapConfig {
            initial_pages: 2,
            policy: Policy::WorstFit,
            concurrent: false,
            trace_capacity: 64,
        };
        let toml = c.to_toml().unwrap();
        let back = HeapConfig::from_toml(&toml).unwrap();
        assert_eq!(back.initial_pages, 2);
        assert_eq!(back.policy, Policy::WorstFit);
    }

    #[test]
    fn test_validate_rejects_zero_pages() {
        let c = HeapConfig {
            initial_pages: 0,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(HeapError::InvalidArgument(_))));
    }
}
