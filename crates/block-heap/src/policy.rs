// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Free-block selection policies.

use crate::block::{BlockId, BlockList};
use std::fmt;
use std::str::FromStr;

/// Strategy used to pick a FREE block for an allocation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// First FREE block (front to back) large enough.
    #[default]
    FirstFit,
    /// Smallest FREE block large enough; earliest address wins ties.
    BestFit,
    /// Largest FREE block large enough; earliest address wins ties.
    WorstFit,
}

impl Policy {
    pub fn name(&self) -> &'static str {
        match self {
            Policy::FirstFit => "first-fit",
            Policy::BestFit => "best-fit",
            Policy::WorstFit => "worst-fit",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = crate::HeapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first-fit" | "first" => Ok(Policy::FirstFit),
            "best-fit" | "best" => Ok(Policy::BestFit),
            "worst-fit" | "worst" => Ok(Policy::WorstFit),
            other => Err(crate::HeapError::InvalidArgument(format!(
                "unknown policy '{other}'; expected 'first-fit', 'best-fit', or 'worst-fit'"
            ))),
        }
    }
}

/// Scans the list for a FREE block of at least `size` bytes under the
/// given policy. Does not change any state.
///
/// The scan runs front to back, so ties in best/worst fit resolve to the
/// earliest address because only a strictly better candidate replaces the
/// current one.
pub(crate) fn find_free_block(list: &BlockList, size: usize, policy: Policy) -> Option<BlockId> {
    match policy {
        Policy::FirstFit => list
            .iter()
            .find(|(_, b)| b.can_satisfy(size))
            .map(|(id, _)| id),
        Policy::BestFit => {
            let mut selected: Option<(BlockId, usize)> = None;
            for (id, b) in list.iter() {
                if b.can_satisfy(size) && selected.map_or(true, |(_, sz)| b.size < sz) {
                    selected = Some((id, b.size));
                }
            }
            selected.map(|(id, _)| id)
        }
        Policy::WorstFit => {
            let mut selected: Option<(BlockId, usize)> = None;
            for (id, b) in list.iter() {
                if b.can_satisfy(size) && selected.map_or(true, |(_, sz)| b.size > sz) {
                    selected = Some((id, b.size));
                }
            }
            selected.map(|(id, _)| id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockState;

    /// Free blocks of 64, 256, and 128 bytes at increasing addresses.
    fn sample_list() -> BlockList {
        let mut list = BlockList::new();
        for (start, size) in [(0x1000, 64), (0x2000, 256), (0x3000, 128)] {
            let id = list.create(start, size, BlockState::Free).unwrap();
            list.insert_sorted(id);
        }
        list
    }

    #[test]
    fn test_first_fit_takes_front_most() {
        let list = sample_list();
        let id = find_free_block(&list, 64, Policy::FirstFit).unwrap();
        assert_eq!(list.get(id).start, 0x1000);

        let id = find_free_block(&list, 100, Policy::FirstFit).unwrap();
        assert_eq!(list.get(id).start, 0x2000);
    }

    #[test]
    fn test_best_fit_takes_smallest() {
        let list = sample_list();
        let id = find_free_block(&list, 100, Policy::BestFit).unwrap();
        assert_eq!(list.get(id).start, 0x3000); // 128 < 256
    }

    #[test]
    fn test_worst_fit_takes_largest() {
        let list = sample_list();
        let id = find_free_block(&list, 8, Policy::WorstFit).unwrap();
        assert_eq!(list.get(id).start, 0x2000); // 256
    }

    #[test]
    fn test_ties_resolve_to_earliest_address() {
        let mut list = BlockList::new();
        for start in [0x1000, 0x2000, 0x3000] {
            let id = list.create(start, 128, BlockState::Free).unwrap();
            list.insert_sorted(id);
        }
        for policy in [Policy::FirstFit, Policy::BestFit, Policy::WorstFit] {
            let id = find_free_block(&list, 64, policy).unwrap();
            assert_eq!(list.get(id).start, 0x1000, "{policy} tie-break");
        }
    }

    #[test]
    fn test_allocated_blocks_are_skipped() {
        let mut list = sample_list();
        let head = list.head().unwrap();
        list.get_mut(head).state = BlockState::Allocated;

        let id = find_free_block(&list, 8, Policy::FirstFit).unwrap();
        assert_eq!(list.get(id).start, 0x2000);
    }

    #[test]
    fn test_no_fit_returns_none() {
        let list = sample_list();
        assert!(find_free_block(&list, 1024, Policy::FirstFit).is_none());
        assert!(find_free_block(&list, 1024, Policy::BestFit).is_none());
        assert!(find_free_block(&list, 1024, Policy::WorstFit).is_none());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("first-fit".parse::<Policy>().unwrap(), Policy::FirstFit);
        assert_eq!("BEST".parse::<Policy>().unwrap(), Policy::BestFit);
        assert_eq!("worst-fit".parse::<Policy>().unwrap(), Policy::WorstFit);
        assert!("buddy".parse::<Policy>().is_err());
    }

    #[test]
    fn test_policy_display() {
        assert_eq!(Policy::FirstFit.to_string(), "first-fit");
        assert_eq!(Policy::WorstFit.to_string(), "worst-fit");
    }
}
