// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Ordering and folding of the loaders found in one directory.
//!
//! Candidates are ordered newest first, so that the most recently installed kernel becomes the entry that boots by
//! default. Rescue kernels always go last no matter how new they are.
//!
//! With kernel folding, the first kernel of the directory becomes the only top-level entry for all kernels in it,
//! and every other kernel becomes an entry in its subscreen.

use core::cmp::Reverse;

use alloc::{string::String, vec::Vec};

use crate::system::{
    helper::{basename, contains_ignore_case},
    time::Timestamp,
};

/// The name fragment of a rescue kernel.
const RESCUE_NAME: &str = "vmlinuz-0-rescue";

/// The name fragments of a Linux kernel.
const KERNEL_NAMES: [&str; 3] = ["bzImage", "vmlinuz", "kernel"];

/// A loader found while scanning one directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderCandidate {
    /// The volume relative path of the loader.
    pub path: String,

    /// The last modification time of the loader.
    pub modified: Timestamp,
}

/// Where a candidate ends up in the menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// The candidate becomes a top-level entry.
    TopLevel {
        /// If its subscreen ends with a return entry right away.
        with_return: bool,
    },

    /// The candidate becomes a subscreen entry of the candidate at this index.
    FoldInto(usize),
}

/// Checks if a file is a rescue kernel.
#[must_use = "Has no effect if the result is unused"]
pub fn is_rescue(path: &str) -> bool {
    contains_ignore_case(basename(path), RESCUE_NAME)
}

/// Checks if a file is named like a Linux kernel.
#[must_use = "Has no effect if the result is unused"]
pub fn is_kernel_name(path: &str) -> bool {
    let name = basename(path);
    KERNEL_NAMES
        .iter()
        .any(|kernel| contains_ignore_case(name, kernel))
}

/// Orders candidates newest first, with rescue kernels after everything else.
///
/// The sort is stable, so candidates with equal timestamps keep the order they were listed in.
pub fn sort_candidates(candidates: &mut [LoaderCandidate]) {
    candidates.sort_by_key(|candidate| (is_rescue(&candidate.path), Reverse(candidate.modified)));
}

/// Decides where each of the sorted candidates of a directory goes.
///
/// Without folding, or for anything that is not a kernel, every candidate is its own top-level entry with a return
/// entry in its subscreen. With folding, the first kernel is the top-level entry of every kernel in the directory;
/// its return entry is added once all kernels were folded into it.
#[must_use = "Has no effect if the result is unused"]
pub fn plan_folding(sorted: &[LoaderCandidate], fold: bool) -> Vec<Placement> {
    let mut first_kernel = None;

    sorted
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let is_kernel = is_kernel_name(&candidate.path);
            match first_kernel {
                Some(parent) if is_kernel && fold => Placement::FoldInto(parent),
                _ => {
                    if is_kernel && first_kernel.is_none() {
                        first_kernel = Some(i);
                    }
                    Placement::TopLevel {
                        with_return: !(is_kernel && fold),
                    }
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::borrow::ToOwned;
    use proptest::prelude::*;

    fn candidate(path: &str, seconds: u64) -> LoaderCandidate {
        LoaderCandidate {
            path: path.to_owned(),
            modified: Timestamp::from_seconds(seconds),
        }
    }

    #[test]
    fn test_rescue_last() {
        let mut list = alloc::vec![
            candidate("boot\\vmlinuz-6.1", 10),
            candidate("boot\\vmlinuz-0-rescue-abc", 99),
            candidate("boot\\vmlinuz-6.2", 20),
        ];
        sort_candidates(&mut list);
        let paths: Vec<_> = list.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(
            paths,
            ["boot\\vmlinuz-6.2", "boot\\vmlinuz-6.1", "boot\\vmlinuz-0-rescue-abc"]
        );
    }

    #[test]
    fn test_kernel_name() {
        assert!(is_kernel_name("boot\\vmlinuz-linux"));
        assert!(is_kernel_name("EFI\\arch\\bzImage.efi"));
        assert!(!is_kernel_name("EFI\\kernels\\grubx64.efi"));
    }

    #[test]
    fn test_folding() {
        let list = [
            candidate("boot\\vmlinuz-6.2", 3),
            candidate("boot\\grub.efi", 2),
            candidate("boot\\vmlinuz-6.1", 1),
        ];
        assert_eq!(
            plan_folding(&list, true),
            [
                Placement::TopLevel { with_return: false },
                Placement::TopLevel { with_return: true },
                Placement::FoldInto(0),
            ]
        );
        assert_eq!(
            plan_folding(&list, false),
            [Placement::TopLevel { with_return: true }; 3]
        );
    }

    proptest! {
        #[test]
        fn sorted_descending(times in proptest::collection::vec(any::<u32>(), 0..32)) {
            let mut list: Vec<_> = times
                .iter()
                .enumerate()
                .map(|(i, t)| candidate(&alloc::format!("vmlinuz-{i}"), u64::from(*t)))
                .collect();
            sort_candidates(&mut list);
            prop_assert!(list.windows(2).all(|w| w[0].modified >= w[1].modified));
        }

        #[test]
        fn folds_into_one(count in 1usize..16, fold in any::<bool>()) {
            let list: Vec<_> = (0..count)
                .map(|i| candidate(&alloc::format!("vmlinuz-{i}"), 0))
                .collect();
            let plan = plan_folding(&list, fold);
            let top = plan.iter().filter(|p| matches!(p, Placement::TopLevel { .. })).count();
            prop_assert_eq!(top, if fold { 1 } else { count });
        }

        #[test]
        fn rescue_after_others(times in proptest::collection::vec(any::<u32>(), 1..16), rescue in any::<u32>()) {
            let mut list: Vec<_> = times
                .iter()
                .enumerate()
                .map(|(i, t)| candidate(&alloc::format!("vmlinuz-{i}"), u64::from(*t)))
                .collect();
            list.push(candidate("vmlinuz-0-rescue", u64::from(rescue)));
            sort_candidates(&mut list);
            prop_assert!(list.last().is_some_and(|c| is_rescue(&c.path)));
        }
    }
}
