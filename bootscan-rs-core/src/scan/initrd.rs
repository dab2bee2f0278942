// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Kernel to initrd correlation.
//!
//! A kernel like `vmlinuz-6.1.0-13-amd64` is matched to the file starting with `init` in the same directory that
//! carries exactly the same version, like `initrd.img-6.1.0-13-amd64`. The version of a name spans from its first
//! digit to its last digit, so `initramfs-3.3.0-rc7.img` (`3.3.0-rc7`) never matches `bzImage-3.3.0.efi` (`3.3.0`).

use alloc::string::String;
use log::debug;

use crate::system::{
    fs::VolumeFs,
    helper::{absolute_path, basename, dirname, find_ignore_case, glob_match, join_path},
};

/// Gets the version of a file name, from its first digit to its last digit.
#[must_use = "Has no effect if the result is unused"]
pub fn version_token(name: &str) -> Option<&str> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let end = name.rfind(|c: char| c.is_ascii_digit())?;
    Some(&name[start..=end])
}

/// Counts the leading characters two strings share, ignoring ASCII case.
fn shared_prefix(a: &str, b: &str) -> usize {
    a.bytes()
        .zip(b.bytes())
        .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
        .count()
}

/// Counts the characters two names share starting at their version.
fn shared_after_version(kernel: &str, initrd: &str, version: Option<&str>) -> usize {
    let Some(version) = version else {
        return 0;
    };
    match (find_ignore_case(kernel, version), find_ignore_case(initrd, version)) {
        (Some(k), Some(i)) => shared_prefix(&kernel[k..], &initrd[i..]),
        _ => 0,
    }
}

/// Picks the initrd for a kernel out of a list of file names.
///
/// A candidate matches if its version is the same as the kernel's, or neither has a version. If more than one
/// matches, the one sharing the most characters with the kernel name from the version onwards wins, then the
/// shortest name, then the first one listed.
#[must_use = "Has no effect if the result is unused"]
pub fn select_initrd<'a>(kernel_name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let version = version_token(kernel_name);

    let mut best: Option<(&str, usize)> = None;
    for name in candidates {
        let matches = match (version, version_token(name)) {
            (Some(kernel), Some(initrd)) => kernel.eq_ignore_ascii_case(initrd),
            (None, None) => true,
            _ => false,
        };
        if !matches {
            continue;
        }

        let shared = shared_after_version(kernel_name, name, version);
        let better = match best {
            None => true,
            Some((best_name, best_shared)) => {
                shared > best_shared || (shared == best_shared && name.len() < best_name.len())
            }
        };
        if better {
            best = Some((name, shared));
        }
    }

    best.map(|(name, _)| name)
}

/// Finds the initrd of a kernel on its volume, returning the absolute path of the initrd.
///
/// A directory that cannot be read has no initrd.
#[must_use = "Has no effect if the result is unused"]
pub fn find_initrd(fs: &mut dyn VolumeFs, kernel_path: &str) -> Option<String> {
    let dir = dirname(kernel_path);
    let entries = fs.read_dir(&dir).ok()?;

    let candidates = entries
        .iter()
        .filter(|entry| !entry.is_dir && glob_match("init*", &entry.name))
        .map(|entry| entry.name.as_str());

    let initrd = select_initrd(basename(kernel_path), candidates)?;
    debug!("Found initrd {initrd} for {kernel_path}");
    Some(absolute_path(&join_path(&dir, initrd)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::fs::mem::MemVolume;
    use proptest::prelude::*;

    #[test]
    fn test_version_token() {
        assert_eq!(version_token("bzImage-3.3.0.efi"), Some("3.3.0"));
        assert_eq!(version_token("initramfs-3.3.0-rc7.img"), Some("3.3.0-rc7"));
        assert_eq!(version_token("vmlinuz-linux"), None);
        assert_eq!(version_token("vmlinuz-6.1.0-13-amd64"), Some("6.1.0-13-amd64"));
    }

    #[test]
    fn test_exact_version() {
        let candidates = ["initramfs-3.3.0-rc7.img", "initramfs-13.3.0.img", "initramfs-3.3.0.img"];
        assert_eq!(
            select_initrd("bzImage-3.3.0.efi", candidates),
            Some("initramfs-3.3.0.img")
        );
        assert_eq!(select_initrd("bzImage-3.3.1.efi", candidates), None);
    }

    #[test]
    fn test_most_shared() {
        let candidates = [
            "initramfs-6.1.0-13-amd64-fallback.img",
            "initrd.img-6.1.0-13-amd64",
            "initramfs-6.1.0-13-other.img",
        ];
        assert_eq!(
            select_initrd("vmlinuz-6.1.0-13-amd64", candidates),
            Some("initrd.img-6.1.0-13-amd64")
        );
    }

    #[test]
    fn test_unversioned() {
        let candidates = ["initramfs-linux-fallback.img", "initramfs-linux.img", "initramfs-6.1.img"];
        assert_eq!(select_initrd("vmlinuz-linux", candidates), Some("initramfs-linux.img"));
    }

    #[test]
    fn test_find_initrd() {
        let mut volume = MemVolume::new("boot")
            .with_file("boot\\vmlinuz-6.1.0", b"kernel")
            .with_file("boot\\initrd.img-6.1.0", b"initrd")
            .with_file("boot\\config-6.1.0", b"config");

        assert_eq!(
            find_initrd(&mut volume, "boot\\vmlinuz-6.1.0"),
            Some("\\boot\\initrd.img-6.1.0".into())
        );
        assert_eq!(find_initrd(&mut volume, "missing\\vmlinuz-6.1.0"), None);
    }

    proptest! {
        #[test]
        fn picks_same_version(kernel in "[a-z]{0,6}-?[0-9.]{0,6}", names in proptest::collection::vec("[a-z]{0,6}-?[0-9.a-z]{0,6}", 0..8)) {
            if let Some(picked) = select_initrd(&kernel, names.iter().map(String::as_str)) {
                prop_assert!(names.iter().any(|name| name == picked));
                match (version_token(&kernel), version_token(picked)) {
                    (Some(a), Some(b)) => prop_assert!(a.eq_ignore_ascii_case(b)),
                    (a, b) => prop_assert!(a.is_none() && b.is_none()),
                }
            }
        }
    }
}
