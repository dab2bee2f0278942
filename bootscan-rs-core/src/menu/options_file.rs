// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The per-directory kernel options file.
//!
//! `bootscan_linux.conf` sits next to a kernel, or in `\boot` of the same volume. Every line holds a label and a
//! command line:
//!
//! ```text
//! "Boot with standard options"  "ro root=UUID=084f544a-7559-4d4b-938a-b920f59edc7e"
//! "Boot to single-user mode"    "ro root=UUID=084f544a-7559-4d4b-938a-b920f59edc7e single"
//! Minimal                       ro root=/dev/sda2 initrd=\boot\initrd-%v.img
//! ```
//!
//! `%v` in a command line is replaced with the version of the kernel it is used for. Files saved as UTF-16 with a
//! byte order mark are accepted as well.

use alloc::{borrow::ToOwned, string::String, vec::Vec};

use crate::system::{
    fs::VolumeFs,
    helper::{dirname, join_path},
};

/// The file name of the options file.
pub const FILE_NAME: &str = "bootscan_linux.conf";

/// The placeholder that is replaced with the kernel version.
pub const VERSION_PLACEHOLDER: &str = "%v";

/// The directory checked when the kernel directory has no options file.
const FALLBACK_DIR: &str = "boot";

/// One line of the options file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionsRecord {
    /// The title of the boot option.
    pub label: String,

    /// The raw command line, which may contain [`VERSION_PLACEHOLDER`].
    pub options: String,
}

impl OptionsRecord {
    /// Get the command line with the version placeholder replaced.
    ///
    /// Without a version, the placeholder is removed.
    #[must_use = "Has no effect if the result is unused"]
    pub fn options_for(&self, version: Option<&str>) -> String {
        self.options
            .replace(VERSION_PLACEHOLDER, version.unwrap_or_default())
    }
}

/// Decodes the content of a text file, which may be UTF-16 with a byte order mark.
fn decode(content: &[u8]) -> String {
    match content {
        [0xff, 0xfe, rest @ ..] => {
            let units = rest
                .chunks_exact(2)
                .map(|pair| u16::from_le(bytemuck::pod_read_unaligned(pair)));
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        [0xef, 0xbb, 0xbf, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => String::from_utf8_lossy(content).into_owned(),
    }
}

/// Splits the first token off a line. A token in double quotes may contain whitespace.
fn split_token(line: &str) -> (&str, &str) {
    if let Some(quoted) = line.strip_prefix('"') {
        match quoted.split_once('"') {
            Some((token, rest)) => (token, rest.trim_start()),
            None => (quoted, ""),
        }
    } else {
        match line.split_once(char::is_whitespace) {
            Some((token, rest)) => (token, rest.trim_start()),
            None => (line, ""),
        }
    }
}

/// Removes one pair of double quotes around a whole string.
fn unquote(str: &str) -> &str {
    str.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .filter(|inner| !inner.contains('"'))
        .unwrap_or(str)
}

/// Parses an options file.
///
/// Blank lines, comments, and lines without a command line are skipped.
#[must_use = "Has no effect if the result is unused"]
pub fn parse(content: &[u8]) -> Vec<OptionsRecord> {
    decode(content)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (label, rest) = split_token(line);
            let options = unquote(rest.trim());
            (!options.is_empty()).then(|| OptionsRecord {
                label: label.to_owned(),
                options: options.to_owned(),
            })
        })
        .collect()
}

/// Reads the options file for a kernel, from the kernel's directory or `\boot`.
///
/// Returns [`None`] if neither exists.
#[must_use = "Has no effect if the result is unused"]
pub fn read_options_file(fs: &mut dyn VolumeFs, kernel_path: &str) -> Option<Vec<OptionsRecord>> {
    let content = fs
        .read(&join_path(&dirname(kernel_path), FILE_NAME))
        .or_else(|_| fs.read(&join_path(FALLBACK_DIR, FILE_NAME)))
        .ok()?;
    Some(parse(&content))
}
