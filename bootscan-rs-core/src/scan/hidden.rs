// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Persistent lists of entries the user hid from the menu.
//!
//! Each [`HiddenList`] is a variable in the boot manager's vendor namespace holding comma separated UTF-8. The
//! lists are merged into the exclusion lists of the configuration at the start of every scan pass. A variable is
//! rewritten when a value is removed, even when it ends up empty, and never deleted.

use alloc::{
    borrow::ToOwned,
    string::{String, ToString},
    vec::Vec,
};

use log::warn;

use crate::{
    BootResult,
    config::ScanConfig,
    menu::HiddenList,
    system::{firmware::Firmware, variable::VarVendor},
};

impl HiddenList {
    /// Every list, in the order they are shown.
    pub const ALL: [Self; 3] = [Self::Tags, Self::Tools, Self::Legacy];

    /// The name of the variable holding the list.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn variable_name(self) -> &'static str {
        match self {
            Self::Tags => "HiddenTags",
            Self::Legacy => "HiddenLegacy",
            Self::Tools => "HiddenTools",
        }
    }
}

/// Builds the value stored in [`HiddenList::Tags`] for a loader, `<volume>:<path>`.
#[must_use = "Has no effect if the result is unused"]
pub fn loader_tag(volume_name: &str, path: &str) -> String {
    alloc::format!("{volume_name}:{path}")
}

/// Splits the content of a list variable into its values.
#[must_use = "Has no effect if the result is unused"]
pub fn parse(data: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(data)
        .trim_end_matches('\0')
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Reads a list. A missing or unreadable variable is an empty list.
pub fn read<F: Firmware + ?Sized>(firmware: &mut F, list: HiddenList) -> Vec<String> {
    match firmware.variable(list.variable_name(), VarVendor::Manager) {
        Ok(data) => data.as_deref().map(parse).unwrap_or_default(),
        Err(e) => {
            warn!("Could not read {}: {e}", list.variable_name());
            Vec::new()
        }
    }
}

/// Writes a list.
fn write<F: Firmware + ?Sized>(firmware: &mut F, list: HiddenList, values: &[String]) -> BootResult<()> {
    firmware.set_variable(list.variable_name(), VarVendor::Manager, values.join(",").as_bytes())
}

/// Appends a value to a list. Returns `false` if it was already there.
///
/// # Errors
///
/// May return an `Error` if the variable could not be written.
pub fn append<F: Firmware + ?Sized>(firmware: &mut F, list: HiddenList, value: &str) -> BootResult<bool> {
    let mut values = read(firmware, list);
    if values.iter().any(|v| v == value) {
        return Ok(false);
    }
    values.push(value.to_string());
    write(firmware, list, &values)?;
    Ok(true)
}

/// Removes a value from a list. Returns `false` if it was not there.
///
/// # Errors
///
/// May return an `Error` if the variable could not be written.
pub fn remove<F: Firmware + ?Sized>(firmware: &mut F, list: HiddenList, value: &str) -> BootResult<bool> {
    let mut values = read(firmware, list);
    let len = values.len();
    values.retain(|v| v != value);
    if values.len() == len {
        return Ok(false);
    }
    write(firmware, list, &values)?;
    Ok(true)
}

/// Adds every hidden value to the matching exclusion list of the configuration.
///
/// Returns `true` if any list holds a value.
pub fn merge_into<F: Firmware + ?Sized>(firmware: &mut F, config: &mut ScanConfig) -> bool {
    let mut any = false;
    for list in HiddenList::ALL {
        let values = read(firmware, list);
        any |= !values.is_empty();
        let target = match list {
            HiddenList::Tags => &mut config.dont_scan_files,
            HiddenList::Legacy => &mut config.dont_scan_volumes,
            HiddenList::Tools => &mut config.dont_scan_tools,
        };
        target.extend(values);
    }
    any
}
