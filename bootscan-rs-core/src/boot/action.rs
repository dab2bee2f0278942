// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The built in actions of the menu that do not start an image.

use alloc::{format, string::String, vec::Vec};

use uefi::Status;

use crate::{
    BootResult,
    menu::{Action, EntryKind, HiddenList, MenuEntry, MenuScreen},
    scan::{hidden, tools::BOOT_TO_FW_UI},
    system::{
        firmware::Firmware,
        variable::{UefiVariable, VarVendor},
    },
};

/// The variable holding the boot indications for the firmware.
const OS_INDICATIONS: &str = "OsIndications";

/// The variable holding the System Integrity Protection policy on Macs.
const CSR_ACTIVE_CONFIG: &str = "csr-active-config";

/// The title of the screen listing the hidden entries.
pub const HIDDEN_TITLE: &str = "Manage Hidden Tags";

/// The title of the about screen.
pub const ABOUT_TITLE: &str = "About bootscan";

/// Asks the firmware to show its setup on the next boot.
///
/// Bits already set in `OsIndications` are kept.
///
/// # Errors
///
/// May return an `Error` if the variable could not be read or written.
pub fn request_firmware_setup<F: Firmware + ?Sized>(firmware: &mut F) -> BootResult<()> {
    let current = firmware
        .variable(OS_INDICATIONS, VarVendor::Global)?
        .map_or(0, |data| u64::from_bytes(&data));
    firmware.set_variable(
        OS_INDICATIONS,
        VarVendor::Global,
        &(current | BOOT_TO_FW_UI).to_bytes(),
    )
}

/// Gets the value that follows the current one in the list, wrapping around.
///
/// If the current value is not in the list, the first value follows it.
#[must_use = "Has no effect if the result is unused"]
pub fn next_csr_value(values: &[u32], current: Option<u32>) -> Option<u32> {
    let next = current
        .and_then(|current| values.iter().position(|&value| value == current))
        .map_or(0, |i| (i + 1) % values.len());
    values.get(next).copied()
}

/// Switches the System Integrity Protection policy to the next configured value, returning the new value.
///
/// # Errors
///
/// May return an `Error` if no values are configured, or if the variable could not be read or written.
pub fn rotate_csr<F: Firmware + ?Sized>(firmware: &mut F, values: &[u32]) -> BootResult<u32> {
    let current = firmware
        .variable(CSR_ACTIVE_CONFIG, VarVendor::Apple)?
        .map(|data| u32::from_bytes(&data));
    let next = next_csr_value(values, current).ok_or(uefi::Error::from(Status::NOT_FOUND))?;
    firmware.set_variable(CSR_ACTIVE_CONFIG, VarVendor::Apple, &next.to_bytes())?;
    Ok(next)
}

/// Describes a System Integrity Protection policy.
#[must_use = "Has no effect if the result is unused"]
pub fn csr_description(value: u32) -> String {
    let state = if value == 0 { "Enabled" } else { "Disabled" };
    format!("System Integrity Protection is {state} (0x{value:x})")
}

/// Builds the about screen.
pub fn about_screen<F: Firmware + ?Sized>(firmware: &mut F, extension_installed: bool) -> MenuScreen {
    let info = firmware.info();
    let secure_boot = if firmware.secure_boot_enabled() { "active" } else { "inactive" };
    let shim = match (firmware.shim_present(), extension_installed) {
        (true, true) => "present, verifying through bootscan",
        (true, false) => "present",
        (false, _) => "absent",
    };

    let mut screen = MenuScreen::new(ABOUT_TITLE);
    screen.info_lines = [
        format!("bootscan Version {}", env!("CARGO_PKG_VERSION")),
        String::new(),
        "Running on:".into(),
        format!(" EFI Revision {}.{:02}", info.uefi_major, info.uefi_minor),
        format!(" Secure Boot {secure_boot}; shim {shim}"),
        format!(
            " Firmware: {} {}.{:02}",
            info.vendor,
            info.revision >> 16,
            info.revision & 0xffff
        ),
    ]
    .into();
    if let Ok(Some(data)) = firmware.variable(CSR_ACTIVE_CONFIG, VarVendor::Apple) {
        screen.info_lines.push(format!(" {}", csr_description(u32::from_bytes(&data))));
    }
    screen.push(MenuEntry::return_entry());
    screen
}

/// Builds the screen listing every hidden entry. Picking one of them shows it again.
pub fn hidden_screen<F: Firmware + ?Sized>(firmware: &mut F) -> MenuScreen {
    let mut screen = MenuScreen::new(HIDDEN_TITLE);
    for list in HiddenList::ALL {
        for value in hidden::read(firmware, list) {
            let title = match list {
                HiddenList::Tags => format!("Loader {value}"),
                HiddenList::Tools => format!("Tool {value}"),
                HiddenList::Legacy => format!("Legacy volume {value}"),
            };
            screen.push(MenuEntry::new(
                &title,
                EntryKind::Action(Action::Unhide { list, value }),
            ));
        }
    }
    if screen.is_empty() {
        screen.info_lines.push("No hidden entries".into());
    } else {
        screen.info_lines = Vec::from(["Select an entry to show it again".into()]);
    }
    screen.push(MenuEntry::return_entry());
    screen
}
