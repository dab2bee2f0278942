// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Builds the whole menu model in one scan pass.
//!
//! A pass enumerates the volumes, reads the configuration from the boot manager's directory, merges the hidden
//! lists into it, scans every volume of every configured source for loaders, adds the tools, and finally assigns
//! digit shortcuts, the default entry and the timeout. The result replaces the previous model as a whole.

use alloc::{string::String, vec::Vec};

use log::{debug, info};

use crate::{
    BootResult,
    config::{ScanConfig, ScanSource},
    menu::MenuScreen,
    system::{
        firmware::Firmware,
        helper::{Arch, contains_ignore_case, dirname},
        variable::{UefiVariable, VarVendor},
        volume::{DiskKind, VolumeTable},
    },
};

pub mod classify;
pub mod hidden;
pub mod initrd;
pub mod loader_list;
pub mod loaders;
pub mod netboot;
pub mod tools;
pub mod validate;

use loaders::LoaderScanner;
use tools::{BOOT_TO_FW_UI, ToolContext, ToolScanner};

/// The variable holding the title of the last launched entry.
pub const PREVIOUS_BOOT: &str = "PreviousBoot";

/// The selection that stands for the previously launched entry.
const PREVIOUS_BOOT_SELECTION: &str = "+";

/// The timeout text when the timeout shuts the computer down.
const SHUTDOWN_TIMEOUT_TEXT: &str = "Shutdown";

/// Everything one scan pass produces.
pub struct ScanPass {
    /// The configuration, with the hidden lists merged in.
    pub config: ScanConfig,

    /// The volumes the entries refer to.
    pub volumes: VolumeTable,

    /// The main menu.
    pub menu: MenuScreen,

    /// If any hidden list holds a value.
    pub has_hidden: bool,
}

/// Encodes the title of an entry as stored in [`PREVIOUS_BOOT`], UTF-16 with a terminating nul.
#[must_use = "Has no effect if the result is unused"]
pub fn encode_previous_boot(title: &str) -> Vec<u8> {
    title
        .encode_utf16()
        .chain(core::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Decodes the content of [`PREVIOUS_BOOT`].
#[must_use = "Has no effect if the result is unused"]
pub fn decode_previous_boot(data: &[u8]) -> String {
    let units = data
        .chunks_exact(2)
        .map(u16::from_bytes)
        .take_while(|&unit| unit != 0);
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Reads the title of the previously launched entry.
pub fn read_previous_boot<F: Firmware + ?Sized>(firmware: &mut F) -> Option<String> {
    firmware
        .variable(PREVIOUS_BOOT, VarVendor::Manager)
        .ok()
        .flatten()
        .map(|data| decode_previous_boot(&data))
        .filter(|title| !title.is_empty())
}

/// The kind of disk scanned for a source, or [`None`] for sources that are not volume scans.
const fn source_kind(source: ScanSource) -> Option<DiskKind> {
    match source {
        ScanSource::Internal => Some(DiskKind::Internal),
        ScanSource::External => Some(DiskKind::External),
        ScanSource::Optical => Some(DiskKind::Optical),
        ScanSource::Netboot | ScanSource::Manual => None,
    }
}

/// Gives the first nine operating system entries the digits `1` to `9`.
pub fn assign_digits(menu: &mut MenuScreen) {
    let digits = ('1'..='9').collect::<Vec<_>>();
    for (entry, digit) in menu.iter_mut().filter(|entry| entry.row == 0).zip(digits) {
        entry.digit = Some(digit);
    }
}

/// Finds the default entry of the menu.
///
/// Every selection is tried in order, with `+` standing for the previously launched entry. The first entry whose
/// title contains the selection, or whose image path ends with it, wins. Without a match the first entry is the
/// default.
#[must_use = "Has no effect if the result is unused"]
pub fn find_default(menu: &MenuScreen, selections: &[String], previous: Option<&str>) -> usize {
    for selection in selections {
        let selection = if selection == PREVIOUS_BOOT_SELECTION {
            match previous {
                Some(previous) => previous,
                None => continue,
            }
        } else {
            selection.as_str()
        };
        if selection.is_empty() {
            continue;
        }

        let found = menu.iter().position(|entry| {
            contains_ignore_case(&entry.title, selection)
                || entry.loader().is_some_and(|loader| {
                    loader.path.len() >= selection.len()
                        && loader
                            .path
                            .get(loader.path.len() - selection.len()..)
                            .is_some_and(|tail| tail.eq_ignore_ascii_case(selection))
                })
        });
        if let Some(index) = found {
            return index;
        }
    }
    0
}

/// Runs one scan pass.
///
/// # Errors
///
/// May return an `Error` if the volumes could not be enumerated. Problems with single volumes, directories, or
/// files are logged and skipped.
pub fn build_main_menu<F: Firmware + ?Sized>(firmware: &mut F) -> BootResult<ScanPass> {
    let arch = Arch::current();
    let mut volumes = firmware.volumes()?;
    let self_path = firmware.self_path();
    let self_dir = self_path.as_deref().map(dirname);

    let self_fs = volumes
        .self_volume()
        .and_then(|id| volumes.get_mut(id))
        .and_then(|volume| volume.fs());
    let mut config = ScanConfig::load_or_default(self_fs, self_dir.as_deref().unwrap_or_default());
    let has_hidden = hidden::merge_into(firmware, &mut config);

    let mut menu = MenuScreen::main_menu();
    let mut scanner = LoaderScanner::new(&config, self_path.as_deref(), arch);
    for source in config.scan_for.iter().copied() {
        if source == ScanSource::Netboot {
            debug!("Scanning for network boot servers");
            netboot::scan_netboot(firmware, &mut volumes, &scanner, &mut menu);
            continue;
        }
        let Some(kind) = source_kind(source) else {
            continue;
        };
        debug!("Scanning {kind:?} volumes");
        for id in volumes.ids() {
            if let Some(volume) = volumes.get_mut(id)
                && volume.kind == kind
            {
                scanner.scan_volume(id, volume, &mut menu);
            }
        }
    }

    let firmware_setup = firmware
        .variable("OsIndicationsSupported", VarVendor::Global)
        .ok()
        .flatten()
        .is_some_and(|data| u64::from_bytes(&data) & BOOT_TO_FW_UI != 0);
    let context = ToolContext {
        arch,
        self_dir,
        has_hidden,
        firmware_setup,
        apple_recovery: scanner.into_apple_recovery(),
    };
    ToolScanner::new(&config, &context).scan(&mut volumes, &mut menu);

    assign_digits(&mut menu);
    let previous = read_previous_boot(firmware);
    menu.default = find_default(&menu, &config.default_selection, previous.as_deref());
    menu.timeout = u32::try_from(config.timeout).ok();
    if config.shutdown_after_timeout {
        menu.timeout_text = Some(SHUTDOWN_TIMEOUT_TEXT.into());
    }

    info!("Found {} entries on {} volumes", menu.len(), volumes.len());
    Ok(ScanPass {
        config,
        volumes,
        menu,
        has_hidden,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        menu::{EntryKind, LoaderEntry, MenuEntry, OsType},
        system::{
            firmware::scripted::ScriptedFirmware,
            fs::mem::{MemVolume, loader},
        },
    };
    use alloc::{borrow::ToOwned, format, vec};

    fn titles(menu: &MenuScreen) -> Vec<&str> {
        menu.iter().map(|entry| entry.title.as_str()).collect()
    }

    #[test]
    fn test_previous_boot_encoding() {
        let data = encode_previous_boot("Boot Windows from ESP");
        assert_eq!(data.len(), 2 * "Boot Windows from ESP".len() + 2);
        assert_eq!(decode_previous_boot(&data), "Boot Windows from ESP");
        assert_eq!(decode_previous_boot(&[]), "");
    }

    #[test]
    fn test_find_default() {
        let mut menu = MenuScreen::main_menu();
        for (title, path) in [
            ("Boot Windows", "\\EFI\\Microsoft\\Boot\\bootmgfw.efi"),
            ("Boot Ubuntu", "\\EFI\\ubuntu\\grubx64.efi"),
        ] {
            menu.push(MenuEntry::new(
                title,
                EntryKind::Loader(LoaderEntry {
                    path: path.to_owned(),
                    ..LoaderEntry::default()
                }),
            ));
        }

        let selections = vec!["+".to_owned(), "GRUBX64.EFI".to_owned()];
        assert_eq!(find_default(&menu, &selections, None), 1);
        assert_eq!(find_default(&menu, &selections, Some("windows")), 0);
        assert_eq!(find_default(&menu, &["nothing".to_owned()], None), 0);
    }

    #[test]
    fn test_assign_digits() {
        let mut menu = MenuScreen::main_menu();
        for i in 0..11 {
            menu.push(MenuEntry::new(&format!("OS {i}"), EntryKind::Loader(LoaderEntry::default())));
            if i == 2 {
                menu.push(MenuEntry::return_entry());
            }
        }
        assign_digits(&mut menu);
        assert_eq!(menu.get(0).and_then(|e| e.digit), Some('1'));
        assert_eq!(menu.get(3).and_then(|e| e.digit), None);
        assert_eq!(menu.get(4).and_then(|e| e.digit), Some('4'));
        assert_eq!(menu.get(9).and_then(|e| e.digit), Some('9'));
        assert_eq!(menu.get(10).and_then(|e| e.digit), None);
    }

    #[test]
    fn test_build_main_menu() {
        let fallback = Arch::current().fallback_path();
        let mut fw = ScriptedFirmware::default()
            .with_volume(
                "ESP",
                DiskKind::Internal,
                MemVolume::new("ESP")
                    .with_file("EFI\\bootscan\\bootscan.efi", &loader(b"self"))
                    .with_file("EFI\\bootscan\\bootscan.conf", b"timeout -1\nshowtools reboot,exit,hidden_tags\n")
                    .with_file("EFI\\ubuntu\\grubx64.efi", &loader(b"grub"))
                    .with_file("EFI\\Microsoft\\Boot\\bootmgfw.efi", &loader(b"windows")),
                true,
            )
            .with_volume(
                "USB",
                DiskKind::External,
                MemVolume::new("USB").with_file(&fallback, &loader(b"usb")),
                false,
            );
        fw.self_path = Some("\\EFI\\bootscan\\bootscan.efi".to_owned());
        fw.variables.insert(
            (PREVIOUS_BOOT.to_owned(), VarVendor::Manager),
            encode_previous_boot("\\EFI\\ubuntu\\grubx64.efi"),
        );
        fw.variables.insert(
            ("HiddenTags".to_owned(), VarVendor::Manager),
            b"ESP:\\EFI\\nothing.efi".to_vec(),
        );

        let pass = build_main_menu(&mut fw);
        assert!(pass.is_ok());
        let Ok(pass) = pass else { return };

        assert_eq!(
            titles(&pass.menu),
            [
                "Microsoft EFI boot",
                "\\EFI\\ubuntu\\grubx64.efi",
                "Fallback boot loader",
                "Reboot Computer",
                "Exit bootscan",
                "Manage Hidden Tags Menu",
            ]
        );
        assert!(pass.has_hidden);
        assert_eq!(pass.menu.timeout, None);
        assert_eq!(pass.menu.default, 1);
        assert_eq!(pass.menu.get(2).and_then(|e| e.digit), Some('3'));
        assert_eq!(pass.menu.get(3).and_then(|e| e.digit), None);
    }

    #[test]
    fn test_build_main_menu_netboot() {
        let mut fw = ScriptedFirmware::default().with_volume(
            "ESP",
            DiskKind::Internal,
            MemVolume::new("ESP")
                .with_file("EFI\\bootscan\\bootscan.conf", b"scanfor internal,netboot\nshowtools reboot\n")
                .with_file("EFI\\ubuntu\\grubx64.efi", &loader(b"grub"))
                .with_file("EFI\\tools\\ipxe_discover.efi", &loader(b"discover"))
                .with_file("EFI\\tools\\ipxe.efi", &loader(b"ipxe")),
            true,
        );
        fw.self_path = Some("\\EFI\\bootscan\\bootscan.efi".to_owned());
        fw.discovered = Some("tftp://192.168.1.2/boot.efi".to_owned());

        let pass = build_main_menu(&mut fw);
        assert!(pass.is_ok());
        let Ok(pass) = pass else { return };

        assert_eq!(
            titles(&pass.menu),
            ["\\EFI\\ubuntu\\grubx64.efi", "tftp://192.168.1.2/boot.efi", "Reboot Computer"]
        );
        let entry = pass.menu.get(1).expect("network entry");
        assert_eq!(entry.shortcut, Some('N'));
        assert_eq!(entry.badge, Some(DiskKind::Network));
        assert!(entry.loader().is_some_and(|loader| {
            loader.os_type == OsType::Network
                && pass
                    .volumes
                    .get(loader.volume)
                    .is_some_and(|volume| volume.kind == DiskKind::Network)
        }));
        assert_eq!(pass.volumes.len(), 2);
    }

    #[test]
    fn test_shutdown_timeout_text() {
        let mut fw = ScriptedFirmware::default().with_volume(
            "ESP",
            DiskKind::Internal,
            MemVolume::new("ESP").with_file("EFI\\bootscan\\bootscan.conf", b"shutdown_after_timeout true\n"),
            true,
        );
        fw.self_path = Some("\\EFI\\bootscan\\bootscan.efi".to_owned());

        let pass = build_main_menu(&mut fw);
        assert_eq!(
            pass.ok().and_then(|pass| pass.menu.timeout_text),
            Some("Shutdown".to_owned())
        );
    }
}
