// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Guesses what a loader boots from its path and volume.
//!
//! The rules are checked in order and the first one that matches decides the [`OsType`], the shortcut letter and
//! the graphics mode. Icon hints are collected regardless of the rule: the name of the directory holding the
//! loader comes first, then every word of the volume label, then whatever the matching rule adds.

use alloc::{borrow::ToOwned, string::String, vec::Vec};

use crate::{
    config::{GraphicsFor, ScanConfig},
    menu::{
        OsType,
        options_file::read_options_file,
        subscreen::{DIAGS_PATH, add_initrd_to_options},
    },
    scan::{
        initrd::{find_initrd, version_token},
        loader_list::is_kernel_name,
    },
    system::{
        fs::VolumeFs,
        helper::{basename, contains_ignore_case, eq_ignore_case, last_dir_name, words},
        volume::{DiskKind, Volume},
    },
};

/// The path of the macOS loader.
pub const MACOS_LOADER_PATH: &str = "System\\Library\\CoreServices\\boot.efi";

/// Release files that name the distribution of a Linux root filesystem.
const RELEASE_FILES: [&str; 2] = ["etc\\lsb-release", "etc\\os-release"];

/// Release file keys holding the distribution name.
const RELEASE_KEYS: [&str; 3] = ["ID", "NAME", "DISTRIB_ID"];

/// File names of the Windows boot manager.
const WINDOWS_NAMES: [&str; 4] = ["cdboot.efi", "bootmgr.efi", "bootmgfw.efi", "bkpbootmgfw.efi"];

/// What could be told about a loader.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoaderDefaults {
    /// What the loader boots.
    pub os_type: OsType,

    /// The uppercase shortcut letter.
    pub shortcut: Option<char>,

    /// The load options, for Linux kernels.
    pub options: Option<String>,

    /// The initrd, for Linux kernels.
    pub initrd: Option<String>,

    /// Icon names, best first.
    pub icon_hints: Vec<String>,

    /// If the loader starts in graphics mode.
    pub graphics: bool,
}

impl LoaderDefaults {
    /// Adds an icon hint. Hints are kept in the order they were found, repeats included.
    fn hint(&mut self, hint: &str) {
        if !hint.is_empty() {
            self.icon_hints.push(hint.to_owned());
        }
    }

    /// Adds a comma separated list of icon hints.
    fn hints(&mut self, hints: &str) {
        for hint in hints.split(',') {
            self.hint(hint);
        }
    }

    /// Sets the OS type and shortcut of a matched rule.
    fn set(&mut self, os_type: OsType, hints: &str, shortcut: char) {
        self.os_type = os_type;
        self.hints(hints);
        self.shortcut = Some(shortcut);
    }

    /// Sets the shortcut only if the directory name did not already provide one.
    fn set_soft(&mut self, os_type: OsType, hints: &str, shortcut: char) {
        self.os_type = os_type;
        self.hints(hints);
        self.shortcut.get_or_insert(shortcut);
    }
}

/// Adds distribution hints from the release files of the volume and the kernel name.
fn guess_distribution(defaults: &mut LoaderDefaults, fs: &mut dyn VolumeFs, loader_path: &str) {
    for file in RELEASE_FILES {
        let Ok(content) = fs.read(file) else {
            continue;
        };
        let content = String::from_utf8_lossy(&content);
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            if RELEASE_KEYS.iter().any(|k| eq_ignore_case(k, key.trim())) {
                for word in words(value.trim().trim_matches(['"', '\''])) {
                    defaults.hint(&word);
                }
            }
        }
    }

    if contains_ignore_case(loader_path, ".fc") {
        defaults.hint("fedora");
    }
    if contains_ignore_case(loader_path, ".el") {
        defaults.hint("redhat");
    }
}

/// Builds the default options of a kernel from the first record of its options file and its initrd.
fn main_linux_options(fs: &mut dyn VolumeFs, loader_path: &str) -> (Option<String>, Option<String>) {
    let initrd = find_initrd(fs, loader_path);
    let version = initrd.as_deref().and_then(|initrd| version_token(basename(initrd)));

    let options = read_options_file(fs, loader_path)
        .and_then(|records| records.into_iter().next())
        .map(|record| record.options_for(version));

    let options = add_initrd_to_options(options.as_deref(), initrd.as_deref());
    (options, initrd)
}

/// Works out the defaults of a loader.
///
/// `loader_path` is the path of the loader on `volume`, `title` is the title of its entry.
#[must_use = "Has no effect if the result is unused"]
pub fn classify(loader_path: &str, title: &str, volume: &mut Volume, config: &ScanConfig) -> LoaderDefaults {
    let mut defaults = LoaderDefaults::default();
    let is_network = volume.kind == DiskKind::Network;

    let mut name = basename(loader_path).to_owned();
    if is_network {
        name.push(' ');
        name.push_str(title);
    } else {
        if let Some(dir) = last_dir_name(loader_path) {
            defaults.shortcut = dir.chars().next().map(|c| c.to_ascii_uppercase());
            defaults.hint(&dir);
        }
        for word in words(&volume.name) {
            defaults.hint(&word);
        }
    }

    let graphics_for = config.graphics_for;
    if is_kernel_name(&name) {
        if !is_network && let Some(fs) = volume.fs() {
            guess_distribution(&mut defaults, fs, loader_path);
            (defaults.options, defaults.initrd) = main_linux_options(fs, loader_path);
        }
        defaults.set_soft(OsType::Linux, "linux", 'L');
        defaults.graphics = graphics_for.contains(GraphicsFor::LINUX);
    } else if contains_ignore_case(loader_path, "refit") {
        defaults.set(OsType::BootManager, "refit", 'R');
    } else if contains_ignore_case(loader_path, "refind") {
        defaults.set(OsType::BootManager, "refind", 'R');
    } else if contains_ignore_case(loader_path, "bootscan") {
        defaults.set(OsType::BootManager, "bootscan", 'R');
    } else if contains_ignore_case(loader_path, MACOS_LOADER_PATH) {
        defaults.set(OsType::MacOs, "mac", 'M');
        defaults.graphics = graphics_for.contains(GraphicsFor::OSX);
    } else if eq_ignore_case(&name, basename(DIAGS_PATH)) {
        defaults.hint("hwtest");
    } else if eq_ignore_case(&name, "e.efi") || contains_ignore_case(&name, "elilo") {
        defaults.set_soft(OsType::Elilo, "elilo,linux", 'L');
        defaults.graphics = graphics_for.contains(GraphicsFor::ELILO);
    } else if contains_ignore_case(&name, "grub") {
        defaults.set(OsType::Grub, "grub,linux", 'G');
        defaults.graphics = graphics_for.contains(GraphicsFor::GRUB);
    } else if WINDOWS_NAMES.iter().any(|n| eq_ignore_case(&name, n)) {
        defaults.set(OsType::Windows, "win8", 'W');
        defaults.graphics = graphics_for.contains(GraphicsFor::WINDOWS);
    } else if eq_ignore_case(&name, "xom.efi") {
        defaults.set(OsType::Xom, "xom,win,win8", 'W');
        defaults.graphics = graphics_for.contains(GraphicsFor::WINDOWS);
    } else if contains_ignore_case(&name, "ipxe") {
        defaults.set(OsType::Network, "network", 'N');
    }

    defaults
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::fs::mem::MemVolume;
    use alloc::boxed::Box;

    fn volume(label: &str, mem: MemVolume) -> Volume {
        Volume::new(label, DiskKind::Internal, Box::new(mem))
    }

    #[test]
    fn test_kernel() {
        let mut root = volume(
            "fedora-root",
            MemVolume::new("fedora-root")
                .with_file("etc\\os-release", b"NAME=\"Fedora Linux\"\nID=fedora\nVERSION_ID=40\n")
                .with_file("boot\\vmlinuz-6.8.5-301.fc40.x86_64", b"kernel")
                .with_file("boot\\initramfs-6.8.5-301.fc40.x86_64.img", b"initrd")
                .with_file("boot\\bootscan_linux.conf", b"Standard \"ro root=LABEL=root %v\"\n"),
        );
        let config = ScanConfig::default();
        let defaults = classify("\\boot\\vmlinuz-6.8.5-301.fc40.x86_64", "", &mut root, &config);

        assert_eq!(defaults.os_type, OsType::Linux);
        assert_eq!(defaults.shortcut, Some('B'));
        assert_eq!(
            defaults.icon_hints,
            ["boot", "fedora", "root", "Fedora", "Linux", "fedora", "fedora", "linux"]
        );
        assert_eq!(
            defaults.options.as_deref(),
            Some("ro root=LABEL=root 6.8.5-301.fc40.x86_64 initrd=\\boot\\initramfs-6.8.5-301.fc40.x86_64.img")
        );
        assert!(!defaults.graphics);
    }

    #[test]
    fn test_products() {
        let config = ScanConfig::default();
        let mut esp = volume("EFI", MemVolume::new("EFI"));

        let cases = [
            ("\\EFI\\Microsoft\\Boot\\bootmgfw.efi", OsType::Windows, Some('W'), true),
            ("\\EFI\\ubuntu\\grubx64.efi", OsType::Grub, Some('G'), false),
            ("\\System\\Library\\CoreServices\\boot.efi", OsType::MacOs, Some('M'), true),
            ("\\EFI\\refind\\refind_x64.efi", OsType::BootManager, Some('R'), false),
            ("\\EFI\\elilo\\elilo.efi", OsType::Elilo, Some('E'), false),
            ("\\xom.efi", OsType::Xom, Some('W'), true),
            ("\\EFI\\tools\\ipxe.efi", OsType::Network, Some('N'), false),
            ("\\EFI\\other\\thing.efi", OsType::Unknown, Some('O'), false),
        ];
        for (path, os_type, shortcut, graphics) in cases {
            let defaults = classify(path, "", &mut esp, &config);
            assert_eq!(defaults.os_type, os_type, "{path}");
            assert_eq!(defaults.shortcut, shortcut, "{path}");
            assert_eq!(defaults.graphics, graphics, "{path}");
        }
    }

    #[test]
    fn test_network_volume() {
        let config = ScanConfig::default();
        let mut net = Volume::new("", DiskKind::Network, Box::new(MemVolume::new("")));
        let defaults = classify("\\boot.efi", "iPXE", &mut net, &config);
        assert_eq!(defaults.os_type, OsType::Network);
        assert_eq!(defaults.icon_hints, ["network"]);
    }

    #[test]
    fn test_hwtest() {
        let config = ScanConfig::default();
        let mut mac = volume("Macintosh HD", MemVolume::new("Macintosh HD"));
        let defaults = classify(&alloc::format!("\\{DIAGS_PATH}"), "", &mut mac, &config);
        assert_eq!(defaults.os_type, OsType::Unknown);
        assert!(defaults.icon_hints.iter().any(|h| h == "hwtest"));
    }
}
