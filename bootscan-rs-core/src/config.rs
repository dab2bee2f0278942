// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`ScanConfig`], the configuration file of the boot manager.
//!
//! This parses space separated key value pairs from `bootscan.conf`, which lives in the same directory as the boot
//! manager itself. The file is read again at the start of every scan pass, so edits made from a shell take effect
//! after pressing Escape in the main menu.
//!
//! Example configuration:
//!
//! ```text
//! # Seconds until the default entry boots, -1 waits forever
//! timeout 10
//!
//! # Volumes and directories that never produce entries
//! dont_scan_volumes "Recovery HD"
//! dont_scan_dirs ESP:\EFI\old,EFI\backup
//!
//! # Keep every kernel as its own entry
//! fold_linux_kernels false
//!
//! # Boot the last used entry, or anything with "Arch" in its title
//! default_selection +,Arch
//! ```
//!
//! Lists are comma separated. A quoted value keeps its commas, so `"a,b",c` holds two items.

use alloc::{
    borrow::ToOwned,
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};
use bitflags::bitflags;
use log::{LevelFilter, warn};
use thiserror::Error;

use crate::system::{
    fs::{FsError, VolumeFs},
    helper::{Arch, join_path},
};

/// The file name of the configuration file.
pub const FILE_NAME: &str = "bootscan.conf";

/// An error that may result from loading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file exists, but could not be read.
    #[error("Could not read configuration file")]
    Unreadable(#[from] FsError),
}

bitflags! {
    /// Parts of the user interface that can be hidden.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct HideUi: u8 {
        /// Hide the single-user boot option of macOS.
        const SINGLE_USER = 1 << 0;

        /// Hide the safe mode boot option of macOS.
        const SAFE_MODE = 1 << 1;

        /// Hide the hardware test boot option of macOS.
        const HWTEST = 1 << 2;

        /// Hide the badges showing the kind of disk an entry is on.
        const BADGES = 1 << 3;
    }
}

bitflags! {
    /// The loaders that are started in graphics mode rather than text mode.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct GraphicsFor: u8 {
        /// macOS.
        const OSX = 1 << 0;

        /// Linux kernels.
        const LINUX = 1 << 1;

        /// ELILO.
        const ELILO = 1 << 2;

        /// GRUB.
        const GRUB = 1 << 3;

        /// Windows.
        const WINDOWS = 1 << 4;
    }
}

/// A source of menu entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanSource {
    /// Loaders on internal disks.
    Internal,

    /// Loaders on removable disks.
    External,

    /// Loaders on optical discs.
    Optical,

    /// Network boot entries.
    Netboot,

    /// Entries written into the configuration file.
    Manual,
}

impl ScanSource {
    /// Parses the name of a source.
    #[must_use = "Has no effect if the result is unused"]
    pub fn from_name(name: &str) -> Option<Self> {
        match &*name.to_ascii_lowercase() {
            "internal" => Some(Self::Internal),
            "external" => Some(Self::External),
            "optical" => Some(Self::Optical),
            "netboot" => Some(Self::Netboot),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// An entry in the second row of the main menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    /// An EFI shell.
    Shell,

    /// A memory tester.
    Memtest,

    /// The hybrid MBR tool.
    Gptsync,

    /// The GPT partitioning tool.
    Gdisk,

    /// macOS recovery.
    AppleRecovery,

    /// Windows recovery.
    WindowsRecovery,

    /// Machine owner key management.
    MokTool,

    /// The firmware update utility.
    FwUpdate,

    /// Information about the boot manager.
    About,

    /// The hidden tag manager.
    HiddenTags,

    /// Shut down the computer.
    Shutdown,

    /// Reboot the computer.
    Reboot,

    /// Reboot into the firmware setup.
    Firmware,

    /// Exit the boot manager.
    Exit,

    /// Rotate the macOS System Integrity Protection policy.
    CsrRotate,
}

impl ToolKind {
    /// Parses the name of a tool.
    #[must_use = "Has no effect if the result is unused"]
    pub fn from_name(name: &str) -> Option<Self> {
        match &*name.to_ascii_lowercase() {
            "shell" => Some(Self::Shell),
            "memtest" | "memtest86" => Some(Self::Memtest),
            "gptsync" => Some(Self::Gptsync),
            "gdisk" => Some(Self::Gdisk),
            "apple_recovery" => Some(Self::AppleRecovery),
            "windows_recovery" => Some(Self::WindowsRecovery),
            "mok_tool" => Some(Self::MokTool),
            "fwupdate" => Some(Self::FwUpdate),
            "about" => Some(Self::About),
            "hidden_tags" => Some(Self::HiddenTags),
            "shutdown" => Some(Self::Shutdown),
            "reboot" => Some(Self::Reboot),
            "firmware" => Some(Self::Firmware),
            "exit" => Some(Self::Exit),
            "csr_rotate" => Some(Self::CsrRotate),
            _ => None,
        }
    }
}

/// The configuration of the boot manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    /// Seconds before the default entry is booted. `0` boots immediately, `-1` never times out.
    pub timeout: i32,

    /// Shut down instead of booting the default entry when the timeout expires.
    pub shutdown_after_timeout: bool,

    /// The sources scanned for entries, in order.
    pub scan_for: Vec<ScanSource>,

    /// Extra directories scanned on every volume, as `[volume:]path`.
    pub also_scan_dirs: Vec<String>,

    /// Volumes that are never scanned, by label, partition name, or partition GUID.
    pub dont_scan_volumes: Vec<String>,

    /// Directories that are never scanned, as `[volume:]path`.
    pub dont_scan_dirs: Vec<String>,

    /// Files that never become loaders, as `[volume:][path\]file`.
    pub dont_scan_files: Vec<String>,

    /// Tools that are never shown, as `[volume:][path\]file`.
    pub dont_scan_tools: Vec<String>,

    /// Scan for Linux kernels without an `.efi` extension.
    pub scan_all_linux_kernels: bool,

    /// Fold kernels in the same directory into a single entry.
    pub fold_linux_kernels: bool,

    /// Parts of the interface that are hidden.
    pub hide_ui: HideUi,

    /// The entries of the second row, in order.
    pub show_tools: Vec<ToolKind>,

    /// The Windows recovery loaders, as `[volume:]path`.
    pub windows_recovery_files: Vec<String>,

    /// The loaders started in graphics mode.
    pub graphics_for: GraphicsFor,

    /// Title or path fragments picking the default entry. `+` is the previously booted entry.
    pub default_selection: Vec<String>,

    /// The System Integrity Protection values cycled through by the SIP rotation action.
    pub csr_values: Vec<u32>,

    /// The most verbose log level that is printed.
    pub log_level: LevelFilter,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let arch = Arch::current().suffix();
        Self {
            timeout: 20,
            shutdown_after_timeout: false,
            scan_for: vec![
                ScanSource::Internal,
                ScanSource::External,
                ScanSource::Optical,
                ScanSource::Manual,
            ],
            also_scan_dirs: vec!["boot".to_owned()],
            dont_scan_volumes: Vec::new(),
            dont_scan_dirs: Vec::new(),
            dont_scan_files: [
                "shim.efi",
                "shim-fedora.efi",
                "shimx64.efi",
                "PreLoader.efi",
                "TextMode.efi",
                "ebounce.efi",
                "GraphicsConsole.efi",
                "MokManager.efi",
                "HashTool.efi",
                "HashTool-signed.efi",
                "bootmgr.efi",
            ]
            .into_iter()
            .map(ToOwned::to_owned)
            .chain([format!("fb{arch}.efi"), format!("mm{arch}.efi")])
            .collect(),
            dont_scan_tools: Vec::new(),
            scan_all_linux_kernels: true,
            fold_linux_kernels: true,
            hide_ui: HideUi::empty(),
            show_tools: vec![
                ToolKind::Shell,
                ToolKind::Memtest,
                ToolKind::Gdisk,
                ToolKind::AppleRecovery,
                ToolKind::WindowsRecovery,
                ToolKind::MokTool,
                ToolKind::About,
                ToolKind::HiddenTags,
                ToolKind::Shutdown,
                ToolKind::Reboot,
                ToolKind::Firmware,
                ToolKind::FwUpdate,
            ],
            windows_recovery_files: vec![
                "EFI\\Microsoft\\Boot\\LrsBootmgr.efi".to_owned(),
                format!("Recovery:\\EFI\\BOOT\\boot{arch}.efi"),
                "\\EFI\\OEM\\Boot\\bootmgfw.efi".to_owned(),
            ],
            graphics_for: GraphicsFor::OSX | GraphicsFor::WINDOWS,
            default_selection: vec!["+".to_owned()],
            csr_values: Vec::new(),
            log_level: LevelFilter::Warn,
        }
    }
}

impl ScanConfig {
    /// Loads the configuration file from a directory of a volume.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the file exists, but could not be read.
    pub fn load(fs: &mut dyn VolumeFs, dir: &str) -> Result<Self, ConfigError> {
        match fs.read(&join_path(dir, FILE_NAME)) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.is_benign() => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads the configuration file, falling back to the defaults if it could not be read.
    #[must_use = "Has no effect if the result is unused"]
    pub fn load_or_default(fs: Option<&mut dyn VolumeFs>, dir: &str) -> Self {
        let Some(fs) = fs else {
            return Self::default();
        };
        Self::load(fs, dir).unwrap_or_else(|e| {
            warn!("{e}, using the default configuration");
            Self::default()
        })
    }

    /// Parses the contents of a configuration file.
    ///
    /// Unknown keys and invalid values are ignored.
    #[must_use = "Has no effect if the result is unused"]
    pub fn parse(content: &[u8]) -> Self {
        let mut config = Self::default();
        let content = String::from_utf8_lossy(content);

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line
                .split_once(char::is_whitespace)
                .map_or((line, ""), |(key, value)| (key, value.trim()));
            config.apply(&key.to_ascii_lowercase(), value);
        }

        config
    }

    /// Applies one key value pair.
    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "timeout" => {
                if let Ok(value) = value.parse() {
                    self.timeout = value;
                }
            }
            "shutdown_after_timeout" => set_bool(&mut self.shutdown_after_timeout, value),
            "scanfor" => {
                self.scan_for = split_list(value)
                    .iter()
                    .filter_map(|x| ScanSource::from_name(x))
                    .collect();
            }
            "also_scan_dirs" => self.also_scan_dirs = split_list(value),
            "dont_scan_volumes" => self.dont_scan_volumes = split_list(value),
            "dont_scan_dirs" => self.dont_scan_dirs = split_list(value),
            "dont_scan_files" => self.dont_scan_files = split_list(value),
            "dont_scan_tools" => self.dont_scan_tools = split_list(value),
            "scan_all_linux_kernels" => set_bool(&mut self.scan_all_linux_kernels, value),
            "fold_linux_kernels" => set_bool(&mut self.fold_linux_kernels, value),
            "hideui" => {
                self.hide_ui = split_list(value)
                    .iter()
                    .fold(HideUi::empty(), |flags, x| match &*x.to_ascii_lowercase() {
                        "singleuser" => flags | HideUi::SINGLE_USER,
                        "safemode" => flags | HideUi::SAFE_MODE,
                        "hwtest" => flags | HideUi::HWTEST,
                        "badges" => flags | HideUi::BADGES,
                        _ => flags,
                    });
            }
            "showtools" => {
                self.show_tools = split_list(value)
                    .iter()
                    .filter_map(|x| ToolKind::from_name(x))
                    .collect();
            }
            "windows_recovery_files" => self.windows_recovery_files = split_list(value),
            "graphics_for" => {
                self.graphics_for = split_list(value).iter().fold(
                    GraphicsFor::empty(),
                    |flags, x| match &*x.to_ascii_lowercase() {
                        "osx" => flags | GraphicsFor::OSX,
                        "linux" => flags | GraphicsFor::LINUX,
                        "elilo" => flags | GraphicsFor::ELILO,
                        "grub" => flags | GraphicsFor::GRUB,
                        "windows" => flags | GraphicsFor::WINDOWS,
                        _ => flags,
                    },
                );
            }
            "default_selection" => self.default_selection = split_list(value),
            "csr_values" => {
                self.csr_values = split_list(value)
                    .iter()
                    .filter_map(|x| {
                        let x = x.trim_start_matches("0x").trim_start_matches("0X");
                        u32::from_str_radix(x, 16).ok()
                    })
                    .collect();
            }
            "log_level" => {
                if let Ok(level) = value.parse() {
                    self.log_level = level;
                }
            }
            _ => (),
        }
    }
}

/// Sets a boolean from a value, leaving it unchanged if the value is not a boolean.
fn set_bool(field: &mut bool, value: &str) {
    match &*value.to_ascii_lowercase() {
        "true" | "yes" | "on" | "1" => *field = true,
        "false" | "no" | "off" | "0" => *field = false,
        _ => (),
    }
}

/// Splits a comma separated list, keeping commas inside of double quotes.
#[must_use = "Has no effect if the result is unused"]
pub fn split_list(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in value.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => items.push(core::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::fs::mem::MemVolume;
    use proptest::prelude::*;

    #[test]
    fn test_full_config() {
        let config = br#"
            # comment
            timeout -1
            shutdown_after_timeout yes
            scanfor external,INTERNAL,bogus
            also_scan_dirs boot,ESP:EFI\extra
            dont_scan_volumes "Recovery HD"
            dont_scan_files "weird,name.efi",other.efi
            fold_linux_kernels false
            hideui singleuser,badges
            showtools shell,reboot,exit
            graphics_for linux
            default_selection +,Arch
            csr_values 77,0x67
            log_level debug
            unknown_key whatever
        "#;

        let config = ScanConfig::parse(config);
        assert_eq!(config.timeout, -1);
        assert!(config.shutdown_after_timeout);
        assert_eq!(config.scan_for, [ScanSource::External, ScanSource::Internal]);
        assert_eq!(config.also_scan_dirs, ["boot", "ESP:EFI\\extra"]);
        assert_eq!(config.dont_scan_volumes, ["Recovery HD"]);
        assert_eq!(config.dont_scan_files, ["weird,name.efi", "other.efi"]);
        assert!(!config.fold_linux_kernels);
        assert!(config.scan_all_linux_kernels);
        assert_eq!(config.hide_ui, HideUi::SINGLE_USER | HideUi::BADGES);
        assert_eq!(config.show_tools, [ToolKind::Shell, ToolKind::Reboot, ToolKind::Exit]);
        assert_eq!(config.graphics_for, GraphicsFor::LINUX);
        assert_eq!(config.default_selection, ["+", "Arch"]);
        assert_eq!(config.csr_values, [0x77, 0x67]);
        assert_eq!(config.log_level, LevelFilter::Debug);
    }

    #[test]
    fn test_later_key_wins() {
        let config = ScanConfig::parse(b"timeout 5\ntimeout 7\ntimeout nonsense\n");
        assert_eq!(config.timeout, 7);
    }

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        let suffix = Arch::current().suffix();
        assert!(config.dont_scan_files.contains(&format!("fb{suffix}.efi")));
        assert_eq!(config.graphics_for, GraphicsFor::OSX | GraphicsFor::WINDOWS);
        assert_eq!(config.timeout, 20);
    }

    #[test]
    fn test_load() -> Result<(), ConfigError> {
        let mut volume = MemVolume::new("ESP").with_file("EFI\\bootscan\\bootscan.conf", b"timeout 3");
        assert_eq!(ScanConfig::load(&mut volume, "EFI\\bootscan")?.timeout, 3);
        assert_eq!(ScanConfig::load(&mut volume, "EFI\\other")?, ScanConfig::default());
        assert_eq!(ScanConfig::load_or_default(None, "EFI\\bootscan"), ScanConfig::default());
        Ok(())
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a , ,b,"), ["a", "b"]);
        assert_eq!(split_list(r#""x, y",z"#), ["x, y", "z"]);
        assert!(split_list("").is_empty());
    }

    proptest! {
        #[test]
        fn doesnt_panic(x in any::<Vec<u8>>()) {
            let _ = ScanConfig::parse(&x);
        }
    }
}
