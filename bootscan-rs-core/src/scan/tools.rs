// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The second row of the main menu: built in actions and utility images.
//!
//! Entries are added in the order of the `showtools` setting. Image tools are searched for in fixed locations, and
//! every image found has to pass the loader validator and must not be in the tool exclusion list.

use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};

use log::debug;

use crate::{
    config::{ScanConfig, ToolKind},
    menu::{Action, EntryKind, LoaderEntry, MenuEntry, MenuScreen},
    scan::{loaders::filename_in, validate::is_valid_loader},
    system::{
        helper::{Arch, absolute_path, basename, dirname, join_path, split_volume},
        volume::{Volume, VolumeId, VolumeTable},
    },
};

/// The directories searched for the memory tester.
const MEMTEST_DIRS: [&str; 5] = [
    "EFI\\tools",
    "EFI\\tools\\memtest86",
    "EFI\\tools\\memtest",
    "EFI\\memtest86",
    "EFI\\memtest",
];

/// The directories searched for key management and firmware update tools, besides the boot manager's own.
const MOK_DIRS: [&str; 8] = [
    "",
    "EFI\\tools",
    "EFI\\fedora",
    "EFI\\redhat",
    "EFI\\ubuntu",
    "EFI\\suse",
    "EFI\\opensuse",
    "EFI\\altlinux",
];

/// The file names of key management tools.
const MOK_NAMES: [&str; 5] = [
    "MokManager.efi",
    "HashTool.efi",
    "HashTool-signed.efi",
    "KeyTool.efi",
    "KeyTool-signed.efi",
];

/// Bit of `OsIndicationsSupported` and `OsIndications` for booting into the firmware setup.
pub const BOOT_TO_FW_UI: u64 = 1;

/// What the tool scan needs to know besides the configuration and the volumes.
#[derive(Clone, Debug, Default)]
pub struct ToolContext {
    /// The architecture of the running firmware.
    pub arch: Arch,

    /// The directory of the boot manager on its own volume.
    pub self_dir: Option<String>,

    /// If any hidden list holds a value.
    pub has_hidden: bool,

    /// If the firmware can boot into its setup.
    pub firmware_setup: bool,

    /// The macOS recovery loaders found by the loader scan.
    pub apple_recovery: Vec<(VolumeId, String)>,
}

/// Checks if a tool exists on a volume, is a valid image, and is not excluded.
#[must_use = "Has no effect if the result is unused"]
pub fn is_valid_tool(config: &ScanConfig, volume: &mut Volume, path: &str) -> bool {
    let exists = volume.fs().is_some_and(|fs| fs.exists(path));
    exists
        && is_valid_loader(volume.fs(), Some(path))
        && !filename_in(volume, &dirname(path), basename(path), &config.dont_scan_tools)
}

/// Creates the entry of an image tool.
fn tool_entry(id: VolumeId, path: &str, description: &str, icon: &str, shortcut: char) -> MenuEntry {
    let loader = LoaderEntry {
        path: absolute_path(path),
        volume: id,
        ..LoaderEntry::default()
    };
    let mut entry = MenuEntry::new(&format!("Start {description}"), EntryKind::Tool(loader));
    entry.shortcut = Some(shortcut);
    entry.icon_hints.push(icon.to_string());
    entry
}

/// Creates the entry of a built in action.
fn action_entry(title: &str, action: Action, shortcut: Option<char>, icon: &str) -> MenuEntry {
    let mut entry = MenuEntry::action(title, action, shortcut);
    entry.icon_hints.push(icon.to_string());
    entry
}

/// Adds the tools of the second row to a menu.
pub struct ToolScanner<'a> {
    /// The configuration of the scan pass, with the hidden lists merged in.
    config: &'a ScanConfig,

    /// Everything else the scan needs to know.
    context: &'a ToolContext,
}

impl<'a> ToolScanner<'a> {
    /// Creates a new [`ToolScanner`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn new(config: &'a ScanConfig, context: &'a ToolContext) -> Self {
        Self { config, context }
    }

    /// Adds a tool found at a path on one volume.
    fn add_on(
        &self,
        volumes: &mut VolumeTable,
        id: VolumeId,
        path: &str,
        description: &str,
        icon: &str,
        shortcut: char,
        menu: &mut MenuScreen,
    ) {
        let Some(volume) = volumes.get_mut(id) else {
            return;
        };
        if is_valid_tool(self.config, volume, path) {
            debug!("Adding tool {path} on {}", volume.name);
            menu.push(tool_entry(id, path, description, icon, shortcut));
        }
    }

    /// Adds every copy of a tool found in any of the directories on any volume.
    fn find_everywhere(
        &self,
        volumes: &mut VolumeTable,
        dirs: &[String],
        names: &[String],
        description: &str,
        icon: &str,
        menu: &mut MenuScreen,
    ) {
        for dir in dirs {
            for name in names {
                let path = join_path(dir, name);
                for id in volumes.ids() {
                    let volume_name = volumes.name(id).to_string();
                    let full = format!("{description} at {} on {volume_name}", absolute_path(&path));
                    self.add_on(volumes, id, &path, &full, icon, 'S', menu);
                }
            }
        }
    }

    /// The fixed directories plus the boot manager's own.
    fn with_self_dir(&self, dirs: &[&str]) -> Vec<String> {
        dirs.iter()
            .map(ToString::to_string)
            .chain(self.context.self_dir.clone())
            .collect()
    }

    /// Adds the image tools of one kind.
    fn add_image_tool(&self, tool: ToolKind, volumes: &mut VolumeTable, menu: &mut MenuScreen) {
        let arch = self.context.arch.suffix();
        let self_volume = volumes.self_volume();

        match tool {
            ToolKind::Shell => {
                let Some(id) = self_volume else {
                    return;
                };
                let dirs = self.with_self_dir(&["", "EFI\\tools"]);
                for dir in &dirs {
                    for name in [format!("shell{arch}.efi"), "shell.efi".to_string()] {
                        self.add_on(volumes, id, &join_path(dir, &name), "EFI shell", "tool_shell", 'S', menu);
                    }
                }
            }
            ToolKind::Gptsync | ToolKind::Gdisk => {
                let Some(id) = self_volume else {
                    return;
                };
                let (name, description, shortcut) = if tool == ToolKind::Gptsync {
                    ("gptsync", "Hybrid MBR tool", 'P')
                } else {
                    ("gdisk", "disk partitioning tool", 'G')
                };
                let path = format!("EFI\\tools\\{name}{arch}.efi");
                self.add_on(volumes, id, &path, description, "tool_part", shortcut, menu);
            }
            ToolKind::Memtest => {
                let dirs: Vec<String> = MEMTEST_DIRS.iter().map(ToString::to_string).collect();
                let names = [
                    "memtest86.efi".to_string(),
                    format!("memtest86{arch}.efi"),
                    format!("memtest86_{arch}.efi"),
                    format!("boot{arch}.efi"),
                ];
                self.find_everywhere(volumes, &dirs, &names, "Memory test utility", "tool_memtest", menu);
            }
            ToolKind::MokTool => {
                let dirs = self.with_self_dir(&MOK_DIRS);
                let names: Vec<String> = MOK_NAMES.iter().map(ToString::to_string).collect();
                self.find_everywhere(volumes, &dirs, &names, "MOK utility", "tool_mok_tool", menu);
            }
            ToolKind::FwUpdate => {
                let dirs = self.with_self_dir(&["EFI\\tools"]);
                let names = [format!("fwup{arch}.efi")];
                self.find_everywhere(volumes, &dirs, &names, "firmware update utility", "tool_fwupdate", menu);
            }
            ToolKind::AppleRecovery => {
                for (id, path) in &self.context.apple_recovery {
                    let description = format!("Apple Recovery on {}", volumes.name(*id));
                    self.add_on(volumes, *id, path, &description, "tool_apple_rescue", 'R', menu);
                }
            }
            ToolKind::WindowsRecovery => {
                for spec in &self.config.windows_recovery_files {
                    let (qualifier, path) = split_volume(spec);
                    for id in volumes.ids() {
                        let name = volumes.name(id).to_string();
                        if qualifier.is_some_and(|q| !q.eq_ignore_ascii_case(&name)) {
                            continue;
                        }
                        let description = format!("Microsoft Recovery on {name}");
                        self.add_on(volumes, id, path, &description, "tool_windows_rescue", 'R', menu);
                    }
                }
            }
            _ => {}
        }
    }

    /// Adds every tool of the `showtools` setting to the menu, in order.
    pub fn scan(&self, volumes: &mut VolumeTable, menu: &mut MenuScreen) {
        for &tool in &self.config.show_tools {
            match tool {
                ToolKind::Shutdown => {
                    menu.push(action_entry("Shut Down Computer", Action::Shutdown, Some('U'), "func_shutdown"));
                }
                ToolKind::Reboot => {
                    menu.push(action_entry("Reboot Computer", Action::Reboot, Some('R'), "func_reset"));
                }
                ToolKind::About => {
                    menu.push(action_entry("About bootscan", Action::About, Some('A'), "func_about"));
                }
                ToolKind::Exit => {
                    menu.push(action_entry("Exit bootscan", Action::Exit, None, "func_exit"));
                }
                ToolKind::HiddenTags if self.context.has_hidden => {
                    menu.push(action_entry(
                        "Manage Hidden Tags Menu",
                        Action::ManageHidden,
                        None,
                        "func_hidden",
                    ));
                }
                ToolKind::Firmware if self.context.firmware_setup => {
                    menu.push(action_entry(
                        "Reboot to Computer Setup Utility",
                        Action::FirmwareSetup,
                        None,
                        "func_firmware",
                    ));
                }
                ToolKind::CsrRotate if !self.config.csr_values.is_empty() => {
                    menu.push(action_entry("Change SIP Policy", Action::RotateCsr, None, "func_csr_rotate"));
                }
                ToolKind::HiddenTags | ToolKind::Firmware | ToolKind::CsrRotate => {}
                _ => self.add_image_tool(tool, volumes, menu),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{
        fs::mem::{MemVolume, loader},
        volume::DiskKind,
    };
    use alloc::{boxed::Box, vec};

    fn table(volumes: Vec<(&str, MemVolume, bool)>) -> VolumeTable {
        VolumeTable::new(
            volumes
                .into_iter()
                .map(|(label, mem, is_self)| {
                    let volume = Volume::new(label, DiskKind::Internal, Box::new(mem));
                    if is_self { volume.as_self() } else { volume }
                })
                .collect(),
        )
    }

    fn titles(menu: &MenuScreen) -> Vec<&str> {
        menu.iter().map(|entry| entry.title.as_str()).collect()
    }

    #[test]
    fn test_actions_in_order() {
        let mut config = ScanConfig::default();
        config.show_tools = vec![
            ToolKind::Reboot,
            ToolKind::HiddenTags,
            ToolKind::Shutdown,
            ToolKind::Firmware,
            ToolKind::CsrRotate,
            ToolKind::About,
            ToolKind::Exit,
        ];
        let context = ToolContext::default();
        let mut volumes = table(vec![]);
        let mut menu = MenuScreen::main_menu();
        ToolScanner::new(&config, &context).scan(&mut volumes, &mut menu);

        assert_eq!(
            titles(&menu),
            ["Reboot Computer", "Shut Down Computer", "About bootscan", "Exit bootscan"]
        );
        assert!(menu.iter().all(|entry| entry.row == 1));
        assert_eq!(menu.find_shortcut('u'), Some(1));

        let context = ToolContext {
            has_hidden: true,
            firmware_setup: true,
            ..ToolContext::default()
        };
        config.csr_values = vec![0x77];
        let mut menu = MenuScreen::main_menu();
        ToolScanner::new(&config, &context).scan(&mut volumes, &mut menu);
        assert_eq!(menu.len(), 7);
        assert_eq!(menu.get(1).map(MenuEntry::tag), Some(crate::menu::Tag::ManageHidden));
    }

    #[test]
    fn test_shell_on_self_volume() {
        let arch = Arch::current().suffix();
        let mut config = ScanConfig::default();
        config.show_tools = vec![ToolKind::Shell];
        let context = ToolContext {
            arch: Arch::current(),
            ..ToolContext::default()
        };
        let mut volumes = table(vec![
            (
                "Other",
                MemVolume::new("Other").with_file("EFI\\tools\\shell.efi", &loader(b"shell")),
                false,
            ),
            (
                "ESP",
                MemVolume::new("ESP")
                    .with_file(&format!("EFI\\tools\\shell{arch}.efi"), &loader(b"shell"))
                    .with_file("shell.efi", b"not an image"),
                true,
            ),
        ]);
        let mut menu = MenuScreen::main_menu();
        ToolScanner::new(&config, &context).scan(&mut volumes, &mut menu);

        assert_eq!(titles(&menu), ["Start EFI shell"]);
        let tool = menu.get(0).and_then(MenuEntry::loader);
        assert_eq!(tool.map(|t| t.volume), Some(VolumeId(1)));
        assert_eq!(
            tool.map(|t| t.path.as_str()),
            Some(format!("\\EFI\\tools\\shell{arch}.efi").as_str())
        );
    }

    #[test]
    fn test_mok_tool_everywhere() {
        let mut config = ScanConfig::default();
        config.show_tools = vec![ToolKind::MokTool];
        config.dont_scan_tools = vec!["Data:HashTool.efi".into()];
        let context = ToolContext {
            self_dir: Some("EFI\\bootscan".into()),
            ..ToolContext::default()
        };
        let mut volumes = table(vec![
            (
                "ESP",
                MemVolume::new("ESP").with_file("EFI\\bootscan\\KeyTool.efi", &loader(b"key")),
                true,
            ),
            (
                "Data",
                MemVolume::new("Data")
                    .with_file("EFI\\ubuntu\\MokManager.efi", &loader(b"mok"))
                    .with_file("HashTool.efi", &loader(b"hash")),
                false,
            ),
        ]);
        let mut menu = MenuScreen::main_menu();
        ToolScanner::new(&config, &context).scan(&mut volumes, &mut menu);

        assert_eq!(
            titles(&menu),
            [
                "Start MOK utility at \\EFI\\ubuntu\\MokManager.efi on Data",
                "Start MOK utility at \\EFI\\bootscan\\KeyTool.efi on ESP",
            ]
        );
    }

    #[test]
    fn test_recovery() {
        let mut config = ScanConfig::default();
        config.show_tools = vec![ToolKind::AppleRecovery, ToolKind::WindowsRecovery];
        config.windows_recovery_files = vec!["Recovery:\\EFI\\BOOT\\recovery.efi".into(), "EFI\\win\\re.efi".into()];
        let context = ToolContext {
            apple_recovery: vec![(VolumeId(0), "com.apple.recovery.boot\\boot.efi".into())],
            ..ToolContext::default()
        };
        let mut volumes = table(vec![
            (
                "Recovery HD",
                MemVolume::new("Recovery HD").with_file("com.apple.recovery.boot\\boot.efi", &loader(b"apple")),
                false,
            ),
            (
                "Recovery",
                MemVolume::new("Recovery")
                    .with_file("EFI\\BOOT\\recovery.efi", &loader(b"win"))
                    .with_file("EFI\\win\\re.efi", &loader(b"re")),
                false,
            ),
            (
                "Other",
                MemVolume::new("Other").with_file("EFI\\BOOT\\recovery.efi", &loader(b"win")),
                false,
            ),
        ]);
        let mut menu = MenuScreen::main_menu();
        ToolScanner::new(&config, &context).scan(&mut volumes, &mut menu);

        assert_eq!(
            titles(&menu),
            [
                "Start Apple Recovery on Recovery HD",
                "Start Microsoft Recovery on Recovery",
                "Start Microsoft Recovery on Recovery",
            ]
        );
    }
}
