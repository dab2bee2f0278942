// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Builds the boot options subscreen of a loader.
//!
//! Every subscreen starts with an entry that boots the loader with its detected options. What follows depends on
//! the [`OsType`] of the loader: fixed variants for macOS, ELILO and XOM, and the records of the options file for
//! Linux kernels. Folded kernels are appended to the subscreen of the newest kernel in their directory.

use alloc::{borrow::ToOwned, boxed::Box, format, string::String, vec::Vec};

use crate::{
    config::{GraphicsFor, HideUi, ScanConfig},
    menu::{
        EntryKind, LoaderEntry, MenuEntry, MenuScreen, OsType,
        options_file::{OptionsRecord, read_options_file},
    },
    scan::initrd::{find_initrd, version_token},
    system::{
        fs::VolumeFs,
        helper::{Arch, absolute_path, basename, contains_ignore_case},
    },
};

/// The hint lines of a subscreen.
pub const SUBSCREEN_HINTS: [&str; 2] = [
    "Use arrow keys to move cursor; Enter to boot;",
    "Esc to return to main menu",
];

/// The path of the Apple Hardware Test.
pub const DIAGS_PATH: &str = "System\\Library\\CoreServices\\.diagnostics\\diags.efi";

/// The title of options file entries without a label.
const DEFAULT_LINUX_TITLE: &str = "Boot Linux";

/// Adds an `initrd=` option, unless the options already have one.
#[must_use = "Has no effect if the result is unused"]
pub fn add_initrd_to_options(options: Option<&str>, initrd: Option<&str>) -> Option<String> {
    match (options, initrd) {
        (Some(options), Some(_)) if contains_ignore_case(options, "initrd=") => Some(options.to_owned()),
        (Some(options), Some(initrd)) if !options.is_empty() => Some(format!("{options} initrd={initrd}")),
        (_, Some(initrd)) => Some(format!("initrd={initrd}")),
        (options, None) => options.map(ToOwned::to_owned),
    }
}

/// A fixed variant of a loader.
struct Variant {
    /// The title of the entry.
    title: &'static str,

    /// The load options.
    options: &'static str,

    /// If the variant starts in graphics mode.
    graphics: bool,
}

/// Builds subscreens for one scan pass.
pub struct SubscreenBuilder<'a> {
    /// The configuration of the scan pass.
    config: &'a ScanConfig,

    /// The architecture the variants are built for.
    arch: Arch,
}

impl<'a> SubscreenBuilder<'a> {
    /// Creates a [`SubscreenBuilder`] for an architecture.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn new(config: &'a ScanConfig, arch: Arch) -> Self {
        Self { config, arch }
    }

    /// If loaders matching a graphics flag start in graphics mode.
    const fn graphics(&self, flag: GraphicsFor) -> bool {
        self.config.graphics_for.contains(flag)
    }

    /// Get the subscreen of an entry, creating it with its default entry if there is none.
    ///
    /// Returns [`None`] if the entry does not start a loader.
    pub fn init<'e>(&self, entry: &'e mut MenuEntry, volume_name: &str) -> Option<&'e mut MenuScreen> {
        let loader = entry.loader()?.clone();

        if entry.subscreen.is_none() {
            let title = if entry.title.is_empty() {
                basename(&loader.path)
            } else {
                &entry.title
            };
            let mut screen = MenuScreen::new(&format!("Boot Options for {title} on {volume_name}"));
            screen.hints = SUBSCREEN_HINTS.iter().map(|&hint| hint.to_owned()).collect();

            let default = LoaderEntry {
                options: add_initrd_to_options(loader.options.as_deref(), loader.initrd.as_deref()),
                ..loader
            };
            screen.push(MenuEntry::new("Boot using default options", EntryKind::Loader(default)));
            entry.subscreen = Some(Box::new(screen));
        }

        entry.subscreen.as_deref_mut()
    }

    /// Creates the subscreen of a top-level entry with the variants of its OS type.
    ///
    /// The volume filesystem is used to look for the options file and the hardware test.
    pub fn generate(
        &self,
        entry: &mut MenuEntry,
        mut fs: Option<&mut dyn VolumeFs>,
        volume_name: &str,
        with_return: bool,
    ) {
        let Some(loader) = entry.loader().cloned() else {
            return;
        };

        let Some(screen) = self.init(entry, volume_name) else {
            return;
        };

        match loader.os_type {
            OsType::MacOs => self.mac_variants(screen, &loader, fs.as_deref_mut()),
            OsType::Linux => {
                if let Some(fs) = fs {
                    Self::linux_variants(screen, &loader, fs, self.graphics(GraphicsFor::LINUX));
                }
            }
            OsType::Elilo => {
                let graphics = self.graphics(GraphicsFor::ELILO);
                push_variants(
                    screen,
                    &loader,
                    &[
                        Variant { title: "Run ELILO in interactive mode", options: "-p", graphics },
                        Variant {
                            title: "Boot Linux for a 17\" iMac or a 15\" MacBook Pro (*)",
                            options: "-d 0 i17",
                            graphics,
                        },
                        Variant { title: "Boot Linux for a 20\" iMac (*)", options: "-d 0 i20", graphics },
                        Variant { title: "Boot Linux for a Mac Mini (*)", options: "-d 0 mini", graphics },
                    ],
                );
                screen.info_lines.push("NOTE: This is an example. Entries".to_owned());
                screen.info_lines.push("marked with (*) may not work.".to_owned());
            }
            OsType::Xom => {
                let graphics = self.graphics(GraphicsFor::WINDOWS);
                push_variants(
                    screen,
                    &loader,
                    &[
                        Variant { title: "Boot Windows from Hard Disk", options: "-s -h", graphics },
                        Variant { title: "Boot Windows from CD-ROM", options: "-s -c", graphics },
                        Variant { title: "Run XOM in text mode", options: "-v", graphics },
                    ],
                );
            }
            _ => {}
        }

        if with_return {
            screen.push(MenuEntry::return_entry());
        }

        // xom boots from the hard disk without its own menu; the subscreen default keeps the plain options
        if loader.os_type == OsType::Xom
            && let Some(parent) = entry.loader_mut()
        {
            parent.options = Some("-s -h".to_owned());
        }
    }

    /// Adds the macOS variants.
    fn mac_variants(&self, screen: &mut MenuScreen, loader: &LoaderEntry, fs: Option<&mut (dyn VolumeFs + '_)>) {
        let graphics = self.graphics(GraphicsFor::OSX);
        let x64 = self.arch == Arch::X64;
        let hide_ui = self.config.hide_ui;

        let mut variants = Vec::new();
        if x64 {
            variants.push(Variant { title: "Boot macOS with a 64-bit kernel", options: "arch=x86_64", graphics });
            variants.push(Variant { title: "Boot macOS with a 32-bit kernel", options: "arch=i386", graphics });
        }
        if !hide_ui.contains(HideUi::SINGLE_USER) {
            variants.push(Variant { title: "Boot macOS in verbose mode", options: "-v", graphics: false });
            if x64 {
                variants.push(Variant {
                    title: "Boot macOS in verbose mode (64-bit)",
                    options: "-v arch=x86_64",
                    graphics: false,
                });
                variants.push(Variant {
                    title: "Boot macOS in verbose mode (32-bit)",
                    options: "-v arch=i386",
                    graphics: false,
                });
            }
            variants.push(Variant { title: "Boot macOS in single user mode", options: "-v -s", graphics: false });
        }
        if !hide_ui.contains(HideUi::SAFE_MODE) {
            variants.push(Variant { title: "Boot macOS in safe mode", options: "-v -x", graphics: false });
        }
        push_variants(screen, loader, &variants);

        if !hide_ui.contains(HideUi::HWTEST)
            && let Some(fs) = fs
            && fs.exists(DIAGS_PATH)
        {
            let diags = LoaderEntry {
                path: absolute_path(DIAGS_PATH),
                options: None,
                graphics,
                ..loader.clone()
            };
            screen.push(MenuEntry::new("Run Apple Hardware Test", EntryKind::Loader(diags)));
        }
    }

    /// Adds the records of the options file of a kernel.
    ///
    /// The first record names the default entry, whose options were already taken from it.
    fn linux_variants(screen: &mut MenuScreen, loader: &LoaderEntry, fs: &mut dyn VolumeFs, graphics: bool) {
        let Some(records) = read_options_file(fs, &loader.path) else {
            return;
        };
        let mut records = records.into_iter();

        if let Some(first) = records.next()
            && let Some(default) = screen.get_mut(0)
        {
            default.title = record_title(&first).to_owned();
        }

        let version = version_token(basename(&loader.path));
        for record in records {
            let options = record.options_for(version);
            let variant = LoaderEntry {
                options: add_initrd_to_options(Some(&options), loader.initrd.as_deref()),
                graphics,
                ..loader.clone()
            };
            screen.push(MenuEntry::new(record_title(&record), EntryKind::Loader(variant)));
        }
    }

    /// Adds a kernel to the subscreen of the newest kernel of its directory.
    ///
    /// Every record of the options file becomes one entry titled `<kernel>: <label>`. Without an options file the
    /// kernel gets a single entry with only its initrd as options.
    pub fn add_kernel(
        &self,
        parent: &mut MenuEntry,
        kernel_path: &str,
        fs: &mut dyn VolumeFs,
        volume_name: &str,
    ) {
        let Some(parent_loader) = parent.loader().cloned() else {
            return;
        };
        let graphics = self.graphics(GraphicsFor::LINUX);
        let Some(screen) = self.init(parent, volume_name) else {
            return;
        };

        let initrd = find_initrd(fs, kernel_path);
        let version = version_token(basename(kernel_path));
        let name = basename(kernel_path);

        let records = read_options_file(fs, &parent_loader.path).unwrap_or_default();
        let variants: Vec<(String, Option<String>)> = if records.is_empty() {
            alloc::vec![(format!("{name}: {DEFAULT_LINUX_TITLE}"), None)]
        } else {
            records
                .iter()
                .map(|record| {
                    (
                        format!("{name}: {}", record_title(record)),
                        Some(record.options_for(version)),
                    )
                })
                .collect()
        };

        for (title, options) in variants {
            let kernel = LoaderEntry {
                path: absolute_path(kernel_path),
                options: add_initrd_to_options(options.as_deref(), initrd.as_deref()),
                initrd: initrd.clone(),
                graphics,
                ..parent_loader.clone()
            };
            screen.push(MenuEntry::new(&title, EntryKind::Loader(kernel)));
        }
    }

    /// Appends the return entry to the subscreen of an entry.
    pub fn add_return(entry: &mut MenuEntry) {
        if let Some(screen) = entry.subscreen.as_deref_mut() {
            screen.push(MenuEntry::return_entry());
        }
    }
}

/// The title of an options file record.
fn record_title(record: &OptionsRecord) -> &str {
    if record.label.is_empty() {
        DEFAULT_LINUX_TITLE
    } else {
        &record.label
    }
}

/// Appends a list of fixed variants of a loader.
fn push_variants(screen: &mut MenuScreen, loader: &LoaderEntry, variants: &[Variant]) {
    for variant in variants {
        let entry = LoaderEntry {
            options: Some(variant.options.to_owned()),
            graphics: variant.graphics,
            ..loader.clone()
        };
        screen.push(MenuEntry::new(variant.title, EntryKind::Loader(entry)));
    }
}
