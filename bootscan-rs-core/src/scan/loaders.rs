// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Finds the boot loaders of a volume.
//!
//! A volume is searched in a fixed order: the macOS loader (also inside GUID named directories), the Windows boot
//! manager, the root directory, every directory inside of `EFI` except `EFI\tools`, the extra directories of the
//! configuration, and finally the removable media fallback loader. The fallback loader is left out if it is a
//! copy of a loader that was already added, or of the boot manager itself.

use alloc::{borrow::ToOwned, string::String, vec::Vec};

use log::{debug, error};
use sha2::{Digest, Sha256};

use crate::{
    config::{HideUi, ScanConfig},
    menu::{Discovery, EntryKind, LoaderEntry, MenuEntry, MenuScreen, subscreen::SubscreenBuilder},
    scan::{
        classify::{MACOS_LOADER_PATH, classify},
        loader_list::{LoaderCandidate, Placement, plan_folding, sort_candidates},
        validate::is_valid_loader,
    },
    system::{
        fs::{DirEntry, VolumeFs},
        helper::{
            Arch, absolute_path, basename, clean_path, dirname, eq_ignore_case, glob_match, is_guid, join_path,
            split_file_spec, split_volume,
        },
        volume::{Volume, VolumeId},
    },
};

/// The directory of the macOS loader.
pub const MACOS_LOADER_DIR: &str = "System\\Library\\CoreServices";

/// The directory of the Windows boot manager.
const MICROSOFT_DIR: &str = "EFI\\Microsoft\\Boot";

/// The directory holding tools, which is scanned for tools only.
const TOOLS_DIR: &str = "tools";

/// The patterns of loader file names.
const LOADER_PATTERNS: [&str; 1] = ["*.efi"];

/// The patterns of Linux kernel file names, used when every kernel is scanned for.
const KERNEL_PATTERNS: [&str; 3] = ["vmlinuz*", "bzImage*", "kernel*"];

/// Extensions of icon files, which may match the kernel patterns.
const ICON_EXTENSIONS: [&str; 2] = [".icns", ".png"];

/// Checks if a directory of a volume may be scanned.
///
/// A directory is skipped when the volume is excluded by name, partition name or partition GUID, when it is the
/// directory of the boot manager on its own volume, when it carries a `volume:` qualifier naming another volume, or
/// when it is one of the excluded directories. An excluded directory with a qualifier only applies to that volume.
#[must_use = "Has no effect if the result is unused"]
pub fn should_scan(config: &ScanConfig, volume: &Volume, self_dir: Option<&str>, path: &str) -> bool {
    if config.dont_scan_volumes.iter().any(|desc| volume.matches(desc)) {
        return false;
    }

    let (qualifier, bare) = split_volume(path);
    let bare = clean_path(bare);

    if volume.is_self && self_dir.is_some_and(|dir| eq_ignore_case(&bare, dir)) {
        return false;
    }

    if qualifier.is_some_and(|name| !eq_ignore_case(name, &volume.name)) {
        return false;
    }

    !config.dont_scan_dirs.iter().any(|excluded| {
        let (qualifier, dir) = split_volume(excluded);
        eq_ignore_case(&clean_path(dir), &bare) && qualifier.is_none_or(|name| volume.matches(name))
    })
}

/// Checks if a file in a directory is named by a list of `[volume:][path\]file` specifications.
///
/// A specification without a path matches the file in any directory, and one without a volume matches on every
/// volume.
#[must_use = "Has no effect if the result is unused"]
pub fn filename_in(volume: &Volume, dir: &str, file: &str, list: &[String]) -> bool {
    let dir = clean_path(dir);
    list.iter().any(|spec| {
        let (qualifier, path, name) = split_file_spec(spec);
        eq_ignore_case(name, file)
            && path.is_none_or(|path| eq_ignore_case(&path, &dir))
            && qualifier.is_none_or(|name| volume.matches(name))
    })
}

/// Checks if a file is a copy of the fallback loader without being the fallback loader itself.
///
/// The sizes are compared first, and the contents only if they are equal. Only one file is open at a time.
#[must_use = "Has no effect if the result is unused"]
pub fn duplicates_fallback(fs: &mut dyn VolumeFs, path: &str, arch: Arch) -> bool {
    let fallback = arch.fallback_path();
    let path = clean_path(path);
    if eq_ignore_case(&path, &fallback) {
        return false;
    }

    match (fs.file_size(&path), fs.file_size(&fallback)) {
        (Ok(size), Ok(fallback_size)) if size == fallback_size => {}
        _ => return false,
    }

    match (digest(fs, &path), digest(fs, &fallback)) {
        (Some(file), Some(fallback)) => file == fallback,
        _ => false,
    }
}

/// Hashes the content of a file.
fn digest(fs: &mut dyn VolumeFs, path: &str) -> Option<[u8; 32]> {
    fs.read(path).ok().map(|content| Sha256::digest(content).into())
}

/// Checks if the size in a directory listing differs from the size of the opened file.
///
/// Some filesystem drivers list symbolic links this way, and loaders behind them cannot be started.
#[must_use = "Has no effect if the result is unused"]
pub fn is_symbolic_link(fs: &mut dyn VolumeFs, path: &str, entry: &DirEntry) -> bool {
    fs.file_size(path).unwrap_or(0) != entry.size
}

/// Checks if a signed copy named `<file>.efi.signed` sits next to a file.
#[must_use = "Has no effect if the result is unused"]
pub fn has_signed_counterpart(fs: &mut dyn VolumeFs, path: &str) -> bool {
    let mut signed = clean_path(path);
    signed.push_str(".efi.signed");
    fs.exists(&signed)
}

/// Gets the file name patterns of loaders.
fn patterns(scan_all_kernels: bool) -> Vec<&'static str> {
    let mut patterns = LOADER_PATTERNS.to_vec();
    if scan_all_kernels {
        patterns.extend(KERNEL_PATTERNS);
    }
    patterns
}

/// Gets the paths of the EFI shell, which are never boot loaders.
#[must_use = "Has no effect if the result is unused"]
pub fn shell_names(arch: Arch) -> Vec<String> {
    let shell = alloc::format!("shell{}.efi", arch.suffix());
    ["\\EFI\\tools\\", "\\"]
        .into_iter()
        .flat_map(|dir| [alloc::format!("{dir}shell.efi"), alloc::format!("{dir}{shell}")])
        .collect()
}

/// Scans volumes for boot loaders and adds them to a menu.
pub struct LoaderScanner<'a> {
    /// The configuration of the scan pass, with the hidden lists merged in.
    config: &'a ScanConfig,

    /// The path of the boot manager on its own volume.
    self_path: Option<&'a str>,

    /// The directory of the boot manager on its own volume.
    self_dir: Option<String>,

    /// The architecture of the running firmware.
    arch: Arch,

    /// Builds the subscreens of the entries.
    subscreens: SubscreenBuilder<'a>,

    /// The shell paths, which are skipped.
    shells: Vec<String>,

    /// The macOS recovery loaders seen so far, which may be added as tools later.
    apple_recovery: Vec<(VolumeId, String)>,
}

impl<'a> LoaderScanner<'a> {
    /// Creates a new [`LoaderScanner`].
    ///
    /// `self_path` is the path of the boot manager image on its own volume, if it is known.
    #[must_use = "Has no effect if the result is unused"]
    pub fn new(config: &'a ScanConfig, self_path: Option<&'a str>, arch: Arch) -> Self {
        Self {
            config,
            self_path,
            self_dir: self_path.map(dirname),
            arch,
            subscreens: SubscreenBuilder::new(config, arch),
            shells: shell_names(arch),
            apple_recovery: Vec::new(),
        }
    }

    /// Consumes the scanner, returning the macOS recovery loaders it found.
    #[must_use = "Has no effect if the result is unused"]
    pub fn into_apple_recovery(self) -> Vec<(VolumeId, String)> {
        self.apple_recovery
    }

    /// Checks if a directory of a volume may be scanned.
    fn should_scan(&self, volume: &Volume, path: &str) -> bool {
        should_scan(self.config, volume, self.self_dir.as_deref(), path)
    }

    /// Checks if a file is in the file exclusion list.
    fn excluded(&self, volume: &Volume, dir: &str, file: &str) -> bool {
        filename_in(volume, dir, file, &self.config.dont_scan_files)
    }

    /// Checks if a file found in a directory listing cannot be a loader.
    fn skip_file(&self, volume: &mut Volume, dir: &str, entry: &DirEntry, path: &str) -> bool {
        let name = entry.name.as_str();
        if name.starts_with('.')
            || ICON_EXTENSIONS.iter().any(|ext| {
                name.len() > ext.len()
                    && name
                        .get(name.len() - ext.len()..)
                        .is_some_and(|tail| eq_ignore_case(tail, ext))
            })
            || (eq_ignore_case(name, &self.arch.fallback_name()) && eq_ignore_case(dir, "EFI\\BOOT"))
            || filename_in(volume, dir, name, &self.shells)
            || self.excluded(volume, dir, name)
        {
            return true;
        }

        let Some(fs) = volume.fs() else {
            return true;
        };
        is_symbolic_link(fs, path, entry) || has_signed_counterpart(fs, path) || !is_valid_loader(Some(fs), Some(path))
    }

    /// Adds a loader as a top-level entry of the menu, returning its index.
    ///
    /// Without a title, the path of the loader is used.
    pub(super) fn add_loader_entry(
        &self,
        id: VolumeId,
        volume: &mut Volume,
        path: &str,
        title: Option<&str>,
        with_return: bool,
        menu: &mut MenuScreen,
    ) -> usize {
        let path = absolute_path(path);
        let title = title.map_or_else(|| path.clone(), ToOwned::to_owned);
        let defaults = classify(&path, &title, volume, self.config);

        let loader = LoaderEntry {
            path,
            volume: id,
            options: defaults.options,
            initrd: defaults.initrd,
            os_type: defaults.os_type,
            graphics: defaults.graphics,
            discovery: Discovery::Auto,
            is_driver: false,
        };
        let mut entry = MenuEntry::new(&title, EntryKind::Loader(loader));
        entry.shortcut = defaults.shortcut;
        entry.icon_hints = defaults.icon_hints;
        entry.badge = (!self.config.hide_ui.contains(HideUi::BADGES)).then_some(volume.kind);

        let volume_name = volume.name.clone();
        self.subscreens
            .generate(&mut entry, volume.fs(), &volume_name, with_return);

        debug!("Adding loader {title} on {volume_name}");
        menu.push(entry);
        menu.len() - 1
    }

    /// Adds a loader with a fixed title if it exists and is not excluded.
    ///
    /// Returns `true` if the loader was added and is a copy of the fallback loader.
    fn add_known_loader(
        &self,
        id: VolumeId,
        volume: &mut Volume,
        path: &str,
        title: &str,
        menu: &mut MenuScreen,
    ) -> Option<bool> {
        let exists = volume.fs().is_some_and(|fs| fs.exists(path));
        if !exists || self.excluded(volume, &dirname(path), basename(path)) {
            return None;
        }

        self.add_loader_entry(id, volume, path, Some(title), true, menu);
        Some(
            volume
                .fs()
                .is_some_and(|fs| duplicates_fallback(fs, path, self.arch)),
        )
    }

    /// Scans one directory of a volume for loaders.
    ///
    /// The loaders are added newest first. With kernel folding, every kernel of the directory ends up in the
    /// subscreen of the newest one. Returns `true` if one of the loaders is a copy of the fallback loader.
    fn scan_loader_dir(&self, id: VolumeId, volume: &mut Volume, path: &str, menu: &mut MenuScreen) -> bool {
        let path = clean_path(path);
        if !self.should_scan(volume, &path) {
            return false;
        }

        let listing = match volume.fs().map(|fs| fs.read_dir(&path)) {
            Some(Ok(listing)) => listing,
            Some(Err(e)) if !e.is_benign() => {
                if path.is_empty() {
                    error!("{e} while scanning the root directory on {path}");
                } else {
                    error!("{e} while scanning the {path} directory on {}", volume.name);
                }
                return false;
            }
            _ => return false,
        };

        let patterns = patterns(self.config.scan_all_linux_kernels);
        let mut found_duplicate = false;
        let mut candidates = Vec::new();
        for entry in listing {
            if entry.is_dir || !patterns.iter().any(|pattern| glob_match(pattern, &entry.name)) {
                continue;
            }

            let full = join_path(&path, &entry.name);
            if self.skip_file(volume, &path, &entry, &full) {
                continue;
            }

            found_duplicate |= volume
                .fs()
                .is_some_and(|fs| duplicates_fallback(fs, &full, self.arch));
            candidates.push(LoaderCandidate {
                path: full,
                modified: entry.modified,
            });
        }

        sort_candidates(&mut candidates);
        let placements = plan_folding(&candidates, self.config.fold_linux_kernels);
        let volume_name = volume.name.clone();

        let mut indices = Vec::with_capacity(candidates.len());
        let mut fold_parent = None;
        for (candidate, placement) in candidates.iter().zip(placements) {
            match placement {
                Placement::TopLevel { with_return } => {
                    let index = self.add_loader_entry(id, volume, &candidate.path, None, with_return, menu);
                    if !with_return && fold_parent.is_none() {
                        fold_parent = Some(index);
                    }
                    indices.push(Some(index));
                }
                Placement::FoldInto(parent) => {
                    if let Some(&Some(index)) = indices.get(parent)
                        && let Some(entry) = menu.get_mut(index)
                        && let Some(fs) = volume.fs()
                    {
                        self.subscreens
                            .add_kernel(entry, &candidate.path, fs, &volume_name);
                    }
                    indices.push(None);
                }
            }
        }

        if let Some(entry) = fold_parent.and_then(|index| menu.get_mut(index)) {
            SubscreenBuilder::add_return(entry);
        }

        found_duplicate
    }

    /// Adds the macOS loader at a path.
    ///
    /// Returns `false` if the fallback loader is a copy of it.
    fn scan_macos_loader(&self, id: VolumeId, volume: &mut Volume, path: &str, menu: &mut MenuScreen) -> bool {
        !self
            .add_known_loader(id, volume, path, "macOS", menu)
            .unwrap_or(false)
    }

    /// Scans a volume for loaders and adds them to the menu.
    pub fn scan_volume(&mut self, id: VolumeId, volume: &mut Volume, menu: &mut MenuScreen) {
        if !volume.is_readable() {
            return;
        }
        let mut scan_fallback = true;

        if self.should_scan(volume, MACOS_LOADER_DIR) {
            scan_fallback &= self.scan_macos_loader(id, volume, MACOS_LOADER_PATH, menu);

            let guid_dirs: Vec<String> = volume
                .fs()
                .and_then(|fs| fs.read_dir("").ok())
                .unwrap_or_default()
                .into_iter()
                .filter(|entry| entry.is_dir && is_guid(&entry.name))
                .map(|entry| entry.name)
                .collect();
            for dir in guid_dirs {
                scan_fallback &= self.scan_macos_loader(id, volume, &join_path(&dir, MACOS_LOADER_PATH), menu);

                let recovery = join_path(&dir, "boot.efi");
                if !self
                    .apple_recovery
                    .iter()
                    .any(|(v, path)| *v == id && eq_ignore_case(path, &recovery))
                {
                    self.apple_recovery.push((id, recovery));
                }
            }

            let xom = join_path(MACOS_LOADER_DIR, "xom.efi");
            if self.add_known_loader(id, volume, &xom, "Windows XP (XoM)", menu) == Some(true) {
                scan_fallback = false;
            }
        }

        if self.should_scan(volume, MICROSOFT_DIR) {
            let backup = join_path(MICROSOFT_DIR, "bkpbootmgfw.efi");
            let found_backup =
                match self.add_known_loader(id, volume, &backup, "Microsoft EFI boot (Boot Repair backup)", menu) {
                    Some(duplicate) => {
                        scan_fallback &= !duplicate;
                        true
                    }
                    None => false,
                };

            let title = if found_backup {
                "Supposed Microsoft EFI boot (probably GRUB)"
            } else {
                "Microsoft EFI boot"
            };
            let bootmgfw = join_path(MICROSOFT_DIR, "bootmgfw.efi");
            if self.add_known_loader(id, volume, &bootmgfw, title, menu) == Some(true) {
                scan_fallback = false;
            }
        }

        if self.scan_loader_dir(id, volume, "", menu) {
            scan_fallback = false;
        }

        match volume.fs().map(|fs| fs.read_dir("EFI")) {
            Some(Ok(listing)) => {
                for entry in listing {
                    if !entry.is_dir || eq_ignore_case(&entry.name, TOOLS_DIR) || entry.name.starts_with('.') {
                        continue;
                    }
                    if self.scan_loader_dir(id, volume, &join_path("EFI", &entry.name), menu) {
                        scan_fallback = false;
                    }
                }
            }
            Some(Err(e)) if !e.is_benign() => {
                error!("{e} while scanning the EFI directory on {}", volume.name);
            }
            _ => {}
        }

        for dir in &self.config.also_scan_dirs {
            if !self.should_scan(volume, dir) {
                continue;
            }
            let (_, path) = split_volume(dir);
            let path = clean_path(path);
            if !path.is_empty() && self.scan_loader_dir(id, volume, &path, menu) {
                scan_fallback = false;
            }
        }

        if volume.is_self
            && let Some(self_path) = self.self_path
            && volume
                .fs()
                .is_some_and(|fs| duplicates_fallback(fs, self_path, self.arch))
        {
            scan_fallback = false;
        }

        let fallback = self.arch.fallback_path();
        if scan_fallback
            && volume.fs().is_some_and(|fs| fs.exists(&fallback))
            && self.should_scan(volume, "EFI\\BOOT")
            && !self.excluded(volume, "EFI\\BOOT", &self.arch.fallback_name())
        {
            self.add_loader_entry(id, volume, &fallback, Some("Fallback boot loader"), true, menu);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        menu::{OsType, Tag},
        system::{
            fs::mem::{MemVolume, loader},
            volume::DiskKind,
        },
    };
    use alloc::{boxed::Box, vec};

    fn volume(mem: MemVolume) -> Volume {
        Volume::new("ESP", DiskKind::Internal, Box::new(mem))
    }

    fn scan(config: &ScanConfig, self_path: Option<&str>, volume: &mut Volume) -> MenuScreen {
        let mut menu = MenuScreen::main_menu();
        let mut scanner = LoaderScanner::new(config, self_path, Arch::current());
        scanner.scan_volume(VolumeId(0), volume, &mut menu);
        menu
    }

    fn titles(menu: &MenuScreen) -> Vec<&str> {
        menu.iter().map(|entry| entry.title.as_str()).collect()
    }

    #[test]
    fn test_should_scan() {
        let mut config = ScanConfig::default();
        config.dont_scan_dirs = vec!["EFI\\old".to_owned(), "USB:EFI\\usb".to_owned()];
        let esp = volume(MemVolume::new("ESP")).as_self();

        assert!(should_scan(&config, &esp, Some("EFI\\bootscan"), "EFI\\ubuntu"));
        assert!(!should_scan(&config, &esp, Some("EFI\\bootscan"), "efi\\BOOTSCAN"));
        assert!(!should_scan(&config, &esp, None, "EFI\\old"));
        assert!(should_scan(&config, &esp, None, "EFI\\usb"));
        assert!(!should_scan(&config, &esp, None, "USB:EFI\\ubuntu"));
        assert!(should_scan(&config, &esp, None, "esp:EFI\\ubuntu"));

        config.dont_scan_volumes = vec!["esp".to_owned()];
        assert!(!should_scan(&config, &esp, None, "EFI\\ubuntu"));
    }

    #[test]
    fn test_filename_in() {
        let esp = volume(MemVolume::new("ESP"));
        let list = vec![
            "shim.efi".to_owned(),
            "\\EFI\\tools\\shell.efi".to_owned(),
            "Other:EFI\\arch\\grubx64.efi".to_owned(),
        ];
        assert!(filename_in(&esp, "EFI\\fedora", "SHIM.efi", &list));
        assert!(filename_in(&esp, "EFI\\tools", "shell.efi", &list));
        assert!(!filename_in(&esp, "", "shell.efi", &list));
        assert!(!filename_in(&esp, "EFI\\arch", "grubx64.efi", &list));
    }

    #[test]
    fn test_duplicates_fallback() {
        let fallback = Arch::current().fallback_path();
        let mut fs = MemVolume::new("ESP")
            .with_file(&fallback, &loader(b"grub"))
            .with_file("EFI\\ubuntu\\grubx64.efi", &loader(b"grub"))
            .with_file("EFI\\ubuntu\\mmx64.efi", &loader(b"mokm"))
            .with_file("EFI\\ubuntu\\shimx64.efi", &loader(b"shim-longer"));

        assert!(duplicates_fallback(&mut fs, "EFI\\ubuntu\\grubx64.efi", Arch::current()));
        assert!(!duplicates_fallback(&mut fs, "EFI\\ubuntu\\mmx64.efi", Arch::current()));
        assert!(!duplicates_fallback(&mut fs, "EFI\\ubuntu\\shimx64.efi", Arch::current()));
        assert!(!duplicates_fallback(&mut fs, &fallback, Arch::current()));
        assert!(!duplicates_fallback(&mut fs, "EFI\\missing.efi", Arch::current()));
    }

    #[test]
    fn test_excluded_volume() {
        let mut config = ScanConfig::default();
        config.dont_scan_volumes = vec!["ESP".to_owned()];
        let mut esp = volume(MemVolume::new("ESP").with_file("EFI\\ubuntu\\grubx64.efi", &loader(b"grub")));
        assert!(scan(&config, None, &mut esp).is_empty());
    }

    #[test]
    fn test_self_dir() {
        let config = ScanConfig::default();
        let mem = MemVolume::new("ESP")
            .with_file("EFI\\bootscan\\bootscan_x64.efi", &loader(b"self"))
            .with_file("EFI\\bootscan\\other.efi", &loader(b"other"));

        let mut esp = volume(mem.clone()).as_self();
        assert!(scan(&config, Some("EFI\\bootscan\\bootscan_x64.efi"), &mut esp).is_empty());

        let mut other = volume(mem);
        assert_eq!(scan(&config, Some("EFI\\bootscan\\bootscan_x64.efi"), &mut other).len(), 2);
    }

    #[test]
    fn test_skipped_files() {
        let config = ScanConfig::default();
        let mut esp = volume(
            MemVolume::new("ESP")
                .with_file("EFI\\ubuntu\\.hidden.efi", &loader(b"hidden"))
                .with_file("EFI\\ubuntu\\shimx64.efi", &loader(b"shim"))
                .with_file("EFI\\ubuntu\\grubx64.efi", &loader(b"grub"))
                .with_file("EFI\\ubuntu\\readme.efi", b"not a loader")
                .with_symlink("EFI\\ubuntu\\link.efi", &loader(b"link"), 12)
                .with_file("EFI\\ubuntu\\kernel.png", &loader(b"icon"))
                .with_file("EFI\\tools\\shell.efi", &loader(b"shell"))
                .with_file("shell.efi", &loader(b"shell"))
                .with_file("boot\\vmlinuz-6.1", &loader(b"kernel"))
                .with_file("boot\\vmlinuz-6.1.efi.signed", &loader(b"signed")),
        );
        let menu = scan(&config, None, &mut esp);
        assert_eq!(titles(&menu), ["\\EFI\\ubuntu\\grubx64.efi", "\\boot\\vmlinuz-6.1.efi.signed"]);
        assert_eq!(menu.get(0).map(MenuEntry::tag), Some(Tag::Loader));
    }

    #[test]
    fn test_folding() {
        let mem = MemVolume::new("root")
            .with_file_at("boot\\vmlinuz-6.1.0", &loader(b"6.1.0"), 100)
            .with_file_at("boot\\vmlinuz-6.2.0", &loader(b"6.2.0"), 300)
            .with_file_at("boot\\vmlinuz-0-rescue-abc", &loader(b"rescue"), 500)
            .with_file("boot\\initrd.img-6.2.0", b"initrd");

        let mut config = ScanConfig::default();
        let menu = scan(&config, None, &mut volume(mem.clone()));
        assert_eq!(titles(&menu), ["\\boot\\vmlinuz-6.2.0"]);

        let sub = menu.get(0).and_then(|entry| entry.subscreen.as_deref());
        let sub_titles: Vec<_> = sub.map(|sub| sub.iter().map(|e| e.title.as_str()).collect()).unwrap_or_default();
        assert_eq!(
            sub_titles,
            [
                "Boot using default options",
                "vmlinuz-6.1.0: Boot Linux",
                "vmlinuz-0-rescue-abc: Boot Linux",
                "Return to Main Menu",
            ]
        );
        assert_eq!(
            menu.get(0).and_then(MenuEntry::loader).and_then(|l| l.options.as_deref()),
            Some("initrd=\\boot\\initrd.img-6.2.0")
        );
        assert_eq!(menu.get(0).and_then(MenuEntry::loader).map(|l| l.os_type), Some(OsType::Linux));

        config.fold_linux_kernels = false;
        let menu = scan(&config, None, &mut volume(mem));
        assert_eq!(
            titles(&menu),
            ["\\boot\\vmlinuz-6.2.0", "\\boot\\vmlinuz-6.1.0", "\\boot\\vmlinuz-0-rescue-abc"]
        );
        assert!(menu.iter().all(|entry| {
            entry
                .subscreen
                .as_deref()
                .and_then(|sub| sub.iter().last())
                .is_some_and(|last| last.tag() == Tag::Return)
        }));
    }

    #[test]
    fn test_fallback() {
        let config = ScanConfig::default();
        let fallback = Arch::current().fallback_path();

        let mut duplicate = volume(
            MemVolume::new("ESP")
                .with_file(&fallback, &loader(b"grub"))
                .with_file("EFI\\ubuntu\\grubx64.efi", &loader(b"grub")),
        );
        let menu = scan(&config, None, &mut duplicate);
        assert_eq!(titles(&menu), ["\\EFI\\ubuntu\\grubx64.efi"]);

        let mut unique = volume(
            MemVolume::new("ESP")
                .with_file(&fallback, &loader(b"fallback"))
                .with_file(&alloc::format!("EFI\\BOOT\\fb{}.efi", Arch::current().suffix()), &loader(b"fb"))
                .with_file("EFI\\ubuntu\\grubx64.efi", &loader(b"grub")),
        );
        let menu = scan(&config, None, &mut unique);
        assert_eq!(titles(&menu), ["\\EFI\\ubuntu\\grubx64.efi", "Fallback boot loader"]);
    }

    #[test]
    fn test_self_is_fallback() {
        let config = ScanConfig::default();
        let fallback = Arch::current().fallback_path();
        let mut esp = volume(
            MemVolume::new("ESP")
                .with_file(&fallback, &loader(b"self"))
                .with_file("EFI\\bootscan\\bootscan.efi", &loader(b"self")),
        )
        .as_self();
        assert!(scan(&config, Some("EFI\\bootscan\\bootscan.efi"), &mut esp).is_empty());
    }

    #[test]
    fn test_microsoft() {
        let config = ScanConfig::default();
        let mut esp = volume(
            MemVolume::new("ESP")
                .with_file("EFI\\Microsoft\\Boot\\bkpbootmgfw.efi", &loader(b"windows"))
                .with_file("EFI\\Microsoft\\Boot\\bootmgfw.efi", &loader(b"grub")),
        );
        let menu = scan(&config, None, &mut esp);
        assert_eq!(
            &titles(&menu)[..2],
            ["Microsoft EFI boot (Boot Repair backup)", "Supposed Microsoft EFI boot (probably GRUB)"]
        );
    }

    #[test]
    fn test_macos() {
        let config = ScanConfig::default();
        let guid = "12345678-9abc-def0-1234-56789abcdef0";
        let mut mac = volume(
            MemVolume::new("Macintosh HD")
                .with_file(MACOS_LOADER_PATH, &loader(b"boot"))
                .with_file(&join_path(guid, "boot.efi"), &loader(b"recovery")),
        );

        let mut menu = MenuScreen::main_menu();
        let mut scanner = LoaderScanner::new(&config, None, Arch::current());
        scanner.scan_volume(VolumeId(3), &mut mac, &mut menu);

        assert_eq!(menu.get(0).map(|entry| entry.title.as_str()), Some("macOS"));
        assert_eq!(menu.get(0).and_then(MenuEntry::loader).map(|l| l.os_type), Some(OsType::MacOs));
        assert_eq!(scanner.into_apple_recovery(), [(VolumeId(3), join_path(guid, "boot.efi"))]);
    }

    #[test]
    fn test_unreadable() {
        let config = ScanConfig::default();
        let mut esp = volume(MemVolume::new("ESP").with_file("EFI\\ubuntu\\grubx64.efi", &loader(b"grub")));
        esp.release();
        assert!(scan(&config, None, &mut esp).is_empty());
    }
}
