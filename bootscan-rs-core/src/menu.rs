// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The in-memory menu model.
//!
//! A [`MenuScreen`] owns an ordered list of [`MenuEntry`]. Every entry may own a subscreen of its own, which holds
//! the boot option variants of a loader. The whole tree is built by one scan pass and thrown away by the next, it
//! is never patched in place.
//!
//! Entries are dispatched by their [`EntryKind`], which carries everything needed to act on them.

use alloc::{borrow::ToOwned, boxed::Box, string::String, vec::Vec};

use crate::system::volume::{DiskKind, VolumeId};

pub mod options_file;
pub mod subscreen;

/// The title of the main menu.
pub const MAIN_MENU_TITLE: &str = "Main Menu";

/// The text shown next to the countdown of the main menu.
pub const TIMEOUT_TEXT: &str = "Automatic boot";

/// The hint lines of the main menu.
pub const MAIN_MENU_HINTS: [&str; 2] = [
    "Use arrow keys to move cursor; Enter to boot;",
    "Insert, Tab, or F2 for more options; Esc to refresh",
];

/// The operating system a loader boots, as far as it can be told from its path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OsType {
    /// macOS `boot.efi`.
    MacOs,

    /// A Linux kernel with an EFI stub.
    Linux,

    /// ELILO.
    Elilo,

    /// GRUB.
    Grub,

    /// The Windows boot manager.
    Windows,

    /// XOM, which boots Windows on Macs.
    Xom,

    /// A network boot loader like iPXE.
    Network,

    /// Another boot manager, possibly this one.
    BootManager,

    /// Anything else.
    #[default]
    Unknown,
}

impl OsType {
    /// The single letter code of the OS type, if it has one.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn code(self) -> Option<char> {
        match self {
            Self::MacOs => Some('M'),
            Self::Linux => Some('L'),
            Self::Elilo => Some('E'),
            Self::Grub => Some('G'),
            Self::Windows => Some('W'),
            Self::Xom => Some('X'),
            Self::Network => Some('N'),
            Self::BootManager => Some('R'),
            Self::Unknown => None,
        }
    }
}

/// How an entry was found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Discovery {
    /// By scanning a volume.
    #[default]
    Auto,

    /// From a stanza supplied by a collaborator.
    Manual,
}

/// An EFI image started from the menu, either a loader or a tool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoaderEntry {
    /// The absolute path of the image on its volume, like `\EFI\ubuntu\grubx64.efi`.
    pub path: String,

    /// The volume the image is on.
    pub volume: VolumeId,

    /// The load options passed to the image.
    pub options: Option<String>,

    /// The absolute path of the initrd of a kernel.
    pub initrd: Option<String>,

    /// What the image boots.
    pub os_type: OsType,

    /// If the image should be started with the console in graphics mode.
    pub graphics: bool,

    /// How the image was found.
    pub discovery: Discovery,

    /// If the image is a driver. Drivers get every controller reconnected when they return.
    pub is_driver: bool,
}

/// The two ways of booting an operating system through the compatibility support module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegacyKind {
    /// The Apple-specific BIOS boot path of Macs.
    Mac,

    /// The BIOS boot options of regular UEFI firmware.
    Uefi,
}

/// A BIOS mode operating system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyEntry {
    /// The boot path used.
    pub kind: LegacyKind,

    /// The volume that is booted, if it is known.
    pub volume: Option<VolumeId>,

    /// The firmware boot option number, for [`LegacyKind::Uefi`].
    pub boot_option: Option<u16>,
}

/// One of the persistent lists of hidden entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HiddenList {
    /// Hidden loaders, as `volume:path`.
    Tags,

    /// Hidden legacy volumes.
    Legacy,

    /// Hidden tools, as paths.
    Tools,
}

/// An entry that does something other than starting an image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Show information about the boot manager.
    About,

    /// Reboot the computer.
    Reboot,

    /// Shut down the computer.
    Shutdown,

    /// Reboot into the firmware setup.
    FirmwareSetup,

    /// Show the lists of hidden entries.
    ManageHidden,

    /// Switch to the next System Integrity Protection policy.
    RotateCsr,

    /// Exit the boot manager.
    Exit,

    /// Leave a subscreen.
    Return,

    /// Remove a value from one of the hidden lists.
    Unhide {
        /// The list the value is in.
        list: HiddenList,

        /// The value.
        value: String,
    },
}

/// What an entry does when it is selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// A built in action.
    Action(Action),

    /// A boot loader.
    Loader(LoaderEntry),

    /// A BIOS mode operating system.
    Legacy(LegacyEntry),

    /// A utility image.
    Tool(LoaderEntry),
}

/// The category of an entry, used to dispatch it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    /// A boot loader.
    Loader,

    /// A BIOS mode operating system on a Mac.
    LegacyMac,

    /// A BIOS mode operating system on regular UEFI firmware.
    LegacyUefi,

    /// A utility image.
    Tool,

    /// [`Action::Reboot`].
    Reboot,

    /// [`Action::Shutdown`].
    Shutdown,

    /// [`Action::FirmwareSetup`].
    FirmwareSetup,

    /// [`Action::About`].
    About,

    /// [`Action::ManageHidden`].
    ManageHidden,

    /// [`Action::RotateCsr`].
    RotateCsr,

    /// [`Action::Exit`].
    Exit,

    /// [`Action::Return`].
    Return,

    /// [`Action::Unhide`].
    Unhide,
}

/// An entry of a [`MenuScreen`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuEntry {
    /// The title of the entry.
    pub title: String,

    /// The letter that selects the entry.
    pub shortcut: Option<char>,

    /// The digit that selects the entry.
    pub digit: Option<char>,

    /// `0` for operating systems, `1` for tools and actions.
    pub row: u8,

    /// Names of icons that fit the entry, best first.
    pub icon_hints: Vec<String>,

    /// The kind of disk the entry is on, drawn as a badge.
    pub badge: Option<DiskKind>,

    /// What the entry does.
    pub kind: EntryKind,

    /// The boot option variants of the entry.
    pub subscreen: Option<Box<MenuScreen>>,
}

impl MenuEntry {
    /// Creates an entry with nothing but a title and a kind.
    #[must_use = "Has no effect if the result is unused"]
    pub fn new(title: &str, kind: EntryKind) -> Self {
        let row = match kind {
            EntryKind::Loader(_) | EntryKind::Legacy(_) => 0,
            EntryKind::Tool(_) | EntryKind::Action(_) => 1,
        };
        Self {
            title: title.to_owned(),
            shortcut: None,
            digit: None,
            row,
            icon_hints: Vec::new(),
            badge: None,
            kind,
            subscreen: None,
        }
    }

    /// Creates an action entry.
    #[must_use = "Has no effect if the result is unused"]
    pub fn action(title: &str, action: Action, shortcut: Option<char>) -> Self {
        let mut entry = Self::new(title, EntryKind::Action(action));
        entry.shortcut = shortcut;
        entry
    }

    /// Creates the entry that leaves a subscreen.
    #[must_use = "Has no effect if the result is unused"]
    pub fn return_entry() -> Self {
        Self::action("Return to Main Menu", Action::Return, None)
    }

    /// Get the category of the entry.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn tag(&self) -> Tag {
        match &self.kind {
            EntryKind::Loader(_) => Tag::Loader,
            EntryKind::Tool(_) => Tag::Tool,
            EntryKind::Legacy(legacy) => match legacy.kind {
                LegacyKind::Mac => Tag::LegacyMac,
                LegacyKind::Uefi => Tag::LegacyUefi,
            },
            EntryKind::Action(action) => match action {
                Action::About => Tag::About,
                Action::Reboot => Tag::Reboot,
                Action::Shutdown => Tag::Shutdown,
                Action::FirmwareSetup => Tag::FirmwareSetup,
                Action::ManageHidden => Tag::ManageHidden,
                Action::RotateCsr => Tag::RotateCsr,
                Action::Exit => Tag::Exit,
                Action::Return => Tag::Return,
                Action::Unhide { .. } => Tag::Unhide,
            },
        }
    }

    /// Get the image of the entry, if it starts one.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn loader(&self) -> Option<&LoaderEntry> {
        match &self.kind {
            EntryKind::Loader(loader) | EntryKind::Tool(loader) => Some(loader),
            _ => None,
        }
    }

    /// Get the image of the entry mutably, if it starts one.
    pub const fn loader_mut(&mut self) -> Option<&mut LoaderEntry> {
        match &mut self.kind {
            EntryKind::Loader(loader) | EntryKind::Tool(loader) => Some(loader),
            _ => None,
        }
    }

    /// The comma separated icon hints.
    #[must_use = "Has no effect if the result is unused"]
    pub fn icon_hint_list(&self) -> String {
        self.icon_hints.join(",")
    }
}

/// A selection in the menu tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Choice {
    /// The index of the entry in the main menu.
    pub index: usize,

    /// The index of the entry in the subscreen of the main menu entry, if one was picked there.
    pub sub: Option<usize>,
}

impl Choice {
    /// Picks an entry of the main menu.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn main(index: usize) -> Self {
        Self { index, sub: None }
    }

    /// Picks an entry of a subscreen.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn sub(index: usize, sub: usize) -> Self {
        Self {
            index,
            sub: Some(sub),
        }
    }
}

/// A screen of the menu.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MenuScreen {
    /// The title of the screen.
    pub title: String,

    /// Usage hints shown at the bottom.
    pub hints: Vec<String>,

    /// Lines of text shown above the entries.
    pub info_lines: Vec<String>,

    /// Seconds before the default entry is picked, or [`None`] to wait forever.
    pub timeout: Option<u32>,

    /// The text shown next to the countdown.
    pub timeout_text: Option<String>,

    /// The index of the entry selected when the screen is shown.
    pub default: usize,

    /// The entries of the screen.
    entries: Vec<MenuEntry>,
}

impl MenuScreen {
    /// Creates an empty screen.
    #[must_use = "Has no effect if the result is unused"]
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_owned(),
            ..Self::default()
        }
    }

    /// Creates an empty main menu.
    #[must_use = "Has no effect if the result is unused"]
    pub fn main_menu() -> Self {
        let mut screen = Self::new(MAIN_MENU_TITLE);
        screen.hints = MAIN_MENU_HINTS.iter().map(|&hint| hint.to_owned()).collect();
        screen.timeout_text = Some(TIMEOUT_TEXT.to_owned());
        screen
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: MenuEntry) {
        self.entries.push(entry);
    }

    /// Get an entry.
    #[must_use = "Has no effect if the result is unused"]
    pub fn get(&self, index: usize) -> Option<&MenuEntry> {
        self.entries.get(index)
    }

    /// Get an entry mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut MenuEntry> {
        self.entries.get_mut(index)
    }

    /// Get the last entry mutably.
    pub fn last_mut(&mut self) -> Option<&mut MenuEntry> {
        self.entries.last_mut()
    }

    /// The number of entries.
    #[must_use = "Has no effect if the result is unused"]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// If the screen has no entries.
    #[must_use = "Has no effect if the result is unused"]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries.
    pub fn iter(&self) -> impl Iterator<Item = &MenuEntry> {
        self.entries.iter()
    }

    /// Iterate over the entries mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MenuEntry> {
        self.entries.iter_mut()
    }

    /// Finds the first entry selected by a letter or digit.
    #[must_use = "Has no effect if the result is unused"]
    pub fn find_shortcut(&self, key: char) -> Option<usize> {
        let key = key.to_ascii_uppercase();
        self.entries
            .iter()
            .position(|entry| entry.digit == Some(key) || entry.shortcut == Some(key))
    }

    /// Get the entry a [`Choice`] points to.
    #[must_use = "Has no effect if the result is unused"]
    pub fn resolve(&self, choice: Choice) -> Option<&MenuEntry> {
        let entry = self.get(choice.index)?;
        match choice.sub {
            Some(sub) => entry.subscreen.as_ref()?.get(sub),
            None => Some(entry),
        }
    }
}
