// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`BootManager`], which runs the menu loop of the boot manager.
//!
//! The manager owns the model of one scan pass: the configuration, the volumes, and the main menu. Drawing and
//! input are left to a [`MenuDisplay`]. Every pick made there is dispatched by the kind of the entry, and most of
//! them come back to the menu. Only resets and the exit action leave the loop.

use alloc::{
    string::{String, ToString},
    vec,
};

use log::{error, info, warn};

use crate::{
    BootResult,
    boot::{
        action::{
            about_screen, csr_description, hidden_screen, request_firmware_setup, rotate_csr,
        },
        launch::{secure_boot_help, start_image, store_previous_boot},
    },
    config::ScanConfig,
    menu::{Action, Choice, EntryKind, HiddenList, LoaderEntry, MenuEntry, MenuScreen},
    scan::{build_main_menu, hidden},
    system::{
        firmware::{Firmware, Reset},
        volume::VolumeTable,
    },
};

pub mod action;
pub mod launch;
pub mod secure_boot;

/// What the user did with a [`MenuScreen`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuOutcome {
    /// An entry was picked.
    Chosen(Choice),

    /// Escape was pressed.
    Escape,

    /// The countdown ran out.
    Timeout,

    /// The hide key was pressed on an entry of the main menu.
    Hide(usize),
}

/// Draws menus and waits for the user.
pub trait MenuDisplay {
    /// Shows a screen until the user does something with it.
    ///
    /// Subscreens of entries are entered and left by the display itself, a pick inside one is reported as
    /// [`Choice::sub`]. The countdown of the screen only runs until the first key press.
    fn run(&mut self, screen: &MenuScreen) -> MenuOutcome;

    /// Shows a message and waits for a key.
    fn message(&mut self, title: &str, lines: &[String]);

    /// Called right before an image is started, to leave the screen in a state the image can use.
    fn before_launch(&mut self, _title: &str, _graphics: bool) {}
}

/// How the menu loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    /// The boot manager should return to the firmware.
    Exit,

    /// The computer should be reset.
    Reset(Reset),
}

/// The boot manager.
pub struct BootManager<F: Firmware, D: MenuDisplay> {
    /// The firmware.
    firmware: F,

    /// The display.
    display: D,

    /// The volumes the entries of the menu refer to.
    volumes: VolumeTable,

    /// The configuration of the last scan pass.
    config: ScanConfig,

    /// The main menu.
    menu: MenuScreen,

    /// If the Secure Boot hooks were installed at startup.
    extension_installed: bool,
}

impl<F: Firmware, D: MenuDisplay> BootManager<F, D> {
    /// Creates a new [`BootManager`], installing the Secure Boot hooks if needed and scanning for entries.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the volumes could not be enumerated.
    pub fn new(mut firmware: F, display: D) -> BootResult<Self> {
        let extension_installed = firmware.install_security_extension().unwrap_or_else(|e| {
            warn!("Could not install the Secure Boot hooks: {e}");
            false
        });

        let pass = build_main_menu(&mut firmware)?;
        log::set_max_level(pass.config.log_level);

        Ok(Self {
            firmware,
            display,
            volumes: pass.volumes,
            config: pass.config,
            menu: pass.menu,
            extension_installed,
        })
    }

    /// The main menu.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn menu(&self) -> &MenuScreen {
        &self.menu
    }

    /// The firmware.
    pub const fn firmware(&mut self) -> &mut F {
        &mut self.firmware
    }

    /// Throws the model away and scans again. If the new pass fails, the old model is kept.
    pub fn rescan(&mut self) {
        match build_main_menu(&mut self.firmware) {
            Ok(pass) => {
                log::set_max_level(pass.config.log_level);
                self.volumes = pass.volumes;
                self.config = pass.config;
                self.menu = pass.menu;
            }
            Err(e) => error!("Rescan failed, keeping the previous menu: {e}"),
        }
    }

    /// Runs the menu loop until an entry ends it.
    pub fn run(&mut self) -> Terminal {
        loop {
            let choice = match self.display.run(&self.menu) {
                MenuOutcome::Chosen(choice) => choice,
                MenuOutcome::Escape => {
                    self.rescan();
                    continue;
                }
                MenuOutcome::Timeout if self.config.shutdown_after_timeout => {
                    return Terminal::Reset(Reset::Shutdown);
                }
                MenuOutcome::Timeout => Choice::main(self.menu.default),
                MenuOutcome::Hide(index) => {
                    self.hide(index);
                    continue;
                }
            };

            let Some(entry) = self.menu.resolve(choice).cloned() else {
                continue;
            };
            if let Some(terminal) = self.dispatch(&entry) {
                return terminal;
            }

            // the countdown only runs once
            self.menu.timeout = None;
        }
    }

    /// Acts on an entry. Returns [`Some`] if the menu loop should end.
    fn dispatch(&mut self, entry: &MenuEntry) -> Option<Terminal> {
        match &entry.kind {
            EntryKind::Loader(loader) => {
                store_previous_boot(&mut self.firmware, &entry.title);
                self.display.before_launch(&entry.title, loader.graphics);
                self.launch(loader, &entry.title, !loader.graphics);
            }
            EntryKind::Tool(loader) => {
                self.display.before_launch(&entry.title, loader.graphics);
                self.launch(loader, &entry.title, true);
            }
            EntryKind::Legacy(legacy) => {
                store_previous_boot(&mut self.firmware, &entry.title);
                if let Err(e) = self.firmware.start_legacy(legacy) {
                    self.display
                        .message("Error", &[alloc::format!("{e} while booting {}", entry.title)]);
                }
            }
            EntryKind::Action(action) => return self.act(action),
        }
        None
    }

    /// Runs a built in action. Returns [`Some`] if the menu loop should end.
    fn act(&mut self, action: &Action) -> Option<Terminal> {
        match action {
            Action::Reboot => return Some(Terminal::Reset(Reset::Cold)),
            Action::Shutdown => return Some(Terminal::Reset(Reset::Shutdown)),
            Action::FirmwareSetup => match request_firmware_setup(&mut self.firmware) {
                Ok(()) => return Some(Terminal::Reset(Reset::FirmwareSetup)),
                Err(e) => self
                    .display
                    .message("Error", &[alloc::format!("Could not request the firmware setup: {e}")]),
            },
            Action::About => {
                let screen = about_screen(&mut self.firmware, self.extension_installed);
                let _ = self.display.run(&screen);
            }
            Action::ManageHidden => self.manage_hidden(),
            Action::RotateCsr => match rotate_csr(&mut self.firmware, &self.config.csr_values) {
                Ok(value) => self
                    .display
                    .message("Change SIP Policy", &[csr_description(value)]),
                Err(e) => self
                    .display
                    .message("Error", &[alloc::format!("Could not change the SIP policy: {e}")]),
            },
            Action::Exit => return Some(self.exit()),
            Action::Return => (),
            Action::Unhide { list, value } => {
                self.unhide(*list, value);
                self.rescan();
            }
        }
        None
    }

    /// Starts a loader or tool and reports what went wrong.
    fn launch(&mut self, loader: &LoaderEntry, title: &str, verbose: bool) {
        let Err(e) = start_image(&mut self.firmware, &mut self.volumes, loader, title) else {
            return;
        };

        error!("{e}");
        let mut lines = vec![e.to_string()];
        if e.is_security_violation() {
            if verbose && self.firmware.secure_boot_enabled() {
                lines.extend(secure_boot_help(title));
            }
            self.display.message("Secure Boot", &lines);
        } else {
            self.display.message("Error", &lines);
        }
    }

    /// Shows the hidden entries, and shows again the one that is picked.
    fn manage_hidden(&mut self) {
        let screen = hidden_screen(&mut self.firmware);
        let MenuOutcome::Chosen(choice) = self.display.run(&screen) else {
            return;
        };
        if let Some(MenuEntry {
            kind: EntryKind::Action(Action::Unhide { list, value }),
            ..
        }) = screen.resolve(choice)
        {
            self.unhide(*list, value);
            self.rescan();
        }
    }

    /// Removes a value from a hidden list.
    fn unhide(&mut self, list: HiddenList, value: &str) {
        match hidden::remove(&mut self.firmware, list, value) {
            Ok(true) => info!("Showing {value} again"),
            Ok(false) => (),
            Err(e) => error!("Could not update {}: {e}", list.variable_name()),
        }
    }

    /// Hides an entry of the main menu and scans again.
    fn hide(&mut self, index: usize) {
        let Some(entry) = self.menu.get(index) else {
            return;
        };
        let (list, value) = match &entry.kind {
            EntryKind::Loader(loader) => (
                HiddenList::Tags,
                hidden::loader_tag(self.volumes.name(loader.volume), &loader.path),
            ),
            EntryKind::Tool(loader) => (HiddenList::Tools, loader.path.clone()),
            EntryKind::Legacy(legacy) => match legacy.volume {
                Some(volume) => (HiddenList::Legacy, self.volumes.name(volume).to_string()),
                None => return,
            },
            EntryKind::Action(_) => return,
        };

        match hidden::append(&mut self.firmware, list, &value) {
            Ok(_) => self.rescan(),
            Err(e) => error!("Could not hide {value}: {e}"),
        }
    }

    /// Removes the Secure Boot hooks before returning to the firmware.
    ///
    /// Hooks that cannot be removed would point into an image that is about to be unloaded, so a failure resets the
    /// computer instead.
    fn exit(&mut self) -> Terminal {
        if !self.extension_installed {
            return Terminal::Exit;
        }
        match self.firmware.uninstall_security_extension() {
            Ok(()) => Terminal::Exit,
            Err(e) => {
                error!("Could not remove the Secure Boot hooks: {e}");
                Terminal::Reset(Reset::Cold)
            }
        }
    }
}

/// Resets the computer, and never returns.
///
/// If the reset fails, a cold reset is tried, and if that fails too the processor spins forever.
pub fn halt<F: Firmware + ?Sized>(firmware: &mut F, reset: Reset) -> ! {
    firmware.reset(reset);
    firmware.reset(Reset::Cold);
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scan::{PREVIOUS_BOOT, encode_previous_boot},
        system::{
            firmware::scripted::{Call, ScriptedFirmware},
            fs::mem::{MemVolume, loader},
            variable::VarVendor,
            volume::{DiskKind, VolumeId},
        },
    };
    use alloc::{borrow::ToOwned, boxed::Box, collections::VecDeque, vec::Vec};
    use uefi::Status;

    /// One answer of a [`ScriptedDisplay`].
    type Step = Box<dyn FnMut(&MenuScreen) -> MenuOutcome>;

    /// A display that answers with a script.
    #[derive(Default)]
    struct ScriptedDisplay {
        steps: VecDeque<Step>,
        screens: Vec<Vec<String>>,
        messages: Vec<(String, Vec<String>)>,
        launched: Vec<String>,
    }

    impl ScriptedDisplay {
        fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: steps.into_iter().collect(),
                ..Self::default()
            }
        }
    }

    impl MenuDisplay for ScriptedDisplay {
        fn run(&mut self, screen: &MenuScreen) -> MenuOutcome {
            self.screens
                .push(screen.iter().map(|entry| entry.title.clone()).collect());
            let mut step = self.steps.pop_front().expect("the script ran out of steps");
            step(screen)
        }

        fn message(&mut self, title: &str, lines: &[String]) {
            self.messages.push((title.to_owned(), lines.to_vec()));
        }

        fn before_launch(&mut self, title: &str, _graphics: bool) {
            self.launched.push(title.to_owned());
        }
    }

    fn position(screen: &MenuScreen, text: &str) -> usize {
        screen
            .iter()
            .position(|entry| entry.title.contains(text))
            .expect("no entry with that title")
    }

    fn pick(text: &'static str) -> Step {
        Box::new(move |screen| MenuOutcome::Chosen(Choice::main(position(screen, text))))
    }

    fn answer(outcome: MenuOutcome) -> Step {
        Box::new(move |_| outcome)
    }

    fn firmware(conf: &str) -> ScriptedFirmware {
        let mut fw = ScriptedFirmware::default().with_volume(
            "ESP",
            DiskKind::Internal,
            MemVolume::new("ESP")
                .with_file("EFI\\bootscan\\bootscan.efi", &loader(b"self"))
                .with_file("EFI\\bootscan\\bootscan.conf", conf.as_bytes())
                .with_file("EFI\\ubuntu\\grubx64.efi", &loader(b"grub")),
            true,
        );
        fw.self_path = Some("\\EFI\\bootscan\\bootscan.efi".to_owned());
        fw
    }

    fn manager(fw: ScriptedFirmware, steps: impl IntoIterator<Item = Step>) -> BootManager<ScriptedFirmware, ScriptedDisplay> {
        BootManager::new(fw, ScriptedDisplay::new(steps)).expect("the scan failed")
    }

    const TOOLS: &str = "showtools exit,reboot,firmware,shutdown\n";

    #[test]
    fn test_launch_and_return() {
        let mut mgr = manager(firmware(TOOLS), [pick("grubx64"), pick("Exit bootscan")]);
        assert_eq!(mgr.run(), Terminal::Exit);

        assert_eq!(mgr.firmware.count(|call| matches!(call, Call::Start(_))), 1);
        assert_eq!(mgr.display.launched.len(), 1);
        assert!(mgr.display.messages.is_empty());
        assert_eq!(
            mgr.firmware.get(PREVIOUS_BOOT, VarVendor::Manager),
            Some(encode_previous_boot(&mgr.display.launched[0]).as_slice())
        );
        // the countdown does not come back after a launch
        assert_eq!(mgr.menu.timeout, None);
    }

    #[test]
    fn test_escape_rescans() {
        let mut mgr = manager(
            firmware(TOOLS),
            [
                Box::new(|screen: &MenuScreen| {
                    MenuOutcome::Hide(position(screen, "grubx64"))
                }) as Step,
                answer(MenuOutcome::Escape),
                pick("Exit bootscan"),
            ],
        );
        assert_eq!(mgr.run(), Terminal::Exit);

        assert_eq!(
            mgr.firmware.get("HiddenTags", VarVendor::Manager),
            Some(b"ESP:\\EFI\\ubuntu\\grubx64.efi".as_slice())
        );
        let [first, second, third] = mgr.display.screens.as_slice() else {
            panic!("three screens expected");
        };
        assert!(first.iter().any(|title| title.contains("grubx64")));
        assert!(!second.iter().any(|title| title.contains("grubx64")));
        // an unchanged filesystem scans to the same menu
        assert_eq!(second, third);
    }

    #[test]
    fn test_manage_hidden() {
        let mut fw = firmware("showtools hidden_tags,exit\n");
        fw.variables.insert(
            ("HiddenTags".to_owned(), VarVendor::Manager),
            b"ESP:\\EFI\\ubuntu\\grubx64.efi".to_vec(),
        );
        let mut mgr = manager(
            fw,
            [pick("Manage Hidden"), pick("grubx64"), pick("Exit bootscan")],
        );
        assert!(!mgr.menu.iter().any(|entry| entry.title.contains("grubx64")));

        assert_eq!(mgr.run(), Terminal::Exit);
        assert_eq!(mgr.firmware.get("HiddenTags", VarVendor::Manager), Some(b"".as_slice()));
        assert!(mgr.menu.iter().any(|entry| entry.title.contains("grubx64")));
    }

    #[test]
    fn test_security_violation() {
        let mut fw = firmware(TOOLS);
        fw.secure_boot = true;
        fw.load_status = Some(Status::SECURITY_VIOLATION);
        let mut mgr = manager(fw, [pick("grubx64"), pick("Exit bootscan")]);
        assert_eq!(mgr.run(), Terminal::Exit);

        let [(title, lines)] = mgr.display.messages.as_slice() else {
            panic!("one message expected");
        };
        assert_eq!(title, "Secure Boot");
        assert!(lines.iter().any(|line| line.contains("machine owner key")));
    }

    #[test]
    fn test_invalid_loader() {
        let mut mgr = manager(firmware(TOOLS), [pick("Broken"), pick("Exit bootscan")]);
        mgr.menu.push(MenuEntry::new(
            "Start Broken tool",
            EntryKind::Tool(LoaderEntry {
                path: "\\EFI\\bootscan\\bootscan.conf".to_owned(),
                volume: VolumeId(0),
                ..LoaderEntry::default()
            }),
        ));

        assert_eq!(mgr.run(), Terminal::Exit);
        assert_eq!(mgr.firmware.count(|call| matches!(call, Call::Load(_))), 0);
        assert!(mgr.display.messages[0].1[0].contains("Invalid loader"));
    }

    #[test]
    fn test_exit_with_hooks() {
        let mut fw = firmware(TOOLS);
        fw.secure_boot = true;
        fw.shim = true;
        let mut mgr = manager(fw, [pick("Exit bootscan")]);
        assert!(mgr.extension_installed);
        assert_eq!(mgr.run(), Terminal::Exit);

        let mut fw = firmware(TOOLS);
        fw.secure_boot = true;
        fw.shim = true;
        fw.uninstall_fails = true;
        let mut mgr = manager(fw, [pick("Exit bootscan")]);
        assert_eq!(mgr.run(), Terminal::Reset(Reset::Cold));
    }

    #[test]
    fn test_timeout() {
        let mut mgr = manager(firmware(TOOLS), [answer(MenuOutcome::Timeout), pick("Reboot")]);
        assert_eq!(mgr.run(), Terminal::Reset(Reset::Cold));
        assert_eq!(mgr.firmware.count(|call| matches!(call, Call::Start(_))), 1);

        let conf = alloc::format!("{TOOLS}shutdown_after_timeout true\n");
        let mut mgr = manager(firmware(&conf), [answer(MenuOutcome::Timeout)]);
        assert_eq!(mgr.run(), Terminal::Reset(Reset::Shutdown));
        assert_eq!(mgr.firmware.count(|call| matches!(call, Call::Start(_))), 0);
    }

    #[test]
    fn test_firmware_setup() {
        let mut fw = firmware(TOOLS);
        fw.variables.insert(
            ("OsIndicationsSupported".to_owned(), VarVendor::Global),
            1u64.to_le_bytes().to_vec(),
        );
        fw.variables.insert(
            ("OsIndications".to_owned(), VarVendor::Global),
            4u64.to_le_bytes().to_vec(),
        );
        let mut mgr = manager(fw, [pick("Computer Setup"), pick("Shut Down")]);
        assert_eq!(mgr.run(), Terminal::Reset(Reset::FirmwareSetup));
        assert_eq!(
            mgr.firmware.get("OsIndications", VarVendor::Global),
            Some(5u64.to_le_bytes().as_slice())
        );
    }
}
