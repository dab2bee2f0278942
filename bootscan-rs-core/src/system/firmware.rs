// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The boot and runtime services the boot manager depends on.
//!
//! Everything that leaves the boot manager goes through [`Firmware`]: starting images, variables, resets, and volume
//! enumeration. [`UefiFirmware`] implements it with the [`uefi`] crate.

use alloc::{
    boxed::Box,
    string::{String, ToString},
    vec,
    vec::Vec,
};
use core::ptr::{self, NonNull};

use log::{debug, warn};
use uefi::{
    CStr16, CString16, Handle, Status,
    boot::{self, LoadImageSource, SearchType},
    proto::{BootPolicy, device_path::DevicePath, loaded_image::LoadedImage},
    runtime::{self, ResetType},
    system,
};

use crate::{
    BootResult,
    boot::secure_boot::{self, SecureBootError},
    menu::{LegacyEntry, LegacyKind},
    system::{
        helper::{device_path_to_text, get_protocol, join_to_device_path, str_to_cstr},
        variable::{VarVendor, get_raw, set_raw, set_variable},
        volume::{Volume, VolumeTable, enumerate_volumes, open_volume_fs},
    },
};

/// The ways the computer can be reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reset {
    /// A cold reboot.
    Cold,

    /// Power off.
    Shutdown,

    /// A cold reboot into the firmware setup, once the request for it has been stored.
    FirmwareSetup,
}

/// Facts about the firmware shown on the about screen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FirmwareInfo {
    /// The firmware vendor.
    pub vendor: String,

    /// The revision of the firmware.
    pub revision: u32,

    /// The major UEFI revision.
    pub uefi_major: u16,

    /// The minor UEFI revision.
    pub uefi_minor: u16,
}

/// The platform services used by the boot manager.
pub trait Firmware {
    /// A loaded, not yet started image.
    type Image;

    /// Finds every volume.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the volumes could not be enumerated.
    fn volumes(&mut self) -> BootResult<VolumeTable>;

    /// Reopens the filesystems of volumes that were released.
    fn reacquire_volumes(&mut self, volumes: &mut VolumeTable);

    /// The path of the boot manager image on its own volume, like `EFI\bootscan\bootscan_x64.efi`.
    fn self_path(&mut self) -> Option<String>;

    /// Gets the raw content of a variable, or [`None`] if it does not exist.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the variable exists but could not be read.
    fn variable(&mut self, name: &str, vendor: VarVendor) -> BootResult<Option<Vec<u8>>>;

    /// Sets the raw content of a variable, creating it if needed.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the variable could not be written.
    fn set_variable(&mut self, name: &str, vendor: VarVendor, data: &[u8]) -> BootResult<()>;

    /// Loads an image from a volume.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the firmware refused to load the image.
    fn load_image(&mut self, volume: &Volume, path: &str) -> uefi::Result<Self::Image>;

    /// Loads the image of the boot manager itself.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the firmware refused to load the image.
    fn load_self(&mut self) -> uefi::Result<Self::Image>;

    /// Sets the load options of a loaded image.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the options could not be converted or set.
    fn set_load_options(&mut self, image: &Self::Image, options: &str) -> uefi::Result<()>;

    /// Starts a loaded image and waits for it to return, if it does.
    ///
    /// # Errors
    ///
    /// May return an `Error` with the status the image exited with.
    fn start_image(&mut self, image: &Self::Image) -> uefi::Result<()>;

    /// Unloads an image.
    fn unload_image(&mut self, image: Self::Image);

    /// Runs a discovery tool and returns the string it exits with, like the location of a network boot server.
    ///
    /// Returns [`None`] if the tool could not be run or exited without a string.
    fn run_discovery(&mut self, volume: &Volume, path: &str) -> Option<String>;

    /// Connects every driver to every controller.
    fn reconnect_drivers(&mut self);

    /// Boots an operating system in BIOS mode.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the firmware cannot boot it.
    fn start_legacy(&mut self, legacy: &LegacyEntry) -> uefi::Result<()>;

    /// If Secure Boot is enforced.
    fn secure_boot_enabled(&mut self) -> bool;

    /// If shim is loaded.
    fn shim_present(&mut self) -> bool;

    /// Installs the image verification hooks for shim, if they are needed. Returns `true` if they were installed.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the hooks could not be installed.
    fn install_security_extension(&mut self) -> Result<bool, SecureBootError>;

    /// Removes the image verification hooks installed at startup.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the original handlers could not be restored.
    fn uninstall_security_extension(&mut self) -> Result<(), SecureBootError>;

    /// Facts about the firmware.
    fn info(&mut self) -> FirmwareInfo;

    /// Resets the computer. This only returns if the reset failed.
    fn reset(&mut self, reset: Reset);
}

/// The [`Firmware`] of the running UEFI system.
#[derive(Default)]
pub struct UefiFirmware;

impl UefiFirmware {
    /// Creates a new [`UefiFirmware`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn new() -> Self {
        Self
    }

    /// Converts a variable name.
    fn name(name: &str) -> BootResult<CString16> {
        Ok(str_to_cstr(name)?)
    }
}

/// Builds the full device path of a file on a device.
fn file_device_path(device: Handle, path: &CStr16) -> uefi::Result<Box<DevicePath>> {
    let device_path = get_protocol::<DevicePath>(device).map_err(|_| Status::NOT_FOUND)?;
    let mut buf = vec![0; path.num_bytes() + 8];
    let joined = join_to_device_path(&device_path, path, &mut buf).map_err(|_| Status::OUT_OF_RESOURCES)?;
    Ok(joined.to_boxed())
}

/// Starts an image and decodes the exit data it returns, if any.
fn start_with_exit_data(image: Handle) -> Option<String> {
    let table = uefi::table::system_table_raw()?;
    let mut size = 0;
    let mut data: *mut uefi_raw::Char16 = ptr::null_mut();

    // SAFETY: the system table was set at the image entry point and boot services have not been exited
    let boot_services = unsafe { table.as_ref() }.boot_services;
    if boot_services.is_null() {
        return None;
    }

    // SAFETY: the boot services table is valid, and the image handle came from a successful load
    let status = unsafe { ((*boot_services).start_image)(image.as_ptr(), &mut size, &mut data) };
    debug!("Discovery tool exited with {status}");

    let data = NonNull::new(data)?;
    // SAFETY: the firmware hands back a pool buffer of `size` bytes holding UCS-2 text
    let units = unsafe { core::slice::from_raw_parts(data.as_ptr(), size / 2) };
    let text = char::decode_utf16(units.iter().copied().take_while(|&unit| unit != 0))
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect::<String>();

    // SAFETY: the exit data is pool memory owned by the caller of `StartImage` and is not used after this
    if let Err(e) = unsafe { boot::free_pool(data.cast()) } {
        warn!("Failed to free exit data: {e}");
    }
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Loads an image from a device path.
fn load_from(device_path: &DevicePath) -> uefi::Result<Handle> {
    boot::load_image(
        boot::image_handle(),
        LoadImageSource::FromDevicePath {
            device_path,
            boot_policy: BootPolicy::ExactMatch,
        },
    )
}

impl Firmware for UefiFirmware {
    type Image = Handle;

    fn volumes(&mut self) -> BootResult<VolumeTable> {
        enumerate_volumes()
    }

    fn reacquire_volumes(&mut self, volumes: &mut VolumeTable) {
        volumes.reacquire_all(open_volume_fs);
    }

    fn self_path(&mut self) -> Option<String> {
        let image = boot::open_protocol_exclusive::<LoadedImage>(boot::image_handle()).ok()?;
        let path = image.file_path()?;
        device_path_to_text(path).ok().map(|text| text.to_string())
    }

    fn variable(&mut self, name: &str, vendor: VarVendor) -> BootResult<Option<Vec<u8>>> {
        Ok(get_raw(&Self::name(name)?, vendor)?.map(Vec::from))
    }

    fn set_variable(&mut self, name: &str, vendor: VarVendor, data: &[u8]) -> BootResult<()> {
        set_raw(&Self::name(name)?, vendor, data)
    }

    fn load_image(&mut self, volume: &Volume, path: &str) -> uefi::Result<Handle> {
        let device = volume.handle.ok_or(Status::NOT_FOUND)?;
        let path = str_to_cstr(path).map_err(|_| Status::INVALID_PARAMETER)?;
        load_from(&file_device_path(device, &path)?)
    }

    fn load_self(&mut self) -> uefi::Result<Handle> {
        let image = boot::open_protocol_exclusive::<LoadedImage>(boot::image_handle())?;
        let device = image.device().ok_or(Status::NOT_FOUND)?;
        let file = image.file_path().ok_or(Status::NOT_FOUND)?;
        let device_path = get_protocol::<DevicePath>(device).map_err(|_| Status::NOT_FOUND)?;
        let full = device_path
            .append_path(file)
            .map_err(|_| Status::OUT_OF_RESOURCES)?;
        load_from(&full)
    }

    fn set_load_options(&mut self, image: &Handle, options: &str) -> uefi::Result<()> {
        let mut loaded = boot::open_protocol_exclusive::<LoadedImage>(*image)?;
        let options = Box::new(str_to_cstr(options).map_err(|_| Status::INVALID_PARAMETER)?);
        let size = u32::try_from(options.num_bytes()).map_err(|_| Status::BAD_BUFFER_SIZE)?;

        // the options have to outlive this function, so they are leaked
        let options: &'static CStr16 = Box::leak(options);

        // SAFETY: the options were leaked above, so they stay valid for as long as the image runs
        unsafe {
            loaded.set_load_options(options.as_ptr().cast(), size);
        }
        Ok(())
    }

    fn start_image(&mut self, image: &Handle) -> uefi::Result<()> {
        boot::start_image(*image)
    }

    fn unload_image(&mut self, image: Handle) {
        if let Err(e) = boot::unload_image(image) {
            warn!("Failed to unload image: {e}");
        }
    }

    fn run_discovery(&mut self, volume: &Volume, path: &str) -> Option<String> {
        match self.load_image(volume, path) {
            // an application that exits is unloaded by the firmware
            Ok(image) => start_with_exit_data(image),
            Err(e) => {
                warn!("Could not load {path}: {e}");
                None
            }
        }
    }

    fn reconnect_drivers(&mut self) {
        if let Ok(handles) = boot::locate_handle_buffer(SearchType::AllHandles) {
            for handle in handles.iter() {
                let _ = boot::connect_controller(*handle, None, None, true);
            }
        }
    }

    fn start_legacy(&mut self, legacy: &LegacyEntry) -> uefi::Result<()> {
        match (legacy.kind, legacy.boot_option) {
            (LegacyKind::Uefi, Some(option)) => {
                set_variable::<u16>(uefi::cstr16!("BootNext"), VarVendor::Global, option)
                    .map_err(|_| Status::DEVICE_ERROR)?;
                runtime::reset(ResetType::COLD, Status::SUCCESS, None)
            }
            _ => Err(Status::UNSUPPORTED.into()),
        }
    }

    fn secure_boot_enabled(&mut self) -> bool {
        secure_boot::secure_boot_enabled()
    }

    fn shim_present(&mut self) -> bool {
        secure_boot::shim::shim_loaded()
    }

    fn install_security_extension(&mut self) -> Result<bool, SecureBootError> {
        secure_boot::install_security_extension()
    }

    fn uninstall_security_extension(&mut self) -> Result<(), SecureBootError> {
        secure_boot::uninstall_security_extension()
    }

    fn info(&mut self) -> FirmwareInfo {
        let revision = system::uefi_revision();
        FirmwareInfo {
            vendor: system::firmware_vendor().to_string(),
            revision: system::firmware_revision(),
            uefi_major: revision.major(),
            uefi_minor: revision.minor(),
        }
    }

    fn reset(&mut self, reset: Reset) {
        let kind = match reset {
            Reset::Cold | Reset::FirmwareSetup => ResetType::COLD,
            Reset::Shutdown => ResetType::SHUTDOWN,
        };
        runtime::reset(kind, Status::SUCCESS, None);
    }
}

/// A [`Firmware`] for unit tests that records what it was asked to do.
#[cfg(test)]
pub mod scripted {
    use alloc::{borrow::ToOwned, collections::BTreeMap, string::String, vec::Vec};

    use uefi::Status;

    use super::{Firmware, FirmwareInfo, Reset};
    use crate::{
        BootResult,
        boot::secure_boot::SecureBootError,
        menu::LegacyEntry,
        system::{
            fs::mem::MemVolume,
            variable::VarVendor,
            volume::{DiskKind, Volume, VolumeTable},
        },
    };

    /// One call made to a [`ScriptedFirmware`].
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Call {
        /// An image was loaded.
        Load(String),

        /// The boot manager image was loaded.
        LoadSelf,

        /// Load options were set.
        Options(String),

        /// An image was started.
        Start(String),

        /// An image was unloaded.
        Unload(String),

        /// A discovery tool was run.
        Discover(String),

        /// Drivers were reconnected.
        Reconnect,

        /// Volumes were reopened.
        Reacquire,

        /// A legacy entry was booted.
        Legacy,

        /// The computer was reset.
        Reset(Reset),
    }

    /// A [`Firmware`] whose behavior is set up by the test.
    #[derive(Default)]
    pub struct ScriptedFirmware {
        /// The volumes handed out on every scan, as `(label, kind, content, is_self)`.
        pub volumes: Vec<(String, DiskKind, MemVolume, bool)>,

        /// The path of the boot manager image.
        pub self_path: Option<String>,

        /// The variables.
        pub variables: BTreeMap<(String, VarVendor), Vec<u8>>,

        /// The status loading an image fails with.
        pub load_status: Option<Status>,

        /// The status starting an image fails with.
        pub start_status: Option<Status>,

        /// If Secure Boot is enforced.
        pub secure_boot: bool,

        /// If shim is loaded.
        pub shim: bool,

        /// If removing the security extension fails.
        pub uninstall_fails: bool,

        /// The string discovery tools exit with.
        pub discovered: Option<String>,

        /// Every call in order.
        pub calls: Vec<Call>,
    }

    impl ScriptedFirmware {
        /// Adds a volume.
        #[must_use]
        pub fn with_volume(mut self, label: &str, kind: DiskKind, content: MemVolume, is_self: bool) -> Self {
            self.volumes.push((label.to_owned(), kind, content, is_self));
            self
        }

        /// Gets a variable.
        pub fn get(&self, name: &str, vendor: VarVendor) -> Option<&[u8]> {
            self.variables
                .get(&(name.to_owned(), vendor))
                .map(Vec::as_slice)
        }

        /// Counts the calls matching a predicate.
        pub fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|call| f(call)).count()
        }
    }

    impl Firmware for ScriptedFirmware {
        type Image = String;

        fn volumes(&mut self) -> BootResult<VolumeTable> {
            let volumes = self
                .volumes
                .iter()
                .map(|(label, kind, content, is_self)| {
                    let volume = Volume::new(label, *kind, alloc::boxed::Box::new(content.clone()));
                    if *is_self { volume.as_self() } else { volume }
                })
                .collect();
            Ok(VolumeTable::new(volumes))
        }

        fn reacquire_volumes(&mut self, _volumes: &mut VolumeTable) {
            self.calls.push(Call::Reacquire);
        }

        fn self_path(&mut self) -> Option<String> {
            self.self_path.clone()
        }

        fn variable(&mut self, name: &str, vendor: VarVendor) -> BootResult<Option<Vec<u8>>> {
            Ok(self.get(name, vendor).map(<[u8]>::to_vec))
        }

        fn set_variable(&mut self, name: &str, vendor: VarVendor, data: &[u8]) -> BootResult<()> {
            self.variables
                .insert((name.to_owned(), vendor), data.to_vec());
            Ok(())
        }

        fn load_image(&mut self, _volume: &Volume, path: &str) -> uefi::Result<String> {
            self.calls.push(Call::Load(path.to_owned()));
            match self.load_status {
                Some(status) => Err(status.into()),
                None => Ok(path.to_owned()),
            }
        }

        fn load_self(&mut self) -> uefi::Result<String> {
            self.calls.push(Call::LoadSelf);
            Ok("self".to_owned())
        }

        fn set_load_options(&mut self, _image: &String, options: &str) -> uefi::Result<()> {
            self.calls.push(Call::Options(options.to_owned()));
            Ok(())
        }

        fn start_image(&mut self, image: &String) -> uefi::Result<()> {
            self.calls.push(Call::Start(image.clone()));
            match self.start_status {
                Some(status) => Err(status.into()),
                None => Ok(()),
            }
        }

        fn unload_image(&mut self, image: String) {
            self.calls.push(Call::Unload(image));
        }

        fn run_discovery(&mut self, _volume: &Volume, path: &str) -> Option<String> {
            self.calls.push(Call::Discover(path.to_owned()));
            self.discovered.clone()
        }

        fn reconnect_drivers(&mut self) {
            self.calls.push(Call::Reconnect);
        }

        fn start_legacy(&mut self, _legacy: &LegacyEntry) -> uefi::Result<()> {
            self.calls.push(Call::Legacy);
            Err(Status::UNSUPPORTED.into())
        }

        fn secure_boot_enabled(&mut self) -> bool {
            self.secure_boot
        }

        fn shim_present(&mut self) -> bool {
            self.shim
        }

        fn install_security_extension(&mut self) -> Result<bool, SecureBootError> {
            Ok(self.secure_boot && self.shim)
        }

        fn uninstall_security_extension(&mut self) -> Result<(), SecureBootError> {
            if self.uninstall_fails {
                Err(SecureBootError::HandlerReplaced)
            } else {
                Ok(())
            }
        }

        fn info(&mut self) -> FirmwareInfo {
            FirmwareInfo {
                vendor: "EDK II".to_owned(),
                revision: 0x0001_0000,
                uefi_major: 2,
                uefi_minor: 70,
            }
        }

        fn reset(&mut self, reset: Reset) {
            self.calls.push(Call::Reset(reset));
        }
    }
}
