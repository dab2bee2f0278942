// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Starts the image of a loader or tool entry.
//!
//! The image is checked by the loader validator before the firmware is asked to load it. The boot manager's own
//! filesystems are released right before control is handed over and reopened if the image returns, since most
//! loaders never do.
//!
//! # Example
//!
//! ```ignore
//! use bootscan_rs_core::{boot::launch::start_image, menu::LoaderEntry, system::firmware::UefiFirmware};
//!
//! let mut firmware = UefiFirmware::new();
//! let mut volumes = firmware.volumes()?;
//! let loader = LoaderEntry {
//!     path: "\\EFI\\ubuntu\\grubx64.efi".to_owned(),
//!     ..LoaderEntry::default()
//! };
//!
//! start_image(&mut firmware, &mut volumes, &loader, "Ubuntu")?;
//! ```

use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};

use log::{info, warn};
use thiserror::Error;
use uefi::Status;

use crate::{
    menu::{LoaderEntry, OsType},
    scan::{PREVIOUS_BOOT, encode_previous_boot, validate::is_valid_loader},
    system::{firmware::Firmware, variable::VarVendor, volume::VolumeTable},
};

/// An `Error` that may result from starting an image.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LaunchError {
    /// The volume of the image is gone.
    #[error("The volume of {0} is gone")]
    NoVolume(String),

    /// The file is not an image for this architecture.
    #[error("Invalid loader file: {0}")]
    InvalidLoader(String),

    /// Secure Boot refused the image.
    #[error("Secure Boot validation failure loading {0}")]
    SecurityViolation(String),

    /// The firmware could not load the image.
    #[error("{status} while loading {title}")]
    Load {
        /// The title of the entry.
        title: String,

        /// The status the firmware returned.
        status: Status,
    },

    /// The load options could not be set.
    #[error("{0} while setting the load options")]
    Options(Status),

    /// The image returned an error.
    #[error("{status} returned from {title}")]
    Start {
        /// The title of the entry.
        title: String,

        /// The status the image exited with.
        status: Status,
    },
}

impl LaunchError {
    /// If the error is a Secure Boot refusal.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn is_security_violation(&self) -> bool {
        matches!(self, Self::SecurityViolation(_))
    }
}

/// The lines explaining what to do about an image that failed Secure Boot validation.
#[must_use = "Has no effect if the result is unused"]
pub fn secure_boot_help(name: &str) -> Vec<String> {
    [
        format!("This computer is configured with Secure Boot active, but {name} has failed validation."),
        String::new(),
        "You can:".to_string(),
        " * Launch another boot loader".to_string(),
        " * Disable Secure Boot in your firmware".to_string(),
        format!(" * Sign {name} with a machine owner key (MOK)"),
        format!(" * Use a MOK utility (often present on the second row) to add a MOK with which {name} has already been signed."),
        format!(" * Use a MOK utility to register {name} (\"enroll its hash\") without signing it."),
    ]
    .into()
}

/// Builds the load options of an image: its own path, then its options.
///
/// Apple's `boot.efi` expects a trailing space after its options.
#[must_use = "Has no effect if the result is unused"]
pub fn load_options(loader: &LoaderEntry) -> String {
    let mut options = format!("{} {}", loader.path, loader.options.as_deref().unwrap_or_default());
    if loader.os_type == OsType::MacOs && loader.options.is_some() {
        options.push(' ');
    }
    options
}

/// Stores the title of an entry as the previously launched one, unless it is stored already.
pub fn store_previous_boot<F: Firmware + ?Sized>(firmware: &mut F, title: &str) {
    let data = encode_previous_boot(title);
    let stored = firmware.variable(PREVIOUS_BOOT, VarVendor::Manager).ok().flatten();
    if stored.as_deref() == Some(data.as_slice()) {
        return;
    }
    if let Err(e) = firmware.set_variable(PREVIOUS_BOOT, VarVendor::Manager, &data) {
        warn!("Could not store the previously booted entry: {e}");
    }
}

/// If a status means the Secure Boot policy refused an image.
const fn is_refusal(status: Status) -> bool {
    matches!(status, Status::ACCESS_DENIED | Status::SECURITY_VIOLATION)
}

/// Loads and starts an image, returning once it exits.
///
/// # Errors
///
/// May return an `Error` if the image is invalid, Secure Boot refuses it, the firmware could not load it, or the
/// image returned an error.
pub fn start_image<F: Firmware + ?Sized>(
    firmware: &mut F,
    volumes: &mut VolumeTable,
    loader: &LoaderEntry,
    title: &str,
) -> Result<(), LaunchError> {
    let volume = volumes
        .get_mut(loader.volume)
        .ok_or_else(|| LaunchError::NoVolume(title.to_string()))?;

    if !is_valid_loader(volume.fs(), Some(&loader.path)) {
        return Err(LaunchError::InvalidLoader(loader.path.clone()));
    }

    let image = match firmware.load_image(volume, &loader.path) {
        Ok(image) => image,
        Err(e) if is_refusal(e.status()) => {
            return Err(LaunchError::SecurityViolation(title.to_string()));
        }
        Err(e) => {
            return Err(LaunchError::Load {
                title: title.to_string(),
                status: e.status(),
            });
        }
    };

    // old versions of shim only verify the first image started after a load of a different image
    if firmware.secure_boot_enabled() && firmware.shim_present() {
        let _ = firmware.load_self();
    }

    let options = load_options(loader);
    if let Err(e) = firmware.set_load_options(&image, &options) {
        firmware.unload_image(image);
        return Err(LaunchError::Options(e.status()));
    }

    info!("Starting {title} with load options '{options}'");
    volumes.release_all();
    let result = firmware.start_image(&image);

    if loader.is_driver {
        firmware.reconnect_drivers();
    }
    firmware.reacquire_volumes(volumes);
    if !loader.is_driver {
        firmware.unload_image(image);
    }

    result.map_err(|e| {
        if is_refusal(e.status()) {
            LaunchError::SecurityViolation(title.to_string())
        } else {
            LaunchError::Start {
                title: title.to_string(),
                status: e.status(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{
        firmware::scripted::{Call, ScriptedFirmware},
        fs::mem::{MemVolume, loader},
        volume::{DiskKind, Volume, VolumeId},
    };
    use alloc::{borrow::ToOwned, boxed::Box, vec};

    fn volumes() -> VolumeTable {
        let mem = MemVolume::new("ESP")
            .with_file("EFI\\ubuntu\\grubx64.efi", &loader(b"grub"))
            .with_file("EFI\\broken\\broken.efi", b"not an image");
        VolumeTable::new(vec![Volume::new("ESP", DiskKind::Internal, Box::new(mem))])
    }

    fn grub() -> LoaderEntry {
        LoaderEntry {
            path: "\\EFI\\ubuntu\\grubx64.efi".to_owned(),
            volume: VolumeId(0),
            ..LoaderEntry::default()
        }
    }

    #[test]
    fn test_load_options() {
        let mut entry = grub();
        assert_eq!(load_options(&entry), "\\EFI\\ubuntu\\grubx64.efi ");

        entry.options = Some("-v".to_owned());
        entry.os_type = OsType::MacOs;
        assert_eq!(load_options(&entry), "\\EFI\\ubuntu\\grubx64.efi -v ");

        entry.os_type = OsType::Linux;
        entry.options = Some("ro quiet".to_owned());
        assert_eq!(load_options(&entry), "\\EFI\\ubuntu\\grubx64.efi ro quiet");
    }

    #[test]
    fn test_start() {
        let mut fw = ScriptedFirmware::default();
        let mut volumes = volumes();

        assert_eq!(start_image(&mut fw, &mut volumes, &grub(), "Ubuntu"), Ok(()));
        assert_eq!(
            fw.calls,
            [
                Call::Load("\\EFI\\ubuntu\\grubx64.efi".to_owned()),
                Call::Options("\\EFI\\ubuntu\\grubx64.efi ".to_owned()),
                Call::Start("\\EFI\\ubuntu\\grubx64.efi".to_owned()),
                Call::Reacquire,
                Call::Unload("\\EFI\\ubuntu\\grubx64.efi".to_owned()),
            ]
        );
        // released before the start
        assert!(volumes.get(VolumeId(0)).is_some_and(|v| !v.is_readable()));
    }

    #[test]
    fn test_invalid_loader() {
        let mut fw = ScriptedFirmware::default();
        let mut volumes = volumes();
        let mut broken = grub();
        broken.path = "\\EFI\\broken\\broken.efi".to_owned();

        assert!(matches!(
            start_image(&mut fw, &mut volumes, &broken, "Broken"),
            Err(LaunchError::InvalidLoader(_))
        ));
        assert!(fw.calls.is_empty());
    }

    #[test]
    fn test_security_violation() {
        let mut fw = ScriptedFirmware {
            load_status: Some(Status::SECURITY_VIOLATION),
            ..ScriptedFirmware::default()
        };
        let mut volumes = volumes();
        let err = start_image(&mut fw, &mut volumes, &grub(), "Ubuntu");
        assert!(err.is_err_and(|e| e.is_security_violation()));
        assert_eq!(fw.count(|call| matches!(call, Call::Start(_))), 0);

        fw.load_status = Some(Status::NOT_FOUND);
        assert_eq!(
            start_image(&mut fw, &mut volumes, &grub(), "Ubuntu"),
            Err(LaunchError::Load {
                title: "Ubuntu".to_owned(),
                status: Status::NOT_FOUND
            })
        );
    }

    #[test]
    fn test_shim_workaround_and_driver() {
        let mut fw = ScriptedFirmware {
            secure_boot: true,
            shim: true,
            start_status: Some(Status::ABORTED),
            ..ScriptedFirmware::default()
        };
        let mut volumes = volumes();
        let mut driver = grub();
        driver.is_driver = true;

        assert_eq!(
            start_image(&mut fw, &mut volumes, &driver, "Driver"),
            Err(LaunchError::Start {
                title: "Driver".to_owned(),
                status: Status::ABORTED
            })
        );
        assert_eq!(fw.count(|call| *call == Call::LoadSelf), 1);
        assert_eq!(fw.count(|call| *call == Call::Reconnect), 1);
        assert_eq!(fw.count(|call| matches!(call, Call::Unload(_))), 0);
    }

    #[test]
    fn test_start_security_violation() {
        let mut fw = ScriptedFirmware {
            secure_boot: true,
            shim: true,
            start_status: Some(Status::SECURITY_VIOLATION),
            ..ScriptedFirmware::default()
        };
        let mut volumes = volumes();

        let result = start_image(&mut fw, &mut volumes, &grub(), "Ubuntu");
        assert_eq!(result, Err(LaunchError::SecurityViolation("Ubuntu".to_owned())));
        assert!(result.is_err_and(|e| e.is_security_violation()));

        // the image is still cleaned up after a refused start
        assert_eq!(fw.count(|call| *call == Call::Reacquire), 1);
        assert_eq!(fw.count(|call| matches!(call, Call::Unload(_))), 1);
    }

    #[test]
    fn test_store_previous_boot() {
        let mut fw = ScriptedFirmware::default();
        store_previous_boot(&mut fw, "Ubuntu");
        assert_eq!(
            fw.get(PREVIOUS_BOOT, VarVendor::Manager),
            Some(encode_previous_boot("Ubuntu").as_slice())
        );
        store_previous_boot(&mut fw, "Ubuntu");
        store_previous_boot(&mut fw, "Windows");
        assert_eq!(
            fw.get(PREVIOUS_BOOT, VarVendor::Manager),
            Some(encode_previous_boot("Windows").as_slice())
        );
    }
}
