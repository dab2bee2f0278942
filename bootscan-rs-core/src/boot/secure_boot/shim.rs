// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Shim integration into Secure Boot.
//!
//! Shim v16+ publishes [`ShimImageLoader`] after hooking `LoadImage` itself, in which case there is nothing to do.
//! Older versions only offer [`ShimLock`], which the security hooks call to verify an image.

use alloc::string::ToString;

use uefi::{
    boot::{self, ScopedProtocol},
    cstr16,
    proto::{device_path::DevicePath, media::fs::SimpleFileSystem, shim::ShimLock},
};

use crate::{
    BootResult,
    boot::secure_boot::SecureBootError,
    system::{
        fs::{UefiFileSystem, VolumeFs},
        helper::{device_path_to_text, get_protocol, locate_protocol},
        protos::ShimImageLoader,
        variable::{VarVendor, get_variable, set_variable},
    },
};

/// Checks an image using [`ShimLock`] when only its [`DevicePath`] is known.
///
/// # Errors
///
/// May return an `Error` if the device path does not lead to a handle supporting [`SimpleFileSystem`],
/// or the system does not support `DevicePathToText`, or the file does not exist in the filesystem.
fn validate_from_device_path(mut device_path: &DevicePath, shim: &ScopedProtocol<ShimLock>) -> BootResult<()> {
    let handle = boot::locate_device_path::<SimpleFileSystem>(&mut device_path)?;
    // the volume may already be open in the volume table, so it is not opened exclusively
    let mut fs = UefiFileSystem::new(get_protocol::<SimpleFileSystem>(handle)?);

    let path = device_path_to_text(device_path)?.to_string();
    let file_buffer = fs.read(&path)?;

    Ok(shim.verify(&file_buffer)?)
}

/// Checks for the presence of [`ShimLock`].
#[must_use = "Has no effect if the result is unused"]
pub fn shim_loaded() -> bool {
    boot::get_handle_for_protocol::<ShimLock>().is_ok()
}

/// Checks if shim verifies images loaded through `LoadImage` by itself, which only v16+ does.
#[must_use = "Has no effect if the result is unused"]
pub fn shim_is_recent() -> bool {
    boot::get_handle_for_protocol::<ShimImageLoader>().is_ok()
}

/// Verifies an image with shim, from its file buffer if there is one, or otherwise its device path.
///
/// # Errors
///
/// May return an `Error` if shim is gone, shim refuses the image, or neither a buffer nor a path were passed.
pub(super) fn validate(device_path: Option<&DevicePath>, file_buffer: Option<&mut [u8]>) -> BootResult<()> {
    let shim = locate_protocol::<ShimLock>()?;

    if let Some(file_buffer) = file_buffer {
        return Ok(shim.verify(file_buffer)?);
    }

    if let Some(device_path) = device_path {
        return validate_from_device_path(device_path, &shim);
    }

    Err(SecureBootError::NoDevicePathOrFile.into())
}

/// Asks shim to keep its protocol around after the boot manager is verified, so later images can be verified too.
///
/// # Errors
///
/// May return an `Error` if the variable could not be written.
pub(super) fn shim_retain_protocol() -> BootResult<()> {
    if !matches!(
        get_variable::<bool>(cstr16!("ShimRetainProtocol"), VarVendor::Shim),
        Ok(true)
    ) {
        set_variable::<bool>(cstr16!("ShimRetainProtocol"), VarVendor::Shim, true)?;
    }
    Ok(())
}
