// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Security hooks that attach to their respective protocols.
//!
//! Both hooks follow the same steps:
//! 1. Turn the raw pointers passed to them into an [`Option<&DevicePath>`] and an `Option<&mut [u8]>`.
//! 2. Ask shim to verify the image.
//! 3. If shim refuses it, pass the raw pointers on to the original handler, whose verdict is final.
//!
//! # Safety
//!
//! Calling the original handlers and rebuilding the file buffer from a pointer and a length need `unsafe`. Both rely on
//! the firmware passing valid arguments to the hooks, which `LoadImage` does. Pointers are still checked for null
//! and alignment before use.

use core::ffi::c_void;

use log::warn;
use uefi::{
    Status, boot,
    proto::device_path::{DevicePath, FfiDevicePath},
};

use crate::{
    boot::secure_boot::{InstalledHooks, SecureBootError, installed_hooks, shim},
    system::protos::{
        AuthState, Authentication, Security2Arch, Security2ArchProtocol, SecurityArch, SecurityArchProtocol,
    },
};

/// Replaces the handlers of whichever security protocols are published.
///
/// # Errors
///
/// May return an `Error` if neither protocol is published.
pub(super) fn install() -> Result<InstalledHooks, SecureBootError> {
    let security = boot::get_handle_for_protocol::<SecurityArch>()
        .ok()
        .and_then(|handle| {
            let mut security = boot::open_protocol_exclusive::<SecurityArch>(handle).ok()?;
            let original = security.get_inner().auth_state;
            security.get_inner_mut().auth_state = auth_state_hook;
            Some((handle, original))
        });

    let security2 = boot::get_handle_for_protocol::<Security2Arch>()
        .ok()
        .and_then(|handle| {
            let mut security = boot::open_protocol_exclusive::<Security2Arch>(handle).ok()?;
            let original = security.get_inner().authentication;
            security.get_inner_mut().authentication = authentication_hook;
            Some((handle, original))
        });

    if security.is_none() && security2.is_none() {
        return Err(SecureBootError::ProtocolGone);
    }
    Ok(InstalledHooks { security, security2 })
}

/// Puts the original handlers back.
///
/// Nothing is restored unless every hooked protocol is still there with our hook in place.
///
/// # Errors
///
/// May return an `Error` if a hooked protocol is gone or its handler was replaced.
pub(super) fn uninstall(hooks: InstalledHooks) -> Result<(), SecureBootError> {
    let mut security = match hooks.security {
        Some((handle, original)) => {
            let protocol =
                boot::open_protocol_exclusive::<SecurityArch>(handle).map_err(|_| SecureBootError::ProtocolGone)?;
            if !core::ptr::fn_addr_eq(protocol.get_inner().auth_state, auth_state_hook as AuthState) {
                return Err(SecureBootError::HandlerReplaced);
            }
            Some((protocol, original))
        }
        None => None,
    };

    let mut security2 = match hooks.security2 {
        Some((handle, original)) => {
            let protocol =
                boot::open_protocol_exclusive::<Security2Arch>(handle).map_err(|_| SecureBootError::ProtocolGone)?;
            if !core::ptr::fn_addr_eq(protocol.get_inner().authentication, authentication_hook as Authentication) {
                return Err(SecureBootError::HandlerReplaced);
            }
            Some((protocol, original))
        }
        None => None,
    };

    if let Some((protocol, original)) = &mut security {
        protocol.get_inner_mut().auth_state = *original;
    }
    if let Some((protocol, original)) = &mut security2 {
        protocol.get_inner_mut().authentication = *original;
    }
    Ok(())
}

/// The hook for [`SecurityArchProtocol`].
///
/// # Safety
///
/// The caller must pass valid pointers, as `LoadImage` does.
unsafe extern "efiapi" fn auth_state_hook(
    this: *const SecurityArchProtocol,
    auth_status: u32,
    file: *const FfiDevicePath,
) -> Status {
    match shim::validate(ffi_ptr_to_device_path(file), None) {
        Ok(()) => Status::SUCCESS,
        Err(e) => {
            warn!("{e}");
            match installed_hooks().and_then(|hooks| hooks.security) {
                // SAFETY: the arguments are the ones the firmware passed to this hook
                Some((_, original)) => unsafe { original(this, auth_status, file) },
                None => Status::SECURITY_VIOLATION,
            }
        }
    }
}

/// The hook for [`Security2ArchProtocol`].
///
/// # Safety
///
/// The caller must pass valid pointers, and `file_size` must be the length of `file_buffer`. `LoadImage` does both.
unsafe extern "efiapi" fn authentication_hook(
    this: *const Security2ArchProtocol,
    device_path: *const FfiDevicePath,
    file_buffer: *mut c_void,
    file_size: usize,
    boot_policy: u8,
) -> Status {
    // SAFETY: the firmware passes the exact size of the buffer
    let slice = unsafe { mut_ptr_to_u8_slice(file_buffer, file_size) };

    match shim::validate(ffi_ptr_to_device_path(device_path), slice) {
        Ok(()) => Status::SUCCESS,
        Err(e) => {
            warn!("{e}");
            match installed_hooks().and_then(|hooks| hooks.security2) {
                // SAFETY: the arguments are the ones the firmware passed to this hook
                Some((_, original)) => unsafe { original(this, device_path, file_buffer, file_size, boot_policy) },
                None => Status::SECURITY_VIOLATION,
            }
        }
    }
}

/// Convert a mutable raw [`c_void`] to a mutable byte slice.
///
/// Returns [`None`] for a null or misaligned pointer. The size still cannot be verified.
unsafe fn mut_ptr_to_u8_slice<'a>(ptr: *mut c_void, size: usize) -> Option<&'a mut [u8]> {
    // SAFETY: the pointer is checked, the caller guarantees the size
    (!ptr.is_null() && ptr.is_aligned()).then(|| unsafe { core::slice::from_raw_parts_mut(ptr.cast::<u8>(), size) })
}

/// Convert an [`FfiDevicePath`] to a [`DevicePath`], or [`None`] for a null or misaligned pointer.
fn ffi_ptr_to_device_path<'a>(ptr: *const FfiDevicePath) -> Option<&'a DevicePath> {
    // SAFETY: the pointer is checked for null and alignment first
    (!ptr.is_null() && ptr.is_aligned()).then(|| unsafe { DevicePath::from_ffi_ptr(ptr) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_pointers() {
        assert!(ffi_ptr_to_device_path(core::ptr::null()).is_none());
        // SAFETY: a null pointer is never dereferenced
        assert!(unsafe { mut_ptr_to_u8_slice(core::ptr::null_mut(), 16) }.is_none());
    }
}
