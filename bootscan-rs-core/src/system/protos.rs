// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! UEFI protocols that are not implemented in the [`uefi`] crate.
//!
//! This exposes the following protocols:
//! - [`SecurityArch`]
//! - [`Security2Arch`]
//! - [`ShimImageLoader`], only to detect whether shim already verifies images loaded through `LoadImage` itself.

use core::ffi::c_void;

use uefi::{
    Status, guid,
    proto::{device_path::FfiDevicePath, unsafe_protocol},
};

/// A "boolean" that is actually a [`u8`]. Used for FFI interop.
type Bool = u8;

/// The type of the [`SecurityArchProtocol`] `auth_state` function.
pub type AuthState =
    unsafe extern "efiapi" fn(this: *const SecurityArchProtocol, auth_status: u32, file: *const FfiDevicePath) -> Status;

/// The type of the [`Security2ArchProtocol`] `authentication` function.
pub type Authentication = unsafe extern "efiapi" fn(
    this: *const Security2ArchProtocol,
    device_path: *const FfiDevicePath,
    file_buffer: *mut c_void,
    file_size: usize,
    boot_policy: Bool,
) -> Status;

/// The raw Security Arch protocol.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct SecurityArchProtocol {
    /// Check the authentication status of a file using the `auth_status` parameter.
    pub auth_state: AuthState,
}

impl SecurityArchProtocol {
    /// The GUID of the protocol.
    const GUID: uefi::Guid = guid!("a46423e3-4617-49f1-b9ff-d1bfa9115839");
}

/// Security Arch Protocol.
///
/// When Secure Boot is enabled, `LoadImage` asks this protocol whether an image may be loaded according to platform
/// security policy.
#[derive(Clone, Copy, Debug)]
#[repr(transparent)]
#[unsafe_protocol(SecurityArchProtocol::GUID)]
pub struct SecurityArch(SecurityArchProtocol);

impl SecurityArch {
    /// Get a shared reference to the inner raw [`SecurityArchProtocol`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn get_inner(&self) -> &SecurityArchProtocol {
        &self.0
    }

    /// Get a mutable reference to the inner raw [`SecurityArchProtocol`].
    pub const fn get_inner_mut(&mut self) -> &mut SecurityArchProtocol {
        &mut self.0
    }
}

/// The raw Security2 Arch protocol.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct Security2ArchProtocol {
    /// Check the authentication status of a file from either a device path or a file buffer.
    pub authentication: Authentication,
}

impl Security2ArchProtocol {
    /// The GUID of the protocol.
    const GUID: uefi::Guid = guid!("94ab2f58-1438-4ef1-9152-18941a3a0e68");
}

/// Security2 Arch Protocol.
///
/// The newer of the two security protocols. If both are published, `LoadImage` consults this one first.
#[derive(Clone, Copy, Debug)]
#[repr(transparent)]
#[unsafe_protocol(Security2ArchProtocol::GUID)]
pub struct Security2Arch(Security2ArchProtocol);

impl Security2Arch {
    /// Get a shared reference to the inner raw [`Security2ArchProtocol`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn get_inner(&self) -> &Security2ArchProtocol {
        &self.0
    }

    /// Get a mutable reference to the inner raw [`Security2ArchProtocol`].
    pub const fn get_inner_mut(&mut self) -> &mut Security2ArchProtocol {
        &mut self.0
    }
}

/// The raw Shim Image Loader protocol. None of its functions are called, so they are left opaque.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct ShimImageLoaderProtocol {
    /// `LoadImage` replacement.
    load_image: *const c_void,

    /// `StartImage` replacement.
    start_image: *const c_void,

    /// `Exit` replacement.
    exit: *const c_void,

    /// `UnloadImage` replacement.
    unload_image: *const c_void,
}

impl ShimImageLoaderProtocol {
    /// The GUID of the protocol.
    const GUID: uefi::Guid = guid!("1f492041-fadb-4e59-9e57-7cafe73a55ab");
}

/// Shim Image Loader protocol.
///
/// Shim v16+ publishes this after hooking `LoadImage` and friends, so its presence means shim verifies images on its own.
#[derive(Clone, Copy, Debug)]
#[repr(transparent)]
#[unsafe_protocol(ShimImageLoaderProtocol::GUID)]
pub struct ShimImageLoader(ShimImageLoaderProtocol);
