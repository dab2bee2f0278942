// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Secure Boot support module.
//!
//! With Secure Boot enabled, `LoadImage` asks the `SecurityArch` and `Security2Arch` protocols whether an image may
//! be loaded. Shim before v16 does not hook image loading itself, so images signed with a key only shim knows about
//! (a distribution key, or one enrolled in the MOK list) are refused by the firmware.
//!
//! The security extension fixes that. It replaces the handlers of both protocols with [`hooks`] that accept an image
//! when shim's verifier accepts it and otherwise defer to the firmware's own handler. It is installed once at startup
//! and stays installed for as long as the boot manager runs, since every launched loader may load further images.
//! It has to be removed before the boot manager exits, or the firmware would keep calling into unloaded code.

use core::cell::Cell;

use log::{info, warn};
use thiserror::Error;
use uefi::{Handle, cstr16};

use crate::system::{
    protos::{AuthState, Authentication},
    variable::{VarVendor, get_variable},
};

pub mod hooks;
pub mod shim;

/// An `Error` that may result from the security extension.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SecureBootError {
    /// The security extension was already installed.
    #[error("Security extension already installed")]
    AlreadyInstalled,

    /// The security extension is not installed.
    #[error("Security extension is not installed")]
    NotInstalled,

    /// A security protocol that was hooked is no longer published.
    #[error("Security protocol is gone")]
    ProtocolGone,

    /// Something else replaced one of the hooks after it was installed.
    #[error("Security handler was replaced")]
    HandlerReplaced,

    /// Neither a device path nor a file buffer were passed to a hook.
    #[error("DevicePath and file buffer were both None")]
    NoDevicePathOrFile,
}

/// The handlers that were replaced, with the handles of their protocols.
#[derive(Clone, Copy)]
pub(crate) struct InstalledHooks {
    /// The [`crate::system::protos::SecurityArch`] handle and its original handler.
    pub security: Option<(Handle, AuthState)>,

    /// The [`crate::system::protos::Security2Arch`] handle and its original handler.
    pub security2: Option<(Handle, Authentication)>,
}

/// Where the hooks find the handlers they defer to.
///
/// The signatures of the hooks are fixed by the firmware, so they cannot be handed any context.
struct SecurityExtension(Cell<Option<InstalledHooks>>);

// SAFETY: uefi is a single threaded environment, there is no notion of thread safety
unsafe impl Sync for SecurityExtension {}

/// The installed security extension, if any.
static SECURITY_EXTENSION: SecurityExtension = SecurityExtension(Cell::new(None));

/// The original handlers, if the extension is installed.
pub(crate) fn installed_hooks() -> Option<InstalledHooks> {
    SECURITY_EXTENSION.0.get()
}

/// Tests if Secure Boot is enabled through a UEFI variable.
#[must_use = "Has no effect if the result is unused"]
pub fn secure_boot_enabled() -> bool {
    matches!(get_variable::<u8>(cstr16!("SecureBoot"), VarVendor::Global), Ok(1))
}

/// Decides if the security extension is needed.
///
/// It is only needed with Secure Boot enabled and a shim that does not verify images loaded through `LoadImage` by
/// itself.
#[must_use = "Has no effect if the result is unused"]
pub const fn extension_needed(secure_boot: bool, shim: bool, shim_is_recent: bool) -> bool {
    secure_boot && shim && !shim_is_recent
}

/// Installs the security extension if it is needed.
///
/// Returns `true` if it was installed.
///
/// # Errors
///
/// May return an `Error` if the extension was already installed, or neither security protocol is published.
pub fn install_security_extension() -> Result<bool, SecureBootError> {
    if !extension_needed(secure_boot_enabled(), shim::shim_loaded(), shim::shim_is_recent()) {
        return Ok(false);
    }
    if installed_hooks().is_some() {
        return Err(SecureBootError::AlreadyInstalled);
    }

    if let Err(e) = shim::shim_retain_protocol() {
        warn!("Could not ask shim to retain its protocol: {e}");
    }

    let hooks = hooks::install()?;
    SECURITY_EXTENSION.0.set(Some(hooks));
    info!("Installed the shim security extension");
    Ok(true)
}

/// Removes the security extension, restoring the original handlers.
///
/// # Errors
///
/// May return an `Error` if the extension is not installed, a hooked protocol is gone, or a hooked handler is no
/// longer ours. The extension is considered installed after an error.
pub fn uninstall_security_extension() -> Result<(), SecureBootError> {
    let hooks = installed_hooks().ok_or(SecureBootError::NotInstalled)?;
    hooks::uninstall(hooks)?;
    SECURITY_EXTENSION.0.set(None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_needed() {
        assert!(extension_needed(true, true, false));
        assert!(!extension_needed(false, true, false));
        assert!(!extension_needed(true, false, false));
        assert!(!extension_needed(true, true, true));
    }

    #[test]
    fn test_uninstall_without_install() {
        assert_eq!(uninstall_security_extension(), Err(SecureBootError::NotInstalled));
    }
}
