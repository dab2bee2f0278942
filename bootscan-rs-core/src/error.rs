// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`BootError`], which encapsulates other errors

use thiserror::Error;

/// An `Error` resulting from the program.
#[derive(Error, Debug)]
pub enum BootError {
    /// An error with UEFI, or a service from the [`uefi`] crate.
    #[error("UEFI Error")]
    Uefi(#[from] uefi::Error),

    /// A `String` could not be converted into a `CString`
    #[error("String Conversion Error")]
    StrError(#[from] crate::system::helper::StrError),

    /// An error occurred while performing filesystem operations.
    #[error("Filesystem Error")]
    FsError(#[from] crate::system::fs::FsError),

    /// An error occurred while installing or removing the Secure Boot hooks.
    #[error("Secure Boot Error")]
    SecureBootError(#[from] crate::boot::secure_boot::SecureBootError),

    /// An error occurred while building a `DevicePath`.
    #[error("DevicePath Error")]
    DevicePathError(#[from] crate::system::helper::DevicePathError),

    /// An error occurred while starting an image.
    #[error("Launch Error")]
    LaunchError(#[from] crate::boot::launch::LaunchError),

    /// The configuration file could not be read.
    #[error("Config Error")]
    ConfigError(#[from] crate::config::ConfigError),
}
