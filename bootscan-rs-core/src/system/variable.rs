// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! UEFI variable storage helpers.
//!
//! Variables live in one of three vendor namespaces: the global EFI namespace (`OsIndications`, `SecureBoot`), the
//! boot manager's own namespace (`PreviousBoot` and the hidden tag lists), and Apple's boot namespace
//! (`csr-active-config`).

use alloc::{boxed::Box, vec::Vec};
use uefi::{
    CStr16, Identify, Status, guid,
    proto::shim::ShimLock,
    runtime::{self, VariableAttributes, VariableVendor},
};

use crate::{BootResult, error::BootError};

/// The custom variable namespace for the boot manager.
const MANAGER_GUID: uefi::Guid = guid!("5f3c9b1e-8a47-4d2c-b6e1-0c7d92a4f318");

/// The namespace Apple firmware keeps its boot variables in.
const APPLE_BOOT_GUID: uefi::Guid = guid!("7c436110-ab2a-4bbb-a880-fe41995c9f82");

/// The vendor namespace of a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VarVendor {
    /// The global EFI namespace.
    Global,

    /// The namespace of the boot manager, `5f3c9b1e-8a47-4d2c-b6e1-0c7d92a4f318`.
    Manager,

    /// Apple's boot namespace.
    Apple,

    /// The namespace of shim, which is the GUID of [`ShimLock`].
    Shim,
}

impl VarVendor {
    /// The [`VariableVendor`] of the namespace.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn vendor(self) -> VariableVendor {
        match self {
            Self::Global => VariableVendor::GLOBAL_VARIABLE,
            Self::Manager => VariableVendor(MANAGER_GUID),
            Self::Apple => VariableVendor(APPLE_BOOT_GUID),
            Self::Shim => VariableVendor(ShimLock::GUID),
        }
    }
}

/// A value that can be stored in a UEFI variable.
///
/// This is essentially a type that can be converted into and from a vector of bytes. Integers are stored little
/// endian; a value shorter than the type is padded with zeroes, and extra bytes are ignored.
pub trait UefiVariable: Sized {
    /// Convert `Self` to a vector of bytes.
    fn to_bytes(self) -> Vec<u8>;

    /// Convert a byte slice to `Self`.
    fn from_bytes(bytes: &[u8]) -> Self;
}

/// Implements [`UefiVariable`] for little endian integers.
macro_rules! int_variable {
    ($($ty:ty),*) => {
        $(
            impl UefiVariable for $ty {
                fn to_bytes(self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }

                fn from_bytes(bytes: &[u8]) -> Self {
                    let mut array = [0; size_of::<Self>()];
                    let len = bytes.len().min(array.len());
                    array[..len].copy_from_slice(&bytes[..len]);
                    Self::from_le_bytes(array)
                }
            }
        )*
    };
}

int_variable!(u8, u16, u32, u64);

impl UefiVariable for bool {
    fn to_bytes(self) -> Vec<u8> {
        alloc::vec![u8::from(self)]
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        bytes.first().is_some_and(|x| *x > 0)
    }
}

/// The attributes every variable written by the boot manager gets.
const fn default_attributes() -> VariableAttributes {
    VariableAttributes::NON_VOLATILE
        .union(VariableAttributes::BOOTSERVICE_ACCESS)
        .union(VariableAttributes::RUNTIME_ACCESS)
}

/// Gets the raw content of a variable.
///
/// Returns [`None`] if the variable does not exist.
///
/// # Errors
///
/// May return an `Error` for many reasons, see [`runtime::get_variable_boxed`]
pub fn get_raw(name: &CStr16, vendor: VarVendor) -> BootResult<Option<Box<[u8]>>> {
    match runtime::get_variable_boxed(name, &vendor.vendor()) {
        Ok((data, _)) => Ok(Some(data)),
        Err(e) if e.status() == Status::NOT_FOUND => Ok(None),
        Err(e) => Err(BootError::Uefi(e.to_err_without_payload())),
    }
}

/// Sets the raw content of a variable, creating it if it does not exist.
///
/// # Errors
///
/// May return an `Error` for many reasons, see [`runtime::set_variable`]
pub fn set_raw(name: &CStr16, vendor: VarVendor, data: &[u8]) -> BootResult<()> {
    Ok(runtime::set_variable(
        name,
        &vendor.vendor(),
        default_attributes(),
        data,
    )?)
}

/// Gets a UEFI variable of a [`UefiVariable`] given the name.
///
/// If the variable was not found, the value decoded from no bytes (zero) will be returned. This is more convenient to
/// handle internally as its easier to not handle specially the case of the variable not being found.
///
/// # Errors
///
/// May return an `Error` for many reasons, see [`runtime::get_variable_boxed`]
pub fn get_variable<T: UefiVariable>(name: &CStr16, vendor: VarVendor) -> BootResult<T> {
    let data = get_raw(name, vendor)?;
    Ok(T::from_bytes(data.as_deref().unwrap_or_default()))
}

/// Sets a UEFI variable to a [`UefiVariable`] given the name.
///
/// # Errors
///
/// May return an `Error` for many reasons, see [`runtime::set_variable`]
pub fn set_variable<T: UefiVariable>(name: &CStr16, vendor: VarVendor, value: T) -> BootResult<()> {
    set_raw(name, vendor, &value.to_bytes())
}
