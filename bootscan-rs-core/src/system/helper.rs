// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Various helper functions for other modules.
//!
//! Paths handled by the scanner are plain [`String`]s using backslashes, relative to the root of a volume
//! (`EFI\ubuntu\grubx64.efi`). Paths of menu entries are absolute (`\EFI\ubuntu\grubx64.efi`). The helpers here
//! convert between the two and do the case-insensitive comparisons FAT filesystems expect.

use core::mem::MaybeUninit;

use alloc::{
    borrow::ToOwned,
    string::{String, ToString},
};
use smallvec::SmallVec;
use thiserror::Error;
use uefi::{
    CStr16, CString16, Event, Handle, boot,
    data_types::PoolString,
    proto::{
        ProtocolPointer,
        device_path::{
            DevicePath, PoolDevicePath, build,
            text::{AllowShortcuts, DevicePathToText, DisplayOnly},
        },
    },
};

use crate::BootResult;

/// The max length of a path in UEFI.
const MAX_PATH: usize = 256;

/// An `Error` that may result from converting a [`String`] to another format.
#[derive(Error, Debug)]
pub enum StrError {
    /// A [`String`] could not be converted into a [`CString16`]
    #[error("Could not convert String to CString16")]
    CstrFromStr(#[from] uefi::data_types::FromStrError),

    /// A UCS-2 buffer did not form a valid [`CStr16`].
    #[error("Could not convert a UCS-2 buffer to a CStr16")]
    FromSliceWithNul(#[from] uefi::data_types::FromSliceWithNulError),
}

/// An `Error` that may result from building a [`DevicePath`]
#[derive(Error, Debug)]
pub enum DevicePathError {
    /// A Device Path could not be built. This can if the buffer was too small.
    #[error("Could not build DevicePath")]
    Build(#[from] uefi::proto::device_path::build::BuildError),

    /// The Device Path could not be appended to an existing one for some reason.
    #[error("Could not append DevicePath to another DevicePath")]
    DevPathUtil(#[from] uefi::proto::device_path::DevicePathUtilitiesError),
}

/// The firmware architectures a loader can be built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arch {
    /// 32-bit x86.
    Ia32,

    /// 64-bit x86.
    X64,

    /// 64-bit ARM.
    Aa64,
}

impl Default for Arch {
    fn default() -> Self {
        Self::current()
    }
}

impl Arch {
    /// The architecture this binary was built for.
    ///
    /// Hosts that are not a UEFI target (unit tests on other machines) are treated as [`Arch::X64`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn current() -> Self {
        if cfg!(target_arch = "x86") {
            Self::Ia32
        } else if cfg!(target_arch = "aarch64") {
            Self::Aa64
        } else {
            Self::X64
        }
    }

    /// The PE/COFF machine type of the architecture.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn machine(self) -> u16 {
        match self {
            Self::Ia32 => 0x014c,
            Self::X64 => 0x8664,
            Self::Aa64 => 0xaa64,
        }
    }

    /// The suffix used in standard file names, like `x64` in `bootx64.efi`.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Ia32 => "ia32",
            Self::X64 => "x64",
            Self::Aa64 => "aa64",
        }
    }

    /// The file name of the removable media fallback loader.
    #[must_use = "Has no effect if the result is unused"]
    pub fn fallback_name(self) -> String {
        alloc::format!("boot{}.efi", self.suffix())
    }

    /// The volume relative path of the removable media fallback loader.
    #[must_use = "Has no effect if the result is unused"]
    pub fn fallback_path(self) -> String {
        alloc::format!("EFI\\BOOT\\boot{}.efi", self.suffix())
    }
}

/// Gets a [`CString16`] from an [`&str`].
///
/// # Errors
///
/// May return an `Error` if the string could not be converted into a [`CString16`], either due to unsupported
/// characters or an invalid nul character.
pub(crate) fn str_to_cstr(str: &str) -> Result<CString16, StrError> {
    Ok(CString16::try_from(str)?)
}

/// Gets a [`CString16`] path given a directory and a filename.
///
/// The root directory is given as an empty prefix.
///
/// # Errors
///
/// May return an `Error` if the finalized string could not be converted into a [`CString16`].
pub(crate) fn get_path_cstr(prefix: &CStr16, filename: &CStr16) -> Result<CString16, StrError> {
    let mut path_buf: SmallVec<[_; MAX_PATH]> =
        SmallVec::with_capacity(prefix.as_slice().len() + 1 + filename.as_slice().len());

    path_buf.push(u16::from(b'\\'));
    path_buf.extend(
        prefix
            .to_u16_slice()
            .iter()
            .copied()
            .skip_while(|c| *c == u16::from(b'\\')),
    );
    if path_buf.len() > 1 {
        path_buf.push(u16::from(b'\\'));
    }
    path_buf.extend_from_slice(filename.to_u16_slice_with_nul());

    Ok(CStr16::from_u16_with_nul(&path_buf)?.into())
}

/// Gets the joined [`DevicePath`] given an existing [`DevicePath`] (likely to a partition) and a file's path.
///
/// The provided mutable buffer must be large enough to fit the final [`DevicePath`].
///
/// # Errors
///
/// May return an `Error` if the device path is finalized before the file's [`DevicePath`] could be pushed.
pub(crate) fn join_to_device_path(
    dev_path: &DevicePath,
    path: &CStr16,
    buf: &mut [u8],
) -> Result<PoolDevicePath, DevicePathError> {
    let buf = slice_to_maybe_uninit(buf);
    let path: &DevicePath = build::DevicePathBuilder::with_buf(buf)
        .push(&build::media::FilePath { path_name: path })?
        .finalize()?;
    Ok(dev_path.append_path(path)?)
}

/// Converts a [`DevicePath`] into a text representation.
///
/// # Errors
///
/// May return an `Error` if the system does not support [`DevicePathToText`], or there is not enough memory.
pub(crate) fn device_path_to_text(device_path: &DevicePath) -> BootResult<PoolString> {
    let device_path_to_text = locate_protocol::<DevicePathToText>()?;
    Ok(device_path_to_text.convert_device_path_to_text(
        device_path,
        DisplayOnly(true),
        AllowShortcuts(false),
    )?)
}

/// Converts a byte slice into an `&mut [MaybeUninit<u8>]`.
pub(crate) fn slice_to_maybe_uninit(slice: &mut [u8]) -> &mut [MaybeUninit<u8>] {
    // SAFETY: this is essentially equivalent to reconstructing an &mut [MaybeUninit<u8>] from a mutable slice.
    // because slices are always valid as pointers, and the length of the two slices are the same, this is safe.
    unsafe {
        core::slice::from_raw_parts_mut(slice.as_mut_ptr().cast::<MaybeUninit<u8>>(), slice.len())
    }
}

/// Opens the first handle supporting a protocol exclusively.
///
/// # Errors
///
/// May return an `Error` if no handle supports the protocol, or the protocol could not be opened.
pub fn locate_protocol<P: ProtocolPointer + ?Sized>() -> BootResult<boot::ScopedProtocol<P>> {
    let handle = boot::get_handle_for_protocol::<P>()?;
    Ok(boot::open_protocol_exclusive::<P>(handle)?)
}

/// Opens a protocol on a handle without taking exclusive ownership of it.
///
/// Drivers that already use the protocol stay connected, so this is used for protocols that are only read from.
///
/// # Errors
///
/// May return an `Error` if the handle does not support the protocol.
pub fn get_protocol<P: ProtocolPointer + ?Sized>(handle: Handle) -> BootResult<boot::ScopedProtocol<P>> {
    let params = boot::OpenProtocolParams {
        handle,
        agent: boot::image_handle(),
        controller: None,
    };
    // SAFETY: callers only read from the protocol, so sharing it with the drivers that have it open is sound.
    Ok(unsafe { boot::open_protocol::<P>(params, boot::OpenProtocolAttributes::GetProtocol)? })
}

/// Creates a timer event with the given trigger.
///
/// # Errors
///
/// May return an `Error` if the event could not be created or the timer could not be armed.
pub fn create_timer(trigger: boot::TimerTrigger) -> BootResult<Event> {
    // SAFETY: the event has no notify function, so there is no callback that could be invoked with a dangling context.
    let event = unsafe { boot::create_event(boot::EventType::TIMER, boot::Tpl::CALLBACK, None, None)? };
    boot::set_timer(&event, trigger)?;
    Ok(event)
}

/// Cleans up a volume relative path.
///
/// Forward slashes become backslashes, repeated separators are collapsed, and leading and trailing separators
/// are removed. The root directory is the empty string.
#[must_use = "Has no effect if the result is unused"]
pub fn clean_path(path: &str) -> String {
    path.split(['\\', '/'])
        .filter(|part| !part.is_empty())
        .collect::<SmallVec<[&str; 8]>>()
        .join("\\")
}

/// Converts a path into the absolute form used by menu entries (`\EFI\foo\bar.efi`).
#[must_use = "Has no effect if the result is unused"]
pub fn absolute_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('\\');
    out.push_str(&clean_path(path));
    out
}

/// Joins a directory and a file name into a volume relative path.
#[must_use = "Has no effect if the result is unused"]
pub fn join_path(dir: &str, name: &str) -> String {
    let dir = clean_path(dir);
    if dir.is_empty() {
        clean_path(name)
    } else {
        clean_path(&alloc::format!("{dir}\\{name}"))
    }
}

/// Returns the final component of a path.
#[must_use = "Has no effect if the result is unused"]
pub fn basename(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// Returns the volume relative directory containing a path. The root directory is the empty string.
#[must_use = "Has no effect if the result is unused"]
pub fn dirname(path: &str) -> String {
    let path = clean_path(path);
    path.rsplit_once('\\')
        .map_or_else(String::new, |(dir, _)| dir.to_owned())
}

/// Returns the name of the directory containing a file, or [`None`] for files in the root directory.
#[must_use = "Has no effect if the result is unused"]
pub fn last_dir_name(path: &str) -> Option<String> {
    let dir = dirname(path);
    (!dir.is_empty()).then(|| basename(&dir).to_owned())
}

/// Splits an optional `volume:` qualifier off the front of a path.
///
/// Returns the volume name (if any) and the remaining path.
#[must_use = "Has no effect if the result is unused"]
pub fn split_volume(spec: &str) -> (Option<&str>, &str) {
    match spec.split_once(':') {
        Some((volume, path)) if !volume.is_empty() => (Some(volume), path),
        Some((_, path)) => (None, path),
        None => (None, spec),
    }
}

/// Splits a `[volume:][path\]file` specification into its three parts.
///
/// The path part is cleaned; it is [`None`] when the specification holds only a file name.
#[must_use = "Has no effect if the result is unused"]
pub fn split_file_spec(spec: &str) -> (Option<&str>, Option<String>, &str) {
    let (volume, path) = split_volume(spec);
    let file = basename(path);
    let dir = &path[..path.len() - file.len()];
    let dir = clean_path(dir);
    let dir = (!dir.is_empty() || path.starts_with(['\\', '/'])).then_some(dir);
    (volume, dir, file)
}

/// Case-insensitive ASCII comparison of two strings.
#[must_use = "Has no effect if the result is unused"]
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Case-insensitive ASCII substring search.
#[must_use = "Has no effect if the result is unused"]
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    find_ignore_case(haystack, needle).is_some()
}

/// Returns the byte index of the first case-insensitive occurrence of `needle` in `haystack`.
#[must_use = "Has no effect if the result is unused"]
pub fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    let (hay, pat) = (haystack.as_bytes(), needle.as_bytes());
    (0..=hay.len().checked_sub(pat.len())?).find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}

/// Case-insensitive glob match supporting `*` and `?`.
#[must_use = "Has no effect if the result is unused"]
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let (pattern, name) = (pattern.as_bytes(), name.as_bytes());
    let (mut p, mut n) = (0, 0);
    let mut backtrack = None;

    while n < name.len() {
        match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(c) if *c == b'?' || c.eq_ignore_ascii_case(&name[n]) => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    n = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == b'*')
}

/// Checks if a file name is a GUID, like `12345678-9abc-def0-1234-56789abcdef0`.
#[must_use = "Has no effect if the result is unused"]
pub fn is_guid(name: &str) -> bool {
    name.len() == 36
        && name.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

/// Splits a string into words on whitespace, dashes and underscores.
pub fn words(str: &str) -> impl Iterator<Item = String> + '_ {
    str.split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .map(ToString::to_string)
}
