// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Filesystem helper functions for other modules.
//!
//! The scanner only ever needs read access to a volume, so the interface it consumes is the small [`VolumeFs`]
//! trait. [`UefiFileSystem`] implements it on top of the UEFI [`SimpleFileSystem`] protocol, and the unit tests
//! implement it in memory.
//!
//! These filesystem helpers are guaranteed to support FAT filesystems. This is mandated by the UEFI specification.
//! Other filesystems work as long as the firmware has a driver producing [`SimpleFileSystem`] for them, like
//! those found in [efifs](https://efi.akeo.ie).
//!
//! Every [`File`] handle opened here is an owned value that is closed when it is dropped, so no handle outlives
//! the call that opened it, even on error paths.
//!
//! Paths given to [`VolumeFs`] are relative to the root of the volume and use backslashes (`EFI\BOOT`). The empty
//! string is the root directory.

use alloc::{borrow::ToOwned, string::String, vec, vec::Vec};
use thiserror::Error;
use uefi::{
    CString16, Handle, Status,
    boot::{self, ScopedProtocol},
    fs::{COMMON_SKIP_DIRS, UefiDirectoryIter},
    proto::media::{
        file::{Directory, File, FileAttribute, FileInfo, FileMode, FileSystemVolumeLabel, RegularFile},
        fs::SimpleFileSystem,
    },
};

use crate::{
    BootResult,
    system::{
        helper::{StrError, absolute_path, str_to_cstr},
        time::Timestamp,
    },
};

#[cfg(test)]
pub mod mem;

/// The size of one gigabyte in bytes. This is the default value if a file is too big to be read.
///
/// This is also a reasonable maximum size for files that may be read.
pub(crate) const ONE_GIGABYTE: usize = 1024 * 1024 * 1024;

/// An error that may result from performing filesystem operations
#[derive(Error, Debug)]
pub enum FsError {
    /// A file or directory could not be opened.
    #[error("Failed to open file: {0}")]
    OpenErr(Status),

    /// A file could not be read.
    #[error("Failed to read file: {0}")]
    ReadErr(Status),

    /// Failed to get a volume label on a partition.
    #[error("Could not get volume label of a partition")]
    VolumeLabelErr,

    /// The path could not be converted into a UEFI path.
    #[error("Invalid path")]
    Path(#[from] StrError),
}

impl FsError {
    /// The firmware status behind the error.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn status(&self) -> Status {
        match self {
            Self::OpenErr(status) | Self::ReadErr(status) => *status,
            Self::VolumeLabelErr => Status::UNSUPPORTED,
            Self::Path(_) => Status::INVALID_PARAMETER,
        }
    }

    /// Checks if the error only means that the file or directory does not exist.
    ///
    /// Firmware returns either [`Status::NOT_FOUND`] or [`Status::INVALID_PARAMETER`] for a missing path, depending on
    /// the filesystem driver.
    #[must_use = "Has no effect if the result is unused"]
    pub fn is_benign(&self) -> bool {
        let status = self.status();
        status == Status::NOT_FOUND || status == Status::INVALID_PARAMETER
    }
}

/// One entry of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    /// The file name of the entry.
    pub name: String,

    /// The size of the entry as reported by the directory listing.
    pub size: u64,

    /// The last modification time of the entry.
    pub modified: Timestamp,

    /// If the entry is a directory.
    pub is_dir: bool,
}

/// Read-only access to a volume's files.
pub trait VolumeFs {
    /// Lists a directory, without the `.` and `..` entries.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the directory does not exist or could not be read.
    fn read_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, FsError>;

    /// Opens a file and returns its size as seen through the opened handle.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the file does not exist or could not be opened.
    fn file_size(&mut self, path: &str) -> Result<u64, FsError>;

    /// Reads the start of a file into a buffer, returning how many bytes were read.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the file does not exist or could not be read.
    fn read_head(&mut self, path: &str, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Reads the entire content of a file.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the file does not exist or could not be read.
    fn read(&mut self, path: &str) -> Result<Vec<u8>, FsError>;

    /// Checks if a file or directory exists.
    ///
    /// A path that could not be verified to exist is treated as missing.
    fn exists(&mut self, path: &str) -> bool;

    /// Gets the label of the volume.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the filesystem does not expose a volume label.
    fn volume_label(&mut self) -> Result<String, FsError>;
}

/// A rust-ier wrapper around [`SimpleFileSystem`].
pub struct UefiFileSystem(ScopedProtocol<SimpleFileSystem>);

impl UefiFileSystem {
    /// Create a new [`UefiFileSystem`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn new(fs: ScopedProtocol<SimpleFileSystem>) -> Self {
        Self(fs)
    }

    /// Create a new [`UefiFileSystem`] from a handle that supports [`SimpleFileSystem`].
    ///
    /// # Errors
    ///
    /// May return an `Error` if the handle does not actually support [`SimpleFileSystem`].
    pub fn from_handle(handle: Handle) -> BootResult<Self> {
        let fs = boot::open_protocol_exclusive(handle)?;
        Ok(Self(fs))
    }

    /// Create a new [`UefiFileSystem`] from the same filesystem as the boot manager.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the boot image's filesystem does not support [`SimpleFileSystem`] for some reason.
    pub fn from_image_fs() -> BootResult<Self> {
        let fs = boot::get_image_file_system(boot::image_handle())?;
        Ok(Self(fs))
    }

    /// Converts a volume relative path into an absolute UEFI path.
    fn uefi_path(path: &str) -> Result<CString16, FsError> {
        Ok(str_to_cstr(&absolute_path(path))?)
    }

    /// Gets a handle to the root [`Directory`] of the volume.
    fn root(&mut self) -> Result<Directory, FsError> {
        self.0
            .open_volume()
            .map_err(|e| FsError::OpenErr(e.status()))
    }

    /// Gets a handle to a [`RegularFile`] in the filesystem.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the volume couldn't be opened, or the path does not point to a file.
    fn get_regular_file(&mut self, path: &str) -> Result<RegularFile, FsError> {
        let path = Self::uefi_path(path)?;
        self.root()?
            .open(&path, FileMode::Read, FileAttribute::empty())
            .map_err(|e| FsError::OpenErr(e.status()))?
            .into_regular_file()
            .ok_or(FsError::OpenErr(Status::INVALID_PARAMETER))
    }

    /// Gets a handle to a [`Directory`] in the filesystem.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the volume couldn't be opened, or the path does not point to a folder.
    fn get_directory(&mut self, path: &str) -> Result<Directory, FsError> {
        let mut root = self.root()?;
        if path.trim_matches('\\').is_empty() {
            return Ok(root);
        }
        let path = Self::uefi_path(path)?;
        root.open(&path, FileMode::Read, FileAttribute::empty())
            .map_err(|e| FsError::OpenErr(e.status()))?
            .into_directory()
            .ok_or(FsError::OpenErr(Status::NOT_FOUND))
    }
}

impl VolumeFs for UefiFileSystem {
    fn read_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let dir = self.get_directory(path)?;
        Ok(UefiDirectoryIter::new(dir)
            .filter_map(Result::ok)
            .filter(|x| !COMMON_SKIP_DIRS.contains(&x.file_name())) // excludes "." and ".."
            .map(|info| DirEntry {
                name: String::from(info.file_name()),
                size: info.file_size(),
                modified: Timestamp::from(info.modification_time()),
                is_dir: info.is_directory(),
            })
            .collect())
    }

    fn file_size(&mut self, path: &str) -> Result<u64, FsError> {
        let mut file = self.get_regular_file(path)?;
        let info = file
            .get_boxed_info::<FileInfo>()
            .map_err(|e| FsError::ReadErr(e.status()))?;
        Ok(info.file_size())
    }

    fn read_head(&mut self, path: &str, buf: &mut [u8]) -> Result<usize, FsError> {
        let mut file = self.get_regular_file(path)?;
        file.read(buf).map_err(|e| FsError::ReadErr(e.status()))
    }

    fn read(&mut self, path: &str) -> Result<Vec<u8>, FsError> {
        let mut file = self.get_regular_file(path)?;

        let info = file
            .get_boxed_info::<FileInfo>()
            .map_err(|e| FsError::ReadErr(e.status()))?;

        let size = usize::try_from(info.file_size()).unwrap_or(ONE_GIGABYTE);

        let mut buf = vec![0; size];
        let read = file
            .read(&mut buf)
            .map_err(|e| FsError::ReadErr(e.status()))?;
        buf.truncate(read);

        Ok(buf)
    }

    fn exists(&mut self, path: &str) -> bool {
        let Ok(path) = Self::uefi_path(path) else {
            return false;
        };
        let Ok(mut root) = self.root() else {
            return false;
        };

        root.open(&path, FileMode::Read, FileAttribute::empty())
            .is_ok()
    }

    fn volume_label(&mut self) -> Result<String, FsError> {
        let mut root = self.root()?;
        let info = root
            .get_boxed_info::<FileSystemVolumeLabel>()
            .map_err(|_| FsError::VolumeLabelErr)?;
        Ok(String::from(info.volume_label()).trim().to_owned())
    }
}
