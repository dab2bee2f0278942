// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! An in-memory [`VolumeFs`] for unit tests.

use std::collections::BTreeMap;

use alloc::{borrow::ToOwned, string::String, vec::Vec};
use uefi::Status;

use crate::system::{
    fs::{DirEntry, FsError, VolumeFs},
    helper::{Arch, clean_path, dirname},
    time::Timestamp,
};

/// A file stored in a [`MemVolume`].
#[derive(Clone, Debug)]
struct MemFile {
    /// The content of the file.
    data: Vec<u8>,

    /// The size reported in directory listings, if it differs from the real size.
    listed_size: Option<u64>,

    /// The modification time.
    modified: Timestamp,
}

/// A volume whose files live in memory.
///
/// Lookups are case-insensitive like on FAT filesystems, listings keep the original case and are sorted by name.
#[derive(Clone, Debug, Default)]
pub struct MemVolume {
    /// The volume label.
    label: String,

    /// Files keyed by their lowercase path, holding the original path and the file.
    files: BTreeMap<String, (String, MemFile)>,

    /// Directories keyed by their lowercase path, holding the original path.
    dirs: BTreeMap<String, String>,

    /// How many times a file was opened for its size or content.
    pub opens: usize,
}

impl MemVolume {
    /// Creates an empty volume with a label.
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_owned(),
            ..Self::default()
        }
    }

    /// Adds a directory and all of its parents.
    pub fn with_dir(mut self, path: &str) -> Self {
        self.add_dir(&clean_path(path));
        self
    }

    /// Adds a file with a zero timestamp.
    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.with_file_at(path, data, 0)
    }

    /// Adds a file with a modification time given in seconds.
    pub fn with_file_at(mut self, path: &str, data: &[u8], seconds: u64) -> Self {
        self.insert(
            path,
            MemFile {
                data: data.to_owned(),
                listed_size: None,
                modified: Timestamp::from_seconds(seconds),
            },
        );
        self
    }

    /// Adds a file whose listed size differs from its real size, the way symbolic links look on some drivers.
    pub fn with_symlink(mut self, path: &str, data: &[u8], listed_size: u64) -> Self {
        self.insert(
            path,
            MemFile {
                data: data.to_owned(),
                listed_size: Some(listed_size),
                modified: Timestamp::default(),
            },
        );
        self
    }

    /// Inserts a file and creates its parent directories.
    fn insert(&mut self, path: &str, file: MemFile) {
        let path = clean_path(path);
        self.add_dir(&dirname(&path));
        self.files.insert(path.to_ascii_lowercase(), (path, file));
    }

    /// Creates a directory and its parents.
    fn add_dir(&mut self, path: &str) {
        let mut current = String::new();
        for part in path.split('\\').filter(|part| !part.is_empty()) {
            if !current.is_empty() {
                current.push('\\');
            }
            current.push_str(part);
            self.dirs
                .entry(current.to_ascii_lowercase())
                .or_insert_with(|| current.clone());
        }
    }

    /// Looks up a file.
    fn file(&mut self, path: &str) -> Result<&MemFile, FsError> {
        self.opens += 1;
        self.files
            .get(&clean_path(path).to_ascii_lowercase())
            .map(|(_, file)| file)
            .ok_or(FsError::OpenErr(Status::NOT_FOUND))
    }
}

impl VolumeFs for MemVolume {
    fn read_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let dir = clean_path(path).to_ascii_lowercase();
        if !dir.is_empty() && !self.dirs.contains_key(&dir) {
            return Err(FsError::OpenErr(Status::NOT_FOUND));
        }
        let in_dir = |key: &str| dirname(key) == dir;

        let dirs = self
            .dirs
            .iter()
            .filter(|(key, _)| in_dir(key))
            .map(|(_, path)| DirEntry {
                name: crate::system::helper::basename(path).to_owned(),
                size: 0,
                modified: Timestamp::default(),
                is_dir: true,
            });
        let files = self
            .files
            .iter()
            .filter(|(key, _)| in_dir(key))
            .map(|(_, (path, file))| DirEntry {
                name: crate::system::helper::basename(path).to_owned(),
                size: file
                    .listed_size
                    .unwrap_or(u64::try_from(file.data.len()).unwrap_or(u64::MAX)),
                modified: file.modified,
                is_dir: false,
            });

        let mut entries: Vec<_> = dirs.chain(files).collect();
        entries.sort_by_key(|entry| entry.name.to_ascii_lowercase());
        Ok(entries)
    }

    fn file_size(&mut self, path: &str) -> Result<u64, FsError> {
        let file = self.file(path)?;
        Ok(u64::try_from(file.data.len()).unwrap_or(u64::MAX))
    }

    fn read_head(&mut self, path: &str, buf: &mut [u8]) -> Result<usize, FsError> {
        let file = self.file(path)?;
        let len = buf.len().min(file.data.len());
        buf[..len].copy_from_slice(&file.data[..len]);
        Ok(len)
    }

    fn read(&mut self, path: &str) -> Result<Vec<u8>, FsError> {
        Ok(self.file(path)?.data.clone())
    }

    fn exists(&mut self, path: &str) -> bool {
        let key = clean_path(path).to_ascii_lowercase();
        key.is_empty() || self.files.contains_key(&key) || self.dirs.contains_key(&key)
    }

    fn volume_label(&mut self) -> Result<String, FsError> {
        Ok(self.label.clone())
    }
}

/// Builds a minimal 512 byte PE image header for the given architecture.
pub fn pe_image(arch: Arch) -> Vec<u8> {
    let mut image = alloc::vec![0u8; 512];
    image[0..2].copy_from_slice(b"MZ");
    image[0x3c..0x40].copy_from_slice(&0x80u32.to_le_bytes());
    image[0x80..0x84].copy_from_slice(b"PE\0\0");
    image[0x84..0x86].copy_from_slice(&arch.machine().to_le_bytes());
    image
}

/// Builds a PE image for the running architecture with extra bytes appended, so that images can differ in content.
pub fn loader(tag: &[u8]) -> Vec<u8> {
    let mut image = pe_image(Arch::current());
    image.extend_from_slice(tag);
    image
}
