// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Volume discovery.
//!
//! Every handle that supports [`SimpleFileSystem`] is a volume. The [`VolumeTable`] owns all of them for one scan
//! pass; menu entries only refer to a volume through its [`VolumeId`].
//!
//! The open filesystem of each volume can be released right before a loader is started, since some loaders will
//! fail to open a volume that the boot manager still holds exclusively. They are reopened if the loader returns.

use alloc::{
    borrow::ToOwned,
    boxed::Box,
    string::{String, ToString},
    vec::Vec,
};
use log::{debug, warn};
use uefi::{
    Guid, Handle, Identify,
    boot::{self, SearchType},
    proto::{
        device_path::{DevicePath, DeviceSubType, DeviceType},
        loaded_image::LoadedImage,
        media::{block::BlockIO, fs::SimpleFileSystem, partition::PartitionInfo},
    },
};

use crate::{
    BootResult,
    system::{
        fs::{UefiFileSystem, VolumeFs},
        helper::get_protocol,
    },
};

/// The kind of disk a volume lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiskKind {
    /// A fixed disk.
    Internal,

    /// A removable disk, like a USB drive.
    External,

    /// An optical disc.
    Optical,

    /// A network share.
    Network,
}

/// The index of a volume inside of a [`VolumeTable`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VolumeId(pub usize);

/// A volume that may hold loaders.
pub struct Volume {
    /// The display name of the volume, usually its filesystem label.
    pub name: String,

    /// The GPT partition name, if the volume is a GPT partition.
    pub part_name: Option<String>,

    /// The unique GPT partition GUID, if the volume is a GPT partition.
    pub part_guid: Option<Guid>,

    /// The kind of disk the volume is on.
    pub kind: DiskKind,

    /// If the boot manager was loaded from this volume.
    pub is_self: bool,

    /// The firmware handle of the volume.
    pub handle: Option<Handle>,

    /// The open filesystem of the volume, or [`None`] if it is unreadable or released.
    fs: Option<Box<dyn VolumeFs>>,
}

impl Volume {
    /// Creates a new [`Volume`] from an open filesystem.
    #[must_use = "Has no effect if the result is unused"]
    pub fn new(name: &str, kind: DiskKind, fs: Box<dyn VolumeFs>) -> Self {
        Self {
            name: name.to_owned(),
            part_name: None,
            part_guid: None,
            kind,
            is_self: false,
            handle: None,
            fs: Some(fs),
        }
    }

    /// Creates the unnamed network volume served through the firmware handle of another volume.
    ///
    /// Its filesystem is only opened when the volumes are reacquired.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn network(handle: Option<Handle>) -> Self {
        Self {
            name: String::new(),
            part_name: None,
            part_guid: None,
            kind: DiskKind::Network,
            is_self: false,
            handle,
            fs: None,
        }
    }

    /// Sets the GPT partition name and GUID.
    #[must_use = "Has no effect if the result is unused"]
    pub fn with_partition(mut self, part_name: Option<&str>, part_guid: Option<Guid>) -> Self {
        self.part_name = part_name.map(ToOwned::to_owned);
        self.part_guid = part_guid;
        self
    }

    /// Marks the volume as the one the boot manager was loaded from.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_self(mut self) -> Self {
        self.is_self = true;
        self
    }

    /// Get the open filesystem of the volume.
    pub fn fs(&mut self) -> Option<&mut dyn VolumeFs> {
        // the trait object lifetime has to be shortened explicitly
        match &mut self.fs {
            Some(fs) => Some(fs.as_mut()),
            None => None,
        }
    }

    /// If the volume's filesystem is open.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn is_readable(&self) -> bool {
        self.fs.is_some()
    }

    /// Checks if a name from the configuration refers to this volume.
    ///
    /// The name may be the filesystem label, the GPT partition name, or the GPT partition GUID.
    #[must_use = "Has no effect if the result is unused"]
    pub fn matches(&self, desc: &str) -> bool {
        let desc = desc.trim();
        !desc.is_empty()
            && (self.name.eq_ignore_ascii_case(desc)
                || self
                    .part_name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(desc))
                || self
                    .part_guid
                    .is_some_and(|guid| guid.to_string().eq_ignore_ascii_case(desc)))
    }

    /// Closes the filesystem of the volume.
    pub fn release(&mut self) {
        self.fs = None;
    }

    /// Replaces the filesystem of the volume.
    pub fn set_fs(&mut self, fs: Option<Box<dyn VolumeFs>>) {
        self.fs = fs;
    }
}

/// Every volume found in one scan pass.
#[derive(Default)]
pub struct VolumeTable(Vec<Volume>);

impl VolumeTable {
    /// Creates a [`VolumeTable`] from a list of volumes.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn new(volumes: Vec<Volume>) -> Self {
        Self(volumes)
    }

    /// Get a volume given its id.
    #[must_use = "Has no effect if the result is unused"]
    pub fn get(&self, id: VolumeId) -> Option<&Volume> {
        self.0.get(id.0)
    }

    /// Get a mutable volume given its id.
    pub fn get_mut(&mut self, id: VolumeId) -> Option<&mut Volume> {
        self.0.get_mut(id.0)
    }

    /// Get the name of a volume, or an empty string if the id is unknown.
    #[must_use = "Has no effect if the result is unused"]
    pub fn name(&self, id: VolumeId) -> &str {
        self.get(id).map_or("", |volume| volume.name.as_str())
    }

    /// Iterate over every volume with its id.
    pub fn iter(&self) -> impl Iterator<Item = (VolumeId, &Volume)> {
        self.0.iter().enumerate().map(|(i, v)| (VolumeId(i), v))
    }

    /// Get the ids of every volume.
    pub fn ids(&self) -> impl Iterator<Item = VolumeId> + use<> {
        (0..self.0.len()).map(VolumeId)
    }

    /// Find the id of a volume matching a name.
    #[must_use = "Has no effect if the result is unused"]
    pub fn find(&self, desc: &str) -> Option<VolumeId> {
        self.iter().find(|(_, v)| v.matches(desc)).map(|(id, _)| id)
    }

    /// Get the id of the volume the boot manager was loaded from.
    #[must_use = "Has no effect if the result is unused"]
    pub fn self_volume(&self) -> Option<VolumeId> {
        self.iter().find(|(_, v)| v.is_self).map(|(id, _)| id)
    }

    /// The number of volumes.
    #[must_use = "Has no effect if the result is unused"]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// If there are no volumes.
    #[must_use = "Has no effect if the result is unused"]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds a volume, returning its ID.
    pub fn push(&mut self, volume: Volume) -> VolumeId {
        self.0.push(volume);
        VolumeId(self.0.len() - 1)
    }

    /// Closes the filesystem of every volume.
    pub fn release_all(&mut self) {
        for volume in &mut self.0 {
            volume.release();
        }
    }

    /// Reopens the filesystem of every volume that has a firmware handle.
    pub fn reacquire_all(&mut self, mut open: impl FnMut(Handle) -> Option<Box<dyn VolumeFs>>) {
        for volume in &mut self.0 {
            if let Some(handle) = volume.handle
                && !volume.is_readable()
            {
                volume.set_fs(open(handle));
            }
        }
    }
}

/// Opens the filesystem of a volume handle.
#[must_use = "Has no effect if the result is unused"]
pub fn open_volume_fs(handle: Handle) -> Option<Box<dyn VolumeFs>> {
    match UefiFileSystem::from_handle(handle) {
        Ok(fs) => Some(Box::new(fs)),
        Err(e) => {
            warn!("Could not open filesystem of a volume: {e}");
            None
        }
    }
}

/// Gets the GPT partition name and unique GUID of a volume.
fn partition_info(handle: Handle) -> (Option<String>, Option<Guid>) {
    let Ok(info) = get_protocol::<PartitionInfo>(handle) else {
        return (None, None);
    };
    let Some(entry) = info.gpt_partition_entry() else {
        return (None, None);
    };

    let partition_name = entry.partition_name;
    let name: String = char::decode_utf16(
        partition_name
            .iter()
            .map(|c| u16::from(*c))
            .take_while(|c| *c != 0),
    )
    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
    .collect();
    let name = (!name.is_empty()).then_some(name);
    (name, Some(entry.unique_partition_guid))
}

/// Gets the kind of disk a volume is on.
fn disk_kind(handle: Handle) -> DiskKind {
    if let Ok(path) = get_protocol::<DevicePath>(handle)
        && path.node_iter().any(|node| {
            node.device_type() == DeviceType::MESSAGING
                && (node.sub_type() == DeviceSubType::MESSAGING_MAC_ADDRESS
                    || node.sub_type() == DeviceSubType::MESSAGING_IPV4
                    || node.sub_type() == DeviceSubType::MESSAGING_IPV6)
        })
    {
        return DiskKind::Network;
    }

    let Ok(block) = get_protocol::<BlockIO>(handle) else {
        return DiskKind::Internal;
    };
    let media = block.media();

    if media.is_read_only() && media.block_size() == 2048 {
        DiskKind::Optical
    } else if media.is_removable_media() {
        DiskKind::External
    } else {
        DiskKind::Internal
    }
}

/// Gets the device handle the boot manager was loaded from.
fn self_device() -> Option<Handle> {
    boot::open_protocol_exclusive::<LoadedImage>(boot::image_handle())
        .ok()
        .and_then(|image| image.device())
}

/// Finds every volume with a filesystem.
///
/// A volume whose filesystem cannot be opened is still listed, but is unreadable.
///
/// # Errors
///
/// May return an `Error` if the handles supporting [`SimpleFileSystem`] could not be located.
pub fn enumerate_volumes() -> BootResult<VolumeTable> {
    let handles = boot::locate_handle_buffer(SearchType::ByProtocol(&SimpleFileSystem::GUID))?;
    let self_device = self_device();

    let mut volumes = Vec::with_capacity(handles.len());
    for handle in handles.iter().copied() {
        let (part_name, part_guid) = partition_info(handle);
        let kind = disk_kind(handle);
        let mut fs = open_volume_fs(handle);

        let label = fs
            .as_mut()
            .and_then(|fs| fs.volume_label().ok())
            .filter(|label| !label.is_empty());
        let name = label
            .or_else(|| part_name.clone())
            .unwrap_or_else(|| String::from(unnamed_volume(kind)));

        debug!("Found volume {name} ({kind:?})");
        volumes.push(Volume {
            name,
            part_name,
            part_guid,
            kind,
            is_self: Some(handle) == self_device,
            handle: Some(handle),
            fs,
        });
    }

    Ok(VolumeTable::new(volumes))
}

/// The fallback name of a volume without a label.
const fn unnamed_volume(kind: DiskKind) -> &'static str {
    match kind {
        DiskKind::Internal => "internal volume",
        DiskKind::External => "external volume",
        DiskKind::Optical => "optical disc",
        DiskKind::Network => "network volume",
    }
}
