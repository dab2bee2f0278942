// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Adds an entry for the network boot server, if one is found.
//!
//! The boot server is found by running the iPXE discovery tool from the boot manager's volume. Its exit data names
//! the server, which becomes the title of an iPXE entry on a network volume.

use log::{debug, info};

use crate::{
    menu::MenuScreen,
    scan::{loaders::LoaderScanner, validate::is_valid_loader},
    system::{
        firmware::Firmware,
        volume::{Volume, VolumeTable},
    },
};

/// The tool that finds the boot server.
pub const IPXE_DISCOVER_PATH: &str = "\\EFI\\tools\\ipxe_discover.efi";

/// The loader that boots from the boot server.
pub const IPXE_PATH: &str = "\\EFI\\tools\\ipxe.efi";

/// Checks if the iPXE images exist on the boot manager's volume and are valid loaders.
fn has_ipxe(volume: &mut Volume) -> bool {
    [IPXE_DISCOVER_PATH, IPXE_PATH].into_iter().all(|path| {
        volume
            .fs()
            .is_some_and(|fs| fs.exists(path) && is_valid_loader(Some(fs), Some(path)))
    })
}

/// Runs the network boot pass, returning the index of the added entry.
pub fn scan_netboot<F: Firmware + ?Sized>(
    firmware: &mut F,
    volumes: &mut VolumeTable,
    scanner: &LoaderScanner<'_>,
    menu: &mut MenuScreen,
) -> Option<usize> {
    let self_id = volumes.self_volume()?;
    let self_volume = volumes.get_mut(self_id)?;
    if !has_ipxe(self_volume) {
        debug!("No iPXE images on the boot manager's volume");
        return None;
    }

    let handle = self_volume.handle;
    let location = firmware.run_discovery(self_volume, IPXE_DISCOVER_PATH)?;
    info!("Found network boot server {location}");

    let id = volumes.push(Volume::network(handle));
    let volume = volumes.get_mut(id)?;
    Some(scanner.add_loader_entry(id, volume, IPXE_PATH, Some(&location), true, menu))
}
