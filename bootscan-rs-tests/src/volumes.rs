// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

use bootscan_rs_core::system::firmware::{Firmware, UefiFirmware};
use uefi::println;

use crate::press_for_reboot;

pub fn test_volumes() -> anyhow::Result<()> {
    let mut firmware = UefiFirmware::new();
    let mut volumes = firmware.volumes()?;
    assert!(!volumes.is_empty());

    for (_, volume) in volumes.iter() {
        println!(
            "{} ({:?}, readable: {}, self: {})",
            volume.name,
            volume.kind,
            volume.is_readable(),
            volume.is_self
        );
    }

    let id = volumes
        .self_volume()
        .expect("The volume the boot manager was loaded from should be found");
    assert!(volumes.get(id).is_some_and(|volume| volume.is_readable()));

    volumes.release_all();
    assert!(volumes.iter().all(|(_, volume)| !volume.is_readable()));

    firmware.reacquire_volumes(&mut volumes);
    assert!(volumes.get(id).is_some_and(|volume| volume.is_readable()));

    println!("All volume assertions passed!");
    println!("Press a key to reboot");
    press_for_reboot();
}
