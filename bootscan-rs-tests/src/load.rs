// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

use alloc::string::String;

use bootscan_rs_core::{
    boot::launch::start_image,
    menu::LoaderEntry,
    system::{
        firmware::{Firmware, UefiFirmware},
        variable::{VarVendor, get_variable, set_variable},
    },
};
use uefi::{CStr16, cstr16, println};

use crate::{press_for_reboot, read_key};

const LOADED_VARIABLE_NAME: &CStr16 = cstr16!("LoadedFromPrevTest");
const SHELL_PATH: &str = "\\shellx64.efi";
const FALLBACK_PATH: &str = "\\EFI\\BOOT\\BOOTx64.efi";

pub fn check_loaded() -> anyhow::Result<()> {
    if get_variable::<u8>(LOADED_VARIABLE_NAME, VarVendor::Manager)? != 0 {
        set_variable::<u8>(LOADED_VARIABLE_NAME, VarVendor::Manager, 0)?;
        println!("Successfully passed load image test");
        println!("Press a key to reboot");
        press_for_reboot();
    }
    Ok(())
}

pub fn test_loading() -> anyhow::Result<()> {
    println!("Will try to load an image from either {SHELL_PATH} or {FALLBACK_PATH} on the same volume");
    println!("Press a key to continue");
    let _ = read_key();

    let mut firmware = UefiFirmware::new();
    let mut volumes = firmware.volumes()?;
    let id = volumes
        .self_volume()
        .expect("The volume the boot manager was loaded from should be found");

    let fs = volumes
        .get_mut(id)
        .and_then(|volume| volume.fs())
        .expect("The boot manager's own volume should be readable");
    let path = if fs.exists(SHELL_PATH) {
        SHELL_PATH
    } else if fs.exists(FALLBACK_PATH) {
        FALLBACK_PATH
    } else {
        println!("Cannot test if load image works, as {SHELL_PATH} and {FALLBACK_PATH} do not exist");
        println!("Press a key to reboot");
        press_for_reboot();
    };

    let loader = LoaderEntry {
        path: String::from(path),
        volume: id,
        options: Some(String::from("-nomap")),
        ..LoaderEntry::default()
    };

    set_variable::<u8>(LOADED_VARIABLE_NAME, VarVendor::Manager, 1)?;
    start_image(&mut firmware, &mut volumes, &loader, "Test image")?;

    // the volumes are reopened once the image returns
    assert!(volumes.get(id).is_some_and(|volume| volume.is_readable()));
    check_loaded()
}
