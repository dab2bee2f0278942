// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

use bootscan_rs_core::system::{
    firmware::{Firmware, UefiFirmware},
    fs::{UefiFileSystem, VolumeFs},
    helper::{basename, dirname},
};
use uefi::println;

use crate::press_for_reboot;

const MISSING_PATH: &str = "\\EFI\\does\\not\\exist.efi";

pub fn test_filesystem() -> anyhow::Result<()> {
    let self_path = UefiFirmware::new()
        .self_path()
        .expect("The boot manager should know its own path");
    println!("Running from {self_path}");

    let mut fs = UefiFileSystem::from_image_fs()?;

    assert!(fs.exists(&self_path));
    assert!(!fs.exists(MISSING_PATH));
    assert!(fs.read(MISSING_PATH).is_err_and(|e| e.is_benign()));

    let size = fs.file_size(&self_path)?;
    let content = fs.read(&self_path)?;
    assert_eq!(content.len() as u64, size);

    let mut head = [0; 2];
    assert_eq!(fs.read_head(&self_path, &mut head)?, 2);
    assert_eq!(&head, b"MZ");

    let listing = fs.read_dir(&dirname(&self_path))?;
    let entry = listing
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(basename(&self_path)))
        .expect("The boot manager should be listed in its own directory");
    assert!(!entry.is_dir);
    assert_eq!(entry.size, size);

    let label = fs.volume_label()?;
    println!("Volume label: {label:?}");

    println!("All filesystem assertions passed!");
    println!("Press a key to reboot");
    press_for_reboot();
}
