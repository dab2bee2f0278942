// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

use bootscan_rs_core::{
    boot::action::request_firmware_setup,
    system::firmware::{Firmware, Reset, UefiFirmware},
};
use uefi::{println, proto::console::text::Key};

use crate::read_key;

pub fn test_actions() -> anyhow::Result<()> {
    let mut firmware = UefiFirmware::new();
    println!("Select the action that you want to test:");
    println!("1. Reboot");
    println!("2. Shutdown");
    println!("3. Reboot to Firmware Setup");
    loop {
        if let Key::Printable(char) = read_key() {
            let char = char::from(char);
            match char {
                '1' => firmware.reset(Reset::Cold),
                '2' => firmware.reset(Reset::Shutdown),
                '3' => {
                    request_firmware_setup(&mut firmware)?;
                    firmware.reset(Reset::FirmwareSetup);
                }
                _ => (),
            }
            if matches!(char, '1' | '2' | '3') {
                unreachable!();
            }
        }
    }
}
