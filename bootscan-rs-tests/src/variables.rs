// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

use bootscan_rs_core::{
    menu::HiddenList,
    scan::hidden,
    system::{
        firmware::UefiFirmware,
        variable::{VarVendor, get_raw, get_variable, set_variable},
    },
};
use uefi::{CStr16, cstr16, println};

use crate::press_for_reboot;

const VARIABLE_NAME: &CStr16 = cstr16!("TestVariable");
const VARIABLE_CONTENT: u32 = 23;
const UPDATED_VARIABLE_CONTENT: u32 = 24;
const HIDDEN_VALUE: &str = "TEST:\\EFI\\test\\test.efi";

pub fn check_variable() -> anyhow::Result<()> {
    let num = get_variable::<u32>(VARIABLE_NAME, VarVendor::Manager)?;
    if num == VARIABLE_CONTENT {
        println!("Successfully got value of TestVariable after reboot: {num}");
        set_variable::<u32>(VARIABLE_NAME, VarVendor::Manager, UPDATED_VARIABLE_CONTENT)?;
        assert_eq!(
            get_variable::<u32>(VARIABLE_NAME, VarVendor::Manager)?,
            UPDATED_VARIABLE_CONTENT
        );

        let mut firmware = UefiFirmware::new();
        assert!(hidden::read(&mut firmware, HiddenList::Tags).iter().any(|v| v == HIDDEN_VALUE));
        assert!(hidden::remove(&mut firmware, HiddenList::Tags, HIDDEN_VALUE)?);
        assert!(!hidden::read(&mut firmware, HiddenList::Tags).iter().any(|v| v == HIDDEN_VALUE));

        // the list variable is rewritten on removal, never deleted
        assert!(get_raw(cstr16!("HiddenTags"), VarVendor::Manager)?.is_some());

        println!("Variables persisted and were updated");
        println!("Press a key to reboot");
        press_for_reboot();
    }
    Ok(())
}

pub fn test_variables() -> anyhow::Result<()> {
    assert!(get_raw(cstr16!("NonexistentVariable"), VarVendor::Manager)?.is_none());

    set_variable(VARIABLE_NAME, VarVendor::Manager, VARIABLE_CONTENT)?;
    println!("Set value of TestVariable to {VARIABLE_CONTENT}");
    assert_eq!(
        get_variable::<u32>(VARIABLE_NAME, VarVendor::Manager)?,
        VARIABLE_CONTENT
    );

    let mut firmware = UefiFirmware::new();
    assert!(hidden::append(&mut firmware, HiddenList::Tags, HIDDEN_VALUE)?);
    assert!(!hidden::append(&mut firmware, HiddenList::Tags, HIDDEN_VALUE)?);
    println!("Added {HIDDEN_VALUE} to HiddenTags");

    println!("Will now test if variables persist");
    println!("Press a key to reboot");
    press_for_reboot();
}
