// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

#![no_main]

use libfuzzer_sys::fuzz_target;

use bootscan_rs_core::system::helper::Arch;

fuzz_target!(|data: &[u8]| {
    let _ = bootscan_rs_core::scan::validate::check_header(data, Arch::current());
});
