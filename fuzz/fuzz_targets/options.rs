// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for record in bootscan_rs_core::menu::options_file::parse(data) {
        let _ = record.options_for(Some("6.1.0"));
    }
});
