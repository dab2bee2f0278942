// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let names: Vec<&str> = data.split('\n').collect();
    if let Some((kernel, candidates)) = names.split_first() {
        let _ = bootscan_rs_core::scan::initrd::version_token(kernel);
        let _ = bootscan_rs_core::scan::initrd::select_initrd(kernel, candidates.iter().copied());
    }
});
