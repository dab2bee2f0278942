// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Bindings to the firmware and general helpers.

pub mod firmware;
pub mod fs;
pub mod helper;
pub mod log_backend;
pub mod protos;
pub mod time;
pub mod variable;
pub mod volume;

mod global_allocator;
mod panic_handler;
