// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Uses the UEFI pool allocator as the global allocator.
//!
//! This is enabled when the `global_allocator` feature is enabled. Host tests and fuzzers use the standard allocator.

#![cfg(feature = "global_allocator")]
use uefi::allocator::Allocator;

/// The UEFI global allocator.
#[global_allocator]
static ALLOCATOR: Allocator = Allocator;
