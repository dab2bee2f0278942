// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The `bootscan-rs` library crate.
//!
//! This holds everything of the boot manager except drawing: volume enumeration, loader discovery, the menu model,
//! the configuration file, and starting images. Frontends only implement [`boot::MenuDisplay`] and hand it to a
//! [`boot::BootManager`], which is how the text frontend in `bootscan-rs-text` works.
//!
//! It is also exposed for the integration tests and the fuzzers, which run on the host.
//!
//! ## MSRV
//!
//! The minimum supported rust version is 1.88.0.

#![cfg_attr(not(any(fuzzing, test, doctest)), no_std)]

/// The primary result type that wraps around [`crate::error::BootError`].
pub type BootResult<T> = Result<T, crate::error::BootError>;

pub mod boot;
pub mod config;
pub mod error;
pub mod menu;
pub mod scan;
pub mod system;

extern crate alloc;
