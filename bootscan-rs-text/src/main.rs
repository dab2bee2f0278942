// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The `bootscan` application.
//!
//! This provides a [`main`] function that runs a [`BootManager`] on the text console. The menu loop only ends
//! through the exit action, which returns to the firmware, or through a reset.

#![no_main]
#![no_std]

extern crate alloc;

use bootscan_rs_core::{
    boot::{BootManager, Terminal, halt},
    error::BootError,
    system::{
        firmware::{Reset, UefiFirmware},
        log_backend::UefiLogger,
    },
};
use log::error;
use thiserror::Error;
use uefi::{boot, prelude::*};

use crate::display::TextDisplay;

mod display;
mod ui;

/// The global logging instance.
static LOGGER: UefiLogger = UefiLogger::new();

/// The time an error stays on screen before the reset, in microseconds.
const ERROR_DELAY: usize = 5_000_000;

/// An `Error` that may result from drawing the menu or reading keys.
#[derive(Error, Debug)]
pub enum DisplayError {
    /// An error with UEFI, or a service from the [`uefi`] crate.
    #[error("UEFI Error: {0}")]
    Uefi(#[from] uefi::Error),

    /// An error from the boot manager library.
    #[error("Boot Error: {0}")]
    Boot(#[from] BootError),

    /// The keyboard went away.
    #[error("Keyboard Input protocol was closed")]
    InputClosed,
}

/// An error that may occur when starting the application.
#[derive(Error, Debug)]
pub enum MainError {
    /// The boot manager could not be started.
    #[error("Boot Error: {0}")]
    BootError(#[from] BootError),

    /// The console could not be set up.
    #[error("Display Error: {0}")]
    DisplayError(#[from] DisplayError),
}

/// The actual main function of the program.
///
/// # Errors
///
/// May return an `Error` if the console could not be set up, or the volumes could not be enumerated.
fn main_func() -> Result<(), MainError> {
    uefi::helpers::init().map_err(BootError::Uefi)?;
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(log::LevelFilter::Warn)); // if the logger was already set, then ignore it

    let display = TextDisplay::new()?;
    let mut manager = BootManager::new(UefiFirmware::new(), display)?;

    match manager.run() {
        Terminal::Exit => Ok(()),
        Terminal::Reset(reset) => halt(manager.firmware(), reset),
    }
}

/// The main function of the program.
#[entry]
fn main() -> Status {
    match main_func() {
        Ok(()) => Status::SUCCESS,
        Err(e) => {
            error!("{e}");
            boot::stall(ERROR_DELAY);
            halt(&mut UefiFirmware::new(), Reset::Cold)
        }
    }
}
