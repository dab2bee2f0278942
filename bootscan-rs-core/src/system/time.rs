// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! File modification timestamps.
//!
//! Directory listings report modification times as calendar dates. Candidates are only ever compared against each
//! other, so a [`Timestamp`] flattens the date into seconds with every month approximated as 31 days. This keeps
//! ordering intact for any two dates while avoiding a calendar implementation.

use uefi::runtime::Time;

/// Seconds in a 31 day month.
const SECS_PER_MONTH: u64 = 31 * 24 * 60 * 60;

/// Seconds in a year made of twelve 31 day months.
const SECS_PER_YEAR: u64 = 12 * SECS_PER_MONTH;

/// The earliest year a timestamp is counted from.
const EPOCH_YEAR: u16 = 1998;

/// A file modification time with second precision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a [`Timestamp`] from calendar fields.
    ///
    /// Years before 1998 are clamped to 1998, and zero-based or out of range months and days are clamped into range.
    #[must_use = "Has no effect if the result is unused"]
    pub fn from_parts(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let years = u64::from(year.saturating_sub(EPOCH_YEAR));
        let months = u64::from(month.clamp(1, 12) - 1);
        let days = u64::from(day.clamp(1, 31) - 1);
        Self(
            years * SECS_PER_YEAR
                + months * SECS_PER_MONTH
                + days * 24 * 60 * 60
                + u64::from(hour) * 60 * 60
                + u64::from(minute) * 60
                + u64::from(second),
        )
    }

    /// Creates a [`Timestamp`] directly from a number of seconds.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn from_seconds(seconds: u64) -> Self {
        Self(seconds)
    }

    /// Get the number of seconds since the start of 1998.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_seconds(self) -> u64 {
        self.0
    }
}

impl From<&Time> for Timestamp {
    fn from(time: &Time) -> Self {
        Self::from_parts(
            time.year(),
            time.month(),
            time.day(),
            time.hour(),
            time.minute(),
            time.second(),
        )
    }
}
