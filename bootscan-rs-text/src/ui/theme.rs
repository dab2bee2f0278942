// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`Theme`], the colors of the menu.

use ratatui_core::style::{Color, Modifier, Style};

/// The colors of the menu.
#[derive(Clone, Copy)]
pub struct Theme {
    /// Everything that is not highlighted.
    pub base: Style,

    /// The selected entry.
    pub highlight: Style,

    /// Titles and hints.
    pub accent: Style,

    /// Error messages.
    pub error: Style,
}

impl Theme {
    /// Light gray on black, with a black on gray selection.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn new() -> Self {
        Self {
            base: Style::new().fg(Color::Gray).bg(Color::Black),
            highlight: Style::new().fg(Color::Black).bg(Color::Gray),
            accent: Style::new()
                .fg(Color::White)
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
            error: Style::new().fg(Color::LightRed).bg(Color::Black),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::new()
    }
}
