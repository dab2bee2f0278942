// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! A ratatui [`Backend`] that draws on the UEFI text console.

use core::fmt::Write;

use bootscan_rs_core::system::helper::locate_protocol;
use ratatui_core::{
    backend::{Backend, ClearType, WindowSize},
    buffer::Cell,
    layout::{Position, Size},
    style::Color,
};
use uefi::{
    Status,
    boot::ScopedProtocol,
    proto::console::text::{Color as ConsoleColor, Output},
};

use crate::DisplayError;

/// Maps a ratatui color to a console foreground color. Colors the console lacks become white.
const fn foreground(color: Color) -> ConsoleColor {
    match color {
        Color::Black => ConsoleColor::Black,
        Color::Red => ConsoleColor::Red,
        Color::Green => ConsoleColor::Green,
        Color::Yellow | Color::LightYellow => ConsoleColor::Yellow,
        Color::Blue => ConsoleColor::Blue,
        Color::Magenta => ConsoleColor::Magenta,
        Color::Cyan => ConsoleColor::Cyan,
        Color::Gray => ConsoleColor::LightGray,
        Color::DarkGray => ConsoleColor::DarkGray,
        Color::LightRed => ConsoleColor::LightRed,
        Color::LightGreen => ConsoleColor::LightGreen,
        Color::LightBlue => ConsoleColor::LightBlue,
        Color::LightMagenta => ConsoleColor::LightMagenta,
        Color::LightCyan => ConsoleColor::LightCyan,
        _ => ConsoleColor::White,
    }
}

/// Maps a ratatui color to a console background color.
///
/// The console only has eight background colors, everything else becomes black.
const fn background(color: Color) -> ConsoleColor {
    match color {
        Color::Blue => ConsoleColor::Blue,
        Color::Green => ConsoleColor::Green,
        Color::Cyan => ConsoleColor::Cyan,
        Color::Red => ConsoleColor::Red,
        Color::Magenta => ConsoleColor::Magenta,
        Color::Gray => ConsoleColor::LightGray,
        _ => ConsoleColor::Black,
    }
}

/// Clamps a console coordinate to what ratatui can address.
fn to_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// The UEFI text console as a ratatui backend.
pub struct ConsoleBackend {
    /// The console.
    output: ScopedProtocol<Output>,

    /// The colors used outside of ratatui, as `(foreground, background)`.
    plain: (ConsoleColor, ConsoleColor),
}

impl ConsoleBackend {
    /// Opens the console.
    ///
    /// # Errors
    ///
    /// May return an `Error` if there is no text console.
    pub fn new() -> Result<Self, DisplayError> {
        Ok(Self {
            output: locate_protocol::<Output>()?,
            plain: (ConsoleColor::LightGray, ConsoleColor::Black),
        })
    }

    /// Sets the colors used outside of ratatui, and switches to them.
    pub fn set_plain_colors(&mut self, fg: Color, bg: Color) {
        self.plain = (foreground(fg), background(bg));
        self.restore_colors();
    }

    /// Switches back to the colors used outside of ratatui.
    pub fn restore_colors(&mut self) {
        let _ = self.output.set_color(self.plain.0, self.plain.1);
    }

    /// Clears the screen and prints lines of plain text, for images that take over the console.
    pub fn print_plain(&mut self, lines: &[&str]) {
        self.restore_colors();
        let _ = self.output.clear();
        for line in lines {
            let _ = writeln!(self.output, "{line}");
        }
    }
}

impl Backend for ConsoleBackend {
    type Error = DisplayError;

    fn draw<'a, I>(&mut self, content: I) -> Result<(), DisplayError>
    where
        I: Iterator<Item = (u16, u16, &'a Cell)>,
    {
        for (x, y, cell) in content {
            self.output
                .set_cursor_position(usize::from(x), usize::from(y))?;
            self.output
                .set_color(foreground(cell.fg), background(cell.bg))?;
            self.output
                .write_str(cell.symbol())
                .map_err(|_| DisplayError::Uefi(Status::DEVICE_ERROR.into()))?;
        }
        Ok(())
    }

    fn hide_cursor(&mut self) -> Result<(), DisplayError> {
        // not every console can hide its cursor
        let _ = self.output.enable_cursor(false);
        Ok(())
    }

    fn show_cursor(&mut self) -> Result<(), DisplayError> {
        let _ = self.output.enable_cursor(true);
        Ok(())
    }

    fn get_cursor_position(&mut self) -> Result<Position, DisplayError> {
        let (x, y) = self.output.cursor_position();
        Ok(Position::new(to_u16(x), to_u16(y)))
    }

    fn set_cursor_position<P: Into<Position>>(&mut self, position: P) -> Result<(), DisplayError> {
        let Position { x, y } = position.into();
        Ok(self
            .output
            .set_cursor_position(usize::from(x), usize::from(y))?)
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        Ok(self.output.clear()?)
    }

    fn clear_region(&mut self, clear_type: ClearType) -> Result<(), DisplayError> {
        if clear_type == ClearType::All {
            self.clear()
        } else {
            Err(DisplayError::Uefi(Status::UNSUPPORTED.into()))
        }
    }

    fn size(&self) -> Result<Size, DisplayError> {
        let mode = self
            .output
            .current_mode()?
            .ok_or(DisplayError::Uefi(Status::UNSUPPORTED.into()))?;
        Ok(Size::new(to_u16(mode.columns()), to_u16(mode.rows())))
    }

    fn window_size(&mut self) -> Result<WindowSize, DisplayError> {
        Ok(WindowSize {
            columns_rows: self.size()?,
            pixels: Size::new(0, 0),
        })
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}
