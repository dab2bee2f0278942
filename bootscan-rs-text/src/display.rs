// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The text console [`MenuDisplay`].
//!
//! Keys of the main menu:
//!
//! - arrows, Home and End move the selection;
//! - Enter boots the selected entry;
//! - Insert, Tab or F2 open the boot options of the selected entry;
//! - Delete or `-` hide the selected entry;
//! - Escape rescans;
//! - a digit or the shortcut letter of an entry boots it right away.

use alloc::{format, string::String};

use bootscan_rs_core::{
    boot::{MenuDisplay, MenuOutcome},
    menu::{Action, Choice, EntryKind, MenuScreen},
    system::helper::{create_timer, locate_protocol},
};
use log::error;
use ratatui_core::terminal::Terminal;
use uefi::{
    Event,
    boot::{self, ScopedProtocol, TimerTrigger},
    proto::console::text::{Input, Key, ScanCode},
};

use crate::{
    DisplayError,
    ui::{ScreenView, console::ConsoleBackend, render_message, theme::Theme},
};

/// The countdown interval in 100ns units.
const TICK: u64 = 10_000_000; // 1 second

/// What woke up the display.
enum Wake {
    /// A key was pressed.
    Key(Key),

    /// A second passed.
    Tick,
}

/// Where a key moves the selection of a list.
enum Move {
    /// To this entry.
    To(usize),

    /// The key does not move the selection.
    Stay,
}

/// Moves the selection of a list of `len` entries.
fn move_selection(selected: usize, len: usize, key: &Key) -> Move {
    let last = len.saturating_sub(1);
    match key {
        Key::Special(ScanCode::UP) => Move::To(selected.saturating_sub(1)),
        Key::Special(ScanCode::DOWN) => Move::To((selected + 1).min(last)),
        Key::Special(ScanCode::HOME | ScanCode::PAGE_UP) => Move::To(0),
        Key::Special(ScanCode::END | ScanCode::PAGE_DOWN) => Move::To(last),
        _ => Move::Stay,
    }
}

/// Converts a key to a character, if it is printable.
fn printable(key: &Key) -> Option<char> {
    match key {
        Key::Printable(c) => Some(char::from(*c)),
        Key::Special(_) => None,
    }
}

/// If a key opens the boot options of an entry.
fn opens_options(key: &Key) -> bool {
    matches!(key, Key::Special(ScanCode::INSERT | ScanCode::FUNCTION_2)) || printable(key) == Some('\t')
}

/// The menu on the UEFI text console.
pub struct TextDisplay {
    /// The ratatui terminal.
    terminal: Terminal<ConsoleBackend>,

    /// The keyboard.
    input: ScopedProtocol<Input>,

    /// The key event and the countdown timer.
    events: [Event; 2],

    /// The colors.
    theme: Theme,
}

impl TextDisplay {
    /// Sets up the console and the keyboard.
    ///
    /// # Errors
    ///
    /// May return an `Error` if there is no console or keyboard, or the timer could not be created.
    pub fn new() -> Result<Self, DisplayError> {
        let theme = Theme::new();
        let mut terminal = Terminal::new(ConsoleBackend::new()?)?;
        if let (Some(fg), Some(bg)) = (theme.base.fg, theme.base.bg) {
            terminal.backend_mut().set_plain_colors(fg, bg);
        }
        terminal.clear()?;

        let input = locate_protocol::<Input>()?;
        let events = [
            input.wait_for_key_event().ok_or(DisplayError::InputClosed)?,
            create_timer(TimerTrigger::Periodic(TICK))?,
        ];

        Ok(Self {
            terminal,
            input,
            events,
            theme,
        })
    }

    /// Waits for a key or a tick of the timer.
    fn wait(&mut self) -> Result<Wake, DisplayError> {
        loop {
            let woken = boot::wait_for_event(&mut self.events)
                .map_err(|e| DisplayError::Uefi(e.to_err_without_payload()))?;
            if woken == 1 {
                return Ok(Wake::Tick);
            }
            if let Some(key) = self.input.read_key()? {
                return Ok(Wake::Key(key));
            }
        }
    }

    /// Waits for a key.
    fn wait_for_key(&mut self) -> Result<Key, DisplayError> {
        loop {
            if let Wake::Key(key) = self.wait()? {
                return Ok(key);
            }
        }
    }

    /// Draws a screen.
    fn draw(&mut self, view: &ScreenView) -> Result<(), DisplayError> {
        let theme = self.theme;
        self.terminal.draw(|frame| view.render(frame, &theme))?;
        Ok(())
    }

    /// Shows a screen and handles its keys.
    fn show(&mut self, screen: &MenuScreen) -> Result<MenuOutcome, DisplayError> {
        self.terminal.clear()?;
        if screen.is_empty() {
            self.draw(&ScreenView {
                screen,
                selected: 0,
                countdown: None,
            })?;
            self.wait_for_key()?;
            return Ok(MenuOutcome::Escape);
        }

        let mut selected = screen.default.min(screen.len() - 1);
        let mut countdown = screen.timeout;
        loop {
            if countdown == Some(0) {
                return Ok(MenuOutcome::Timeout);
            }
            self.draw(&ScreenView {
                screen,
                selected,
                countdown,
            })?;

            let key = match self.wait()? {
                Wake::Tick => {
                    countdown = countdown.map(|seconds| seconds.saturating_sub(1));
                    continue;
                }
                Wake::Key(key) => key,
            };
            countdown = None;

            if let Move::To(index) = move_selection(selected, screen.len(), &key) {
                selected = index;
                continue;
            }

            if opens_options(&key) {
                if let Some(sub) = screen.get(selected).and_then(|entry| entry.subscreen.as_deref())
                    && let Some(index) = self.show_options(sub)?
                {
                    return Ok(MenuOutcome::Chosen(Choice::sub(selected, index)));
                }
                self.terminal.clear()?;
                continue;
            }

            match (&key, printable(&key)) {
                (Key::Special(ScanCode::ESCAPE), _) => return Ok(MenuOutcome::Escape),
                (Key::Special(ScanCode::DELETE), _) | (_, Some('-')) => return Ok(MenuOutcome::Hide(selected)),
                (_, Some('\r' | ' ')) => return Ok(MenuOutcome::Chosen(Choice::main(selected))),
                (_, Some(c)) => {
                    if let Some(index) = screen.find_shortcut(c) {
                        return Ok(MenuOutcome::Chosen(Choice::main(index)));
                    }
                }
                _ => (),
            }
        }
    }

    /// Shows the boot options of an entry. Returns the picked option, or [`None`] to go back.
    fn show_options(&mut self, sub: &MenuScreen) -> Result<Option<usize>, DisplayError> {
        self.terminal.clear()?;
        let mut selected = 0;
        loop {
            self.draw(&ScreenView {
                screen: sub,
                selected,
                countdown: None,
            })?;

            let key = self.wait_for_key()?;
            if let Move::To(index) = move_selection(selected, sub.len(), &key) {
                selected = index;
                continue;
            }

            match (&key, printable(&key)) {
                (Key::Special(ScanCode::ESCAPE), _) => return Ok(None),
                (_, Some('\r' | ' ')) => {
                    let back = sub
                        .get(selected)
                        .is_none_or(|entry| entry.kind == EntryKind::Action(Action::Return));
                    return Ok((!back).then_some(selected));
                }
                _ => (),
            }
        }
    }
}

impl MenuDisplay for TextDisplay {
    /// Shows a screen.
    ///
    /// If the console or the keyboard fail, the countdown is treated as expired, so the default entry still boots.
    fn run(&mut self, screen: &MenuScreen) -> MenuOutcome {
        self.show(screen).unwrap_or_else(|e| {
            error!("Menu failed: {e}");
            MenuOutcome::Timeout
        })
    }

    fn message(&mut self, title: &str, lines: &[String]) {
        let theme = self.theme;
        let drawn = self
            .terminal
            .draw(|frame| render_message(frame, &theme, title, lines))
            .map(|_| ());
        let shown = drawn.and_then(|()| self.wait_for_key().map(|_| ()));
        if let Err(e) = shown {
            error!("Could not show message {title}: {e}");
        }
    }

    fn before_launch(&mut self, title: &str, graphics: bool) {
        let backend = self.terminal.backend_mut();
        if graphics {
            backend.print_plain(&[]);
        } else {
            backend.print_plain(&[format!("Starting {title}").as_str(), ""]);
        }
    }
}
