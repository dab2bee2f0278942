// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Drawing of menu screens and messages.
//!
//! A screen is drawn top to bottom as its title, its info lines, the entries, the countdown, and the hint lines.
//! Operating system entries and tools are listed in one column, tools after a blank line.

use alloc::{format, string::String, vec::Vec};

use bootscan_rs_core::menu::{EntryKind, MenuEntry, MenuScreen};
use ratatui_core::{
    layout::{Alignment, Constraint, Layout, Rect},
    terminal::Frame,
    text::{Line, Span, Text},
};
use ratatui_widgets::{
    block::Block,
    borders::Borders,
    list::{List, ListItem, ListState},
    paragraph::{Paragraph, Wrap},
};
use smallvec::SmallVec;

use crate::ui::theme::Theme;

pub mod console;
pub mod theme;

/// Converts a count of lines to a layout length.
fn lines(count: usize) -> u16 {
    u16::try_from(count).unwrap_or(u16::MAX)
}

/// The text of an entry in the list.
fn entry_label(entry: &MenuEntry) -> String {
    let prefix = entry.digit.map_or_else(|| String::from("   "), |digit| format!("{digit}. "));
    match entry.kind {
        EntryKind::Loader(_) | EntryKind::Legacy(_) => format!("{prefix}Boot {}", entry.title),
        _ => format!("{prefix}{}", entry.title),
    }
}

/// Where the selected entry of a screen ends up in the list, which has a blank line wherever the row changes.
fn list_position(screen: &MenuScreen, selected: usize) -> usize {
    let gaps = screen
        .iter()
        .zip(screen.iter().skip(1))
        .take(selected)
        .filter(|(a, b)| a.row != b.row)
        .count();
    selected + gaps
}

/// A screen and what is shown with it.
pub struct ScreenView<'a> {
    /// The screen.
    pub screen: &'a MenuScreen,

    /// The selected entry.
    pub selected: usize,

    /// Seconds left on the countdown.
    pub countdown: Option<u32>,
}

impl ScreenView<'_> {
    /// Draws the screen.
    pub fn render(&self, frame: &mut Frame, theme: &Theme) {
        let screen = self.screen;
        let info = if screen.info_lines.is_empty() { 0 } else { screen.info_lines.len() + 1 };
        let areas = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(lines(info)),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(lines(screen.hints.len())),
        ])
        .split(frame.area());

        frame.render_widget(
            Line::styled(screen.title.as_str(), theme.accent).alignment(Alignment::Center),
            areas[0],
        );

        let info_text: Text = screen
            .info_lines
            .iter()
            .map(|line| Line::styled(line.as_str(), theme.base))
            .collect();
        frame.render_widget(Paragraph::new(info_text).wrap(Wrap { trim: false }), areas[1]);

        self.render_entries(frame, areas[2], theme);

        if let Some(seconds) = self.countdown {
            let text = screen.timeout_text.as_deref().unwrap_or("Automatic boot");
            frame.render_widget(
                Line::styled(format!("{text} in {seconds} seconds"), theme.base).alignment(Alignment::Center),
                areas[3],
            );
        }

        let hints: Text = screen
            .hints
            .iter()
            .map(|hint| Line::styled(hint.as_str(), theme.accent).alignment(Alignment::Center))
            .collect();
        frame.render_widget(hints, areas[4]);
    }

    /// Draws the entries, with a blank line between operating systems and tools.
    fn render_entries(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let mut items: Vec<ListItem> = Vec::with_capacity(self.screen.len() + 1);
        let mut row = None;
        for entry in self.screen.iter() {
            if row.is_some_and(|row| row != entry.row) {
                items.push(ListItem::new(""));
            }
            row = Some(entry.row);
            items.push(ListItem::new(entry_label(entry)));
        }

        let columns = Layout::horizontal([
            Constraint::Percentage(15),
            Constraint::Percentage(70),
            Constraint::Percentage(15),
        ])
        .split(area);

        let list = List::new(items)
            .style(theme.base)
            .highlight_style(theme.highlight)
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(list_position(self.screen, self.selected)));
        frame.render_stateful_widget(list, columns[1], &mut state);
    }
}

/// Draws a message box.
pub fn render_message(frame: &mut Frame, theme: &Theme, title: &str, message: &[String]) {
    let mut text: SmallVec<[Line; 16]> = message
        .iter()
        .map(|line| Line::styled(line.as_str(), theme.base))
        .collect();
    text.push(Line::default());
    text.push(Line::from(Span::styled("Press any key to continue", theme.accent)));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(Line::styled(title, theme.error))
        .style(theme.base);
    frame.render_widget(
        Paragraph::new(text.into_iter().collect::<Text>())
            .wrap(Wrap { trim: false })
            .block(block),
        frame.area(),
    );
}

