//! Thin terminal abstraction over crossterm.
//!
//! The engine never talks to crossterm directly: it sees a size, a
//! `put(y, x, text, style)` call and a key poll. Resize events are decoded
//! to the [`KeyPress::RESIZE`] pseudo-key so the dispatcher and remap
//! tables can treat them like ordinary keys.

use crate::{
    RowpickError, RowpickResult,
    keymap::KeyPress,
    theme::Style,
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
        enable_raw_mode,
    },
};
use std::io::{Stdout, Write, stdout};
use std::time::Duration;

/// Raw-mode terminal owning the alternate screen for the picker's lifetime.
pub struct Terminal {
    out: Stdout,
    active: bool,
}

impl Terminal {
    /// Enters raw mode and the alternate screen with a hidden cursor.
    pub fn new() -> RowpickResult<Self> {
        enable_raw_mode().map_err(|e| RowpickError::Terminal(e.to_string()))?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen, Hide)
            .map_err(|e| RowpickError::Terminal(e.to_string()))?;
        Ok(Terminal { out, active: true })
    }

    /// Terminal size as `(height, width)` in cells.
    pub fn size(&self) -> (usize, usize) {
        match crossterm::terminal::size() {
            Ok((w, h)) => (h as usize, w as usize),
            Err(_) => (24, 80),
        }
    }

    /// Clears the whole screen.
    pub fn clear(&mut self) -> RowpickResult<()> {
        queue!(self.out, Clear(ClearType::All)).map_err(|e| RowpickError::Terminal(e.to_string()))
    }

    /// Writes `text` at row `y`, column `x` with `style`. Out-of-screen
    /// writes are the renderer's responsibility to avoid.
    pub fn put(&mut self, y: usize, x: usize, text: &str, style: Style) -> RowpickResult<()> {
        queue!(
            self.out,
            MoveTo(x as u16, y as u16),
            SetForegroundColor(style.fg),
            SetBackgroundColor(style.bg),
        )
        .map_err(|e| RowpickError::Terminal(e.to_string()))?;
        if style.bold {
            queue!(self.out, SetAttribute(Attribute::Bold))
                .map_err(|e| RowpickError::Terminal(e.to_string()))?;
        }
        if style.underline {
            queue!(self.out, SetAttribute(Attribute::Underlined))
                .map_err(|e| RowpickError::Terminal(e.to_string()))?;
        }
        queue!(
            self.out,
            Print(text),
            SetAttribute(Attribute::Reset),
            ResetColor
        )
        .map_err(|e| RowpickError::Terminal(e.to_string()))
    }

    /// Flushes all queued draw commands to the screen.
    pub fn flush(&mut self) -> RowpickResult<()> {
        self.out
            .flush()
            .map_err(|e| RowpickError::Terminal(e.to_string()))
    }

    /// Places the hardware cursor (used by the input field) and shows it.
    pub fn show_cursor_at(&mut self, y: usize, x: usize) -> RowpickResult<()> {
        execute!(self.out, MoveTo(x as u16, y as u16), Show)
            .map_err(|e| RowpickError::Terminal(e.to_string()))
    }

    pub fn hide_cursor(&mut self) -> RowpickResult<()> {
        execute!(self.out, Hide).map_err(|e| RowpickError::Terminal(e.to_string()))
    }

    /// Waits up to `timeout` for a key. Returns `None` on timeout.
    ///
    /// Key releases and repeats from the kitty protocol are dropped; a
    /// resize is returned as [`KeyPress::RESIZE`].
    pub fn poll_key(&mut self, timeout: Duration) -> RowpickResult<Option<KeyPress>> {
        if !event::poll(timeout).map_err(|e| RowpickError::Terminal(e.to_string()))? {
            return Ok(None);
        }
        match event::read().map_err(|e| RowpickError::Terminal(e.to_string()))? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                Ok(Some(normalize(key.code, key.modifiers)))
            }
            Event::Resize(_, _) => Ok(Some(KeyPress::RESIZE)),
            _ => Ok(None),
        }
    }

    /// Leaves the alternate screen, e.g. around a spawned subprocess.
    pub fn suspend(&mut self) -> RowpickResult<()> {
        disable_raw_mode().map_err(|e| RowpickError::Terminal(e.to_string()))?;
        execute!(self.out, LeaveAlternateScreen, Show)
            .map_err(|e| RowpickError::Terminal(e.to_string()))
    }

    /// Re-enters raw mode and the alternate screen after `suspend`.
    pub fn resume(&mut self) -> RowpickResult<()> {
        enable_raw_mode().map_err(|e| RowpickError::Terminal(e.to_string()))?;
        execute!(self.out, EnterAlternateScreen, Hide)
            .map_err(|e| RowpickError::Terminal(e.to_string()))
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.active {
            let _ = disable_raw_mode();
            let _ = execute!(self.out, LeaveAlternateScreen, Show);
        }
    }
}

/// Normalizes a crossterm key event into a [`KeyPress`].
///
/// SHIFT is stripped for character keys (the character itself already
/// carries the case), so `G` always decodes to `Char('G')` with no
/// modifiers regardless of the backend.
pub fn normalize(code: KeyCode, mods: KeyModifiers) -> KeyPress {
    let mods = match code {
        KeyCode::Char(_) => mods.difference(KeyModifiers::SHIFT),
        _ => mods,
    };
    KeyPress { code, mods }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_is_stripped_for_char_keys() {
        let key = normalize(KeyCode::Char('G'), KeyModifiers::SHIFT);
        assert_eq!(key, KeyPress::char('G'));
        let key = normalize(
            KeyCode::Char('a'),
            KeyModifiers::CONTROL | KeyModifiers::SHIFT,
        );
        assert_eq!(key, KeyPress::ctrl('a'));
    }

    #[test]
    fn shift_survives_on_non_char_keys() {
        let key = normalize(KeyCode::Delete, KeyModifiers::SHIFT);
        assert_eq!(key.mods, KeyModifiers::SHIFT);
    }
}
