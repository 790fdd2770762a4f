//! The embedded single-line input field.
//!
//! Every prompt (filter, search, opts, settings, edit-cell, pipe, save-as)
//! runs this editor. It is a pure state machine over an enumerated event
//! alphabet; the interactive loop in `picker.rs` only translates key
//! presses to events and paints the line. That keeps the whole editing
//! grammar testable without a terminal.

use crate::keymap::KeyPress;
use crossterm::event::{KeyCode, KeyModifiers};
use std::collections::HashMap;
use std::path::Path;

/// The event alphabet of the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Insert(char),
    Left,
    Right,
    Home,
    End,
    Backspace,
    DeleteForward,
    /// `Ctrl+U`: kill to line start.
    KillToStart,
    /// `Ctrl+K`: kill to line end.
    KillToEnd,
    /// `Ctrl+W`: kill the previous word.
    KillPrevWord,
    /// `Ctrl+Y`: insert the most recent kill.
    Yank,
    /// `Alt+Y`: replace the last yank with the next kill-ring entry.
    YankRotate,
    HistoryPrev,
    HistoryNext,
    /// `Ctrl+R` followed by a register name inserts that register.
    RegisterPrefix,
    Complete,
    Accept,
    Cancel,
}

/// What a handled event produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    /// Keep editing.
    Pending,
    /// Return pressed: the final text.
    Accepted(String),
    /// Escape pressed: the text the field started with.
    Cancelled(String),
}

/// Context handed to completion sources.
#[derive(Debug, Clone)]
pub struct CompletionContext {
    /// The whole field text.
    pub text: String,
    /// Char position of the cursor.
    pub cursor: usize,
}

/// A provider of completion candidates. The input field does not know what
/// kind of completions a source yields.
pub trait CompletionSource {
    fn candidates(&self, prefix: &str, context: &CompletionContext) -> Vec<String>;
}

/// Completes filesystem paths when the token under the cursor looks like
/// one.
#[derive(Debug, Default)]
pub struct PathCompletion;

impl CompletionSource for PathCompletion {
    fn candidates(&self, prefix: &str, _context: &CompletionContext) -> Vec<String> {
        if prefix.is_empty() || !(prefix.contains('/') || prefix.starts_with('~')) {
            return Vec::new();
        }
        let expanded = expand_user(prefix);
        let (dir, stem) = match expanded.rfind('/') {
            Some(idx) => (&expanded[..=idx], &expanded[idx + 1..]),
            None => ("./", expanded.as_str()),
        };
        let Ok(entries) = std::fs::read_dir(Path::new(dir)) else {
            return Vec::new();
        };
        let mut found: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.starts_with(stem) {
                    return None;
                }
                let mut candidate = format!("{dir}{name}");
                if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    candidate.push('/');
                }
                Some(candidate)
            })
            .collect();
        found.sort();
        found
    }
}

fn expand_user(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.to_string_lossy(), rest);
        }
    }
    path.to_string()
}

/// Completes from a supplied word list (cell words, shell commands,
/// settings tokens).
#[derive(Debug, Default)]
pub struct WordCompletion {
    pub words: Vec<String>,
}

impl WordCompletion {
    pub fn new(words: Vec<String>) -> Self {
        WordCompletion { words }
    }
}

impl CompletionSource for WordCompletion {
    fn candidates(&self, prefix: &str, _context: &CompletionContext) -> Vec<String> {
        if prefix.is_empty() {
            return Vec::new();
        }
        self.words
            .iter()
            .filter(|word| word.starts_with(prefix) && word.as_str() != prefix)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
struct CompletionCycle {
    candidates: Vec<String>,
    index: usize,
    /// Char position where the completed token starts.
    token_start: usize,
}

/// Position and span of the text inserted by the last yank, for `Alt+Y`.
#[derive(Debug, Clone, Copy)]
struct YankState {
    start: usize,
    len: usize,
    ring_index: usize,
}

/// The line editor.
pub struct InputField {
    text: Vec<char>,
    cursor: usize,
    original: String,
    kill_ring: Vec<String>,
    last_yank: Option<YankState>,
    registers: HashMap<char, String>,
    history: Vec<String>,
    history_pos: Option<usize>,
    stash: String,
    sources: Vec<Box<dyn CompletionSource>>,
    completion: Option<CompletionCycle>,
    pending_register: bool,
}

impl InputField {
    pub fn new(initial: &str) -> Self {
        InputField {
            text: initial.chars().collect(),
            cursor: initial.chars().count(),
            original: initial.to_string(),
            kill_ring: Vec::new(),
            last_yank: None,
            registers: HashMap::new(),
            history: Vec::new(),
            history_pos: None,
            stash: String::new(),
            sources: Vec::new(),
            completion: None,
            pending_register: false,
        }
    }

    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.history = history;
        self
    }

    pub fn with_registers(mut self, registers: HashMap<char, String>) -> Self {
        self.registers = registers;
        self
    }

    pub fn with_source(mut self, source: Box<dyn CompletionSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Maps a key press to an editor event. Keys with no meaning in the
    /// field return `None`.
    pub fn event_for_key(key: KeyPress) -> Option<InputEvent> {
        if key.mods.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('b') => Some(InputEvent::Left),
                KeyCode::Char('f') => Some(InputEvent::Right),
                KeyCode::Char('a') => Some(InputEvent::Home),
                KeyCode::Char('e') => Some(InputEvent::End),
                KeyCode::Char('d') => Some(InputEvent::DeleteForward),
                KeyCode::Char('u') => Some(InputEvent::KillToStart),
                KeyCode::Char('k') => Some(InputEvent::KillToEnd),
                KeyCode::Char('w') => Some(InputEvent::KillPrevWord),
                KeyCode::Char('y') => Some(InputEvent::Yank),
                KeyCode::Char('r') => Some(InputEvent::RegisterPrefix),
                _ => None,
            };
        }
        if key.mods.contains(KeyModifiers::ALT) {
            return match key.code {
                KeyCode::Char('y') => Some(InputEvent::YankRotate),
                _ => None,
            };
        }
        match key.code {
            KeyCode::Char(ch) => Some(InputEvent::Insert(ch)),
            KeyCode::Left => Some(InputEvent::Left),
            KeyCode::Right => Some(InputEvent::Right),
            KeyCode::Home => Some(InputEvent::Home),
            KeyCode::End => Some(InputEvent::End),
            KeyCode::Backspace => Some(InputEvent::Backspace),
            KeyCode::Delete => Some(InputEvent::DeleteForward),
            KeyCode::Up => Some(InputEvent::HistoryPrev),
            KeyCode::Down => Some(InputEvent::HistoryNext),
            KeyCode::Tab => Some(InputEvent::Complete),
            KeyCode::Enter => Some(InputEvent::Accept),
            KeyCode::Esc => Some(InputEvent::Cancel),
            _ => None,
        }
    }

    /// Feeds one event through the state machine.
    pub fn handle(&mut self, event: InputEvent) -> FieldOutcome {
        // A pending register prefix consumes the next inserted character
        // as the register name.
        if self.pending_register {
            self.pending_register = false;
            if let InputEvent::Insert(name) = event {
                if let Some(value) = self.registers.get(&name).cloned() {
                    self.insert_str(&value);
                }
                return FieldOutcome::Pending;
            }
        }

        // Any event but a yank ends the yank chain; any event but
        // Complete ends the completion cycle.
        if !matches!(event, InputEvent::Yank | InputEvent::YankRotate) {
            self.last_yank = None;
        }
        if !matches!(event, InputEvent::Complete) {
            self.completion = None;
        }

        match event {
            InputEvent::Insert(ch) => {
                self.text.insert(self.cursor, ch);
                self.cursor += 1;
            }
            InputEvent::Left => self.cursor = self.cursor.saturating_sub(1),
            InputEvent::Right => self.cursor = (self.cursor + 1).min(self.text.len()),
            InputEvent::Home => self.cursor = 0,
            InputEvent::End => self.cursor = self.text.len(),
            InputEvent::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.text.remove(self.cursor);
                }
            }
            InputEvent::DeleteForward => {
                if self.cursor < self.text.len() {
                    self.text.remove(self.cursor);
                }
            }
            InputEvent::KillToStart => {
                let killed: String = self.text[..self.cursor].iter().collect();
                if !killed.is_empty() {
                    self.kill_ring.insert(0, killed);
                }
                self.text.drain(..self.cursor);
                self.cursor = 0;
            }
            InputEvent::KillToEnd => {
                let killed: String = self.text[self.cursor..].iter().collect();
                if !killed.is_empty() {
                    self.kill_ring.insert(0, killed);
                }
                self.text.truncate(self.cursor);
            }
            InputEvent::KillPrevWord => {
                let start = self.prev_word_start();
                let killed: String = self.text[start..self.cursor].iter().collect();
                if !killed.is_empty() {
                    self.kill_ring.insert(0, killed);
                }
                self.text.drain(start..self.cursor);
                self.cursor = start;
            }
            InputEvent::Yank => {
                if let Some(span) = self.kill_ring.first().cloned() {
                    let start = self.cursor;
                    self.insert_str(&span);
                    self.last_yank = Some(YankState {
                        start,
                        len: span.chars().count(),
                        ring_index: 0,
                    });
                }
            }
            InputEvent::YankRotate => {
                if let Some(yank) = self.last_yank {
                    if !self.kill_ring.is_empty() {
                        let next = (yank.ring_index + 1) % self.kill_ring.len();
                        let replacement = self.kill_ring[next].clone();
                        self.text.drain(yank.start..yank.start + yank.len);
                        self.cursor = yank.start;
                        self.insert_str(&replacement);
                        self.last_yank = Some(YankState {
                            start: yank.start,
                            len: replacement.chars().count(),
                            ring_index: next,
                        });
                    }
                }
            }
            InputEvent::HistoryPrev => self.history_step(-1),
            InputEvent::HistoryNext => self.history_step(1),
            InputEvent::RegisterPrefix => self.pending_register = true,
            InputEvent::Complete => self.complete(),
            InputEvent::Accept => return FieldOutcome::Accepted(self.text()),
            InputEvent::Cancel => return FieldOutcome::Cancelled(self.original.clone()),
        }
        FieldOutcome::Pending
    }

    fn insert_str(&mut self, value: &str) {
        for ch in value.chars() {
            self.text.insert(self.cursor, ch);
            self.cursor += 1;
        }
    }

    fn prev_word_start(&self) -> usize {
        let mut i = self.cursor;
        while i > 0 && self.text[i - 1].is_whitespace() {
            i -= 1;
        }
        while i > 0 && !self.text[i - 1].is_whitespace() {
            i -= 1;
        }
        i
    }

    fn history_step(&mut self, delta: i64) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.history_pos {
            None if delta < 0 => {
                self.stash = self.text();
                Some(self.history.len() - 1)
            }
            None => None,
            Some(pos) => {
                let stepped = pos as i64 + delta;
                if stepped < 0 {
                    Some(0)
                } else if stepped as usize >= self.history.len() {
                    // Stepped past the newest entry: restore the stash.
                    self.history_pos = None;
                    self.set_text(self.stash.clone());
                    return;
                } else {
                    Some(stepped as usize)
                }
            }
        };
        if let Some(pos) = next {
            self.history_pos = Some(pos);
            self.set_text(self.history[pos].clone());
        }
    }

    fn set_text(&mut self, value: String) {
        self.text = value.chars().collect();
        self.cursor = self.text.len();
    }

    /// The token being completed: from the last whitespace to the cursor.
    fn token_bounds(&self) -> (usize, String) {
        let start = self.prev_word_start();
        let token: String = self.text[start..self.cursor].iter().collect();
        (start, token)
    }

    fn complete(&mut self) {
        match &mut self.completion {
            Some(cycle) => {
                // Repeated Tab advances through the candidates.
                cycle.index = (cycle.index + 1) % cycle.candidates.len();
                let token_start = cycle.token_start;
                let candidate = cycle.candidates[cycle.index].clone();
                self.replace_token(token_start, &candidate);
            }
            None => {
                let (start, token) = self.token_bounds();
                let context = CompletionContext {
                    text: self.text(),
                    cursor: self.cursor,
                };
                let mut candidates: Vec<String> = Vec::new();
                for source in &self.sources {
                    candidates.extend(source.candidates(&token, &context));
                }
                candidates.dedup();
                if candidates.is_empty() {
                    return;
                }
                let candidate = candidates[0].clone();
                self.completion = Some(CompletionCycle {
                    candidates,
                    index: 0,
                    token_start: start,
                });
                self.replace_token(start, &candidate);
            }
        }
    }

    fn replace_token(&mut self, token_start: usize, replacement: &str) {
        self.text.drain(token_start..self.cursor);
        self.cursor = token_start;
        self.insert_str(replacement);
        // Keep the cycle's token start valid for the next rotation.
        if let Some(cycle) = &mut self.completion {
            cycle.token_start = token_start;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(field: &mut InputField, text: &str) {
        for ch in text.chars() {
            field.handle(InputEvent::Insert(ch));
        }
    }

    #[test]
    fn insert_and_move() {
        let mut field = InputField::new("");
        feed(&mut field, "hello");
        field.handle(InputEvent::Home);
        field.handle(InputEvent::Right);
        field.handle(InputEvent::Insert('x'));
        assert_eq!(field.text(), "hxello");
        field.handle(InputEvent::End);
        assert_eq!(field.cursor(), 6);
    }

    #[test]
    fn backspace_and_delete_forward() {
        let mut field = InputField::new("abc");
        field.handle(InputEvent::Backspace);
        assert_eq!(field.text(), "ab");
        field.handle(InputEvent::Home);
        field.handle(InputEvent::DeleteForward);
        assert_eq!(field.text(), "b");
    }

    #[test]
    fn kill_to_start_and_end() {
        let mut field = InputField::new("Hello World");
        field.handle(InputEvent::Home);
        for _ in 0..5 {
            field.handle(InputEvent::Right);
        }
        field.handle(InputEvent::KillToEnd);
        assert_eq!(field.text(), "Hello");
        field.handle(InputEvent::KillToStart);
        assert_eq!(field.text(), "");
        // Both spans are on the kill ring, most recent first.
        field.handle(InputEvent::Yank);
        assert_eq!(field.text(), "Hello");
    }

    #[test]
    fn kill_word_then_yank() {
        let mut field = InputField::new("Hello World Test");
        field.handle(InputEvent::KillPrevWord);
        assert_eq!(field.text(), "Hello World ");
        field.handle(InputEvent::Yank);
        assert_eq!(field.text(), "Hello World Test");
    }

    #[test]
    fn yank_rotate_cycles_kill_ring() {
        let mut field = InputField::new("");
        feed(&mut field, "one");
        field.handle(InputEvent::KillToStart); // ring: [one]
        feed(&mut field, "two");
        field.handle(InputEvent::KillToStart); // ring: [two, one]
        field.handle(InputEvent::Yank);
        assert_eq!(field.text(), "two");
        field.handle(InputEvent::YankRotate);
        assert_eq!(field.text(), "one");
        // Rotating wraps back to the most recent kill.
        field.handle(InputEvent::YankRotate);
        assert_eq!(field.text(), "two");
    }

    #[test]
    fn history_cycles_and_restores_stash() {
        let mut field =
            InputField::new("").with_history(vec!["first".into(), "second".into()]);
        feed(&mut field, "draft");
        field.handle(InputEvent::HistoryPrev);
        assert_eq!(field.text(), "second");
        field.handle(InputEvent::HistoryPrev);
        assert_eq!(field.text(), "first");
        field.handle(InputEvent::HistoryNext);
        assert_eq!(field.text(), "second");
        field.handle(InputEvent::HistoryNext);
        assert_eq!(field.text(), "draft");
    }

    #[test]
    fn accept_and_cancel_outcomes() {
        let mut field = InputField::new("start");
        feed(&mut field, "ed");
        assert_eq!(
            field.handle(InputEvent::Accept),
            FieldOutcome::Accepted("started".into())
        );

        let mut field = InputField::new("before");
        feed(&mut field, "xxx");
        assert_eq!(
            field.handle(InputEvent::Cancel),
            FieldOutcome::Cancelled("before".into())
        );
    }

    #[test]
    fn register_insertion() {
        let registers: HashMap<char, String> =
            [('*', "cell-value".to_string())].into_iter().collect();
        let mut field = InputField::new("x=").with_registers(registers);
        field.handle(InputEvent::End);
        field.handle(InputEvent::RegisterPrefix);
        field.handle(InputEvent::Insert('*'));
        assert_eq!(field.text(), "x=cell-value");
        // Unknown registers insert nothing.
        field.handle(InputEvent::RegisterPrefix);
        field.handle(InputEvent::Insert('z'));
        assert_eq!(field.text(), "x=cell-value");
    }

    #[test]
    fn word_completion_cycles_candidates() {
        let words = WordCompletion::new(vec![
            "foobar".into(),
            "foobaz".into(),
            "other".into(),
        ]);
        let mut field = InputField::new("foo").with_source(Box::new(words));
        field.handle(InputEvent::Complete);
        assert_eq!(field.text(), "foobar");
        field.handle(InputEvent::Complete);
        assert_eq!(field.text(), "foobaz");
        field.handle(InputEvent::Complete);
        assert_eq!(field.text(), "foobar");
        // Any other event ends the cycle.
        field.handle(InputEvent::Insert('!'));
        assert_eq!(field.text(), "foobar!");
    }

    #[test]
    fn path_completion_lists_matching_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("alpha.txt"), b"x").expect("write");
        std::fs::write(dir.path().join("alpine.txt"), b"x").expect("write");
        std::fs::create_dir(dir.path().join("alps")).expect("mkdir");

        let prefix = format!("{}/al", dir.path().to_string_lossy());
        let context = CompletionContext {
            text: prefix.clone(),
            cursor: prefix.chars().count(),
        };
        let candidates = PathCompletion.candidates(&prefix, &context);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().any(|c| c.ends_with("alps/")));
    }

    #[test]
    fn event_mapping_covers_editing_grammar() {
        assert_eq!(
            InputField::event_for_key(KeyPress::ctrl('a')),
            Some(InputEvent::Home)
        );
        assert_eq!(
            InputField::event_for_key(KeyPress::ctrl('w')),
            Some(InputEvent::KillPrevWord)
        );
        assert_eq!(
            InputField::event_for_key(KeyPress::alt('y')),
            Some(InputEvent::YankRotate)
        );
        assert_eq!(
            InputField::event_for_key(KeyPress::plain(KeyCode::Tab)),
            Some(InputEvent::Complete)
        );
        assert_eq!(InputField::event_for_key(KeyPress::ctrl('x')), None);
    }
}
