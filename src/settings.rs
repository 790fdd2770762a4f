//! The settings command language.
//!
//! A whitespace-separated sequence of tokens, evaluated left to right, that
//! mutates UI toggles, column layout and data (`!3`, `s2`, `th1`,
//! `hl,error,0,10`, `arb`, ...). Parsing is separated from application so
//! the dispatcher can replay the last command string for `redo`.

use crate::highlight::{Highlight, HighlightField, HighlightKind};
use crate::theme;

/// One parsed settings command.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    /// `!<n>` or `!<n,n,...>`: toggle column visibility.
    ToggleColumns(Vec<usize>),
    /// `!r`: toggle auto-refresh.
    ToggleAutoRefresh,
    /// `!h`, `nhl`, `nohl`, `nohighlights`: toggle highlight visibility.
    ToggleHighlights,
    /// `s<n>`: set the sort column and resort.
    SortColumn(usize),
    /// `ct`: centre the column set in the terminal.
    CentreTerminal,
    /// `cc`: centre values in cells.
    CentreCells,
    /// `cv`: centre rows vertically.
    CentreVertical,
    /// `arb` / `ara`: insert an empty row before/after the cursor.
    AddRowBefore,
    AddRowAfter,
    /// `acb` / `aca`: insert an empty column before/after the focus.
    AddColumnBefore,
    AddColumnAfter,
    /// `ir<n>` / `ir`: insert an empty row at index n (cursor without n).
    InsertRow(Option<usize>),
    /// `ic<n>` / `ic`: insert an empty column at index n.
    InsertColumn(Option<usize>),
    /// `modes`, `cell`, `rh`, `header`, `footer`: toggle a UI region.
    ToggleModes,
    ToggleCellCursor,
    ToggleRowHeader,
    ToggleHeader,
    ToggleFooter,
    /// `ft` / `ft<n>`: cycle or select the footer style.
    FooterStyle(Option<usize>),
    /// `cwd=<path>`: change the working directory.
    ChangeDir(String),
    /// `hl,<pattern>[,<field>[,<color>]]`: append a highlight record.
    AddHighlight(Highlight),
    /// `th` / `th<n>`: cycle or select the colour theme.
    Theme(Option<usize>),
}

/// Result of tokenizing a settings string. `complete` is false when an
/// unknown token aborted the remainder; the commands parsed before it are
/// still applied, but the string is not eligible for `redo`.
#[derive(Debug, Clone, Default)]
pub struct ParsedSettings {
    pub commands: Vec<Setting>,
    pub complete: bool,
}

/// Tokenizes a settings string, left to right, stopping at the first
/// unknown token.
pub fn parse_settings(input: &str) -> ParsedSettings {
    let mut parsed = ParsedSettings {
        commands: Vec::new(),
        complete: true,
    };

    for token in input.split_whitespace() {
        let command = parse_token(token);
        match command {
            Some(cmd) => parsed.commands.push(cmd),
            None => {
                tracing::debug!("parse_settings: unknown token {token:?}, aborting");
                parsed.complete = false;
                break;
            }
        }
    }
    parsed
}

fn parse_token(token: &str) -> Option<Setting> {
    match token {
        "nhl" | "nohl" | "nohighlights" => return Some(Setting::ToggleHighlights),
        "ct" => return Some(Setting::CentreTerminal),
        "cc" => return Some(Setting::CentreCells),
        "cv" => return Some(Setting::CentreVertical),
        "arb" => return Some(Setting::AddRowBefore),
        "ara" => return Some(Setting::AddRowAfter),
        "acb" => return Some(Setting::AddColumnBefore),
        "aca" => return Some(Setting::AddColumnAfter),
        "modes" => return Some(Setting::ToggleModes),
        "cell" => return Some(Setting::ToggleCellCursor),
        "rh" => return Some(Setting::ToggleRowHeader),
        "header" => return Some(Setting::ToggleHeader),
        "footer" => return Some(Setting::ToggleFooter),
        _ => {}
    }

    if let Some(rest) = token.strip_prefix('!') {
        if rest == "r" {
            return Some(Setting::ToggleAutoRefresh);
        }
        if rest == "h" {
            return Some(Setting::ToggleHighlights);
        }
        let columns: Option<Vec<usize>> =
            rest.split(',').map(|part| part.parse::<usize>().ok()).collect();
        return columns.map(Setting::ToggleColumns);
    }
    if let Some(rest) = token.strip_prefix("cwd=") {
        return Some(Setting::ChangeDir(rest.to_string()));
    }
    if let Some(rest) = token.strip_prefix("hl,") {
        return parse_highlight(rest);
    }
    if let Some(rest) = token.strip_prefix("ft") {
        return parse_optional_index(rest).map(Setting::FooterStyle);
    }
    if let Some(rest) = token.strip_prefix("th") {
        return parse_optional_index(rest).map(Setting::Theme);
    }
    if let Some(rest) = token.strip_prefix("ir") {
        return parse_optional_index(rest).map(Setting::InsertRow);
    }
    if let Some(rest) = token.strip_prefix("ic") {
        return parse_optional_index(rest).map(Setting::InsertColumn);
    }
    if let Some(rest) = token.strip_prefix('s') {
        return rest.parse::<usize>().ok().map(Setting::SortColumn);
    }
    None
}

/// `""` -> Some(None); `"3"` -> Some(Some(3)); anything else -> None.
fn parse_optional_index(rest: &str) -> Option<Option<usize>> {
    if rest.is_empty() {
        Some(None)
    } else {
        rest.parse::<usize>().ok().map(Some)
    }
}

fn parse_highlight(rest: &str) -> Option<Setting> {
    let parts: Vec<&str> = rest.split(',').collect();
    let pattern = parts.first()?;
    if pattern.is_empty() {
        return None;
    }
    let field = match parts.get(1) {
        Some(raw) => match raw.parse::<usize>() {
            Ok(col) => HighlightField::Col(col),
            Err(_) => HighlightField::All,
        },
        None => HighlightField::All,
    };
    let color = parts
        .get(2)
        .and_then(|raw| raw.parse::<u8>().ok())
        .unwrap_or(theme::role::SEARCH_HIGHLIGHT);
    Some(Setting::AddHighlight(Highlight {
        pattern: pattern.to_string(),
        field,
        color,
        kind: HighlightKind::User,
        row: None,
        level: 0,
    }))
}

/// Single-entry redo stack: each successfully applied settings string
/// replaces the previous one, and `redo` replays it.
#[derive(Debug, Clone, Default)]
pub struct RedoStack {
    last: Option<String>,
}

impl RedoStack {
    pub fn push(&mut self, command: &str) {
        self.last = Some(command.to_string());
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

// --- The formula escape -----------------------------------------------
//
// A cell edit beginning with ``` evaluates the remainder as a small
// arithmetic expression and stores the string form of the result. The
// grammar is numbers, + - * / %, unary minus and parentheses; nothing can
// reach the host environment from here.

/// Evaluates an arithmetic expression. Returns `None` on any parse error.
pub fn evaluate_formula(expr: &str) -> Option<f64> {
    let tokens: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
    let mut parser = FormulaParser { tokens, pos: 0 };
    let value = parser.expression()?;
    if parser.pos == parser.tokens.len() {
        Some(value)
    } else {
        None
    }
}

/// Evaluates the formula and renders the result (integral values without a
/// fraction part).
pub fn evaluate_formula_to_string(expr: &str) -> Option<String> {
    let value = evaluate_formula(expr)?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        Some(format!("{}", value as i64))
    } else {
        Some(format!("{value}"))
    }
}

struct FormulaParser {
    tokens: Vec<char>,
    pos: usize,
}

impl FormulaParser {
    fn peek(&self) -> Option<char> {
        self.tokens.get(self.pos).copied()
    }

    fn expression(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                '+' => {
                    self.pos += 1;
                    value += self.term()?;
                }
                '-' => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn term(&mut self) -> Option<f64> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                '*' => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                '/' => {
                    self.pos += 1;
                    value /= self.factor()?;
                }
                '%' => {
                    self.pos += 1;
                    value %= self.factor()?;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn factor(&mut self) -> Option<f64> {
        match self.peek()? {
            '-' => {
                self.pos += 1;
                Some(-self.factor()?)
            }
            '(' => {
                self.pos += 1;
                let value = self.expression()?;
                if self.peek() == Some(')') {
                    self.pos += 1;
                    Some(value)
                } else {
                    None
                }
            }
            _ => self.number(),
        }
    }

    fn number(&mut self) -> Option<f64> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if start == self.pos {
            return None;
        }
        let text: String = self.tokens[start..self.pos].iter().collect();
        text.parse().ok()
    }
}
