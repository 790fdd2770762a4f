//! Footer rendering.
//!
//! Three pluggable styles (standard, compact, none) read a state snapshot
//! and produce positioned text spans; the renderer paints them. Keeping
//! the footers terminal-free makes their layout testable.

use crate::select::VisualMode;
use crate::theme::role;

/// Snapshot of everything a footer can display.
#[derive(Debug, Clone, Default)]
pub struct FooterState {
    pub filter_query: String,
    pub search_query: String,
    pub search_index: usize,
    pub search_count: usize,
    pub user_opts: String,
    pub sort_column: usize,
    pub sort_method_label: &'static str,
    pub sort_reverse: bool,
    pub cursor: usize,
    pub view_len: usize,
    pub items_per_page: usize,
    pub selected_count: usize,
    pub visual: VisualMode,
    pub paginate: bool,
    pub footer_string: String,
}

/// Horizontal anchoring of a footer span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Fixed x from the left edge.
    Left(usize),
    /// Right-aligned into a band of the given width ending at the right
    /// edge.
    Right(usize),
}

/// One positioned piece of footer text.
#[derive(Debug, Clone)]
pub struct FooterSpan {
    /// 1 = bottom line, 2 = second from bottom, ...
    pub line_from_bottom: usize,
    pub anchor: Anchor,
    pub text: String,
    pub color: u8,
    pub bold: bool,
}

/// The footer styles cycled by the `ft` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FooterStyle {
    #[default]
    Standard,
    Compact,
    None,
}

pub const FOOTER_STYLE_COUNT: usize = 3;

impl FooterStyle {
    pub fn from_index(index: usize) -> Self {
        match index % FOOTER_STYLE_COUNT {
            0 => FooterStyle::Standard,
            1 => FooterStyle::Compact,
            _ => FooterStyle::None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            FooterStyle::Standard => 0,
            FooterStyle::Compact => 1,
            FooterStyle::None => 2,
        }
    }

    /// Rows this footer reserves below the data area.
    pub fn height(self, state: &FooterState) -> usize {
        match self {
            FooterStyle::Standard => 3,
            FooterStyle::Compact => {
                if !state.search_query.is_empty() {
                    3
                } else if !state.filter_query.is_empty() {
                    2
                } else if !state.footer_string.is_empty() {
                    2
                } else {
                    1
                }
            }
            FooterStyle::None => {
                if !state.search_query.is_empty() {
                    3
                } else if !state.filter_query.is_empty() {
                    2
                } else if !state.user_opts.is_empty() || !state.footer_string.is_empty() {
                    1
                } else {
                    0
                }
            }
        }
    }

    /// The spans to paint for one frame, given the terminal width.
    pub fn spans(self, state: &FooterState, w: usize) -> Vec<FooterSpan> {
        match self {
            FooterStyle::Standard => standard_spans(state, w),
            FooterStyle::Compact => compact_spans(state, w),
            FooterStyle::None => query_spans(state, w),
        }
    }
}

fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn sort_glyph(reverse: bool) -> &'static str {
    if reverse { "▼" } else { "▲" }
}

/// The query lines shared by every style: opts on the bottom line, filter
/// above it, search above that.
fn query_spans(state: &FooterState, w: usize) -> Vec<FooterSpan> {
    let mut spans = Vec::new();
    if !state.user_opts.is_empty() {
        spans.push(FooterSpan {
            line_from_bottom: 1,
            anchor: Anchor::Left(2),
            text: clip(&format!(" Opts: {} ", state.user_opts), w.saturating_sub(3)),
            color: role::FOOTER,
            bold: true,
        });
    }
    if !state.filter_query.is_empty() {
        spans.push(FooterSpan {
            line_from_bottom: 2,
            anchor: Anchor::Left(2),
            text: clip(
                &format!(" Filter: {} ", state.filter_query),
                w.saturating_sub(40),
            ),
            color: role::FOOTER,
            bold: true,
        });
    }
    if !state.search_query.is_empty() {
        spans.push(FooterSpan {
            line_from_bottom: 3,
            anchor: Anchor::Left(2),
            text: clip(
                &format!(
                    " Search: {} [{}/{}] ",
                    state.search_query, state.search_index, state.search_count
                ),
                w.saturating_sub(3),
            ),
            color: role::FOOTER,
            bold: true,
        });
    }
    if !state.footer_string.is_empty() {
        spans.push(FooterSpan {
            line_from_bottom: 1,
            anchor: Anchor::Right(state.footer_string.len().min(w.saturating_sub(1)) + 2),
            text: format!(" {} ", clip(&state.footer_string, w.saturating_sub(3))),
            color: role::FOOTER_STRING,
            bold: false,
        });
    }
    spans
}

fn cursor_info(state: &FooterState) -> String {
    if state.paginate && state.items_per_page > 0 {
        let page = state.cursor / state.items_per_page + 1;
        let pages = state.view_len.div_ceil(state.items_per_page).max(1);
        format!(
            " {}/{}  Page {}/{}  Selected {}",
            state.cursor + 1,
            state.view_len,
            page,
            pages,
            state.selected_count
        )
    } else {
        format!(
            " {}/{}  |  Selected {}",
            state.cursor + 1,
            state.view_len,
            state.selected_count
        )
    }
}

fn sort_info(state: &FooterState) -> String {
    format!(
        " Sort: ({}, {}, {}) ",
        state.sort_column,
        state.sort_method_label,
        sort_glyph(state.sort_reverse)
    )
}

fn standard_spans(state: &FooterState, w: usize) -> Vec<FooterSpan> {
    let mut spans = query_spans(state, w);

    spans.push(FooterSpan {
        line_from_bottom: 2,
        anchor: Anchor::Right(35),
        text: sort_info(state),
        color: role::FOOTER,
        bold: false,
    });
    spans.push(FooterSpan {
        line_from_bottom: 3,
        anchor: Anchor::Right(35),
        text: cursor_info(state),
        color: role::FOOTER,
        bold: false,
    });

    if state.footer_string.is_empty() {
        let select_mode = match state.visual {
            VisualMode::Idle => "Cursor",
            VisualMode::Selecting => "Visual Selection",
            VisualMode::Deselecting => "Visual deselection",
        };
        spans.push(FooterSpan {
            line_from_bottom: 1,
            anchor: Anchor::Right(35),
            text: format!("{select_mode} "),
            color: role::FOOTER,
            bold: false,
        });
    }
    spans
}

fn compact_spans(state: &FooterState, w: usize) -> Vec<FooterSpan> {
    let mut spans = query_spans(state, w);
    let line = if state.footer_string.is_empty() { 1 } else { 2 };
    spans.push(FooterSpan {
        line_from_bottom: line,
        anchor: Anchor::Right(40),
        text: format!(
            "{} [{}] {}/{}",
            sort_info(state),
            state.selected_count,
            state.cursor + 1,
            state.view_len
        ),
        color: role::FOOTER,
        bold: false,
    });
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> FooterState {
        FooterState {
            filter_query: "Alice".into(),
            search_query: "e".into(),
            search_index: 2,
            search_count: 4,
            user_opts: "flag".into(),
            sort_column: 1,
            sort_method_label: "lex",
            sort_reverse: false,
            cursor: 3,
            view_len: 10,
            items_per_page: 5,
            selected_count: 2,
            visual: VisualMode::Idle,
            paginate: false,
            footer_string: String::new(),
        }
    }

    #[test]
    fn standard_height_is_fixed() {
        assert_eq!(FooterStyle::Standard.height(&state()), 3);
        assert_eq!(FooterStyle::Standard.height(&FooterState::default()), 3);
    }

    #[test]
    fn compact_and_none_heights_follow_content() {
        let mut s = state();
        assert_eq!(FooterStyle::Compact.height(&s), 3);
        assert_eq!(FooterStyle::None.height(&s), 3);
        s.search_query.clear();
        assert_eq!(FooterStyle::Compact.height(&s), 2);
        assert_eq!(FooterStyle::None.height(&s), 2);
        s.filter_query.clear();
        assert_eq!(FooterStyle::Compact.height(&s), 1);
        assert_eq!(FooterStyle::None.height(&s), 1);
        s.user_opts.clear();
        assert_eq!(FooterStyle::None.height(&s), 0);
    }

    #[test]
    fn standard_spans_cover_queries_and_status() {
        let spans = FooterStyle::Standard.spans(&state(), 100);
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert!(texts.iter().any(|t| t.contains("Filter: Alice")));
        assert!(texts.iter().any(|t| t.contains("Search: e [2/4]")));
        assert!(texts.iter().any(|t| t.contains("Opts: flag")));
        assert!(texts.iter().any(|t| t.contains("Sort: (1, lex, ▲)")));
        assert!(texts.iter().any(|t| t.contains("4/10")));
        assert!(texts.iter().any(|t| t.contains("Cursor")));
    }

    #[test]
    fn paginate_reports_pages() {
        let mut s = state();
        s.paginate = true;
        let spans = FooterStyle::Standard.spans(&s, 100);
        assert!(spans.iter().any(|span| span.text.contains("Page 1/2")));
    }

    #[test]
    fn footer_string_takes_the_mode_slot() {
        let mut s = state();
        s.footer_string = "3 items refreshed".into();
        let spans = FooterStyle::Standard.spans(&s, 100);
        assert!(spans.iter().any(|span| span.text.contains("3 items refreshed")));
        assert!(!spans.iter().any(|span| span.text.contains("Cursor")));
    }

    #[test]
    fn style_cycling() {
        assert_eq!(FooterStyle::from_index(0), FooterStyle::Standard);
        assert_eq!(FooterStyle::from_index(2), FooterStyle::None);
        assert_eq!(FooterStyle::from_index(3), FooterStyle::Standard);
        assert_eq!(FooterStyle::Compact.index(), 1);
    }
}
