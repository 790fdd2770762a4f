//! Frame painter.
//!
//! Draws one frame of a picker: title, modes, header, rows with selection
//! and highlight layers, scrollbar, refresh glyph and footer. Layer order
//! per row is: base row, level-0 highlights, selection, level-1
//! highlights, cursor, level-2 highlights. Everything is derived from the
//! picker state; nothing here mutates it.

use crate::{
    Picker, Row, RowpickResult,
    footer::Anchor,
    highlight::{Highlight, HighlightField},
    select::VisualMode,
    term::Terminal,
    theme::{self, role},
    viewport::{self, clip_left, display_width, format_row, truncate_to_display_width},
};
use regex::RegexBuilder;

/// Draws a full frame.
pub fn draw_screen(picker: &Picker, term: &mut Terminal) -> RowpickResult<()> {
    let (term_h, term_w) = term.size();
    let (h, w) = picker.effective_size(term_h, term_w);
    let palette = theme::get_theme(picker.ui.theme_number);

    term.clear()?;

    if !screen_big_enough(picker, h, w) {
        draw_too_small(term, h, w)?;
        return term.flush();
    }

    let layout = picker.frame_layout(term_h, term_w);
    let widths = picker.current_widths(term_h, term_w);
    let visible = picker.data.visible_columns();
    let separator = picker.config.separator.as_str();
    let visible_total: usize = visible
        .iter()
        .map(|&c| widths.get(c).copied().unwrap_or(0))
        .sum::<usize>()
        + separator.len() * visible.len().saturating_sub(1);
    let band = (w.saturating_sub(layout.startx)).min(visible_total + 1);

    let (start, end) = viewport::page_bounds(
        picker.ui.cursor,
        layout.items_per_page,
        picker.data.view.len(),
        picker.ui.paginate,
    );

    // Title.
    let mut y = picker.config.top_gap;
    if !picker.config.title.is_empty() {
        let style = palette.style(role::TITLE);
        term.put(y, 0, &" ".repeat(w), style)?;
        let padded = format!(" {} ", picker.config.title.trim());
        let x = w.saturating_sub(display_width(&padded)) / 2;
        term.put(y, x, &padded, style)?;
        y += 1;
    }

    // Modes row.
    if picker.ui.display_modes && !picker.ui.modes.is_empty() {
        draw_modes(picker, term, y, w)?;
        y += 1;
    }

    // Header.
    if !picker.data.header.is_empty() && picker.ui.show_header {
        draw_header(picker, term, y, w, &widths, &visible, layout.startx, band)?;
    }

    // Data rows.
    for idx in start..end {
        let Some(original) = picker.data.view_original(idx) else {
            continue;
        };
        let Some(row) = picker.data.rows.get(original) else {
            continue;
        };
        let row_y = layout.top_space + (idx - start);
        draw_row(
            picker, term, row_y, idx, original, row, &widths, &visible, layout.startx, band, w,
        )?;
    }

    // Row-header column of original indices.
    if picker.ui.show_row_header {
        for idx in start..end {
            let Some(original) = picker.data.view_original(idx) else {
                continue;
            };
            let row_y = layout.top_space + (idx - start);
            let style = if idx == picker.ui.cursor {
                palette.style(role::FOCUS_COLUMN)
            } else {
                palette.style(role::HEADER)
            };
            term.put(row_y, 0, &format!(" {original} "), style)?;
        }
    }

    draw_scrollbar(picker, term, &layout, h, w, end - start)?;

    // Refresh glyph.
    if picker.ui.auto_refresh || picker.refreshing_data {
        let glyph_role = if picker.refreshing_data {
            role::REFRESH_ACTIVE
        } else {
            role::REFRESH_IDLE
        };
        term.put(0, w.saturating_sub(3), " ⟳ ", palette.style(glyph_role))?;
    }

    draw_footer(picker, term, h, w)?;

    term.flush()
}

/// The terminal-too-small placeholder suppresses all interactive drawing;
/// engine state stays intact underneath.
fn screen_big_enough(picker: &Picker, h: usize, w: usize) -> bool {
    if h < 3 || w < 8 {
        return false;
    }
    let footer_visible = picker.ui.show_footer || !picker.ui.footer_string.is_empty();
    if footer_visible && (h < 12 || w < 35) {
        return false;
    }
    !(h < 12 && w < 10)
}

fn draw_too_small(term: &mut Terminal, h: usize, w: usize) -> RowpickResult<()> {
    let palette = theme::get_theme(0);
    let style = palette.style(role::ROW);
    let words = ["Terminal", "Too", "Small"];
    let mid = h / 2;
    for (i, word) in words.iter().enumerate() {
        let y = (mid + i).saturating_sub(1);
        if y < h {
            let x = w.saturating_sub(word.len()) / 2;
            term.put(y, x, word, style)?;
        }
    }
    Ok(())
}

fn draw_modes(picker: &Picker, term: &mut Terminal, y: usize, w: usize) -> RowpickResult<()> {
    let palette = theme::get_theme(picker.ui.theme_number);
    let names: Vec<&str> = picker.ui.modes.iter().map(|m| m.name.as_str()).collect();
    let total: usize = names.iter().map(|n| display_width(n)).sum();
    let gap = w.saturating_sub(total) / names.len().max(1);
    let mut x = 0;
    for (i, name) in names.iter().enumerate() {
        let cell_width = display_width(name) + gap;
        let text = truncate_to_display_width(name, cell_width, true);
        let style = if i == picker.ui.mode_index {
            palette.style(role::MODE_ACTIVE)
        } else {
            palette.style(role::MODE_INACTIVE)
        };
        term.put(y, x, &text, style)?;
        x += cell_width;
    }
    Ok(())
}

/// Header text for one physical column, with the `N. ` prefix when column
/// numbering is on.
fn header_cell(picker: &Picker, col: usize, width: usize) -> String {
    let name = picker
        .data
        .header
        .get(col)
        .map(String::as_str)
        .unwrap_or("");
    if picker.ui.number_columns {
        let prefix = format!("{col}. ");
        let rest = width.saturating_sub(display_width(&prefix));
        format!("{prefix}{}", truncate_to_display_width(name, rest, true))
    } else {
        truncate_to_display_width(name, width, true)
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_header(
    picker: &Picker,
    term: &mut Terminal,
    y: usize,
    w: usize,
    widths: &[usize],
    visible: &[usize],
    startx: usize,
    band: usize,
) -> RowpickResult<()> {
    let palette = theme::get_theme(picker.ui.theme_number);
    let style = palette.style(role::HEADER);
    term.put(y, 0, &" ".repeat(w), style)?;

    let mut header_str = String::new();
    for &col in visible {
        header_str.push_str(&header_cell(picker, col, widths.get(col).copied().unwrap_or(0)));
        header_str.push_str(&picker.config.separator);
    }
    let clipped = truncate_to_display_width(
        clip_left(&header_str, picker.ui.leftmost_char),
        band,
        false,
    );
    term.put(y, startx, &clipped, style)?;

    // Overlay the focus column segment.
    let focus = picker.data.columns.focus_physical();
    if let Some(focus_visible) = visible.iter().position(|&c| c == focus) {
        let before: usize = visible[..focus_visible]
            .iter()
            .map(|&c| widths.get(c).copied().unwrap_or(0) + picker.config.separator.len())
            .sum();
        let segment = header_cell(picker, focus, widths.get(focus).copied().unwrap_or(0));
        if before >= picker.ui.leftmost_char {
            let x = startx + before - picker.ui.leftmost_char;
            if x < w {
                let room = w - x;
                term.put(
                    y,
                    x,
                    &truncate_to_display_width(&segment, room.min(display_width(&segment)), false),
                    palette.style(role::FOCUS_COLUMN),
                )?;
            }
        }
    }
    Ok(())
}

/// Display-column offset of physical column `col` inside the row string.
fn column_offset(col: usize, widths: &[usize], visible: &[usize], separator: &str) -> Option<usize> {
    let display_pos = visible.iter().position(|&c| c == col)?;
    Some(
        visible[..display_pos]
            .iter()
            .map(|&c| widths.get(c).copied().unwrap_or(0) + separator.len())
            .sum(),
    )
}

/// Highlight spans for one row at one stacking level, as
/// `(display_offset, text)` pairs into the unclipped row string.
pub(crate) fn row_highlight_spans(
    highlights: &[Highlight],
    level: u8,
    original: usize,
    row: &Row,
    full_row_str: &str,
    widths: &[usize],
    visible: &[usize],
    separator: &str,
) -> Vec<(usize, String, u8)> {
    let mut spans = Vec::new();
    for highlight in highlights {
        let highlight_level = highlight.level.min(2);
        if highlight_level != level {
            continue;
        }
        if let Some(only_row) = highlight.row {
            if only_row != original {
                continue;
            }
        }
        let Ok(re) = RegexBuilder::new(&highlight.pattern)
            .case_insensitive(true)
            .build()
        else {
            continue;
        };
        match highlight.field {
            HighlightField::All => {
                if let Some(found) = re.find(full_row_str) {
                    let offset = display_width(&full_row_str[..found.start()]);
                    spans.push((offset, found.as_str().to_string(), highlight.color));
                }
            }
            HighlightField::Col(col) => {
                let Some(field_start) = column_offset(col, widths, visible, separator) else {
                    continue;
                };
                let cell = row.get(col).map(String::as_str).unwrap_or("");
                let cell_text =
                    truncate_to_display_width(cell, widths.get(col).copied().unwrap_or(0), false);
                if let Some(found) = re.find(&cell_text) {
                    let offset = field_start + display_width(&cell_text[..found.start()]);
                    spans.push((offset, found.as_str().to_string(), highlight.color));
                }
            }
        }
    }
    spans
}

#[allow(clippy::too_many_arguments)]
fn paint_highlights(
    picker: &Picker,
    term: &mut Terminal,
    level: u8,
    y: usize,
    original: usize,
    row: &Row,
    full_row_str: &str,
    widths: &[usize],
    visible: &[usize],
    startx: usize,
    w: usize,
) -> RowpickResult<()> {
    if picker.ui.highlights_hide {
        return Ok(());
    }
    let palette = theme::get_theme(picker.ui.theme_number);
    let spans = row_highlight_spans(
        &picker.ui.highlights,
        level,
        original,
        row,
        full_row_str,
        widths,
        visible,
        &picker.config.separator,
    );
    for (offset, text, color) in spans {
        if offset + display_width(&text) <= picker.ui.leftmost_char {
            continue;
        }
        let (x, text) = if offset >= picker.ui.leftmost_char {
            (startx + offset - picker.ui.leftmost_char, text)
        } else {
            let cut = picker.ui.leftmost_char - offset;
            (startx, clip_left(&text, cut).to_string())
        };
        if x >= w {
            continue;
        }
        let room = w - x;
        let clipped = truncate_to_display_width(&text, room.min(display_width(&text)), false);
        let mut style = palette.style(color);
        style.bold = true;
        term.put(y, x, &clipped, style)?;
    }
    Ok(())
}

/// Paints one cell's background band (selection or cursor in cell mode).
#[allow(clippy::too_many_arguments)]
fn paint_cell(
    picker: &Picker,
    term: &mut Terminal,
    y: usize,
    original: usize,
    col: usize,
    widths: &[usize],
    visible: &[usize],
    startx: usize,
    w: usize,
    color: u8,
) -> RowpickResult<()> {
    let Some(offset) = column_offset(col, widths, visible, &picker.config.separator) else {
        return Ok(());
    };
    let width = widths.get(col).copied().unwrap_or(0);
    if offset + width <= picker.ui.leftmost_char {
        return Ok(());
    }
    let palette = theme::get_theme(picker.ui.theme_number);
    let cell = picker.data.cell(original, col);
    let text = truncate_to_display_width(cell, width, picker.ui.centre_in_cols);
    let (x, text) = if offset >= picker.ui.leftmost_char {
        (startx + offset - picker.ui.leftmost_char, text)
    } else {
        let cut = picker.ui.leftmost_char - offset;
        (startx, clip_left(&text, cut).to_string())
    };
    if x >= w {
        return Ok(());
    }
    let room = w - x;
    let clipped = truncate_to_display_width(&text, room.min(width), false);
    let mut style = palette.style(color);
    style.bold = true;
    term.put(y, x, &clipped, style)?;
    Ok(())
}

/// Whether view position `idx` lies inside the active visual band.
fn in_visual_band(picker: &Picker, idx: usize) -> bool {
    let anchor = picker.selection.anchor_row;
    let cursor = picker.ui.cursor;
    (anchor.min(cursor)..=anchor.max(cursor)).contains(&idx)
}

#[allow(clippy::too_many_arguments)]
fn draw_row(
    picker: &Picker,
    term: &mut Terminal,
    y: usize,
    idx: usize,
    original: usize,
    row: &Row,
    widths: &[usize],
    visible: &[usize],
    startx: usize,
    band: usize,
    w: usize,
) -> RowpickResult<()> {
    let palette = theme::get_theme(picker.ui.theme_number);
    let full_row_str = format_row(
        row,
        visible,
        widths,
        &picker.config.separator,
        picker.ui.centre_in_cols,
    );
    let row_str = truncate_to_display_width(
        clip_left(&full_row_str, picker.ui.leftmost_char),
        band,
        false,
    );

    // 1. Base row.
    term.put(y, startx, &row_str, palette.style(role::ROW))?;

    // 2. Level-0 highlights.
    paint_highlights(
        picker, term, 0, y, original, row, &full_row_str, widths, visible, startx, w,
    )?;

    // 3. Selection layer.
    let selected = picker
        .selection
        .row_selected
        .get(&original)
        .copied()
        .unwrap_or(false);
    if picker.ui.cell_cursor {
        for (&(cell_row, col), &on) in &picker.selection.cell_selected {
            if on && cell_row == original {
                paint_cell(
                    picker, term, y, original, col, widths, visible, startx, w,
                    role::SELECTED_CELL,
                )?;
            }
        }
        if picker.selection.visual != VisualMode::Idle && in_visual_band(picker, idx) {
            let color = if picker.selection.visual == VisualMode::Selecting {
                role::SELECTED_CELL
            } else {
                role::DESELECT_CELL
            };
            let focus = picker.data.columns.focus_physical();
            let lo = picker.selection.anchor_col.min(focus);
            let hi = picker.selection.anchor_col.max(focus);
            for col in lo..=hi {
                paint_cell(
                    picker, term, y, original, col, widths, visible, startx, w, color,
                )?;
            }
        }
    } else if picker.ui.highlight_full_row {
        if selected {
            let mut style = palette.style(role::SELECTED_CELL);
            style.bold = true;
            term.put(y, startx, &row_str, style)?;
        }
        if picker.selection.visual != VisualMode::Idle && in_visual_band(picker, idx) {
            let color = if picker.selection.visual == VisualMode::Selecting {
                role::SELECTED_CELL
            } else {
                role::DESELECT_CELL
            };
            term.put(y, startx, &row_str, palette.style(color))?;
        }
    } else {
        if selected {
            term.put(
                y,
                startx.saturating_sub(2),
                " ",
                palette.style(role::SELECT_MARKER),
            )?;
        }
        if picker.selection.visual != VisualMode::Idle && in_visual_band(picker, idx) {
            let color = if picker.selection.visual == VisualMode::Selecting {
                role::SELECT_MARKER
            } else {
                role::DESELECT_CELL
            };
            term.put(y, startx.saturating_sub(2), " ", palette.style(color))?;
        }
    }

    // 4. Level-1 highlights, painted over the selection.
    paint_highlights(
        picker, term, 1, y, original, row, &full_row_str, widths, visible, startx, w,
    )?;

    // 5. Cursor.
    if idx == picker.ui.cursor {
        if picker.ui.cell_cursor {
            paint_cell(
                picker,
                term,
                y,
                original,
                picker.data.columns.focus_physical(),
                widths,
                visible,
                startx,
                w,
                role::CURSOR,
            )?;
        } else {
            let mut style = palette.style(role::CURSOR);
            style.bold = true;
            term.put(y, startx, &row_str, style)?;
        }
    }

    // 6. Level-2 highlights, over everything.
    paint_highlights(
        picker, term, 2, y, original, row, &full_row_str, widths, visible, startx, w,
    )
}

fn draw_scrollbar(
    picker: &Picker,
    term: &mut Terminal,
    layout: &viewport::Layout,
    h: usize,
    w: usize,
    _page_len: usize,
) -> RowpickResult<()> {
    let total = picker.data.view.len();
    if !picker.ui.scroll_bar || total == 0 || total <= layout.items_per_page {
        return Ok(());
    }
    let palette = theme::get_theme(picker.ui.theme_number);
    let page = layout.items_per_page;
    let mut length = (page * page / total).max(1);
    let mut start = if picker.ui.cursor <= page / 2 {
        layout.top_space
    } else if picker.ui.cursor + page / 2 >= total {
        h.saturating_sub(layout.bottom_space + length)
    } else {
        (picker.ui.cursor * page / total + layout.top_space).saturating_sub(length / 2)
    };
    start = start.min(h.saturating_sub(layout.top_space.min(h) + 1).max(1));
    length = length.min(h.saturating_sub(start + 1)).max(1);
    for i in 0..length {
        term.put(start + i, w - 1, " ", palette.style(role::SCROLLBAR))?;
    }
    Ok(())
}

fn draw_footer(picker: &Picker, term: &mut Terminal, h: usize, w: usize) -> RowpickResult<()> {
    let palette = theme::get_theme(picker.ui.theme_number);
    let layout = picker.frame_layout(h, w);
    let state = picker.footer_state(layout);

    if !picker.ui.show_footer {
        // Bare footer string on the last line when the footer is hidden.
        if !picker.ui.footer_string.is_empty() {
            let width = (display_width(&picker.ui.footer_string) + 2).min(w.saturating_sub(1));
            let text = truncate_to_display_width(
                &format!(" {} ", picker.ui.footer_string),
                width,
                false,
            );
            term.put(
                h - 1,
                w.saturating_sub(width + 1),
                &text,
                palette.style(role::FOOTER_STRING),
            )?;
        }
        return Ok(());
    }

    let height = picker.ui.footer_style.height(&state);
    for i in 0..height.min(h) {
        term.put(
            h - 1 - i,
            0,
            &" ".repeat(w.saturating_sub(1)),
            palette.style(role::FOOTER),
        )?;
    }
    for span in picker.ui.footer_style.spans(&state, w) {
        if span.line_from_bottom > h {
            continue;
        }
        let y = h - span.line_from_bottom;
        let x = match span.anchor {
            Anchor::Left(x) => x,
            Anchor::Right(band) => w.saturating_sub(band),
        };
        if x >= w {
            continue;
        }
        let room = w - x;
        let text = truncate_to_display_width(
            &span.text,
            room.min(display_width(&span.text).max(1)),
            false,
        );
        let mut style = palette.style(span.color);
        style.bold = span.bold;
        term.put(y, x, &text, style)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::HighlightKind;

    fn hl(pattern: &str, field: HighlightField, level: u8) -> Highlight {
        Highlight {
            pattern: pattern.to_string(),
            field,
            color: 10,
            kind: HighlightKind::User,
            row: None,
            level,
        }
    }

    #[test]
    fn all_field_span_offsets_use_display_width() {
        let row: Row = vec!["abc".to_string(), "target".to_string()];
        let widths = vec![5, 8];
        let visible = vec![0, 1];
        let full = format_row(&row, &visible, &widths, "  ", false);

        let spans = row_highlight_spans(
            &[hl("target", HighlightField::All, 0)],
            0,
            0,
            &row,
            &full,
            &widths,
            &visible,
            "  ",
        );
        assert_eq!(spans.len(), 1);
        // "abc" padded to 5, plus the 2-wide separator.
        assert_eq!(spans[0].0, 7);
        assert_eq!(spans[0].1, "target");
    }

    #[test]
    fn column_field_spans_offset_into_their_column() {
        let row: Row = vec!["abc".to_string(), "xxtargetxx".to_string()];
        let widths = vec![3, 12];
        let visible = vec![0, 1];
        let full = format_row(&row, &visible, &widths, " ", false);

        let spans = row_highlight_spans(
            &[hl("target", HighlightField::Col(1), 0)],
            0,
            0,
            &row,
            &full,
            &widths,
            &visible,
            " ",
        );
        assert_eq!(spans.len(), 1);
        // Column 1 starts at 3 + 1 separator; "xx" precedes the match.
        assert_eq!(spans[0].0, 6);
    }

    #[test]
    fn hidden_column_highlights_are_dropped() {
        let row: Row = vec!["abc".to_string(), "def".to_string()];
        let widths = vec![3, 3];
        let visible = vec![0]; // column 1 hidden
        let full = format_row(&row, &visible, &widths, " ", false);

        let spans = row_highlight_spans(
            &[hl("def", HighlightField::Col(1), 0)],
            0,
            0,
            &row,
            &full,
            &widths,
            &visible,
            " ",
        );
        assert!(spans.is_empty());
    }

    #[test]
    fn level_and_row_filters_apply() {
        let row: Row = vec!["abc".to_string()];
        let widths = vec![3];
        let visible = vec![0];
        let full = format_row(&row, &visible, &widths, " ", false);

        let mut scoped = hl("abc", HighlightField::All, 1);
        scoped.row = Some(7);
        let highlights = vec![hl("abc", HighlightField::All, 2), scoped];

        // Wrong level: nothing.
        assert!(
            row_highlight_spans(&highlights, 0, 0, &row, &full, &widths, &visible, " ")
                .is_empty()
        );
        // Level 2 matches.
        assert_eq!(
            row_highlight_spans(&highlights, 2, 0, &row, &full, &widths, &visible, " ").len(),
            1
        );
        // Row-scoped highlight only fires on its row.
        assert!(
            row_highlight_spans(&highlights, 1, 0, &row, &full, &widths, &visible, " ")
                .is_empty()
        );
        assert_eq!(
            row_highlight_spans(&highlights, 1, 7, &row, &full, &widths, &visible, " ").len(),
            1
        );
    }

    #[test]
    fn invalid_highlight_patterns_are_skipped() {
        let row: Row = vec!["abc".to_string()];
        let widths = vec![3];
        let visible = vec![0];
        let full = format_row(&row, &visible, &widths, " ", false);
        let spans = row_highlight_spans(
            &[hl("[broken", HighlightField::All, 0)],
            0,
            0,
            &row,
            &full,
            &widths,
            &visible,
            " ",
        );
        assert!(spans.is_empty());
    }
}
