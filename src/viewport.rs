//! Viewport and layout calculator.
//!
//! Everything here is a pure function of the engine state and the terminal
//! size; a render pass never mutates state through this module. All
//! character arithmetic is display-width aware (`unicode-width`), so wide
//! glyphs count for the columns they actually occupy on screen.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Frame geometry derived from the terminal size and the UI toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layout {
    /// Number of data rows that fit on one page.
    pub items_per_page: usize,
    /// Rows above the data area (top gap, title, modes, header).
    pub top_space: usize,
    /// Rows below the data area (footer).
    pub bottom_space: usize,
    /// First screen column of the data area.
    pub startx: usize,
}

/// Inputs for [`section_sizes`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionParams {
    pub term_h: usize,
    pub term_w: usize,
    pub top_gap: usize,
    pub has_title: bool,
    pub show_modes: bool,
    pub has_header: bool,
    pub show_footer: bool,
    pub footer_height: usize,
    pub has_footer_string: bool,
    pub view_len: usize,
    pub total_rows: usize,
    pub centre_vertical: bool,
    pub centre_horizontal: bool,
    pub highlight_full_row: bool,
    pub show_row_header: bool,
    /// Total display width of the visible columns plus separators.
    pub visible_total_width: usize,
}

/// Computes items-per-page, header/footer space and the data start column.
pub fn section_sizes(p: &SectionParams) -> Layout {
    let bottom_space = if p.show_footer { p.footer_height } else { 0 };

    let mut top_space = p.top_gap;
    if p.has_title {
        top_space += 1;
    }
    if p.show_modes {
        top_space += 1;
    }
    if p.has_header {
        top_space += 1;
    }

    let mut items_per_page = p.term_h.saturating_sub(top_space + bottom_space);
    if !p.show_footer && p.has_footer_string {
        items_per_page = items_per_page.saturating_sub(1);
    }
    items_per_page = items_per_page.min(p.term_h.saturating_sub(top_space + 1));

    // Centre vertically when the view is shorter than a page.
    if p.centre_vertical && p.view_len < items_per_page {
        let free = p
            .term_h
            .saturating_sub(top_space + bottom_space)
            .saturating_sub(p.view_len);
        top_space += free / 2;
    }

    let mut startx = if p.highlight_full_row { 1 } else { 2 };
    if p.show_row_header {
        startx += digits(p.total_rows) + 2;
    }
    if p.centre_horizontal && p.visible_total_width < p.term_w {
        startx += (p.term_w - p.visible_total_width) / 2;
    }

    Layout {
        items_per_page,
        top_space,
        bottom_space,
        startx,
    }
}

fn digits(n: usize) -> usize {
    n.max(1).to_string().len()
}

/// First and one-past-last view positions shown on the current page.
///
/// With `paginate` the pages are fixed blocks; otherwise the page follows
/// the cursor with a scrolloff of half a page, clamping at both ends so
/// the cursor is always fully visible.
pub fn page_bounds(
    cursor: usize,
    items_per_page: usize,
    view_len: usize,
    paginate: bool,
) -> (usize, usize) {
    if view_len == 0 || items_per_page == 0 {
        return (0, 0);
    }
    if paginate {
        let start = (cursor / items_per_page) * items_per_page;
        return (start, (start + items_per_page).min(view_len));
    }
    let scrolloff = items_per_page / 2;
    let preferred = cursor as i64 - (items_per_page as i64 - scrolloff as i64);
    let limit = view_len as i64 - items_per_page as i64;
    let start = preferred.min(limit).max(0) as usize;
    (start, (start + items_per_page).min(view_len))
}

/// Display width of `text`.
pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

/// Clips the first `n` display columns from the left of `text`.
pub fn clip_left(text: &str, n: usize) -> &str {
    let mut width = 0;
    for (i, ch) in text.char_indices() {
        let char_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + char_width > n {
            return &text[i..];
        }
        width += char_width;
    }
    ""
}

/// Truncates and pads `text` to exactly `width` display columns. With
/// `centre` the text is centred inside the padding.
pub fn truncate_to_display_width(text: &str, width: usize, centre: bool) -> String {
    let mut result = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let char_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + char_width > width {
            break;
        }
        result.push(ch);
        used += char_width;
    }
    let padding = width.saturating_sub(display_width(&result));
    if centre {
        let left = padding / 2;
        format!(
            "{}{}{}",
            " ".repeat(left),
            result,
            " ".repeat(padding - left)
        )
    } else {
        format!("{}{}", result, " ".repeat(padding))
    }
}

/// Maximum display width of each physical column over the given rows,
/// clipped to `max_column_width`. Header widths account for the `N. `
/// column-number prefix when `number_columns` is on.
pub fn column_widths(
    rows: &[&Vec<String>],
    header: &[String],
    arity: usize,
    max_column_width: usize,
    number_columns: bool,
) -> Vec<usize> {
    let mut widths = vec![0usize; arity];
    for row in rows {
        for (c, width) in widths.iter_mut().enumerate() {
            if let Some(cell) = row.get(c) {
                *width = (*width).max(display_width(cell));
            }
        }
    }
    for (c, h) in header.iter().enumerate().take(arity) {
        let header_width = if number_columns {
            display_width(&format!("{c}. {h}"))
        } else {
            display_width(h)
        };
        widths[c] = widths[c].max(header_width);
    }
    for width in widths.iter_mut() {
        *width = (*width).min(max_column_width);
    }
    widths
}

/// Formats the visible cells of `row` into one display string, each cell
/// padded to its column width and followed by `separator`.
pub fn format_row(
    row: &[String],
    visible_cols: &[usize],
    widths: &[usize],
    separator: &str,
    centre: bool,
) -> String {
    let mut out = String::new();
    for &col in visible_cols {
        let cell = row.get(col).map(String::as_str).unwrap_or("");
        let width = widths.get(col).copied().unwrap_or(0);
        out.push_str(&truncate_to_display_width(cell, width, centre));
        out.push_str(separator);
    }
    out
}

/// Advances `leftmost_char` so that the focus column (given as an index
/// into `visible_widths`) is fully inside the horizontal band, clamped to
/// the scrollable range.
pub fn track_focus_column(
    leftmost_char: usize,
    visible_widths: &[usize],
    focus: usize,
    separator_width: usize,
    term_w: usize,
    startx: usize,
) -> usize {
    if visible_widths.is_empty() {
        return 0;
    }
    let focus = focus.min(visible_widths.len() - 1);
    let band = term_w.saturating_sub(startx);

    let before: usize = visible_widths[..focus].iter().sum::<usize>() + separator_width * focus;
    let through: usize = before + visible_widths[focus];

    let mut leftmost = leftmost_char;
    if through.saturating_sub(leftmost) >= band {
        // Focus column ends past the right edge: scroll to expose it.
        leftmost = (through + separator_width).saturating_sub(band);
    } else if (through as i64 - leftmost as i64) < 0 {
        // Focus column is entirely left of the band.
        leftmost = before;
    }

    let total: usize =
        visible_widths.iter().sum::<usize>() + separator_width * visible_widths.len();
    leftmost.min(total.saturating_sub(band))
}

/// `leftmost_char` needed to expose the tail of the widest visible row.
pub fn scroll_far_right(longest_row_width: usize, term_w: usize, startx: usize) -> usize {
    (longest_row_width + 2 + startx).saturating_sub(term_w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_always_inside_page_bounds() {
        for view_len in [0usize, 1, 5, 50, 500] {
            for items_per_page in [1usize, 3, 10, 40] {
                for cursor in 0..view_len {
                    let (start, end) = page_bounds(cursor, items_per_page, view_len, false);
                    assert!(start <= cursor && cursor < end, "cursor {cursor} in [{start},{end})");
                    assert!(end <= view_len);
                }
            }
        }
    }

    #[test]
    fn page_bounds_clamp_at_edges() {
        let (start, end) = page_bounds(0, 10, 100, false);
        assert_eq!((start, end), (0, 10));
        let (start, end) = page_bounds(99, 10, 100, false);
        assert_eq!(end, 100);
        assert_eq!(start, 90);
    }

    #[test]
    fn paginate_uses_fixed_blocks() {
        assert_eq!(page_bounds(0, 10, 35, true), (0, 10));
        assert_eq!(page_bounds(14, 10, 35, true), (10, 20));
        assert_eq!(page_bounds(34, 10, 35, true), (30, 35));
    }

    #[test]
    fn widths_clip_to_max_and_cover_header() {
        let rows = vec![
            vec!["short".to_string(), "a-rather-long-cell-value".to_string()],
            vec!["x".to_string(), "y".to_string()],
        ];
        let refs: Vec<&Vec<String>> = rows.iter().collect();
        let header = vec!["first".to_string(), "second".to_string()];

        let widths = column_widths(&refs, &header, 2, 10, false);
        assert_eq!(widths, vec![5, 10]);

        // With column numbering the header width includes the "N. " prefix.
        let widths = column_widths(&refs, &header, 2, 70, true);
        assert_eq!(widths[0], display_width("0. first"));
        assert_eq!(widths[1], display_width("a-rather-long-cell-value"));
    }

    #[test]
    fn truncate_is_width_exact_for_wide_glyphs() {
        // CJK glyphs are two columns wide.
        let padded = truncate_to_display_width("日本語", 5, false);
        assert_eq!(display_width(&padded), 5);
        assert_eq!(padded, "日本 ");

        let centred = truncate_to_display_width("ab", 6, true);
        assert_eq!(centred, "  ab  ");
    }

    #[test]
    fn clip_left_counts_display_columns() {
        assert_eq!(clip_left("hello", 2), "llo");
        assert_eq!(clip_left("日本語", 2), "本語");
        // A cut inside a wide glyph keeps the whole glyph.
        assert_eq!(clip_left("日本語", 1), "日本語");
        assert_eq!(clip_left("ab", 10), "");
    }

    #[test]
    fn format_row_skips_hidden_and_pads() {
        let row = vec!["aa".to_string(), "hidden".to_string(), "b".to_string()];
        let widths = vec![4, 6, 3];
        let out = format_row(&row, &[0, 2], &widths, "  ", false);
        assert_eq!(out, "aa    b    ");
    }

    #[test]
    fn track_focus_scrolls_right_and_left() {
        let widths = vec![20, 20, 20, 20];
        // Focus on the last column in an 50-wide terminal: scrolls right.
        let leftmost = track_focus_column(0, &widths, 3, 2, 50, 2);
        assert!(leftmost > 0);
        // Scrolling back to the first column resets to its start.
        let back = track_focus_column(leftmost, &widths, 0, 2, 50, 2);
        assert_eq!(back, 0);
    }

    #[test]
    fn section_sizes_account_for_chrome() {
        let layout = section_sizes(&SectionParams {
            term_h: 30,
            term_w: 80,
            top_gap: 0,
            has_title: true,
            show_modes: false,
            has_header: true,
            show_footer: true,
            footer_height: 3,
            view_len: 100,
            total_rows: 100,
            ..Default::default()
        });
        assert_eq!(layout.top_space, 2);
        assert_eq!(layout.bottom_space, 3);
        assert_eq!(layout.items_per_page, 25);
        assert_eq!(layout.startx, 2);
    }

    #[test]
    fn vertical_centring_moves_top_space() {
        let layout = section_sizes(&SectionParams {
            term_h: 30,
            term_w: 80,
            centre_vertical: true,
            view_len: 4,
            total_rows: 4,
            ..Default::default()
        });
        assert!(layout.top_space > 0);
        let span = layout.top_space + 4;
        assert!(span <= 30);
    }
}
