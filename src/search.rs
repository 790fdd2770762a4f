use crate::{
    FilterQuery,
    filter::ANY_COLUMN,
    highlight::{Highlight, HighlightField, clear_search_highlights},
};
use std::collections::HashSet;

/// Result of a search pass over the indexed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Whether any selectable row matched.
    pub found: bool,
    /// View position of the first match in scan order (unchanged when not
    /// found).
    pub cursor: usize,
    /// 1-based rank of `cursor` among all matches ordered by view index;
    /// 0 when nothing matched.
    pub ordinal: usize,
    /// Total number of matching selectable rows.
    pub count: usize,
}

/// Searches the indexed view for rows matching `query`.
///
/// Uses the same tokenizer as the filter engine. The scan starts at
/// `cursor + 1` (or `cursor - 1` when `reverse`) and wraps around the view.
/// Rows whose original index is in `unselectable` are skipped entirely:
/// they are neither landed on nor counted.
///
/// Search highlights for the query's patterns are appended to `highlights`
/// after all previous search highlights have been removed, so highlights of
/// prior queries are replaced, never accumulated.
pub fn search(
    query: &str,
    rows: &[Vec<String>],
    view: &[usize],
    highlights: &mut Vec<Highlight>,
    cursor: usize,
    unselectable: &HashSet<usize>,
    reverse: bool,
) -> SearchOutcome {
    clear_search_highlights(highlights);

    let miss = SearchOutcome {
        found: false,
        cursor,
        ordinal: 0,
        count: 0,
    };

    let parsed = FilterQuery::parse(query);
    if parsed.is_empty() || view.is_empty() {
        return miss;
    }

    // One highlight record per pattern, column-scoped where the query is.
    for (&col, patterns) in &parsed.groups {
        let field = if col == ANY_COLUMN {
            HighlightField::All
        } else {
            HighlightField::Col(col as usize)
        };
        for pattern in patterns {
            highlights.push(Highlight::search(pattern, field));
        }
    }

    // Scan order: from the cursor outwards, wrapping around the view.
    let len = view.len();
    let start = cursor.min(len.saturating_sub(1));
    let scan: Vec<usize> = if reverse {
        (start..len).chain(0..start).rev().collect()
    } else {
        (start + 1..len).chain(0..start + 1).collect()
    };

    let mut found = false;
    let mut new_cursor = cursor;
    let mut matches: Vec<usize> = Vec::new();

    for pos in scan {
        let original = view[pos];
        if unselectable.contains(&original) {
            continue;
        }
        if parsed.matches(&rows[original]) {
            matches.push(pos);
            if !found {
                new_cursor = pos;
                found = true;
            }
        }
    }

    if matches.is_empty() {
        return miss;
    }

    matches.sort_unstable();
    let ordinal = matches
        .iter()
        .position(|&pos| pos == new_cursor)
        .map(|rank| rank + 1)
        .unwrap_or(0);

    SearchOutcome {
        found,
        cursor: new_cursor,
        ordinal,
        count: matches.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::HighlightKind;

    fn sample() -> (Vec<Vec<String>>, Vec<usize>) {
        let rows: Vec<Vec<String>> = [
            ["Alice", "30", "Engineer"],
            ["Bob", "25", "Designer"],
            ["Charlie", "35", "Manager"],
            ["Diana", "28", "Developer"],
            ["Eve", "32", "Analyst"],
        ]
        .iter()
        .map(|row| row.iter().map(|s| s.to_string()).collect())
        .collect();
        let view = (0..rows.len()).collect();
        (rows, view)
    }

    #[test]
    fn simple_match_found() {
        let (rows, view) = sample();
        let mut hl = Vec::new();
        let out = search("Alice", &rows, &view, &mut hl, 0, &HashSet::new(), false);
        assert!(out.found);
        assert_eq!(out.cursor, 0); // wraps back to Alice
        assert_eq!(out.count, 1);
        assert_eq!(out.ordinal, 1);
    }

    #[test]
    fn no_match() {
        let (rows, view) = sample();
        let mut hl = Vec::new();
        let out = search("NOMATCH", &rows, &view, &mut hl, 0, &HashSet::new(), false);
        assert!(!out.found);
        assert_eq!(out.count, 0);
        assert_eq!(out.ordinal, 0);
    }

    #[test]
    fn wraps_around_from_middle() {
        let (rows, view) = sample();
        let mut hl = Vec::new();
        let out = search("Alice", &rows, &view, &mut hl, 3, &HashSet::new(), false);
        assert!(out.found);
        assert_eq!(out.cursor, 0);
    }

    #[test]
    fn multiple_matches_advance_past_cursor() {
        let (rows, view) = sample();
        let mut hl = Vec::new();
        let out = search("e", &rows, &view, &mut hl, 0, &HashSet::new(), false);
        assert!(out.found);
        assert!(out.count >= 4);
        assert!(out.cursor > 0);
        assert!(out.ordinal >= 1 && out.ordinal <= out.count);
    }

    #[test]
    fn continuation_moves_between_matches() {
        let (rows, view) = sample();
        let mut hl = Vec::new();
        let first = search("e", &rows, &view, &mut hl, 0, &HashSet::new(), false);
        let second = search("e", &rows, &view, &mut hl, first.cursor, &HashSet::new(), false);
        assert!(second.found);
        assert!(second.cursor != first.cursor || second.count == 1);
        assert_eq!(second.count, first.count);
    }

    #[test]
    fn reverse_direction() {
        let (rows, view) = sample();
        let mut hl = Vec::new();
        let out = search("Alice", &rows, &view, &mut hl, 2, &HashSet::new(), true);
        assert!(out.found);
        assert_eq!(out.cursor, 0);
    }

    #[test]
    fn column_scoped_search() {
        let (rows, view) = sample();
        let mut hl = Vec::new();
        let out = search("--0 Alice", &rows, &view, &mut hl, 1, &HashSet::new(), false);
        assert!(out.found);
        assert_eq!(out.cursor, 0);
        // Alice is not in the age column.
        let out = search("--1 Alice", &rows, &view, &mut hl, 0, &HashSet::new(), false);
        assert!(!out.found);
    }

    #[test]
    fn empty_query_finds_nothing() {
        let (rows, view) = sample();
        let mut hl = Vec::new();
        let out = search("", &rows, &view, &mut hl, 0, &HashSet::new(), false);
        assert!(!out.found);
        assert_eq!(out.count, 0);
    }

    #[test]
    fn empty_view() {
        let mut hl = Vec::new();
        let out = search("query", &[], &[], &mut hl, 0, &HashSet::new(), false);
        assert!(!out.found);
        assert_eq!(out.cursor, 0);
    }

    #[test]
    fn unselectable_rows_are_skipped() {
        let (rows, view) = sample();
        let mut hl = Vec::new();
        let unselectable: HashSet<usize> = [0].into_iter().collect();
        let out = search("Alice", &rows, &view, &mut hl, 1, &unselectable, false);
        assert!(!out.found);
        assert_eq!(out.count, 0);
    }

    #[test]
    fn search_highlights_are_replaced_not_accumulated() {
        let (rows, view) = sample();
        let mut hl = vec![Highlight {
            pattern: "keep".into(),
            field: HighlightField::All,
            color: 5,
            kind: HighlightKind::User,
            row: None,
            level: 0,
        }];
        search("Alice", &rows, &view, &mut hl, 0, &HashSet::new(), false);
        search("Bob", &rows, &view, &mut hl, 0, &HashSet::new(), false);

        let searches: Vec<&Highlight> = hl
            .iter()
            .filter(|h| h.kind == HighlightKind::Search)
            .collect();
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].pattern, "Bob");
        assert!(hl.iter().any(|h| h.pattern == "keep"));
    }

    #[test]
    fn all_rows_match() {
        let (rows, view) = sample();
        let mut hl = Vec::new();
        let out = search(r"\d\d", &rows, &view, &mut hl, 0, &HashSet::new(), false);
        assert!(out.found);
        assert_eq!(out.count, rows.len());
    }
}
