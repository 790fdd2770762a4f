use serde::{Deserialize, Serialize};

/// Which part of a row a highlight pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HighlightField {
    /// Match against the joined row string.
    All,
    /// Match against a single column.
    Col(usize),
}

/// The origin of a highlight. Search highlights are transient: a new search
/// replaces all previous `Search` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HighlightKind {
    #[default]
    User,
    Search,
}

/// A render-time decoration painted over matching cells.
///
/// `level` controls stacking: level 0 is painted under the selection
/// marker, level 1 over the selection but under the cursor, level 2 over
/// the cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    /// Regex pattern matched against the field.
    pub pattern: String,
    pub field: HighlightField,
    /// Palette role index used to paint the match.
    pub color: u8,
    #[serde(default)]
    pub kind: HighlightKind,
    /// When set, the highlight only applies to this original row index.
    #[serde(default)]
    pub row: Option<usize>,
    #[serde(default)]
    pub level: u8,
}

impl Highlight {
    /// A transient search highlight for `pattern` on `field`.
    pub fn search(pattern: &str, field: HighlightField) -> Self {
        Highlight {
            pattern: pattern.to_string(),
            field,
            color: crate::theme::role::SEARCH_HIGHLIGHT,
            kind: HighlightKind::Search,
            row: None,
            level: 1,
        }
    }
}

/// Drops all transient search highlights, keeping user highlights intact.
pub fn clear_search_highlights(highlights: &mut Vec<Highlight>) {
    highlights.retain(|h| h.kind != HighlightKind::Search);
}
