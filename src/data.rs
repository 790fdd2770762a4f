use crate::{
    filter::filter_rows,
    sort::{SortMethod, sort_view},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One row of the store. All cells are strings; numeric and temporal
/// interpretation happens only inside sort and filter predicates.
pub type Row = Vec<String>;

/// Per-column metadata. The arrays always have the row arity; they are
/// auto-extended whenever the arity grows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Sort method per physical column.
    pub sort_method: Vec<SortMethod>,
    /// Sort direction per physical column.
    pub sort_reverse: Vec<bool>,
    /// Whether each physical column accepts cell edits.
    pub editable: Vec<bool>,
    /// Hidden physical columns.
    pub hidden: HashSet<usize>,
    /// Logical display order: a permutation of physical column indices.
    /// Column movement reorders this permutation; rows are never mutated.
    pub order: Vec<usize>,
    /// Logical position of the focus column (cell cursor).
    pub selected_column: usize,
    /// Physical column the view is currently ordered by.
    pub sort_column: usize,
}

impl ColumnMeta {
    /// Extends the metadata arrays to `arity` and re-establishes the order
    /// permutation and column bounds.
    pub fn ensure_arity(&mut self, arity: usize, editable_by_default: bool) {
        while self.sort_method.len() < arity {
            self.sort_method.push(SortMethod::Original);
        }
        while self.sort_reverse.len() < arity {
            self.sort_reverse.push(false);
        }
        while self.editable.len() < arity {
            self.editable.push(editable_by_default);
        }
        self.sort_method.truncate(arity);
        self.sort_reverse.truncate(arity);
        self.editable.truncate(arity);

        // Keep `order` a permutation of 0..arity: drop stale entries, then
        // append any physical columns not yet present.
        self.order.retain(|&c| c < arity);
        let present: HashSet<usize> = self.order.iter().copied().collect();
        for c in 0..arity {
            if !present.contains(&c) {
                self.order.push(c);
            }
        }

        self.hidden.retain(|&c| c < arity);
        if arity > 0 {
            self.selected_column = self.selected_column.min(arity - 1);
            self.sort_column = self.sort_column.min(arity - 1);
        } else {
            self.selected_column = 0;
            self.sort_column = 0;
        }
    }

    /// Physical column behind a logical display position.
    pub fn physical(&self, logical: usize) -> usize {
        self.order.get(logical).copied().unwrap_or(logical)
    }

    /// Physical column behind the focus position.
    pub fn focus_physical(&self) -> usize {
        self.physical(self.selected_column)
    }

    /// Swaps the focus column with its neighbour in display order.
    /// `direction` is -1 (left) or +1 (right). No-op at the edges.
    pub fn move_focus_column(&mut self, direction: i64) {
        let from = self.selected_column as i64;
        let to = from + direction;
        if to < 0 || to as usize >= self.order.len() {
            return;
        }
        self.order.swap(from as usize, to as usize);
        self.selected_column = to as usize;
    }

    /// Removes physical column `col`, shifting references above it.
    fn remove_column(&mut self, col: usize) {
        if col < self.sort_method.len() {
            self.sort_method.remove(col);
            self.sort_reverse.remove(col);
            self.editable.remove(col);
        }
        self.order.retain(|&c| c != col);
        for c in self.order.iter_mut() {
            if *c > col {
                *c -= 1;
            }
        }
        let hidden = std::mem::take(&mut self.hidden);
        self.hidden = hidden
            .into_iter()
            .filter(|&c| c != col)
            .map(|c| if c > col { c - 1 } else { c })
            .collect();
        if self.sort_column > col {
            self.sort_column -= 1;
        }
    }

    /// Makes room for a new physical column at `col`. Returns the display
    /// position the column was given.
    fn insert_column(&mut self, col: usize, editable_by_default: bool) -> usize {
        for c in self.order.iter_mut() {
            if *c >= col {
                *c += 1;
            }
        }
        let hidden = std::mem::take(&mut self.hidden);
        self.hidden = hidden
            .into_iter()
            .map(|c| if c >= col { c + 1 } else { c })
            .collect();
        if self.sort_column >= col {
            self.sort_column += 1;
        }
        let at = col.min(self.sort_method.len());
        self.sort_method.insert(at, SortMethod::Original);
        self.sort_reverse.insert(at, false);
        self.editable.insert(at, editable_by_default);
        // New columns appear at their physical position in display order.
        let display_at = col.min(self.order.len());
        self.order.insert(display_at, col);
        display_at
    }
}

/// The row store, header, indexed view and column metadata.
///
/// The indexed view is an ordered list of original row indices; filtering
/// and sorting rebuild the view and never mutate the store. The original
/// index is the canonical identifier for per-row selection.
#[derive(Debug, Clone, Default)]
pub struct DataState {
    pub rows: Vec<Row>,
    pub header: Vec<String>,
    /// Indexed view: original indices of the rows currently displayed.
    pub view: Vec<usize>,
    pub columns: ColumnMeta,
    pub editable_by_default: bool,
}

impl DataState {
    pub fn new(rows: Vec<Row>, header: Vec<String>) -> Self {
        let mut data = DataState {
            rows,
            header,
            view: Vec::new(),
            columns: ColumnMeta::default(),
            editable_by_default: true,
        };
        data.normalize();
        data.view = (0..data.rows.len()).collect();
        data
    }

    /// Row arity (0 when the store is empty).
    pub fn arity(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// Adapts the header and metadata after any shape change: the header
    /// is padded or truncated to the row arity and the metadata arrays are
    /// extended. Rows with fewer cells than the arity are padded so the
    /// store stays rectangular.
    pub fn normalize(&mut self) {
        // Drop a degenerate all-empty shape left by deleting everything.
        if self.rows.len() == 1 && self.rows[0].is_empty() {
            self.rows.clear();
        }
        let arity = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in self.rows.iter_mut() {
            while row.len() < arity {
                row.push(String::new());
            }
        }
        // The header only tracks row arity while there are rows; an empty
        // store keeps its header for the next insert/refresh.
        if !self.rows.is_empty() && !self.header.is_empty() {
            if self.header.len() > arity {
                self.header.truncate(arity);
            }
            while self.header.len() < arity {
                self.header.push(String::new());
            }
        }
        let meta_arity = if self.rows.is_empty() {
            self.header.len()
        } else {
            arity
        };
        self.columns.ensure_arity(meta_arity, self.editable_by_default);
    }

    /// Rebuilds the indexed view from the store with `filter_query`, then
    /// re-applies the current sort.
    pub fn rebuild_view(&mut self, filter_query: &str) {
        self.view = if filter_query.is_empty() {
            (0..self.rows.len()).collect()
        } else {
            filter_rows(&self.rows, filter_query)
        };
        self.apply_sort();
    }

    /// Re-sorts the indexed view by the current sort column.
    pub fn apply_sort(&mut self) {
        let col = self.columns.sort_column;
        let method = self
            .columns
            .sort_method
            .get(col)
            .copied()
            .unwrap_or_default();
        let reverse = self.columns.sort_reverse.get(col).copied().unwrap_or(false);
        sort_view(&mut self.view, &self.rows, col, method, reverse);
    }

    /// Cell text at `(original, physical column)`; empty for out-of-range.
    pub fn cell(&self, original: usize, col: usize) -> &str {
        self.rows
            .get(original)
            .and_then(|row| row.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Overwrites a cell. Out-of-range writes are ignored.
    pub fn set_cell(&mut self, original: usize, col: usize, value: String) {
        if let Some(cell) = self
            .rows
            .get_mut(original)
            .and_then(|row| row.get_mut(col))
        {
            *cell = value;
        }
    }

    /// Original index behind view position `pos`.
    pub fn view_original(&self, pos: usize) -> Option<usize> {
        self.view.get(pos).copied()
    }

    /// Physical columns in display order, hidden ones skipped.
    pub fn visible_columns(&self) -> Vec<usize> {
        self.columns
            .order
            .iter()
            .copied()
            .filter(|c| !self.columns.hidden.contains(c))
            .collect()
    }

    /// Inserts an empty row at store position `pos` (clamped to the end).
    pub fn insert_row(&mut self, pos: usize) {
        let arity = if self.rows.is_empty() {
            self.header.len().max(1)
        } else {
            self.arity()
        };
        let pos = pos.min(self.rows.len());
        self.rows.insert(pos, vec![String::new(); arity]);
        self.normalize();
    }

    /// Deletes the rows at the given original indices (must be sorted
    /// ascending).
    pub fn delete_rows(&mut self, indices: &[usize]) {
        let doomed: HashSet<usize> = indices.iter().copied().collect();
        let mut keep = Vec::with_capacity(self.rows.len().saturating_sub(doomed.len()));
        for (i, row) in self.rows.drain(..).enumerate() {
            if !doomed.contains(&i) {
                keep.push(row);
            }
        }
        self.rows = keep;
        self.normalize();
    }

    /// Inserts an empty column at physical position `pos` in every row and
    /// the header. Arity equality between header and rows holds afterwards.
    pub fn insert_column(&mut self, pos: usize) {
        let pos = pos.min(self.arity());
        if self.rows.is_empty() {
            self.rows.push(vec![String::new()]);
        } else {
            for row in self.rows.iter_mut() {
                row.insert(pos.min(row.len()), String::new());
            }
        }
        if !self.header.is_empty() {
            self.header.insert(pos.min(self.header.len()), String::new());
        }
        let editable_by_default = self.editable_by_default;
        let display_at = self.columns.insert_column(pos, editable_by_default);
        if display_at <= self.columns.selected_column {
            self.columns.selected_column += 1;
        }
        self.normalize();
    }

    /// Deletes physical column `col`. Deleting the last remaining column
    /// leaves a single empty column so the store never loses its shape.
    pub fn delete_column(&mut self, col: usize) {
        let arity = self.arity();
        if arity == 0 {
            return;
        }
        if arity == 1 {
            for row in self.rows.iter_mut() {
                row[0].clear();
            }
            if let Some(first) = self.header.first_mut() {
                first.clear();
            }
            return;
        }
        for row in self.rows.iter_mut() {
            if col < row.len() {
                row.remove(col);
            }
        }
        if col < self.header.len() {
            self.header.remove(col);
        }
        self.columns.remove_column(col);
        self.normalize();
        if self.columns.selected_column >= self.arity() && self.arity() > 0 {
            self.columns.selected_column = self.arity() - 1;
        }
    }
}
