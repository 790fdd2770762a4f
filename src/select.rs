use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Visual-range mode of the selection machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VisualMode {
    #[default]
    Idle,
    Selecting,
    Deselecting,
}

/// Row- and cell-level selection state, keyed by original row index.
///
/// The maps are kept total: every live row has a `row_selected` entry and,
/// when rows are non-empty, every `(row, column)` pair has a
/// `cell_selected` entry. Visual mode records an anchor; on commit the
/// rectangle spanned by the anchor and the cursor is unioned into
/// (selecting) or subtracted from (deselecting) both maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionState {
    pub row_selected: HashMap<usize, bool>,
    pub cell_selected: HashMap<(usize, usize), bool>,
    pub visual: VisualMode,
    /// View position of the visual anchor.
    pub anchor_row: usize,
    /// Focus column at the moment the visual mode started.
    pub anchor_col: usize,
    /// Maximum number of selected rows; -1 means unlimited.
    pub max_selected: i64,
    /// Original indices that can never be selected or landed on.
    pub unselectable: HashSet<usize>,
}

impl SelectionState {
    pub fn new(max_selected: i64) -> Self {
        SelectionState {
            max_selected,
            ..Default::default()
        }
    }

    /// Re-establishes totality of the maps for `n_rows` x `n_cols`,
    /// preserving existing entries and dropping out-of-range ones.
    pub fn ensure_arity(&mut self, n_rows: usize, n_cols: usize) {
        let mut rows = HashMap::with_capacity(n_rows);
        for i in 0..n_rows {
            rows.insert(i, self.row_selected.get(&i).copied().unwrap_or(false));
        }
        self.row_selected = rows;

        if n_rows == 0 || n_cols == 0 {
            self.cell_selected.clear();
            return;
        }
        let mut cells = HashMap::with_capacity(n_rows * n_cols);
        for i in 0..n_rows {
            for j in 0..n_cols {
                cells.insert(
                    (i, j),
                    self.cell_selected.get(&(i, j)).copied().unwrap_or(false),
                );
            }
        }
        self.cell_selected = cells;
    }

    /// Number of selected rows.
    pub fn selected_count(&self) -> usize {
        self.row_selected.values().filter(|&&v| v).count()
    }

    /// Original indices of all selected rows, ascending.
    pub fn selected_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .row_selected
            .iter()
            .filter(|&(_, &selected)| selected)
            .map(|(&i, _)| i)
            .collect();
        indices.sort_unstable();
        indices
    }

    /// Selected cell columns grouped by row, for refresh tracking.
    pub fn selected_cells_by_row(&self) -> HashMap<usize, Vec<usize>> {
        let mut by_row: HashMap<usize, Vec<usize>> = HashMap::new();
        for (&(row, col), &selected) in &self.cell_selected {
            if selected {
                by_row.entry(row).or_default().push(col);
            }
        }
        for cols in by_row.values_mut() {
            cols.sort_unstable();
        }
        by_row
    }

    /// Toggles the row and focus cell at `original`/`col`, obeying
    /// `max_selected` when turning a row on.
    pub fn toggle(&mut self, original: usize, col: usize) {
        if self.unselectable.contains(&original) {
            return;
        }
        let currently = self.row_selected.get(&original).copied().unwrap_or(false);
        if !currently
            && self.max_selected >= 0
            && self.selected_count() >= self.max_selected as usize
        {
            return;
        }
        self.row_selected.insert(original, !currently);
        if let Some(cell) = self.cell_selected.get_mut(&(original, col)) {
            *cell = !*cell;
        }
    }

    /// Selects every row in the view (and every cell), up to `max_selected`.
    pub fn select_all(&mut self, view: &[usize]) {
        let cap = if self.max_selected >= 0 {
            self.max_selected as usize
        } else {
            usize::MAX
        };
        let mut taken = self.selected_count();
        for &original in view {
            if taken >= cap {
                break;
            }
            if self.unselectable.contains(&original) {
                continue;
            }
            if let Some(entry) = self.row_selected.get_mut(&original) {
                if !*entry {
                    *entry = true;
                    taken += 1;
                }
            }
        }
        if cap == usize::MAX {
            for value in self.cell_selected.values_mut() {
                *value = true;
            }
        }
    }

    /// Clears both maps.
    pub fn deselect_all(&mut self) {
        for value in self.row_selected.values_mut() {
            *value = false;
        }
        for value in self.cell_selected.values_mut() {
            *value = false;
        }
    }

    /// Handles the visual toggle for `selecting` (true) or deselecting.
    ///
    /// Idle: records the anchor and enters the mode. Active in the same
    /// mode: commits the rectangle spanned by the anchor and
    /// `cursor`/`cursor_col` over `view`, then returns to idle. The other
    /// mode's toggle is ignored while active.
    pub fn visual_toggle(
        &mut self,
        selecting: bool,
        view: &[usize],
        cursor: usize,
        cursor_col: usize,
        arity: usize,
    ) {
        match (self.visual, selecting) {
            (VisualMode::Idle, _) => {
                if view.is_empty() || arity == 0 {
                    return;
                }
                self.anchor_row = cursor;
                self.anchor_col = cursor_col;
                self.visual = if selecting {
                    VisualMode::Selecting
                } else {
                    VisualMode::Deselecting
                };
            }
            (VisualMode::Selecting, true) | (VisualMode::Deselecting, false) => {
                self.commit_rectangle(selecting, view, cursor, cursor_col);
                self.visual = VisualMode::Idle;
            }
            _ => {}
        }
    }

    /// Leaves visual mode without committing.
    pub fn cancel_visual(&mut self) {
        self.visual = VisualMode::Idle;
    }

    fn commit_rectangle(&mut self, on: bool, view: &[usize], cursor: usize, cursor_col: usize) {
        if view.is_empty() {
            return;
        }
        let row_start = self.anchor_row.min(cursor);
        let row_end = self.anchor_row.max(cursor).min(view.len() - 1);
        let col_start = self.anchor_col.min(cursor_col);
        let col_end = self.anchor_col.max(cursor_col);

        for pos in row_start..=row_end {
            let original = view[pos];
            if self.unselectable.contains(&original) {
                continue;
            }
            self.row_selected.insert(original, on);
            for col in col_start..=col_end {
                if self.cell_selected.contains_key(&(original, col)) {
                    self.cell_selected.insert((original, col), on);
                }
            }
        }
    }

    /// Rewrites both maps after rows were deleted. `removed` must be
    /// sorted ascending; surviving rows keep their state under their new
    /// (shifted) indices.
    pub fn remove_rows(&mut self, removed: &[usize], old_len: usize) {
        let removed_set: HashSet<usize> = removed.iter().copied().collect();
        let mut remap: HashMap<usize, usize> = HashMap::new();
        let mut next = 0;
        for old in 0..old_len {
            if !removed_set.contains(&old) {
                remap.insert(old, next);
                next += 1;
            }
        }

        let rows = std::mem::take(&mut self.row_selected);
        self.row_selected = rows
            .into_iter()
            .filter_map(|(old, v)| remap.get(&old).map(|&new| (new, v)))
            .collect();
        let cells = std::mem::take(&mut self.cell_selected);
        self.cell_selected = cells
            .into_iter()
            .filter_map(|((old, col), v)| remap.get(&old).map(|&new| ((new, col), v)))
            .collect();
        let unselectable = std::mem::take(&mut self.unselectable);
        self.unselectable = unselectable
            .into_iter()
            .filter_map(|old| remap.get(&old).copied())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(n_rows: usize, n_cols: usize) -> SelectionState {
        let mut sel = SelectionState::new(-1);
        sel.ensure_arity(n_rows, n_cols);
        sel
    }

    #[test]
    fn maps_are_total() {
        let sel = total(3, 2);
        assert_eq!(sel.row_selected.len(), 3);
        assert_eq!(sel.cell_selected.len(), 6);
        assert!(sel.row_selected.values().all(|&v| !v));
    }

    #[test]
    fn toggle_roundtrip() {
        let mut sel = total(3, 2);
        sel.toggle(1, 0);
        assert_eq!(sel.selected_indices(), vec![1]);
        assert_eq!(sel.cell_selected[&(1, 0)], true);
        sel.toggle(1, 0);
        assert_eq!(sel.selected_count(), 0);
    }

    #[test]
    fn select_all_then_deselect_all_is_all_false() {
        let mut sel = total(4, 2);
        let view: Vec<usize> = (0..4).collect();
        sel.select_all(&view);
        assert_eq!(sel.selected_count(), 4);
        sel.deselect_all();
        assert!(sel.row_selected.values().all(|&v| !v));
        assert!(sel.cell_selected.values().all(|&v| !v));
    }

    #[test]
    fn select_all_obeys_max_selected() {
        let mut sel = SelectionState::new(2);
        sel.ensure_arity(5, 1);
        let view: Vec<usize> = (0..5).collect();
        sel.select_all(&view);
        assert_eq!(sel.selected_count(), 2);
    }

    #[test]
    fn toggle_obeys_max_selected() {
        let mut sel = SelectionState::new(1);
        sel.ensure_arity(3, 1);
        sel.toggle(0, 0);
        sel.toggle(1, 0);
        assert_eq!(sel.selected_indices(), vec![0]);
        // Untoggling is always allowed.
        sel.toggle(0, 0);
        assert_eq!(sel.selected_count(), 0);
    }

    #[test]
    fn visual_select_rectangle_commits_pointwise() {
        // Scenario: anchor at (row 1, col 2), commit at (row 3, col 4).
        let mut sel = total(5, 6);
        let view: Vec<usize> = (0..5).collect();
        sel.visual_toggle(true, &view, 1, 2, 6);
        assert_eq!(sel.visual, VisualMode::Selecting);
        sel.visual_toggle(true, &view, 3, 4, 6);
        assert_eq!(sel.visual, VisualMode::Idle);

        for row in 0..5 {
            for col in 0..6 {
                let expected = (1..=3).contains(&row) && (2..=4).contains(&col);
                assert_eq!(sel.cell_selected[&(row, col)], expected, "({row},{col})");
            }
            assert_eq!(sel.row_selected[&row], (1..=3).contains(&row));
        }
    }

    #[test]
    fn visual_deselect_subtracts() {
        let mut sel = total(4, 3);
        let view: Vec<usize> = (0..4).collect();
        sel.select_all(&view);
        sel.visual_toggle(false, &view, 1, 0, 3);
        sel.visual_toggle(false, &view, 2, 2, 3);
        assert_eq!(sel.selected_indices(), vec![0, 3]);
        assert!(!sel.cell_selected[&(1, 1)]);
        assert!(sel.cell_selected[&(0, 0)]);
    }

    #[test]
    fn cancel_leaves_maps_untouched() {
        let mut sel = total(4, 2);
        let view: Vec<usize> = (0..4).collect();
        sel.visual_toggle(true, &view, 0, 0, 2);
        sel.cancel_visual();
        assert_eq!(sel.visual, VisualMode::Idle);
        assert_eq!(sel.selected_count(), 0);
    }

    #[test]
    fn unselectable_rows_survive_rectangle() {
        let mut sel = total(4, 2);
        sel.unselectable.insert(2);
        let view: Vec<usize> = (0..4).collect();
        sel.visual_toggle(true, &view, 0, 0, 2);
        sel.visual_toggle(true, &view, 3, 1, 2);
        assert_eq!(sel.selected_indices(), vec![0, 1, 3]);
    }

    #[test]
    fn remove_rows_shifts_surviving_entries() {
        let mut sel = total(4, 2);
        sel.toggle(1, 0);
        sel.toggle(3, 1);
        sel.remove_rows(&[1], 4);
        // Old row 3 is now row 2; old row 1 is gone.
        assert_eq!(sel.selected_indices(), vec![2]);
        assert!(sel.cell_selected[&(2, 1)]);
        assert!(!sel.cell_selected.contains_key(&(3, 0)));
    }
}
