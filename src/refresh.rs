//! Background data refresh.
//!
//! A user-supplied producer computes a fresh `(rows, header)` pair on a
//! worker task; the result lands in a single mutex-guarded slot that the
//! main loop polls at each key-event boundary. The worker never touches UI
//! state and overlapping runs are refused, so the swap is the only
//! cross-thread write in the whole engine.

use crate::{DataState, Row, SelectionState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// The refresh callback: produces a full replacement row set and header.
pub type RefreshFn = Arc<dyn Fn() -> (Vec<Row>, Vec<String>) + Send + Sync>;

/// The mutex-guarded hand-off slot shared between the worker and the main
/// loop. The worker writes, the main loop reads-and-clears `data_ready`.
#[derive(Debug, Default)]
pub struct RefreshSlot {
    pub rows: Vec<Row>,
    pub header: Vec<String>,
    pub data_ready: bool,
}

/// Spawns the producer on the runtime's blocking pool and publishes the
/// result into `slot`.
pub fn spawn_refresh(
    runtime: &tokio::runtime::Runtime,
    producer: RefreshFn,
    slot: Arc<Mutex<RefreshSlot>>,
) -> tokio::task::JoinHandle<()> {
    runtime.spawn_blocking(move || {
        let (rows, header) = producer();
        match slot.lock() {
            Ok(mut guard) => {
                guard.rows = rows;
                guard.header = header;
                guard.data_ready = true;
            }
            Err(err) => {
                tracing::error!("refresh slot poisoned, dropping result: {err}");
            }
        }
    })
}

/// Resolves `id_column` against the arity; negative values wrap modulo the
/// arity (so -1 is the last column).
pub fn resolve_id_column(id_column: i64, arity: usize) -> usize {
    if arity == 0 {
        return 0;
    }
    id_column.rem_euclid(arity as i64) as usize
}

/// Identifier values recorded before a refresh so selections and the
/// cursor survive the row-set swap.
#[derive(Debug, Clone, Default)]
pub struct TrackingSnapshot {
    /// Id values of the selected rows.
    pub selected_ids: Vec<String>,
    /// Selected cell columns keyed by the owning row's id value.
    pub selected_cells_by_id: HashMap<String, Vec<usize>>,
    /// Id value of the cursor row, when there is one.
    pub cursor_id: Option<String>,
}

/// Records the identifier values of the current selection and cursor.
pub fn record_tracking(
    data: &DataState,
    selection: &SelectionState,
    cursor: usize,
    id_column: i64,
) -> TrackingSnapshot {
    let id_col = resolve_id_column(id_column, data.arity());
    let row_id = |original: usize| data.cell(original, id_col).to_string();

    let selected_ids = selection
        .selected_indices()
        .into_iter()
        .map(row_id)
        .collect();

    let mut selected_cells_by_id: HashMap<String, Vec<usize>> = HashMap::new();
    for (original, cols) in selection.selected_cells_by_row() {
        selected_cells_by_id.insert(row_id(original), cols);
    }

    let cursor_id = data.view_original(cursor).map(row_id);

    TrackingSnapshot {
        selected_ids,
        selected_cells_by_id,
        cursor_id,
    }
}

/// Restores selections and the cursor after the new rows were swapped in.
///
/// Rows whose id value reappears are re-selected; the cursor re-anchors to
/// the row carrying the previously focused id, falling back to the last
/// valid view index. Returns the new cursor position.
pub fn reconcile(
    data: &DataState,
    selection: &mut SelectionState,
    snapshot: &TrackingSnapshot,
    cursor: usize,
    id_column: i64,
) -> usize {
    let id_col = resolve_id_column(id_column, data.arity());
    let all_ids: Vec<String> = data
        .rows
        .iter()
        .map(|row| row.get(id_col).cloned().unwrap_or_default())
        .collect();
    let position_of = |id: &str| all_ids.iter().position(|v| v == id);

    selection.ensure_arity(data.rows.len(), data.arity());
    selection.deselect_all();

    for id in &snapshot.selected_ids {
        if let Some(original) = position_of(id) {
            selection.row_selected.insert(original, true);
        }
    }
    for (id, cols) in &snapshot.selected_cells_by_id {
        if let Some(original) = position_of(id) {
            for &col in cols {
                if selection.cell_selected.contains_key(&(original, col)) {
                    selection.cell_selected.insert((original, col), true);
                }
            }
        }
    }

    let fallback = cursor.min(data.view.len().saturating_sub(1));
    snapshot
        .cursor_id
        .as_deref()
        .and_then(position_of)
        .and_then(|original| data.view.iter().position(|&v| v == original))
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_of(ids: &[&str]) -> DataState {
        let rows = ids
            .iter()
            .map(|id| vec![id.to_string(), format!("payload-{id}")])
            .collect();
        let mut data = DataState::new(rows, vec!["id".into(), "value".into()]);
        data.rebuild_view("");
        data
    }

    #[test]
    fn id_column_wraps_modulo_arity() {
        assert_eq!(resolve_id_column(0, 3), 0);
        assert_eq!(resolve_id_column(-1, 3), 2);
        assert_eq!(resolve_id_column(4, 3), 1);
        assert_eq!(resolve_id_column(-1, 0), 0);
    }

    #[test]
    fn refresh_with_id_tracking_scenario() {
        // Initial rows A, B, C with B selected and the cursor on B.
        let data = state_of(&["A", "B", "C"]);
        let mut selection = SelectionState::new(-1);
        selection.ensure_arity(3, 2);
        selection.toggle(1, 0);
        let snapshot = record_tracking(&data, &selection, 1, 0);
        assert_eq!(snapshot.selected_ids, vec!["B"]);
        assert_eq!(snapshot.cursor_id.as_deref(), Some("B"));

        // The refresh returns C, B, D.
        let new_data = state_of(&["C", "B", "D"]);
        let cursor = reconcile(&new_data, &mut selection, &snapshot, 1, 0);

        assert_eq!(selection.selected_indices(), vec![1]);
        assert_eq!(cursor, 1);
    }

    #[test]
    fn vanished_cursor_id_falls_back_to_clamped_index() {
        let data = state_of(&["A", "B", "C"]);
        let mut selection = SelectionState::new(-1);
        selection.ensure_arity(3, 2);
        let snapshot = record_tracking(&data, &selection, 2, 0);

        let new_data = state_of(&["X"]);
        let cursor = reconcile(&new_data, &mut selection, &snapshot, 2, 0);
        assert_eq!(cursor, 0);
        assert_eq!(selection.selected_count(), 0);
    }

    #[test]
    fn selected_cells_follow_their_row_id() {
        let data = state_of(&["A", "B"]);
        let mut selection = SelectionState::new(-1);
        selection.ensure_arity(2, 2);
        selection.toggle(0, 1);
        let snapshot = record_tracking(&data, &selection, 0, 0);

        let new_data = state_of(&["B", "A"]);
        reconcile(&new_data, &mut selection, &snapshot, 0, 0);
        assert!(selection.cell_selected[&(1, 1)]);
        assert!(!selection.cell_selected[&(0, 1)]);
    }

    #[test]
    fn worker_publishes_into_slot() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let slot = Arc::new(Mutex::new(RefreshSlot::default()));
        let producer: RefreshFn = Arc::new(|| {
            (
                vec![vec!["fresh".to_string()]],
                vec!["col".to_string()],
            )
        });

        let handle = spawn_refresh(&runtime, producer, Arc::clone(&slot));
        runtime.block_on(handle).expect("join");

        let guard = slot.lock().expect("lock");
        assert!(guard.data_ready);
        assert_eq!(guard.rows, vec![vec!["fresh".to_string()]]);
        assert_eq!(guard.header, vec!["col".to_string()]);
    }
}
