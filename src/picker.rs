//! The Picker engine.
//!
//! One `Picker` owns the data state, the UI state, the selection machine
//! and the I/O ports, and interprets operations resolved by the keymap.
//! Nested surfaces (notification, infobox, option chooser, help viewer)
//! are the same type running with a modal configuration bundle on the same
//! loop stack.
//!
//! Engine mutations are plain methods so the whole interactive semantics
//! can be driven headless in tests; only `run` and the prompt/dialog
//! helpers touch the terminal.

use crate::{
    DataState, Row, RowpickResult,
    clipboard::{self, Clipboard, FilePicker, MemoryClipboard, NoFilePicker, SystemClipboard},
    footer::{FooterState, FooterStyle},
    help::build_help_rows,
    highlight::{Highlight, clear_search_highlights},
    input::{FieldOutcome, InputField, PathCompletion, WordCompletion},
    keymap::{self, KeyMap, KeyPress, Operation},
    persist::{self, ExportFormat, Histories, Snapshot},
    refresh::{RefreshFn, RefreshSlot, TrackingSnapshot, record_tracking, reconcile},
    render,
    search::search,
    select::{SelectionState, VisualMode},
    settings::{self, RedoStack, Setting},
    term::Terminal,
    theme, viewport,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A pre-baked filter with a display name, cycled with Tab/Shift-Tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mode {
    pub name: String,
    #[serde(default)]
    pub filter: String,
}

/// How a picker run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    /// Return pressed; selections are in the outcome.
    Accepted,
    /// Plain exit (`q`).
    Exit,
    /// Escape with `cancel_is_back` set.
    Escape,
    /// A refresh was requested but this picker has no producer; the
    /// caller redraws and re-enters (nested pickers use this on resize).
    Refresh,
    /// Immediate exit to the terminal.
    FullExit,
}

/// What `run` hands back to the caller.
#[derive(Debug, Clone)]
pub struct PickerOutcome {
    pub selected: Vec<usize>,
    pub opts: String,
    pub action: ExitAction,
}

/// Modal configuration bundles for nested pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Notification,
    Infobox,
    Chooser,
    Help,
}

/// Immutable-per-run configuration: keymap, limits, identity.
pub struct PickerConfig {
    pub title: String,
    pub top_gap: usize,
    pub separator: String,
    pub keymap: KeyMap,
    pub key_remappings: HashMap<KeyPress, KeyPress>,
    pub disabled_keys: HashSet<KeyPress>,
    pub cancel_is_back: bool,
    pub display_only: bool,
    pub max_selected: i64,
    pub id_column: i64,
    pub track_entries_upon_refresh: bool,
    pub editable_by_default: bool,
    /// Seconds between auto-refreshes.
    pub timer: f64,
    /// Seconds between footer-string refreshes.
    pub footer_timer: f64,
    pub get_data_startup: bool,
    /// Caps the drawable area for nested pickers: `(rows, cols)`.
    pub max_dimensions: Option<(usize, usize)>,
}

impl Default for PickerConfig {
    fn default() -> Self {
        PickerConfig {
            title: String::new(),
            top_gap: 0,
            separator: "    ".to_string(),
            keymap: keymap::picker_keys(),
            key_remappings: HashMap::new(),
            disabled_keys: HashSet::new(),
            cancel_is_back: false,
            display_only: false,
            max_selected: -1,
            id_column: 0,
            track_entries_upon_refresh: true,
            editable_by_default: true,
            timer: 5.0,
            footer_timer: 1.0,
            get_data_startup: false,
            max_dimensions: None,
        }
    }
}

/// Mutable view state: cursor, viewport, toggles, query strings.
pub struct UiState {
    pub cursor: usize,
    pub leftmost_char: usize,
    pub max_column_width: usize,
    pub show_header: bool,
    pub show_row_header: bool,
    pub show_footer: bool,
    pub display_modes: bool,
    pub footer_style: FooterStyle,
    pub footer_string: String,
    pub footer_string_auto_refresh: bool,
    pub centre_in_terminal: bool,
    pub centre_in_cols: bool,
    pub centre_in_terminal_vertical: bool,
    pub highlights: Vec<Highlight>,
    pub highlights_hide: bool,
    pub auto_refresh: bool,
    pub cell_cursor: bool,
    pub highlight_full_row: bool,
    pub paginate: bool,
    pub scroll_bar: bool,
    pub theme_number: usize,
    pub number_columns: bool,
    pub filter_query: String,
    pub search_query: String,
    pub search_index: usize,
    pub search_count: usize,
    pub user_opts: String,
    pub user_settings: String,
    pub mode_index: usize,
    pub modes: Vec<Mode>,
    /// Last observed terminal size `(h, w)`; engine ops that need
    /// geometry (column tracking) use it between frames.
    pub last_size: (usize, usize),
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            cursor: 0,
            leftmost_char: 0,
            max_column_width: 70,
            show_header: true,
            show_row_header: false,
            show_footer: true,
            display_modes: false,
            footer_style: FooterStyle::Standard,
            footer_string: String::new(),
            footer_string_auto_refresh: false,
            centre_in_terminal: false,
            centre_in_cols: false,
            centre_in_terminal_vertical: false,
            highlights: Vec::new(),
            highlights_hide: false,
            auto_refresh: false,
            cell_cursor: false,
            highlight_full_row: false,
            paginate: false,
            scroll_bar: true,
            theme_number: 0,
            number_columns: true,
            filter_query: String::new(),
            search_query: String::new(),
            search_index: 0,
            search_count: 0,
            user_opts: String::new(),
            user_settings: String::new(),
            mode_index: 0,
            modes: Vec::new(),
            last_size: (24, 80),
        }
    }
}

/// Callback asked for an option string when a row with `require_option`
/// is accepted. Receives the current opts, returns `(accepted, value)`.
pub type OptionFn = Arc<dyn Fn(&str) -> (bool, String) + Send + Sync>;

/// I/O ports: everything the engine reaches the outside world through.
pub struct Ports {
    pub refresh_function: Option<RefreshFn>,
    pub footer_string_function: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    pub clipboard: Box<dyn Clipboard>,
    pub file_picker: Box<dyn FilePicker>,
    pub option_functions: HashMap<usize, OptionFn>,
    pub require_option: HashSet<usize>,
}

impl Default for Ports {
    fn default() -> Self {
        Ports {
            refresh_function: None,
            footer_string_function: None,
            clipboard: Box::new(SystemClipboard::default()),
            file_picker: Box::new(NoFilePicker),
            option_functions: HashMap::new(),
            require_option: HashSet::new(),
        }
    }
}

impl Ports {
    /// Ports with no external reach, for tests and display-only modals.
    pub fn headless() -> Self {
        Ports {
            clipboard: Box::new(MemoryClipboard::default()),
            ..Default::default()
        }
    }
}

pub struct Picker {
    pub config: PickerConfig,
    pub data: DataState,
    pub ui: UiState,
    pub selection: SelectionState,
    pub ports: Ports,
    pub histories: Histories,
    redo_stack: RedoStack,
    refresh_slot: Arc<Mutex<RefreshSlot>>,
    tracking: Option<TrackingSnapshot>,
    pub refreshing_data: bool,
    runtime: Option<tokio::runtime::Runtime>,
    last_refresh: Instant,
    last_footer_refresh: Instant,
}

impl Picker {
    pub fn new(rows: Vec<Row>, header: Vec<String>) -> Self {
        let config = PickerConfig::default();
        let mut picker = Picker {
            data: DataState::new(rows, header),
            ui: UiState::default(),
            selection: SelectionState::new(config.max_selected),
            ports: Ports::default(),
            histories: Histories::default(),
            redo_stack: RedoStack::default(),
            refresh_slot: Arc::new(Mutex::new(RefreshSlot::default())),
            tracking: None,
            refreshing_data: false,
            runtime: None,
            last_refresh: Instant::now(),
            last_footer_refresh: Instant::now(),
            config,
        };
        picker.initialise();
        picker
    }

    /// A nested picker with the restricted configuration of `kind`.
    pub fn modal(kind: ModalKind, rows: Vec<Row>, header: Vec<String>, title: &str) -> Self {
        let mut picker = Picker::new(rows, header);
        picker.ports = Ports::headless();
        picker.config.title = title.to_string();
        picker.config.cancel_is_back = true;
        picker.ui.show_footer = false;
        picker.ui.number_columns = false;
        picker.ui.scroll_bar = true;
        // Resize must redraw the parent frame behind the modal.
        picker.config.key_remappings.insert(
            KeyPress::RESIZE,
            KeyPress::plain(crossterm::event::KeyCode::F(5)),
        );
        match kind {
            ModalKind::Notification => {
                picker.config.keymap = keymap::notification_keys();
                picker.config.disabled_keys =
                    [KeyPress::char('z'), KeyPress::char('c')].into_iter().collect();
                picker.ui.highlight_full_row = true;
                picker.ui.centre_in_terminal = true;
                picker.ui.centre_in_terminal_vertical = true;
                picker.ui.centre_in_cols = true;
                picker.config.max_dimensions = Some((7, 50));
            }
            ModalKind::Infobox => {
                picker.config.keymap = keymap::notification_keys();
                picker.config.display_only = true;
                picker.config.max_dimensions = Some((12, 60));
            }
            ModalKind::Chooser => {
                picker.config.keymap = keymap::options_keys();
                picker.config.max_dimensions = Some((14, 72));
            }
            ModalKind::Help => {
                picker.config.keymap = keymap::help_keys();
                picker.config.max_selected = 1;
                picker.ui.highlight_full_row = true;
                picker.ui.centre_in_terminal = true;
                picker.ui.centre_in_terminal_vertical = true;
                picker.ui.show_footer = true;
            }
        }
        picker.initialise();
        picker
    }

    // --- Derived state ------------------------------------------------

    /// Rebuilds every derived structure after a shape change: header and
    /// metadata arity, selection-map totality, the indexed view (filter +
    /// sort), and the cursor clamp.
    pub fn initialise(&mut self) {
        self.data.normalize();
        self.data.editable_by_default = self.config.editable_by_default;
        self.selection
            .ensure_arity(self.data.rows.len(), self.data.arity());
        self.selection.max_selected = self.config.max_selected;
        self.data.rebuild_view(&self.ui.filter_query);

        if !self.ui.search_query.is_empty() {
            let outcome = search(
                &self.ui.search_query,
                &self.data.rows,
                &self.data.view,
                &mut self.ui.highlights,
                self.ui.cursor,
                &self.selection.unselectable,
                false,
            );
            if outcome.found {
                self.ui.cursor = outcome.cursor;
                self.ui.search_index = outcome.ordinal;
                self.ui.search_count = outcome.count;
            }
        }
        self.clamp_cursor();
    }

    fn clamp_cursor(&mut self) {
        if self.data.view.is_empty() {
            self.ui.cursor = 0;
            return;
        }
        self.ui.cursor = self.ui.cursor.min(self.data.view.len() - 1);
        // Step off unselectable rows (wrapping once).
        let len = self.data.view.len();
        for offset in 0..len {
            let pos = (self.ui.cursor + offset) % len;
            if !self
                .selection
                .unselectable
                .contains(&self.data.view[pos])
            {
                self.ui.cursor = pos;
                return;
            }
        }
    }

    /// The original index under the cursor.
    pub fn cursor_original(&self) -> Option<usize> {
        self.data.view_original(self.ui.cursor)
    }

    /// The physical column under the cell cursor.
    pub fn focus_column(&self) -> usize {
        self.data.columns.focus_physical()
    }

    /// Cell text under the cell cursor.
    pub fn focus_cell(&self) -> String {
        match self.cursor_original() {
            Some(original) => self.data.cell(original, self.focus_column()).to_string(),
            None => String::new(),
        }
    }

    /// Registers available to prompts: `*` is the focus cell.
    pub fn registers(&self) -> HashMap<char, String> {
        let mut registers = HashMap::new();
        registers.insert('*', self.focus_cell());
        registers
    }

    /// Words from the visible cells and header for prompt completion; the
    /// id column is skipped because ids rarely make useful query words.
    pub fn word_list(&self) -> Vec<String> {
        let id_col =
            crate::refresh::resolve_id_column(self.config.id_column, self.data.arity());
        let mut words: HashSet<String> = HashSet::new();
        for &original in &self.data.view {
            if let Some(row) = self.data.rows.get(original) {
                for (c, cell) in row.iter().enumerate() {
                    if c == id_col && row.len() > 1 {
                        continue;
                    }
                    for word in cell.split_whitespace() {
                        let trimmed = word.trim_matches(|ch: char| ch.is_ascii_punctuation());
                        if !trimmed.is_empty() {
                            words.insert(trimmed.to_string());
                        }
                    }
                }
            }
        }
        for cell in &self.data.header {
            for word in cell.split_whitespace() {
                let trimmed = word.trim_matches(|ch: char| ch.is_ascii_punctuation());
                if !trimmed.is_empty() {
                    words.insert(trimmed.to_string());
                }
            }
        }
        let mut words: Vec<String> = words.into_iter().collect();
        words.sort_by_key(|w| {
            let alpha = w.chars().next().map(char::is_alphabetic).unwrap_or(false);
            (!alpha, w.to_lowercase())
        });
        words
    }

    // --- Navigation ---------------------------------------------------

    pub fn cursor_down(&mut self) -> bool {
        let mut next = self.ui.cursor + 1;
        loop {
            if next >= self.data.view.len() {
                return false;
            }
            if self.selection.unselectable.contains(&self.data.view[next]) {
                next += 1;
            } else {
                break;
            }
        }
        self.ui.cursor = next;
        true
    }

    pub fn cursor_up(&mut self) -> bool {
        let mut next = self.ui.cursor as i64 - 1;
        loop {
            if next < 0 {
                return false;
            }
            if self
                .selection
                .unselectable
                .contains(&self.data.view[next as usize])
            {
                next -= 1;
            } else {
                break;
            }
        }
        self.ui.cursor = next as usize;
        true
    }

    pub fn cursor_top(&mut self) {
        self.ui.cursor = 0;
        self.clamp_cursor();
    }

    pub fn cursor_bottom(&mut self) {
        if !self.data.view.is_empty() {
            self.ui.cursor = self.data.view.len() - 1;
            while self.ui.cursor > 0
                && self
                    .selection
                    .unselectable
                    .contains(&self.data.view[self.ui.cursor])
            {
                self.ui.cursor -= 1;
            }
        }
    }

    fn page_step(&mut self, down: bool) {
        let (h, w) = self.ui.last_size;
        let layout = self.frame_layout(h, w);
        let step = layout.items_per_page.max(1);
        if down {
            self.ui.cursor = (self.ui.cursor + step).min(self.data.view.len().saturating_sub(1));
        } else {
            self.ui.cursor = self.ui.cursor.saturating_sub(step);
        }
        self.clamp_cursor();
    }

    // --- Geometry helpers --------------------------------------------

    /// Effective drawable size after the modal dimension cap.
    pub fn effective_size(&self, h: usize, w: usize) -> (usize, usize) {
        match self.config.max_dimensions {
            Some((max_h, max_w)) => (h.min(max_h), w.min(max_w)),
            None => (h, w),
        }
    }

    /// Column widths over the currently visible page.
    pub fn current_widths(&self, h: usize, w: usize) -> Vec<usize> {
        let (h, _w) = self.effective_size(h, w);
        let layout = self.frame_layout(h, w);
        let (start, end) = viewport::page_bounds(
            self.ui.cursor,
            layout.items_per_page,
            self.data.view.len(),
            self.ui.paginate,
        );
        let page_rows: Vec<&Row> = self.data.view[start..end]
            .iter()
            .filter_map(|&original| self.data.rows.get(original))
            .collect();
        viewport::column_widths(
            &page_rows,
            &self.data.header,
            self.data.arity().max(self.data.header.len()),
            self.ui.max_column_width,
            self.ui.number_columns,
        )
    }

    /// Frame geometry for the given terminal size.
    pub fn frame_layout(&self, h: usize, w: usize) -> viewport::Layout {
        let (h, w) = self.effective_size(h, w);
        let footer_state = self.footer_state(viewport::Layout::default());
        let footer_height = self.ui.footer_style.height(&footer_state);
        let widths = viewport::column_widths(
            &[],
            &self.data.header,
            self.data.header.len(),
            self.ui.max_column_width,
            self.ui.number_columns,
        );
        let visible: Vec<usize> = self.data.visible_columns();
        let visible_total: usize = visible
            .iter()
            .map(|&c| widths.get(c).copied().unwrap_or(0))
            .sum::<usize>()
            + self.config.separator.len() * visible.len().saturating_sub(1);
        viewport::section_sizes(&viewport::SectionParams {
            term_h: h,
            term_w: w,
            top_gap: self.config.top_gap,
            has_title: !self.config.title.is_empty(),
            show_modes: self.ui.display_modes && !self.ui.modes.is_empty(),
            has_header: !self.data.header.is_empty() && self.ui.show_header,
            show_footer: self.ui.show_footer,
            footer_height,
            has_footer_string: !self.ui.footer_string.is_empty(),
            view_len: self.data.view.len(),
            total_rows: self.data.rows.len(),
            centre_vertical: self.ui.centre_in_terminal_vertical,
            centre_horizontal: self.ui.centre_in_terminal,
            highlight_full_row: self.ui.highlight_full_row,
            show_row_header: self.ui.show_row_header,
            visible_total_width: visible_total,
        })
    }

    /// Snapshot for the footer renderer.
    pub fn footer_state(&self, layout: viewport::Layout) -> FooterState {
        let sort_col = self.data.columns.sort_column;
        FooterState {
            filter_query: self.ui.filter_query.clone(),
            search_query: self.ui.search_query.clone(),
            search_index: self.ui.search_index,
            search_count: self.ui.search_count,
            user_opts: self.ui.user_opts.clone(),
            sort_column: sort_col,
            sort_method_label: self
                .data
                .columns
                .sort_method
                .get(sort_col)
                .copied()
                .unwrap_or_default()
                .label(),
            sort_reverse: self
                .data
                .columns
                .sort_reverse
                .get(sort_col)
                .copied()
                .unwrap_or(false),
            cursor: self.ui.cursor,
            view_len: self.data.view.len(),
            items_per_page: layout.items_per_page,
            selected_count: self.selection.selected_count(),
            visual: self.selection.visual,
            paginate: self.ui.paginate,
            footer_string: self.ui.footer_string.clone(),
        }
    }

    // --- Filtering and searching -------------------------------------

    /// Applies a filter query, preserving the cursor's row identity when
    /// it survives the filter.
    pub fn set_filter(&mut self, query: &str) {
        let prev_original = self.cursor_original();
        self.ui.filter_query = query.to_string();
        // Leaving a mode's filter behind leaves the mode.
        if let Some(mode) = self.ui.modes.get(self.ui.mode_index) {
            if !mode.filter.is_empty() && !self.ui.filter_query.contains(&mode.filter) {
                self.ui.mode_index = 0;
            }
        }
        self.data.rebuild_view(&self.ui.filter_query);
        self.ui.cursor = prev_original
            .and_then(|original| self.data.view.iter().position(|&v| v == original))
            .unwrap_or(0);
        self.clamp_cursor();
    }

    pub fn clear_filter(&mut self) {
        // A mode's own filter survives a plain cancel; cancelling again
        // clears everything.
        let mode_filter = self
            .ui
            .modes
            .get(self.ui.mode_index)
            .map(|m| m.filter.clone())
            .unwrap_or_default();
        if !mode_filter.is_empty()
            && self.ui.filter_query.contains(&mode_filter)
            && self.ui.filter_query.trim() != mode_filter
        {
            self.set_filter(&mode_filter.clone());
        } else {
            self.ui.mode_index = 0;
            self.set_filter("");
        }
    }

    /// Runs a fresh search from the cursor.
    pub fn run_search(&mut self, query: &str) {
        self.ui.search_query = query.to_string();
        let outcome = search(
            query,
            &self.data.rows,
            &self.data.view,
            &mut self.ui.highlights,
            self.ui.cursor,
            &self.selection.unselectable,
            false,
        );
        if outcome.found {
            self.ui.cursor = outcome.cursor;
            self.ui.search_index = outcome.ordinal;
            self.ui.search_count = outcome.count;
        } else {
            self.ui.search_index = 0;
            self.ui.search_count = 0;
        }
    }

    /// Advances to the next (or previous) match of the current query.
    pub fn continue_search(&mut self, reverse: bool) {
        if self.ui.search_query.is_empty() {
            return;
        }
        let outcome = search(
            &self.ui.search_query.clone(),
            &self.data.rows,
            &self.data.view,
            &mut self.ui.highlights,
            self.ui.cursor,
            &self.selection.unselectable,
            reverse,
        );
        if outcome.found {
            self.ui.cursor = outcome.cursor;
            self.ui.search_index = outcome.ordinal;
            self.ui.search_count = outcome.count;
        }
    }

    fn clear_search(&mut self) {
        self.ui.search_query.clear();
        self.ui.search_index = 0;
        self.ui.search_count = 0;
        clear_search_highlights(&mut self.ui.highlights);
    }

    /// The escape ladder: visual mode, then search, then filter, then
    /// (with `cancel_is_back`) the picker itself.
    pub fn cancel(&mut self) -> Option<ExitAction> {
        if self.selection.visual != VisualMode::Idle {
            self.selection.cancel_visual();
        } else if !self.ui.search_query.is_empty() {
            self.clear_search();
        } else if !self.ui.filter_query.is_empty() {
            self.clear_filter();
        } else if self.config.cancel_is_back {
            return Some(ExitAction::Escape);
        }
        None
    }

    // --- Sorting and column focus ------------------------------------

    /// Keeps the cursor on the same row across a re-sort.
    fn resort_preserving_cursor(&mut self) {
        let prev = self.cursor_original();
        self.data.apply_sort();
        if let Some(original) = prev {
            if let Some(pos) = self.data.view.iter().position(|&v| v == original) {
                self.ui.cursor = pos;
            }
        }
        self.clamp_cursor();
    }

    pub fn cycle_sort_method(&mut self, backwards: bool) {
        let focus = self.focus_column();
        if self.data.columns.sort_column == focus {
            let method = self.data.columns.sort_method[focus];
            self.data.columns.sort_method[focus] = if backwards {
                method.cycle_prev()
            } else {
                method.cycle_next()
            };
        } else {
            self.data.columns.sort_column = focus;
        }
        self.resort_preserving_cursor();
    }

    pub fn cycle_sort_order(&mut self) {
        let col = self.data.columns.sort_column;
        if let Some(reverse) = self.data.columns.sort_reverse.get_mut(col) {
            *reverse = !*reverse;
        }
        self.resort_preserving_cursor();
    }

    /// `0`-`9`: sort by that physical column.
    pub fn select_sort_column(&mut self, col: usize) {
        if col < self.data.arity() {
            self.data.columns.sort_column = col;
            self.resort_preserving_cursor();
        }
    }

    /// Moves the cell-cursor focus and keeps it horizontally visible.
    pub fn focus_next_column(&mut self, delta: i64) {
        let arity = self.data.arity();
        if arity == 0 {
            return;
        }
        let logical = self.data.columns.selected_column as i64 + delta;
        self.data.columns.selected_column = logical.rem_euclid(arity as i64) as usize;
        self.track_focus();
    }

    fn track_focus(&mut self) {
        let (h, w) = self.ui.last_size;
        let widths = self.current_widths(h, w);
        let layout = self.frame_layout(h, w);
        let visible = self.data.visible_columns();
        let visible_widths: Vec<usize> = visible
            .iter()
            .map(|&c| widths.get(c).copied().unwrap_or(0))
            .collect();
        let focus_physical = self.focus_column();
        let Some(focus_visible) = visible.iter().position(|&c| c == focus_physical) else {
            return;
        };
        let (_, w) = self.effective_size(h, w);
        self.ui.leftmost_char = viewport::track_focus_column(
            self.ui.leftmost_char,
            &visible_widths,
            focus_visible,
            self.config.separator.len(),
            w,
            layout.startx,
        );
    }

    pub fn scroll_horizontal(&mut self, delta: i64) {
        if delta < 0 {
            self.ui.leftmost_char = self.ui.leftmost_char.saturating_sub((-delta) as usize);
        } else {
            self.ui.leftmost_char += delta as usize;
        }
    }

    pub fn scroll_far_left(&mut self) {
        self.ui.leftmost_char = 0;
        self.data.columns.selected_column = 0;
    }

    pub fn scroll_far_right(&mut self) {
        let (h, w) = self.ui.last_size;
        let widths = self.current_widths(h, w);
        let layout = self.frame_layout(h, w);
        let visible = self.data.visible_columns();
        let total: usize = visible
            .iter()
            .map(|&c| widths.get(c).copied().unwrap_or(0) + self.config.separator.len())
            .sum();
        let (_, w) = self.effective_size(h, w);
        self.ui.leftmost_char = viewport::scroll_far_right(total, w, layout.startx);
        if self.data.arity() > 0 {
            self.data.columns.selected_column = self.data.arity() - 1;
        }
    }

    pub fn adjust_max_column_width(&mut self, delta: i64) {
        let next = self.ui.max_column_width as i64 + delta;
        if (10..=1000).contains(&next) {
            self.ui.max_column_width = next as usize;
        }
    }

    pub fn toggle_column_visibility(&mut self, col: usize) {
        if col >= self.data.arity() {
            return;
        }
        if !self.data.columns.hidden.remove(&col) {
            self.data.columns.hidden.insert(col);
        }
    }

    // --- Selection ----------------------------------------------------

    pub fn toggle_current(&mut self) {
        if let Some(original) = self.cursor_original() {
            self.selection.toggle(original, self.focus_column());
        }
        self.cursor_down();
    }

    pub fn visual_toggle(&mut self, selecting: bool) {
        let view = self.data.view.clone();
        self.selection.visual_toggle(
            selecting,
            &view,
            self.ui.cursor,
            self.focus_column(),
            self.data.arity(),
        );
    }

    // --- Data edits ---------------------------------------------------

    pub fn insert_row(&mut self, pos: usize) {
        self.data.insert_row(pos);
        if pos <= self.ui.cursor {
            self.ui.cursor += 1;
        }
        let cursor = self.ui.cursor;
        self.initialise();
        self.ui.cursor = cursor.min(self.data.view.len().saturating_sub(1));
    }

    pub fn insert_column(&mut self, pos: usize) {
        self.data.insert_column(pos);
        let cursor = self.ui.cursor;
        self.initialise();
        self.ui.cursor = cursor.min(self.data.view.len().saturating_sub(1));
    }

    /// Deletes the selected rows, or the cursor row when nothing is
    /// selected.
    pub fn delete_selected_rows(&mut self) {
        let mut doomed = self.selection.selected_indices();
        if doomed.is_empty() {
            match self.cursor_original() {
                Some(original) => doomed.push(original),
                None => return,
            }
        }
        let old_len = self.data.rows.len();
        self.data.delete_rows(&doomed);
        self.selection.remove_rows(&doomed, old_len);
        self.selection.deselect_all();
        self.initialise();
    }

    pub fn delete_focus_column(&mut self) {
        let col = self.focus_column();
        self.data.delete_column(col);
        self.initialise();
    }

    /// Writes a value into the focus cell, honouring editability and the
    /// formula escape: a value starting with ``` evaluates the remainder
    /// as arithmetic and stores the result's string form.
    pub fn edit_focus_cell(&mut self, value: &str) -> bool {
        let col = self.focus_column();
        if !self
            .data
            .columns
            .editable
            .get(col)
            .copied()
            .unwrap_or(self.config.editable_by_default)
        {
            return false;
        }
        let Some(original) = self.cursor_original() else {
            return false;
        };
        let stored = match value.strip_prefix("```") {
            Some(expr) => settings::evaluate_formula_to_string(expr)
                .unwrap_or_else(|| value.to_string()),
            None => value.to_string(),
        };
        self.data.set_cell(original, col, stored);
        true
    }

    /// Pastes a grid of cells over the store, anchored at the cursor row
    /// and focus column; rows and columns grow as needed.
    pub fn paste_cells(&mut self, grid: &[Row]) {
        let Some(anchor_row) = self.cursor_original() else {
            if !grid.is_empty() {
                self.data.rows = grid.to_vec();
                self.initialise();
            }
            return;
        };
        let anchor_col = self.focus_column();
        for (dr, paste_row) in grid.iter().enumerate() {
            let target = anchor_row + dr;
            while target >= self.data.rows.len() {
                let arity = self.data.arity().max(1);
                self.data.rows.push(vec![String::new(); arity]);
            }
            for (dc, cell) in paste_row.iter().enumerate() {
                let col = anchor_col + dc;
                let row = &mut self.data.rows[target];
                while row.len() <= col {
                    row.push(String::new());
                }
                row[col] = cell.clone();
            }
        }
        let cursor = self.ui.cursor;
        self.initialise();
        self.ui.cursor = cursor.min(self.data.view.len().saturating_sub(1));
    }

    // --- Modes ----------------------------------------------------------

    /// Cycles to the next (+1) or previous (-1) mode and swaps its filter
    /// into the query.
    pub fn cycle_mode(&mut self, delta: i64) {
        if self.ui.modes.is_empty() {
            return;
        }
        let len = self.ui.modes.len() as i64;
        let prev = self.ui.mode_index;
        self.ui.mode_index = (self.ui.mode_index as i64 + delta).rem_euclid(len) as usize;
        let prev_filter = self.ui.modes[prev].filter.clone();
        let next_filter = self.ui.modes[self.ui.mode_index].filter.clone();
        let mut query = self.ui.filter_query.replace(&prev_filter, "");
        query = format!("{} {}", query.trim(), next_filter.trim())
            .trim()
            .to_string();
        let mode_index = self.ui.mode_index;
        self.set_filter(&query);
        self.ui.mode_index = mode_index;
    }

    // --- Settings -------------------------------------------------------

    /// Applies the settings string in `ui.user_settings`, left to right.
    /// A fully applied string lands on the redo stack.
    pub fn apply_settings(&mut self) {
        let input = std::mem::take(&mut self.ui.user_settings);
        if input.trim().is_empty() {
            return;
        }
        let parsed = settings::parse_settings(&input);
        for command in &parsed.commands {
            self.apply_setting(command.clone());
        }
        if parsed.complete && !parsed.commands.is_empty() {
            self.redo_stack.push(&input);
        }
    }

    /// Reapplies the last fully applied settings string.
    pub fn redo(&mut self) {
        if let Some(last) = self.redo_stack.last().map(str::to_string) {
            self.ui.user_settings = last;
            self.apply_settings();
        }
    }

    fn apply_setting(&mut self, command: Setting) {
        match command {
            Setting::ToggleColumns(cols) => {
                for col in cols {
                    self.toggle_column_visibility(col);
                }
            }
            Setting::ToggleAutoRefresh => self.ui.auto_refresh = !self.ui.auto_refresh,
            Setting::ToggleHighlights => self.ui.highlights_hide = !self.ui.highlights_hide,
            Setting::SortColumn(col) => self.select_sort_column(col),
            Setting::CentreTerminal => {
                self.ui.centre_in_terminal = !self.ui.centre_in_terminal
            }
            Setting::CentreCells => self.ui.centre_in_cols = !self.ui.centre_in_cols,
            Setting::CentreVertical => {
                self.ui.centre_in_terminal_vertical = !self.ui.centre_in_terminal_vertical
            }
            Setting::AddRowBefore => self.insert_row_at_cursor(false),
            Setting::AddRowAfter => self.insert_row_at_cursor(true),
            Setting::AddColumnBefore => {
                self.insert_column(self.focus_column());
            }
            Setting::AddColumnAfter => {
                self.insert_column(self.focus_column() + 1);
            }
            Setting::InsertRow(pos) => {
                let pos = pos.unwrap_or(self.ui.cursor);
                self.insert_row(pos);
            }
            Setting::InsertColumn(pos) => {
                let pos = pos.unwrap_or(self.focus_column());
                self.insert_column(pos);
            }
            Setting::ToggleModes => self.ui.display_modes = !self.ui.display_modes,
            Setting::ToggleCellCursor => self.ui.cell_cursor = !self.ui.cell_cursor,
            Setting::ToggleRowHeader => self.ui.show_row_header = !self.ui.show_row_header,
            Setting::ToggleHeader => self.ui.show_header = !self.ui.show_header,
            Setting::ToggleFooter => self.ui.show_footer = !self.ui.show_footer,
            Setting::FooterStyle(style) => {
                self.ui.footer_style = match style {
                    Some(index) => FooterStyle::from_index(index),
                    None => FooterStyle::from_index(self.ui.footer_style.index() + 1),
                };
            }
            Setting::ChangeDir(path) => {
                let expanded = shellexpand_path(&path);
                if let Err(err) = std::env::set_current_dir(&expanded) {
                    tracing::error!("cwd={expanded}: {err}");
                }
            }
            Setting::AddHighlight(highlight) => self.ui.highlights.push(highlight),
            Setting::Theme(number) => {
                self.ui.theme_number = match number {
                    Some(n) => n.min(theme::theme_count() - 1),
                    None => (self.ui.theme_number + 1) % theme::theme_count(),
                };
            }
        }
    }

    /// Inserts an empty row before or after the cursor row's store
    /// position.
    fn insert_row_at_cursor(&mut self, after: bool) {
        let store_pos = self
            .cursor_original()
            .map(|original| if after { original + 1 } else { original })
            .unwrap_or(0);
        self.insert_row(store_pos);
    }

    // --- Refresh --------------------------------------------------------

    /// Starts the background refresh unless one is already in flight.
    /// Returns false when this picker has no producer.
    pub fn start_refresh(&mut self) -> bool {
        if self.refreshing_data {
            // Protocol: overlapping refreshes are refused.
            return true;
        }
        let Some(producer) = self.ports.refresh_function.clone() else {
            return false;
        };
        if self.config.track_entries_upon_refresh {
            self.tracking = Some(record_tracking(
                &self.data,
                &self.selection,
                self.ui.cursor,
                self.config.id_column,
            ));
        }
        if self.runtime.is_none() {
            match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
                Ok(runtime) => self.runtime = Some(runtime),
                Err(err) => {
                    tracing::error!("failed to build refresh runtime: {err}");
                    return false;
                }
            }
        }
        if let Some(runtime) = &self.runtime {
            crate::refresh::spawn_refresh(runtime, producer, Arc::clone(&self.refresh_slot));
            self.refreshing_data = true;
        }
        true
    }

    /// Observes a completed refresh, if any, at a key-event boundary.
    /// Returns true when new data was installed.
    pub fn poll_refresh(&mut self) -> bool {
        if !self.refreshing_data {
            return false;
        }
        let taken = match self.refresh_slot.lock() {
            Ok(mut slot) if slot.data_ready => {
                slot.data_ready = false;
                Some((std::mem::take(&mut slot.rows), std::mem::take(&mut slot.header)))
            }
            Ok(_) => None,
            Err(err) => {
                tracing::error!("refresh slot poisoned: {err}");
                self.refreshing_data = false;
                None
            }
        };
        let Some((rows, header)) = taken else {
            return false;
        };

        self.data.rows = rows;
        self.data.header = header;
        self.initialise();
        if let Some(snapshot) = self.tracking.take() {
            self.ui.cursor = reconcile(
                &self.data,
                &mut self.selection,
                &snapshot,
                self.ui.cursor,
                self.config.id_column,
            );
        }
        self.refreshing_data = false;
        self.last_refresh = Instant::now();
        true
    }

    /// Whether the auto-refresh timer has expired.
    pub fn auto_refresh_due(&self) -> bool {
        self.ui.auto_refresh
            && self.ports.refresh_function.is_some()
            && self.last_refresh.elapsed().as_secs_f64() >= self.config.timer
    }

    fn refresh_footer_string(&mut self) {
        if let Some(producer) = &self.ports.footer_string_function {
            self.ui.footer_string = producer();
            self.last_footer_refresh = Instant::now();
        }
    }

    // --- Export and snapshots -------------------------------------------

    /// The 2-D table to export: selected rows when a selection exists,
    /// the whole store otherwise; hidden columns dropped unless asked for.
    pub fn export_table(&self, include_hidden: bool) -> (Vec<Row>, Vec<String>) {
        let selected = self.selection.selected_indices();
        let row_indices: Vec<usize> = if selected.is_empty() {
            (0..self.data.rows.len()).collect()
        } else {
            selected
        };
        let columns: Vec<usize> = if include_hidden {
            self.data.columns.order.clone()
        } else {
            self.data.visible_columns()
        };
        let rows: Vec<Row> = row_indices
            .iter()
            .filter_map(|&i| self.data.rows.get(i))
            .map(|row| {
                columns
                    .iter()
                    .map(|&c| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        let header: Vec<String> = if self.data.header.is_empty() {
            Vec::new()
        } else {
            columns
                .iter()
                .map(|&c| self.data.header.get(c).cloned().unwrap_or_default())
                .collect()
        };
        (rows, header)
    }

    pub fn export_to(
        &self,
        path: &Path,
        format: ExportFormat,
        include_hidden: bool,
    ) -> RowpickResult<()> {
        let (rows, header) = self.export_table(include_hidden);
        persist::export_rows(path, format, &rows, &header)
    }

    /// Captures every engine-visible field into a snapshot. Function
    /// fields (refresh and option callbacks) are excluded.
    pub fn capture_snapshot(&self) -> Snapshot {
        Snapshot {
            items: self.data.rows.clone(),
            header: self.data.header.clone(),
            cursor: self.ui.cursor,
            filter_query: self.ui.filter_query.clone(),
            search_query: self.ui.search_query.clone(),
            user_opts: self.ui.user_opts.clone(),
            user_settings: self.ui.user_settings.clone(),
            selected_column: self.data.columns.selected_column,
            sort_column: self.data.columns.sort_column,
            sort_method: self.data.columns.sort_method.clone(),
            sort_reverse: self.data.columns.sort_reverse.clone(),
            editable_columns: self.data.columns.editable.clone(),
            hidden_columns: self.data.columns.hidden.clone(),
            column_order: self.data.columns.order.clone(),
            row_selected: self.selection.row_selected.clone(),
            cell_selected: self.selection.cell_selected.clone(),
            unselectable: self.selection.unselectable.clone(),
            highlights: self.ui.highlights.clone(),
            highlights_hide: self.ui.highlights_hide,
            modes: self.ui.modes.clone(),
            mode_index: self.ui.mode_index,
            theme_number: self.ui.theme_number,
            footer_style: self.ui.footer_style.index(),
            footer_string: self.ui.footer_string.clone(),
            show_header: self.ui.show_header,
            show_row_header: self.ui.show_row_header,
            show_footer: self.ui.show_footer,
            display_modes: self.ui.display_modes,
            centre_in_terminal: self.ui.centre_in_terminal,
            centre_in_cols: self.ui.centre_in_cols,
            centre_in_terminal_vertical: self.ui.centre_in_terminal_vertical,
            cell_cursor: self.ui.cell_cursor,
            highlight_full_row: self.ui.highlight_full_row,
            paginate: self.ui.paginate,
            scroll_bar: self.ui.scroll_bar,
            number_columns: self.ui.number_columns,
            auto_refresh: self.ui.auto_refresh,
            max_column_width: self.ui.max_column_width,
            leftmost_char: self.ui.leftmost_char,
            title: self.config.title.clone(),
            history_filter_and_search: self.histories.history_filter_and_search.clone(),
            history_pipes: self.histories.history_pipes.clone(),
            history_opts: self.histories.history_opts.clone(),
            history_edits: self.histories.history_edits.clone(),
            history_settings: self.histories.history_settings.clone(),
        }
    }

    /// Installs a snapshot and reinitialises every derived structure.
    pub fn install_snapshot(&mut self, snapshot: Snapshot) {
        self.data.rows = snapshot.items;
        self.data.header = snapshot.header;
        self.data.columns.selected_column = snapshot.selected_column;
        self.data.columns.sort_column = snapshot.sort_column;
        self.data.columns.sort_method = snapshot.sort_method;
        self.data.columns.sort_reverse = snapshot.sort_reverse;
        self.data.columns.editable = snapshot.editable_columns;
        self.data.columns.hidden = snapshot.hidden_columns;
        self.data.columns.order = snapshot.column_order;
        self.selection.row_selected = snapshot.row_selected;
        self.selection.cell_selected = snapshot.cell_selected;
        self.selection.unselectable = snapshot.unselectable;
        self.ui.cursor = snapshot.cursor;
        self.ui.filter_query = snapshot.filter_query;
        self.ui.search_query = snapshot.search_query;
        self.ui.user_opts = snapshot.user_opts;
        self.ui.user_settings = snapshot.user_settings;
        self.ui.highlights = snapshot.highlights;
        self.ui.highlights_hide = snapshot.highlights_hide;
        self.ui.modes = snapshot.modes;
        self.ui.mode_index = snapshot.mode_index;
        self.ui.theme_number = snapshot.theme_number;
        self.ui.footer_style = FooterStyle::from_index(snapshot.footer_style);
        self.ui.footer_string = snapshot.footer_string;
        self.ui.show_header = snapshot.show_header;
        self.ui.show_row_header = snapshot.show_row_header;
        self.ui.show_footer = snapshot.show_footer;
        self.ui.display_modes = snapshot.display_modes;
        self.ui.centre_in_terminal = snapshot.centre_in_terminal;
        self.ui.centre_in_cols = snapshot.centre_in_cols;
        self.ui.centre_in_terminal_vertical = snapshot.centre_in_terminal_vertical;
        self.ui.cell_cursor = snapshot.cell_cursor;
        self.ui.highlight_full_row = snapshot.highlight_full_row;
        self.ui.paginate = snapshot.paginate;
        self.ui.scroll_bar = snapshot.scroll_bar;
        self.ui.number_columns = snapshot.number_columns;
        self.ui.auto_refresh = snapshot.auto_refresh;
        self.ui.max_column_width = snapshot.max_column_width;
        self.ui.leftmost_char = snapshot.leftmost_char;
        self.config.title = snapshot.title;
        self.histories.history_filter_and_search = snapshot.history_filter_and_search;
        self.histories.history_pipes = snapshot.history_pipes;
        self.histories.history_opts = snapshot.history_opts;
        self.histories.history_edits = snapshot.history_edits;
        self.histories.history_settings = snapshot.history_settings;
        self.initialise();
    }

    /// Gathers selections for the accept path: selected originals, or the
    /// cursor row when nothing is selected.
    pub fn accept_indices(&self) -> Vec<usize> {
        let selected = self.selection.selected_indices();
        if selected.is_empty() {
            self.cursor_original().into_iter().collect()
        } else {
            selected
        }
    }
}

fn shellexpand_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.to_string_lossy(), rest);
        }
    }
    path.to_string()
}

// --- Interactive layer --------------------------------------------------

/// Which history list a prompt reads and appends to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryKind {
    FilterAndSearch,
    Opts,
    Settings,
    Edits,
    Pipes,
}

impl Picker {
    fn history_mut(&mut self, kind: HistoryKind) -> &mut Vec<String> {
        match kind {
            HistoryKind::FilterAndSearch => &mut self.histories.history_filter_and_search,
            HistoryKind::Opts => &mut self.histories.history_opts,
            HistoryKind::Settings => &mut self.histories.history_settings,
            HistoryKind::Edits => &mut self.histories.history_edits,
            HistoryKind::Pipes => &mut self.histories.history_pipes,
        }
    }

    /// Keyboard-poll timeout: bounded by the refresh and footer timers so
    /// timer-driven work happens without busy waiting.
    fn poll_timeout(&self) -> Duration {
        let timer_ms = (self.config.timer * 1000.0) as u64 / 2;
        let footer_ms = (self.config.footer_timer * 1000.0) as u64;
        Duration::from_millis(2000.min(timer_ms).min(footer_ms).max(20))
    }

    /// The main loop. Every key produces at most one frame; refresh
    /// completions are observed at the key boundary only.
    pub fn run(&mut self, term: &mut Terminal) -> RowpickResult<PickerOutcome> {
        if self.config.get_data_startup && self.ports.refresh_function.is_some() {
            self.start_refresh();
        }
        if self.ui.footer_string_auto_refresh {
            self.refresh_footer_string();
        }
        self.ui.last_size = term.size();
        self.initialise();
        render::draw_screen(self, term)?;

        if self.config.display_only {
            return Ok(PickerOutcome {
                selected: Vec::new(),
                opts: self.ui.user_opts.clone(),
                action: ExitAction::Accepted,
            });
        }

        loop {
            let key = term.poll_key(self.poll_timeout())?;
            self.ui.last_size = term.size();

            // Refresh protocol: observe a completion, or start a run.
            if self.refreshing_data {
                self.poll_refresh();
            } else if self.auto_refresh_due() {
                self.start_refresh();
            }
            if self.ui.footer_string_auto_refresh
                && self.last_footer_refresh.elapsed().as_secs_f64() >= self.config.footer_timer
            {
                self.refresh_footer_string();
            }

            let Some(key) = key else {
                render::draw_screen(self, term)?;
                continue;
            };

            let op = keymap::resolve_key(
                key,
                &self.config.key_remappings,
                &self.config.disabled_keys,
                &self.config.keymap,
            );
            let Some(op) = op else {
                if key == KeyPress::RESIZE {
                    term.clear()?;
                    render::draw_screen(self, term)?;
                }
                continue;
            };
            tracing::debug!("dispatch: {op:?}");

            match op {
                Operation::CursorDown => {
                    self.cursor_down();
                }
                Operation::CursorUp => {
                    self.cursor_up();
                }
                Operation::FiveDown => {
                    for _ in 0..5 {
                        self.cursor_down();
                    }
                }
                Operation::FiveUp => {
                    for _ in 0..5 {
                        self.cursor_up();
                    }
                }
                Operation::HalfPageDown => {
                    let half = self.frame_layout(self.ui.last_size.0, self.ui.last_size.1)
                        .items_per_page
                        / 2;
                    for _ in 0..half.max(1) {
                        self.cursor_down();
                    }
                }
                Operation::HalfPageUp => {
                    let half = self.frame_layout(self.ui.last_size.0, self.ui.last_size.1)
                        .items_per_page
                        / 2;
                    for _ in 0..half.max(1) {
                        self.cursor_up();
                    }
                }
                Operation::PageDown => self.page_step(true),
                Operation::PageUp => self.page_step(false),
                Operation::CursorTop => self.cursor_top(),
                Operation::CursorBottom => self.cursor_bottom(),

                Operation::ToggleSelect => self.toggle_current(),
                Operation::SelectAll => {
                    let view = self.data.view.clone();
                    self.selection.select_all(&view);
                }
                Operation::SelectNone => self.selection.deselect_all(),
                Operation::VisualSelectionToggle => self.visual_toggle(true),
                Operation::VisualDeselectionToggle => self.visual_toggle(false),

                Operation::CycleSortMethod => self.cycle_sort_method(false),
                Operation::CycleSortMethodReverse => self.cycle_sort_method(true),
                Operation::CycleSortOrder => self.cycle_sort_order(),
                Operation::ColSelect => {
                    if let Some(digit) = key.digit() {
                        self.select_sort_column(digit);
                    }
                }
                Operation::ColSelectNext => self.focus_next_column(1),
                Operation::ColSelectPrev => self.focus_next_column(-1),
                Operation::MoveColumnLeft => {
                    self.data.columns.move_focus_column(-1);
                    self.track_focus();
                }
                Operation::MoveColumnRight => {
                    self.data.columns.move_focus_column(1);
                    self.track_focus();
                }
                Operation::ColHide => {
                    if let crossterm::event::KeyCode::Char(ch) = key.code {
                        if let Some(col) = ")!@#$%^&*(".chars().position(|c| c == ch) {
                            self.toggle_column_visibility(col);
                        }
                    }
                }

                Operation::ScrollLeft => self.scroll_horizontal(-5),
                Operation::ScrollRight => self.scroll_horizontal(5),
                Operation::ScrollFarLeft => self.scroll_far_left(),
                Operation::ScrollFarRight => self.scroll_far_right(),
                Operation::IncreaseColumnWidth => self.adjust_max_column_width(10),
                Operation::DecreaseColumnWidth => self.adjust_max_column_width(-10),

                Operation::AddRowBefore => self.insert_row_at_cursor(false),
                Operation::AddRowAfter => self.insert_row_at_cursor(true),
                Operation::AddColumnBefore => {
                    let col = self.focus_column();
                    self.insert_column(col);
                }
                Operation::AddColumnAfter => {
                    let col = self.focus_column();
                    self.insert_column(col + 1);
                }
                Operation::DeleteRow => self.delete_selected_rows(),
                Operation::DeleteColumn => self.delete_focus_column(),

                Operation::FilterInput => self.filter_prompt(term)?,
                Operation::SearchInput => self.search_prompt(term)?,
                Operation::ContinueSearchForward => self.continue_search(false),
                Operation::ContinueSearchBackward => self.continue_search(true),
                Operation::SettingsInput => self.settings_prompt(term)?,
                Operation::SettingsOptions => self.settings_chooser(term)?,
                Operation::OptsInput => self.opts_prompt(term)?,
                Operation::OptsSelect => self.opts_chooser(term)?,
                Operation::PipeInput => self.pipe_prompt(term)?,
                Operation::EditCell => self.edit_prompt(term)?,

                Operation::CopyDialog => self.copy_dialogue(term)?,
                Operation::Paste => self.paste_dialogue(term)?,
                Operation::SaveDialog => self.save_dialog(term)?,
                Operation::LoadDialog => self.load_dialog(term)?,
                Operation::OpenFiles => self.open_selection(term)?,

                Operation::ModeNext => self.cycle_mode(1),
                Operation::ModePrev => self.cycle_mode(-1),
                Operation::ToggleFooter => {
                    self.ui.user_settings = "footer".to_string();
                    self.apply_settings();
                }
                Operation::NotificationToggle => {
                    self.notification(term, "", "Notification")?;
                }
                Operation::Redo => self.redo(),
                Operation::ResetOpts => self.ui.user_opts.clear(),

                Operation::Refresh => {
                    if !self.start_refresh() {
                        // No producer: hand the refresh request to the
                        // caller (nested pickers redraw the outer frame).
                        return Ok(self.outcome(Vec::new(), ExitAction::Refresh));
                    }
                }
                Operation::RedrawScreen => {
                    // Drop out of the alternate screen and back in so a
                    // corrupted terminal state is fully reset.
                    term.suspend()?;
                    term.resume()?;
                    term.clear()?;
                }
                Operation::Help => self.help_screen(term)?,
                Operation::Cancel => {
                    if let Some(action) = self.cancel() {
                        return Ok(self.outcome(Vec::new(), action));
                    }
                }
                Operation::Accept => {
                    if self.selection.visual != VisualMode::Idle {
                        let selecting = self.selection.visual == VisualMode::Selecting;
                        self.visual_toggle(selecting);
                    }
                    if let Some(outcome) = self.accept(term)? {
                        return Ok(outcome);
                    }
                }
                Operation::Exit => {
                    return Ok(self.outcome(Vec::new(), ExitAction::Exit));
                }
                Operation::FullExit => {
                    return Ok(self.outcome(Vec::new(), ExitAction::FullExit));
                }
            }

            render::draw_screen(self, term)?;
        }
    }

    fn outcome(&self, selected: Vec<usize>, action: ExitAction) -> PickerOutcome {
        PickerOutcome {
            selected,
            opts: self.ui.user_opts.clone(),
            action,
        }
    }

    /// The accept path: collect indices, satisfy `require_option` rows
    /// through their option callbacks, and return.
    fn accept(&mut self, term: &mut Terminal) -> RowpickResult<Option<PickerOutcome>> {
        if self.data.rows.is_empty() {
            return Ok(Some(self.outcome(Vec::new(), ExitAction::Accepted)));
        }
        let indices = self.accept_indices();

        let mut options_sufficient = true;
        let mut opts = self.ui.user_opts.clone();
        for &index in &indices {
            if !self.ports.require_option.contains(&index) {
                continue;
            }
            if let Some(function) = self.ports.option_functions.get(&index).cloned() {
                let (accepted, value) = function(&opts);
                options_sufficient = accepted;
                opts = value;
            } else {
                match self.prompt(term, " Opts: ", &opts, HistoryKind::Opts, 1)? {
                    Some(value) => opts = value,
                    None => options_sufficient = false,
                }
            }
            if !options_sufficient {
                break;
            }
        }

        if options_sufficient {
            self.ui.user_opts = opts;
            Ok(Some(self.outcome(indices, ExitAction::Accepted)))
        } else {
            Ok(None)
        }
    }

    // --- Prompts ------------------------------------------------------

    /// Runs the input field on the bottom rows of the screen.
    /// `line_from_bottom` follows the original layout: settings/opts on
    /// the last line, filter/edit/pipe one above, search two above.
    fn prompt(
        &mut self,
        term: &mut Terminal,
        prefix: &str,
        initial: &str,
        history: HistoryKind,
        line_from_bottom: usize,
    ) -> RowpickResult<Option<String>> {
        let mut field = InputField::new(initial)
            .with_history(self.history_mut(history).clone())
            .with_registers(self.registers())
            .with_source(Box::new(PathCompletion))
            .with_source(Box::new(WordCompletion::new(self.word_list())));

        loop {
            render::draw_screen(self, term)?;
            let (h, w) = self.effective_size(self.ui.last_size.0, self.ui.last_size.1);
            let y = h.saturating_sub(line_from_bottom);
            let style = theme::get_theme(self.ui.theme_number).style(theme::role::FOOTER);
            let line = format!("{}{}", prefix, field.text());
            let clipped = viewport::truncate_to_display_width(&line, w.saturating_sub(3), false);
            term.put(y, 2, &clipped, style)?;
            let cursor_x = 2 + viewport::display_width(prefix)
                + viewport::display_width(
                    &field.text().chars().take(field.cursor()).collect::<String>(),
                );
            term.show_cursor_at(y, cursor_x.min(w.saturating_sub(1)))?;
            term.flush()?;

            let Some(key) = term.poll_key(Duration::from_millis(250))? else {
                continue;
            };
            self.ui.last_size = term.size();
            let Some(event) = InputField::event_for_key(key) else {
                continue;
            };
            match field.handle(event) {
                FieldOutcome::Pending => {}
                FieldOutcome::Accepted(text) => {
                    term.hide_cursor()?;
                    if !text.trim().is_empty() {
                        self.history_mut(history).push(text.clone());
                    }
                    return Ok(Some(text));
                }
                FieldOutcome::Cancelled(_) => {
                    term.hide_cursor()?;
                    return Ok(None);
                }
            }
        }
    }

    fn filter_prompt(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        let initial = if self.ui.filter_query.is_empty() {
            String::new()
        } else {
            format!("{} ", self.ui.filter_query)
        };
        if let Some(text) =
            self.prompt(term, " Filter: ", &initial, HistoryKind::FilterAndSearch, 2)?
        {
            self.set_filter(text.trim());
        }
        Ok(())
    }

    fn search_prompt(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        let initial = if self.ui.search_query.is_empty() {
            String::new()
        } else {
            format!("{} ", self.ui.search_query)
        };
        if let Some(text) =
            self.prompt(term, " Search: ", &initial, HistoryKind::FilterAndSearch, 3)?
        {
            self.run_search(text.trim());
        }
        Ok(())
    }

    fn settings_prompt(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        if let Some(text) = self.prompt(term, " Settings: ", "", HistoryKind::Settings, 1)? {
            self.ui.user_settings = text;
            self.apply_settings();
        }
        Ok(())
    }

    fn opts_prompt(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        let initial = if self.ui.user_opts.is_empty() {
            String::new()
        } else {
            format!("{} ", self.ui.user_opts)
        };
        if let Some(text) = self.prompt(term, " Opts: ", &initial, HistoryKind::Opts, 1)? {
            self.ui.user_opts = text.trim().to_string();
        }
        Ok(())
    }

    fn edit_prompt(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        let col = self.focus_column();
        let editable = self
            .data
            .columns
            .editable
            .get(col)
            .copied()
            .unwrap_or(self.config.editable_by_default);
        if self.data.view.is_empty() || !editable {
            return Ok(());
        }
        let current = self.focus_cell();
        if let Some(text) = self.prompt(term, " Edit value: ", &current, HistoryKind::Edits, 2)? {
            self.edit_focus_cell(&text);
        }
        Ok(())
    }

    fn pipe_prompt(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        if let Some(text) = self.prompt(term, " Command: ", "xargs ", HistoryKind::Pipes, 2)? {
            let argv: Vec<String> = text.split_whitespace().map(str::to_string).collect();
            let col = self.focus_column();
            let values: Vec<String> = self
                .accept_indices()
                .iter()
                .map(|&i| self.data.cell(i, col).to_string())
                .collect();
            match clipboard::spawn_with_stdin(&argv, &values) {
                Ok(count) => {
                    self.notification(term, &format!("{count} strings piped to {text:?}"), "Pipe")?
                }
                Err(err) => self.notification(term, &err.to_string(), "Error")?,
            }
        }
        Ok(())
    }

    // --- Dialogs and nested pickers -----------------------------------

    /// Runs a chooser modal over `options`; returns the chosen row
    /// indices. A refresh outcome redraws the parent and re-enters.
    fn choose_option(
        &mut self,
        term: &mut Terminal,
        options: Vec<Row>,
        header: Vec<String>,
        title: &str,
    ) -> RowpickResult<Vec<usize>> {
        loop {
            let mut modal = Picker::modal(ModalKind::Chooser, options.clone(), header.clone(), title);
            let outcome = modal.run(term)?;
            match outcome.action {
                ExitAction::Refresh => {
                    term.clear()?;
                    render::draw_screen(self, term)?;
                    continue;
                }
                ExitAction::Accepted => return Ok(outcome.selected),
                ExitAction::FullExit => return Ok(Vec::new()),
                _ => return Ok(Vec::new()),
            }
        }
    }

    /// Transient notification box.
    pub fn notification(
        &mut self,
        term: &mut Terminal,
        message: &str,
        title: &str,
    ) -> RowpickResult<()> {
        let message = if message.is_empty() { "!!" } else { message };
        let rows: Vec<Row> = wrap_message(message, 44)
            .into_iter()
            .map(|line| vec![line])
            .collect();
        loop {
            let mut modal = Picker::modal(ModalKind::Notification, rows.clone(), Vec::new(), title);
            let outcome = modal.run(term)?;
            if outcome.action != ExitAction::Refresh {
                break;
            }
            term.clear()?;
            render::draw_screen(self, term)?;
        }
        term.clear()?;
        render::draw_screen(self, term)
    }

    /// Non-interactive infobox.
    pub fn infobox(&mut self, term: &mut Terminal, rows: Vec<Row>, title: &str) -> RowpickResult<()> {
        let mut modal = Picker::modal(ModalKind::Infobox, rows, Vec::new(), title);
        modal.run(term)?;
        Ok(())
    }

    fn help_screen(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        let rows = build_help_rows(&self.config.keymap);
        let title = if self.config.title.is_empty() {
            "Help".to_string()
        } else {
            format!("{} Help", self.config.title)
        };
        let mut modal = Picker::modal(ModalKind::Help, rows, Vec::new(), &title);
        modal.ui.paginate = self.ui.paginate;
        modal.run(term)?;
        term.clear()?;
        render::draw_screen(self, term)
    }

    fn copy_dialogue(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        let header = vec!["Representation".to_string(), "Columns".to_string()];
        let options: Vec<Row> = [
            ("Tab-separated values", "Exclude hidden"),
            ("Tab-separated values", "Include hidden"),
            ("Comma-separated values", "Exclude hidden"),
            ("Comma-separated values", "Include hidden"),
            ("Custom separator", "Exclude hidden"),
            ("Custom separator", "Include hidden"),
        ]
        .iter()
        .map(|(a, b)| vec![a.to_string(), b.to_string()])
        .collect();

        let chosen = self.choose_option(term, options, header, "Copy selected")?;
        if chosen.is_empty() {
            return Ok(());
        }

        for index in chosen {
            let include_hidden = index % 2 == 1;
            let separator = match index / 2 {
                0 => "\t".to_string(),
                1 => ",".to_string(),
                _ => match self.prompt(term, " Separator: ", "", HistoryKind::Opts, 1)? {
                    Some(sep) if !sep.is_empty() => sep,
                    _ => continue,
                },
            };
            let (rows, _header) = self.export_table(include_hidden);
            let refs: Vec<&Row> = rows.iter().collect();
            let columns: Vec<usize> = (0..rows.first().map(Vec::len).unwrap_or(0)).collect();
            let text = clipboard::rows_to_text(&refs, &columns, &separator);
            if let Err(err) = self.ports.clipboard.copy(&text) {
                self.notification(term, &err.to_string(), "Error")?;
            }
        }
        Ok(())
    }

    fn paste_dialogue(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        let header = vec!["Representation".to_string(), "Columns".to_string()];
        let options = vec![vec!["Paste values".to_string(), String::new()]];
        let chosen = self.choose_option(term, options, header, "Paste values")?;
        if chosen.is_empty() {
            return Ok(());
        }
        match self.ports.clipboard.paste() {
            Ok(text) => {
                let grid = clipboard::text_to_rows(&text, '\t');
                if grid.is_empty() {
                    self.notification(term, "Error pasting data.", "Paste")?;
                } else {
                    self.paste_cells(&grid);
                }
            }
            Err(err) => self.notification(term, &err.to_string(), "Error")?,
        }
        Ok(())
    }

    fn save_dialog(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        let options: Vec<Row> = [
            "Save data (csv).",
            "Save data (tsv).",
            "Save data (json).",
            "Save data (feather).",
            "Save data (parquet).",
            "Save data (msgpack).",
            "Save state",
        ]
        .iter()
        .map(|s| vec![s.to_string()])
        .collect();
        let chosen = self.choose_option(term, options, Vec::new(), "Save...")?;
        let Some(&index) = chosen.first() else {
            return Ok(());
        };

        let Some(path_text) = self.prompt(term, " Save as: ", "", HistoryKind::Opts, 1)? else {
            return Ok(());
        };
        let path = std::path::PathBuf::from(shellexpand_path(path_text.trim()));

        let result = match index {
            0 => self.export_to(&path, ExportFormat::Csv, false),
            1 => self.export_to(&path, ExportFormat::Tsv, false),
            2 => self.export_to(&path, ExportFormat::Json, false),
            3 => self.export_to(&path, ExportFormat::Feather, false),
            4 => self.export_to(&path, ExportFormat::Parquet, false),
            5 => self.export_to(&path, ExportFormat::Msgpack, false),
            _ => persist::save_snapshot(&path, &self.capture_snapshot()),
        };
        if let Err(err) = result {
            self.notification(term, &err.to_string(), "Error")?;
        }
        Ok(())
    }

    fn load_dialog(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        let options = vec![vec!["Load state".to_string()]];
        let chosen = self.choose_option(term, options, Vec::new(), "Open file...")?;
        if chosen.is_empty() {
            return Ok(());
        }
        let path = match self.ports.file_picker.pick_file() {
            Some(path) => path,
            None => match self.prompt(term, " Load from: ", "", HistoryKind::Opts, 1)? {
                Some(text) if !text.trim().is_empty() => {
                    std::path::PathBuf::from(shellexpand_path(text.trim()))
                }
                _ => return Ok(()),
            },
        };
        match persist::load_snapshot(&path) {
            Ok(snapshot) => {
                self.install_snapshot(snapshot);
                self.notification(term, &format!("{path:?} has been loaded!"), "Loaded")?;
            }
            Err(err) => self.notification(term, &err.to_string(), "Error")?,
        }
        Ok(())
    }

    fn opts_chooser(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        if self.ui.modes.is_empty() && self.data.rows.is_empty() {
            return Ok(());
        }
        // Offer the focus-column values of the current view.
        let options: Vec<Row> = self
            .data
            .view
            .iter()
            .take(50)
            .map(|&i| vec![self.data.cell(i, self.focus_column()).to_string()])
            .collect();
        let chosen = self.choose_option(term, options.clone(), Vec::new(), "Options")?;
        if !chosen.is_empty() {
            let mut opts = self.ui.user_opts.trim().to_string();
            for index in chosen {
                if let Some(row) = options.get(index) {
                    if !opts.is_empty() {
                        opts.push(' ');
                    }
                    opts.push_str(&row[0]);
                }
            }
            self.ui.user_opts = opts;
        }
        Ok(())
    }

    fn settings_chooser(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        let mut options: Vec<Row> = vec![
            vec!["cv".into(), "Centre rows vertically".into()],
            vec!["ct".into(), "Centre column-set in terminal".into()],
            vec!["cc".into(), "Centre values in cells".into()],
            vec!["!r".into(), "Toggle auto-refresh".into()],
            vec!["th".into(), "Cycle between themes. (accepts th#)".into()],
            vec!["nohl".into(), "Toggle highlights".into()],
            vec!["footer".into(), "Toggle footer".into()],
            vec!["header".into(), "Toggle header".into()],
            vec!["rh".into(), "Toggle row header".into()],
            vec!["modes".into(), "Toggle modes".into()],
            vec!["ft".into(), "Cycle through footer styles (accepts ft#)".into()],
            vec!["ara".into(), "Add empty row after cursor.".into()],
            vec!["arb".into(), "Add empty row before the cursor.".into()],
            vec!["aca".into(), "Add empty column after the selected column.".into()],
            vec!["acb".into(), "Add empty column before the selected column.".into()],
        ];
        for col in 0..self.data.arity() {
            options.push(vec![format!("s{col}"), format!("Select col. {col}")]);
            options.push(vec![format!("!{col}"), format!("Toggle col. {col}")]);
        }
        let header = vec!["Key".to_string(), "Setting".to_string()];
        let chosen = self.choose_option(term, options.clone(), header, "Settings")?;
        if !chosen.is_empty() {
            let commands: Vec<String> = chosen
                .iter()
                .filter_map(|&i| options.get(i).map(|row| row[0].clone()))
                .collect();
            self.ui.user_settings = commands.join(" ");
            self.apply_settings();
        }
        Ok(())
    }

    fn open_selection(&mut self, term: &mut Terminal) -> RowpickResult<()> {
        let col = self.focus_column();
        let files: Vec<String> = self
            .accept_indices()
            .iter()
            .map(|&i| self.data.cell(i, col).to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if files.is_empty() {
            return Ok(());
        }
        for file in &files {
            if let Err(err) = std::process::Command::new("xdg-open")
                .arg(file)
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .spawn()
            {
                self.notification(term, &err.to_string(), "Error")?;
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Wraps a message into lines of at most `width` characters for the
/// notification box.
fn wrap_message(message: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for source_line in message.lines() {
        let chars: Vec<char> = source_line.chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
            continue;
        }
        for chunk in chars.chunks(width.max(1)) {
            lines.push(format!("  {}", chunk.iter().collect::<String>()));
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortMethod;

    fn people() -> Vec<Row> {
        [
            ["Alice", "30", "Engineer", "alice@example.com"],
            ["Bob", "25", "Designer", "bob@example.com"],
            ["Charlie", "35", "Manager", "charlie@example.com"],
            ["Diana", "28", "Developer", "diana@example.com"],
            ["Eve", "32", "Analyst", "eve@example.com"],
        ]
        .iter()
        .map(|row| row.iter().map(|s| s.to_string()).collect())
        .collect()
    }

    fn header() -> Vec<String> {
        ["name", "age", "role", "email"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn filter_then_clear_then_search() {
        let mut picker = Picker::new(people(), header());
        assert_eq!(picker.data.view.len(), 5);

        picker.set_filter("Alice");
        assert_eq!(picker.data.view.len(), 1);
        assert_eq!(picker.ui.cursor, 0);

        picker.set_filter("");
        assert_eq!(picker.data.view.len(), 5);

        picker.run_search("e");
        assert!(picker.ui.search_count >= 4);
        assert!(picker.ui.search_index >= 1);
        let first = picker.ui.cursor;
        picker.continue_search(false);
        assert_ne!(picker.ui.cursor, first);
    }

    #[test]
    fn column_scoped_filter_scenario() {
        let mut picker = Picker::new(people(), header());
        picker.set_filter("--2 Engineer");
        assert_eq!(picker.data.view.len(), 1);
        assert_eq!(picker.data.view[0], 0);
        assert_eq!(picker.focus_cell(), "Alice");
    }

    #[test]
    fn filter_preserves_cursor_row_identity() {
        let mut picker = Picker::new(people(), header());
        picker.ui.cursor = 2; // Charlie
        picker.set_filter("a");
        let original = picker.cursor_original().expect("cursor row");
        assert_eq!(picker.data.rows[original][0], "Charlie");
    }

    #[test]
    fn size_sort_scenario() {
        let rows: Vec<Row> = ["1.5GB", "500MB", "2.1GB", "750MB"]
            .iter()
            .map(|s| vec![s.to_string()])
            .collect();
        let mut picker = Picker::new(rows, vec!["size".into()]);
        picker.data.columns.sort_method[0] = SortMethod::Size;
        picker.data.columns.sort_column = 0;
        picker.resort_preserving_cursor();

        let order: Vec<String> = picker
            .data
            .view
            .iter()
            .map(|&i| picker.data.rows[i][0].clone())
            .collect();
        assert_eq!(order, vec!["500MB", "750MB", "1.5GB", "2.1GB"]);

        picker.cycle_sort_order();
        let order: Vec<String> = picker
            .data
            .view
            .iter()
            .map(|&i| picker.data.rows[i][0].clone())
            .collect();
        assert_eq!(order, vec!["2.1GB", "1.5GB", "750MB", "500MB"]);
    }

    #[test]
    fn sort_preserves_cursor_identity() {
        let mut picker = Picker::new(people(), header());
        picker.ui.cursor = 4; // Eve
        picker.data.columns.sort_method[0] = SortMethod::Lexical;
        picker.select_sort_column(0);
        let original = picker.cursor_original().expect("cursor row");
        assert_eq!(picker.data.rows[original][0], "Eve");
    }

    #[test]
    fn insert_edit_save_reload_scenario() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.csv");

        let mut picker = Picker::new(people(), header());
        picker.cursor_bottom();
        picker.insert_row_at_cursor(true);
        picker.cursor_bottom();
        assert!(picker.edit_focus_cell("testcelldata"));
        picker
            .export_to(&path, ExportFormat::Csv, true)
            .expect("export");

        let (rows, _header) =
            crate::ingest::load(&path, None, crate::ingest::FileType::Csv).expect("reload");
        assert_eq!(rows.last().expect("rows")[0], "testcelldata");
    }

    #[test]
    fn formula_escape_stores_result() {
        let mut picker = Picker::new(people(), header());
        assert!(picker.edit_focus_cell("```2*21"));
        assert_eq!(picker.focus_cell(), "42");
        // A broken formula stores the literal.
        assert!(picker.edit_focus_cell("```2*"));
        assert_eq!(picker.focus_cell(), "```2*");
    }

    #[test]
    fn non_editable_column_refuses_edits() {
        let mut picker = Picker::new(people(), header());
        picker.data.columns.editable[0] = false;
        assert!(!picker.edit_focus_cell("nope"));
        assert_eq!(picker.focus_cell(), "Alice");
    }

    #[test]
    fn visual_rectangle_scenario() {
        let mut picker = Picker::new(people(), header());
        picker.ui.cursor = 1;
        picker.data.columns.selected_column = 2;
        picker.visual_toggle(true);
        picker.ui.cursor = 3;
        picker.data.columns.selected_column = 3;
        picker.visual_toggle(true);

        for row in 0..5 {
            for col in 0..4 {
                let expected = (1..=3).contains(&row) && (2..=3).contains(&col);
                assert_eq!(
                    picker.selection.cell_selected[&(row, col)],
                    expected,
                    "({row},{col})"
                );
            }
        }
    }

    #[test]
    fn refresh_with_id_tracking_through_worker() {
        let mut picker = Picker::new(
            vec![
                vec!["A".to_string(), "1".to_string()],
                vec!["B".to_string(), "2".to_string()],
                vec!["C".to_string(), "3".to_string()],
            ],
            vec!["id".into(), "value".into()],
        );
        picker.selection.toggle(1, 0); // select B
        picker.ui.cursor = 1; // cursor on B
        picker.ports.refresh_function = Some(Arc::new(|| {
            (
                vec![
                    vec!["C".to_string(), "3".to_string()],
                    vec!["B".to_string(), "2".to_string()],
                    vec!["D".to_string(), "4".to_string()],
                ],
                vec!["id".to_string(), "value".to_string()],
            )
        }));

        assert!(picker.start_refresh());
        assert!(picker.refreshing_data);
        // Overlapping triggers are refused while in flight.
        assert!(picker.start_refresh());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !picker.poll_refresh() {
            assert!(Instant::now() < deadline, "refresh did not complete");
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(picker.data.rows.len(), 3);
        assert_eq!(picker.selection.selected_indices(), vec![1]);
        assert_eq!(picker.cursor_original(), Some(1));
        assert_eq!(picker.focus_cell(), "B");
        assert!(!picker.refreshing_data);
    }

    #[test]
    fn settings_apply_and_redo() {
        let mut picker = Picker::new(people(), header());
        picker.ui.user_settings = "!1 cv".to_string();
        picker.apply_settings();
        assert!(picker.data.columns.hidden.contains(&1));
        assert!(picker.ui.centre_in_terminal_vertical);

        // Redo replays the last complete command string.
        picker.redo();
        assert!(!picker.data.columns.hidden.contains(&1));
        assert!(!picker.ui.centre_in_terminal_vertical);
    }

    #[test]
    fn settings_sort_preserves_cursor() {
        let mut picker = Picker::new(people(), header());
        picker.ui.cursor = 4; // Eve
        picker.data.columns.sort_method[1] = SortMethod::Numeric;
        picker.ui.user_settings = "s1".to_string();
        picker.apply_settings();
        let original = picker.cursor_original().expect("cursor row");
        assert_eq!(picker.data.rows[original][0], "Eve");
    }

    #[test]
    fn incomplete_settings_do_not_reach_redo() {
        let mut picker = Picker::new(people(), header());
        picker.ui.user_settings = "cv bogus".to_string();
        picker.apply_settings();
        assert!(picker.ui.centre_in_terminal_vertical);
        picker.redo();
        // Nothing replayed: the toggle keeps its value.
        assert!(picker.ui.centre_in_terminal_vertical);
    }

    #[test]
    fn delete_rows_then_cursor_clamps() {
        let mut picker = Picker::new(people(), header());
        picker.cursor_bottom();
        picker.selection.toggle(0, 0);
        picker.selection.toggle(4, 0);
        picker.delete_selected_rows();
        assert_eq!(picker.data.rows.len(), 3);
        assert!(picker.ui.cursor < picker.data.view.len());
        assert_eq!(picker.selection.selected_count(), 0);
    }

    #[test]
    fn mode_cycling_swaps_filters() {
        let mut picker = Picker::new(people(), header());
        picker.ui.modes = vec![
            Mode {
                name: "All".into(),
                filter: String::new(),
            },
            Mode {
                name: "Engineers".into(),
                filter: "--2 Engineer".into(),
            },
        ];
        picker.cycle_mode(1);
        assert_eq!(picker.ui.mode_index, 1);
        assert_eq!(picker.ui.filter_query, "--2 Engineer");
        assert_eq!(picker.data.view.len(), 1);

        picker.cycle_mode(1);
        assert_eq!(picker.ui.mode_index, 0);
        assert_eq!(picker.ui.filter_query, "");
        assert_eq!(picker.data.view.len(), 5);
    }

    #[test]
    fn snapshot_roundtrip_restores_engine_state() {
        let mut picker = Picker::new(people(), header());
        picker.set_filter("a");
        picker.selection.toggle(0, 0);
        picker.ui.theme_number = 1;
        picker.data.columns.hidden.insert(3);
        picker.histories.history_settings.push("ct".into());

        let snapshot = picker.capture_snapshot();
        let mut restored = Picker::new(Vec::new(), Vec::new());
        restored.install_snapshot(snapshot);

        assert_eq!(restored.data.rows, picker.data.rows);
        assert_eq!(restored.ui.filter_query, "a");
        assert_eq!(restored.selection.selected_indices(), vec![0]);
        assert_eq!(restored.ui.theme_number, 1);
        assert!(restored.data.columns.hidden.contains(&3));
        assert_eq!(restored.histories.history_settings, vec!["ct"]);
        // Derived state was rebuilt.
        assert_eq!(restored.data.view.len(), picker.data.view.len());
    }

    #[test]
    fn export_table_respects_selection_and_hidden() {
        let mut picker = Picker::new(people(), header());
        picker.data.columns.hidden.insert(3);
        let (rows, header) = picker.export_table(false);
        assert_eq!(rows.len(), 5);
        assert_eq!(header, vec!["name", "age", "role"]);

        picker.selection.toggle(1, 0);
        let (rows, _) = picker.export_table(true);
        assert_eq!(rows, vec![vec!["Bob", "25", "Designer", "bob@example.com"]]);
    }

    #[test]
    fn accept_indices_fall_back_to_cursor() {
        let mut picker = Picker::new(people(), header());
        picker.ui.cursor = 2;
        assert_eq!(picker.accept_indices(), vec![2]);
        picker.selection.toggle(0, 0);
        picker.selection.toggle(4, 0);
        assert_eq!(picker.accept_indices(), vec![0, 4]);
    }

    #[test]
    fn unselectable_rows_are_skipped_by_navigation() {
        let mut picker = Picker::new(people(), header());
        picker.selection.unselectable.insert(1);
        picker.ui.cursor = 0;
        picker.cursor_down();
        assert_eq!(picker.ui.cursor, 2);
        picker.cursor_up();
        assert_eq!(picker.ui.cursor, 0);
    }

    #[test]
    fn paste_grid_overwrites_and_grows() {
        let mut picker = Picker::new(people(), header());
        picker.ui.cursor = 3;
        picker.data.columns.selected_column = 2;
        picker.paste_cells(&[
            vec!["X".to_string(), "Y".to_string()],
            vec!["Z".to_string(), "W".to_string()],
            vec!["Q".to_string(), "R".to_string()],
        ]);
        assert_eq!(picker.data.rows[3][2], "X");
        assert_eq!(picker.data.rows[3][3], "Y");
        assert_eq!(picker.data.rows[4][2], "Z");
        // A sixth row was created to hold the overflow.
        assert_eq!(picker.data.rows.len(), 6);
        assert_eq!(picker.data.rows[5][2], "Q");
    }

    #[test]
    fn modal_bundles_restrict_the_keymap() {
        let modal = Picker::modal(
            ModalKind::Notification,
            vec![vec!["hi".to_string()]],
            Vec::new(),
            "Note",
        );
        assert!(modal.config.cancel_is_back);
        assert!(!modal.ui.show_footer);
        assert!(modal.config.max_dimensions.is_some());
        assert!(
            modal
                .config
                .keymap
                .resolve(KeyPress::char('f'))
                .is_none()
        );
        assert!(
            modal
                .config
                .key_remappings
                .contains_key(&KeyPress::RESIZE)
        );

        let infobox = Picker::modal(
            ModalKind::Infobox,
            vec![vec!["line".to_string()]],
            Vec::new(),
            "Info",
        );
        assert!(infobox.config.display_only);

        let chooser = Picker::modal(ModalKind::Chooser, Vec::new(), Vec::new(), "Choose");
        assert!(
            chooser
                .config
                .keymap
                .resolve(KeyPress::char(' '))
                .is_some()
        );
    }

    #[test]
    fn wrap_message_splits_long_lines() {
        let lines = wrap_message("abcdefghij", 4);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("abcd"));
    }
}
