use crossterm::event::{KeyCode, KeyModifiers};
use std::collections::{HashMap, HashSet};

/// A decoded key press: code plus modifiers. Terminal resize events are
/// decoded to [`KeyPress::RESIZE`] so keymaps and remap tables can treat
/// them like any other key (nested pickers remap resize to refresh).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPress {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyPress {
    /// Pseudo-key emitted by the terminal layer for a resize event.
    pub const RESIZE: KeyPress = KeyPress {
        code: KeyCode::F(63),
        mods: KeyModifiers::NONE,
    };

    pub const fn plain(code: KeyCode) -> Self {
        KeyPress {
            code,
            mods: KeyModifiers::NONE,
        }
    }

    pub const fn char(ch: char) -> Self {
        KeyPress::plain(KeyCode::Char(ch))
    }

    pub const fn ctrl(ch: char) -> Self {
        KeyPress {
            code: KeyCode::Char(ch),
            mods: KeyModifiers::CONTROL,
        }
    }

    pub const fn alt(ch: char) -> Self {
        KeyPress {
            code: KeyCode::Char(ch),
            mods: KeyModifiers::ALT,
        }
    }

    /// The digit behind a `0`-`9` press, if any.
    pub fn digit(&self) -> Option<usize> {
        match self.code {
            KeyCode::Char(ch) if ch.is_ascii_digit() => Some(ch as usize - '0' as usize),
            _ => None,
        }
    }
}

/// Everything the dispatcher can be asked to do. A keymap assigns key
/// presses to these operations; every other behaviour is internal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    // Navigation
    CursorUp,
    CursorDown,
    FiveUp,
    FiveDown,
    HalfPageUp,
    HalfPageDown,
    PageUp,
    PageDown,
    CursorTop,
    CursorBottom,
    // Selection
    ToggleSelect,
    SelectAll,
    SelectNone,
    VisualSelectionToggle,
    VisualDeselectionToggle,
    // Sort and column focus
    CycleSortMethod,
    CycleSortMethodReverse,
    CycleSortOrder,
    ColSelect,
    ColSelectNext,
    ColSelectPrev,
    MoveColumnLeft,
    MoveColumnRight,
    ColHide,
    // Prompts
    FilterInput,
    SearchInput,
    ContinueSearchForward,
    ContinueSearchBackward,
    SettingsInput,
    SettingsOptions,
    OptsInput,
    OptsSelect,
    PipeInput,
    EditCell,
    // Clipboard and files
    CopyDialog,
    Paste,
    SaveDialog,
    LoadDialog,
    OpenFiles,
    // Data edits
    DeleteRow,
    DeleteColumn,
    AddRowBefore,
    AddRowAfter,
    AddColumnBefore,
    AddColumnAfter,
    // Horizontal scroll and widths
    ScrollLeft,
    ScrollRight,
    ScrollFarLeft,
    ScrollFarRight,
    IncreaseColumnWidth,
    DecreaseColumnWidth,
    // Modes and chrome
    ModeNext,
    ModePrev,
    ToggleFooter,
    NotificationToggle,
    // Control
    Accept,
    Cancel,
    Refresh,
    RedrawScreen,
    Redo,
    ResetOpts,
    Help,
    Exit,
    FullExit,
}

/// A keymap: operation name to the set of key presses that trigger it.
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    pub bindings: HashMap<Operation, HashSet<KeyPress>>,
}

impl KeyMap {
    /// Whether `key` is assigned to `op`.
    pub fn triggers(&self, op: Operation, key: KeyPress) -> bool {
        self.bindings
            .get(&op)
            .map(|keys| keys.contains(&key))
            .unwrap_or(false)
    }

    /// The operation `key` resolves to, if any. The scan order is fixed so
    /// a key bound twice resolves deterministically.
    pub fn resolve(&self, key: KeyPress) -> Option<Operation> {
        ALL_OPERATIONS
            .iter()
            .copied()
            .find(|&op| self.triggers(op, key))
    }

    pub fn bind(&mut self, op: Operation, keys: impl IntoIterator<Item = KeyPress>) {
        self.bindings.entry(op).or_default().extend(keys);
    }

    /// Keys bound to `op`, for the help screen.
    pub fn keys_for(&self, op: Operation) -> Vec<KeyPress> {
        let mut keys: Vec<KeyPress> = self
            .bindings
            .get(&op)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        keys.sort_by_key(|k| format!("{k:?}"));
        keys
    }
}

/// Fixed scan order for key resolution and help rows.
pub const ALL_OPERATIONS: &[Operation] = &[
    Operation::Refresh,
    Operation::Help,
    Operation::Exit,
    Operation::FullExit,
    Operation::SettingsInput,
    Operation::SettingsOptions,
    Operation::ToggleFooter,
    Operation::Redo,
    Operation::CursorDown,
    Operation::HalfPageDown,
    Operation::FiveDown,
    Operation::CursorUp,
    Operation::FiveUp,
    Operation::HalfPageUp,
    Operation::ToggleSelect,
    Operation::SelectAll,
    Operation::SelectNone,
    Operation::CursorTop,
    Operation::CursorBottom,
    Operation::Accept,
    Operation::PageDown,
    Operation::PageUp,
    Operation::RedrawScreen,
    Operation::CycleSortMethod,
    Operation::CycleSortMethodReverse,
    Operation::CycleSortOrder,
    Operation::ColSelect,
    Operation::ColSelectNext,
    Operation::ColSelectPrev,
    Operation::MoveColumnLeft,
    Operation::MoveColumnRight,
    Operation::ScrollRight,
    Operation::ScrollLeft,
    Operation::ScrollFarLeft,
    Operation::ScrollFarRight,
    Operation::AddColumnBefore,
    Operation::AddColumnAfter,
    Operation::AddRowBefore,
    Operation::AddRowAfter,
    Operation::ColHide,
    Operation::CopyDialog,
    Operation::Paste,
    Operation::SaveDialog,
    Operation::LoadDialog,
    Operation::DeleteRow,
    Operation::DeleteColumn,
    Operation::DecreaseColumnWidth,
    Operation::IncreaseColumnWidth,
    Operation::VisualSelectionToggle,
    Operation::VisualDeselectionToggle,
    Operation::FilterInput,
    Operation::SearchInput,
    Operation::ContinueSearchForward,
    Operation::ContinueSearchBackward,
    Operation::Cancel,
    Operation::OptsInput,
    Operation::OptsSelect,
    Operation::NotificationToggle,
    Operation::ModeNext,
    Operation::ModePrev,
    Operation::PipeInput,
    Operation::OpenFiles,
    Operation::ResetOpts,
    Operation::EditCell,
];

/// The standard interactive keymap.
pub fn picker_keys() -> KeyMap {
    use Operation::*;
    let mut map = KeyMap::default();

    map.bind(CursorDown, [KeyPress::char('j'), KeyPress::plain(KeyCode::Down)]);
    map.bind(CursorUp, [KeyPress::char('k'), KeyPress::plain(KeyCode::Up)]);
    map.bind(FiveDown, [KeyPress::char('J')]);
    map.bind(FiveUp, [KeyPress::char('K')]);
    map.bind(HalfPageDown, [KeyPress::ctrl('d')]);
    map.bind(HalfPageUp, [KeyPress::ctrl('u')]);
    map.bind(PageDown, [KeyPress::plain(KeyCode::PageDown), KeyPress::ctrl('f')]);
    map.bind(PageUp, [KeyPress::plain(KeyCode::PageUp), KeyPress::ctrl('b')]);
    map.bind(CursorTop, [KeyPress::char('g'), KeyPress::plain(KeyCode::Home)]);
    map.bind(CursorBottom, [KeyPress::char('G'), KeyPress::plain(KeyCode::End)]);

    map.bind(ToggleSelect, [KeyPress::char(' ')]);
    map.bind(SelectAll, [KeyPress::char('m'), KeyPress::ctrl('a')]);
    map.bind(SelectNone, [KeyPress::char('M'), KeyPress::ctrl('r')]);
    map.bind(VisualSelectionToggle, [KeyPress::char('v')]);
    map.bind(VisualDeselectionToggle, [KeyPress::char('V')]);

    map.bind(CycleSortMethod, [KeyPress::char('s')]);
    map.bind(CycleSortMethodReverse, [KeyPress::char('S')]);
    map.bind(CycleSortOrder, [KeyPress::char('t')]);
    map.bind(ColSelect, ('0'..='9').map(KeyPress::char));
    map.bind(ColSelectNext, [KeyPress::char('l'), KeyPress::plain(KeyCode::Right)]);
    map.bind(ColSelectPrev, [KeyPress::char('h'), KeyPress::plain(KeyCode::Left)]);
    map.bind(MoveColumnLeft, [KeyPress::char('H')]);
    map.bind(MoveColumnRight, [KeyPress::char('L')]);
    // Shifted digits toggle the matching column's visibility.
    map.bind(ColHide, ")!@#$%^&*(".chars().map(KeyPress::char));

    map.bind(FilterInput, [KeyPress::char('f')]);
    map.bind(SearchInput, [KeyPress::char('/')]);
    map.bind(ContinueSearchForward, [KeyPress::char('n')]);
    map.bind(ContinueSearchBackward, [KeyPress::char('N')]);
    map.bind(SettingsInput, [KeyPress::char('`')]);
    map.bind(SettingsOptions, [KeyPress::char('~')]);
    map.bind(OptsInput, [KeyPress::char('o')]);
    map.bind(OptsSelect, [KeyPress::char('O')]);
    map.bind(PipeInput, [KeyPress::char('|')]);
    map.bind(EditCell, [KeyPress::char('e'), KeyPress::char('=')]);

    map.bind(CopyDialog, [KeyPress::char('y'), KeyPress::ctrl('c')]);
    map.bind(Paste, [KeyPress::char('p'), KeyPress::ctrl('v')]);
    map.bind(SaveDialog, [KeyPress::ctrl('s')]);
    map.bind(LoadDialog, [KeyPress::ctrl('o')]);
    map.bind(OpenFiles, [KeyPress::char('x')]);

    map.bind(DeleteRow, [KeyPress::plain(KeyCode::Delete), KeyPress::char('d')]);
    map.bind(
        DeleteColumn,
        [KeyPress {
            code: KeyCode::Delete,
            mods: KeyModifiers::SHIFT,
        }],
    );
    map.bind(AddRowBefore, [KeyPress::alt('r')]);
    map.bind(AddRowAfter, [KeyPress::char('a')]);
    map.bind(AddColumnBefore, [KeyPress::alt('c')]);
    map.bind(AddColumnAfter, [KeyPress::char('A')]);

    map.bind(ScrollLeft, [KeyPress::char('<')]);
    map.bind(ScrollRight, [KeyPress::char('>')]);
    map.bind(ScrollFarLeft, [KeyPress::char('^')]);
    map.bind(ScrollFarRight, [KeyPress::char('$')]);
    map.bind(IncreaseColumnWidth, [KeyPress::char(']')]);
    map.bind(DecreaseColumnWidth, [KeyPress::char('[')]);

    map.bind(ModeNext, [KeyPress::plain(KeyCode::Tab)]);
    map.bind(ModePrev, [KeyPress::plain(KeyCode::BackTab)]);
    map.bind(ToggleFooter, [KeyPress::char('_')]);
    map.bind(NotificationToggle, [KeyPress::char('i')]);

    map.bind(Accept, [KeyPress::plain(KeyCode::Enter)]);
    map.bind(Cancel, [KeyPress::plain(KeyCode::Esc)]);
    map.bind(Refresh, [KeyPress::plain(KeyCode::F(5)), KeyPress::char('r')]);
    map.bind(RedrawScreen, [KeyPress::ctrl('l')]);
    map.bind(Redo, [KeyPress::char('.')]);
    map.bind(ResetOpts, [KeyPress::char('u')]);
    map.bind(Help, [KeyPress::char('?')]);
    map.bind(Exit, [KeyPress::char('q')]);
    map.bind(FullExit, [KeyPress::char('Q'), KeyPress::ctrl('q')]);

    map
}

/// Keymap for notification and infobox modals: navigate, refresh, leave.
pub fn notification_keys() -> KeyMap {
    use Operation::*;
    let mut map = KeyMap::default();
    map.bind(CursorDown, [KeyPress::char('j'), KeyPress::plain(KeyCode::Down)]);
    map.bind(CursorUp, [KeyPress::char('k'), KeyPress::plain(KeyCode::Up)]);
    map.bind(Accept, [KeyPress::plain(KeyCode::Enter)]);
    map.bind(Cancel, [KeyPress::plain(KeyCode::Esc)]);
    map.bind(Refresh, [KeyPress::plain(KeyCode::F(5))]);
    map.bind(Exit, [KeyPress::char('q')]);
    map
}

/// Keymap for option-chooser modals: navigation plus selection.
pub fn options_keys() -> KeyMap {
    use Operation::*;
    let mut map = KeyMap::default();
    map.bind(CursorDown, [KeyPress::char('j'), KeyPress::plain(KeyCode::Down)]);
    map.bind(CursorUp, [KeyPress::char('k'), KeyPress::plain(KeyCode::Up)]);
    map.bind(CursorTop, [KeyPress::char('g'), KeyPress::plain(KeyCode::Home)]);
    map.bind(CursorBottom, [KeyPress::char('G'), KeyPress::plain(KeyCode::End)]);
    map.bind(ToggleSelect, [KeyPress::char(' ')]);
    map.bind(Accept, [KeyPress::plain(KeyCode::Enter)]);
    map.bind(Cancel, [KeyPress::plain(KeyCode::Esc)]);
    map.bind(Refresh, [KeyPress::plain(KeyCode::F(5))]);
    map.bind(Exit, [KeyPress::char('q')]);
    map
}

/// Keymap for the help viewer: navigation and search only.
pub fn help_keys() -> KeyMap {
    use Operation::*;
    let mut map = KeyMap::default();
    map.bind(CursorDown, [KeyPress::char('j'), KeyPress::plain(KeyCode::Down)]);
    map.bind(CursorUp, [KeyPress::char('k'), KeyPress::plain(KeyCode::Up)]);
    map.bind(CursorTop, [KeyPress::char('g'), KeyPress::plain(KeyCode::Home)]);
    map.bind(CursorBottom, [KeyPress::char('G'), KeyPress::plain(KeyCode::End)]);
    map.bind(PageDown, [KeyPress::plain(KeyCode::PageDown)]);
    map.bind(PageUp, [KeyPress::plain(KeyCode::PageUp)]);
    map.bind(SearchInput, [KeyPress::char('/')]);
    map.bind(ContinueSearchForward, [KeyPress::char('n')]);
    map.bind(ContinueSearchBackward, [KeyPress::char('N')]);
    map.bind(Refresh, [KeyPress::plain(KeyCode::F(5))]);
    map.bind(Cancel, [KeyPress::plain(KeyCode::Esc)]);
    map.bind(Exit, [KeyPress::char('q')]);
    map
}

/// Applies the remap table, then resolves the key against the keymap,
/// honouring `disabled_keys`.
pub fn resolve_key(
    key: KeyPress,
    remappings: &HashMap<KeyPress, KeyPress>,
    disabled_keys: &HashSet<KeyPress>,
    keymap: &KeyMap,
) -> Option<Operation> {
    let key = remappings.get(&key).copied().unwrap_or(key);
    if disabled_keys.contains(&key) {
        return None;
    }
    keymap.resolve(key)
}

/// Human-readable name of a key press, for the help screen.
pub fn key_name(key: KeyPress) -> String {
    if key == KeyPress::RESIZE {
        return "Resize".to_string();
    }
    let base = match key.code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(ch) => ch.to_string(),
        KeyCode::Enter => "Return".to_string(),
        KeyCode::Esc => "Escape".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Delete => "Delete".to_string(),
        KeyCode::Up => "ArrowUp".to_string(),
        KeyCode::Down => "ArrowDown".to_string(),
        KeyCode::Left => "ArrowLeft".to_string(),
        KeyCode::Right => "ArrowRight".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::BackTab => "Shift+Tab".to_string(),
        KeyCode::F(n) => format!("F{n}"),
        other => format!("{other:?}"),
    };
    if key.mods.contains(KeyModifiers::CONTROL) {
        format!("Ctrl+{base}")
    } else if key.mods.contains(KeyModifiers::ALT) {
        format!("Alt+{base}")
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_scans_operations() {
        let map = picker_keys();
        assert_eq!(map.resolve(KeyPress::char('j')), Some(Operation::CursorDown));
        assert_eq!(map.resolve(KeyPress::char('f')), Some(Operation::FilterInput));
        assert_eq!(map.resolve(KeyPress::char('?')), Some(Operation::Help));
        assert_eq!(map.resolve(KeyPress::alt('z')), None);
    }

    #[test]
    fn digits_resolve_to_col_select() {
        let map = picker_keys();
        for ch in '0'..='9' {
            assert_eq!(map.resolve(KeyPress::char(ch)), Some(Operation::ColSelect));
        }
        assert_eq!(KeyPress::char('7').digit(), Some(7));
        assert_eq!(KeyPress::char('x').digit(), None);
    }

    #[test]
    fn disabled_keys_short_circuit() {
        let map = picker_keys();
        let disabled: HashSet<KeyPress> = [KeyPress::char('q')].into_iter().collect();
        let resolved = resolve_key(KeyPress::char('q'), &HashMap::new(), &disabled, &map);
        assert_eq!(resolved, None);
    }

    #[test]
    fn remap_table_applies_before_resolution() {
        let map = notification_keys();
        let remap: HashMap<KeyPress, KeyPress> =
            [(KeyPress::RESIZE, KeyPress::plain(KeyCode::F(5)))]
                .into_iter()
                .collect();
        let resolved = resolve_key(KeyPress::RESIZE, &remap, &HashSet::new(), &map);
        assert_eq!(resolved, Some(Operation::Refresh));
    }

    #[test]
    fn key_names_are_readable() {
        assert_eq!(key_name(KeyPress::ctrl('a')), "Ctrl+a");
        assert_eq!(key_name(KeyPress::char(' ')), "Space");
        assert_eq!(key_name(KeyPress::plain(KeyCode::BackTab)), "Shift+Tab");
        assert_eq!(key_name(KeyPress::RESIZE), "Resize");
    }
}
