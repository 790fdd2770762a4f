use crate::keymap::{ALL_OPERATIONS, KeyMap, Operation, key_name};

/// Short description of an operation, shown on the help screen.
pub fn describe(op: Operation) -> &'static str {
    match op {
        Operation::CursorDown => "Cursor down.",
        Operation::CursorUp => "Cursor up.",
        Operation::FiveDown => "Five down.",
        Operation::FiveUp => "Five up.",
        Operation::HalfPageDown => "Half page down.",
        Operation::HalfPageUp => "Half page up.",
        Operation::PageDown => "Page down.",
        Operation::PageUp => "Page up.",
        Operation::CursorTop => "Send cursor to top of list.",
        Operation::CursorBottom => "Send cursor to bottom of list.",
        Operation::ToggleSelect => "Toggle selection.",
        Operation::SelectAll => "Select all.",
        Operation::SelectNone => "Select none.",
        Operation::VisualSelectionToggle => "Toggle visual selection.",
        Operation::VisualDeselectionToggle => "Toggle visual deselection.",
        Operation::CycleSortMethod => "Cycle through sort methods.",
        Operation::CycleSortMethodReverse => "Cycle through sort methods (reverse).",
        Operation::CycleSortOrder => "Toggle sort order.",
        Operation::ColSelect => "Focus column by number.",
        Operation::ColSelectNext => "Focus next column.",
        Operation::ColSelectPrev => "Focus previous column.",
        Operation::MoveColumnLeft => "Move column left.",
        Operation::MoveColumnRight => "Move column right.",
        Operation::ColHide => "Toggle column visibility.",
        Operation::FilterInput => "Filter rows.",
        Operation::SearchInput => "Search.",
        Operation::ContinueSearchForward => "Continue search forwards.",
        Operation::ContinueSearchBackward => "Continue search backwards.",
        Operation::SettingsInput => "Settings input.",
        Operation::SettingsOptions => "Settings chooser.",
        Operation::OptsInput => "Options input.",
        Operation::OptsSelect => "Options chooser.",
        Operation::PipeInput => "Pipe selection to a command.",
        Operation::EditCell => "Edit the focused cell.",
        Operation::CopyDialog => "Copy selection.",
        Operation::Paste => "Paste.",
        Operation::SaveDialog => "Save data or state.",
        Operation::LoadDialog => "Load a saved state.",
        Operation::OpenFiles => "Open selection with default applications.",
        Operation::DeleteRow => "Delete row.",
        Operation::DeleteColumn => "Delete column.",
        Operation::AddRowBefore => "Add empty row before the cursor.",
        Operation::AddRowAfter => "Add empty row after the cursor.",
        Operation::AddColumnBefore => "Add empty column before the focus.",
        Operation::AddColumnAfter => "Add empty column after the focus.",
        Operation::ScrollLeft => "Scroll left.",
        Operation::ScrollRight => "Scroll right.",
        Operation::ScrollFarLeft => "Scroll to the first column.",
        Operation::ScrollFarRight => "Scroll to the last column.",
        Operation::IncreaseColumnWidth => "Increase column width.",
        Operation::DecreaseColumnWidth => "Decrease column width.",
        Operation::ModeNext => "Next mode.",
        Operation::ModePrev => "Previous mode.",
        Operation::ToggleFooter => "Toggle the footer.",
        Operation::NotificationToggle => "Show a notification.",
        Operation::Accept => "Accept selections.",
        Operation::Cancel => "Cancel visual mode / search / filter.",
        Operation::Refresh => "Refresh the data.",
        Operation::RedrawScreen => "Redraw screen.",
        Operation::Redo => "Reapply the last settings command.",
        Operation::ResetOpts => "Clear the options string.",
        Operation::Help => "Open help.",
        Operation::Exit => "Exit picker instance.",
        Operation::FullExit => "Immediate exit to terminal.",
    }
}

/// Builds the help-screen rows from a keymap: one `[keys, description]`
/// row per bound operation.
pub fn build_help_rows(keymap: &KeyMap) -> Vec<Vec<String>> {
    ALL_OPERATIONS
        .iter()
        .filter_map(|&op| {
            let keys = keymap.keys_for(op);
            if keys.is_empty() {
                return None;
            }
            let names: Vec<String> = keys.into_iter().map(key_name).collect();
            Some(vec![names.join(" "), describe(op).to_string()])
        })
        .collect()
}
