use crossterm::style::Color;

/// Palette role indices. Highlight records and the renderer address colours
/// through these roles so a theme switch never touches engine state.
pub mod role {
    pub const SELECT_MARKER: u8 = 1;
    pub const ROW: u8 = 2;
    pub const BACKGROUND: u8 = 3;
    pub const HEADER: u8 = 4;
    pub const CURSOR: u8 = 5;
    pub const SEARCH_HIGHLIGHT: u8 = 10;
    pub const MODE_ACTIVE: u8 = 14;
    pub const MODE_INACTIVE: u8 = 15;
    pub const TITLE: u8 = 16;
    pub const SCROLLBAR: u8 = 18;
    pub const FOCUS_COLUMN: u8 = 19;
    pub const FOOTER: u8 = 20;
    pub const REFRESH_ACTIVE: u8 = 21;
    pub const REFRESH_IDLE: u8 = 23;
    pub const FOOTER_STRING: u8 = 24;
    pub const SELECTED_CELL: u8 = 25;
    pub const DESELECT_CELL: u8 = 26;
}

/// One terminal cell style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
    pub underline: bool,
}

impl Style {
    pub const fn new(fg: Color, bg: Color) -> Self {
        Style {
            fg,
            bg,
            bold: false,
            underline: false,
        }
    }

    pub const fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub const fn underline(mut self) -> Self {
        self.underline = true;
        self
    }
}

/// A named colour theme resolving palette roles to styles.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub name: &'static str,
    base: Style,
    title: Style,
    header: Style,
    cursor: Style,
    focus: Style,
    select_marker: Style,
    selected_cell: Style,
    deselect_cell: Style,
    search: Style,
    footer: Style,
    footer_string: Style,
    mode_active: Style,
    mode_inactive: Style,
    scrollbar: Style,
    refresh_active: Style,
    refresh_idle: Style,
}

impl Theme {
    /// Style for a palette role; unknown roles fall back to the base row
    /// style so a stale highlight colour never breaks a frame.
    pub fn style(&self, role: u8) -> Style {
        match role {
            role::SELECT_MARKER => self.select_marker,
            role::ROW | role::BACKGROUND => self.base,
            role::HEADER => self.header,
            role::CURSOR => self.cursor,
            role::SEARCH_HIGHLIGHT => self.search,
            role::MODE_ACTIVE => self.mode_active,
            role::MODE_INACTIVE => self.mode_inactive,
            role::TITLE => self.title,
            role::SCROLLBAR => self.scrollbar,
            role::FOCUS_COLUMN => self.focus,
            role::FOOTER => self.footer,
            role::REFRESH_ACTIVE => self.refresh_active,
            role::REFRESH_IDLE => self.refresh_idle,
            role::FOOTER_STRING => self.footer_string,
            role::SELECTED_CELL => self.selected_cell,
            role::DESELECT_CELL => self.deselect_cell,
            _ => self.base,
        }
    }
}

const DARK: Theme = Theme {
    name: "dark",
    base: Style::new(Color::Grey, Color::Reset),
    title: Style::new(Color::Black, Color::Cyan).bold(),
    header: Style::new(Color::Cyan, Color::Reset).bold(),
    cursor: Style::new(Color::Black, Color::White).bold(),
    focus: Style::new(Color::Black, Color::Cyan).bold(),
    select_marker: Style::new(Color::Green, Color::Reset).bold(),
    selected_cell: Style::new(Color::Black, Color::Green),
    deselect_cell: Style::new(Color::Black, Color::Red),
    search: Style::new(Color::Black, Color::Yellow).bold(),
    footer: Style::new(Color::Black, Color::Grey),
    footer_string: Style::new(Color::Black, Color::DarkCyan),
    mode_active: Style::new(Color::Black, Color::Cyan).bold(),
    mode_inactive: Style::new(Color::Grey, Color::Reset).underline(),
    scrollbar: Style::new(Color::Grey, Color::DarkGrey),
    refresh_active: Style::new(Color::Yellow, Color::Reset).bold(),
    refresh_idle: Style::new(Color::DarkGreen, Color::Reset).bold(),
};

const LIGHT: Theme = Theme {
    name: "light",
    base: Style::new(Color::Black, Color::Reset),
    title: Style::new(Color::White, Color::DarkBlue).bold(),
    header: Style::new(Color::DarkBlue, Color::Reset).bold(),
    cursor: Style::new(Color::White, Color::DarkGrey).bold(),
    focus: Style::new(Color::White, Color::DarkBlue).bold(),
    select_marker: Style::new(Color::DarkGreen, Color::Reset).bold(),
    selected_cell: Style::new(Color::White, Color::DarkGreen),
    deselect_cell: Style::new(Color::White, Color::DarkRed),
    search: Style::new(Color::Black, Color::Yellow).bold(),
    footer: Style::new(Color::White, Color::DarkGrey),
    footer_string: Style::new(Color::White, Color::DarkCyan),
    mode_active: Style::new(Color::White, Color::DarkBlue).bold(),
    mode_inactive: Style::new(Color::Black, Color::Reset).underline(),
    scrollbar: Style::new(Color::Black, Color::Grey),
    refresh_active: Style::new(Color::DarkYellow, Color::Reset).bold(),
    refresh_idle: Style::new(Color::DarkGreen, Color::Reset).bold(),
};

const MONO: Theme = Theme {
    name: "mono",
    base: Style::new(Color::Reset, Color::Reset),
    title: Style::new(Color::Reset, Color::Reset).bold().underline(),
    header: Style::new(Color::Reset, Color::Reset).bold(),
    cursor: Style::new(Color::Black, Color::White).bold(),
    focus: Style::new(Color::Black, Color::White),
    select_marker: Style::new(Color::Reset, Color::Reset).bold(),
    selected_cell: Style::new(Color::Black, Color::Grey),
    deselect_cell: Style::new(Color::Black, Color::DarkGrey),
    search: Style::new(Color::Black, Color::White).underline(),
    footer: Style::new(Color::Black, Color::Grey),
    footer_string: Style::new(Color::Black, Color::Grey),
    mode_active: Style::new(Color::Black, Color::White).bold(),
    mode_inactive: Style::new(Color::Reset, Color::Reset).underline(),
    scrollbar: Style::new(Color::Reset, Color::DarkGrey),
    refresh_active: Style::new(Color::Reset, Color::Reset).bold(),
    refresh_idle: Style::new(Color::Reset, Color::Reset),
};

const BLUE: Theme = Theme {
    name: "blue",
    base: Style::new(Color::Grey, Color::Reset),
    title: Style::new(Color::White, Color::DarkBlue).bold(),
    header: Style::new(Color::Blue, Color::Reset).bold(),
    cursor: Style::new(Color::White, Color::Blue).bold(),
    focus: Style::new(Color::White, Color::DarkBlue).bold(),
    select_marker: Style::new(Color::Cyan, Color::Reset).bold(),
    selected_cell: Style::new(Color::Black, Color::Cyan),
    deselect_cell: Style::new(Color::Black, Color::DarkRed),
    search: Style::new(Color::Black, Color::DarkYellow).bold(),
    footer: Style::new(Color::White, Color::DarkBlue),
    footer_string: Style::new(Color::White, Color::DarkCyan),
    mode_active: Style::new(Color::White, Color::Blue).bold(),
    mode_inactive: Style::new(Color::Grey, Color::Reset).underline(),
    scrollbar: Style::new(Color::Blue, Color::DarkGrey),
    refresh_active: Style::new(Color::Yellow, Color::Reset).bold(),
    refresh_idle: Style::new(Color::Green, Color::Reset).bold(),
};

const THEMES: &[Theme] = &[DARK, LIGHT, MONO, BLUE];

pub fn theme_count() -> usize {
    THEMES.len()
}

/// Theme by number, clamped into range.
pub fn get_theme(number: usize) -> &'static Theme {
    &THEMES[number.min(THEMES.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_lookup_clamps() {
        assert_eq!(get_theme(0).name, "dark");
        assert_eq!(get_theme(999).name, THEMES[THEMES.len() - 1].name);
    }

    #[test]
    fn unknown_role_falls_back_to_base() {
        let theme = get_theme(0);
        assert_eq!(theme.style(200), theme.style(role::ROW));
    }
}
