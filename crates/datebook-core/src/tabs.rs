#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Calendar,
    Tasks,
    Performance,
    Settings,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Calendar, Tab::Tasks, Tab::Performance, Tab::Settings];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Calendar => "Calendar",
            Tab::Tasks => "Tasks",
            Tab::Performance => "Performance",
            Tab::Settings => "Settings",
        }
    }

    pub fn icon(self, focused: bool) -> &'static str {
        match (self, focused) {
            (Tab::Calendar, true) => "calendar",
            (Tab::Calendar, false) => "calendar-outline",
            (Tab::Tasks, true) => "list",
            (Tab::Tasks, false) => "list-outline",
            (Tab::Performance, true) => "stats-chart",
            (Tab::Performance, false) => "stats-chart-outline",
            (Tab::Settings, true) => "settings",
            (Tab::Settings, false) => "settings-outline",
        }
    }

    /// Command that opens this tab from the command line.
    pub fn command(self) -> &'static str {
        match self {
            Tab::Calendar => "show",
            Tab::Tasks => "task",
            Tab::Performance => "performance",
            Tab::Settings => "settings",
        }
    }

    /// Case-insensitive match on the title.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tab| tab.title().eq_ignore_ascii_case(name.trim()))
    }
}

/// One screen is shown at a time; the first tab is focused on start.
#[derive(Debug, Clone)]
pub struct TabNavigator {
    current: Tab,
}

impl Default for TabNavigator {
    fn default() -> Self {
        Self {
            current: Tab::Calendar,
        }
    }
}

impl TabNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Tab {
        self.current
    }

    pub fn select(&mut self, tab: Tab) -> Tab {
        self.current = tab;
        tab
    }

    /// Every tab with its focus flag.
    pub fn tabs(&self) -> impl Iterator<Item = (Tab, bool)> + '_ {
        Tab::ALL.into_iter().map(|tab| (tab, tab == self.current))
    }
}
