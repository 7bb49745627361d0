//! Pane identities and the per-pane list/viewport model.

/// Every pane of the screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaneId {
    Status,
    Files,
    Branches,
    Commits,
    Stash,
    Main,
    CommandLog,
}

/// Order visited by Tab. Status is never focused.
pub const FOCUS_CYCLE: [PaneId; 6] = [
    PaneId::Files,
    PaneId::Branches,
    PaneId::Commits,
    PaneId::Stash,
    PaneId::Main,
    PaneId::CommandLog,
];

impl PaneId {
    pub fn next(self) -> Self {
        match FOCUS_CYCLE.iter().position(|p| *p == self) {
            Some(i) => FOCUS_CYCLE[(i + 1) % FOCUS_CYCLE.len()],
            None => PaneId::Files,
        }
    }

    pub fn prev(self) -> Self {
        match FOCUS_CYCLE.iter().position(|p| *p == self) {
            Some(i) => FOCUS_CYCLE[(i + FOCUS_CYCLE.len() - 1) % FOCUS_CYCLE.len()],
            None => PaneId::Files,
        }
    }

    /// Pane selected by the number keys `1`..`6`.
    pub fn from_digit(c: char) -> Option<Self> {
        let idx = c.to_digit(10)? as usize;
        FOCUS_CYCLE.get(idx.checked_sub(1)?).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            PaneId::Status => "Status",
            PaneId::Files => "Files",
            PaneId::Branches => "Branches",
            PaneId::Commits => "Commits",
            PaneId::Stash => "Stash",
            PaneId::Main => "Main",
            PaneId::CommandLog => "Command Log",
        }
    }

    /// Panes whose cursor drives the Main diff.
    pub fn is_list(self) -> bool {
        matches!(self, PaneId::Files | PaneId::Branches | PaneId::Commits | PaneId::Stash)
    }

    /// Panes that scroll a text viewport instead of moving a cursor.
    pub fn is_viewport(self) -> bool {
        matches!(self, PaneId::Main | PaneId::CommandLog)
    }
}

/// Ordered items with an optional cursor and a scroll offset.
///
/// The cursor is `None` exactly when the list is empty. In list panes the
/// scroll offset follows the cursor; viewport panes move it directly.
#[derive(Clone, Debug)]
pub struct PaneModel<T> {
    items: Vec<T>,
    cursor: Option<usize>,
    scroll: usize,
    viewport_height: usize,
    focused: bool,
    follows_cursor: bool,
}

impl<T> Default for PaneModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PaneModel<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: None,
            scroll: 0,
            viewport_height: 1,
            focused: false,
            follows_cursor: true,
        }
    }

    /// Model for a text viewport whose scroll offset ignores the cursor.
    pub fn viewport() -> Self {
        Self {
            follows_cursor: false,
            ..Self::new()
        }
    }

    /// Replace the items, keeping the cursor index when still valid.
    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.cursor = match self.items.len() {
            0 => None,
            len => Some(self.cursor.unwrap_or(0).min(len - 1)),
        };
        self.scroll = self.scroll.min(self.max_scroll());
        self.ensure_cursor_visible();
    }

    /// Append an item, dropping the oldest once `capacity` is exceeded, and
    /// follow the tail.
    pub fn push_bounded(&mut self, item: T, capacity: usize) {
        self.items.push(item);
        if self.items.len() > capacity.max(1) {
            let excess = self.items.len() - capacity.max(1);
            self.items.drain(..excess);
        }
        self.cursor = Some(self.items.len() - 1);
        self.scroll_to_bottom();
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn selected(&self) -> Option<&T> {
        self.cursor.and_then(|i| self.items.get(i))
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn set_focus(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll
    }

    pub fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = height.max(1);
        self.scroll = self.scroll.min(self.max_scroll());
        self.ensure_cursor_visible();
    }

    pub fn cursor_up(&mut self) {
        if let Some(c) = self.cursor {
            self.cursor = Some(c.saturating_sub(1));
            self.ensure_cursor_visible();
        }
    }

    pub fn cursor_down(&mut self) {
        if let Some(c) = self.cursor {
            self.cursor = Some((c + 1).min(self.items.len() - 1));
            self.ensure_cursor_visible();
        }
    }

    pub fn cursor_to_top(&mut self) {
        if self.cursor.is_some() {
            self.cursor = Some(0);
            self.ensure_cursor_visible();
        }
    }

    pub fn cursor_to_bottom(&mut self) {
        if self.cursor.is_some() {
            self.cursor = Some(self.items.len() - 1);
            self.ensure_cursor_visible();
        }
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.scroll = self.scroll.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll = (self.scroll + n).min(self.max_scroll());
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.viewport_height);
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.viewport_height);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
    }

    fn max_scroll(&self) -> usize {
        self.items.len().saturating_sub(self.viewport_height)
    }

    fn ensure_cursor_visible(&mut self) {
        if !self.follows_cursor {
            return;
        }
        let Some(c) = self.cursor else {
            self.scroll = 0;
            return;
        };
        if c < self.scroll {
            self.scroll = c;
        } else if c >= self.scroll + self.viewport_height {
            self.scroll = c + 1 - self.viewport_height;
        }
    }
}

/// Cursor movement shared by every list pane regardless of item type.
pub trait ListNav {
    fn cursor_up(&mut self);
    fn cursor_down(&mut self);
    fn cursor_to_top(&mut self);
    fn cursor_to_bottom(&mut self);
}

impl<T> ListNav for PaneModel<T> {
    fn cursor_up(&mut self) {
        PaneModel::cursor_up(self)
    }

    fn cursor_down(&mut self) {
        PaneModel::cursor_down(self)
    }

    fn cursor_to_top(&mut self) {
        PaneModel::cursor_to_top(self)
    }

    fn cursor_to_bottom(&mut self) {
        PaneModel::cursor_to_bottom(self)
    }
}
