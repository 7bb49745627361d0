//! Screen geometry. A sidebar of stacked panes on the left, Main above the
//! Command Log on the right, and a one-row info bar along the bottom. The
//! flexible sidebar panes behave as an accordion: the focused one gets double
//! weight.

use ratatui::layout::Rect;

use crate::pane::PaneId;

pub const MIN_WIDTH: u16 = 60;
pub const MIN_HEIGHT: u16 = 15;

const INFO_BAR_HEIGHT: i32 = 1;
const STATUS_HEIGHT: i32 = 3;
const STASH_COLLAPSED_HEIGHT: i32 = 3;
const COMMAND_LOG_HEIGHT: i32 = 3;
const COMMAND_LOG_EXPANDED_HEIGHT: i32 = 10;
const SIDEBAR_MIN_WIDTH: i32 = 30;
const SIDEBAR_MAX_WIDTH: i32 = 60;
const FOCUSED_WEIGHT: i32 = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Layout {
    pub width: u16,
    pub height: u16,
    pub sidebar_width: u16,
    pub main_width: u16,
    pub status_height: u16,
    pub files_height: u16,
    pub branches_height: u16,
    pub commits_height: u16,
    pub stash_height: u16,
    pub main_height: u16,
    pub command_log_height: u16,
    pub info_bar_height: u16,
}

fn to_u16(v: i32) -> u16 {
    v.clamp(0, u16::MAX as i32) as u16
}

pub fn compute_layout(width: u16, height: u16, focus: PaneId) -> Layout {
    let w = width as i32;
    let h = height as i32;
    let total = (h - INFO_BAR_HEIGHT).max(0);

    let sidebar = (w / 3).clamp(SIDEBAR_MIN_WIDTH, SIDEBAR_MAX_WIDTH).min(w);
    let main_width = w - sidebar;

    let command_log = if focus == PaneId::CommandLog {
        COMMAND_LOG_EXPANDED_HEIGHT
    } else {
        COMMAND_LOG_HEIGHT
    };
    let main = (total - command_log).max(0);

    let stash_fixed = if focus == PaneId::Stash {
        0
    } else {
        STASH_COLLAPSED_HEIGHT
    };
    let remain = total - STATUS_HEIGHT - stash_fixed;

    let mut flex = vec![PaneId::Files, PaneId::Branches, PaneId::Commits];
    if focus == PaneId::Stash {
        flex.push(PaneId::Stash);
    }
    let weight = |p: PaneId| if p == focus { FOCUSED_WEIGHT } else { 1 };
    let total_weight: i32 = flex.iter().map(|p| weight(*p)).sum();
    let unit = remain / total_weight;

    let mut files = unit * weight(PaneId::Files);
    let mut branches = unit * weight(PaneId::Branches);
    let mut commits = unit * weight(PaneId::Commits);
    let mut stash = if focus == PaneId::Stash {
        unit * weight(PaneId::Stash)
    } else {
        STASH_COLLAPSED_HEIGHT
    };

    // Commits absorbs the rounding remainder, but never grows past a focused sibling.
    let diff = total - (STATUS_HEIGHT + files + branches + commits + stash);
    let focused = match focus {
        PaneId::Files => Some(&mut files),
        PaneId::Branches => Some(&mut branches),
        PaneId::Stash => Some(&mut stash),
        _ => None,
    };
    match focused {
        Some(focused) if diff > 0 => {
            let to_commits = diff.min(*focused - commits).max(0);
            commits += to_commits;
            *focused += diff - to_commits;
        }
        _ => commits += diff,
    }

    Layout {
        width,
        height,
        sidebar_width: to_u16(sidebar),
        main_width: to_u16(main_width),
        status_height: to_u16(STATUS_HEIGHT.min(total)),
        files_height: to_u16(files),
        branches_height: to_u16(branches),
        commits_height: to_u16(commits),
        stash_height: to_u16(stash),
        main_height: to_u16(main),
        command_log_height: to_u16(command_log.min(total)),
        info_bar_height: to_u16(INFO_BAR_HEIGHT.min(h)),
    }
}

impl Layout {
    pub fn is_too_small(&self) -> bool {
        self.width < MIN_WIDTH || self.height < MIN_HEIGHT
    }

    pub fn pane_height(&self, pane: PaneId) -> u16 {
        match pane {
            PaneId::Status => self.status_height,
            PaneId::Files => self.files_height,
            PaneId::Branches => self.branches_height,
            PaneId::Commits => self.commits_height,
            PaneId::Stash => self.stash_height,
            PaneId::Main => self.main_height,
            PaneId::CommandLog => self.command_log_height,
        }
    }

    /// Rows available for content inside a bordered pane.
    pub fn content_height(&self, pane: PaneId) -> usize {
        self.pane_height(pane).saturating_sub(2).max(1) as usize
    }

    pub fn pane_rect(&self, pane: PaneId) -> Rect {
        let sidebar = [
            PaneId::Status,
            PaneId::Files,
            PaneId::Branches,
            PaneId::Commits,
            PaneId::Stash,
        ];
        let (x, width, column): (u16, u16, &[PaneId]) = if pane.is_viewport() {
            (self.sidebar_width, self.main_width, &[PaneId::Main, PaneId::CommandLog])
        } else {
            (0, self.sidebar_width, &sidebar)
        };
        let y = column
            .iter()
            .take_while(|p| **p != pane)
            .map(|p| self.pane_height(*p))
            .fold(0u16, u16::saturating_add);
        Rect::new(x, y, width, self.pane_height(pane))
    }

    pub fn info_bar_rect(&self) -> Rect {
        let y = self.height.saturating_sub(self.info_bar_height);
        Rect::new(0, y, self.width, self.info_bar_height)
    }
}
