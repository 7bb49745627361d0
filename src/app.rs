//! Application state machine.
//!
//! [`App::update`] consumes one [`Event`] and returns the operations to
//! dispatch. It never blocks and never talks to git itself, so every
//! transition can be driven directly from tests.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::dialog::{ConfirmAction, Dialog};
use crate::dispatch::{DiffTarget, Operation, Outcome, ResetMode, reload_batch};
use crate::keymap::{self, Action};
use crate::layout::{Layout, compute_layout};
use crate::pane::{ListNav, PaneId, PaneModel};
use crate::parse::{BranchEntry, CommitEntry, FileEntry, ReflogEntry, StashEntry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitsMode {
    Commits,
    Reflog,
}

#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    Resize { width: u16, height: u16 },
    Outcome(Outcome),
}

pub struct App {
    pub repo_name: String,
    pub focus: PaneId,
    pub dialog: Option<Dialog>,
    pub layout: Layout,

    pub files: PaneModel<FileEntry>,
    pub branches: PaneModel<BranchEntry>,
    pub commits: PaneModel<CommitEntry>,
    pub reflog: PaneModel<ReflogEntry>,
    pub commits_mode: CommitsMode,
    pub stash: PaneModel<StashEntry>,
    pub main: PaneModel<String>,
    pub command_log: PaneModel<String>,

    pub branch_name: String,
    pub status_message: Option<(String, Instant)>,
    pub last_command: Option<String>,
    pub should_quit: bool,

    diff_generation: u64,
    command_log_capacity: usize,
    status_ttl: Duration,
}

impl App {
    pub fn new(repo_name: String, config: &Config) -> Self {
        let mut app = Self {
            repo_name,
            focus: PaneId::Files,
            dialog: None,
            layout: compute_layout(80, 24, PaneId::Files),
            files: PaneModel::new(),
            branches: PaneModel::new(),
            commits: PaneModel::new(),
            reflog: PaneModel::new(),
            commits_mode: CommitsMode::Commits,
            stash: PaneModel::new(),
            main: PaneModel::viewport(),
            command_log: PaneModel::viewport(),
            branch_name: String::new(),
            status_message: None,
            last_command: None,
            should_quit: false,
            diff_generation: 0,
            command_log_capacity: config.command_log_capacity,
            status_ttl: config.status_ttl(),
        };
        app.sync_focus();
        app.apply_viewports();
        app
    }

    /// Loads issued once at startup.
    pub fn initial_operations(&self) -> Vec<Operation> {
        reload_batch(false)
    }

    pub fn update(&mut self, event: Event) -> Vec<Operation> {
        match event {
            Event::Key(key) => self.handle_key(&key),
            Event::Resize { width, height } => {
                self.layout = compute_layout(width, height, self.focus);
                self.apply_viewports();
                Vec::new()
            }
            Event::Outcome(outcome) => self.handle_outcome(outcome),
        }
    }

    /// Clear the status message once its TTL has passed. Returns whether it changed.
    pub fn maybe_expire_status(&mut self) -> bool {
        let should_clear = self
            .status_message
            .as_ref()
            .is_some_and(|(_, t)| t.elapsed() >= self.status_ttl);
        if should_clear {
            self.status_message = None;
        }
        should_clear
    }

    pub fn diff_generation(&self) -> u64 {
        self.diff_generation
    }

    fn set_status<S: Into<String>>(&mut self, msg: S) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    fn show_error<S: Into<String>>(&mut self, message: S) {
        self.dialog = Some(Dialog::error(message));
    }

    fn record_command(&mut self, command: &str, failed: bool) {
        let entry = if failed {
            format!("$ {command} (failed)")
        } else {
            format!("$ {command}")
        };
        self.command_log.push_bounded(entry, self.command_log_capacity);
        self.last_command = Some(command.to_string());
    }

    fn sync_focus(&mut self) {
        let focus = self.focus;
        self.files.set_focus(focus == PaneId::Files);
        self.branches.set_focus(focus == PaneId::Branches);
        self.commits.set_focus(focus == PaneId::Commits);
        self.reflog.set_focus(focus == PaneId::Commits);
        self.stash.set_focus(focus == PaneId::Stash);
        self.main.set_focus(focus == PaneId::Main);
        self.command_log.set_focus(focus == PaneId::CommandLog);
    }

    fn apply_viewports(&mut self) {
        let l = self.layout;
        self.files.set_viewport_height(l.content_height(PaneId::Files));
        self.branches.set_viewport_height(l.content_height(PaneId::Branches));
        self.commits.set_viewport_height(l.content_height(PaneId::Commits));
        self.reflog.set_viewport_height(l.content_height(PaneId::Commits));
        self.stash.set_viewport_height(l.content_height(PaneId::Stash));
        self.main.set_viewport_height(l.content_height(PaneId::Main));
        self.command_log.set_viewport_height(l.content_height(PaneId::CommandLog));
    }

    fn focus_pane(&mut self, pane: PaneId) -> Vec<Operation> {
        self.focus = pane;
        self.sync_focus();
        self.layout = compute_layout(self.layout.width, self.layout.height, pane);
        self.apply_viewports();
        self.diff_for_focus().into_iter().collect()
    }

    fn focused_list(&mut self) -> Option<&mut dyn ListNav> {
        match self.focus {
            PaneId::Files => Some(&mut self.files),
            PaneId::Branches => Some(&mut self.branches),
            PaneId::Commits => match self.commits_mode {
                CommitsMode::Commits => Some(&mut self.commits),
                CommitsMode::Reflog => Some(&mut self.reflog),
            },
            PaneId::Stash => Some(&mut self.stash),
            _ => None,
        }
    }

    fn focused_viewport(&mut self) -> Option<&mut PaneModel<String>> {
        match self.focus {
            PaneId::Main => Some(&mut self.main),
            PaneId::CommandLog => Some(&mut self.command_log),
            _ => None,
        }
    }

    fn selected_commit_hash(&self) -> Option<String> {
        match self.commits_mode {
            CommitsMode::Commits => self.commits.selected().map(|c| c.hash.clone()),
            CommitsMode::Reflog => self.reflog.selected().map(|r| r.hash.clone()),
        }
    }

    fn diff_target(&self) -> Option<DiffTarget> {
        match self.focus {
            PaneId::Files => self.files.selected().map(|f| DiffTarget::File {
                path: f.path.clone(),
                staged: f.staged,
                untracked: f.is_untracked(),
            }),
            PaneId::Branches => self.branches.selected().map(|b| DiffTarget::Branch {
                name: b.name.clone(),
            }),
            PaneId::Commits => self.selected_commit_hash().map(|hash| DiffTarget::Commit { hash }),
            PaneId::Stash => self.stash.selected().map(|s| DiffTarget::Stash {
                stash_ref: s.stash_ref.clone(),
            }),
            _ => None,
        }
    }

    /// Diff load for the focused list pane's selection. Each call starts a new
    /// generation, so results for earlier selections are dropped on arrival.
    fn diff_for_focus(&mut self) -> Option<Operation> {
        if !self.focus.is_list() {
            return None;
        }
        self.diff_generation += 1;
        match self.diff_target() {
            Some(target) => Some(Operation::LoadDiff {
                target,
                generation: self.diff_generation,
            }),
            None => {
                self.main.set_items(Vec::new());
                None
            }
        }
    }

    /// Load the selection's diff and move focus to Main to read it.
    fn view_in_main(&mut self) -> Vec<Operation> {
        let Some(op) = self.diff_for_focus() else {
            return Vec::new();
        };
        let mut ops = vec![op];
        ops.extend(self.focus_pane(PaneId::Main));
        ops
    }

    fn handle_key(&mut self, key: &KeyEvent) -> Vec<Operation> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return Vec::new();
        }
        if self.dialog.is_some() {
            return self.handle_dialog_key(key);
        }
        match keymap::action_for(self.focus, key) {
            Some(action) => self.handle_action(action),
            None => Vec::new(),
        }
    }

    fn handle_dialog_key(&mut self, key: &KeyEvent) -> Vec<Operation> {
        let Some(dialog) = self.dialog.take() else {
            return Vec::new();
        };

        match dialog {
            Dialog::Commit { amend, mut input } => match key.code {
                KeyCode::Esc => Vec::new(),
                KeyCode::Enter => {
                    let message = input.value().trim().to_string();
                    if amend {
                        vec![Operation::Amend { message }]
                    } else if message.is_empty() {
                        self.show_error("Commit message is empty");
                        Vec::new()
                    } else {
                        vec![Operation::Commit { message }]
                    }
                }
                _ => {
                    input.handle_key(key);
                    self.dialog = Some(Dialog::Commit { amend, input });
                    Vec::new()
                }
            },
            Dialog::CreateBranch { mut input } => match key.code {
                KeyCode::Esc => Vec::new(),
                KeyCode::Enter => {
                    let name = input.value().trim().to_string();
                    if name.is_empty() {
                        self.show_error("Branch name is empty");
                        Vec::new()
                    } else {
                        vec![Operation::CreateBranch { name }]
                    }
                }
                _ => {
                    input.handle_key(key);
                    self.dialog = Some(Dialog::CreateBranch { input });
                    Vec::new()
                }
            },
            Dialog::Confirm { action } => match key.code {
                KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                    vec![action.into_operation()]
                }
                KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => Vec::new(),
                _ => {
                    self.dialog = Some(Dialog::Confirm { action });
                    Vec::new()
                }
            },
            Dialog::Error { message } => match key.code {
                KeyCode::Esc | KeyCode::Enter => Vec::new(),
                _ => {
                    self.dialog = Some(Dialog::Error { message });
                    Vec::new()
                }
            },
        }
    }

    fn handle_action(&mut self, action: Action) -> Vec<Operation> {
        match action {
            Action::Quit => {
                self.should_quit = true;
                Vec::new()
            }
            Action::FocusNext => self.focus_pane(self.focus.next()),
            Action::FocusPrev => self.focus_pane(self.focus.prev()),
            Action::FocusPane(pane) => self.focus_pane(pane),
            Action::Back => {
                if self.focus.is_viewport() {
                    self.focus_pane(PaneId::Files)
                } else {
                    Vec::new()
                }
            }
            Action::Pull => vec![Operation::Pull],
            Action::Push => vec![Operation::Push],
            Action::Fetch => vec![Operation::Fetch],

            Action::CursorUp | Action::CursorDown | Action::CursorTop | Action::CursorBottom => {
                let Some(list) = self.focused_list() else {
                    return Vec::new();
                };
                match action {
                    Action::CursorUp => list.cursor_up(),
                    Action::CursorDown => list.cursor_down(),
                    Action::CursorTop => list.cursor_to_top(),
                    _ => list.cursor_to_bottom(),
                }
                self.diff_for_focus().into_iter().collect()
            }

            Action::ScrollUp
            | Action::ScrollDown
            | Action::PageUp
            | Action::PageDown
            | Action::ScrollTop
            | Action::ScrollBottom => {
                if let Some(view) = self.focused_viewport() {
                    match action {
                        Action::ScrollUp => view.scroll_up(1),
                        Action::ScrollDown => view.scroll_down(1),
                        Action::PageUp => view.page_up(),
                        Action::PageDown => view.page_down(),
                        Action::ScrollTop => view.scroll_to_top(),
                        _ => view.scroll_to_bottom(),
                    }
                }
                Vec::new()
            }

            Action::ToggleStage => match self.files.selected() {
                Some(f) if f.staged => vec![Operation::Unstage { path: f.path.clone() }],
                Some(f) => vec![Operation::Stage { path: f.path.clone() }],
                None => Vec::new(),
            },
            Action::StageAll => vec![Operation::StageAll],
            Action::Commit => {
                self.dialog = Some(Dialog::commit(false));
                Vec::new()
            }
            Action::Amend => {
                if self.files.items().iter().any(|f| f.staged) {
                    self.dialog = Some(Dialog::commit(true));
                }
                Vec::new()
            }
            Action::Discard => {
                match self.files.selected().cloned() {
                    Some(f) if f.staged => {
                        self.show_error("Cannot discard staged file. Unstage first (space)")
                    }
                    Some(f) => {
                        let untracked = f.is_untracked();
                        let action = ConfirmAction::Discard { path: f.path, untracked };
                        self.dialog = Some(Dialog::confirm(action));
                    }
                    None => {}
                }
                Vec::new()
            }
            Action::ViewFile | Action::ViewCommit | Action::ViewStash => self.view_in_main(),

            Action::Checkout => match self.branches.selected() {
                Some(b) if !b.is_current => vec![Operation::Checkout { branch: b.name.clone() }],
                _ => Vec::new(),
            },
            Action::NewBranch => {
                self.dialog = Some(Dialog::create_branch());
                Vec::new()
            }
            Action::DeleteBranch | Action::ForceDeleteBranch => {
                let force = action == Action::ForceDeleteBranch;
                match self.branches.selected().cloned() {
                    Some(b) if b.is_current => self.show_error("Cannot delete current branch"),
                    Some(b) => {
                        let action = ConfirmAction::DeleteBranch { name: b.name, force };
                        self.dialog = Some(Dialog::confirm(action));
                    }
                    None => {}
                }
                Vec::new()
            }

            Action::ToggleReflog => {
                let mut ops = Vec::new();
                self.commits_mode = match self.commits_mode {
                    CommitsMode::Commits => {
                        self.reflog.cursor_to_top();
                        ops.push(Operation::LoadReflog);
                        CommitsMode::Reflog
                    }
                    CommitsMode::Reflog => {
                        self.commits.cursor_to_top();
                        CommitsMode::Commits
                    }
                };
                ops.extend(self.diff_for_focus());
                ops
            }
            Action::UndoCommitSoft | Action::UndoCommitMixed => {
                if self.commits_mode == CommitsMode::Commits && self.commits.cursor() == Some(0) {
                    let mode = if action == Action::UndoCommitSoft {
                        ResetMode::Soft
                    } else {
                        ResetMode::Mixed
                    };
                    self.dialog = Some(Dialog::confirm(ConfirmAction::UndoCommit { mode }));
                }
                Vec::new()
            }

            Action::StashApply => match self.stash.selected() {
                Some(s) => vec![Operation::StashApply {
                    stash_ref: s.stash_ref.clone(),
                }],
                None => Vec::new(),
            },
            Action::StashPop => match self.stash.selected() {
                Some(s) => vec![Operation::StashPop {
                    stash_ref: s.stash_ref.clone(),
                }],
                None => Vec::new(),
            },
            Action::StashDrop => {
                if let Some(s) = self.stash.selected() {
                    let stash_ref = s.stash_ref.clone();
                    self.dialog = Some(Dialog::confirm(ConfirmAction::DropStash { stash_ref }));
                }
                Vec::new()
            }
        }
    }

    fn handle_outcome(&mut self, outcome: Outcome) -> Vec<Operation> {
        match outcome {
            Outcome::StatusLoaded(entries) => {
                self.files.set_items(entries);
                if self.focus == PaneId::Files {
                    return self.diff_for_focus().into_iter().collect();
                }
            }
            Outcome::CommitsLoaded(commits) => {
                self.commits.set_items(commits);
                if self.focus == PaneId::Commits && self.commits_mode == CommitsMode::Commits {
                    return self.diff_for_focus().into_iter().collect();
                }
            }
            Outcome::ReflogLoaded(entries) => {
                self.reflog.set_items(entries);
                if self.focus == PaneId::Commits && self.commits_mode == CommitsMode::Reflog {
                    return self.diff_for_focus().into_iter().collect();
                }
            }
            Outcome::BranchLoaded(name) => self.branch_name = name,
            Outcome::BranchesLoaded(branches) => {
                self.branches.set_items(branches);
                if self.focus == PaneId::Branches {
                    return self.diff_for_focus().into_iter().collect();
                }
            }
            Outcome::StashLoaded(entries) => {
                self.stash.set_items(entries);
                if self.focus == PaneId::Stash {
                    return self.diff_for_focus().into_iter().collect();
                }
            }
            Outcome::DiffLoaded { generation, text } => {
                if generation == self.diff_generation {
                    self.main.set_items(text.lines().map(str::to_string).collect());
                    self.main.scroll_to_top();
                } else {
                    log::warn!(
                        "dropping stale diff (generation {generation}, latest {})",
                        self.diff_generation
                    );
                }
            }
            Outcome::Completed { command, description } => {
                log::info!("{command}: {description}");
                self.record_command(&command, false);
                self.set_status(description);
                return reload_batch(self.commits_mode == CommitsMode::Reflog);
            }
            Outcome::Failed {
                command,
                message,
                mutating,
            } => {
                if mutating && let Some(command) = &command {
                    self.record_command(command, true);
                }
                self.show_error(message);
            }
        }
        Vec::new()
    }
}
