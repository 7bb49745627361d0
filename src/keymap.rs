use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::pane::PaneId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    FocusNext,
    FocusPrev,
    FocusPane(PaneId),
    Back,
    Pull,
    Push,
    Fetch,

    CursorUp,
    CursorDown,
    CursorTop,
    CursorBottom,

    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    ScrollTop,
    ScrollBottom,

    ToggleStage,
    StageAll,
    Commit,
    Amend,
    Discard,
    ViewFile,

    Checkout,
    NewBranch,
    DeleteBranch,
    ForceDeleteBranch,

    ViewCommit,
    ToggleReflog,
    UndoCommitSoft,
    UndoCommitMixed,

    StashApply,
    StashPop,
    StashDrop,
    ViewStash,
}

/// Resolve a key press in the focused pane. Pane bindings shadow global ones.
pub fn action_for(focus: PaneId, key: &KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            _ => None,
        };
    }
    pane_action(focus, key.code).or_else(|| global_action(key.code))
}

fn global_action(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Tab => Some(Action::FocusNext),
        KeyCode::BackTab => Some(Action::FocusPrev),
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Char('p') => Some(Action::Pull),
        KeyCode::Char('P') => Some(Action::Push),
        KeyCode::Char('f') => Some(Action::Fetch),
        KeyCode::Char(c @ '1'..='6') => PaneId::from_digit(c).map(Action::FocusPane),
        _ => None,
    }
}

fn pane_action(focus: PaneId, code: KeyCode) -> Option<Action> {
    if focus.is_viewport() {
        return match code {
            KeyCode::Char('j') | KeyCode::Down => Some(Action::ScrollDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::ScrollUp),
            KeyCode::Char('d') | KeyCode::PageDown => Some(Action::PageDown),
            KeyCode::Char('u') | KeyCode::PageUp => Some(Action::PageUp),
            KeyCode::Char('g') | KeyCode::Home => Some(Action::ScrollTop),
            KeyCode::Char('G') | KeyCode::End => Some(Action::ScrollBottom),
            _ => None,
        };
    }

    let nav = match code {
        KeyCode::Char('j') | KeyCode::Down => Some(Action::CursorDown),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::CursorUp),
        KeyCode::Char('g') | KeyCode::Home => Some(Action::CursorTop),
        KeyCode::Char('G') | KeyCode::End => Some(Action::CursorBottom),
        _ => None,
    };
    if nav.is_some() {
        return nav;
    }

    match (focus, code) {
        (PaneId::Files, KeyCode::Char(' ')) => Some(Action::ToggleStage),
        (PaneId::Files, KeyCode::Char('a')) => Some(Action::StageAll),
        (PaneId::Files, KeyCode::Char('c')) => Some(Action::Commit),
        (PaneId::Files, KeyCode::Char('A')) => Some(Action::Amend),
        (PaneId::Files, KeyCode::Char('d')) => Some(Action::Discard),
        (PaneId::Files, KeyCode::Enter) => Some(Action::ViewFile),

        (PaneId::Branches, KeyCode::Char(' ') | KeyCode::Enter) => Some(Action::Checkout),
        (PaneId::Branches, KeyCode::Char('n')) => Some(Action::NewBranch),
        (PaneId::Branches, KeyCode::Char('d')) => Some(Action::DeleteBranch),
        (PaneId::Branches, KeyCode::Char('D')) => Some(Action::ForceDeleteBranch),

        (PaneId::Commits, KeyCode::Enter) => Some(Action::ViewCommit),
        (PaneId::Commits, KeyCode::Char('[') | KeyCode::Char(']')) => Some(Action::ToggleReflog),
        (PaneId::Commits, KeyCode::Char('r')) => Some(Action::UndoCommitSoft),
        (PaneId::Commits, KeyCode::Char('R')) => Some(Action::UndoCommitMixed),

        (PaneId::Stash, KeyCode::Char(' ')) => Some(Action::StashApply),
        (PaneId::Stash, KeyCode::Char('p')) => Some(Action::StashPop),
        (PaneId::Stash, KeyCode::Char('d')) => Some(Action::StashDrop),
        (PaneId::Stash, KeyCode::Enter) => Some(Action::ViewStash),

        _ => None,
    }
}

const GLOBAL_HELP: &str = "tab: switch | p: pull | P: push | f: fetch | q: quit";

fn pane_help(focus: PaneId) -> Option<&'static str> {
    match focus {
        PaneId::Files => {
            Some("space: stage | a: all | c: commit | A: amend | d: discard | enter: view")
        }
        PaneId::Branches => Some("space/enter: checkout | n: new | d: delete | D: force delete"),
        PaneId::Commits => {
            Some("enter: view | [ ]: reflog | r: undo (staged) | R: undo (unstaged)")
        }
        PaneId::Stash => Some("space: apply | p: pop | d: drop | enter: view"),
        PaneId::Main | PaneId::CommandLog => {
            Some("j/k: scroll | d/u: page | g/G: top/bottom | esc: back")
        }
        PaneId::Status => None,
    }
}

/// Info bar help for the focused pane, followed by the global bindings.
pub fn help(focus: PaneId) -> String {
    match pane_help(focus) {
        Some(pane) => format!("{pane} | {GLOBAL_HELP}"),
        None => GLOBAL_HELP.to_string(),
    }
}
