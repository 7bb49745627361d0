//! Modal dialogs. At most one is open at a time and it receives every key
//! until it closes.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::dispatch::{Operation, ResetMode};

pub const COMMIT_MESSAGE_LIMIT: usize = 200;
pub const BRANCH_NAME_LIMIT: usize = 100;

/// Single-line text field with a character cursor and a length limit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    cursor: usize,
    limit: usize,
}

impl TextInput {
    pub fn new(limit: usize) -> Self {
        Self {
            value: String::new(),
            cursor: 0,
            limit,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.value.chars().count() {
            self.cursor += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    pub fn insert_char(&mut self, ch: char) {
        if ch.is_control() || self.value.chars().count() >= self.limit {
            return;
        }
        let byte = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let b0 = char_to_byte_index(&self.value, self.cursor - 1);
        let b1 = char_to_byte_index(&self.value, self.cursor);
        self.value.replace_range(b0..b1, "");
        self.cursor -= 1;
    }

    pub fn delete(&mut self) {
        if self.cursor >= self.value.chars().count() {
            return;
        }
        let b0 = char_to_byte_index(&self.value, self.cursor);
        let b1 = char_to_byte_index(&self.value, self.cursor + 1);
        self.value.replace_range(b0..b1, "");
    }

    /// Apply an editing key. Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return false;
        }
        match key.code {
            KeyCode::Char(ch) => self.insert_char(ch),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.move_home(),
            KeyCode::End => self.move_end(),
            _ => return false,
        }
        true
    }
}

fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices().nth(char_idx).map(|(i, _)| i).unwrap_or(s.len())
}

/// Destructive operation awaiting a yes/no answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmAction {
    UndoCommit { mode: ResetMode },
    DeleteBranch { name: String, force: bool },
    DropStash { stash_ref: String },
    Discard { path: String, untracked: bool },
}

impl ConfirmAction {
    pub fn title(&self) -> String {
        match self {
            Self::UndoCommit {
                mode: ResetMode::Soft,
            } => "Undo last commit (keep staged)?".to_string(),
            Self::UndoCommit {
                mode: ResetMode::Mixed,
            } => "Undo last commit (keep unstaged)?".to_string(),
            Self::DeleteBranch { name, force: false } => format!("Delete branch {name}?"),
            Self::DeleteBranch { name, force: true } => format!("Force delete branch {name}?"),
            Self::DropStash { stash_ref } => format!("Drop {stash_ref}?"),
            Self::Discard { path, .. } => format!("Discard changes to {path}?"),
        }
    }

    pub fn into_operation(self) -> Operation {
        match self {
            Self::UndoCommit { mode } => Operation::Reset { mode, count: 1 },
            Self::DeleteBranch { name, force } => Operation::DeleteBranch { name, force },
            Self::DropStash { stash_ref } => Operation::StashDrop { stash_ref },
            Self::Discard { path, untracked } => Operation::Discard { path, untracked },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dialog {
    Commit { amend: bool, input: TextInput },
    CreateBranch { input: TextInput },
    Confirm { action: ConfirmAction },
    Error { message: String },
}

impl Dialog {
    pub fn commit(amend: bool) -> Self {
        Dialog::Commit {
            amend,
            input: TextInput::new(COMMIT_MESSAGE_LIMIT),
        }
    }

    pub fn create_branch() -> Self {
        Dialog::CreateBranch {
            input: TextInput::new(BRANCH_NAME_LIMIT),
        }
    }

    pub fn confirm(action: ConfirmAction) -> Self {
        Dialog::Confirm { action }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Dialog::Error {
            message: message.into(),
        }
    }

    pub fn title(&self) -> String {
        match self {
            Dialog::Commit { amend: false, .. } => "Commit message".to_string(),
            Dialog::Commit { amend: true, .. } => "Amend commit (empty keeps message)".to_string(),
            Dialog::CreateBranch { .. } => "New branch name".to_string(),
            Dialog::Confirm { action } => action.title(),
            Dialog::Error { .. } => "Error".to_string(),
        }
    }

    pub fn input(&self) -> Option<&TextInput> {
        match self {
            Dialog::Commit { input, .. } | Dialog::CreateBranch { input } => Some(input),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(s: &str, limit: usize) -> TextInput {
        let mut input = TextInput::new(limit);
        for ch in s.chars() {
            input.insert_char(ch);
        }
        input
    }

    #[test]
    fn test_editing_multibyte() {
        let mut input = typed("héllo", 50);
        input.move_left();
        input.move_left();
        input.backspace();
        assert_eq!(input.value(), "hélo");
        input.move_home();
        input.delete();
        assert_eq!(input.value(), "élo");
        input.move_end();
        input.insert_char('!');
        assert_eq!(input.value(), "élo!");
        assert_eq!(input.cursor(), 4);
    }

    #[test]
    fn test_limit_is_enforced() {
        let input = typed(&"x".repeat(BRANCH_NAME_LIMIT + 10), BRANCH_NAME_LIMIT);
        assert_eq!(input.value().chars().count(), BRANCH_NAME_LIMIT);
    }

    #[test]
    fn test_handle_key_ignores_control_chords() {
        let mut input = TextInput::new(10);
        assert!(input.handle_key(&KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE)));
        assert!(!input.handle_key(&KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL)));
        assert!(!input.handle_key(&KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
        assert_eq!(input.value(), "a");
    }

    #[test]
    fn test_confirm_titles_and_operations() {
        let action = ConfirmAction::DeleteBranch {
            name: "feature".to_string(),
            force: false,
        };
        assert_eq!(action.title(), "Delete branch feature?");
        assert_eq!(
            action.into_operation(),
            Operation::DeleteBranch {
                name: "feature".to_string(),
                force: false
            }
        );

        let action = ConfirmAction::UndoCommit { mode: ResetMode::Mixed };
        assert_eq!(action.title(), "Undo last commit (keep unstaged)?");
        assert_eq!(
            action.into_operation(),
            Operation::Reset {
                mode: ResetMode::Mixed,
                count: 1
            }
        );

        let action = ConfirmAction::DropStash {
            stash_ref: "stash@{0}".to_string(),
        };
        assert_eq!(action.title(), "Drop stash@{0}?");
    }
}
