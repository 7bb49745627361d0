//! Error types shared by the gateway, startup checks and the binary entry point.

use std::{io, path::PathBuf, time::Duration};
use thiserror::Error;

/// Failure of a single invocation of the git executable.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("{command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{command}: {message}")]
    Failed { command: String, message: String },

    #[error("{command}: timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("{0}")]
    Other(String),
}

impl GitError {
    /// Command text the error belongs to, when one was run.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Spawn { command, .. }
            | Self::Failed { command, .. }
            | Self::Timeout { command, .. } => Some(command),
            Self::Other(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Fatal conditions detected before the event loop starts.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("git not found in PATH")]
    GitNotFound,

    #[error("Not a git repository. Run inside a repo or pass --repo <path>.")]
    NotARepository,

    #[error("Invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StartupError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::GitNotFound => 3,
            Self::NotARepository => 2,
            Self::Config { .. } | Self::Io(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(StartupError::GitNotFound.exit_code(), 3);
        assert_eq!(StartupError::NotARepository.exit_code(), 2);
        assert_eq!(StartupError::Io(io::Error::other("boom")).exit_code(), 1);
    }

    #[test]
    fn test_git_error_display_and_command() {
        let err = GitError::Failed {
            command: "git branch -d main".to_string(),
            message: "error: cannot delete".to_string(),
        };
        assert_eq!(err.to_string(), "git branch -d main: error: cannot delete");
        assert_eq!(err.command(), Some("git branch -d main"));

        let err = GitError::Timeout {
            command: "git fetch --all --prune".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "git fetch --all --prune: timed out after 30s");

        let err = GitError::Timeout {
            command: "git status".to_string(),
            timeout: Duration::from_millis(300),
        };
        assert_eq!(err.to_string(), "git status: timed out after 300ms");

        assert_eq!(GitError::Other("x".to_string()).command(), None);
    }

    #[test]
    fn test_not_found_detection() {
        let err = GitError::Spawn {
            command: "git --version".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.is_not_found());
    }
}
