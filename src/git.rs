//! Process boundary to the git executable.
//!
//! Every read and write of repository state goes through a [`Gateway`]. The
//! production implementation, [`GitRunner`], spawns `git -C <root> ...` on the
//! tokio process driver and enforces a per-call timeout; the child is killed
//! when the timeout elapses. Gateways are stateless, so any number of calls may
//! be in flight at once.

use futures::{FutureExt, future::BoxFuture};
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};
use tokio::process::Command;

use crate::error::GitError;

/// Timeout classes for gateway calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// Metadata queries and quick index/ref updates.
    pub short: Duration,
    /// Diffs, patches and commits (hooks may run).
    pub diff: Duration,
    /// Pull, push and fetch.
    pub network: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(3),
            diff: Duration::from_secs(10),
            network: Duration::from_secs(30),
        }
    }
}

/// Captured stdout of a successful call, with the command text that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitOutput {
    pub command: String,
    pub stdout: Vec<u8>,
}

impl GitOutput {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }
}

pub trait Gateway: Send + Sync + 'static {
    fn repo_root(&self) -> &Path;

    /// Run `git <args>` in the repository, failing on non-zero exit or timeout.
    fn run(
        &self,
        args: Vec<String>,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<GitOutput, GitError>>;
}

#[derive(Clone, Debug)]
pub struct GitRunner {
    repo_root: PathBuf,
}

impl GitRunner {
    pub fn new(repo_root: PathBuf) -> Self {
        Self { repo_root }
    }
}

impl Gateway for GitRunner {
    fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn run(
        &self,
        args: Vec<String>,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<GitOutput, GitError>> {
        let root = self.repo_root.clone();
        async move { run_git(Some(&root), &args, timeout).await }.boxed()
    }
}

async fn run_git(
    cwd: Option<&Path>,
    args: &[String],
    timeout: Duration,
) -> Result<GitOutput, GitError> {
    let command = display_command(args);

    let mut cmd = Command::new("git");
    if let Some(cwd) = cwd {
        cmd.arg("-C").arg(cwd);
    }
    cmd.args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GCM_INTERACTIVE", "never")
        .env("GIT_PAGER", "cat")
        .env("PAGER", "cat")
        .env("GIT_EDITOR", ":")
        .env("EDITOR", ":")
        .env("GIT_SEQUENCE_EDITOR", ":")
        .env("GIT_MERGE_AUTOEDIT", "no")
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let out = match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => return Err(GitError::Timeout { command, timeout }),
        Ok(Err(source)) => return Err(GitError::Spawn { command, source }),
        Ok(Ok(out)) => out,
    };

    if !out.status.success() {
        let mut message = String::from_utf8_lossy(&out.stderr).trim().to_string();
        if message.is_empty() {
            message = String::from_utf8_lossy(&out.stdout).trim().to_string();
        }
        if message.is_empty() {
            message = out.status.to_string();
        }
        return Err(GitError::Failed { command, message });
    }

    Ok(GitOutput {
        command,
        stdout: out.stdout,
    })
}

/// Check that a runnable `git` is on the PATH.
pub async fn locate_git(timeout: Duration) -> Result<(), GitError> {
    run_git(None, &["--version".to_string()], timeout).await.map(|_| ())
}

/// Resolve the top-level directory of the repository containing `path`.
pub async fn detect_repo_root(path: &Path, timeout: Duration) -> Result<PathBuf, GitError> {
    let args = ["rev-parse", "--show-toplevel"].map(String::from);
    let out = run_git(Some(path), &args, timeout).await?;
    let root = out.text().trim().to_string();
    if root.is_empty() {
        return Err(GitError::Other("not a git repository".to_string()));
    }
    Ok(std::path::absolute(&root).unwrap_or_else(|_| PathBuf::from(root)))
}

/// Human-readable form of a git invocation, quoting arguments that need it.
pub fn display_command(args: &[String]) -> String {
    let mut out = String::from("git");
    for arg in args {
        out.push(' ');
        if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"') {
            out.push('"');
            out.push_str(&arg.replace('"', "\\\""));
            out.push('"');
        } else {
            out.push_str(arg);
        }
    }
    out
}

#[cfg(test)]
pub mod testing {
    //! Recording gateway used by dispatcher and state-machine tests.

    use super::*;
    use parking_lot::Mutex;

    pub struct FakeGateway {
        root: PathBuf,
        calls: Mutex<Vec<Vec<String>>>,
        responses: Mutex<Vec<(Vec<String>, Result<String, String>)>>,
    }

    impl FakeGateway {
        pub fn new() -> Self {
            Self::with_root(PathBuf::from("/repo"))
        }

        pub fn with_root(root: PathBuf) -> Self {
            Self {
                root,
                calls: Mutex::new(Vec::new()),
                responses: Mutex::new(Vec::new()),
            }
        }

        /// Answer calls whose arguments start with `prefix`. Later entries win.
        pub fn respond(&self, prefix: &[&str], result: Result<&str, &str>) {
            let prefix = prefix.iter().map(|s| s.to_string()).collect();
            let result = result.map(str::to_string).map_err(str::to_string);
            self.responses.lock().push((prefix, result));
        }

        /// Every call made so far, rendered as command text.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().iter().map(|a| display_command(a)).collect()
        }
    }

    impl Gateway for FakeGateway {
        fn repo_root(&self) -> &Path {
            &self.root
        }

        fn run(
            &self,
            args: Vec<String>,
            _timeout: Duration,
        ) -> BoxFuture<'static, Result<GitOutput, GitError>> {
            self.calls.lock().push(args.clone());
            let command = display_command(&args);

            let response = self
                .responses
                .lock()
                .iter()
                .rev()
                .find(|(prefix, _)| args.starts_with(prefix))
                .map(|(_, r)| r.clone())
                .unwrap_or_else(|| Ok(String::new()));

            let result = match response {
                Ok(stdout) => Ok(GitOutput {
                    command,
                    stdout: stdout.into_bytes(),
                }),
                Err(message) => Err(GitError::Failed { command, message }),
            };
            futures::future::ready(result).boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SHORT: Duration = Duration::from_secs(5);

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    async fn init_repo(dir: &Path) -> GitRunner {
        let runner = GitRunner::new(dir.to_path_buf());
        let hooks = dir.join(".git").join("hooks").to_string_lossy().to_string();
        let setup: [&[&str]; 5] = [
            &["init", "-q"],
            &["config", "user.name", "gitzen"],
            &["config", "user.email", "gitzen@example.com"],
            &["config", "commit.gpgsign", "false"],
            &["config", "core.hooksPath", hooks.as_str()],
        ];
        for step in setup {
            runner.run(args(step), SHORT).await.unwrap();
        }
        runner
    }

    #[test]
    fn test_display_command_quotes_when_needed() {
        assert_eq!(
            display_command(&args(&["status", "--porcelain=v1", "-z"])),
            "git status --porcelain=v1 -z"
        );
        assert_eq!(
            display_command(&args(&["commit", "-m", "fix the \"thing\""])),
            "git commit -m \"fix the \\\"thing\\\"\""
        );
        assert_eq!(display_command(&args(&["add", "--", ""])), "git add -- \"\"");
    }

    #[tokio::test]
    async fn test_fake_gateway_records_and_matches_prefix() {
        let fake = testing::FakeGateway::new();
        fake.respond(&["log"], Ok("abc first"));
        fake.respond(&["push"], Err("rejected"));

        let out = fake
            .run(args(&["log", "--oneline"]), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out.text(), "abc first");
        assert_eq!(out.command, "git log --oneline");

        let err = fake.run(args(&["push"]), Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "git push: rejected");

        assert_eq!(fake.calls(), vec!["git log --oneline", "git push"]);
    }

    #[tokio::test]
    async fn test_detect_repo_root() {
        let plain = TempDir::new().unwrap();
        let err = detect_repo_root(plain.path(), SHORT).await.unwrap_err();
        let GitError::Failed { command, message } = &err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(command, "git rev-parse --show-toplevel");
        assert!(message.contains("not a git repository"), "{message}");

        let dir = TempDir::new().unwrap();
        init_repo(dir.path()).await;
        let nested = dir.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        let root = detect_repo_root(&nested, SHORT).await.unwrap();
        assert_eq!(
            std::fs::canonicalize(root).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_failure_message_uses_stderr_then_stdout() {
        let dir = TempDir::new().unwrap();
        let runner = init_repo(dir.path()).await;

        let err = runner
            .run(args(&["checkout", "no-such-branch"]), SHORT)
            .await
            .unwrap_err();
        let GitError::Failed { message, .. } = &err else {
            panic!("unexpected error {err:?}");
        };
        assert!(message.starts_with("error: pathspec 'no-such-branch'"), "{message}");

        // "nothing to commit" is reported on stdout with an empty stderr.
        let err = runner
            .run(args(&["commit", "-m", "empty"]), SHORT)
            .await
            .unwrap_err();
        let GitError::Failed { command, message } = &err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(command, "git commit -m empty");
        assert!(message.contains("nothing to commit"), "{message}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_command_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let runner = init_repo(dir.path()).await;
        std::fs::write(dir.path().join("a.txt"), "a\n").unwrap();
        runner.run(args(&["add", "a.txt"]), SHORT).await.unwrap();

        let hook = dir.path().join(".git").join("hooks").join("pre-commit");
        std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
        std::fs::write(&hook, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

        let started = std::time::Instant::now();
        let timeout = Duration::from_millis(300);
        let err = runner
            .run(args(&["commit", "-m", "slow"]), timeout)
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(matches!(&err, GitError::Timeout { timeout: t, .. } if *t == timeout));
        assert_eq!(err.to_string(), "git commit -m slow: timed out after 300ms");
    }
}
