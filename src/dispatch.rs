//! Async command dispatch.
//!
//! The state machine describes work as [`Operation`] values. The
//! [`Dispatcher`] runs each one on its own tokio task and reports exactly one
//! [`Outcome`] per operation on an mpsc channel that the event loop drains.
//! Operations are independent: nothing here serializes them or cancels them.

use std::{path::Path, sync::Arc};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::GitError;
use crate::git::{Gateway, GitOutput, Timeouts};
use crate::git_ops;
use crate::parse::{self, BranchEntry, CommitEntry, FileEntry, ReflogEntry, StashEntry};
use crate::patch_cache::PatchCache;

pub const NO_DIFF: &str = "(no diff)";
pub const NO_BRANCH_DIFF: &str = "(no diff from current branch)";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetMode {
    Soft,
    Mixed,
}

impl ResetMode {
    fn flag(self) -> &'static str {
        match self {
            ResetMode::Soft => "soft",
            ResetMode::Mixed => "mixed",
        }
    }
}

/// What the Main pane should show.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffTarget {
    File { path: String, staged: bool, untracked: bool },
    Commit { hash: String },
    Stash { stash_ref: String },
    Branch { name: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    LoadStatus,
    LoadCommits,
    LoadReflog,
    LoadCurrentBranch,
    LoadBranches,
    LoadStash,
    LoadDiff { target: DiffTarget, generation: u64 },

    Stage { path: String },
    Unstage { path: String },
    StageAll,
    Commit { message: String },
    /// Amend HEAD; an empty message keeps the existing one.
    Amend { message: String },
    Discard { path: String, untracked: bool },
    Checkout { branch: String },
    CreateBranch { name: String },
    DeleteBranch { name: String, force: bool },
    StashApply { stash_ref: String },
    StashPop { stash_ref: String },
    StashDrop { stash_ref: String },
    Reset { mode: ResetMode, count: usize },
    Pull,
    Push,
    Fetch,
}

impl Operation {
    /// Whether the operation changes repository state.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Operation::LoadStatus
                | Operation::LoadCommits
                | Operation::LoadReflog
                | Operation::LoadCurrentBranch
                | Operation::LoadBranches
                | Operation::LoadStash
                | Operation::LoadDiff { .. }
        )
    }
}

/// Reloads issued after every successful mutation.
pub fn reload_batch(include_reflog: bool) -> Vec<Operation> {
    let mut ops = vec![
        Operation::LoadStatus,
        Operation::LoadCommits,
        Operation::LoadCurrentBranch,
        Operation::LoadBranches,
        Operation::LoadStash,
    ];
    if include_reflog {
        ops.push(Operation::LoadReflog);
    }
    ops
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Staged entries first, then unstaged.
    StatusLoaded(Vec<FileEntry>),
    CommitsLoaded(Vec<CommitEntry>),
    ReflogLoaded(Vec<ReflogEntry>),
    BranchLoaded(String),
    BranchesLoaded(Vec<BranchEntry>),
    StashLoaded(Vec<StashEntry>),
    DiffLoaded { generation: u64, text: String },
    Completed { command: String, description: String },
    Failed { command: Option<String>, message: String, mutating: bool },
}

/// Per-call bounds taken from the configuration.
#[derive(Clone, Debug)]
pub struct Limits {
    pub timeouts: Timeouts,
    pub log_limit: usize,
    pub reflog_limit: usize,
}

impl Limits {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            timeouts: cfg.timeouts(),
            log_limit: cfg.log_limit,
            reflog_limit: cfg.reflog_limit,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn failed(err: GitError, mutating: bool) -> Outcome {
    if mutating {
        log::warn!("{err}");
    } else {
        log::debug!("{err}");
    }
    Outcome::Failed {
        command: err.command().map(str::to_string),
        message: err.to_string(),
        mutating,
    }
}

fn completed(result: Result<GitOutput, GitError>, description: String) -> Outcome {
    match result {
        Ok(out) => Outcome::Completed {
            command: out.command,
            description,
        },
        Err(e) => failed(e, true),
    }
}

fn or_placeholder(text: String, placeholder: &str) -> String {
    if text.trim().is_empty() {
        placeholder.to_string()
    } else {
        text
    }
}

/// Runs operations against a gateway. Shared by every dispatched task.
pub struct Executor {
    gateway: Arc<dyn Gateway>,
    limits: Limits,
    cache: PatchCache,
}

impl Executor {
    pub fn new(gateway: Arc<dyn Gateway>, limits: Limits, cache: PatchCache) -> Self {
        Self { gateway, limits, cache }
    }

    pub async fn execute(&self, op: Operation) -> Outcome {
        let gw = self.gateway.as_ref();
        let t = &self.limits.timeouts;

        match op {
            Operation::LoadStatus => match git_ops::status(gw, t).await {
                Ok(out) => Outcome::StatusLoaded(parse::parse_status(&out.stdout).into_entries()),
                Err(e) => failed(e, false),
            },
            Operation::LoadCommits => {
                match git_ops::list_history(gw, t, self.limits.log_limit).await {
                    Ok(out) => Outcome::CommitsLoaded(parse::parse_log(&out.text())),
                    Err(e) if parse::is_empty_history_error(&e.to_string()) => {
                        Outcome::CommitsLoaded(Vec::new())
                    }
                    Err(e) => failed(e, false),
                }
            }
            Operation::LoadReflog => {
                match git_ops::list_reflog(gw, t, self.limits.reflog_limit).await {
                    Ok(out) => Outcome::ReflogLoaded(parse::parse_reflog(&out.text())),
                    Err(e) if parse::is_empty_history_error(&e.to_string()) => {
                        Outcome::ReflogLoaded(Vec::new())
                    }
                    Err(e) => failed(e, false),
                }
            }
            Operation::LoadCurrentBranch => match git_ops::current_branch(gw, t).await {
                Ok(out) => Outcome::BranchLoaded(out.text().trim().to_string()),
                Err(e) if parse::is_empty_history_error(&e.to_string()) => {
                    Outcome::BranchLoaded(String::new())
                }
                Err(e) => failed(e, false),
            },
            Operation::LoadBranches => match git_ops::list_branches(gw, t).await {
                Ok(out) => Outcome::BranchesLoaded(parse::parse_branches(&out.text())),
                Err(e) => failed(e, false),
            },
            Operation::LoadStash => match git_ops::list_stashes(gw, t).await {
                Ok(out) => Outcome::StashLoaded(parse::parse_stash(&out.text())),
                Err(e) => failed(e, false),
            },
            Operation::LoadDiff { target, generation } => match self.load_diff(target).await {
                Ok(text) => Outcome::DiffLoaded { generation, text },
                Err(e) => failed(e, false),
            },

            Operation::Stage { path } => {
                let result = git_ops::stage_path(gw, t, &path).await;
                completed(result, format!("staged {path}"))
            }
            Operation::Unstage { path } => {
                let result = git_ops::unstage_path(gw, t, &path).await;
                completed(result, format!("unstaged {path}"))
            }
            Operation::StageAll => {
                completed(git_ops::stage_all(gw, t).await, "staged all".to_string())
            }
            Operation::Commit { message } => {
                completed(git_ops::commit_message(gw, t, &message).await, "committed".to_string())
            }
            Operation::Amend { message } => {
                let description = if message.is_empty() {
                    "Amended commit (kept message)"
                } else {
                    "Amended commit"
                };
                completed(git_ops::amend_commit(gw, t, &message).await, description.to_string())
            }
            Operation::Discard { path, untracked } => {
                let result = if untracked {
                    git_ops::discard_untracked_path(gw, t, &path).await
                } else {
                    git_ops::discard_worktree_path(gw, t, &path).await
                };
                completed(result, format!("discarded {path}"))
            }
            Operation::Checkout { branch } => {
                let result = git_ops::checkout_branch(gw, t, &branch).await;
                completed(result, format!("Switched to {branch}"))
            }
            Operation::CreateBranch { name } => {
                let result = git_ops::create_branch(gw, t, &name).await;
                completed(result, format!("Created branch {name}"))
            }
            Operation::DeleteBranch { name, force } => {
                let result = git_ops::delete_branch(gw, t, &name, force).await;
                completed(result, format!("Deleted branch {name}"))
            }
            Operation::StashApply { stash_ref } => {
                let result = git_ops::stash_apply(gw, t, &stash_ref).await;
                completed(result, format!("Applied {stash_ref}"))
            }
            Operation::StashPop { stash_ref } => {
                let result = git_ops::stash_pop(gw, t, &stash_ref).await;
                completed(result, format!("Popped {stash_ref}"))
            }
            Operation::StashDrop { stash_ref } => {
                let result = git_ops::stash_drop(gw, t, &stash_ref).await;
                completed(result, format!("Dropped {stash_ref}"))
            }
            Operation::Reset { mode, count } => {
                let result = git_ops::reset_head(gw, t, mode.flag(), count).await;
                completed(result, format!("Reset {} HEAD~{count}", mode.flag()))
            }
            Operation::Fetch => {
                let result = git_ops::fetch_prune(gw, t).await;
                completed(result, "Fetched all remotes".to_string())
            }
            Operation::Pull => match git_ops::pull(gw, t).await {
                Ok(out) => {
                    let description = if parse::is_already_up_to_date(&out.text()) {
                        "Already up to date"
                    } else {
                        "Pulled successfully"
                    };
                    Outcome::Completed {
                        command: out.command,
                        description: description.to_string(),
                    }
                }
                Err(e) => failed(e, true),
            },
            Operation::Push => match self.push().await {
                Ok((out, description)) => Outcome::Completed {
                    command: out.command,
                    description,
                },
                Err(e) => failed(e, true),
            },
        }
    }

    /// Push, publishing the current branch to the preferred remote when it
    /// has no upstream yet.
    async fn push(&self) -> Result<(GitOutput, String), GitError> {
        let gw = self.gateway.as_ref();
        let t = &self.limits.timeouts;

        if git_ops::has_upstream(gw, t).await? {
            let out = git_ops::push(gw, t).await?;
            return Ok((out, "Pushed successfully".to_string()));
        }

        let branch = git_ops::current_branch(gw, t).await?.text().trim().to_string();
        let Some(remote) = git_ops::default_remote(gw, t).await? else {
            return Err(GitError::Failed {
                command: "git push".to_string(),
                message: "No remote configured".to_string(),
            });
        };
        let out = git_ops::push_set_upstream(gw, t, &remote, &branch).await?;
        Ok((out, format!("Pushed (set upstream {remote}/{branch})")))
    }

    async fn load_diff(&self, target: DiffTarget) -> Result<String, GitError> {
        let gw = self.gateway.as_ref();
        let t = &self.limits.timeouts;

        match target {
            DiffTarget::File {
                path, untracked: true, ..
            } => Ok(untracked_diff(&gw.repo_root().join(&path), &path).await),
            DiffTarget::File { path, staged, .. } => {
                let out = git_ops::diff_path(gw, t, &path, staged).await?;
                Ok(or_placeholder(out.text(), NO_DIFF))
            }
            DiffTarget::Commit { hash } => {
                if let Some(patch) = self.cache.get(&hash) {
                    return Ok(patch);
                }
                let text = git_ops::show_commit(gw, t, &hash).await?.text();
                self.cache.insert(hash, text.clone());
                log::debug!("patch cache holds {} commits", self.cache.len());
                Ok(text)
            }
            DiffTarget::Stash { stash_ref } => {
                let out = git_ops::show_stash(gw, t, &stash_ref).await?;
                Ok(or_placeholder(out.text(), NO_DIFF))
            }
            DiffTarget::Branch { name } => match git_ops::diff_branch(gw, t, &name).await {
                Ok(out) => Ok(or_placeholder(out.text(), NO_BRANCH_DIFF)),
                Err(e) => {
                    log::debug!("branch diff unavailable: {e}");
                    Ok(NO_BRANCH_DIFF.to_string())
                }
            },
        }
    }
}

/// Render an untracked path as a creation diff, or list it when it is a directory.
async fn untracked_diff(full_path: &Path, path: &str) -> String {
    let is_dir = tokio::fs::metadata(full_path).await.map(|m| m.is_dir()).unwrap_or(false);
    if is_dir {
        let mut entries = match tokio::fs::read_dir(full_path).await {
            Ok(entries) => entries,
            Err(e) => return format!("Cannot read directory: {e}"),
        };
        let mut names = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            let dir = entry.file_type().await.map(|ft| ft.is_dir()).unwrap_or(false);
            names.push(if dir { format!("  {name}/") } else { format!("  + {name}") });
        }
        names.sort();
        let mut lines = vec![
            format!("Untracked directory: {}/", path.trim_end_matches('/')),
            String::new(),
        ];
        lines.extend(names);
        return lines.join("\n");
    }

    let bytes = match tokio::fs::read(full_path).await {
        Ok(bytes) => bytes,
        Err(e) => return format!("Cannot read file: {e}"),
    };
    if bytes.contains(&0) {
        return format!("Binary file {path}");
    }
    let content = String::from_utf8_lossy(&bytes);
    let body: Vec<&str> = content.lines().collect();
    let mut lines = vec![
        format!("diff --git a/{path} b/{path}"),
        "new file mode 100644".to_string(),
        "--- /dev/null".to_string(),
        format!("+++ b/{path}"),
        format!("@@ -0,0 +1,{} @@", body.len()),
    ];
    lines.extend(body.iter().map(|l| format!("+{l}")));
    lines.join("\n")
}

/// Spawns one task per operation and funnels their outcomes to the event loop.
pub struct Dispatcher {
    executor: Arc<Executor>,
    tx: mpsc::Sender<Outcome>,
}

impl Dispatcher {
    pub fn new(executor: Executor) -> (Self, mpsc::Receiver<Outcome>) {
        let (tx, rx) = mpsc::channel(64);
        let dispatcher = Self {
            executor: Arc::new(executor),
            tx,
        };
        (dispatcher, rx)
    }

    pub fn dispatch(&self, op: Operation) {
        if op.is_mutating() {
            log::info!("dispatch {op:?}");
        } else {
            log::debug!("dispatch {op:?}");
        }
        let executor = Arc::clone(&self.executor);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = executor.execute(op).await;
            let _ = tx.send(outcome).await;
        });
    }

    pub fn dispatch_all(&self, ops: Vec<Operation>) {
        for op in ops {
            self.dispatch(op);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::FakeGateway;
    use tempfile::TempDir;

    fn executor(fake: Arc<FakeGateway>) -> Executor {
        Executor::new(fake, Limits::default(), PatchCache::new(8))
    }

    #[tokio::test]
    async fn test_status_lists_staged_first() {
        let fake = Arc::new(FakeGateway::new());
        fake.respond(&["status"], Ok(" M bar.txt\0M  foo.txt\0?? baz.txt\0"));

        let outcome = executor(fake).execute(Operation::LoadStatus).await;
        let Outcome::StatusLoaded(entries) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["foo.txt", "bar.txt", "baz.txt"]);
    }

    #[tokio::test]
    async fn test_empty_history_loads_empty_lists() {
        let fake = Arc::new(FakeGateway::new());
        fake.respond(
            &["log"],
            Err("fatal: your current branch 'main' does not have any commits yet"),
        );
        let exec = executor(fake);

        assert_eq!(exec.execute(Operation::LoadCommits).await, Outcome::CommitsLoaded(Vec::new()));
        assert_eq!(exec.execute(Operation::LoadReflog).await, Outcome::ReflogLoaded(Vec::new()));
    }

    #[tokio::test]
    async fn test_mutation_reports_command_and_description() {
        let fake = Arc::new(FakeGateway::new());
        let outcome = executor(fake)
            .execute(Operation::Unstage {
                path: "foo.txt".to_string(),
            })
            .await;
        assert_eq!(
            outcome,
            Outcome::Completed {
                command: "git restore --staged -- foo.txt".to_string(),
                description: "unstaged foo.txt".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_failed_mutation_carries_stderr() {
        let fake = Arc::new(FakeGateway::new());
        fake.respond(&["branch"], Err("error: the branch 'feature' is not fully merged"));
        let outcome = executor(fake)
            .execute(Operation::DeleteBranch {
                name: "feature".to_string(),
                force: false,
            })
            .await;
        assert_eq!(
            outcome,
            Outcome::Failed {
                command: Some("git branch -d feature".to_string()),
                message: "git branch -d feature: error: the branch 'feature' is not fully merged"
                    .to_string(),
                mutating: true,
            }
        );
    }

    #[tokio::test]
    async fn test_push_sets_upstream_when_missing() {
        let fake = Arc::new(FakeGateway::new());
        fake.respond(
            &["rev-parse", "--abbrev-ref", "--symbolic-full-name"],
            Err("fatal: no upstream"),
        );
        fake.respond(&["rev-parse", "--abbrev-ref", "HEAD"], Ok("main\n"));
        fake.respond(&["remote"], Ok("upstream\norigin\n"));

        let outcome = executor(fake.clone()).execute(Operation::Push).await;
        assert_eq!(
            outcome,
            Outcome::Completed {
                command: "git push -u origin main".to_string(),
                description: "Pushed (set upstream origin/main)".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_push_without_remote_fails() {
        let fake = Arc::new(FakeGateway::new());
        fake.respond(
            &["rev-parse", "--abbrev-ref", "--symbolic-full-name"],
            Err("fatal: no upstream"),
        );
        fake.respond(&["rev-parse", "--abbrev-ref", "HEAD"], Ok("main\n"));

        let outcome = executor(fake).execute(Operation::Push).await;
        let Outcome::Failed { message, .. } = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert!(message.ends_with("No remote configured"));
    }

    #[tokio::test]
    async fn test_pull_up_to_date() {
        let fake = Arc::new(FakeGateway::new());
        fake.respond(&["pull"], Ok("Already up to date.\n"));
        let outcome = executor(fake).execute(Operation::Pull).await;
        assert_eq!(
            outcome,
            Outcome::Completed {
                command: "git pull".to_string(),
                description: "Already up to date".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_commit_patch_is_cached() {
        let fake = Arc::new(FakeGateway::new());
        fake.respond(&["show"], Ok("commit abc\n+line\n"));
        let exec = executor(fake.clone());
        let op = Operation::LoadDiff {
            target: DiffTarget::Commit {
                hash: "abc".to_string(),
            },
            generation: 1,
        };

        let first = exec.execute(op.clone()).await;
        let second = exec.execute(op).await;
        assert_eq!(first, second);
        assert_eq!(fake.calls(), vec!["git show --no-color abc"]);
    }

    #[tokio::test]
    async fn test_empty_diffs_use_placeholders() {
        let fake = Arc::new(FakeGateway::new());
        fake.respond(&["diff", "--no-color", "dev...HEAD"], Err("fatal: ambiguous argument"));
        let exec = executor(fake);

        let file = exec
            .execute(Operation::LoadDiff {
                target: DiffTarget::File {
                    path: "a.rs".to_string(),
                    staged: false,
                    untracked: false,
                },
                generation: 3,
            })
            .await;
        assert_eq!(
            file,
            Outcome::DiffLoaded {
                generation: 3,
                text: NO_DIFF.to_string()
            }
        );

        let branch = exec
            .execute(Operation::LoadDiff {
                target: DiffTarget::Branch {
                    name: "dev".to_string(),
                },
                generation: 4,
            })
            .await;
        assert_eq!(
            branch,
            Outcome::DiffLoaded {
                generation: 4,
                text: NO_BRANCH_DIFF.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_untracked_file_diff_is_synthesized() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("new.txt"), "line 1\nline 2\n").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("inner.txt"), "x").unwrap();

        let fake = Arc::new(FakeGateway::with_root(dir.path().to_path_buf()));
        let exec = executor(fake.clone());

        let outcome = exec
            .execute(Operation::LoadDiff {
                target: DiffTarget::File {
                    path: "new.txt".to_string(),
                    staged: false,
                    untracked: true,
                },
                generation: 1,
            })
            .await;
        let Outcome::DiffLoaded { text, .. } = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "diff --git a/new.txt b/new.txt");
        assert_eq!(lines[4], "@@ -0,0 +1,2 @@");
        assert_eq!(&lines[5..], ["+line 1", "+line 2"]);

        let outcome = exec
            .execute(Operation::LoadDiff {
                target: DiffTarget::File {
                    path: "sub/".to_string(),
                    staged: false,
                    untracked: true,
                },
                generation: 2,
            })
            .await;
        let Outcome::DiffLoaded { text, .. } = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert!(text.starts_with("Untracked directory: sub/"));
        assert!(text.contains("+ inner.txt"));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_one_outcome_per_operation() {
        let fake = Arc::new(FakeGateway::new());
        let (dispatcher, mut rx) = Dispatcher::new(executor(fake.clone()));
        dispatcher.dispatch_all(reload_batch(false));

        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(rx.recv().await.unwrap());
        }
        assert!(outcomes.iter().any(|o| matches!(o, Outcome::StatusLoaded(_))));
        assert!(outcomes.iter().any(|o| matches!(o, Outcome::StashLoaded(_))));
        assert_eq!(fake.calls().len(), 5);
    }

    #[test]
    fn test_reload_batch() {
        assert_eq!(reload_batch(false).len(), 5);
        assert!(reload_batch(true).contains(&Operation::LoadReflog));
        assert!(reload_batch(false).iter().all(|op| !op.is_mutating()));
        assert!(Operation::Fetch.is_mutating());
    }
}
