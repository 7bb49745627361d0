use std::time::Duration;

use crate::error::GitError;
use crate::git::{Gateway, GitOutput, Timeouts};
use crate::parse;

async fn git(gw: &dyn Gateway, timeout: Duration, args: &[&str]) -> Result<GitOutput, GitError> {
    gw.run(args.iter().map(|s| s.to_string()).collect(), timeout).await
}

pub async fn status(gw: &dyn Gateway, t: &Timeouts) -> Result<GitOutput, GitError> {
    git(gw, t.short, &["status", "--porcelain=v1", "-z"]).await
}

pub async fn list_history(
    gw: &dyn Gateway,
    t: &Timeouts,
    max: usize,
) -> Result<GitOutput, GitError> {
    let max_s = max.to_string();
    git(gw, t.short, &["log", "--oneline", "--decorate", "-n", max_s.as_str()]).await
}

pub async fn list_reflog(
    gw: &dyn Gateway,
    t: &Timeouts,
    max: usize,
) -> Result<GitOutput, GitError> {
    let max_s = max.to_string();
    let pretty = format!("--pretty={}", parse::REFLOG_FORMAT);
    git(
        gw,
        t.short,
        &["log", "-g", "--no-color", "--max-count", max_s.as_str(), pretty.as_str()],
    )
    .await
}

pub async fn current_branch(gw: &dyn Gateway, t: &Timeouts) -> Result<GitOutput, GitError> {
    git(gw, t.short, &["rev-parse", "--abbrev-ref", "HEAD"]).await
}

pub async fn list_branches(gw: &dyn Gateway, t: &Timeouts) -> Result<GitOutput, GitError> {
    git(
        gw,
        t.short,
        &["for-each-ref", "--sort=-committerdate", "refs/heads", "--format", parse::BRANCH_FORMAT],
    )
    .await
}

pub async fn list_stashes(gw: &dyn Gateway, t: &Timeouts) -> Result<GitOutput, GitError> {
    let pretty = format!("--pretty={}", parse::STASH_FORMAT);
    git(gw, t.short, &["stash", "list", "--no-color", pretty.as_str()]).await
}

pub async fn diff_path(
    gw: &dyn Gateway,
    t: &Timeouts,
    path: &str,
    staged: bool,
) -> Result<GitOutput, GitError> {
    let mut args = vec!["diff", "--no-color"];
    if staged {
        args.push("--staged");
    }
    args.extend(["--", path]);
    git(gw, t.diff, &args).await
}

pub async fn show_commit(
    gw: &dyn Gateway,
    t: &Timeouts,
    hash: &str,
) -> Result<GitOutput, GitError> {
    git(gw, t.diff, &["show", "--no-color", hash]).await
}

pub async fn show_stash(
    gw: &dyn Gateway,
    t: &Timeouts,
    stash_ref: &str,
) -> Result<GitOutput, GitError> {
    git(gw, t.diff, &["stash", "show", "-p", "--no-color", stash_ref]).await
}

/// Changes on `branch` since it diverged from HEAD.
pub async fn diff_branch(
    gw: &dyn Gateway,
    t: &Timeouts,
    branch: &str,
) -> Result<GitOutput, GitError> {
    let range = format!("{branch}...HEAD");
    git(gw, t.diff, &["diff", "--no-color", range.as_str()]).await
}

pub async fn stage_path(gw: &dyn Gateway, t: &Timeouts, path: &str) -> Result<GitOutput, GitError> {
    git(gw, t.short, &["add", "--", path]).await
}

pub async fn stage_all(gw: &dyn Gateway, t: &Timeouts) -> Result<GitOutput, GitError> {
    git(gw, t.short, &["add", "-A"]).await
}

pub async fn unstage_path(
    gw: &dyn Gateway,
    t: &Timeouts,
    path: &str,
) -> Result<GitOutput, GitError> {
    git(gw, t.short, &["restore", "--staged", "--", path]).await
}

pub async fn commit_message(
    gw: &dyn Gateway,
    t: &Timeouts,
    message: &str,
) -> Result<GitOutput, GitError> {
    git(gw, t.diff, &["commit", "-m", message]).await
}

/// Amend HEAD, keeping its message when `message` is empty.
pub async fn amend_commit(
    gw: &dyn Gateway,
    t: &Timeouts,
    message: &str,
) -> Result<GitOutput, GitError> {
    if message.is_empty() {
        git(gw, t.diff, &["commit", "--amend", "--no-edit"]).await
    } else {
        git(gw, t.diff, &["commit", "--amend", "-m", message]).await
    }
}

pub async fn discard_worktree_path(
    gw: &dyn Gateway,
    t: &Timeouts,
    path: &str,
) -> Result<GitOutput, GitError> {
    git(gw, t.short, &["checkout", "--", path]).await
}

pub async fn discard_untracked_path(
    gw: &dyn Gateway,
    t: &Timeouts,
    path: &str,
) -> Result<GitOutput, GitError> {
    git(gw, t.short, &["clean", "-f", "--", path]).await
}

pub async fn checkout_branch(
    gw: &dyn Gateway,
    t: &Timeouts,
    branch: &str,
) -> Result<GitOutput, GitError> {
    git(gw, t.short, &["checkout", branch]).await
}

pub async fn create_branch(
    gw: &dyn Gateway,
    t: &Timeouts,
    name: &str,
) -> Result<GitOutput, GitError> {
    git(gw, t.short, &["checkout", "-b", name]).await
}

pub async fn delete_branch(
    gw: &dyn Gateway,
    t: &Timeouts,
    name: &str,
    force: bool,
) -> Result<GitOutput, GitError> {
    let flag = if force { "-D" } else { "-d" };
    git(gw, t.short, &["branch", flag, name]).await
}

pub async fn stash_apply(
    gw: &dyn Gateway,
    t: &Timeouts,
    stash_ref: &str,
) -> Result<GitOutput, GitError> {
    git(gw, t.short, &["stash", "apply", stash_ref]).await
}

pub async fn stash_pop(
    gw: &dyn Gateway,
    t: &Timeouts,
    stash_ref: &str,
) -> Result<GitOutput, GitError> {
    git(gw, t.short, &["stash", "pop", stash_ref]).await
}

pub async fn stash_drop(
    gw: &dyn Gateway,
    t: &Timeouts,
    stash_ref: &str,
) -> Result<GitOutput, GitError> {
    git(gw, t.short, &["stash", "drop", stash_ref]).await
}

pub async fn reset_head(
    gw: &dyn Gateway,
    t: &Timeouts,
    mode: &str,
    count: usize,
) -> Result<GitOutput, GitError> {
    let flag = format!("--{mode}");
    let target = format!("HEAD~{count}");
    git(gw, t.short, &["reset", flag.as_str(), target.as_str()]).await
}

pub async fn fetch_prune(gw: &dyn Gateway, t: &Timeouts) -> Result<GitOutput, GitError> {
    git(gw, t.network, &["fetch", "--all", "--prune"]).await
}

pub async fn pull(gw: &dyn Gateway, t: &Timeouts) -> Result<GitOutput, GitError> {
    git(gw, t.network, &["pull"]).await
}

pub async fn push(gw: &dyn Gateway, t: &Timeouts) -> Result<GitOutput, GitError> {
    git(gw, t.network, &["push"]).await
}

pub async fn push_set_upstream(
    gw: &dyn Gateway,
    t: &Timeouts,
    remote: &str,
    branch: &str,
) -> Result<GitOutput, GitError> {
    git(gw, t.network, &["push", "-u", remote, branch]).await
}

/// Whether the current branch tracks an upstream. A failing lookup means "no".
pub async fn has_upstream(gw: &dyn Gateway, t: &Timeouts) -> Result<bool, GitError> {
    match git(gw, t.short, &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"]).await {
        Ok(_) => Ok(true),
        Err(GitError::Failed { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

pub async fn default_remote(gw: &dyn Gateway, t: &Timeouts) -> Result<Option<String>, GitError> {
    let out = git(gw, t.short, &["remote"]).await?;
    Ok(parse::pick_remote(&out.text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::FakeGateway;

    #[tokio::test]
    async fn test_argument_shapes() {
        let fake = FakeGateway::new();
        let t = Timeouts::default();

        status(&fake, &t).await.unwrap();
        diff_path(&fake, &t, "src/main.rs", true).await.unwrap();
        diff_path(&fake, &t, "src/main.rs", false).await.unwrap();
        amend_commit(&fake, &t, "").await.unwrap();
        amend_commit(&fake, &t, "new msg").await.unwrap();
        delete_branch(&fake, &t, "feature", true).await.unwrap();
        reset_head(&fake, &t, "soft", 1).await.unwrap();
        diff_branch(&fake, &t, "dev").await.unwrap();

        assert_eq!(
            fake.calls(),
            vec![
                "git status --porcelain=v1 -z",
                "git diff --no-color --staged -- src/main.rs",
                "git diff --no-color -- src/main.rs",
                "git commit --amend --no-edit",
                "git commit --amend -m \"new msg\"",
                "git branch -D feature",
                "git reset --soft HEAD~1",
                "git diff --no-color dev...HEAD",
            ]
        );
    }

    #[tokio::test]
    async fn test_has_upstream_maps_failure_to_false() {
        let fake = FakeGateway::new();
        fake.respond(&["rev-parse"], Err("fatal: no upstream configured"));
        assert!(!has_upstream(&fake, &Timeouts::default()).await.unwrap());

        let fake = FakeGateway::new();
        fake.respond(&["rev-parse"], Ok("origin/main\n"));
        assert!(has_upstream(&fake, &Timeouts::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_default_remote() {
        let fake = FakeGateway::new();
        fake.respond(&["remote"], Ok("fork\norigin\n"));
        assert_eq!(
            default_remote(&fake, &Timeouts::default()).await.unwrap().as_deref(),
            Some("origin")
        );
    }
}
