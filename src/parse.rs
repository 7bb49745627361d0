//! Parsers for git output and the record types they produce.
//!
//! All parsers are pure: the same bytes always yield the same records.

/// One changed path from `git status --porcelain=v1 -z`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    /// Porcelain status letter for the side this entry describes (`?` for untracked).
    pub status: char,
    pub staged: bool,
    /// Source path of a rename or copy.
    pub renamed_from: Option<String>,
}

impl FileEntry {
    pub fn is_untracked(&self) -> bool {
        self.status == '?'
    }
}

/// Status entries split by side. A path with changes on both sides appears once in each.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileStatus {
    pub staged: Vec<FileEntry>,
    pub unstaged: Vec<FileEntry>,
}

impl FileStatus {
    /// Display order for the Files pane: every staged entry, then every unstaged one.
    pub fn into_entries(self) -> Vec<FileEntry> {
        let mut entries = self.staged;
        entries.extend(self.unstaged);
        entries
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitEntry {
    pub hash: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReflogEntry {
    pub hash: String,
    pub selector: String,
    pub action: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchEntry {
    pub name: String,
    pub is_current: bool,
    pub upstream: Option<String>,
    pub track: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StashEntry {
    pub stash_ref: String,
    pub message: String,
}

/// `for-each-ref` format understood by [`parse_branches`].
pub const BRANCH_FORMAT: &str = "%(HEAD)\t%(refname:short)\t%(upstream:short)\t%(upstream:track)";
/// `--pretty` format understood by [`parse_reflog`].
pub const REFLOG_FORMAT: &str = "format:%h\t%gd\t%gs";
/// `--pretty` format understood by [`parse_stash`].
pub const STASH_FORMAT: &str = "format:%gd\t%gs";

pub fn parse_status(data: &[u8]) -> FileStatus {
    let mut status = FileStatus::default();
    let items: Vec<&[u8]> = data.split(|b| *b == 0).filter(|s| !s.is_empty()).collect();

    let mut i = 0;
    while i < items.len() {
        let item = items[i];
        i += 1;
        if item.len() < 4 || item[2] != b' ' {
            continue;
        }
        let x = item[0] as char;
        let y = item[1] as char;
        let path = String::from_utf8_lossy(&item[3..]).to_string();

        let renamed_from = if matches!(x, 'R' | 'C') || matches!(y, 'R' | 'C') {
            let from = items.get(i).map(|s| String::from_utf8_lossy(s).to_string());
            i += 1;
            from
        } else {
            None
        };

        match (x, y) {
            ('?', '?') => status.unstaged.push(FileEntry {
                path,
                status: '?',
                staged: false,
                renamed_from: None,
            }),
            ('!', '!') => {}
            _ => {
                if x != ' ' {
                    status.staged.push(FileEntry {
                        path: path.clone(),
                        status: x,
                        staged: true,
                        renamed_from: renamed_from.clone(),
                    });
                }
                if y != ' ' {
                    status.unstaged.push(FileEntry {
                        path,
                        status: y,
                        staged: false,
                        renamed_from,
                    });
                }
            }
        }
    }

    status
}

/// Parse `git log --oneline` output.
pub fn parse_log(out: &str) -> Vec<CommitEntry> {
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            let (hash, message) = line.split_once(' ').unwrap_or((line, ""));
            CommitEntry {
                hash: hash.to_string(),
                message: message.trim().to_string(),
            }
        })
        .collect()
}

/// Parse reflog lines in [`REFLOG_FORMAT`].
pub fn parse_reflog(out: &str) -> Vec<ReflogEntry> {
    let mut entries = Vec::new();
    for line in out.lines() {
        let mut it = line.splitn(3, '\t');
        let hash = it.next().unwrap_or("").trim().to_string();
        let selector = it.next().unwrap_or("").trim().to_string();
        let subject = it.next().unwrap_or("").trim();
        if hash.is_empty() {
            continue;
        }
        let (action, message) = match subject.split_once(": ") {
            Some((action, message)) => (action.to_string(), message.to_string()),
            None => (String::new(), subject.to_string()),
        };
        entries.push(ReflogEntry {
            hash,
            selector,
            action,
            message,
        });
    }
    entries
}

/// Parse local branches in [`BRANCH_FORMAT`].
pub fn parse_branches(out: &str) -> Vec<BranchEntry> {
    let mut branches = Vec::new();
    for line in out.lines() {
        let mut it = line.split('\t');
        let head = it.next().unwrap_or("").trim();
        let name = it.next().unwrap_or("").trim().to_string();
        if name.is_empty() {
            continue;
        }
        let upstream = it.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let track = it.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        branches.push(BranchEntry {
            name,
            is_current: head == "*",
            upstream,
            track,
        });
    }
    branches
}

/// Parse stash entries in [`STASH_FORMAT`], falling back to the default
/// `stash@{0}: WIP on main: ...` layout.
pub fn parse_stash(out: &str) -> Vec<StashEntry> {
    let mut entries = Vec::new();
    for line in out.lines() {
        let (stash_ref, message) = line
            .split_once('\t')
            .or_else(|| line.split_once(": "))
            .unwrap_or((line, ""));
        let stash_ref = stash_ref.trim();
        if stash_ref.is_empty() {
            continue;
        }
        entries.push(StashEntry {
            stash_ref: stash_ref.to_string(),
            message: message.trim().to_string(),
        });
    }
    entries
}

/// Choose the push remote from `git remote` output, preferring `origin`.
pub fn pick_remote(out: &str) -> Option<String> {
    let remotes: Vec<&str> = out.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if remotes.contains(&"origin") {
        return Some("origin".to_string());
    }
    remotes.first().map(|r| r.to_string())
}

/// Whether a history query failed only because HEAD has no commits yet.
pub fn is_empty_history_error(message: &str) -> bool {
    ["does not have any commits", "bad revision", "unknown revision", "bad default revision"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Whether `git pull` reported nothing to merge.
pub fn is_already_up_to_date(out: &str) -> bool {
    out.contains("Already up to date") || out.contains("Already up-to-date")
}
