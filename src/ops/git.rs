#![allow(async_fn_in_trait)]

use std::path::PathBuf;

#[cfg(test)]
use mockall::automock;

use crate::error::Result;
use crate::models::Commit;
use crate::models::CommitId;
use crate::models::Remote;

// -----------------------------------------------------------------------------
// GitOps trait

/// Operations for interacting with Git.
///
/// Each method maps to a single git invocation; the orchestration on top of
/// them lives in [`crate::vcs::Vcs`].
#[cfg_attr(test, automock)]
pub trait GitOps {
    /// Absolute path of the working tree root.
    async fn root_dir(&self) -> Result<PathBuf>;

    /// Name of the checked out branch.
    async fn current_branch(&self) -> Result<String>;

    async fn local_branch_exists(&self, branch: &str) -> Result<bool>;

    /// Ask the remote whether it has `branch`. This goes over the network.
    async fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool>;

    /// Configured remotes, in `git remote -v` order.
    async fn remotes(&self) -> Result<Vec<Remote>>;

    async fn fetch(&self, remote: &str, branch: &str) -> Result<()>;

    /// True if there are staged, unstaged or untracked changes.
    async fn is_dirty(&self) -> Result<bool>;

    /// Stash all changes, untracked files included.
    async fn stash_push(&self, message: &str) -> Result<()>;

    /// Create `branch` at `start_point` and check it out.
    async fn checkout_new_branch(&self, branch: &str, start_point: &str) -> Result<()>;

    async fn merge_base(&self, a: &str, b: &str) -> Result<CommitId>;

    /// Commits in `range`, oldest first.
    async fn log(&self, range: &str) -> Result<Vec<Commit>>;

    /// Most recent tag reachable from `rev`, if any.
    async fn last_tag(&self, rev: &str) -> Result<Option<String>>;

    /// Remote that `branch` tracks, if it has an upstream.
    async fn upstream_remote(&self, branch: &str) -> Result<Option<String>>;

    /// Push `branch` to `remote` and record it as the upstream.
    async fn push(&self, remote: &str, branch: &str) -> Result<()>;
}
