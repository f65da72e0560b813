use std::path::PathBuf;

use regex::Regex;
use tracing::debug;
use tracing::info;

use crate::error::Error;
use crate::error::Result;
use crate::models::BranchInfo;
use crate::models::Issue;
use crate::models::Remote;
use crate::ops::git::GitOps;

/// Message attached to the stash taken before switching to a new branch.
pub const AUTO_STASH_MESSAGE: &str = "jig: auto-stash before creating branch";

/// Longest slug `{title}` expands to in branch names.
const TITLE_SLUG_LENGTH: usize = 50;

/// Git settings for a run.
#[derive(Debug, Clone)]
pub struct GitConfig {
    pub remote: String,
    pub base_branch: String,
    /// Branch naming template, e.g. `feature/{key}-{title}`.
    pub branch_template: String,
    /// Matches issue references in commit messages. The first capture group
    /// (or the whole match if there is none) is the issue key.
    pub reference_pattern: Regex,
}

/// Branch and history orchestration on top of [`GitOps`].
pub struct Vcs<G> {
    git: G,
    config: GitConfig,
}

impl<G: GitOps> Vcs<G> {
    pub fn new(git: G, config: GitConfig) -> Self {
        Self { git, config }
    }

    pub fn config(&self) -> &GitConfig {
        &self.config
    }

    pub async fn get_root_dir(&self) -> Result<PathBuf> {
        self.git.root_dir().await
    }

    pub async fn does_branch_exist(&self, name: &str) -> Result<bool> {
        self.git.local_branch_exists(name).await
    }

    /// Check the remote itself (not the local remote-tracking ref) for the
    /// base branch.
    pub async fn does_base_branch_exist(&self) -> Result<bool> {
        let remote = self.get_remote(&self.config.remote).await?;
        self.git
            .remote_branch_exists(&remote.name, &self.config.base_branch)
            .await
    }

    pub async fn current_branch(&self) -> Result<String> {
        self.git.current_branch().await
    }

    /// Look up a remote by name, falling back to the first configured remote.
    pub async fn get_remote(&self, name: &str) -> Result<Remote> {
        let mut remotes = self.git.remotes().await?;
        if let Some(index) = remotes.iter().position(|r| r.name == name) {
            return Ok(remotes.swap_remove(index));
        }
        if remotes.is_empty() {
            return Err(Error::NoRemoteConfigured);
        }
        let fallback = remotes.swap_remove(0);
        debug!("remote {} not found, using {}", name, fallback.name);
        Ok(fallback)
    }

    /// Create `name` from the tip of the remote base branch and check it out.
    ///
    /// 1. Refuse if `name` already exists (nothing has been touched yet).
    /// 2. Fetch the base branch so the branch point is current.
    /// 3. Stash uncommitted changes, but only if there are any.
    /// 4. Check out the new branch from the remote-tracking ref, never from
    ///    the local HEAD.
    pub async fn create_branch_and_stash_changes(&self, name: &str) -> Result<()> {
        self.get_root_dir().await?;
        if self.does_branch_exist(name).await? {
            return Err(Error::BranchAlreadyExists(name.to_string()));
        }

        let remote = self.get_remote(&self.config.remote).await?;
        self.git
            .fetch(&remote.name, &self.config.base_branch)
            .await?;

        if self.git.is_dirty().await? {
            info!("stashing uncommitted changes");
            self.git.stash_push(AUTO_STASH_MESSAGE).await?;
        }

        let start_point = self.remote_base_ref(&remote.name);
        self.git.checkout_new_branch(name, &start_point).await
    }

    /// Commits between the merge-base with the remote base branch and HEAD.
    pub async fn get_branch_info(&self) -> Result<BranchInfo> {
        let remote = self.get_remote(&self.config.remote).await?;
        let name = self.git.current_branch().await?;
        let merge_base = self
            .git
            .merge_base("HEAD", &self.remote_base_ref(&remote.name))
            .await?;
        self.branch_info(name, &format!("{merge_base}..HEAD")).await
    }

    /// Commits on the remote base branch since its most recent tag, or its
    /// whole history if untagged. Fetches first; the local HEAD plays no part.
    pub async fn get_release_info(&self) -> Result<BranchInfo> {
        let remote = self.get_remote(&self.config.remote).await?;
        self.git
            .fetch(&remote.name, &self.config.base_branch)
            .await?;

        let base = self.remote_base_ref(&remote.name);
        let range = match self.git.last_tag(&base).await? {
            Some(tag) => format!("{tag}..{base}"),
            None => base,
        };
        self.branch_info(self.config.base_branch.clone(), &range)
            .await
    }

    /// Push the current branch to the remote it tracks, or to the configured
    /// remote if it tracks nothing yet. Returns the pushed branch.
    pub async fn push(&self) -> Result<String> {
        let branch = self.git.current_branch().await?;
        let remote = match self.git.upstream_remote(&branch).await? {
            Some(remote) => remote,
            None => self.get_remote(&self.config.remote).await?.name,
        };
        self.git.push(&remote, &branch).await?;
        Ok(branch)
    }

    /// Issue keys referenced by `messages`, upper-cased, de-duplicated, in
    /// first-seen order.
    pub fn extract_issue_keys<'a>(&self, messages: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for message in messages {
            for captures in self.config.reference_pattern.captures_iter(message) {
                let Some(found) = captures.get(1).or_else(|| captures.get(0)) else {
                    continue;
                };
                let key = found.as_str().to_uppercase();
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Render the branch template for `issue`.
    pub fn branch_name(&self, issue: &Issue) -> String {
        self.config
            .branch_template
            .replace("{key}", &issue.key)
            .replace("{type}", issue.issue_type.as_str())
            .replace("{title}", &slugify(&issue.title, TITLE_SLUG_LENGTH))
    }

    fn remote_base_ref(&self, remote: &str) -> String {
        format!("refs/remotes/{}/{}", remote, self.config.base_branch)
    }

    async fn branch_info(&self, name: String, range: &str) -> Result<BranchInfo> {
        let commits = self.git.log(range).await?;
        let issue_keys = self.extract_issue_keys(commits.iter().map(|c| c.message.as_str()));
        Ok(BranchInfo {
            name,
            commits,
            issue_keys,
        })
    }
}

/// Lower-case `text`, collapse anything non-alphanumeric into single dashes
/// and cut it to at most `max_len` characters.
fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.truncate(max_len);
    slug.trim_end_matches('-').to_string()
}
