#![allow(async_fn_in_trait)]

#[cfg(test)]
use mockall::automock;

use crate::error::Error;
use crate::error::Result;

// -----------------------------------------------------------------------------
// CodeHost trait

/// Operations on the code-hosting remote.
#[cfg_attr(test, automock)]
pub trait CodeHost {
    /// Open a pull request from `head` into `base` and return its URL.
    async fn create_pull_request(
        &self,
        repo: &RepoSlug,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<String>;

    /// Tag `target` as `tag`, publish a release for it and return its URL.
    async fn create_release(
        &self,
        repo: &RepoSlug,
        tag: &str,
        target: &str,
        body: &str,
    ) -> Result<String>;
}

/// Owner and repository name on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    /// Parse remote URLs like:
    /// git@github.com:owner/repo.git
    /// ssh://git@github.com/owner/repo.git
    /// https://github.com/owner/repo.git
    pub fn from_remote_url(url: &str) -> Result<Self> {
        let path = ["git@github.com:", "ssh://git@github.com/", "https://github.com/"]
            .iter()
            .find_map(|prefix| url.strip_prefix(prefix))
            .ok_or_else(|| {
                Error::ValidationFailed(format!("Remote URL is not a GitHub URL: {url}"))
            })?;

        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let mut split = path.split('/');
        match (split.next(), split.next(), split.next()) {
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(Error::ValidationFailed(format!(
                "Could not parse owner and repo from GitHub URL: {url}"
            ))),
        }
    }
}
