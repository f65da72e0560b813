use serde::Deserialize;
use serde::Serialize;
use tracing::instrument;

use super::curl::Auth;
use super::curl::CurlClient;
use crate::error::Result;
use crate::ops::host::CodeHost;
use crate::ops::host::RepoSlug;

// -----------------------------------------------------------------------------
// Types

/// Client to interact with GitHub API.
pub struct GithubClient {
    http_client: CurlClient,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    html_url: String,
}

#[derive(Debug, Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Debug, Deserialize)]
struct Release {
    html_url: String,
}

#[derive(Debug, Serialize)]
struct CreateRelease<'a> {
    tag_name: &'a str,
    target_commitish: &'a str,
    name: &'a str,
    body: &'a str,
}

// -----------------------------------------------------------------------------
// GithubClient impl

impl GithubClient {
    pub fn new(token: String) -> Self {
        Self {
            http_client: CurlClient::new(
                "GitHub",
                Auth::Bearer(token),
                "application/vnd.github+json",
            ),
        }
    }

    fn repo_url(repo: &RepoSlug, path: &str) -> String {
        format!(
            "https://api.github.com/repos/{}/{}/{}",
            repo.owner, repo.repo, path
        )
    }
}

impl CodeHost for GithubClient {
    /// Create a new PR and return the PR URL
    #[instrument(skip_all)]
    async fn create_pull_request(
        &self,
        repo: &RepoSlug,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let request_body = CreatePullRequest {
            title,
            body,
            head,
            base,
        };

        let json_data = serde_json::to_string(&request_body)?;
        let response = self
            .http_client
            .post(&Self::repo_url(repo, "pulls"), &json_data)
            .await?;
        let pr: PullRequest = serde_json::from_str(&response)?;
        Ok(pr.html_url)
    }

    /// Create a release (and its tag) and return the release URL
    #[instrument(skip_all)]
    async fn create_release(
        &self,
        repo: &RepoSlug,
        tag: &str,
        target: &str,
        body: &str,
    ) -> Result<String> {
        let request_body = CreateRelease {
            tag_name: tag,
            target_commitish: target,
            name: tag,
            body,
        };

        let json_data = serde_json::to_string(&request_body)?;
        let response = self
            .http_client
            .post(&Self::repo_url(repo, "releases"), &json_data)
            .await?;
        let release: Release = serde_json::from_str(&response)?;
        Ok(release.html_url)
    }
}
