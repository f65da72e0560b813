use crate::config::Config;
use crate::error::Result;
use crate::models::BranchInfo;
use crate::models::LocalChanges;
use crate::ops::git::GitOps;
use crate::ops::host::CodeHost;
use crate::ops::host::RepoSlug;
use crate::ops::tracker::IssueTracker;
use crate::pipeline::resolve_issues;
use crate::vcs::Vcs;

pub struct App<G, T, H> {
    pub config: Config,
    pub vcs: Vcs<G>,
    pub tracker: T,
    pub host: H,
}

impl<G: GitOps, T: IssueTracker, H: CodeHost> App<G, T, H> {
    pub fn new(config: Config, git: G, tracker: T, host: H) -> Result<Self> {
        let vcs = Vcs::new(git, config.git_config()?);
        Ok(Self {
            config,
            vcs,
            tracker,
            host,
        })
    }
}

/// Shared helper methods for App
impl<G: GitOps, T: IssueTracker, H: CodeHost> App<G, T, H> {
    /// Pair `branch` with the tracker issues its commits reference.
    pub(crate) async fn local_changes(&self, branch: BranchInfo) -> Result<LocalChanges> {
        let issues = resolve_issues(&self.tracker, &branch.issue_keys).await?;
        Ok(LocalChanges { branch, issues })
    }

    /// Owner and name of the repository behind the configured remote.
    pub(crate) async fn repo_slug(&self) -> Result<RepoSlug> {
        let remote = self.vcs.get_remote(&self.config.remote).await?;
        RepoSlug::from_remote_url(&remote.push_url)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Issue;
    use crate::models::IssueStatus;
    use crate::models::IssueType;
    use crate::ops::git::MockGitOps;
    use crate::ops::host::MockCodeHost;
    use crate::ops::tracker::MockIssueTracker;
    use crate::vcs::tests::remote;

    pub(crate) type MockApp = App<MockGitOps, MockIssueTracker, MockCodeHost>;

    pub(crate) fn app(git: MockGitOps, tracker: MockIssueTracker, host: MockCodeHost) -> MockApp {
        App::new(Config::default_for_tests(), git, tracker, host).unwrap()
    }

    pub(crate) fn issue(key: &str, title: &str, issue_type: IssueType) -> Issue {
        Issue {
            key: key.to_string(),
            title: title.to_string(),
            issue_type,
            status: IssueStatus::Open,
        }
    }

    #[tokio::test]
    async fn test_repo_slug_from_configured_remote() {
        let mut git = MockGitOps::new();
        git.expect_remotes()
            .returning(|| Ok(vec![remote("fork"), remote("origin")]));

        let app = app(git, MockIssueTracker::new(), MockCodeHost::new());
        let slug = app.repo_slug().await.unwrap();
        assert_eq!(slug.owner, "acme");
        assert_eq!(slug.repo, "origin");
    }
}
