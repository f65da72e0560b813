use colored::Colorize;
use futures_util::FutureExt as _;

use crate::App;
use crate::error::Error;
use crate::models::Issue;
use crate::models::IssueSpec;
use crate::models::IssueStatus;
use crate::ops::git::GitOps;
use crate::ops::host::CodeHost;
use crate::ops::tracker::IssueTracker;
use crate::pipeline::Check;
use crate::pipeline::gate;
use crate::pipeline::require;
use crate::pipeline::validate;

/// What to start working on.
#[derive(Debug, Clone)]
pub enum IssueRef {
    /// An existing issue.
    Key(String),
    /// A new issue, created and assigned to the current user.
    New(IssueSpec),
}

#[derive(Debug, Clone)]
pub struct StartWork {
    pub issue: IssueRef,
    pub create_branch: bool,
}

impl<G: GitOps, T: IssueTracker, H: CodeHost> App<G, T, H> {
    /// Start work on an issue.
    ///
    /// 1. Validate the key and, if a branch will be created, the repository
    ///    and the remote base branch. All checks run at once.
    /// 2. Fetch the issue, or create it, and refuse if its branch already
    ///    exists.
    /// 3. Mark it in progress.
    /// 4. Create its branch from the remote base branch, stashing local
    ///    changes first.
    ///
    /// Returns the issue when no branch was created.
    pub async fn cmd_start(
        &self,
        work: &StartWork,
        stdout: &mut impl std::io::Write,
    ) -> anyhow::Result<Option<Issue>> {
        let mut checks: Vec<Check<'_>> = Vec::new();
        if let IssueRef::Key(key) = &work.issue {
            let key = normalize_key(key);
            checks.push(require(
                self.tracker.is_valid_issue_name(&key),
                format!("invalid issue key: '{key}'"),
            ));
        }
        if work.create_branch {
            checks.push(async { self.vcs.get_root_dir().await.map(|_| ()) }.boxed_local());
            checks.push(gate(
                self.vcs.does_base_branch_exist(),
                format!(
                    "base branch '{}' does not exist on the remote",
                    self.vcs.config().base_branch
                ),
            ));
        }
        validate(checks).await?;

        let mut issue = match &work.issue {
            IssueRef::New(spec) => {
                let issue = self.tracker.create_issue_for_current_user(spec).await?;
                writeln!(stdout, "Created issue {}: {}", issue.key.bold(), issue.title)?;
                issue
            }
            IssueRef::Key(key) => {
                let issue = self.tracker.get_issue(&normalize_key(key)).await?;
                writeln!(
                    stdout,
                    "Issue {}: {} [{}]",
                    issue.key.bold(),
                    issue.title,
                    issue.status
                )?;
                issue
            }
        };

        let branch = self.vcs.branch_name(&issue);
        if work.create_branch && self.vcs.does_branch_exist(&branch).await? {
            return Err(Error::BranchAlreadyExists(branch).into());
        }

        self.tracker
            .set_issue_status(IssueStatus::InProgress, &issue.key)
            .await?;
        issue.status = IssueStatus::InProgress;
        writeln!(stdout, "{} is now {}", issue.key, issue.status)?;

        if !work.create_branch {
            return Ok(Some(issue));
        }

        self.vcs.create_branch_and_stash_changes(&branch).await?;
        writeln!(stdout, "Switched to new branch {}", branch.green())?;

        Ok(None)
    }
}

/// Keys are matched and looked up in upper case.
fn normalize_key(key: &str) -> String {
    key.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::app::tests::app;
    use crate::app::tests::issue;
    use crate::models::IssueType;
    use crate::ops::git::MockGitOps;
    use crate::ops::host::MockCodeHost;
    use crate::ops::tracker::MockIssueTracker;
    use crate::vcs::tests::remote;

    /// Git expectations for a branch created from origin/main.
    fn git_creating_branch(name: &str, dirty: bool) -> MockGitOps {
        let mut git = MockGitOps::new();
        git.expect_root_dir()
            .returning(|| Ok(std::path::PathBuf::from("/repo")));
        // Once before the issue is touched, once more right before branching
        git.expect_local_branch_exists()
            .with(eq(name.to_string()))
            .times(2)
            .returning(|_| Ok(false));
        git.expect_remotes()
            .returning(|| Ok(vec![remote("origin")]));
        git.expect_remote_branch_exists()
            .with(eq("origin"), eq("main"))
            .returning(|_, _| Ok(true));
        git.expect_fetch()
            .with(eq("origin"), eq("main"))
            .times(1)
            .returning(|_, _| Ok(()));
        git.expect_is_dirty().returning(move || Ok(dirty));
        git.expect_stash_push()
            .times(if dirty { 1 } else { 0 })
            .returning(|_| Ok(()));
        git.expect_checkout_new_branch()
            .with(eq(name.to_string()), eq("refs/remotes/origin/main"))
            .times(1)
            .returning(|_, _| Ok(()));
        git
    }

    #[tokio::test]
    async fn test_start_existing_issue_creates_branch() {
        let git = git_creating_branch("ABC-123", true);

        let mut tracker = MockIssueTracker::new();
        tracker.expect_is_valid_issue_name().returning(|_| true);
        tracker
            .expect_get_issue()
            .with(eq("ABC-123"))
            .times(1)
            .returning(|key| Ok(issue(key, "Widgets", IssueType::Feature)));
        tracker
            .expect_set_issue_status()
            .with(eq(IssueStatus::InProgress), eq("ABC-123"))
            .times(1)
            .returning(|_, _| Ok(()));

        let app = app(git, tracker, MockCodeHost::new());
        let work = StartWork {
            issue: IssueRef::Key("abc-123".to_string()),
            create_branch: true,
        };

        let mut stdout = Vec::new();
        let result = app.cmd_start(&work, &mut stdout).await.unwrap();
        assert_eq!(result, None);
        insta::assert_snapshot!(String::from_utf8(stdout).unwrap(), @r"
        Issue ABC-123: Widgets [open]
        ABC-123 is now in progress
        Switched to new branch ABC-123
        ");
    }

    #[tokio::test]
    async fn test_start_new_issue_creates_branch_from_new_key() {
        let git = git_creating_branch("ABC-200", false);

        let mut tracker = MockIssueTracker::new();
        tracker
            .expect_create_issue_for_current_user()
            .withf(|spec| spec.project == "ABC" && spec.title == "Widgets")
            .times(1)
            .returning(|spec| Ok(issue("ABC-200", &spec.title, spec.issue_type)));
        tracker
            .expect_set_issue_status()
            .with(eq(IssueStatus::InProgress), eq("ABC-200"))
            .times(1)
            .returning(|_, _| Ok(()));

        let app = app(git, tracker, MockCodeHost::new());
        let work = StartWork {
            issue: IssueRef::New(IssueSpec {
                title: "Widgets".to_string(),
                description: String::new(),
                issue_type: IssueType::Feature,
                project: "ABC".to_string(),
            }),
            create_branch: true,
        };

        let mut stdout = Vec::new();
        assert_eq!(app.cmd_start(&work, &mut stdout).await.unwrap(), None);
        insta::assert_snapshot!(String::from_utf8(stdout).unwrap(), @r"
        Created issue ABC-200: Widgets
        ABC-200 is now in progress
        Switched to new branch ABC-200
        ");
    }

    #[tokio::test]
    async fn test_start_without_branch_returns_issue() {
        // No git expectations: nothing may touch the repository
        let git = MockGitOps::new();

        let mut tracker = MockIssueTracker::new();
        tracker.expect_is_valid_issue_name().returning(|_| true);
        tracker
            .expect_get_issue()
            .returning(|key| Ok(issue(key, "Widgets", IssueType::Bug)));
        tracker
            .expect_set_issue_status()
            .times(1)
            .returning(|_, _| Ok(()));

        let app = app(git, tracker, MockCodeHost::new());
        let work = StartWork {
            issue: IssueRef::Key("ABC-7".to_string()),
            create_branch: false,
        };

        let issue = app
            .cmd_start(&work, &mut Vec::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(issue.key, "ABC-7");
        assert_eq!(issue.status, IssueStatus::InProgress);
    }

    #[tokio::test]
    async fn test_start_rejects_malformed_key_before_lookup() {
        let mut tracker = MockIssueTracker::new();
        tracker.expect_is_valid_issue_name().returning(|_| false);
        tracker.expect_get_issue().never();
        tracker.expect_set_issue_status().never();

        let app = app(MockGitOps::new(), tracker, MockCodeHost::new());
        let work = StartWork {
            issue: IssueRef::Key("not-a-key".to_string()),
            create_branch: false,
        };

        let err = app.cmd_start(&work, &mut Vec::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid issue key: 'NOT-A-KEY'");
    }

    #[tokio::test]
    async fn test_start_fails_when_base_branch_missing() {
        let mut git = MockGitOps::new();
        git.expect_root_dir()
            .returning(|| Ok(std::path::PathBuf::from("/repo")));
        git.expect_remotes()
            .returning(|| Ok(vec![remote("origin")]));
        git.expect_remote_branch_exists().returning(|_, _| Ok(false));
        git.expect_fetch().never();
        git.expect_checkout_new_branch().never();

        let mut tracker = MockIssueTracker::new();
        tracker.expect_is_valid_issue_name().returning(|_| true);
        tracker.expect_get_issue().never();

        let app = app(git, tracker, MockCodeHost::new());
        let work = StartWork {
            issue: IssueRef::Key("ABC-1".to_string()),
            create_branch: true,
        };

        let err = app.cmd_start(&work, &mut Vec::new()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "base branch 'main' does not exist on the remote"
        );
    }

    #[tokio::test]
    async fn test_start_existing_branch_leaves_issue_untouched() {
        let mut git = MockGitOps::new();
        git.expect_root_dir()
            .returning(|| Ok(std::path::PathBuf::from("/repo")));
        git.expect_remotes()
            .returning(|| Ok(vec![remote("origin")]));
        git.expect_remote_branch_exists().returning(|_, _| Ok(true));
        git.expect_local_branch_exists()
            .with(eq("ABC-1".to_string()))
            .returning(|_| Ok(true));
        git.expect_fetch().never();
        git.expect_stash_push().never();
        git.expect_checkout_new_branch().never();

        let mut tracker = MockIssueTracker::new();
        tracker.expect_is_valid_issue_name().returning(|_| true);
        tracker
            .expect_get_issue()
            .returning(|key| Ok(issue(key, "Widgets", IssueType::Feature)));
        tracker.expect_set_issue_status().never();

        let app = app(git, tracker, MockCodeHost::new());
        let work = StartWork {
            issue: IssueRef::Key("ABC-1".to_string()),
            create_branch: true,
        };

        let err = app.cmd_start(&work, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::BranchAlreadyExists(name)) if name == "ABC-1"
        ));
    }

    #[tokio::test]
    async fn test_start_propagates_unknown_issue() {
        let mut tracker = MockIssueTracker::new();
        tracker.expect_is_valid_issue_name().returning(|_| true);
        tracker
            .expect_get_issue()
            .returning(|key| Err(Error::IssueNotFound(key.to_string())));
        tracker.expect_set_issue_status().never();

        let app = app(MockGitOps::new(), tracker, MockCodeHost::new());
        let work = StartWork {
            issue: IssueRef::Key("ABC-404".to_string()),
            create_branch: false,
        };

        let err = app.cmd_start(&work, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::IssueNotFound(key)) if key == "ABC-404"
        ));
    }
}
