use std::fmt::Write as _;

use anyhow::Context as _;
use anyhow::bail;
use colored::Colorize;
use futures_util::FutureExt as _;

use crate::App;
use crate::error::Error;
use crate::models::CommitId;
use crate::models::LocalChanges;
use crate::ops::git::GitOps;
use crate::ops::host::CodeHost;
use crate::ops::tracker::IssueTracker;
use crate::pipeline::gate;
use crate::pipeline::validate;

/// Length of commit IDs in pull request bodies
const SHORT_ID_LENGTH: usize = 8;

impl<G: GitOps, T: IssueTracker, H: CodeHost> App<G, T, H> {
    /// Push the current branch and open a pull request into the base branch.
    ///
    /// With `dry_run`, only print what the pull request would contain.
    pub async fn cmd_review(
        &self,
        dry_run: bool,
        stdout: &mut impl std::io::Write,
    ) -> anyhow::Result<()> {
        let base_branch = &self.vcs.config().base_branch;
        validate(vec![
            async { self.vcs.get_root_dir().await.map(|_| ()) }.boxed_local(),
            gate(
                async {
                    let branch = self.vcs.current_branch().await?;
                    Ok::<_, Error>(branch != *base_branch)
                },
                format!("cannot review the base branch '{base_branch}'\n  hint: run 'jig start' first"),
            ),
        ])
        .await?;

        let branch = self.vcs.get_branch_info().await?;
        if branch.commits.is_empty() {
            bail!("no commits on {} since {}", branch.name, base_branch);
        }
        let changes = self.local_changes(branch).await?;
        let repo = self.repo_slug().await?;

        let title = pull_request_title(&changes);
        let body = pull_request_body(&changes);
        writeln!(stdout, "{} {}", "Title:".bold(), title)?;
        writeln!(stdout)?;
        writeln!(stdout, "{}", body)?;

        if dry_run {
            writeln!(stdout, "Dry run: nothing pushed")?;
            return Ok(());
        }

        let head = self.vcs.push().await?;
        writeln!(stdout, "Pushed {}", head)?;

        let url = self
            .host
            .create_pull_request(&repo, &head, base_branch, &title, &body)
            .await
            .with_context(|| format!("failed to open a pull request for {head}"))?;
        writeln!(stdout, "Created pull request: {}", url.green())?;

        Ok(())
    }
}

/// `KEY: title` when the branch is about exactly one issue, otherwise the
/// first commit's subject, otherwise the branch name.
fn pull_request_title(changes: &LocalChanges) -> String {
    if let [issue] = changes.issues.as_slice() {
        return format!("{}: {}", issue.key, issue.title);
    }
    changes
        .branch
        .commits
        .first()
        .map(|commit| commit.subject().to_string())
        .filter(|subject| !subject.is_empty())
        .unwrap_or_else(|| changes.branch.name.clone())
}

fn pull_request_body(changes: &LocalChanges) -> String {
    let mut body = String::new();
    if !changes.issues.is_empty() {
        body.push_str("## Issues\n\n");
        for issue in &changes.issues {
            let _ = writeln!(body, "- {} {}", issue.key, issue.title);
        }
        body.push('\n');
    }
    body.push_str("## Commits\n\n");
    for commit in &changes.branch.commits {
        let _ = writeln!(body, "- {} {}", short_id(&commit.id), commit.subject());
    }
    body
}

fn short_id(id: &CommitId) -> &str {
    id.0.get(..SHORT_ID_LENGTH).unwrap_or(&id.0)
}
