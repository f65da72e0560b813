use anyhow::Context as _;
use chrono::Local;
use colored::Colorize;
use futures_util::FutureExt as _;
use futures_util::future::try_join_all;

use crate::App;
use crate::changelog::Changelog;
use crate::models::IssueStatus;
use crate::ops::git::GitOps;
use crate::ops::host::CodeHost;
use crate::ops::tracker::IssueTracker;
use crate::pipeline::require;
use crate::pipeline::validate;

impl<G: GitOps, T: IssueTracker, H: CodeHost> App<G, T, H> {
    /// Cut a release named `version`.
    ///
    /// 1. Fetch the base branch and collect the commits on it since its last
    ///    tag, with the issues they fix. The checked-out branch is ignored.
    /// 2. Print the changelog, grouped by kind of change.
    /// 3. Mark every issue in it as released.
    /// 4. Tag the base branch and publish the changelog as release notes.
    ///
    /// With `dry_run`, stop after printing the changelog.
    pub async fn cmd_release(
        &self,
        version: &str,
        dry_run: bool,
        stdout: &mut impl std::io::Write,
    ) -> anyhow::Result<()> {
        validate(vec![
            require(
                !version.is_empty() && !version.contains(char::is_whitespace),
                format!("invalid version: '{version}'"),
            ),
            async { self.vcs.get_root_dir().await.map(|_| ()) }.boxed_local(),
        ])
        .await?;

        let info = self.vcs.get_release_info().await?;
        let changes = self.local_changes(info).await?;
        let changelog = Changelog::build(&changes, |commit| {
            self.vcs.extract_issue_keys([commit.message.as_str()])
        });
        let notes = changelog.render(version, Local::now().date_naive());
        writeln!(stdout, "{}", notes)?;

        if dry_run {
            writeln!(stdout, "Dry run: no issues released, no release created")?;
            return Ok(());
        }

        // Resolve the repository first so a bad remote changes nothing
        let repo = self.repo_slug().await?;

        let released = try_join_all(changelog.issues().map(|issue| {
            self.tracker
                .set_issue_status(IssueStatus::Released, &issue.key)
        }))
        .await
        .context("failed to mark issues as released")?;
        writeln!(stdout, "Marked {} issues as released", released.len())?;

        let base_branch = &self.vcs.config().base_branch;
        let url = self
            .host
            .create_release(&repo, version, base_branch, &notes)
            .await
            .with_context(|| format!("failed to create release {version}"))?;
        writeln!(stdout, "Created release: {}", url.green())?;

        Ok(())
    }
}
