use std::path::PathBuf;
use std::process::Output;

use chrono::DateTime;
use tokio::process::Command;
use tracing::debug;
use tracing::instrument;

use crate::error::Error;
use crate::error::Result;
use crate::models::Commit;
use crate::models::CommitId;
use crate::models::Remote;
use crate::ops::git::GitOps;

/// Field separator in `git log` output.
const UNIT_SEP: char = '\x1f';
/// Record separator in `git log` output.
const RECORD_SEP: char = '\x1e';

// -----------------------------------------------------------------------------
// Types

/// Git client.
pub struct GitClient {
    path: PathBuf,
}

// -----------------------------------------------------------------------------
// GitClient impl

impl GitClient {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Run git and return the raw output, whatever the exit status.
    async fn output(&self, args: &[&str]) -> Result<Output> {
        debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .current_dir(&self.path)
            .args(args)
            .output()
            .await?;
        Ok(output)
    }

    /// Run git and return trimmed stdout, failing on a non-zero exit.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(Error::from_git_failure(args, &output.stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run git where exit code 0 means yes and `no_code` means no.
    async fn probe(&self, args: &[&str], no_code: i32) -> Result<bool> {
        let output = self.output(args).await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(code) if code == no_code => Ok(false),
            _ => Err(Error::from_git_failure(args, &output.stderr)),
        }
    }
}

impl GitOps for GitClient {
    async fn root_dir(&self) -> Result<PathBuf> {
        let root = self.run(&["rev-parse", "--show-toplevel"]).await?;
        Ok(PathBuf::from(root))
    }

    async fn current_branch(&self) -> Result<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    async fn local_branch_exists(&self, branch: &str) -> Result<bool> {
        let refname = format!("refs/heads/{branch}");
        self.probe(&["rev-parse", "--verify", "--quiet", &refname], 1)
            .await
    }

    #[instrument(skip_all)]
    async fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool> {
        // ls-remote exits with 2 when --exit-code finds no matching refs
        self.probe(&["ls-remote", "--exit-code", "--heads", remote, branch], 2)
            .await
    }

    async fn remotes(&self) -> Result<Vec<Remote>> {
        let output = self.run(&["remote", "-v"]).await?;
        Ok(parse_remotes(&output))
    }

    #[instrument(skip_all)]
    async fn fetch(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["fetch", remote, branch]).await?;
        Ok(())
    }

    async fn is_dirty(&self) -> Result<bool> {
        let status = self.run(&["status", "--porcelain"]).await?;
        Ok(!status.is_empty())
    }

    async fn stash_push(&self, message: &str) -> Result<()> {
        self.run(&["stash", "push", "--include-untracked", "-m", message])
            .await?;
        Ok(())
    }

    async fn checkout_new_branch(&self, branch: &str, start_point: &str) -> Result<()> {
        self.run(&["checkout", "--no-track", "-b", branch, start_point])
            .await?;
        Ok(())
    }

    async fn merge_base(&self, a: &str, b: &str) -> Result<CommitId> {
        Ok(CommitId(self.run(&["merge-base", a, b]).await?))
    }

    async fn log(&self, range: &str) -> Result<Vec<Commit>> {
        let format = format!("--format=%H{UNIT_SEP}%an{UNIT_SEP}%aI{UNIT_SEP}%B{RECORD_SEP}");
        let output = self.run(&["log", "--reverse", &format, range]).await?;
        parse_log(&output)
    }

    async fn last_tag(&self, rev: &str) -> Result<Option<String>> {
        let args: [&str; 4] = ["describe", "--tags", "--abbrev=0", rev];
        let output = self.output(&args).await?;
        if output.status.success() {
            let tag = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(Some(tag));
        }
        if is_untagged(&output.stderr) {
            return Ok(None);
        }
        Err(Error::from_git_failure(&args, &output.stderr))
    }

    async fn upstream_remote(&self, branch: &str) -> Result<Option<String>> {
        let key = format!("branch.{branch}.remote");
        let args: [&str; 3] = ["config", "--get", &key];
        let output = self.output(&args).await?;
        match output.status.code() {
            Some(0) => Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            )),
            Some(1) => Ok(None),
            _ => Err(Error::from_git_failure(&args, &output.stderr)),
        }
    }

    #[instrument(skip_all)]
    async fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["push", "-u", remote, branch]).await?;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Output parsing

/// Whether `git describe` failed only because no tag is reachable.
fn is_untagged(stderr: &[u8]) -> bool {
    let stderr = String::from_utf8_lossy(stderr);
    ["No names found", "No tags can describe", "cannot describe"]
        .iter()
        .any(|needle| stderr.contains(needle))
}

/// Parse `git remote -v` output, keeping first-seen remote order.
fn parse_remotes(output: &str) -> Vec<Remote> {
    let mut remotes: Vec<Remote> = Vec::new();
    for line in output.lines() {
        let Some((name, rest)) = line.split_once('\t') else {
            continue;
        };
        let (url, kind) = rest.rsplit_once(' ').unwrap_or((rest, "(fetch)"));
        let index = match remotes.iter().position(|r| r.name == name) {
            Some(index) => index,
            None => {
                remotes.push(Remote {
                    name: name.to_string(),
                    fetch_url: url.to_string(),
                    push_url: url.to_string(),
                });
                remotes.len() - 1
            }
        };
        match kind {
            "(push)" => remotes[index].push_url = url.to_string(),
            _ => remotes[index].fetch_url = url.to_string(),
        }
    }
    remotes
}

/// Parse the record-separated `git log` format used by [`GitClient::log`].
fn parse_log(output: &str) -> Result<Vec<Commit>> {
    let mut commits = Vec::new();
    for record in output.split(RECORD_SEP) {
        let record = record.trim_start_matches('\n');
        if record.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = record.splitn(4, UNIT_SEP).collect();
        if parts.len() != 4 {
            return Err(Error::GitCommandFailed {
                command: "log".to_string(),
                stderr: format!("unexpected log record: {record:?}"),
            });
        }

        let date = DateTime::parse_from_rfc3339(parts[2]).map_err(|e| Error::GitCommandFailed {
            command: "log".to_string(),
            stderr: format!("bad commit date {:?}: {e}", parts[2]),
        })?;

        commits.push(Commit {
            id: CommitId(parts[0].to_string()),
            author: parts[1].to_string(),
            date,
            message: parts[3].trim_end().to_string(),
        });
    }
    Ok(commits)
}
