use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::FixedOffset;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;

// -----------------------------------------------------------------------------
// Issues

/// Classification of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Feature,
    Bug,
    Chore,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Feature => "feature",
            IssueType::Bug => "bug",
            IssueType::Chore => "chore",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "feature" => Ok(IssueType::Feature),
            "bug" => Ok(IssueType::Bug),
            "chore" => Ok(IssueType::Chore),
            _ => Err(Error::ValidationFailed(format!(
                "invalid issue type: '{s}'\n  hint: valid types are: feature, bug, chore"
            ))),
        }
    }
}

/// Workflow status of an issue.
///
/// Issues only move forward in practice, but the tracker owns the workflow;
/// the one rule enforced locally is that a released issue is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Resolved,
    Released,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::InProgress => "in progress",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Released => "released",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracker issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub title: String,
    pub issue_type: IssueType,
    pub status: IssueStatus,
}

/// Everything needed to create a new issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSpec {
    pub title: String,
    pub description: String,
    pub issue_type: IssueType,
    pub project: String,
}

// -----------------------------------------------------------------------------
// Git

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitId(pub String);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A commit as read from `git log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: CommitId,
    pub author: String,
    pub date: DateTime<FixedOffset>,
    pub message: String,
}

impl Commit {
    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }
}

/// A configured git remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub fetch_url: String,
    pub push_url: String,
}

/// Commits on a branch since its base, plus the issue keys they reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub name: String,
    /// Oldest first.
    pub commits: Vec<Commit>,
    /// De-duplicated, in the order they first appear in `commits`.
    pub issue_keys: Vec<String>,
}

/// A branch's history paired with the tracker issues it references.
#[derive(Debug, Clone)]
pub struct LocalChanges {
    pub branch: BranchInfo,
    /// Resolved issues, in the order of `branch.issue_keys`. Keys that were
    /// malformed or unknown to the tracker are absent.
    pub issues: Vec<Issue>,
}

impl LocalChanges {
    pub fn issue(&self, key: &str) -> Option<&Issue> {
        self.issues.iter().find(|issue| issue.key == key)
    }
}
