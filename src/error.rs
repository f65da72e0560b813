use thiserror::Error;

/// Errors raised by the git, tracker and host adapters.
///
/// Command pipelines wrap these in `anyhow` and add context; the variants
/// stay matchable so callers can treat some of them as non-fatal (e.g.
/// [`Error::IssueNotFound`] during bulk resolution).
#[derive(Debug, Error)]
pub enum Error {
    #[error("not a git repository (or any of the parent directories)")]
    NotAGitRepo,

    #[error("branch already exists: {0}")]
    BranchAlreadyExists(String),

    #[error("no git remote configured\n  hint: add one with 'git remote add origin <url>'")]
    NoRemoteConfigured,

    #[error("git {command} failed: {}", .stderr.trim())]
    GitCommandFailed { command: String, stderr: String },

    #[error("issue not found: {0}")]
    IssueNotFound(String),

    #[error("issue {0} has been released and can no longer change status")]
    IssueReleased(String),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("configuration incomplete: missing {}\n  hint: run 'jig init'", .0.join(", "))]
    ConfigIncomplete(Vec<String>),

    #[error("{service} API error ({status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a [`Error::GitCommandFailed`] from the arguments of the failed
    /// invocation, or [`Error::NotAGitRepo`] when git says so.
    pub fn from_git_failure(args: &[&str], stderr: &[u8]) -> Self {
        let stderr = String::from_utf8_lossy(stderr).into_owned();
        if stderr.to_lowercase().contains("not a git repository") {
            return Error::NotAGitRepo;
        }
        Error::GitCommandFailed {
            command: args.join(" "),
            stderr,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::IssueNotFound(_))
    }
}
