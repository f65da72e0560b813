#![allow(async_fn_in_trait)]

#[cfg(test)]
use mockall::automock;
use regex::Regex;

use crate::error::Result;
use crate::models::Issue;
use crate::models::IssueSpec;
use crate::models::IssueStatus;

// -----------------------------------------------------------------------------
// IssueTracker trait

/// Operations for interacting with the issue tracker.
#[cfg_attr(test, automock)]
pub trait IssueTracker {
    /// Fetch an issue. A missing issue is [`crate::Error::IssueNotFound`].
    async fn get_issue(&self, key: &str) -> Result<Issue>;

    /// Create an issue assigned to the authenticated user.
    async fn create_issue_for_current_user(&self, spec: &IssueSpec) -> Result<Issue>;

    /// Move an issue to `status`. Does nothing if it is already there.
    async fn set_issue_status(&self, status: IssueStatus, key: &str) -> Result<()>;

    /// Whether `key` looks like an issue key of this tracker.
    fn is_valid_issue_name(&self, key: &str) -> bool;
}

/// Compile a key pattern so that it only matches whole keys.
pub fn anchored_key_pattern(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{pattern})$"))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchored_key_pattern() {
        let re = anchored_key_pattern(r"[A-Z][A-Z0-9]+-\d+").unwrap();
        assert!(re.is_match("ABC-123"));
        assert!(re.is_match("A1-1"));
        assert!(!re.is_match("abc-123"));
        assert!(!re.is_match("XABC-123 trailing"));
        assert!(!re.is_match("ABC123"));
    }
}
