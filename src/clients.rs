//! Clients for the external systems behind the [`crate::ops`] traits.
//!
//! - [`git`]: Git client that shells out to the git CLI
//! - [`curl`]: Curl-based HTTP client for making REST API requests
//! - [`jira`]: Jira REST issue tracker
//! - [`github`]: GitHub REST code host
//! - [`cached`]: Issue tracker decorator that memoizes reads

pub mod cached;
pub mod curl;
pub mod git;
pub mod github;
pub mod jira;
