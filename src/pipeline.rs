//! Building blocks shared by the command pipelines: concurrent validation
//! gates and concurrent issue resolution.

use std::future::Future;

use futures_util::FutureExt as _;
use futures_util::future::LocalBoxFuture;
use futures_util::future::join_all;
use futures_util::future::try_join_all;
use log::warn;

use crate::error::Error;
use crate::error::Result;
use crate::models::Issue;
use crate::ops::tracker::IssueTracker;

/// A precondition checked before a pipeline runs.
pub type Check<'a> = LocalBoxFuture<'a, Result<()>>;

/// A check that fails with `message` if `condition` resolves to false.
pub fn gate<'a>(
    condition: impl Future<Output = Result<bool>> + 'a,
    message: impl Into<String>,
) -> Check<'a> {
    let message = message.into();
    async move {
        if condition.await? {
            Ok(())
        } else {
            Err(Error::ValidationFailed(message))
        }
    }
    .boxed_local()
}

/// A check that always passes or always fails.
pub fn require<'a>(ok: bool, message: impl Into<String>) -> Check<'a> {
    gate(std::future::ready(Ok(ok)), message)
}

/// Run all checks concurrently. The first failure is returned as soon as it
/// is observed; checks still in flight are dropped.
pub async fn validate(checks: Vec<Check<'_>>) -> Result<()> {
    try_join_all(checks).await?;
    Ok(())
}

/// Fetch the issues for `keys` concurrently, keeping the order of `keys`.
///
/// Keys that don't look like issue keys are skipped without a lookup, and
/// keys the tracker doesn't know are dropped. Any other failure is fatal.
pub async fn resolve_issues<T: IssueTracker>(tracker: &T, keys: &[String]) -> Result<Vec<Issue>> {
    let keys: Vec<&String> = keys
        .iter()
        .filter(|key| tracker.is_valid_issue_name(key))
        .collect();
    let results = join_all(keys.iter().map(|key| tracker.get_issue(key))).await;

    let mut issues = Vec::with_capacity(results.len());
    for (key, result) in keys.into_iter().zip(results) {
        match result {
            Ok(issue) => issues.push(issue),
            Err(err) if err.is_not_found() => warn!("Skipping unknown issue {}", key),
            Err(err) => return Err(err),
        }
    }
    Ok(issues)
}
