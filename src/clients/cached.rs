use chrono::Duration;

use crate::cache::SharedStore;
use crate::cache::cache_key;
use crate::cache::memoize;
use crate::error::Result;
use crate::models::Issue;
use crate::models::IssueSpec;
use crate::models::IssueStatus;
use crate::ops::tracker::IssueTracker;

/// Issue tracker that memoizes `get_issue` in the shared cache store.
///
/// Writes go straight through; a status change evicts the cached issue.
pub struct CachedTracker<T> {
    inner: T,
    store: SharedStore,
    ttl: Duration,
}

impl<T: IssueTracker> CachedTracker<T> {
    pub fn new(inner: T, store: SharedStore, ttl: Duration) -> Self {
        Self { inner, store, ttl }
    }
}

impl<T: IssueTracker> IssueTracker for CachedTracker<T> {
    async fn get_issue(&self, key: &str) -> Result<Issue> {
        memoize(
            |key: &String| cache_key("get_issue", key),
            self.ttl,
            |key: String| async move { self.inner.get_issue(&key).await },
            self.store.clone(),
        )
        .call(key.to_string())
        .await
    }

    async fn create_issue_for_current_user(&self, spec: &IssueSpec) -> Result<Issue> {
        self.inner.create_issue_for_current_user(spec).await
    }

    async fn set_issue_status(&self, status: IssueStatus, key: &str) -> Result<()> {
        let result = self.inner.set_issue_status(status, key).await;
        self.store
            .borrow_mut()
            .remove(&cache_key("get_issue", key));
        result
    }

    fn is_valid_issue_name(&self, key: &str) -> bool {
        self.inner.is_valid_issue_name(key)
    }
}
