//! TTL memoization over a pluggable key-value store.
//!
//! The store is opened once per process, shared between the components that
//! memoize through it, and flushed on the way out. Nothing relies on it for
//! correctness; deleting the cache file is always safe.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use log::warn;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// A key-value store with per-entry expiry.
pub trait KeyValueStore {
    /// The value under `key`, unless it is missing or expired.
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: String, value: Value, ttl: Duration);
    fn remove(&mut self, key: &str);
    fn clear(&mut self);
    /// Persist pending changes, dropping expired entries.
    fn flush(&mut self) -> Result<()>;
}

/// Process-wide handle to the store. The CLI is single-threaded.
pub type SharedStore = Rc<RefCell<dyn KeyValueStore>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    value: Value,
    expires_at: DateTime<Utc>,
}

// -----------------------------------------------------------------------------
// MemoryStore

/// Store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn prune(&mut self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > Utc::now())
            .map(|entry| entry.value.clone())
    }

    fn set(&mut self, key: String, value: Value, ttl: Duration) {
        let expires_at = Utc::now() + ttl;
        self.entries.insert(key, Entry { value, expires_at });
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn flush(&mut self) -> Result<()> {
        self.prune();
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// FileStore

/// Store persisted as a JSON file.
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
    dirty: bool,
}

impl FileStore {
    /// `<user cache dir>/jig/cache.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("jig").join("cache.json"))
    }

    /// Load the store at `path`. A missing file is an empty store; so is an
    /// unreadable one, since the cache is disposable.
    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("opened cache {} with {} entries", path.display(), entries.len());
        Ok(Self {
            path,
            memory: MemoryStore { entries },
            dirty: false,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.memory.get(key)
    }

    fn set(&mut self, key: String, value: Value, ttl: Duration) {
        self.memory.set(key, value, ttl);
        self.dirty = true;
    }

    fn remove(&mut self, key: &str) {
        self.memory.remove(key);
        self.dirty = true;
    }

    fn clear(&mut self) {
        self.memory.clear();
        self.dirty = true;
    }

    fn flush(&mut self) -> Result<()> {
        let before = self.memory.entries.len();
        self.memory.prune();
        if !self.dirty && self.memory.entries.len() == before {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(&self.memory.entries)?)?;
        self.dirty = false;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Memoization

/// Cache key for a call: the method name plus its serialized arguments.
pub fn cache_key<A: Serialize + ?Sized>(method: &str, args: &A) -> String {
    format!("{method}:{}", serde_json::to_string(args).unwrap_or_default())
}

/// An async function whose successful results are cached for `ttl`.
pub struct Memoized<K, F> {
    key: K,
    ttl: Duration,
    inner: F,
    store: SharedStore,
}

/// Wrap `inner` so that results are looked up in `store` under `key(args)`
/// before calling it. Errors are never cached.
pub fn memoize<K, F>(key: K, ttl: Duration, inner: F, store: SharedStore) -> Memoized<K, F> {
    Memoized {
        key,
        ttl,
        inner,
        store,
    }
}

impl<K, F> Memoized<K, F> {
    pub async fn call<A, T, Fut>(&self, args: A) -> Result<T>
    where
        K: Fn(&A) -> String,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Serialize + DeserializeOwned,
    {
        let key = (self.key)(&args);
        let cached = self.store.borrow().get(&key);
        if let Some(value) = cached {
            match serde_json::from_value(value) {
                Ok(value) => {
                    debug!("cache hit: {}", key);
                    return Ok(value);
                }
                Err(e) => debug!("discarding cache entry {}: {}", key, e),
            }
        }

        let value = (self.inner)(args).await?;
        self.store
            .borrow_mut()
            .set(key, serde_json::to_value(&value)?, self.ttl);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::Error;

    fn memory_store() -> SharedStore {
        Rc::new(RefCell::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_memoize_hits_within_ttl() {
        let store = memory_store();
        let calls = Cell::new(0);
        let double = memoize(
            |n: &u32| cache_key("double", n),
            Duration::minutes(5),
            |n: u32| {
                let calls = &calls;
                async move {
                    calls.set(calls.get() + 1);
                    Ok::<_, Error>(n * 2)
                }
            },
            store.clone(),
        );

        assert_eq!(double.call(21).await.unwrap(), 42);
        assert_eq!(double.call(21).await.unwrap(), 42);
        assert_eq!(double.call(5).await.unwrap(), 10);
        assert_eq!(calls.get(), 2);
        assert_eq!(store.borrow().get("double:21"), Some(Value::from(42)));
    }

    #[tokio::test]
    async fn test_memoize_recomputes_expired_entries() {
        let store = memory_store();
        let calls = Cell::new(0);
        let double = memoize(
            |n: &u32| cache_key("double", n),
            Duration::zero(),
            |n: u32| {
                let calls = &calls;
                async move {
                    calls.set(calls.get() + 1);
                    Ok::<_, Error>(n * 2)
                }
            },
            store,
        );

        double.call(1).await.unwrap();
        double.call(1).await.unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_memoize_does_not_cache_errors() {
        let store = memory_store();
        let failing = memoize(
            |key: &String| cache_key("get_issue", key),
            Duration::minutes(5),
            |key: String| async move { Err::<u32, _>(Error::IssueNotFound(key)) },
            store.clone(),
        );

        assert!(failing.call("ABC-1".to_string()).await.is_err());
        assert_eq!(store.borrow().get("get_issue:\"ABC-1\""), None);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let mut store = FileStore::open(path.clone()).unwrap();
        store.set("live".into(), Value::from("yes"), Duration::minutes(5));
        store.set("dead".into(), Value::from("no"), Duration::zero());
        store.flush().unwrap();

        let reopened = FileStore::open(path).unwrap();
        assert_eq!(reopened.get("live"), Some(Value::from("yes")));
        assert_eq!(reopened.get("dead"), None);
        assert_eq!(reopened.memory.entries.len(), 1);
    }

    #[test]
    fn test_file_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = FileStore::open(path).unwrap();
        assert_eq!(store.get("anything"), None);
    }

    #[test]
    fn test_clear() {
        let mut store = MemoryStore::new();
        store.set("a".into(), Value::from(1), Duration::minutes(1));
        store.clear();
        assert_eq!(store.get("a"), None);
    }
}
