//! Append-only file cache for data that never changes once observed
//!
//! Each cache is one file of `"{key} {json}\n"` lines. The file is read once
//! on open and only ever appended to; the first value stored for a key wins.
//! Appends from async callers run on tokio's blocking pool.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use kashi_core::CacheError;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug)]
pub struct PermanentCache<V> {
    path: PathBuf,
    entries: Arc<Mutex<HashMap<String, V>>>,
}

impl<V> PermanentCache<V>
where
    V: Serialize + DeserializeOwned + Clone,
{
    /// Open (or create) the cache called `name` under `dir`
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self, CacheError> {
        validate_key(name)?;
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(name);

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut entries = HashMap::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parsed = line
                .split_once(' ')
                .ok_or_else(|| "missing separator".to_string())
                .and_then(|(key, json)| {
                    serde_json::from_str::<V>(json)
                        .map(|value| (key.to_string(), value))
                        .map_err(|e| e.to_string())
                });
            match parsed {
                Ok((key, value)) => {
                    entries.entry(key).or_insert(value);
                }
                Err(e) => tracing::warn!(
                    cache = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "Skipping unreadable cache line"
                ),
            }
        }
        tracing::debug!(cache = %path.display(), entries = entries.len(), "Opened cache");

        Ok(Self {
            path,
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// Store `value` unless `key` is already cached
    ///
    /// Returns the value that ends up cached.
    pub fn insert(&self, key: &str, value: V) -> Result<V, CacheError> {
        validate_key(key)?;
        append_entry(&self.path, &self.entries, key, value)
    }

    /// Cached value for `key`, or the result of `fetch` stored under it
    ///
    /// Failed fetches are not cached. The file append runs on the blocking
    /// pool so the calling task never waits on disk.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        V: Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        validate_key(key)?;
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = fetch().await?;

        let path = self.path.clone();
        let entries = Arc::clone(&self.entries);
        let key = key.to_string();
        let stored = tokio::task::spawn_blocking(move || append_entry(&path, &entries, &key, value))
            .await
            .map_err(|e| CacheError::Io(std::io::Error::other(e)))??;
        Ok(stored)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, V>> {
        lock_entries(&self.entries)
    }
}

fn lock_entries<V>(entries: &Mutex<HashMap<String, V>>) -> MutexGuard<'_, HashMap<String, V>> {
    // Entries stay consistent even if a holder panicked
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Append `key` to the file and the map unless it is already present
///
/// The map stays locked across the write so concurrent inserts of one key
/// append a single line.
fn append_entry<V>(
    path: &Path,
    entries: &Mutex<HashMap<String, V>>,
    key: &str,
    value: V,
) -> Result<V, CacheError>
where
    V: Serialize + Clone,
{
    let mut entries = lock_entries(entries);
    if let Some(existing) = entries.get(key) {
        return Ok(existing.clone());
    }

    let json = serde_json::to_string(&value).map_err(|e| CacheError::Serialization(e.to_string()))?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(format!("{key} {json}\n").as_bytes())?;

    entries.insert(key.to_string(), value.clone());
    Ok(value)
}

fn validate_key(key: &str) -> Result<(), CacheError> {
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return Err(CacheError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}
