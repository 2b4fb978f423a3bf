//! Project status persistence: the set of completed roadmap items.
//!
//! The status file holds `{"completed_items": [...]}`. Loading never fails: a
//! missing or malformed file is recreated empty. Saving always writes the items
//! deduplicated and sorted. `merge` performs the reload-union-save cycle under
//! an exclusive lock on a `.lock` sidecar so concurrent runs do not drop each
//! other's completions.

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::util::write_atomic;

/// Completed item names, deduplicated and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletedItems(BTreeSet<String>);

impl CompletedItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Add names, returning those that were not already present.
    pub fn union<I, S>(&mut self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .map(Into::into)
            .filter(|name| self.0.insert(name.clone()))
            .collect()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for CompletedItems {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusDocument {
    completed_items: CompletedItems,
}

/// Reads and writes the project status file.
#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
}

impl StatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load completed items, recreating the file empty if absent or malformed.
    pub fn load(&self) -> CompletedItems {
        match self.read() {
            Ok(Some(items)) => items,
            Ok(None) => {
                tracing::info!(path = %self.path.display(), "status file not found; creating it");
                self.reset()
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %format!("{:#}", err),
                    "status file unreadable; resetting to empty"
                );
                self.reset()
            }
        }
    }

    /// Overwrite the status file with `items`.
    pub fn save(&self, items: &CompletedItems) -> Result<()> {
        let document = StatusDocument {
            completed_items: items.clone(),
        };
        let json = serde_json::to_string_pretty(&document)
            .context("Failed to serialize project status")?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("Failed to save status file {}", self.path.display()))
    }

    /// Union `names` into the stored items under an exclusive file lock.
    ///
    /// Returns the full set after the merge.
    pub fn merge(&self, names: &[String]) -> Result<CompletedItems> {
        self.with_lock(|| {
            let mut items = self.read().ok().flatten().unwrap_or_default();
            let added = items.union(names.iter().cloned());
            self.save(&items)?;
            tracing::debug!(added = added.len(), total = items.len(), "merged completed items");
            Ok(items)
        })
    }

    /// Run `f` while holding the exclusive lock on the `.lock` sidecar.
    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;
        lock.lock_exclusive()
            .with_context(|| format!("Failed to lock {}", lock_path.display()))?;

        let result = f();

        if let Err(err) = FileExt::unlock(&lock) {
            tracing::warn!(error = %err, "failed to release status lock");
        }
        result
    }

    /// Async wrapper around [`StatusStore::load`].
    pub async fn load_async(&self) -> CompletedItems {
        let store = self.clone();
        match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(items) => items,
            Err(err) => {
                tracing::error!(error = %err, "status load task failed");
                CompletedItems::new()
            }
        }
    }

    /// Async wrapper around [`StatusStore::merge`].
    pub async fn merge_async(&self, names: Vec<String>) -> Result<CompletedItems> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.merge(&names))
            .await
            .context("Status merge task panicked")?
    }

    fn read(&self) -> Result<Option<CompletedItems>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let document: StatusDocument = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(document.completed_items))
    }

    /// Recreate the file empty, unless a concurrent writer already left a valid one.
    fn reset(&self) -> CompletedItems {
        let recreated = self.with_lock(|| match self.read() {
            Ok(Some(items)) => Ok(items),
            _ => {
                let items = CompletedItems::new();
                self.save(&items)?;
                Ok(items)
            }
        });
        match recreated {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(error = %format!("{:#}", err), "could not recreate status file");
                CompletedItems::new()
            }
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> StatusStore {
        StatusStore::new(dir.join("project_status.json"))
    }

    #[test]
    fn test_save_dedups_and_sorts() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let items: CompletedItems = ["a", "b", "a"].into_iter().collect();
        store.save(&items).unwrap();

        assert_eq!(store.load().to_vec(), vec!["a", "b"]);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"completed_items": ["a", "b"]}));
    }

    #[test]
    fn test_missing_file_is_created_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.load().is_empty());
        assert!(store.path().exists());
    }

    #[test]
    fn test_malformed_file_resets_without_error() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load().is_empty());
        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("\"completed_items\": []"));
    }

    #[test]
    fn test_wrong_shape_resets() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.path(), r#"{"completed_items": "a"}"#).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_merge_unions_with_stored_items() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .save(&["existing"].into_iter().collect())
            .unwrap();

        let merged = store
            .merge(&["new".to_string(), "existing".to_string()])
            .unwrap();
        assert_eq!(merged.to_vec(), vec!["existing", "new"]);
        assert_eq!(store.load().to_vec(), vec!["existing", "new"]);
    }

    #[test]
    fn test_merge_sees_writes_made_after_load() {
        let dir = tempdir().unwrap();
        let first = store_in(dir.path());
        let second = store_in(dir.path());
        let _ = first.load();

        second.merge(&["from-second".to_string()]).unwrap();
        let merged = first.merge(&["from-first".to_string()]).unwrap();
        assert_eq!(merged.to_vec(), vec!["from-first", "from-second"]);
    }

    #[test]
    fn test_merge_into_missing_nested_file() {
        let dir = tempdir().unwrap();
        let store = StatusStore::new(dir.path().join("state").join("status.json"));
        let merged = store.merge(&["a".to_string()]).unwrap();
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_union_reports_new_names_only() {
        let mut items: CompletedItems = ["a"].into_iter().collect();
        let added = items.union(["a", "b", "b"]);
        assert_eq!(added, vec!["b"]);
        assert!(items.contains("b"));
    }

    #[test]
    fn test_concurrent_loads_and_merges_keep_every_completion() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("project_status.json");

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = StatusStore::new(path.clone());
                std::thread::spawn(move || {
                    for n in 0..25 {
                        let _ = store.load();
                        store.merge(&[format!("w{}-{}", worker, n)]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(StatusStore::new(path).load().len(), 100);
    }

    #[test]
    fn test_reset_keeps_file_repaired_by_another_writer() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.save(&["kept"].into_iter().collect()).unwrap();
        assert_eq!(store.reset().to_vec(), vec!["kept"]);
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.load_async().await.is_empty());
        let merged = store.merge_async(vec!["x".into()]).await.unwrap();
        assert!(merged.contains("x"));
    }
}
