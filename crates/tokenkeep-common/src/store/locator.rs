//! Resolution of caller-supplied store locations to store handles.

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use super::{FileTokenStore, MemoryTokenStore, TokenStore};

/// Maps a location string (the `token-path` a client sends) to a store.
///
/// Repeated lookups of the same location must return handles onto the same
/// underlying store, so that writers serialize on one lock.
pub trait StoreLocator: Send + Sync + fmt::Debug {
    /// Returns the store for `location`.
    fn locate(&self, location: &str) -> Arc<dyn TokenStore>;
}

/// Resolves locations to [`FileTokenStore`]s, one handle per file.
///
/// Locations are normalized before lookup, so `/d/tokens.json` and
/// `/d/sub/../tokens.json` share one handle and one write lock.
///
/// Handles are kept for the lifetime of the locator: every distinct
/// location a caller sends adds an entry that is never evicted.
#[derive(Debug, Default)]
pub struct FileStoreLocator {
    pinned: Option<Arc<FileTokenStore>>,
    stores: DashMap<PathBuf, Arc<FileTokenStore>>,
}

impl FileStoreLocator {
    /// Resolves every location to its own file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignores caller-supplied locations and always uses `path`.
    pub fn pinned(path: impl Into<PathBuf>) -> Self {
        Self {
            pinned: Some(Arc::new(FileTokenStore::new(path))),
            stores: DashMap::new(),
        }
    }

    /// The pinned store path, if any.
    #[must_use]
    pub fn pinned_path(&self) -> Option<&std::path::Path> {
        self.pinned.as_deref().map(FileTokenStore::path)
    }
}

impl StoreLocator for FileStoreLocator {
    fn locate(&self, location: &str) -> Arc<dyn TokenStore> {
        if let Some(store) = &self.pinned {
            return Arc::clone(store) as Arc<dyn TokenStore>;
        }

        let key = store_key(Path::new(location));
        let store: Arc<FileTokenStore> = self
            .stores
            .entry(key.clone())
            .or_insert_with(|| Arc::new(FileTokenStore::new(key)))
            .clone();
        store as Arc<dyn TokenStore>
    }
}

/// Absolute, symlink-free form of a store path.
///
/// The deepest existing directory above the file is canonicalized and the
/// rest is resolved lexically, so a path keeps its key before and after its
/// directories are created. Falls back to the path as given when nothing
/// can be resolved.
fn store_key(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => return path.to_path_buf(),
        }
    };

    for ancestor in absolute.ancestors().skip(1) {
        if let Ok(base) = fs::canonicalize(ancestor)
            && let Ok(rest) = absolute.strip_prefix(ancestor)
        {
            return join_lexically(base, rest);
        }
    }

    path.to_path_buf()
}

fn join_lexically(mut base: PathBuf, rest: &Path) -> PathBuf {
    for component in rest.components() {
        match component {
            Component::ParentDir => {
                base.pop();
            }
            Component::Normal(part) => base.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    base
}

/// Resolves locations to shared [`MemoryTokenStore`]s.
#[derive(Debug, Default, Clone)]
pub struct MemoryStoreLocator {
    stores: Arc<DashMap<String, MemoryTokenStore>>,
}

impl MemoryStoreLocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The store for `location`, created empty on first use.
    #[must_use]
    pub fn store(&self, location: &str) -> MemoryTokenStore {
        self.stores
            .entry(location.to_string())
            .or_insert_with(|| MemoryTokenStore::new(location))
            .clone()
    }
}

impl StoreLocator for MemoryStoreLocator {
    fn locate(&self, location: &str) -> Arc<dyn TokenStore> {
        Arc::new(self.store(location))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_same_path_shares_one_handle() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tokens.json");
        let path = path.to_str().unwrap();
        let locator = FileStoreLocator::new();

        let first = locator.locate(path);
        let second = locator.locate(path);
        assert!(Arc::ptr_eq(&first, &second));

        first.set("k", "v").unwrap();
        assert_eq!(second.get("k").unwrap().as_deref(), Some("v"));

        let canonical = fs::canonicalize(temp.path()).unwrap().join("tokens.json");
        assert_eq!(first.location(), canonical.display().to_string());
    }

    #[test]
    fn test_spellings_of_one_file_share_one_handle() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        let plain = temp.path().join("tokens.json");
        let dotted = temp.path().join("sub/../././tokens.json");
        let locator = FileStoreLocator::new();

        let first = locator.locate(plain.to_str().unwrap());
        let second = locator.locate(dotted.to_str().unwrap());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_directories_keep_their_key_once_created() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("later/tokens.json");
        let locator = FileStoreLocator::new();

        let before = locator.locate(path.to_str().unwrap());
        before.set("k", "v").unwrap();
        let after = locator.locate(path.to_str().unwrap());

        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_concurrent_writes_through_two_spellings_keep_every_token() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        let spellings = [
            temp.path().join("tokens.json").display().to_string(),
            temp.path().join("sub/../tokens.json").display().to_string(),
        ];
        let locator = Arc::new(FileStoreLocator::new());

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let locator = Arc::clone(&locator);
                let location = spellings[i % 2].clone();
                std::thread::spawn(move || locator.locate(&location).set(&format!("k{i}"), "t"))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let store = FileTokenStore::new(temp.path().join("tokens.json"));
        assert_eq!(store.entries().unwrap().len(), 64);
    }

    #[test]
    fn test_pinned_ignores_requested_location() {
        let temp = TempDir::new().unwrap();
        let pinned = temp.path().join("pinned.json");
        let locator = FileStoreLocator::pinned(&pinned);

        let store = locator.locate("/somewhere/else.json");
        store.set("k", "v").unwrap();

        assert!(pinned.exists());
        assert_eq!(locator.pinned_path(), Some(pinned.as_path()));
    }

    #[test]
    fn test_memory_locator_separates_locations() {
        let locator = MemoryStoreLocator::new();

        locator.locate("a").set("k", "1").unwrap();
        locator.locate("b").set("k", "2").unwrap();

        assert_eq!(locator.store("a").get("k").unwrap().as_deref(), Some("1"));
        assert_eq!(locator.store("b").get("k").unwrap().as_deref(), Some("2"));
    }
}
