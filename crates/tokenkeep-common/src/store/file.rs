//! JSON file backend.
//!
//! The whole mapping lives in one pretty-printed JSON object:
//!
//! ```json
//! {
//!   "get:/users>icNfi78w": "eyJhbGciOi...",
//!   "post:/sql-reports>PDhDovhb": "eyJhbGciOi..."
//! }
//! ```
//!
//! Every mutation is a read-modify-write of the full file, persisted by
//! writing a fresh sibling temp file and renaming it over the old one, so readers
//! in other processes see either the old or the new mapping, never a torn one.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;
use serde_json::{Map, Value};

use super::{TokenStore, usable_token};
use crate::error::{Result, StoreError};

type Entries = Map<String, Value>;

/// Token store backed by a single JSON file.
#[derive(Debug)]
pub struct FileTokenStore {
    /// Store file path
    path: PathBuf,

    /// Serializes read-modify-write cycles issued through this handle.
    /// Writers in other processes are not covered; the last rename wins.
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    /// Opens a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the store file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the raw mapping, including placeholder entries.
    ///
    /// A missing or blank file reads as an empty mapping.
    fn load(&self) -> Result<Entries> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        if json.trim().is_empty() {
            return Ok(Entries::new());
        }

        let value: Value = serde_json::from_str(&json).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        match value {
            Value::Object(entries) => Ok(entries),
            _ => Err(StoreError::NotAnObject(self.path.clone())),
        }
    }

    /// Persists the mapping atomically: write to temp file, then rename.
    fn save(&self, entries: &Entries) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

        // Sorted regardless of how `Map` orders its keys.
        let sorted: BTreeMap<&String, &Value> = entries.iter().collect();
        let json = serde_json::to_string_pretty(&sorted).map_err(|source| {
            StoreError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;

        // Unique per write, so no two writers ever share a temp file.
        let file_name = self
            .path
            .file_name()
            .map_or_else(|| "tokens.json".into(), |name| name.to_string_lossy());
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| StoreError::io(dir, e))?;
        temp.write_all(json.as_bytes())
            .map_err(|e| StoreError::io(temp.path(), e))?;
        temp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path, e.error))?;

        debug!(
            "Saved token store {} ({} entries, {} bytes)",
            self.path.display(),
            entries.len(),
            json.len()
        );

        Ok(())
    }

    /// Runs one locked read-modify-write cycle.
    ///
    /// `apply` returns its result and whether the mapping changed; unchanged
    /// mappings are not rewritten.
    fn modify<R>(&self, apply: impl FnOnce(&mut Entries) -> (R, bool)) -> Result<R> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;

        let mut entries = self.load()?;
        let (result, changed) = apply(&mut entries);
        if changed {
            self.save(&entries)?;
        }

        Ok(result)
    }
}

impl TokenStore for FileTokenStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn get(&self, fingerprint: &str) -> Result<Option<String>> {
        let entries = self.load()?;
        Ok(entries
            .get(fingerprint)
            .and_then(usable_token)
            .map(str::to_string))
    }

    fn set(&self, fingerprint: &str, token: &str) -> Result<()> {
        if token.is_empty() {
            return self.remove(fingerprint).map(|_| ());
        }

        self.modify(|entries| {
            let previous = entries.insert(fingerprint.to_string(), Value::from(token));
            ((), previous.as_ref().and_then(Value::as_str) != Some(token))
        })
    }

    fn remove(&self, fingerprint: &str) -> Result<bool> {
        self.modify(|entries| match entries.remove(fingerprint) {
            Some(previous) => (usable_token(&previous).is_some(), true),
            None => (false, false),
        })
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        let entries = self.load()?;
        Ok(entries
            .iter()
            .filter_map(|(fingerprint, value)| {
                usable_token(value).map(|token| (fingerprint.clone(), token.to_string()))
            })
            .collect())
    }

    fn clear(&self) -> Result<usize> {
        self.modify(|entries| {
            let changed = !entries.is_empty();
            let dropped = entries.values().filter_map(usable_token).count();
            entries.clear();
            (dropped, changed)
        })
    }
}
