//! In-process backend for tests and embedding.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::TokenStore;
use crate::error::{Result, StoreError};

/// Token store held in memory.
///
/// Clones share the same mapping, so a clone handed to a proxy and one kept
/// by a client observe each other's writes.
#[derive(Debug, Clone)]
pub struct MemoryTokenStore {
    name: String,
    tokens: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryTokenStore {
    /// Creates an empty store reported under `name` as its location.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tokens: Arc::default(),
        }
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::LockPoisoned(e.to_string())
}

impl TokenStore for MemoryTokenStore {
    fn location(&self) -> String {
        self.name.clone()
    }

    fn get(&self, fingerprint: &str) -> Result<Option<String>> {
        let tokens = self.tokens.read().map_err(poisoned)?;
        Ok(tokens.get(fingerprint).cloned())
    }

    fn set(&self, fingerprint: &str, token: &str) -> Result<()> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        if token.is_empty() {
            tokens.remove(fingerprint);
        } else {
            tokens.insert(fingerprint.to_string(), token.to_string());
        }
        Ok(())
    }

    fn remove(&self, fingerprint: &str) -> Result<bool> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        Ok(tokens.remove(fingerprint).is_some())
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.tokens.read().map_err(poisoned)?.clone())
    }

    fn clear(&self) -> Result<usize> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        let dropped = tokens.len();
        tokens.clear();
        Ok(dropped)
    }
}
