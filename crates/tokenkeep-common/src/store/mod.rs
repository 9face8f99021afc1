//! Durable fingerprint → token storage.
//!
//! Every client process reads the store and the proxy writes it, so
//! implementations must not cache tokens between calls: each `get` goes back
//! to the backing medium and observes whatever the proxy last persisted.
//!
//! There is no expiry. Tokens live until they are overwritten by a reissue or
//! removed by hand ([`TokenStore::remove`], [`TokenStore::clear`]).
//!
//! ## Backends
//!
//! | Backend | Medium | Use |
//! |---------|--------|-----|
//! | [`FileTokenStore`] | flat JSON object on disk | production, shared across processes |
//! | [`MemoryTokenStore`] | in-process map | tests |

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;

mod file;
mod locator;
mod memory;

pub use file::FileTokenStore;
pub use locator::{FileStoreLocator, MemoryStoreLocator, StoreLocator};
pub use memory::MemoryTokenStore;

/// Shared mapping from request fingerprint to bearer token.
///
/// Methods are synchronous; async callers should run them on the blocking
/// thread pool.
pub trait TokenStore: Send + Sync + fmt::Debug {
    /// Where the store lives, in the form a client sends as `token-path`.
    fn location(&self) -> String;

    /// Looks up the token for a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn get(&self, fingerprint: &str) -> Result<Option<String>>;

    /// Records a token, replacing any previous one for the fingerprint.
    ///
    /// An empty token is not a token: it invalidates the fingerprint exactly
    /// like [`remove`](Self::remove).
    ///
    /// # Errors
    ///
    /// Returns an error if the updated mapping cannot be persisted.
    fn set(&self, fingerprint: &str, token: &str) -> Result<()>;

    /// Invalidates one fingerprint. Returns whether a usable token was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated mapping cannot be persisted.
    fn remove(&self, fingerprint: &str) -> Result<bool>;

    /// All usable tokens, ordered by fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn entries(&self) -> Result<BTreeMap<String, String>>;

    /// Invalidates every fingerprint. Returns how many usable tokens were
    /// dropped; placeholders are discarded without being counted.
    ///
    /// # Errors
    ///
    /// Returns an error if the emptied mapping cannot be persisted.
    fn clear(&self) -> Result<usize>;
}

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn location(&self) -> String {
        (**self).location()
    }

    fn get(&self, fingerprint: &str) -> Result<Option<String>> {
        (**self).get(fingerprint)
    }

    fn set(&self, fingerprint: &str, token: &str) -> Result<()> {
        (**self).set(fingerprint, token)
    }

    fn remove(&self, fingerprint: &str) -> Result<bool> {
        (**self).remove(fingerprint)
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        (**self).entries()
    }

    fn clear(&self) -> Result<usize> {
        (**self).clear()
    }
}

/// A stored value counts as a token only if it is a non-empty string.
///
/// Older store files use `false` and `""` as placeholders for "not learned yet".
pub(crate) fn usable_token(value: &Value) -> Option<&str> {
    value.as_str().filter(|token| !token.is_empty())
}
