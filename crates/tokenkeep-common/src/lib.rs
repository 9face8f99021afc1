//! # tokenkeep-common
//!
//! Shared building blocks for the tokenkeep client and proxy.
//!
//! This crate provides:
//! - Deterministic request fingerprinting ([`Fingerprint`])
//! - Request option types shared by every call site ([`RequestOptions`], [`HttpMethod`])
//! - The durable fingerprint → token mapping ([`TokenStore`]) with file and
//!   in-memory backends
//! - Header names that make up the client ↔ proxy wire contract ([`headers`])
//!
//! ## Example
//!
//! ```
//! use tokenkeep_common::{Fingerprint, HttpMethod, MemoryTokenStore, RequestOptions, TokenStore};
//!
//! let options = RequestOptions::builder().fields("id,name").build();
//! let fingerprint = Fingerprint::compute(HttpMethod::Get, "/users/42", &options);
//! assert!(fingerprint.as_str().starts_with("get:/users>"));
//!
//! let store = MemoryTokenStore::new("tokens");
//! store.set(fingerprint.as_str(), "abc123").unwrap();
//! assert_eq!(store.get(fingerprint.as_str()).unwrap().as_deref(), Some("abc123"));
//! ```

/// Error types for token store operations.
pub mod error;
/// Request fingerprinting.
pub mod fingerprint;
/// Header names shared by the client and the proxy.
pub mod headers;
/// HTTP method and per-request option types.
pub mod request;
/// Durable fingerprint → token storage.
pub mod store;

pub use error::{Result, StoreError};
pub use fingerprint::{Fingerprint, canonical_path};
pub use request::{HttpMethod, RequestOptions};
pub use store::{
    FileStoreLocator, FileTokenStore, MemoryStoreLocator, MemoryTokenStore, StoreLocator,
    TokenStore,
};
