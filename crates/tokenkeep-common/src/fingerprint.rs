//! Request fingerprinting.
//!
//! A fingerprint is the cache key under which a learned token is stored. It
//! is derived from everything that changes what the upstream authorizes:
//!
//! - the method
//! - the path, with a trailing record id collapsed onto its collection
//! - the shape options (`fields`, `hidden`, `filter`, `nearby`, joins,
//!   `permissions`, `validation`)
//! - whether the body is an array
//! - the raw query text of `sql` bodies
//!
//! Paging, sorting, search and session values are deliberately left out so
//! that every page of the same query reuses one token.
//!
//! The key text layout and the hash match the FrontQL `Api.ts` client, so a
//! `tokens.json` written for that client stays valid here. The hash is not
//! cryptographic; a collision only costs an extra trip through the proxy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::{HttpMethod, RequestOptions};

/// Seed of the djb2-style accumulator.
const SEED: u32 = 5381;

/// Number of base-62 digits in a fingerprint code.
pub const CODE_LEN: usize = 8;

const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Deterministic cache key for a request, formatted `{method}:{path}>{code}`.
///
/// # Examples
///
/// ```
/// use tokenkeep_common::{Fingerprint, HttpMethod, RequestOptions};
///
/// let a = Fingerprint::compute(HttpMethod::Get, "/users/42", &RequestOptions::default());
/// let b = Fingerprint::compute(HttpMethod::Get, "/users/7", &RequestOptions::default());
///
/// assert_eq!(a, b);
/// assert_eq!(a.code().len(), 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a request.
    #[must_use]
    pub fn compute(method: HttpMethod, path: &str, options: &RequestOptions) -> Self {
        let path = canonical_path(path);
        let code = short_code(&key_text(method, path, options));
        Self(format!("{method}:{path}>{code}"))
    }

    /// Wraps a fingerprint received from elsewhere, such as a `token-key` header.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The full fingerprint string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing base-62 code.
    #[must_use]
    pub fn code(&self) -> &str {
        self.0.rsplit_once('>').map_or(self.0.as_str(), |(_, code)| code)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.0
    }
}

/// Collapses a record path onto its collection.
///
/// The last segment is dropped when the path has more than one segment, so
/// `/users/42` becomes `/users` while `/users` is left alone.
#[must_use]
pub fn canonical_path(path: &str) -> &str {
    if path.matches('/').count() > 1
        && let Some((parent, _)) = path.rsplit_once('/')
    {
        return parent;
    }
    path
}

fn key_text(method: HttpMethod, path: &str, options: &RequestOptions) -> String {
    let shape = [
        ("fields", options.fields.as_deref()),
        ("hidden", options.hidden.as_deref()),
        ("filter", options.filter.as_deref()),
        ("nearby", options.nearby.as_deref()),
        ("collections", options.joins.as_deref()),
        ("permissions", options.permissions.as_deref()),
        ("validation", options.validation.as_deref()),
    ];

    let mut text = String::with_capacity(128);
    text.push_str(method.as_str());
    text.push('>');
    text.push_str(path);

    for (name, value) in shape {
        text.push_str(name);
        text.push(':');
        text.push_str(value.unwrap_or("undefined"));
    }

    text.push_str("body_is_array:");
    text.push_str(if options.body_is_array() { "true" } else { "false" });

    if let Some(sql) = options.raw_sql() {
        text.push_str("sql:");
        text.push_str(&sql);
    }

    text
}

/// Hashes `input` into a [`CODE_LEN`]-character base-62 code.
///
/// A 32-bit djb2-xor accumulator over UTF-16 code units seeds an xorshift
/// generator; each round contributes one digit.
fn short_code(input: &str) -> String {
    let mut x = input
        .encode_utf16()
        .fold(SEED, |acc, unit| (acc << 5).wrapping_add(acc) ^ u32::from(unit));

    (0..CODE_LEN)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            char::from(ALPHABET[(x % 62) as usize])
        })
        .collect()
}
