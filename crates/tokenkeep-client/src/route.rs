//! Direct-versus-proxied routing decision.

use tokenkeep_common::Fingerprint;

/// Where a request goes and which credentials travel with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// A token is cached: call production directly with it.
    Direct {
        /// Cached bearer token.
        token: String,
    },
    /// Nothing cached: go through the auth proxy, which learns the token.
    Proxied {
        /// Key the proxy stores the issued token under.
        fingerprint: Fingerprint,
        /// Store the proxy writes to.
        store_location: String,
    },
}

impl Route {
    /// Picks the route for a request given what the store holds for it.
    ///
    /// Empty tokens count as absent.
    #[must_use]
    pub fn decide(fingerprint: Fingerprint, cached: Option<String>, store_location: String) -> Self {
        match cached {
            Some(token) if !token.is_empty() => Self::Direct { token },
            _ => Self::Proxied {
                fingerprint,
                store_location,
            },
        }
    }

    /// Whether the request bypasses the proxy.
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        matches!(self, Self::Direct { .. })
    }
}
