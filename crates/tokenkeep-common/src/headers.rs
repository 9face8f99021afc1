//! Header names shared by the client and the proxy.
//!
//! These are the FrontQL wire names; both sides must agree on them exactly.

/// Tenant identifier.
pub const APP: &str = "app";

/// Cached bearer token on direct calls.
pub const TOKEN: &str = "token";

/// Fingerprint the proxy should record a learned token under.
pub const TOKEN_KEY: &str = "token-key";

/// Location of the token store the proxy should write to.
pub const TOKEN_PATH: &str = "token-path";

/// Session value forwarded untouched to the upstream.
pub const SESSION: &str = "session";

/// Shape-affecting option headers, in the order the client emits them.
pub const HIDDEN: &str = "hidden";
pub const FILTER: &str = "filter";
pub const FIELDS: &str = "fields";
pub const NEARBY: &str = "nearby";
pub const COLLECTIONS: &str = "collections";
pub const VALIDATION: &str = "validation";
pub const PERMISSIONS: &str = "permissions";
