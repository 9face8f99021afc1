//! # tokenkeep-proxy
//!
//! Local auth proxy for clients that do not yet hold a token for a request
//! shape.
//!
//! For every call it receives the proxy:
//! - answers `OPTIONS` preflights directly
//! - requires the `app`, `token-key` and `token-path` headers
//! - logs the tenant in with the operator account (once per tenant, with
//!   failures retried after a cool-down)
//! - forwards the call upstream with the tenant's `Authorization`
//! - records any `token` in the upstream response under `token-key` in the
//!   store at `token-path`
//! - relays the upstream response with permissive CORS headers

pub mod config;
pub mod error;
pub mod identity;
pub mod paths;
pub mod server;
pub mod session;

pub use config::{OperatorConfig, ProxyConfig};
pub use error::{ProxyError, Result};
pub use identity::{LoginError, OperatorCredentials};
pub use server::{ProxyState, TenantHeaders, router};
pub use session::{TenantSession, TenantSessions};
