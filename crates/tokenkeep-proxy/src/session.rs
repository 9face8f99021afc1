//! Per-tenant login state.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use secrecy::SecretString;

/// Login outcome remembered for one tenant.
#[derive(Debug, Clone)]
pub enum TenantSession {
    /// Logged in; holds the full `Authorization` value.
    Authenticated(SecretString),
    /// The last login attempt failed at `at`.
    Failed {
        /// When the attempt failed.
        at: Instant,
    },
}

/// Tenant sessions for the lifetime of the proxy process.
///
/// A tenant absent from the map has never attempted a login. Successful logins
/// are kept until the process exits. Failures are remembered for `retry_after`
/// so a broken tenant does not trigger a login per request.
#[derive(Debug)]
pub struct TenantSessions {
    sessions: DashMap<String, TenantSession>,
    retry_after: Duration,
}

impl TenantSessions {
    /// Creates an empty session table.
    #[must_use]
    pub fn new(retry_after: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            retry_after,
        }
    }

    /// Whether `app` should be logged in before forwarding its request.
    #[must_use]
    pub fn needs_login(&self, app: &str) -> bool {
        match self.sessions.get(app).as_deref() {
            None => true,
            Some(TenantSession::Authenticated(_)) => false,
            Some(TenantSession::Failed { at }) => at.elapsed() >= self.retry_after,
        }
    }

    /// The `Authorization` value for `app`, if logged in.
    #[must_use]
    pub fn credential(&self, app: &str) -> Option<SecretString> {
        match self.sessions.get(app).as_deref() {
            Some(TenantSession::Authenticated(credential)) => Some(credential.clone()),
            _ => None,
        }
    }

    /// Current session for `app`.
    #[must_use]
    pub fn get(&self, app: &str) -> Option<TenantSession> {
        self.sessions.get(app).map(|session| session.clone())
    }

    /// Records a successful login.
    pub fn record_success(&self, app: &str, credential: SecretString) {
        self.sessions
            .insert(app.to_string(), TenantSession::Authenticated(credential));
    }

    /// Records a failed login attempt.
    pub fn record_failure(&self, app: &str) {
        self.sessions.insert(
            app.to_string(),
            TenantSession::Failed { at: Instant::now() },
        );
    }

    /// Number of tenants with a recorded outcome.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no tenant has attempted a login yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
