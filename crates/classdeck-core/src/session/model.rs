//! Session domain models.
//!
//! The core `Session` entity describes whether, and as whom, the current
//! user is authenticated, plus the durable subset (`PersistedSession`) that
//! survives process restarts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the session currently stands in its authentication lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No authenticated identity. The initial state.
    #[default]
    Unauthenticated,
    /// A verification against the authentication service is in flight.
    /// Always transient; resolves to one of the other three states.
    Verifying,
    /// Both an identity and a token are present and confirmed.
    Authenticated,
    /// A hard failure (e.g. the service was unreachable) cleared the
    /// session; `last_error` carries the reason.
    Error,
}

/// Role of an authenticated user, as issued by the authentication service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Teacher,
    Staff,
}

/// The authenticated identity record.
///
/// All fields are opaque to this layer; they come from the authentication
/// service and are only carried for display and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable user identifier assigned by the backend
    pub id: String,
    /// Human-readable name for display
    pub display_name: String,
    /// Role the backend granted this user
    pub role: UserRole,
}

/// An opaque credential string issued by the authentication service.
///
/// The client never constructs token values itself; it only carries what the
/// service issued or what rehydration read back from storage. `Debug` output
/// is redacted so tokens never leak into logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wraps a token value received from the authentication service.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw token value, for placing into an Authorization header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// The in-memory authentication session.
///
/// Invariant: `status == Authenticated` holds exactly when both `user` and
/// `token` are present. Mutated only through
/// [`SessionStore`](super::SessionStore) transition operations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    /// Authenticated identity, if any
    pub user: Option<UserIdentity>,
    /// Credential issued by the authentication service, if any
    pub token: Option<AuthToken>,
    /// Current lifecycle state
    pub status: SessionStatus,
    /// Human-readable reason for the last failure, if any
    pub last_error: Option<String>,
    /// Session generation, bumped on sign-out. Used to discard verification
    /// results that resolve after the session has moved on.
    pub epoch: u64,
}

impl Session {
    /// Creates an empty, unauthenticated session.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true when the session is fully authenticated (status and
    /// fields agree).
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated && self.user.is_some() && self.token.is_some()
    }
}

/// The durable subset of a session.
///
/// This is the only shape that touches storage. Status beyond
/// `is_authenticated` is re-derived on rehydration, never persisted.
/// Absence of the stored record is equivalent to an empty session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub user: Option<UserIdentity>,
    pub token: Option<AuthToken>,
    pub is_authenticated: bool,
    /// When this record was written (ISO 8601 format)
    pub saved_at: String,
}

impl PersistedSession {
    /// Captures the durable subset of the given session.
    pub fn from_session(session: &Session) -> Self {
        Self {
            user: session.user.clone(),
            token: session.token.clone(),
            is_authenticated: session.is_authenticated(),
            saved_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
