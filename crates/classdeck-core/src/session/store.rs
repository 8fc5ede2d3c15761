//! The session state machine.

use std::sync::{Mutex, MutexGuard};

use crate::session::model::{
    AuthToken, PersistedSession, Session, SessionStatus, UserIdentity,
};

/// The single source of truth for the authentication session.
///
/// `SessionStore` is created once per process and injected into every
/// consumer. All mutation goes through the transition operations below;
/// each transition is one synchronous read-modify-write under the lock, so
/// no interleaving can observe or act on a half-applied transition and no
/// transition is ever based on a stale snapshot.
///
/// The store itself is storage-free. Callers that commit a transition are
/// responsible for writing the persisted subset through
/// [`SessionRepository`](super::SessionRepository).
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<Session>,
}

impl SessionStore {
    /// Creates a store holding an empty, unauthenticated session.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        // A poisoned lock only means a panic elsewhere; the session data
        // itself is still consistent because every write is a whole-value
        // assignment under the guard.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a snapshot of the current session. Side-effect-free.
    pub fn session(&self) -> Session {
        self.lock().clone()
    }

    /// Returns the current session epoch.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Captures the durable subset of the current session.
    pub fn persisted_subset(&self) -> PersistedSession {
        PersistedSession::from_session(&self.lock())
    }

    /// Transitions to `Verifying`.
    ///
    /// A no-op when already `Verifying` or already `Authenticated` with a
    /// token present, so redundant checks never regress the state. Returns
    /// whether a transition was applied.
    pub fn begin_verification(&self) -> bool {
        let mut session = self.lock();
        match session.status {
            SessionStatus::Verifying => false,
            SessionStatus::Authenticated if session.token.is_some() => false,
            _ => {
                tracing::debug!("session: begin verification");
                session.status = SessionStatus::Verifying;
                true
            }
        }
    }

    /// Commits a confirmed identity: status `Authenticated`, `last_error`
    /// cleared.
    pub fn commit_authenticated(&self, user: UserIdentity, token: AuthToken) {
        let mut session = self.lock();
        tracing::info!(user_id = %user.id, "session: authenticated");
        session.user = Some(user);
        session.token = Some(token);
        session.status = SessionStatus::Authenticated;
        session.last_error = None;
    }

    /// Clears the identity: `Unauthenticated` for expected lifecycle events,
    /// `Error` when `hard_failure` marks an unconfirmable check (fail
    /// closed). The reason is recorded for display.
    pub fn commit_unauthenticated(&self, reason: impl Into<String>, hard_failure: bool) {
        let mut session = self.lock();
        let reason = reason.into();
        tracing::info!(%reason, hard_failure, "session: unauthenticated");
        session.user = None;
        session.token = None;
        session.status = if hard_failure {
            SessionStatus::Error
        } else {
            SessionStatus::Unauthenticated
        };
        session.last_error = Some(reason);
    }

    /// Unconditionally clears to an empty `Unauthenticated` session and
    /// bumps the epoch, re-arming verification and invalidating any
    /// in-flight verification result.
    pub fn sign_out(&self) {
        let mut session = self.lock();
        tracing::info!("session: signed out");
        let epoch = session.epoch + 1;
        *session = Session {
            epoch,
            ..Session::empty()
        };
    }

    /// Installs the persisted subset at process start, before any UI reads.
    ///
    /// With `trust` set the record is committed as `Authenticated` directly;
    /// otherwise the fields are populated but the status stays
    /// `Unauthenticated` until a verification pass confirms them.
    pub fn rehydrate(&self, persisted: PersistedSession, trust: bool) {
        let mut session = self.lock();
        let authenticated =
            persisted.is_authenticated && persisted.user.is_some() && persisted.token.is_some();
        tracing::info!(trusted = trust && authenticated, "session: rehydrated from storage");
        session.user = persisted.user;
        session.token = persisted.token;
        session.status = if trust && authenticated {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unauthenticated
        };
        session.last_error = None;
    }

    /// Applies a verification result, unless the session has moved on.
    ///
    /// The result is discarded (returning false) when the epoch changed or
    /// the session is no longer `Verifying` - e.g. a sign-out or a login
    /// completed while the check was in flight.
    pub(crate) fn resolve_verification(&self, epoch: u64, resolution: VerifyResolution) -> bool {
        let mut session = self.lock();
        if session.epoch != epoch || session.status != SessionStatus::Verifying {
            tracing::debug!("session: discarding late verification result");
            return false;
        }
        match resolution {
            VerifyResolution::Confirmed { user, token } => {
                tracing::info!(user_id = %user.id, "session: verification confirmed");
                session.user = Some(user);
                session.token = Some(token);
                session.status = SessionStatus::Authenticated;
                session.last_error = None;
            }
            VerifyResolution::Rejected { reason, hard_failure } => {
                tracing::info!(%reason, hard_failure, "session: verification rejected");
                session.user = None;
                session.token = None;
                session.status = if hard_failure {
                    SessionStatus::Error
                } else {
                    SessionStatus::Unauthenticated
                };
                session.last_error = Some(reason);
            }
        }
        true
    }
}

/// Outcome of a verification pass, applied atomically by
/// [`SessionStore::resolve_verification`].
pub(crate) enum VerifyResolution {
    Confirmed { user: UserIdentity, token: AuthToken },
    Rejected { reason: String, hard_failure: bool },
}
