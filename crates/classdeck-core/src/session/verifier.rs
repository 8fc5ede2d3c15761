//! Asynchronous session verification.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};

use crate::auth::{AuthFailure, AuthService};
use crate::session::model::Session;
use crate::session::repository::SessionRepository;
use crate::session::store::{SessionStore, VerifyResolution};

/// Result of a verification pass.
///
/// Always a resolved value; expected failure modes never escape as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The token was confirmed and the session is authenticated.
    Authenticated,
    /// No usable credentials, or the service rejected the token. An
    /// expected lifecycle event; callers redirect quietly.
    Unauthenticated { reason: String },
    /// The service could not be reached. The session fails closed.
    Failed { reason: String },
}

impl VerifyOutcome {
    /// True for the authenticated outcome.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

#[derive(Default)]
struct VerifierState {
    /// Outcome of the verification that already ran this epoch, if any.
    completed: Option<(u64, VerifyOutcome)>,
    /// Receiver shared by callers awaiting an in-flight verification.
    inflight: Option<watch::Receiver<Option<VerifyOutcome>>>,
}

/// Performs the "is my session still valid" check against the
/// authentication service.
///
/// Verification runs at most once per session epoch: concurrent callers
/// share the one in-flight check through a watch channel, and a completed
/// outcome is cached until a sign-out re-arms the verifier by bumping the
/// epoch. A result that arrives after the session moved on (sign-out or a
/// login that won the race) is discarded by the store's epoch guard, and
/// the outcome reported to callers describes the session that won.
///
/// On rejection or service failure the persisted record is purged: a stale
/// token is never retried automatically without user action.
pub struct SessionVerifier {
    store: Arc<SessionStore>,
    auth: Arc<dyn AuthService>,
    repository: Arc<dyn SessionRepository>,
    state: Mutex<VerifierState>,
}

enum Role {
    /// This caller runs the check and broadcasts the outcome.
    Run(watch::Sender<Option<VerifyOutcome>>),
    /// This caller awaits an outcome another caller is producing.
    Wait(watch::Receiver<Option<VerifyOutcome>>),
}

impl SessionVerifier {
    /// Creates a verifier over the given store, service, and storage.
    pub fn new(
        store: Arc<SessionStore>,
        auth: Arc<dyn AuthService>,
        repository: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            store,
            auth,
            repository,
            state: Mutex::new(VerifierState::default()),
        }
    }

    /// Verifies the current session, coalescing concurrent callers.
    pub async fn verify(&self) -> VerifyOutcome {
        let snapshot = self.store.session();
        if snapshot.is_authenticated() {
            // Fast path: nothing to confirm.
            return VerifyOutcome::Authenticated;
        }
        let epoch = snapshot.epoch;

        let role = {
            // The lock is held only across this synchronous block.
            let mut state = self.state.lock().await;
            if let Some((done_epoch, outcome)) = &state.completed {
                if *done_epoch == epoch {
                    return outcome.clone();
                }
                // Stale cache from a previous epoch.
                state.completed = None;
            }
            if let Some(rx) = &state.inflight {
                Role::Wait(rx.clone())
            } else {
                let (tx, rx) = watch::channel(None);
                state.inflight = Some(rx);
                Role::Run(tx)
            }
        };

        match role {
            Role::Wait(mut rx) => {
                loop {
                    let resolved = rx.borrow().clone();
                    if let Some(outcome) = resolved {
                        return outcome;
                    }
                    if rx.changed().await.is_err() {
                        // The running caller was dropped mid-check.
                        return VerifyOutcome::Failed {
                            reason: "verification interrupted".to_string(),
                        };
                    }
                }
            }
            Role::Run(tx) => {
                self.store.begin_verification();
                let outcome = self.run_check(&snapshot, epoch).await;

                let mut state = self.state.lock().await;
                state.completed = Some((epoch, outcome.clone()));
                state.inflight = None;
                drop(state);

                let _ = tx.send(Some(outcome.clone()));
                outcome
            }
        }
    }

    /// Performs one verification pass and writes the result back into the
    /// store (subject to the epoch guard) and storage.
    async fn run_check(&self, snapshot: &Session, epoch: u64) -> VerifyOutcome {
        let Some(token) = snapshot.token.clone() else {
            // No token anywhere: resolve immediately, no network call.
            let reason = "no stored credentials".to_string();
            self.store.resolve_verification(
                epoch,
                VerifyResolution::Rejected {
                    reason: reason.clone(),
                    hard_failure: false,
                },
            );
            return VerifyOutcome::Unauthenticated { reason };
        };

        match self.auth.resolve_identity(&token).await {
            Ok(success) => {
                let applied = self.store.resolve_verification(
                    epoch,
                    VerifyResolution::Confirmed {
                        user: success.user,
                        token: success.token,
                    },
                );
                if !applied {
                    // The session moved on mid-check. A login that won the
                    // race leaves the store authenticated; a sign-out leaves
                    // it empty. Report what the current session is, not what
                    // the stale check concluded.
                    if self.store.session().is_authenticated() {
                        return VerifyOutcome::Authenticated;
                    }
                    return VerifyOutcome::Unauthenticated {
                        reason: "session changed during verification".to_string(),
                    };
                }
                if let Err(err) = self.repository.save(&self.store.persisted_subset()).await {
                    tracing::warn!(error = %err, "failed to persist verified session");
                }
                VerifyOutcome::Authenticated
            }
            Err(failure) => {
                let reason = failure.to_string();
                let hard_failure = failure.is_service_failure();
                let applied = self.store.resolve_verification(
                    epoch,
                    VerifyResolution::Rejected {
                        reason: reason.clone(),
                        hard_failure,
                    },
                );
                if !applied && self.store.session().is_authenticated() {
                    // A login won the race: the rejected token is no longer
                    // the session's, and the fresh persisted record must
                    // survive.
                    return VerifyOutcome::Authenticated;
                }
                // A token the service would not accept must not survive a
                // restart.
                if let Err(err) = self.repository.clear().await {
                    tracing::warn!(error = %err, "failed to purge persisted session");
                }
                match failure {
                    AuthFailure::Service(_) => VerifyOutcome::Failed { reason },
                    _ => VerifyOutcome::Unauthenticated { reason },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthFailure, AuthSuccess, Credentials};
    use crate::error::Result;
    use crate::session::model::{
        AuthToken, PersistedSession, SessionStatus, UserIdentity, UserRole,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    fn identity() -> UserIdentity {
        UserIdentity {
            id: "u-1".to_string(),
            display_name: "Dana Whitcombe".to_string(),
            role: UserRole::Staff,
        }
    }

    /// Auth service double that counts resolve_identity calls.
    struct CountingAuthService {
        calls: AtomicUsize,
        response: std::result::Result<AuthSuccess, AuthFailure>,
    }

    impl CountingAuthService {
        fn confirming() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Ok(AuthSuccess {
                    user: identity(),
                    token: AuthToken::new("tok-confirmed"),
                }),
            }
        }

        fn rejecting(failure: AuthFailure) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Err(failure),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthService for CountingAuthService {
        async fn resolve_identity(
            &self,
            _token: &AuthToken,
        ) -> std::result::Result<AuthSuccess, AuthFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent callers can pile up behind the check.
            tokio::task::yield_now().await;
            self.response.clone()
        }

        async fn login(
            &self,
            _credentials: &Credentials,
        ) -> std::result::Result<AuthSuccess, AuthFailure> {
            unimplemented!("not used in verifier tests")
        }

        async fn logout(&self) -> std::result::Result<(), AuthFailure> {
            Ok(())
        }

        async fn request_password_reset(
            &self,
            _email: &str,
        ) -> std::result::Result<(), AuthFailure> {
            Ok(())
        }

        async fn confirm_password_reset(
            &self,
            _reset_token: &str,
            _new_password: &str,
        ) -> std::result::Result<(), AuthFailure> {
            Ok(())
        }
    }

    /// Auth service double that signals when the check starts and holds the
    /// response until the test releases it.
    struct GatedAuthService {
        started: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Semaphore>,
        response: std::result::Result<AuthSuccess, AuthFailure>,
    }

    #[async_trait]
    impl AuthService for GatedAuthService {
        async fn resolve_identity(
            &self,
            _token: &AuthToken,
        ) -> std::result::Result<AuthSuccess, AuthFailure> {
            self.started.notify_one();
            let _permit = self.release.acquire().await;
            self.response.clone()
        }

        async fn login(
            &self,
            _credentials: &Credentials,
        ) -> std::result::Result<AuthSuccess, AuthFailure> {
            unimplemented!("not used in verifier tests")
        }

        async fn logout(&self) -> std::result::Result<(), AuthFailure> {
            Ok(())
        }

        async fn request_password_reset(
            &self,
            _email: &str,
        ) -> std::result::Result<(), AuthFailure> {
            Ok(())
        }

        async fn confirm_password_reset(
            &self,
            _reset_token: &str,
            _new_password: &str,
        ) -> std::result::Result<(), AuthFailure> {
            Ok(())
        }
    }

    /// In-memory repository double.
    #[derive(Default)]
    struct MemoryRepository {
        record: AsyncMutex<Option<PersistedSession>>,
    }

    #[async_trait]
    impl SessionRepository for MemoryRepository {
        async fn load(&self) -> Result<Option<PersistedSession>> {
            Ok(self.record.lock().await.clone())
        }

        async fn save(&self, session: &PersistedSession) -> Result<()> {
            *self.record.lock().await = Some(session.clone());
            Ok(())
        }

        async fn clear(&self) -> Result<()> {
            *self.record.lock().await = None;
            Ok(())
        }
    }

    fn verifier_with(
        auth: Arc<CountingAuthService>,
    ) -> (Arc<SessionStore>, Arc<MemoryRepository>, Arc<SessionVerifier>) {
        let store = Arc::new(SessionStore::new());
        let repository = Arc::new(MemoryRepository::default());
        let verifier = Arc::new(SessionVerifier::new(
            store.clone(),
            auth.clone(),
            repository.clone(),
        ));
        (store, repository, verifier)
    }

    #[tokio::test]
    async fn test_no_token_resolves_without_network() {
        let auth = Arc::new(CountingAuthService::confirming());
        let (store, _repository, verifier) = verifier_with(auth.clone());

        let outcome = verifier.verify().await;

        assert!(matches!(outcome, VerifyOutcome::Unauthenticated { .. }));
        assert_eq!(auth.call_count(), 0);
        assert_eq!(store.session().status, SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_valid_token_confirms_and_persists() {
        let auth = Arc::new(CountingAuthService::confirming());
        let (store, repository, verifier) = verifier_with(auth.clone());
        store.rehydrate(
            PersistedSession {
                user: Some(identity()),
                token: Some(AuthToken::new("tok-old")),
                is_authenticated: true,
                saved_at: chrono::Utc::now().to_rfc3339(),
            },
            false,
        );

        let outcome = verifier.verify().await;

        assert!(outcome.is_authenticated());
        assert_eq!(auth.call_count(), 1);
        assert!(store.session().is_authenticated());
        let saved = repository.load().await.unwrap().unwrap();
        assert_eq!(saved.token, Some(AuthToken::new("tok-confirmed")));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_check() {
        let auth = Arc::new(CountingAuthService::confirming());
        let (store, _repository, verifier) = verifier_with(auth.clone());
        store.rehydrate(
            PersistedSession {
                user: Some(identity()),
                token: Some(AuthToken::new("tok-old")),
                is_authenticated: true,
                saved_at: chrono::Utc::now().to_rfc3339(),
            },
            false,
        );

        let mut handles = Vec::new();
        for _ in 0..8 {
            let verifier = verifier.clone();
            handles.push(tokio::spawn(async move { verifier.verify().await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_authenticated());
        }

        assert_eq!(auth.call_count(), 1);
    }

    #[tokio::test]
    async fn test_completed_outcome_is_cached_per_epoch() {
        let auth = Arc::new(CountingAuthService::rejecting(AuthFailure::TokenRejected(
            "expired".to_string(),
        )));
        let (store, _repository, verifier) = verifier_with(auth.clone());
        store.rehydrate(
            PersistedSession {
                user: Some(identity()),
                token: Some(AuthToken::new("tok-expired")),
                is_authenticated: true,
                saved_at: chrono::Utc::now().to_rfc3339(),
            },
            false,
        );

        let first = verifier.verify().await;
        let second = verifier.verify().await;

        assert!(matches!(first, VerifyOutcome::Unauthenticated { .. }));
        assert_eq!(first, second);
        // The second call came from the epoch cache, not the service.
        assert_eq!(auth.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rejection_clears_session_and_purges_storage() {
        let auth = Arc::new(CountingAuthService::rejecting(AuthFailure::TokenRejected(
            "expired".to_string(),
        )));
        let (store, repository, verifier) = verifier_with(auth.clone());
        let persisted = PersistedSession {
            user: Some(identity()),
            token: Some(AuthToken::new("tok-expired")),
            is_authenticated: true,
            saved_at: chrono::Utc::now().to_rfc3339(),
        };
        repository.save(&persisted).await.unwrap();
        store.rehydrate(persisted, false);

        let outcome = verifier.verify().await;

        assert!(matches!(outcome, VerifyOutcome::Unauthenticated { .. }));
        let session = store.session();
        assert_eq!(session.status, SessionStatus::Unauthenticated);
        assert!(session.token.is_none());
        assert!(repository.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_service_failure_fails_closed() {
        let auth = Arc::new(CountingAuthService::rejecting(AuthFailure::Service(
            "connection refused".to_string(),
        )));
        let (store, repository, verifier) = verifier_with(auth.clone());
        let persisted = PersistedSession {
            user: Some(identity()),
            token: Some(AuthToken::new("tok-1")),
            is_authenticated: true,
            saved_at: chrono::Utc::now().to_rfc3339(),
        };
        repository.save(&persisted).await.unwrap();
        store.rehydrate(persisted, false);

        let outcome = verifier.verify().await;

        assert!(matches!(outcome, VerifyOutcome::Failed { .. }));
        let session = store.session();
        assert_eq!(session.status, SessionStatus::Error);
        assert!(session.token.is_none());
        assert!(session.last_error.is_some());
        assert!(repository.load().await.unwrap().is_none());
    }

    fn gated_verifier_with(
        response: std::result::Result<AuthSuccess, AuthFailure>,
    ) -> (
        Arc<SessionStore>,
        Arc<MemoryRepository>,
        Arc<SessionVerifier>,
        Arc<tokio::sync::Notify>,
        Arc<tokio::sync::Semaphore>,
    ) {
        let started = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Semaphore::new(0));
        let auth = Arc::new(GatedAuthService {
            started: started.clone(),
            release: release.clone(),
            response,
        });
        let store = Arc::new(SessionStore::new());
        let repository = Arc::new(MemoryRepository::default());
        let verifier = Arc::new(SessionVerifier::new(
            store.clone(),
            auth,
            repository.clone(),
        ));
        (store, repository, verifier, started, release)
    }

    #[tokio::test]
    async fn test_login_during_inflight_rejection_keeps_fresh_session() {
        let (store, repository, verifier, started, release) = gated_verifier_with(Err(
            AuthFailure::TokenRejected("expired".to_string()),
        ));
        store.rehydrate(
            PersistedSession {
                user: Some(identity()),
                token: Some(AuthToken::new("tok-old")),
                is_authenticated: true,
                saved_at: chrono::Utc::now().to_rfc3339(),
            },
            false,
        );

        let task = {
            let verifier = verifier.clone();
            tokio::spawn(async move { verifier.verify().await })
        };
        started.notified().await;

        // A login completes and persists while the check is in flight.
        store.commit_authenticated(identity(), AuthToken::new("tok-login"));
        repository.save(&store.persisted_subset()).await.unwrap();
        release.add_permits(1);

        // The late rejection concerns the old token; the caller learns the
        // session is authenticated and the fresh record is not purged.
        let outcome = task.await.unwrap();
        assert!(outcome.is_authenticated());
        assert!(store.session().is_authenticated());
        let saved = repository.load().await.unwrap().unwrap();
        assert_eq!(saved.token, Some(AuthToken::new("tok-login")));
    }

    #[tokio::test]
    async fn test_login_during_inflight_confirmation_reports_authenticated() {
        let (store, _repository, verifier, started, release) =
            gated_verifier_with(Ok(AuthSuccess {
                user: identity(),
                token: AuthToken::new("tok-confirmed"),
            }));
        store.rehydrate(
            PersistedSession {
                user: Some(identity()),
                token: Some(AuthToken::new("tok-old")),
                is_authenticated: true,
                saved_at: chrono::Utc::now().to_rfc3339(),
            },
            false,
        );

        let task = {
            let verifier = verifier.clone();
            tokio::spawn(async move { verifier.verify().await })
        };
        started.notified().await;

        store.commit_authenticated(identity(), AuthToken::new("tok-login"));
        release.add_permits(1);

        let outcome = task.await.unwrap();
        assert!(outcome.is_authenticated());
        // The login's token stands; the late confirmation did not clobber it.
        assert_eq!(store.session().token, Some(AuthToken::new("tok-login")));
    }

    #[tokio::test]
    async fn test_sign_out_rearms_verification() {
        let auth = Arc::new(CountingAuthService::confirming());
        let (store, _repository, verifier) = verifier_with(auth.clone());
        store.rehydrate(
            PersistedSession {
                user: Some(identity()),
                token: Some(AuthToken::new("tok-old")),
                is_authenticated: true,
                saved_at: chrono::Utc::now().to_rfc3339(),
            },
            false,
        );

        verifier.verify().await;
        assert_eq!(auth.call_count(), 1);

        store.sign_out();
        // Fresh epoch: the cached outcome no longer applies. With no token
        // left this resolves without the network, not from the stale cache.
        let outcome = verifier.verify().await;
        assert!(matches!(outcome, VerifyOutcome::Unauthenticated { .. }));
        assert_eq!(auth.call_count(), 1);
    }
}
