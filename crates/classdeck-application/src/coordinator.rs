//! Session coordination facade.

use std::sync::Arc;

use classdeck_core::auth::{AuthFailure, AuthService, Credentials};
use classdeck_core::config::CoordinatorConfig;
use classdeck_core::error::Result;
use classdeck_core::fetch::RequestCoalescer;
use classdeck_core::session::{
    Session, SessionRepository, SessionStore, SessionVerifier, UserIdentity,
};
use classdeck_core::view::{AccessGate, Navigator, ViewKind};
use classdeck_infrastructure::JsonFileSessionRepository;

/// Result of a login attempt.
///
/// The redirect decision rides on the outcome itself: when the commit is
/// observed the caller navigates immediately, with no settle-timers or
/// polling for state propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The session is committed and persisted; navigate to `redirect_to`.
    SignedIn {
        user: UserIdentity,
        redirect_to: ViewKind,
    },
    /// Wrong username or password. Reported inline; the session is
    /// unchanged and nothing was persisted.
    InvalidCredentials,
    /// The service could not complete the login.
    Failed { reason: String },
}

/// Wires the session store, verifier, storage, and coalescer behind one
/// facade.
///
/// Created once per process. The store and the coalescer's record table are
/// the process-wide shared state; everything else consults them.
pub struct SessionCoordinator {
    config: CoordinatorConfig,
    store: Arc<SessionStore>,
    repository: Arc<dyn SessionRepository>,
    auth: Arc<dyn AuthService>,
    verifier: Arc<SessionVerifier>,
    coalescer: Arc<RequestCoalescer>,
}

impl SessionCoordinator {
    /// Creates the coordinator and its owned store, verifier, and coalescer.
    pub fn new(
        config: CoordinatorConfig,
        repository: Arc<dyn SessionRepository>,
        auth: Arc<dyn AuthService>,
    ) -> Self {
        let store = Arc::new(SessionStore::new());
        let verifier = Arc::new(SessionVerifier::new(
            store.clone(),
            auth.clone(),
            repository.clone(),
        ));
        let coalescer = Arc::new(RequestCoalescer::new(config.debounce_window()));
        Self {
            config,
            store,
            repository,
            auth,
            verifier,
            coalescer,
        }
    }

    /// Creates a coordinator over the default on-disk storage location
    /// (~/.classdeck).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created.
    pub fn with_default_storage(
        config: CoordinatorConfig,
        auth: Arc<dyn AuthService>,
    ) -> Result<Self> {
        let repository = Arc::new(
            JsonFileSessionRepository::default_location()
                .map_err(classdeck_core::ClassdeckError::from)?,
        );
        Ok(Self::new(config, repository, auth))
    }

    /// Rehydrates the session from durable storage.
    ///
    /// Must run before any UI renders, so the very first read reflects the
    /// last known session without waiting on the network. Whether the
    /// rehydrated record is trusted as authenticated immediately is the
    /// `trust_rehydrated_session` policy flag; untrusted records are
    /// confirmed by the first gate-triggered verification.
    pub async fn start(&self) -> Result<()> {
        match self.repository.load().await? {
            Some(persisted) => {
                self.store
                    .rehydrate(persisted, self.config.trust_rehydrated_session);
            }
            None => {
                tracing::debug!("no persisted session; starting empty");
            }
        }
        Ok(())
    }

    /// Attempts a login with the given credentials.
    pub async fn login(&self, username: &str, password: &str) -> LoginOutcome {
        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.auth.login(&credentials).await {
            Ok(success) => {
                self.store
                    .commit_authenticated(success.user.clone(), success.token);
                if let Err(err) = self.repository.save(&self.store.persisted_subset()).await {
                    tracing::warn!(error = %err, "failed to persist session after login");
                }
                LoginOutcome::SignedIn {
                    user: success.user,
                    redirect_to: ViewKind::Dashboard,
                }
            }
            Err(AuthFailure::InvalidCredentials) => LoginOutcome::InvalidCredentials,
            Err(failure) => LoginOutcome::Failed {
                reason: failure.to_string(),
            },
        }
    }

    /// Signs out: clears the session and the persisted record, and notifies
    /// the service best-effort.
    pub async fn sign_out(&self) {
        self.store.sign_out();
        if let Err(err) = self.repository.clear().await {
            tracing::warn!(error = %err, "failed to clear persisted session");
        }
        if let Err(err) = self.auth.logout().await {
            tracing::debug!(error = %err, "logout notification failed");
        }
    }

    /// Requests a password reset mail. Reported inline.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> std::result::Result<(), AuthFailure> {
        self.auth.request_password_reset(email).await
    }

    /// Confirms a password reset. Reported inline.
    pub async fn confirm_password_reset(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> std::result::Result<(), AuthFailure> {
        self.auth.confirm_password_reset(reset_token, new_password).await
    }

    /// A snapshot of the current session.
    pub fn session(&self) -> Session {
        self.store.session()
    }

    /// The process-wide session store.
    pub fn store(&self) -> Arc<SessionStore> {
        self.store.clone()
    }

    /// The process-wide request coalescer.
    pub fn coalescer(&self) -> Arc<RequestCoalescer> {
        self.coalescer.clone()
    }

    /// Creates the access gate for one protected-view mount.
    pub fn protected_gate(&self, navigator: Arc<dyn Navigator>) -> AccessGate {
        AccessGate::new(self.store.clone(), self.verifier.clone(), navigator)
    }
}
