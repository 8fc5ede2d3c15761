//! Contract with the external authentication service.
//!
//! The coordination layer treats the service as an opaque collaborator: it
//! only depends on the shapes below and on failures being distinguishable
//! from success. Token issuance and verification are owned entirely by the
//! service; the client never constructs token values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{AuthToken, UserIdentity};

/// A successfully resolved identity: who the user is and the credential
/// that proves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSuccess {
    pub user: UserIdentity,
    pub token: AuthToken,
}

/// Login credentials as entered in the sign-in form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Expected failure modes of the authentication service.
///
/// These are resolved values, not exceptions: callers must handle each mode
/// explicitly. `Service` covers network errors and server-side faults where
/// the check could not be completed at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// The submitted username/password pair was wrong.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The presented token is expired or otherwise not accepted.
    #[error("token rejected: {0}")]
    TokenRejected(String),

    /// The password reset request or confirmation was not accepted.
    #[error("password reset rejected: {0}")]
    ResetRejected(String),

    /// The service could not be reached or failed internally.
    #[error("authentication service failure: {0}")]
    Service(String),
}

impl AuthFailure {
    /// True when the failure means "could not confirm" rather than a
    /// definitive rejection. The session layer fails closed on these but
    /// records them as hard failures.
    pub fn is_service_failure(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

/// The external authentication service.
///
/// Implemented over HTTP in the infrastructure crate and by in-test doubles.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Resolves the identity behind a previously issued token.
    async fn resolve_identity(&self, token: &AuthToken) -> Result<AuthSuccess, AuthFailure>;

    /// Exchanges credentials for an identity and a fresh token.
    async fn login(&self, credentials: &Credentials) -> Result<AuthSuccess, AuthFailure>;

    /// Notifies the service that the current session ended. Best-effort.
    async fn logout(&self) -> Result<(), AuthFailure>;

    /// Requests a password reset mail for the given address.
    async fn request_password_reset(&self, email: &str) -> Result<(), AuthFailure>;

    /// Confirms a password reset with the token from the reset mail.
    async fn confirm_password_reset(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), AuthFailure>;
}
