//! HTTP client for the authentication service.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use classdeck_core::auth::{AuthFailure, AuthService, AuthSuccess, Credentials};
use classdeck_core::session::{AuthToken, UserIdentity};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Talks to the authentication backend over HTTP.
///
/// Endpoints (relative to the base URL):
/// - `POST /auth/login` - exchange credentials for an identity and token
/// - `GET  /auth/me` - resolve the identity behind a bearer token
/// - `POST /auth/logout` - end the session server-side
/// - `POST /auth/password-reset` - request a reset mail
/// - `POST /auth/password-reset/confirm` - confirm a reset
///
/// Tokens are opaque strings the backend issues; this client only forwards
/// them as `Authorization: Bearer` headers.
#[derive(Clone)]
pub struct HttpAuthClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    user: UserIdentity,
    token: AuthToken,
}

#[derive(Debug, Serialize)]
struct ResetRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct ResetConfirmRequest<'a> {
    token: &'a str,
    new_password: &'a str,
}

impl HttpAuthClient {
    /// Creates a client for the service at the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn parse_identity(
        response: reqwest::Response,
    ) -> Result<AuthSuccess, AuthFailure> {
        let body: IdentityResponse = response
            .json()
            .await
            .map_err(|e| AuthFailure::Service(format!("malformed identity response: {e}")))?;
        Ok(AuthSuccess {
            user: body.user,
            token: body.token,
        })
    }

    async fn failure_detail(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        };
        tracing::warn!(%detail, "authentication service returned a failure");
        detail
    }
}

#[async_trait]
impl AuthService for HttpAuthClient {
    async fn resolve_identity(&self, token: &AuthToken) -> Result<AuthSuccess, AuthFailure> {
        let response = self
            .client
            .get(self.endpoint("/auth/me"))
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| AuthFailure::Service(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Self::parse_identity(response).await,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthFailure::TokenRejected(Self::failure_detail(response).await))
            }
            _ => Err(AuthFailure::Service(Self::failure_detail(response).await)),
        }
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthSuccess, AuthFailure> {
        let response = self
            .client
            .post(self.endpoint("/auth/login"))
            .json(credentials)
            .send()
            .await
            .map_err(|e| AuthFailure::Service(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Self::parse_identity(response).await,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthFailure::InvalidCredentials)
            }
            _ => Err(AuthFailure::Service(Self::failure_detail(response).await)),
        }
    }

    async fn logout(&self) -> Result<(), AuthFailure> {
        let response = self
            .client
            .post(self.endpoint("/auth/logout"))
            .send()
            .await
            .map_err(|e| AuthFailure::Service(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AuthFailure::Service(Self::failure_detail(response).await))
        }
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthFailure> {
        let response = self
            .client
            .post(self.endpoint("/auth/password-reset"))
            .json(&ResetRequest { email })
            .send()
            .await
            .map_err(|e| AuthFailure::Service(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status if status.is_client_error() => {
                Err(AuthFailure::ResetRejected(Self::failure_detail(response).await))
            }
            _ => Err(AuthFailure::Service(Self::failure_detail(response).await)),
        }
    }

    async fn confirm_password_reset(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), AuthFailure> {
        let response = self
            .client
            .post(self.endpoint("/auth/password-reset/confirm"))
            .json(&ResetConfirmRequest {
                token: reset_token,
                new_password,
            })
            .send()
            .await
            .map_err(|e| AuthFailure::Service(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status if status.is_client_error() => {
                Err(AuthFailure::ResetRejected(Self::failure_detail(response).await))
            }
            _ => Err(AuthFailure::Service(Self::failure_detail(response).await)),
        }
    }
}
