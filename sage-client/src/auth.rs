//! Credential acquisition and verification.
//!
//! The session never mints credentials itself; it goes through a
//! [`CredentialProvider`]. [`HttpCredentialProvider`] is the production
//! implementation against the service's `/auth/login` and `/auth/verify`
//! endpoints; [`StaticCredentialProvider`] serves embedding tests and
//! offline use.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{detail_from_body, ClientError};
use sage_common::config::ServiceConfig;
use sage_common::util::sanitize_for_log;

/// Bearer credential for the question-answering service.
///
/// Opaque to the session beyond validity checks; it lives in the session's
/// cache until verification fails.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub token_type: String,
}

impl Credential {
    pub fn new(token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_type: token_type.into(),
        }
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

// Token never appears in Debug output; credentials get logged on renewal paths.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"***")
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Login identity. The session uses a configured fallback identity for
/// transparent renewal; interactive login flows pass their own.
#[derive(Clone, Serialize)]
pub struct Identity {
    pub username: String,
    pub password: String,
}

impl Identity {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Issues, verifies, and stores bearer credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Exchange an identity for a fresh credential.
    ///
    /// Either succeeds with a currently-valid credential or fails the whole
    /// operation with [`ClientError::CredentialAcquisition`].
    async fn login(&self, identity: &Identity) -> Result<Credential, ClientError>;

    /// Check whether a credential is still accepted by the service.
    ///
    /// An ordinarily-invalid token (expired, revoked) is `Ok(false)`, never
    /// an error; errors are reserved for the check itself failing.
    async fn verify(&self, credential: &Credential) -> Result<bool, ClientError>;

    /// Most recently issued credential, if any.
    async fn stored(&self) -> Option<Credential>;

    /// Forget the stored credential.
    async fn clear(&self);
}

/// Wire body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Credential provider backed by the service's auth endpoints.
pub struct HttpCredentialProvider {
    http: reqwest::Client,
    base_url: String,
    store: Mutex<Option<Credential>>,
}

impl HttpCredentialProvider {
    /// Create a provider for the given service base URL.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            store: Mutex::new(None),
        })
    }

    /// Create a provider from service configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ClientError> {
        Self::new(config.base_url.clone(), config.timeout_secs)
    }

    fn remember(&self, credential: &Credential) {
        if let Ok(mut store) = self.store.lock() {
            *store = Some(credential.clone());
        }
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn login(&self, identity: &Identity) -> Result<Credential, ClientError> {
        let url = format!("{}/auth/login", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(identity)
            .send()
            .await
            .map_err(|e| ClientError::CredentialAcquisition {
                status: None,
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let details = detail_from_body(status.as_u16(), &body);
            tracing::warn!(
                status = status.as_u16(),
                details = %sanitize_for_log(&details),
                "login rejected"
            );
            return Err(ClientError::CredentialAcquisition {
                status: Some(status.as_u16()),
                details,
            });
        }

        let body: LoginResponse =
            response
                .json()
                .await
                .map_err(|e| ClientError::CredentialAcquisition {
                    status: None,
                    details: format!("malformed login response: {e}"),
                })?;

        let credential = Credential::new(body.access_token, body.token_type);
        self.remember(&credential);
        tracing::debug!(username = %identity.username, "credential issued");
        Ok(credential)
    }

    async fn verify(&self, credential: &Credential) -> Result<bool, ClientError> {
        let url = format!("{}/auth/verify", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, credential.authorization())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Ok(false);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Upstream {
            status: status.as_u16(),
            detail: detail_from_body(status.as_u16(), &body),
        })
    }

    async fn stored(&self) -> Option<Credential> {
        self.store.lock().ok().and_then(|store| store.clone())
    }

    async fn clear(&self) {
        if let Ok(mut store) = self.store.lock() {
            *store = None;
        }
    }
}

/// Provider with a fixed credential, for tests and offline embedding.
///
/// `login` always succeeds with the configured credential; verification
/// outcome is switchable at runtime.
pub struct StaticCredentialProvider {
    credential: Credential,
    valid: std::sync::atomic::AtomicBool,
}

impl StaticCredentialProvider {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            valid: std::sync::atomic::AtomicBool::new(true),
        }
    }

    /// Flip whether `verify` reports the credential as valid.
    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn login(&self, _identity: &Identity) -> Result<Credential, ClientError> {
        self.set_valid(true);
        Ok(self.credential.clone())
    }

    async fn verify(&self, _credential: &Credential) -> Result<bool, ClientError> {
        Ok(self.valid.load(std::sync::atomic::Ordering::SeqCst))
    }

    async fn stored(&self) -> Option<Credential> {
        Some(self.credential.clone())
    }

    async fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_header_value() {
        let credential = Credential::new("abc123", "bearer");
        assert_eq!(credential.authorization(), "Bearer abc123");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credential = Credential::new("super-secret-token", "bearer");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("super-secret-token"));

        let identity = Identity::new("demo", "hunter2");
        let debug = format!("{identity:?}");
        assert!(debug.contains("demo"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_login_response_defaults_token_type() {
        let body: LoginResponse = serde_json::from_str(r#"{"access_token": "t"}"#).unwrap();
        assert_eq!(body.token_type, "bearer");
    }

    #[tokio::test]
    async fn test_static_provider_toggles() {
        let provider = StaticCredentialProvider::new(Credential::new("t", "bearer"));
        let credential = provider.stored().await.unwrap();
        assert!(provider.verify(&credential).await.unwrap());

        provider.set_valid(false);
        assert!(!provider.verify(&credential).await.unwrap());

        // login restores validity
        let identity = Identity::new("demo", "demo-password");
        provider.login(&identity).await.unwrap();
        assert!(provider.verify(&credential).await.unwrap());
    }
}
