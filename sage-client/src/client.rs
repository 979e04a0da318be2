//! HTTP transport for the chat endpoint.
//!
//! [`AnswerBackend`] is the seam the session talks through;
//! [`HttpAnswerBackend`] implements it against `POST <base>/chat/ask`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::Credential;
use crate::error::{detail_from_body, ClientError};
use crate::session::Turn;
use sage_common::config::ServiceConfig;
use sage_common::util::truncate_with_ellipsis;

/// Backend configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Service base URL (default: localhost:8000)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl From<&ServiceConfig> for BackendConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

/// Outbound chat request.
///
/// `conversation_history` is the context window *before* the current
/// question; the question itself is carried separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub session_id: String,
    pub conversation_history: Vec<Turn>,
    pub maintain_context: bool,
}

/// Successful chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

/// Seam to the remote question-answering service.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    /// Send one question with its context window; returns the raw answer.
    async fn ask(
        &self,
        credential: &Credential,
        request: &AskRequest,
    ) -> Result<AskResponse, ClientError>;
}

/// Production backend over HTTP.
pub struct HttpAnswerBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAnswerBackend {
    /// Create a backend with custom configuration.
    pub fn new(config: BackendConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    /// Create a backend from service configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ClientError> {
        Self::new(BackendConfig::from(config))
    }
}

#[async_trait]
impl AnswerBackend for HttpAnswerBackend {
    async fn ask(
        &self,
        credential: &Credential,
        request: &AskRequest,
    ) -> Result<AskResponse, ClientError> {
        let url = format!("{}/chat/ask", self.base_url);
        tracing::debug!(
            session_id = %request.session_id,
            history_len = request.conversation_history.len(),
            maintain_context = request.maintain_context,
            question = %truncate_with_ellipsis(&request.question, 80),
            "sending chat request"
        );

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, credential.authorization())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                detail: detail_from_body(status.as_u16(), &body),
            });
        }

        let body: AskResponse = response.json().await?;
        Ok(body)
    }
}
