//! Conversation session management.
//!
//! A [`ChatSession`] owns a bounded context window of [`Turn`]s and a session
//! identifier, and orchestrates each exchange with the service: make sure a
//! valid credential is cached (renewing through the provider's fallback
//! identity when verification fails), speculatively append the user turn,
//! send, then either commit the assistant turn or roll the user turn back.
//!
//! One send at a time per session: `send_message` takes `&mut self`, so the
//! borrow checker enforces the serialization the append/rollback protocol
//! relies on. Dropping an in-flight `send_message` future cancels the
//! exchange and performs the same rollback as a failed send.

pub mod types;

pub use types::{ContextInfo, Role, Turn};

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::{Credential, CredentialProvider, Identity};
use crate::client::{AnswerBackend, AskRequest};
use crate::error::ClientError;
use crate::format::format_answer;
use sage_common::config::Config;
use sage_common::util::{sanitize_for_log, truncate_with_ellipsis};

/// Default bound on the context window, counting both roles' turns.
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// Session construction options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Maximum turns retained in the window; oldest are discarded first.
    pub max_history: usize,
    /// Identity used for transparent credential renewal.
    pub fallback_identity: Identity,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            fallback_identity: Identity::new("demo", "demo-password"),
        }
    }
}

impl SessionOptions {
    /// Derive options from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_history: config.session.max_history,
            fallback_identity: Identity::new(
                config.auth.fallback_username.clone(),
                config.auth.fallback_password.clone(),
            ),
        }
    }
}

/// A bounded, identified conversation carried across message exchanges.
pub struct ChatSession {
    provider: Arc<dyn CredentialProvider>,
    backend: Arc<dyn AnswerBackend>,
    session_id: String,
    history: Vec<Turn>,
    max_history: usize,
    fallback_identity: Identity,
    credential: Option<Credential>,
}

impl ChatSession {
    /// Create a session with a fresh identifier and empty history.
    pub fn new(
        provider: Arc<dyn CredentialProvider>,
        backend: Arc<dyn AnswerBackend>,
        options: SessionOptions,
    ) -> Self {
        Self {
            provider,
            backend,
            session_id: Uuid::new_v4().to_string(),
            history: Vec::new(),
            max_history: options.max_history,
            fallback_identity: options.fallback_identity,
            credential: None,
        }
    }

    /// Current session identifier.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The turns currently in the context window.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Send one user message and return the formatted answer.
    ///
    /// On failure the window is exactly what it was before the call: a
    /// credential failure happens before any append, and a transport or
    /// upstream failure rolls the speculative user turn back. Errors are
    /// surfaced unchanged; only credential renewal is handled internally.
    pub async fn send_message(&mut self, text: &str) -> Result<String, ClientError> {
        let credential = self.ensure_valid_credential().await?;

        self.history.push(Turn::user(text));
        let request = AskRequest {
            question: text.to_string(),
            session_id: self.session_id.clone(),
            // The window as it stood before this question; the question
            // itself rides in its own field.
            conversation_history: self.history[..self.history.len() - 1].to_vec(),
            maintain_context: self.history.len() > 1,
        };

        let backend = Arc::clone(&self.backend);
        let mut guard = RollbackGuard::new(&mut self.history);
        let response = match backend.ask(&credential, &request).await {
            Ok(response) => {
                guard.commit();
                drop(guard);
                response
            }
            Err(err) => {
                drop(guard);
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %sanitize_for_log(&err.to_string()),
                    "chat request failed, pending turn rolled back"
                );
                return Err(err);
            }
        };

        // History keeps the raw answer; formatting is a display-time
        // transform.
        let formatted = format_answer(&response.answer);
        self.history.push(Turn::assistant(response.answer));
        self.trim_window();

        tracing::debug!(
            session_id = %self.session_id,
            history_len = self.history.len(),
            answer = %truncate_with_ellipsis(&formatted, 80),
            "exchange committed"
        );
        Ok(formatted)
    }

    /// Discard the conversation and start a fresh window under a new
    /// session identifier. No network traffic; safe to call repeatedly.
    pub fn clear_context(&mut self) {
        self.session_id = Uuid::new_v4().to_string();
        self.history.clear();
        tracing::debug!(session_id = %self.session_id, "context cleared");
    }

    /// Snapshot of the current context state.
    pub fn context_info(&self) -> ContextInfo {
        ContextInfo {
            session_id: self.session_id.clone(),
            message_count: self.history.len(),
            has_context: !self.history.is_empty(),
        }
    }

    /// Return a credential that passed verification just now, renewing
    /// through the fallback identity when the cached one is stale.
    ///
    /// Exactly one login attempt; its failure fails the whole operation.
    async fn ensure_valid_credential(&mut self) -> Result<Credential, ClientError> {
        if let Some(credential) = &self.credential {
            // A verification transport error counts as "not valid" and
            // falls through to renewal.
            if self.provider.verify(credential).await.unwrap_or(false) {
                return Ok(credential.clone());
            }
            tracing::debug!(
                session_id = %self.session_id,
                "cached credential no longer valid, renewing"
            );
        }

        let credential = self.provider.login(&self.fallback_identity).await?;
        self.credential = Some(credential.clone());
        Ok(credential)
    }

    fn trim_window(&mut self) {
        if self.history.len() > self.max_history {
            let overflow = self.history.len() - self.max_history;
            self.history.drain(..overflow);
        }
    }
}

/// Rolls back the speculative user turn unless the exchange committed.
///
/// Lives across the network await so that a dropped (cancelled) send
/// restores the window exactly like a failed one.
struct RollbackGuard<'a> {
    history: &'a mut Vec<Turn>,
    committed: bool,
}

impl<'a> RollbackGuard<'a> {
    fn new(history: &'a mut Vec<Turn>) -> Self {
        Self {
            history,
            committed: false,
        }
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        // Only the tail user turn of this very send; anything else means
        // the window was already consistent.
        if self.history.last().is_some_and(|t| t.role == Role::User) {
            self.history.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AskResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // ── Test doubles ─────────────────────────────────────────────────

    enum VerifyOutcome {
        Valid,
        Invalid,
        Error,
    }

    /// Credential provider with a scripted verification sequence.
    /// An exhausted script verifies as valid.
    #[derive(Default)]
    struct ScriptedProvider {
        verify_script: Mutex<VecDeque<VerifyOutcome>>,
        login_count: AtomicUsize,
        reject_login: bool,
    }

    impl ScriptedProvider {
        fn with_verify_script(outcomes: Vec<VerifyOutcome>) -> Self {
            Self {
                verify_script: Mutex::new(outcomes.into()),
                ..Self::default()
            }
        }

        fn rejecting_login() -> Self {
            Self {
                reject_login: true,
                ..Self::default()
            }
        }

        fn login_count(&self) -> usize {
            self.login_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialProvider for ScriptedProvider {
        async fn login(&self, _identity: &Identity) -> Result<Credential, ClientError> {
            if self.reject_login {
                return Err(ClientError::CredentialAcquisition {
                    status: Some(401),
                    details: "Incorrect username or password".into(),
                });
            }
            let n = self.login_count.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Credential::new(format!("token-{n}"), "bearer"))
        }

        async fn verify(&self, _credential: &Credential) -> Result<bool, ClientError> {
            match self.verify_script.lock().unwrap().pop_front() {
                Some(VerifyOutcome::Valid) | None => Ok(true),
                Some(VerifyOutcome::Invalid) => Ok(false),
                Some(VerifyOutcome::Error) => Err(ClientError::Upstream {
                    status: 500,
                    detail: "verification unavailable".into(),
                }),
            }
        }

        async fn stored(&self) -> Option<Credential> {
            None
        }

        async fn clear(&self) {}
    }

    /// Backend answering from a scripted queue, recording every request.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, ClientError>>>,
        requests: Mutex<Vec<AskRequest>>,
    }

    impl ScriptedBackend {
        fn with_replies(replies: Vec<Result<String, ClientError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn answering_n(n: usize) -> Self {
            Self::with_replies((1..=n).map(|i| Ok(format!("a{i}"))).collect())
        }

        fn requests(&self) -> Vec<AskRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnswerBackend for ScriptedBackend {
        async fn ask(
            &self,
            _credential: &Credential,
            request: &AskRequest,
        ) -> Result<AskResponse, ClientError> {
            self.requests.lock().unwrap().push(request.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("backend received more requests than scripted");
            reply.map(|answer| AskResponse { answer })
        }
    }

    /// Backend whose requests never complete.
    struct HangingBackend;

    #[async_trait]
    impl AnswerBackend for HangingBackend {
        async fn ask(
            &self,
            _credential: &Credential,
            _request: &AskRequest,
        ) -> Result<AskResponse, ClientError> {
            std::future::pending().await
        }
    }

    fn session_with(
        provider: Arc<ScriptedProvider>,
        backend: Arc<ScriptedBackend>,
    ) -> ChatSession {
        ChatSession::new(provider, backend, SessionOptions::default())
    }

    // ── Sending ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn first_send_acquires_credential_and_commits() {
        let provider = Arc::new(ScriptedProvider::default());
        let backend = Arc::new(ScriptedBackend::answering_n(1));
        let mut session = session_with(Arc::clone(&provider), Arc::clone(&backend));

        let answer = session.send_message("q1").await.unwrap();
        assert_eq!(answer, "a1");
        assert_eq!(provider.login_count(), 1);

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "q1");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "a1");
    }

    #[tokio::test]
    async fn payload_excludes_current_question_from_history() {
        let provider = Arc::new(ScriptedProvider::default());
        let backend = Arc::new(ScriptedBackend::answering_n(2));
        let mut session = session_with(provider, Arc::clone(&backend));

        session.send_message("q1").await.unwrap();
        session.send_message("q2").await.unwrap();

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);

        assert_eq!(requests[0].question, "q1");
        assert!(requests[0].conversation_history.is_empty());
        assert!(!requests[0].maintain_context);

        assert_eq!(requests[1].question, "q2");
        assert_eq!(requests[1].conversation_history.len(), 2);
        assert_eq!(requests[1].conversation_history[1].role, Role::Assistant);
        assert!(requests[1].maintain_context);
        assert_eq!(requests[1].session_id, session.session_id());
    }

    #[tokio::test]
    async fn failed_send_restores_history() {
        let provider = Arc::new(ScriptedProvider::default());
        let backend = Arc::new(ScriptedBackend::with_replies(vec![
            Ok("a1".into()),
            Err(ClientError::Upstream {
                status: 503,
                detail: "overloaded".into(),
            }),
        ]));
        let mut session = session_with(provider, backend);

        session.send_message("q1").await.unwrap();
        let before: Vec<String> = session.history().iter().map(|t| t.content.clone()).collect();

        let err = session.send_message("q2").await.unwrap_err();
        assert_eq!(err.status(), Some(503));

        let after: Vec<String> = session.history().iter().map(|t| t.content.clone()).collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn rejected_login_aborts_before_history_mutation() {
        let provider = Arc::new(ScriptedProvider::rejecting_login());
        let backend = Arc::new(ScriptedBackend::default());
        let mut session = session_with(provider, Arc::clone(&backend));

        let err = session.send_message("q1").await.unwrap_err();
        assert!(err.is_credential());
        assert!(session.history().is_empty());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn answer_is_formatted_but_stored_raw() {
        let raw = "Benefits: - work • life balance - remote options";
        let provider = Arc::new(ScriptedProvider::default());
        let backend = Arc::new(ScriptedBackend::with_replies(vec![Ok(raw.into())]));
        let mut session = session_with(provider, backend);

        let formatted = session.send_message("any perks?").await.unwrap();
        assert_eq!(
            formatted,
            "**Benefits:**\n\n- work-life balance\n- remote options"
        );
        assert_eq!(session.history()[1].content, raw);
    }

    // ── Credential renewal ───────────────────────────────────────────

    #[tokio::test]
    async fn expired_credential_renewed_transparently() {
        // First three exchanges succeed, then the cached credential expires.
        let provider = Arc::new(ScriptedProvider::with_verify_script(vec![
            VerifyOutcome::Valid,
            VerifyOutcome::Valid,
            VerifyOutcome::Invalid,
        ]));
        let backend = Arc::new(ScriptedBackend::answering_n(4));
        let mut session = session_with(Arc::clone(&provider), backend);

        for i in 1..=4 {
            session.send_message(&format!("q{i}")).await.unwrap();
        }

        assert_eq!(provider.login_count(), 2); // initial + renewal
        assert_eq!(session.history().len(), 8);
        assert_eq!(session.history()[7].content, "a4");
    }

    #[tokio::test]
    async fn verification_error_falls_back_to_login() {
        let provider = Arc::new(ScriptedProvider::with_verify_script(vec![
            VerifyOutcome::Error,
        ]));
        let backend = Arc::new(ScriptedBackend::answering_n(2));
        let mut session = session_with(Arc::clone(&provider), backend);

        session.send_message("q1").await.unwrap();
        session.send_message("q2").await.unwrap();

        assert_eq!(provider.login_count(), 2);
        assert_eq!(session.history().len(), 4);
    }

    // ── Context window ───────────────────────────────────────────────

    #[tokio::test]
    async fn window_stays_bounded_and_drops_oldest() {
        let provider = Arc::new(ScriptedProvider::default());
        let backend = Arc::new(ScriptedBackend::answering_n(11));
        let mut session = session_with(provider, backend);

        for i in 1..=11 {
            session.send_message(&format!("q{i}")).await.unwrap();
            assert!(session.history().len() <= DEFAULT_MAX_HISTORY);
        }

        let history = session.history();
        assert_eq!(history.len(), DEFAULT_MAX_HISTORY);
        assert_eq!(history[0].content, "q7"); // q1 long gone
        assert_eq!(history[8].content, "q11");
        assert_eq!(history[9].content, "a11");
        assert_eq!(history[9].role, Role::Assistant);
    }

    #[tokio::test]
    async fn clear_context_starts_a_fresh_window() {
        let provider = Arc::new(ScriptedProvider::default());
        let backend = Arc::new(ScriptedBackend::answering_n(2));
        let mut session = session_with(provider, Arc::clone(&backend));

        session.send_message("q1").await.unwrap();
        let before = session.context_info();
        assert_eq!(before.message_count, 2);
        assert!(before.has_context);

        session.clear_context();
        let after = session.context_info();
        assert_ne!(before.session_id, after.session_id);
        assert_eq!(after.message_count, 0);
        assert!(!after.has_context);

        // Repeated clears are harmless.
        session.clear_context();
        assert_eq!(session.context_info().message_count, 0);

        session.send_message("q2").await.unwrap();
        let requests = backend.requests();
        assert!(!requests[1].maintain_context);
        assert!(requests[1].conversation_history.is_empty());
        assert_eq!(requests[1].session_id, session.session_id());
    }

    #[test]
    fn options_follow_config() {
        let mut config = Config::default();
        config.session.max_history = 4;
        config.auth.fallback_username = "ops".into();
        let options = SessionOptions::from_config(&config);
        assert_eq!(options.max_history, 4);
        assert_eq!(options.fallback_identity.username, "ops");
    }

    // ── Cancellation ─────────────────────────────────────────────────

    #[test]
    fn dropped_in_flight_send_rolls_back() {
        let provider = Arc::new(ScriptedProvider::default());
        let backend = Arc::new(HangingBackend);
        let mut session = ChatSession::new(provider, backend, SessionOptions::default());

        {
            let mut send = tokio_test::task::spawn(session.send_message("q1"));
            assert!(send.poll().is_pending());
        }

        assert!(session.history().is_empty());
        assert_eq!(session.context_info().message_count, 0);
    }
}
