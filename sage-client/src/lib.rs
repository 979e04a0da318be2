//! Sage Client - conversation session core for a remote question-answering
//! service.
//!
//! This crate mediates between an interactive surface (a chat panel, a TUI, an
//! editor plugin) and the Sage service:
//!
//! - [`session::ChatSession`] keeps a bounded multi-turn context window and
//!   orchestrates each exchange: credential check, speculative history
//!   append, request, commit or rollback.
//! - [`auth::CredentialProvider`] is the seam to credential storage and
//!   issuance; [`auth::HttpCredentialProvider`] is the production wiring.
//! - [`client::AnswerBackend`] is the seam to the chat endpoint itself.
//! - [`format::format_answer`] normalizes raw answer text into display-ready
//!   markdown.
//!
//! Rendering and UI event handling live in the embedding application; this
//! crate only hands it formatted text and [`session::ContextInfo`] snapshots.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod auth;
pub mod client;
pub mod error;
pub mod format;
pub mod session;

pub use auth::{Credential, CredentialProvider, HttpCredentialProvider, Identity};
pub use client::{AnswerBackend, AskRequest, AskResponse, BackendConfig, HttpAnswerBackend};
pub use error::ClientError;
pub use format::format_answer;
pub use session::{ChatSession, ContextInfo, Role, SessionOptions, Turn};
