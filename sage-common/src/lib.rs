//! Sage Common - Shared types and utilities for the Sage conversation client.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Error types and handling utilities
//! - Logging setup
//! - Log-safety helpers used across Sage crates

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;

pub use config::{AuthConfig, Config, ObservabilityConfig, ServiceConfig, SessionConfig};
pub use error::{Error, Result, ResultExt};
pub use logging::init_logging;
