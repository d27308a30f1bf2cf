//! Chat Session Library
//!
//! Establishes and maintains an authenticated session against a cookie-based
//! chat web service: credential login with step-up verification
//! ("checkpoint") handling, saved-session resumption, markup extraction of
//! tokens and script-embedded cookies, and a shared session handle that
//! feature operations bind to.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`auth`] - Cookie store and saved-session persistence
//! - [`transport`] - Redirect-free HTTP exchanges over the cookie store
//! - [`extract`] - Pure markup extraction (tokens, script cookies, endpoint)
//! - [`config`] - Options and service endpoints
//! - [`login`] - The login state machine and checkpoint challenges
//! - [`session`] - The authenticated session and its bound requests
//! - [`logging`] - Log level names, live reconfiguration, record buffer
//!
//! Feature operations (`mark_as_read`, `create_new_group`, ...) are methods on
//! [`Session`].

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod api;
pub mod auth;
pub mod config;
pub mod extract;
pub mod logging;
pub mod login;
pub mod session;
#[cfg(test)]
pub mod test_support;
pub mod transport;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use auth::{
    CookieRecord, CookieStore, ImportedSession, SavedSession, SavedSessionError,
    load_saved_session, store_saved_session,
};
pub use config::{OptionKey, Options, OptionsUpdate, ServiceUrls};
pub use extract::ProtocolEndpoint;
pub use logging::LogLevel;
pub use login::{
    CheckpointChallenge, Credentials, LoginError, LoginFlow, LoginInput, PollOutcome, login,
};
pub use session::{ApiError, ExtractionDegraded, Session};
pub use transport::{Exchange, Form, Transport, TransportError, TransportSettings};
pub use user_agent::DEFAULT_USER_AGENT;
