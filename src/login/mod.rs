//! Login orchestration.
//!
//! [`login`] turns credentials or a saved session into a [`Session`]. When the
//! service demands step-up verification the call ends with
//! [`LoginError::CheckpointPending`], whose [`CheckpointChallenge`] resolves
//! either with an approval code or by waiting for browser approval.

mod checkpoint;
mod error;
mod flow;
mod form;

use serde_json::{Map, Value};

pub use checkpoint::{CheckpointChallenge, PollOutcome, classify_poll_response};
pub use error::LoginError;
pub use flow::{DEFAULT_POLL_INTERVAL, LoginFlow};
pub use form::{Credentials, LoginInput};

use crate::session::Session;

/// Logs in against the default service origin.
///
/// `options` are applied on top of the defaults first; unrecognized keys and
/// invalid values only produce warnings.
///
/// # Errors
///
/// See [`LoginFlow::login`].
pub async fn login(input: impl Into<LoginInput>, options: &Map<String, Value>) -> Result<Session, LoginError> {
    let (flow, _) = LoginFlow::configured(options);
    flow.login(input.into()).await
}
