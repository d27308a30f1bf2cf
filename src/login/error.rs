//! Errors that end a login attempt.

use thiserror::Error;

use super::checkpoint::CheckpointChallenge;
use crate::transport::TransportError;

/// Why a login call did not produce a session.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The login input was malformed; nothing was sent.
    #[error("invalid login input: {0}")]
    Validation(String),

    /// The service refused the login.
    #[error("login rejected: {reason}")]
    AuthRejected { reason: String },

    /// Step-up verification is required. Not a failure: the challenge can be
    /// resolved with an approval code or by approving from a browser.
    #[error("login approval required")]
    CheckpointPending(Box<CheckpointChallenge>),

    /// The checkpoint was resolved by the other path, or its poll stopped.
    #[error("checkpoint was already resolved")]
    CheckpointAlreadyResolved,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl LoginError {
    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        Self::AuthRejected {
            reason: reason.into(),
        }
    }

    /// Returns the pending challenge, or gives the error back.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged for every variant but
    /// [`LoginError::CheckpointPending`].
    pub fn into_checkpoint(self) -> Result<CheckpointChallenge, Self> {
        match self {
            Self::CheckpointPending(challenge) => Ok(*challenge),
            other => Err(other),
        }
    }
}
