//! Login input and the credential submission form.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::warn;

use super::error::LoginError;
use crate::auth::SavedSession;
use crate::extract::{between, scrape_form_inputs};
use crate::transport::Form;

/// Screen geometry reported with the credentials.
const LOGIN_SCREEN_GEOMETRY: &str = r#"{"w":1440,"h":900,"aw":1440,"ah":834,"c":24}"#;

/// Account credentials. Kept only for the duration of one login call.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// What a login starts from.
#[derive(Debug, Clone)]
pub enum LoginInput {
    /// Submit credentials through the login form.
    Credentials(Credentials),
    /// Resume from exported cookies without submitting credentials.
    Saved(SavedSession),
}

impl LoginInput {
    /// Checks the input shape before any exchange.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Validation`] for empty credentials or an empty
    /// saved session.
    pub fn validate(&self) -> Result<(), LoginError> {
        match self {
            Self::Credentials(credentials) => {
                if credentials.email.trim().is_empty() {
                    return Err(LoginError::Validation("email is empty".to_string()));
                }
                if credentials.password.is_empty() {
                    return Err(LoginError::Validation("password is empty".to_string()));
                }
                Ok(())
            }
            Self::Saved(saved) if saved.is_empty() => Err(LoginError::Validation(
                "saved session has no cookies".to_string(),
            )),
            Self::Saved(_) => Ok(()),
        }
    }
}

impl From<Credentials> for LoginInput {
    fn from(credentials: Credentials) -> Self {
        Self::Credentials(credentials)
    }
}

impl From<SavedSession> for LoginInput {
    fn from(saved: SavedSession) -> Self {
        Self::Saved(saved)
    }
}

/// Builds the credential form from the landing page's login form plus the
/// computed fields.
pub(crate) fn login_form(html: &str, credentials: &Credentials, now_secs: u64) -> Form {
    let mut form = scrape_form_inputs(html, "#login_form input");

    match between(html, "[\"LSD\",[],{\"token\":\"", "\"}") {
        Some(lsd) => {
            form.set("lsd", lsd);
        }
        None => warn!("anti-forgery token not found on landing page"),
    }
    form.set("lgndim", STANDARD.encode(LOGIN_SCREEN_GEOMETRY))
        .set("email", credentials.email.as_str())
        .set("pass", credentials.password.as_str())
        .set("default_persistent", "0");
    if let Some(lgnrnd) = between(html, "name=\"lgnrnd\" value=\"", "\"") {
        form.set("lgnrnd", lgnrnd);
    }
    form.set("locale", "en_US")
        .set("timezone", "240")
        .set("lgnjs", now_secs.to_string());
    form
}
