//! Cookie storage and saved-session persistence.
//!
//! This module provides the session cookie store used as the HTTP client's
//! cookie provider, plus import/export of saved sessions so a later login can
//! resume without resubmitting credentials.

mod cookies;
mod saved_session;
mod store;

pub use cookies::{CookieRecord, SetCookie, normalize_domain, parse_set_cookie};
pub use saved_session::{
    ImportedSession, SavedSession, SavedSessionError, load_saved_session, store_saved_session,
};
pub use store::CookieStore;
