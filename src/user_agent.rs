//! User-Agent strings for service traffic.
//!
//! The web service serves different markup to unrecognized clients, so the
//! default identifies as a desktop Safari browser.

/// Default User-Agent for all exchanges.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_10_2) AppleWebKit/600.3.18 (KHTML, like Gecko) Version/8.0.3 Safari/600.3.18";

/// Returns `candidate` when it is usable as a header value, else the default.
#[must_use]
pub(crate) fn effective_user_agent(candidate: &str) -> &str {
    let trimmed = candidate.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
        DEFAULT_USER_AGENT
    } else {
        trimmed
    }
}
