//! Markup extraction from raw response bodies.
//!
//! Everything here is a pure function over a body string: delimited token
//! extraction, cookies embedded in inline scripts, the streaming endpoint
//! configuration blob, and form field scraping. Nothing in this module
//! evaluates page content as code.

mod endpoint;
mod forms;
mod fragments;

use regex::Regex;

pub use endpoint::{ProtocolEndpoint, protocol_endpoint};
pub use forms::{inner_html, location_replace_target, meta_refresh_target, scrape_form_inputs};
pub use fragments::cookies_from_script_fragments;

/// Compiles a regex at static init; panics on invalid pattern.
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Returns the text between the first `prefix` and the next `suffix` after it.
///
/// An empty `prefix` anchors at the start of `body`.
#[must_use]
pub fn between<'a>(body: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    let start = body.find(prefix)? + prefix.len();
    let rest = &body[start..];
    let end = rest.find(suffix)?;
    Some(&rest[..end])
}

/// Strips the `for (;;);` guard the service prepends to JSON responses.
#[must_use]
pub fn strip_json_guard(body: &str) -> &str {
    static GUARD_RE: std::sync::LazyLock<Regex> =
        std::sync::LazyLock::new(|| compile_static_regex(r"^\s*for\s*\(\s*;\s*;\s*\)\s*;\s*"));
    match GUARD_RE.find(body) {
        Some(m) => &body[m.end()..],
        None => body,
    }
}
