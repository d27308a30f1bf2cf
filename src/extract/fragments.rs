//! Cookies the service assigns from inline scripts instead of `Set-Cookie`.
//!
//! The landing page embeds cookie assignments as JSON-ish arrays whose first
//! element carries a `_js_` prefix, e.g. `["_js_datr","value",1700000000000,"/"]`.
//! Splitting on the `"_js_` marker yields one fragment per assignment.

use std::time::{Duration, UNIX_EPOCH};

use serde_json::Value;
use tracing::{debug, warn};

use super::between;
use crate::auth::CookieRecord;

const SCRIPT_COOKIE_MARKER: &str = "\"_js_";

/// Extracts cookie records from script fragments in `body`, scoped to `cookie_domain`.
///
/// A fragment that fails to parse is skipped with a warning; the rest are
/// still returned. A body without any fragment yields an empty list.
#[must_use]
pub fn cookies_from_script_fragments(body: &str, cookie_domain: &str) -> Vec<CookieRecord> {
    let mut records = Vec::new();
    for (index, fragment) in body.split(SCRIPT_COOKIE_MARKER).skip(1).enumerate() {
        match parse_fragment(fragment, cookie_domain) {
            Some(record) => records.push(record),
            None => warn!(fragment = index, "skipping malformed script cookie fragment"),
        }
    }
    debug!(count = records.len(), "extracted script cookies");
    records
}

fn parse_fragment(fragment: &str, cookie_domain: &str) -> Option<CookieRecord> {
    let inner = between(fragment, "", "]")?;
    let parsed: Vec<Value> = serde_json::from_str(&format!("[\"{inner}]")).ok()?;

    let name = parsed.first()?.as_str().filter(|name| !name.is_empty())?;
    let value = match parsed.get(1)? {
        Value::String(value) => value.clone(),
        Value::Number(value) => value.to_string(),
        _ => return None,
    };
    let expires = parsed
        .get(2)
        .and_then(Value::as_u64)
        .filter(|millis| *millis > 0)
        .and_then(|millis| UNIX_EPOCH.checked_add(Duration::from_millis(millis)));
    let path = parsed
        .get(3)
        .and_then(Value::as_str)
        .filter(|path| path.starts_with('/'))
        .unwrap_or("/");

    Some(CookieRecord::new(cookie_domain, path, name, value).with_expires(expires))
}
