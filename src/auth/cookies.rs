//! Cookie records and `Set-Cookie` header parsing.
//!
//! A [`CookieRecord`] is the unit the session cookie store keeps, exports and
//! replays. Records are keyed by `(domain, path, key)`; the domain is stored
//! lowercase without a leading dot, with `host_only` recording whether the
//! cookie was scoped to an exact host.

use std::fmt;
use std::time::{Duration, SystemTime};

use tracing::debug;
use url::Url;

/// A single cookie held by the session cookie store.
///
/// The value field is intentionally redacted in Debug output to prevent
/// accidental logging of session credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct CookieRecord {
    /// Cookie domain, lowercase, without a leading dot.
    pub domain: String,
    /// The URL path scope for the cookie.
    pub path: String,
    /// Cookie name.
    pub key: String,
    /// Cookie value (sensitive, never log).
    value: String,
    /// Absolute expiry; `None` for session cookies.
    pub expires: Option<SystemTime>,
    /// Whether the cookie only matches its exact host (no `Domain` attribute).
    pub host_only: bool,
    /// Whether the cookie should only be sent over HTTPS.
    pub secure: bool,
    /// Whether the cookie was marked `HttpOnly`.
    pub http_only: bool,
}

impl CookieRecord {
    /// Creates a domain-scoped cookie with no expiry.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        path: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            domain: normalize_domain(&domain.into()),
            path: path.into(),
            key: key.into(),
            value: value.into(),
            expires: None,
            host_only: false,
            secure: false,
            http_only: false,
        }
    }

    /// Sets an absolute expiry.
    #[must_use]
    pub fn with_expires(mut self, expires: Option<SystemTime>) -> Self {
        self.expires = expires;
        self
    }

    /// Returns the cookie value.
    ///
    /// Cookie values are sensitive; avoid logging the return value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns true when the record's expiry lies at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    /// Returns true when this record has the same `(domain, path, key)` identity.
    #[must_use]
    pub fn same_identity(&self, other: &CookieRecord) -> bool {
        self.domain == other.domain && self.path == other.path && self.key == other.key
    }

    /// Returns true when this cookie should accompany a request to `url`.
    #[must_use]
    pub fn matches_url(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if self.secure && url.scheme() != "https" {
            return false;
        }
        let domain_ok = if self.host_only {
            host.eq_ignore_ascii_case(&self.domain)
        } else {
            domain_matches(host, &self.domain)
        };
        domain_ok && path_matches(url.path(), &self.path)
    }

    /// Renders the record as a `Set-Cookie` header value.
    #[must_use]
    pub fn to_set_cookie_string(&self) -> String {
        let mut parts = vec![format!("{}={}", self.key, self.value)];
        if let Some(expires) = self.expires {
            parts.push(format!("Expires={}", httpdate::fmt_http_date(expires)));
        }
        if !self.host_only {
            parts.push(format!("Domain={}", self.domain));
        }
        parts.push(format!("Path={}", self.path));
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        parts.join("; ")
    }
}

impl fmt::Debug for CookieRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieRecord")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("key", &self.key)
            .field("value", &"[REDACTED]")
            .field("expires", &self.expires)
            .field("host_only", &self.host_only)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Outcome of parsing one `Set-Cookie` header against its request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetCookie {
    /// Insert or replace the record.
    Store(CookieRecord),
    /// The server expired this `(domain, path, key)`; drop any stored record.
    Remove(CookieRecord),
}

/// Parses a `Set-Cookie` header value received from `url`.
///
/// Returns `None` for headers that cannot be stored: missing `=`, empty
/// name, or a `Domain` attribute that does not cover the request host.
#[must_use]
pub fn parse_set_cookie(header: &str, url: &Url, now: SystemTime) -> Option<SetCookie> {
    let host = url.host_str()?.to_ascii_lowercase();
    let mut segments = header.split(';');
    let (key, value) = segments.next()?.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let mut domain_attr: Option<String> = None;
    let mut path_attr: Option<String> = None;
    let mut expires: Option<SystemTime> = None;
    let mut max_age: Option<i64> = None;
    let mut secure = false;
    let mut http_only = false;

    for attribute in segments {
        let (name, attr_value) = match attribute.split_once('=') {
            Some((name, attr_value)) => (name.trim(), attr_value.trim()),
            None => (attribute.trim(), ""),
        };
        match name.to_ascii_lowercase().as_str() {
            "domain" if !attr_value.is_empty() => domain_attr = Some(normalize_domain(attr_value)),
            "path" if attr_value.starts_with('/') => path_attr = Some(attr_value.to_string()),
            "expires" => expires = httpdate::parse_http_date(attr_value).ok(),
            "max-age" => max_age = attr_value.parse::<i64>().ok(),
            "secure" => secure = true,
            "httponly" => http_only = true,
            _ => {}
        }
    }

    let (domain, host_only) = match domain_attr {
        Some(domain) => {
            if !domain_matches(&host, &domain) {
                debug!(cookie = key, domain = %domain, host = %host, "rejecting cookie for foreign domain");
                return None;
            }
            (domain, false)
        }
        None => (host, true),
    };

    // Max-Age wins over Expires when both are present.
    let expires = match max_age {
        Some(seconds) if seconds <= 0 => Some(SystemTime::UNIX_EPOCH),
        Some(seconds) => now.checked_add(Duration::from_secs(seconds.unsigned_abs())),
        None => expires,
    };

    let record = CookieRecord {
        domain,
        path: path_attr.unwrap_or_else(|| default_path(url)),
        key: key.to_string(),
        value: value.to_string(),
        expires,
        host_only,
        secure,
        http_only,
    };

    if record.is_expired_at(now) {
        Some(SetCookie::Remove(record))
    } else {
        Some(SetCookie::Store(record))
    }
}

/// Strips a leading dot and lowercases a cookie domain.
#[must_use]
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Domain-match per RFC 6265 §5.1.3 (`domain` already normalized).
fn domain_matches(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == domain
        || (host.ends_with(domain)
            && host.as_bytes().get(host.len() - domain.len() - 1) == Some(&b'.'))
}

/// Path-match per RFC 6265 §5.1.4.
fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

/// Default cookie path per RFC 6265 §5.1.4: the request path up to its last `/`.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}
