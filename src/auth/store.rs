//! The session cookie store.
//!
//! [`CookieStore`] is installed as the reqwest cookie provider, so every
//! exchange merges server-set cookies as soon as the response headers arrive.
//! Unlike `reqwest::cookie::Jar` it can enumerate its records, which is what
//! makes exporting a [`SavedSession`] possible.

use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use reqwest::header::HeaderValue;
use tracing::{debug, instrument, warn};
use url::Url;

use super::cookies::{CookieRecord, SetCookie, parse_set_cookie};
use super::saved_session::SavedSession;

/// Ordered, per-domain cookie records shared by the transport and the session.
#[derive(Debug, Default)]
pub struct CookieStore {
    records: RwLock<Vec<CookieRecord>>,
}

impl CookieStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated from a saved session.
    #[must_use]
    #[instrument(level = "debug", skip(saved), fields(cookies = saved.len()))]
    pub fn from_saved_session(saved: &SavedSession) -> Self {
        let store = Self::new();
        for record in saved.records() {
            store.insert(record.clone());
        }
        store
    }

    /// Inserts a record, replacing any record with the same `(domain, path, key)`.
    pub fn insert(&self, record: CookieRecord) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = records.iter_mut().find(|r| r.same_identity(&record)) {
            *existing = record;
        } else {
            records.push(record);
        }
    }

    /// Merges one `Set-Cookie` header value received from `url`.
    ///
    /// Returns false when the header was rejected as unparseable or foreign.
    pub fn set_cookie_str(&self, set_cookie: &str, url: &Url) -> bool {
        match parse_set_cookie(set_cookie, url, SystemTime::now()) {
            Some(SetCookie::Store(record)) => {
                debug!(domain = %record.domain, key = %record.key, "stored cookie");
                self.insert(record);
                true
            }
            Some(SetCookie::Remove(record)) => {
                debug!(domain = %record.domain, key = %record.key, "server expired cookie");
                self.records
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|r| !r.same_identity(&record));
                true
            }
            None => {
                warn!(url = %url, "skipping unparseable Set-Cookie header");
                false
            }
        }
    }

    /// Returns the live records that would accompany a request to `url`.
    #[must_use]
    pub fn matching(&self, url: &Url) -> Vec<CookieRecord> {
        let now = SystemTime::now();
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut matched: Vec<CookieRecord> = records
            .iter()
            .filter(|record| !record.is_expired_at(now) && record.matches_url(url))
            .cloned()
            .collect();
        // Longer paths first, per RFC 6265 §5.4.
        matched.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        matched
    }

    /// Returns the value of the named cookie visible to `url`, if any.
    #[must_use]
    pub fn value_for(&self, url: &Url, key: &str) -> Option<String> {
        self.matching(url)
            .into_iter()
            .find(|record| record.key == key)
            .map(|record| record.value().to_string())
    }

    /// Number of stored records, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes the live records, in insertion order, into a saved session.
    #[must_use]
    pub fn export(&self) -> SavedSession {
        let now = SystemTime::now();
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        SavedSession::new(
            records
                .iter()
                .filter(|record| !record.is_expired_at(now))
                .cloned()
                .collect(),
        )
    }
}

impl reqwest::cookie::CookieStore for CookieStore {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            match header.to_str() {
                Ok(value) => {
                    self.set_cookie_str(value, url);
                }
                Err(_) => warn!(url = %url, "skipping non-ASCII Set-Cookie header"),
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .matching(url)
            .iter()
            .map(|record| format!("{}={}", record.key, record.value()))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore as _;
    use std::time::Duration;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_insert_is_unique_per_domain_path_key() {
        let store = CookieStore::new();
        store.insert(CookieRecord::new("service.example", "/", "xs", "one"));
        store.insert(CookieRecord::new("service.example", "/", "xs", "two"));
        store.insert(CookieRecord::new("service.example", "/other", "xs", "three"));
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.value_for(&url("https://www.service.example/"), "xs").as_deref(),
            Some("two")
        );
    }

    #[test]
    fn test_cookie_header_only_for_matching_domain() {
        let store = CookieStore::new();
        store.insert(CookieRecord::new("service.example", "/", "c_user", "1000"));

        let header = store.cookies(&url("https://www.service.example/home.php")).unwrap();
        assert_eq!(header.to_str().unwrap(), "c_user=1000");
        assert!(store.cookies(&url("https://unrelated.example/")).is_none());
    }

    #[test]
    fn test_set_cookies_merges_and_removes() {
        let store = CookieStore::new();
        let origin = url("https://www.service.example/login/");
        let set = HeaderValue::from_static("xs=abc; Domain=service.example; Path=/");
        store.set_cookies(&mut std::iter::once(&set), &origin);
        assert_eq!(store.len(), 1);

        let expire = HeaderValue::from_static("xs=deleted; Domain=service.example; Path=/; Max-Age=0");
        store.set_cookies(&mut std::iter::once(&expire), &origin);
        assert!(store.is_empty());
    }

    #[test]
    fn test_expired_records_are_not_sent_or_exported() {
        let store = CookieStore::new();
        let past = SystemTime::now() - Duration::from_secs(60);
        store.insert(CookieRecord::new("service.example", "/", "old", "x").with_expires(Some(past)));
        store.insert(CookieRecord::new("service.example", "/", "fresh", "y"));

        assert!(store.value_for(&url("https://service.example/"), "old").is_none());
        let exported = store.export();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported.records()[0].key, "fresh");
    }

    #[test]
    fn test_export_preserves_insertion_order() {
        let store = CookieStore::new();
        for key in ["datr", "sb", "c_user", "xs"] {
            store.insert(CookieRecord::new("service.example", "/", key, "v"));
        }
        let keys: Vec<_> = store.export().records().iter().map(|r| r.key.clone()).collect();
        assert_eq!(keys, vec!["datr", "sb", "c_user", "xs"]);
    }

    #[test]
    fn test_longer_paths_sent_first() {
        let store = CookieStore::new();
        store.insert(CookieRecord::new("service.example", "/", "a", "root"));
        store.insert(CookieRecord::new("service.example", "/messages", "b", "deep"));
        let header = store.cookies(&url("https://service.example/messages/t")).unwrap();
        assert_eq!(header.to_str().unwrap(), "b=deep; a=root");
    }
}
