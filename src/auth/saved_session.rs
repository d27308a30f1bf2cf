//! Saved sessions: the exported cookie sequence that lets a later login skip
//! credential submission.
//!
//! The on-disk shape is a JSON array of cookie objects:
//! `[{ "key", "value", "domain", "path", "expires", "hostOnly", ... }]`.
//! Import is tolerant of the variations browser and library exports produce:
//! `name` is accepted for `key`, and `expires` may be an RFC 3339 timestamp,
//! an HTTP-date, a number of seconds since the epoch, or absent. Any other
//! expiry imports the cookie as a session cookie.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info, instrument, warn};

use super::cookies::{CookieRecord, normalize_domain};

/// An ordered sequence of cookie records exported from a live session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedSession {
    records: Vec<CookieRecord>,
}

/// Errors that can occur while reading or writing a saved session.
#[derive(Debug, thiserror::Error)]
pub enum SavedSessionError {
    /// Reading or writing the session file failed.
    #[error("saved session I/O error for {path}: {source}")]
    Io {
        /// Session file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The session payload is not a JSON cookie array.
    #[error("invalid saved session JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// No usable cookies remained after validation.
    #[error("saved session contains no usable cookies ({skipped} entries skipped)")]
    NoUsableCookies {
        /// Number of entries rejected during import.
        skipped: usize,
    },
}

/// Result of importing a saved session, with non-fatal warnings.
#[derive(Debug)]
pub struct ImportedSession {
    /// The usable records.
    pub session: SavedSession,
    /// Entries skipped during import, one message per entry.
    pub warnings: Vec<String>,
}

impl SavedSession {
    /// Wraps an ordered record list.
    #[must_use]
    pub fn new(records: Vec<CookieRecord>) -> Self {
        Self { records }
    }

    /// Returns the records in export order.
    #[must_use]
    pub fn records(&self) -> &[CookieRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when no records are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Parses the JSON array shape, skipping unusable entries.
    ///
    /// # Errors
    ///
    /// Returns [`SavedSessionError::Json`] when the payload is not a JSON
    /// array, or [`SavedSessionError::NoUsableCookies`] when every entry was
    /// rejected.
    #[instrument(level = "debug", skip(input))]
    pub fn from_json_str(input: &str) -> Result<ImportedSession, SavedSessionError> {
        let entries: Vec<JsonCookieEntry> = serde_json::from_str(input)?;
        let mut records = Vec::new();
        let mut warnings = Vec::new();
        let mut skipped = 0;

        for (index, entry) in entries.into_iter().enumerate() {
            match convert_entry(entry) {
                Ok((record, None)) => records.push(record),
                Ok((record, Some(note))) => {
                    warn!(entry = index + 1, note = %note, "saved-session cookie imported without expiry");
                    warnings.push(format!("entry {}: {note}", index + 1));
                    records.push(record);
                }
                Err(reason) => {
                    warn!(entry = index + 1, reason = %reason, "skipping saved-session cookie");
                    warnings.push(format!("entry {}: {reason}", index + 1));
                    skipped += 1;
                }
            }
        }

        if records.is_empty() && skipped > 0 {
            return Err(SavedSessionError::NoUsableCookies { skipped });
        }

        Ok(ImportedSession {
            session: Self::new(records),
            warnings,
        })
    }

    /// Serializes to the pretty-printed JSON array shape.
    ///
    /// # Errors
    ///
    /// Returns [`SavedSessionError::Json`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, SavedSessionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for SavedSession {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.iter().map(SavedCookie::from))
    }
}

/// Loads a saved session from a JSON file.
///
/// # Errors
///
/// Returns [`SavedSessionError`] when the file cannot be read or parsed.
#[instrument(level = "debug")]
pub fn load_saved_session(path: &Path) -> Result<ImportedSession, SavedSessionError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SavedSessionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let imported = SavedSession::from_json_str(&contents)?;
    info!(
        path = %path.display(),
        cookies = imported.session.len(),
        skipped = imported.warnings.len(),
        "Loaded saved session"
    );
    Ok(imported)
}

/// Writes a saved session to a JSON file, replacing any previous contents.
///
/// # Errors
///
/// Returns [`SavedSessionError`] when serialization or the write fails.
#[instrument(level = "debug", skip(session), fields(cookies = session.len()))]
pub fn store_saved_session(path: &Path, session: &SavedSession) -> Result<(), SavedSessionError> {
    let json = session.to_json_pretty()?;
    std::fs::write(path, json).map_err(|source| SavedSessionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "wrote saved session");
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedCookie<'a> {
    key: &'a str,
    value: &'a str,
    domain: &'a str,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires: Option<String>,
    host_only: bool,
    secure: bool,
    http_only: bool,
}

impl<'a> From<&'a CookieRecord> for SavedCookie<'a> {
    fn from(record: &'a CookieRecord) -> Self {
        Self {
            key: &record.key,
            value: record.value(),
            domain: &record.domain,
            path: &record.path,
            expires: record.expires.map(format_expiry),
            host_only: record.host_only,
            secure: record.secure,
            http_only: record.http_only,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonCookieEntry {
    #[serde(alias = "name")]
    key: Option<String>,
    value: Option<String>,
    domain: Option<String>,
    path: Option<String>,
    #[serde(alias = "expirationDate")]
    expires: Option<serde_json::Value>,
    host_only: Option<bool>,
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    http_only: bool,
}

/// Converts one entry. An unrecognized expiry keeps the cookie as a session
/// cookie and comes back as a note.
fn convert_entry(entry: JsonCookieEntry) -> Result<(CookieRecord, Option<String>), String> {
    let key = entry
        .key
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| "missing required field: key".to_string())?;
    let domain = entry
        .domain
        .filter(|domain| !domain.trim().is_empty())
        .ok_or_else(|| format!("cookie '{key}' is missing its domain"))?;
    let path = entry
        .path
        .filter(|path| path.starts_with('/'))
        .unwrap_or_else(|| "/".to_string());

    let (expires, note) = match entry.expires.as_ref().map(parse_expiry) {
        Some(Ok(expires)) => (expires, None),
        Some(Err(reason)) => (
            None,
            Some(format!("cookie '{key}': {reason}; kept as a session cookie")),
        ),
        None => (None, None),
    };

    let mut record = CookieRecord::new(normalize_domain(&domain), path, key, entry.value.unwrap_or_default())
        .with_expires(expires);
    record.host_only = entry.host_only.unwrap_or(false);
    record.secure = entry.secure;
    record.http_only = entry.http_only;
    Ok((record, note))
}

fn parse_expiry(value: &serde_json::Value) -> Result<Option<SystemTime>, String> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Number(number) => {
            let seconds = number
                .as_f64()
                .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                .ok_or_else(|| format!("invalid expiry timestamp {number}"))?;
            Ok(Duration::try_from_secs_f64(seconds)
                .ok()
                .and_then(|offset| UNIX_EPOCH.checked_add(offset)))
        }
        serde_json::Value::String(text) => {
            let text = text.trim();
            if text.is_empty() || text.eq_ignore_ascii_case("infinity") {
                return Ok(None);
            }
            if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(text) {
                return Ok(Some(SystemTime::from(parsed)));
            }
            httpdate::parse_http_date(text)
                .map(Some)
                .map_err(|_| format!("unrecognized expiry '{text}'"))
        }
        other => Err(format!("unsupported expiry value {other}")),
    }
}

fn format_expiry(expires: SystemTime) -> String {
    chrono::DateTime::<chrono::Utc>::from(expires).to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
